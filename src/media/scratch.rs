use super::attachment::Attachment;
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::{debug, warn};

/// Remote storage that attachments are downloaded from
#[async_trait]
pub trait FileSource: Send + Sync {
    /// Stream the bytes behind `file_id` into `dst` without buffering the whole payload
    async fn fetch(&self, file_id: &str, dst: &mut (dyn AsyncWrite + Unpin + Send)) -> Result<()>;
}

/// Local scratch storage for downloads and transform outputs
#[derive(Clone)]
pub struct ScratchDir {
    root: PathBuf,
    source: Arc<dyn FileSource>,
}

impl ScratchDir {
    pub fn new(root: impl Into<PathBuf>, source: Arc<dyn FileSource>) -> Self {
        Self {
            root: root.into(),
            source,
        }
    }

    /// A fresh path in scratch storage; nothing is created on disk
    pub fn path_for(&self, name: &str) -> PathBuf {
        self.root.join(format!(
            "{}_{}",
            uuid::Uuid::new_v4().simple(),
            sanitize_file_name(name)
        ))
    }

    /// Download an attachment into a uniquely named local file
    ///
    /// On failure the partially written file is removed before returning.
    pub async fn acquire(&self, attachment: &Attachment) -> Result<PathBuf> {
        let path = self.path_for(&attachment.display_name());

        let mut file = tokio::fs::File::create(&path)
            .await
            .with_context(|| format!("Failed to create {}", path.display()))?;

        let downloaded = async {
            self.source.fetch(&attachment.file_id, &mut file).await?;
            file.flush().await.context("Failed to flush download")?;
            Ok::<_, anyhow::Error>(())
        }
        .await;

        drop(file);

        match downloaded {
            Ok(()) => {
                debug!("Downloaded {} to {}", attachment.file_id, path.display());
                Ok(path)
            }
            Err(e) => {
                release(std::slice::from_ref(&path)).await;
                Err(e)
            }
        }
    }
}

/// Replace path separators so a declared name cannot escape the scratch directory
pub fn sanitize_file_name(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '/' | '\\' | '\0' => '-',
            other => other,
        })
        .collect()
}

/// Best-effort removal; already-missing files are ignored
pub async fn release(paths: &[PathBuf]) {
    for path in paths {
        match tokio::fs::remove_file(path).await {
            Ok(()) => debug!("Removed {}", path.display()),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => warn!("Failed to remove {}: {}", path.display(), e),
        }
    }
}

/// Set of scratch files owned by one job, removed when the set is dropped
#[derive(Debug, Default)]
pub struct Scratch {
    paths: Vec<PathBuf>,
}

impl Scratch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take ownership of `path` and hand back a copy for use
    pub fn track(&mut self, path: PathBuf) -> PathBuf {
        self.paths.push(path.clone());
        path
    }

    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }

    /// Remove everything now instead of waiting for drop
    pub async fn release(mut self) {
        let paths = std::mem::take(&mut self.paths);
        release(&paths).await;
    }
}

impl Drop for Scratch {
    fn drop(&mut self) {
        for path in self.paths.drain(..) {
            match std::fs::remove_file(&path) {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => warn!("Failed to remove {}: {}", path.display(), e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_strips_separators() {
        assert_eq!(sanitize_file_name("../../etc/passwd"), "..-..-etc-passwd");
        assert_eq!(sanitize_file_name(r"C:\music\a.mp3"), "C:-music-a.mp3");
        assert_eq!(sanitize_file_name("it's.mp3"), "it's.mp3");
    }

    #[test]
    fn scratch_drop_removes_tracked_files() {
        let dir = tempfile::TempDir::new().unwrap();
        let a = dir.path().join("a.bin");
        let b = dir.path().join("b.bin");
        std::fs::write(&a, b"a").unwrap();

        {
            let mut scratch = Scratch::new();
            scratch.track(a.clone());
            // never created; must not cause trouble
            scratch.track(b.clone());
        }

        assert!(!a.exists());
        assert!(!b.exists());
    }
}
