//! Job pipelines: acquire inputs, transcode, deliver, clean up
//!
//! Every run takes an admission permit first, so at most `max_concurrent`
//! jobs touch the network, disk and transcoder at once. Scratch files are
//! owned by a [`Scratch`] set and reclaimed on every exit path.

mod error;

pub use error::JobError;

use crate::bot::{ChatId, MessageRef, Messenger, OutputKind};
use crate::media::{ffmpeg, Attachment, Scratch, ScratchDir, Transcoder, SAMPLE_SECS};
use crate::session::{MergeJob, TrimJob};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{Semaphore, SemaphorePermit};
use tracing::{info, warn};

pub struct Pipeline {
    messenger: Arc<dyn Messenger>,
    scratch: ScratchDir,
    transcoder: Arc<dyn Transcoder>,
    permits: Semaphore,
    sample_secs: u32,
}

impl Pipeline {
    pub fn new(
        messenger: Arc<dyn Messenger>,
        scratch: ScratchDir,
        transcoder: Arc<dyn Transcoder>,
        max_concurrent: usize,
    ) -> Self {
        Self {
            messenger,
            scratch,
            transcoder,
            permits: Semaphore::new(max_concurrent.max(1)),
            sample_secs: SAMPLE_SECS,
        }
    }

    pub fn with_sample_secs(mut self, secs: u32) -> Self {
        self.sample_secs = secs;
        self
    }

    /// Cut the requested range out of one audio file
    pub async fn run_trim(&self, chat: ChatId, job: TrimJob) -> Result<(), JobError> {
        let _permit = self.admit().await?;
        let status = self.notify(chat, "Downloading audio...").await;
        let mut scratch = Scratch::new();

        let input = match self.scratch.acquire(&job.source).await {
            Ok(path) => scratch.track(path),
            Err(error) => {
                self.notify(chat, &format!("Download error: {:#}", error)).await;
                return Err(JobError::Download { index: 1, error });
            }
        };
        self.notify(chat, "Audio downloaded. Trimming...").await;

        let output = scratch.track(
            self.scratch
                .path_for(&format!("trimmed_{}", job.source.display_name())),
        );
        let args = ffmpeg::trim_args(&input, job.start.as_str(), job.end.as_str(), &output);
        if let Err(e) = self.transcoder.run(&args).await {
            self.notify(chat, &format!("ffmpeg error: {}", e.diagnostic())).await;
            return Err(e.into());
        }

        self.notify(chat, "Trimming completed. Uploading...").await;
        let delivered = self
            .deliver(chat, OutputKind::Audio, &output, "Trimmed audio")
            .await;
        scratch.release().await;
        delivered?;

        self.notify(chat, "Trimmed audio uploaded!").await;
        self.finish(chat, status, "Done").await;
        info!("Trim job finished for chat {}", chat.0);
        Ok(())
    }

    /// Join all inputs into one audio file, in arrival order
    pub async fn run_merge(&self, chat: ChatId, job: MergeJob) -> Result<(), JobError> {
        let _permit = self.admit().await?;
        let status = self.notify(chat, "Starting audio merge...").await;
        let mut scratch = Scratch::new();
        let total = job.inputs.len();
        let mut inputs: Vec<PathBuf> = Vec::with_capacity(total);

        for (i, attachment) in job.inputs.iter().enumerate() {
            match self.scratch.acquire(attachment).await {
                Ok(path) => inputs.push(scratch.track(path)),
                Err(error) => {
                    self.notify(chat, &format!("Error downloading file {}: {:#}", i + 1, error))
                        .await;
                    return Err(JobError::Download { index: i + 1, error });
                }
            }
            self.notify(chat, &format!("Downloaded {}/{}", i + 1, total)).await;
        }

        let output = scratch.track(self.scratch.path_for("merged.mp3"));
        if let Err(e) = ffmpeg::merge(
            self.transcoder.as_ref(),
            &self.scratch,
            &mut scratch,
            &inputs,
            &output,
        )
        .await
        {
            self.notify(chat, &format!("ffmpeg failed: {}", e.diagnostic())).await;
            return Err(e.into());
        }

        let delivered = self
            .deliver(chat, OutputKind::Audio, &output, "Merged audio")
            .await;
        scratch.release().await;
        delivered?;

        self.notify(chat, "Merged audio uploaded!").await;
        self.finish(chat, status, "Merging completed.").await;
        info!("Merge of {} files finished for chat {}", total, chat.0);
        Ok(())
    }

    /// Copy a fixed-length excerpt from a random point of a video
    pub async fn run_sample(&self, chat: ChatId, source: Attachment) -> Result<(), JobError> {
        let _permit = self.admit().await?;
        let status = self.notify(chat, "Downloading video...").await;
        let mut scratch = Scratch::new();

        let input = match self.scratch.acquire(&source).await {
            Ok(path) => scratch.track(path),
            Err(error) => {
                self.notify(chat, &format!("Download error: {:#}", error)).await;
                return Err(JobError::Download { index: 1, error });
            }
        };
        self.notify(chat, "Video downloaded. Trimming...").await;

        let offset = ffmpeg::sample_offset(
            source.duration_secs,
            self.sample_secs,
            &mut rand::thread_rng(),
        );
        let output = scratch.track(
            self.scratch
                .path_for(&format!("sample_{}", source.display_name())),
        );
        let args = ffmpeg::sample_args(&input, offset, self.sample_secs, &output);
        if let Err(e) = self.transcoder.run(&args).await {
            self.notify(chat, &format!("ffmpeg error: {}", e.diagnostic())).await;
            return Err(e.into());
        }

        self.notify(chat, "Trimming completed. Uploading...").await;
        let caption = format!("Trimmed video ({}s)", self.sample_secs);
        let delivered = self.deliver(chat, OutputKind::Video, &output, &caption).await;
        scratch.release().await;
        delivered?;

        self.finish(chat, status, "Trimmed video uploaded!").await;
        info!("Video sample from {:.2}s finished for chat {}", offset, chat.0);
        Ok(())
    }

    async fn admit(&self) -> Result<SemaphorePermit<'_>, JobError> {
        self.permits.acquire().await.map_err(|_| JobError::Closed)
    }

    async fn notify(&self, chat: ChatId, text: &str) -> Option<MessageRef> {
        match self.messenger.send_text(chat, text).await {
            Ok(message) => Some(message),
            Err(e) => {
                warn!("Failed to send status to chat {}: {:#}", chat.0, e);
                None
            }
        }
    }

    /// Replace the initial status message, or send a new one if it never arrived
    async fn finish(&self, chat: ChatId, status: Option<MessageRef>, text: &str) {
        let Some(message) = status else {
            self.notify(chat, text).await;
            return;
        };
        if let Err(e) = self.messenger.edit_text(chat, message, text).await {
            warn!("Failed to edit status in chat {}: {:#}", chat.0, e);
        }
    }

    async fn deliver(
        &self,
        chat: ChatId,
        kind: OutputKind,
        path: &Path,
        caption: &str,
    ) -> Result<(), JobError> {
        if let Err(error) = self.messenger.send_media(chat, kind, path, caption).await {
            self.notify(chat, &format!("Upload failed: {:#}", error)).await;
            return Err(JobError::Delivery { error });
        }
        Ok(())
    }
}
