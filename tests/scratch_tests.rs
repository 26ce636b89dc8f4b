// Integration tests for scratch storage
//
// Downloads stream into uniquely named files and nothing outlives a failure.

mod common;

use anyhow::Result;
use clip_bot::media::{release, Attachment, AttachmentKind, Scratch, ScratchDir};
use common::FakeSource;
use std::sync::Arc;
use tempfile::TempDir;

fn scratch_dir(temp: &TempDir, source: FakeSource) -> ScratchDir {
    ScratchDir::new(temp.path(), Arc::new(source))
}

#[tokio::test]
async fn test_acquire_streams_bytes_into_unique_files() -> Result<()> {
    let temp = TempDir::new()?;
    let dir = scratch_dir(&temp, FakeSource::default().with("id-1", b"payload"));
    let attachment = Attachment::new(AttachmentKind::Audio, "id-1").with_file_name("song.mp3");

    let first = dir.acquire(&attachment).await?;
    let second = dir.acquire(&attachment).await?;

    assert_ne!(first, second, "same attachment must not share a path");
    for path in [&first, &second] {
        assert_eq!(path.parent(), Some(temp.path()));
        assert!(path.to_string_lossy().ends_with("_song.mp3"));
        assert_eq!(std::fs::read(path)?, b"payload");
    }
    Ok(())
}

#[tokio::test]
async fn test_acquire_keeps_hostile_names_inside_root() -> Result<()> {
    let temp = TempDir::new()?;
    let dir = scratch_dir(&temp, FakeSource::default().with("id", b"x"));
    let attachment = Attachment::new(AttachmentKind::Document, "id").with_file_name("../../escape.mp3");

    let path = dir.acquire(&attachment).await?;

    assert_eq!(path.parent(), Some(temp.path()));
    assert!(path.to_string_lossy().ends_with("_..-..-escape.mp3"));
    Ok(())
}

#[tokio::test]
async fn test_acquire_uses_kind_default_name() -> Result<()> {
    let temp = TempDir::new()?;
    let dir = scratch_dir(&temp, FakeSource::default().with("voice", b"ogg"));

    let path = dir.acquire(&Attachment::new(AttachmentKind::Voice, "voice")).await?;

    assert!(path.to_string_lossy().ends_with("_voice.ogg"));
    Ok(())
}

#[tokio::test]
async fn test_failed_download_leaves_nothing_behind() -> Result<()> {
    let temp = TempDir::new()?;
    let dir = scratch_dir(&temp, FakeSource::default());

    let err = dir
        .acquire(&Attachment::new(AttachmentKind::Audio, "missing"))
        .await
        .unwrap_err();

    assert!(err.to_string().contains("missing"));
    assert_eq!(std::fs::read_dir(temp.path())?.count(), 0);
    Ok(())
}

#[tokio::test]
async fn test_scratch_release_removes_tracked_files() -> Result<()> {
    let temp = TempDir::new()?;
    let dir = scratch_dir(&temp, FakeSource::default().with("a", b"a").with("b", b"b"));

    let mut scratch = Scratch::new();
    scratch.track(dir.acquire(&Attachment::new(AttachmentKind::Audio, "a")).await?);
    scratch.track(dir.acquire(&Attachment::new(AttachmentKind::Audio, "b")).await?);
    // planned output that was never written
    scratch.track(dir.path_for("out.mp3"));
    assert_eq!(scratch.paths().len(), 3);
    assert_eq!(std::fs::read_dir(temp.path())?.count(), 2);

    scratch.release().await;

    assert_eq!(std::fs::read_dir(temp.path())?.count(), 0);
    Ok(())
}

#[tokio::test]
async fn test_release_tolerates_missing_files() -> Result<()> {
    let temp = TempDir::new()?;
    let present = temp.path().join("present.bin");
    std::fs::write(&present, b"x")?;

    release(&[temp.path().join("absent.bin"), present.clone()]).await;

    assert!(!present.exists());
    Ok(())
}
