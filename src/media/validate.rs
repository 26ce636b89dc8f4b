//! Input validation for user-supplied text and attachment metadata

use super::attachment::{Attachment, AttachmentKind, MediaKind};
use chrono::{NaiveTime, Timelike};
use std::fmt;
use std::path::Path;

const AUDIO_EXTENSIONS: &[&str] = &[
    "mp3", "mpeg", "mpga", "m4a", "aac", "ogg", "oga", "opus", "wav", "flac",
];
const VIDEO_EXTENSIONS: &[&str] = &["mp4", "m4v", "mov", "mkv", "webm", "avi"];

/// A validated `HH:MM:SS` time of day, kept as the literal the user sent
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Timestamp(String);

impl Timestamp {
    pub fn parse(input: &str) -> Option<Self> {
        let literal = input.trim();
        // chrono alone would also take one-digit fields such as "7:0:5"
        let well_formed = literal.len() == 8
            && literal.bytes().enumerate().all(|(i, b)| match i {
                2 | 5 => b == b':',
                _ => b.is_ascii_digit(),
            });
        if !well_formed {
            return None;
        }
        let time = NaiveTime::parse_from_str(literal, "%H:%M:%S").ok()?;
        // chrono accepts a leap second as second 60
        if time.nanosecond() >= 1_000_000_000 {
            return None;
        }
        Some(Self(literal.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Parse the number of files for a merge; only positive integers pass
pub fn parse_count(input: &str) -> Option<usize> {
    match input.trim().parse::<usize>() {
        Ok(n) if n > 0 => Some(n),
        _ => None,
    }
}

/// Decide whether an attachment feeds the audio jobs, the video job, or neither
pub fn classify(attachment: &Attachment) -> MediaKind {
    match attachment.kind {
        AttachmentKind::Audio | AttachmentKind::Voice => MediaKind::Audio,
        AttachmentKind::Video => MediaKind::Video,
        AttachmentKind::Document => {
            classify_document(attachment.mime_type.as_deref(), attachment.file_name.as_deref())
        }
    }
}

fn classify_document(mime: Option<&str>, file_name: Option<&str>) -> MediaKind {
    let mime = mime.map(str::to_ascii_lowercase).unwrap_or_default();

    if mime.starts_with("audio/") || mime.contains("mpeg") {
        return MediaKind::Audio;
    }
    if mime.starts_with("video/") || mime.contains("mp4") {
        return MediaKind::Video;
    }

    // Generic uploads often carry no useful type; fall back to the file name
    if mime.is_empty() || mime == "application/octet-stream" {
        let extension = file_name
            .and_then(|name| Path::new(name).extension())
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase);

        if let Some(ext) = extension {
            if AUDIO_EXTENSIONS.contains(&ext.as_str()) {
                return MediaKind::Audio;
            }
            if VIDEO_EXTENSIONS.contains(&ext.as_str()) {
                return MediaKind::Video;
            }
        }
    }

    MediaKind::Unsupported
}
