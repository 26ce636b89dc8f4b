use std::borrow::Cow;

/// How the attachment arrived on the chat side
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachmentKind {
    Audio,
    Voice,
    Video,
    /// Generic file; its declared MIME type decides what it is
    Document,
}

/// Handle to an inbound file, enough to download it later
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub kind: AttachmentKind,
    /// Opaque remote identifier used to resolve the download
    pub file_id: String,
    pub file_name: Option<String>,
    pub mime_type: Option<String>,
    /// Declared duration (video only)
    pub duration_secs: Option<u32>,
}

impl Attachment {
    pub fn new(kind: AttachmentKind, file_id: impl Into<String>) -> Self {
        Self {
            kind,
            file_id: file_id.into(),
            file_name: None,
            mime_type: None,
            duration_secs: None,
        }
    }

    pub fn with_file_name(mut self, name: impl Into<String>) -> Self {
        self.file_name = Some(name.into());
        self
    }

    pub fn with_mime_type(mut self, mime: impl Into<String>) -> Self {
        self.mime_type = Some(mime.into());
        self
    }

    pub fn with_duration(mut self, secs: u32) -> Self {
        self.duration_secs = Some(secs);
        self
    }

    /// Declared file name, or a default that fits the kind and declared MIME type
    ///
    /// Outputs are named after this, and ffmpeg picks the container from the
    /// extension, so the default must carry one whenever it can be derived.
    pub fn display_name(&self) -> Cow<'_, str> {
        if let Some(name) = self.file_name.as_deref().filter(|n| !n.is_empty()) {
            return Cow::Borrowed(name);
        }

        let stem = match self.kind {
            AttachmentKind::Audio => "audio",
            AttachmentKind::Voice => "voice",
            AttachmentKind::Video => "video",
            AttachmentKind::Document => "document",
        };
        let extension = self
            .mime_type
            .as_deref()
            .and_then(extension_for_mime)
            .or(match self.kind {
                AttachmentKind::Audio => Some("mp3"),
                AttachmentKind::Voice => Some("ogg"),
                AttachmentKind::Video => Some("mp4"),
                AttachmentKind::Document => None,
            });

        match extension {
            Some(ext) => Cow::Owned(format!("{}.{}", stem, ext)),
            None => Cow::Borrowed(stem),
        }
    }
}

fn extension_for_mime(mime: &str) -> Option<&'static str> {
    let mime = mime.trim().to_ascii_lowercase();
    let ext = match mime.split(';').next().unwrap_or_default().trim() {
        "audio/mpeg" | "audio/mp3" | "audio/mpeg3" => "mp3",
        "audio/mp4" | "audio/x-m4a" | "audio/m4a" => "m4a",
        "audio/aac" => "aac",
        "audio/ogg" => "ogg",
        "audio/opus" => "opus",
        "audio/wav" | "audio/x-wav" | "audio/wave" => "wav",
        "audio/flac" | "audio/x-flac" => "flac",
        "video/mp4" | "application/mp4" => "mp4",
        "video/quicktime" => "mov",
        "video/webm" => "webm",
        "video/x-matroska" => "mkv",
        "video/x-msvideo" => "avi",
        _ => return None,
    };
    Some(ext)
}

/// What an attachment is, as far as the jobs are concerned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Audio,
    Video,
    Unsupported,
}
