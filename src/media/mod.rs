//! Media plumbing: attachment metadata, scratch storage and the external transcoder

pub mod attachment;
pub mod ffmpeg;
pub mod scratch;
pub mod validate;

pub use attachment::{Attachment, AttachmentKind, MediaKind};
pub use ffmpeg::{Ffmpeg, TranscodeError, Transcoder, SAMPLE_SECS};
pub use scratch::{release, FileSource, Scratch, ScratchDir};
pub use validate::{classify, parse_count, Timestamp};
