pub mod bot;
pub mod config;
pub mod media;
pub mod pipeline;
pub mod session;

pub use bot::{ChatId, Dispatcher, EventPayload, InboundEvent, MenuAction, Messenger, UserId};
pub use config::Config;
pub use media::{Attachment, AttachmentKind, Ffmpeg, FileSource, ScratchDir, Transcoder};
pub use pipeline::{JobError, Pipeline};
pub use session::{spawn_sweeper, Sessions};
