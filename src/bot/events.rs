use crate::media::Attachment;
use std::fmt;

/// Stable identity of the sender; keys both session registries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UserId(pub u64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Conversation that replies go to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChatId(pub i64);

/// A message previously sent by the bot, so it can be edited later
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageRef(pub i32);

/// Entries of the start menu
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuAction {
    VideoSample,
    AudioTrim,
    AudioMerge,
}

impl MenuAction {
    pub const ALL: [MenuAction; 3] = [
        MenuAction::VideoSample,
        MenuAction::AudioTrim,
        MenuAction::AudioMerge,
    ];

    /// Identifier carried in the callback data
    pub fn as_str(&self) -> &'static str {
        match self {
            MenuAction::VideoSample => "video_sample_generator",
            MenuAction::AudioTrim => "audio_trimmer",
            MenuAction::AudioMerge => "audio_merger",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            MenuAction::VideoSample => "Video Sample Generator",
            MenuAction::AudioTrim => "Audio Trimmer",
            MenuAction::AudioMerge => "Audio Merger",
        }
    }

    pub fn parse(data: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|a| a.as_str() == data)
    }
}

/// A press on one of the menu buttons
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MenuSelection {
    /// Needed to acknowledge the press
    pub callback_id: String,
    /// The menu message, when it is still accessible
    pub message: Option<MessageRef>,
    pub data: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventPayload {
    /// Command name without the leading slash or bot mention
    Command(String),
    Text(String),
    Attachment(Attachment),
    MenuSelection(MenuSelection),
    /// Stickers, photos and anything else the bot has no use for
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundEvent {
    pub user: UserId,
    pub chat: ChatId,
    pub payload: EventPayload,
}

impl InboundEvent {
    pub fn new(user: UserId, chat: ChatId, payload: EventPayload) -> Self {
        Self { user, chat, payload }
    }
}

/// Split `/name@bot args` down to `name`
pub fn command_name(text: &str) -> Option<&str> {
    let body = text.strip_prefix('/')?;
    let word = body.split_whitespace().next().unwrap_or_default();
    Some(word.split('@').next().unwrap_or_default())
}
