use super::events::{ChatId, MenuAction, MessageRef};
use anyhow::Result;
use async_trait::async_trait;
use std::path::Path;

/// Media type of a delivered result
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputKind {
    Audio,
    Video,
}

/// Outbound side of the chat transport
///
/// Callers treat every method as fire-and-forget: failures are logged, never retried.
#[async_trait]
pub trait Messenger: Send + Sync {
    async fn send_text(&self, chat: ChatId, text: &str) -> Result<MessageRef>;

    /// Send `text` with one button per action
    async fn send_menu(&self, chat: ChatId, text: &str, actions: &[MenuAction]) -> Result<MessageRef>;

    async fn edit_text(&self, chat: ChatId, message: MessageRef, text: &str) -> Result<()>;

    /// Upload a local file as an audio or video message
    async fn send_media(&self, chat: ChatId, kind: OutputKind, path: &Path, caption: &str) -> Result<()>;

    /// Acknowledge a menu press, optionally with a short notice
    async fn answer_menu(&self, callback_id: &str, text: Option<&str>) -> Result<()>;
}
