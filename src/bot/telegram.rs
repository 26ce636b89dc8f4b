//! Telegram transport built on teloxide
//!
//! Converts updates into [`InboundEvent`]s for the [`Dispatcher`] and
//! implements the outbound [`Messenger`] and download [`FileSource`] seams.

use super::dispatcher::Dispatcher;
use super::events::{
    command_name, ChatId, EventPayload, InboundEvent, MenuAction, MenuSelection, MessageRef, UserId,
};
use super::messenger::{Messenger, OutputKind};
use crate::media::{Attachment, AttachmentKind, FileSource};
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use teloxide::net::Download;
use teloxide::prelude::*;
use teloxide::types::{
    InlineKeyboardButton, InlineKeyboardMarkup, InputFile, MaybeInaccessibleMessage, MessageId,
};
use tokio::io::AsyncWrite;
use tracing::info;

fn tg_chat(chat: ChatId) -> teloxide::types::ChatId {
    teloxide::types::ChatId(chat.0)
}

/// Outbound calls and downloads through the Bot API
#[derive(Clone)]
pub struct TelegramMessenger {
    bot: Bot,
}

impl TelegramMessenger {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }
}

#[async_trait]
impl Messenger for TelegramMessenger {
    async fn send_text(&self, chat: ChatId, text: &str) -> Result<MessageRef> {
        let sent = self
            .bot
            .send_message(tg_chat(chat), text)
            .await
            .context("sendMessage failed")?;
        Ok(MessageRef(sent.id.0))
    }

    async fn send_menu(&self, chat: ChatId, text: &str, actions: &[MenuAction]) -> Result<MessageRef> {
        let keyboard = InlineKeyboardMarkup::new(
            actions
                .iter()
                .map(|a| vec![InlineKeyboardButton::callback(a.label(), a.as_str())]),
        );
        let sent = self
            .bot
            .send_message(tg_chat(chat), text)
            .reply_markup(keyboard)
            .await
            .context("sendMessage with menu failed")?;
        Ok(MessageRef(sent.id.0))
    }

    async fn edit_text(&self, chat: ChatId, message: MessageRef, text: &str) -> Result<()> {
        self.bot
            .edit_message_text(tg_chat(chat), MessageId(message.0), text)
            .await
            .context("editMessageText failed")?;
        Ok(())
    }

    async fn send_media(&self, chat: ChatId, kind: OutputKind, path: &Path, caption: &str) -> Result<()> {
        let file = InputFile::file(path);
        match kind {
            OutputKind::Audio => {
                self.bot
                    .send_audio(tg_chat(chat), file)
                    .caption(caption)
                    .await
                    .context("sendAudio failed")?;
            }
            OutputKind::Video => {
                self.bot
                    .send_video(tg_chat(chat), file)
                    .caption(caption)
                    .await
                    .context("sendVideo failed")?;
            }
        }
        Ok(())
    }

    async fn answer_menu(&self, callback_id: &str, text: Option<&str>) -> Result<()> {
        let mut request = self.bot.answer_callback_query(callback_id.to_owned());
        if let Some(text) = text {
            request = request.text(text);
        }
        request.await.context("answerCallbackQuery failed")?;
        Ok(())
    }
}

#[async_trait]
impl FileSource for TelegramMessenger {
    async fn fetch(&self, file_id: &str, dst: &mut (dyn AsyncWrite + Unpin + Send)) -> Result<()> {
        let file = self
            .bot
            .get_file(file_id.to_owned())
            .await
            .context("getFile failed")?;
        self.bot
            .download_file(&file.path, dst)
            .await
            .context("File download failed")?;
        Ok(())
    }
}

/// Extract the file-bearing part of a message, if any
pub fn attachment_from_message(msg: &Message) -> Option<Attachment> {
    if let Some(audio) = msg.audio() {
        let mut a = Attachment::new(AttachmentKind::Audio, audio.file.id.to_string());
        a.file_name = audio.file_name.clone();
        a.mime_type = audio.mime_type.as_ref().map(|m| m.to_string());
        return Some(a);
    }
    if let Some(voice) = msg.voice() {
        let mut a = Attachment::new(AttachmentKind::Voice, voice.file.id.to_string());
        a.mime_type = voice.mime_type.as_ref().map(|m| m.to_string());
        return Some(a);
    }
    if let Some(video) = msg.video() {
        let mut a = Attachment::new(AttachmentKind::Video, video.file.id.to_string())
            .with_duration(video.duration.seconds());
        a.file_name = video.file_name.clone();
        a.mime_type = video.mime_type.as_ref().map(|m| m.to_string());
        return Some(a);
    }
    if let Some(doc) = msg.document() {
        let mut a = Attachment::new(AttachmentKind::Document, doc.file.id.to_string());
        a.file_name = doc.file_name.clone();
        a.mime_type = doc.mime_type.as_ref().map(|m| m.to_string());
        return Some(a);
    }
    None
}

pub fn event_from_message(msg: &Message) -> Option<InboundEvent> {
    let user = UserId(msg.from.as_ref()?.id.0);
    let chat = ChatId(msg.chat.id.0);

    let payload = if let Some(text) = msg.text() {
        match command_name(text) {
            Some(name) => EventPayload::Command(name.to_string()),
            None => EventPayload::Text(text.to_string()),
        }
    } else if let Some(attachment) = attachment_from_message(msg) {
        EventPayload::Attachment(attachment)
    } else {
        EventPayload::Other
    };

    Some(InboundEvent::new(user, chat, payload))
}

pub fn event_from_callback(q: &CallbackQuery) -> InboundEvent {
    let user = UserId(q.from.id.0);
    let (chat, message) = match &q.message {
        Some(MaybeInaccessibleMessage::Regular(m)) => (ChatId(m.chat.id.0), Some(MessageRef(m.id.0))),
        Some(MaybeInaccessibleMessage::Inaccessible(m)) => (ChatId(m.chat.id.0), None),
        // private chats share the user's id
        None => (ChatId(q.from.id.0 as i64), None),
    };

    InboundEvent::new(
        user,
        chat,
        EventPayload::MenuSelection(MenuSelection {
            callback_id: q.id.to_string(),
            message,
            data: q.data.clone().unwrap_or_default(),
        }),
    )
}

/// Receive updates until ctrl-c, handing each one to `dispatcher`
pub async fn run(bot: Bot, dispatcher: Arc<Dispatcher>) {
    info!("Starting Telegram update loop");

    let handler = dptree::entry()
        .branch(Update::filter_message().endpoint({
            let dispatcher = Arc::clone(&dispatcher);
            move |msg: Message| {
                let dispatcher = Arc::clone(&dispatcher);
                async move {
                    if let Some(event) = event_from_message(&msg) {
                        dispatcher.submit(event);
                    }
                    respond(())
                }
            }
        }))
        .branch(Update::filter_callback_query().endpoint({
            let dispatcher = Arc::clone(&dispatcher);
            move |q: CallbackQuery| {
                let dispatcher = Arc::clone(&dispatcher);
                async move {
                    dispatcher.submit(event_from_callback(&q));
                    respond(())
                }
            }
        }));

    teloxide::dispatching::Dispatcher::builder(bot, handler)
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    info!("Telegram update loop stopped");
}
