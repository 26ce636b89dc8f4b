// Shared fakes for the integration tests
//
// The fakes record every call so tests can assert on what the bot said,
// which transcoder invocations happened, and what was left on disk.

#![allow(dead_code)]

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use clip_bot::bot::{ChatId, EventPayload, InboundEvent, MenuAction, MenuSelection, MessageRef, Messenger, OutputKind, UserId};
use clip_bot::media::{Attachment, AttachmentKind, FileSource, ScratchDir, TranscodeError, Transcoder};
use clip_bot::{Dispatcher, Pipeline, Sessions};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use tokio::io::{AsyncWrite, AsyncWriteExt};

pub const USER: UserId = UserId(42);
pub const CHAT: ChatId = ChatId(4200);
pub const MENU_MESSAGE: MessageRef = MessageRef(1);

#[derive(Debug, Clone, PartialEq)]
pub enum Sent {
    Text { chat: ChatId, text: String },
    Menu { chat: ChatId, actions: Vec<MenuAction> },
    Edit { chat: ChatId, message: MessageRef, text: String },
    Media {
        chat: ChatId,
        kind: OutputKind,
        caption: String,
        /// Whether the file was still on disk when it was handed over
        existed: bool,
    },
    Answer { callback_id: String, text: Option<String> },
}

#[derive(Default)]
pub struct FakeMessenger {
    sent: Mutex<Vec<Sent>>,
    next_id: AtomicI32,
    pub fail_media: AtomicBool,
}

impl FakeMessenger {
    pub fn sent(&self) -> Vec<Sent> {
        self.sent.lock().unwrap().clone()
    }

    pub fn texts_to(&self, chat: ChatId) -> Vec<String> {
        self.sent()
            .into_iter()
            .filter_map(|s| match s {
                Sent::Text { chat: c, text } if c == chat => Some(text),
                _ => None,
            })
            .collect()
    }

    pub fn texts(&self) -> Vec<String> {
        self.texts_to(CHAT)
    }

    pub fn last_text(&self) -> Option<String> {
        self.texts().pop()
    }

    pub fn media(&self) -> Vec<Sent> {
        self.sent()
            .into_iter()
            .filter(|s| matches!(s, Sent::Media { .. }))
            .collect()
    }

    fn record(&self, sent: Sent) -> MessageRef {
        self.sent.lock().unwrap().push(sent);
        // id 1 is reserved for the menu message in tests
        MessageRef(self.next_id.fetch_add(1, Ordering::SeqCst) + 100)
    }
}

#[async_trait]
impl Messenger for FakeMessenger {
    async fn send_text(&self, chat: ChatId, text: &str) -> Result<MessageRef> {
        Ok(self.record(Sent::Text { chat, text: text.to_string() }))
    }

    async fn send_menu(&self, chat: ChatId, _text: &str, actions: &[MenuAction]) -> Result<MessageRef> {
        Ok(self.record(Sent::Menu { chat, actions: actions.to_vec() }))
    }

    async fn edit_text(&self, chat: ChatId, message: MessageRef, text: &str) -> Result<()> {
        self.record(Sent::Edit { chat, message, text: text.to_string() });
        Ok(())
    }

    async fn send_media(&self, chat: ChatId, kind: OutputKind, path: &Path, caption: &str) -> Result<()> {
        self.record(Sent::Media {
            chat,
            kind,
            caption: caption.to_string(),
            existed: path.exists(),
        });
        if self.fail_media.load(Ordering::SeqCst) {
            return Err(anyhow!("request entity too large"));
        }
        Ok(())
    }

    async fn answer_menu(&self, callback_id: &str, text: Option<&str>) -> Result<()> {
        self.record(Sent::Answer {
            callback_id: callback_id.to_string(),
            text: text.map(String::from),
        });
        Ok(())
    }
}

/// Remote files keyed by id; unknown ids fail after a partial write
#[derive(Default)]
pub struct FakeSource {
    files: HashMap<String, Vec<u8>>,
}

impl FakeSource {
    pub fn with(mut self, file_id: &str, bytes: &[u8]) -> Self {
        self.files.insert(file_id.to_string(), bytes.to_vec());
        self
    }
}

#[async_trait]
impl FileSource for FakeSource {
    async fn fetch(&self, file_id: &str, dst: &mut (dyn AsyncWrite + Unpin + Send)) -> Result<()> {
        match self.files.get(file_id) {
            Some(bytes) => {
                dst.write_all(bytes).await?;
                Ok(())
            }
            None => {
                dst.write_all(b"partial").await?;
                Err(anyhow!("connection reset while fetching {}", file_id))
            }
        }
    }
}

/// Records invocations; fails the calls whose index is in `failing`
#[derive(Default)]
pub struct FakeTranscoder {
    calls: Mutex<Vec<Vec<String>>>,
    /// Concat list contents seen at invocation time
    lists: Mutex<Vec<String>>,
    failing: HashSet<usize>,
}

impl FakeTranscoder {
    pub fn failing_on(calls: &[usize]) -> Self {
        Self {
            failing: calls.iter().copied().collect(),
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<Vec<String>> {
        self.calls.lock().unwrap().clone()
    }

    pub fn lists(&self) -> Vec<String> {
        self.lists.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transcoder for FakeTranscoder {
    async fn run(&self, args: &[String]) -> Result<(), TranscodeError> {
        let index = {
            let mut calls = self.calls.lock().unwrap();
            calls.push(args.to_vec());
            calls.len() - 1
        };

        if let Some(pos) = args.iter().position(|a| a == "concat") {
            if args.get(pos - 1).map(String::as_str) == Some("-f") {
                let list = std::fs::read_to_string(&args[pos + 4]).unwrap_or_default();
                self.lists.lock().unwrap().push(list);
            }
        }

        if self.failing.contains(&index) {
            return Err(TranscodeError::Failed {
                status: "exit status: 1".to_string(),
                output: "Invalid data found when processing input".to_string(),
            });
        }

        let output = args.last().expect("output path");
        std::fs::write(output, b"transcoded").expect("write output");
        Ok(())
    }
}

pub struct Harness {
    pub dispatcher: Arc<Dispatcher>,
    /// Shares the registries the dispatcher works on
    pub sessions: Sessions,
    pub messenger: Arc<FakeMessenger>,
    pub transcoder: Arc<FakeTranscoder>,
    pub scratch: TempDir,
}

impl Harness {
    pub fn new(source: FakeSource, transcoder: FakeTranscoder) -> Self {
        let scratch = TempDir::new().expect("scratch dir");
        let messenger = Arc::new(FakeMessenger::default());
        let transcoder = Arc::new(transcoder);
        let pipeline = Pipeline::new(
            messenger.clone(),
            ScratchDir::new(scratch.path(), Arc::new(source)),
            transcoder.clone(),
            2,
        );
        let sessions = Sessions::new();
        let dispatcher = Dispatcher::new(messenger.clone(), sessions.clone(), pipeline);

        Self {
            dispatcher,
            sessions,
            messenger,
            transcoder,
            scratch,
        }
    }

    /// Submit one event from the default user and wait for everything it started
    pub async fn send(&self, payload: EventPayload) {
        self.send_from(USER, CHAT, payload).await;
    }

    pub async fn send_from(&self, user: UserId, chat: ChatId, payload: EventPayload) {
        self.dispatcher.submit(InboundEvent::new(user, chat, payload));
        self.dispatcher.wait_idle().await;
    }

    pub fn scratch_files(&self) -> Vec<PathBuf> {
        std::fs::read_dir(self.scratch.path())
            .expect("read scratch dir")
            .map(|e| e.expect("dir entry").path())
            .collect()
    }
}

pub fn command(name: &str) -> EventPayload {
    EventPayload::Command(name.to_string())
}

pub fn text(body: &str) -> EventPayload {
    EventPayload::Text(body.to_string())
}

pub fn select(action: &str) -> EventPayload {
    EventPayload::MenuSelection(MenuSelection {
        callback_id: format!("cb-{}", action),
        message: Some(MENU_MESSAGE),
        data: action.to_string(),
    })
}

pub fn audio(file_id: &str, name: &str) -> EventPayload {
    EventPayload::Attachment(Attachment::new(AttachmentKind::Audio, file_id).with_file_name(name))
}

pub fn attachment(a: Attachment) -> EventPayload {
    EventPayload::Attachment(a)
}
