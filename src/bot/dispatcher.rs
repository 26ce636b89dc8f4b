use super::events::{ChatId, EventPayload, InboundEvent, MenuAction, MenuSelection, UserId};
use super::messenger::Messenger;
use crate::media::{classify, Attachment, MediaKind};
use crate::pipeline::Pipeline;
use crate::session::{MergeJob, MergeState, MergeStep, Sessions, TrimJob, TrimState, TrimStep};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

const MENU_PROMPT: &str = "Please choose an option:";
const FALLBACK: &str = "Please use /start to choose an option, or send the requested files.";
const NO_SESSION: &str = "No active session. Start with /start";
const BUSY: &str = "Your previous request is still being processed.";

/// Routes inbound events onto the per-user conversations
///
/// Each event runs as its own task. Events from the same user are serialized
/// by a per-user lock; events from different users run concurrently.
/// Finished conversations are handed to the [`Pipeline`] as further tasks.
pub struct Dispatcher {
    messenger: Arc<dyn Messenger>,
    sessions: Sessions,
    pipeline: Arc<Pipeline>,
    user_locks: Mutex<HashMap<UserId, Arc<Mutex<()>>>>,
    tasks: TaskTracker,
}

impl Dispatcher {
    pub fn new(messenger: Arc<dyn Messenger>, sessions: Sessions, pipeline: Pipeline) -> Arc<Self> {
        Arc::new(Self {
            messenger,
            sessions,
            pipeline: Arc::new(pipeline),
            user_locks: Mutex::new(HashMap::new()),
            tasks: TaskTracker::new(),
        })
    }

    /// Process `event` on its own task and return immediately
    pub fn submit(self: &Arc<Self>, event: InboundEvent) {
        let this = Arc::clone(self);
        self.tasks.spawn(async move {
            this.handle(event).await;
        });
    }

    /// Wait until every submitted event and every job it started has finished
    pub async fn wait_idle(&self) {
        self.tasks.close();
        self.tasks.wait().await;
        self.tasks.reopen();
    }

    /// Stop accepting work and drain what is in flight
    pub async fn shutdown(&self) {
        info!("Waiting for {} in-flight tasks", self.tasks.len());
        self.tasks.close();
        self.tasks.wait().await;
    }

    /// Apply one event under the sender's lock
    pub async fn handle(&self, event: InboundEvent) {
        let InboundEvent { user, chat, payload } = event;
        let lock = self.user_lock(user).await;
        {
            let _guard = lock.lock().await;
            debug!("Event from user {}: {:?}", user, payload);

            match payload {
                EventPayload::Command(name) => self.on_command(chat, &name).await,
                EventPayload::MenuSelection(selection) => {
                    self.on_menu(user, chat, selection).await
                }
                EventPayload::Text(text) => self.on_text(user, chat, &text).await,
                EventPayload::Attachment(attachment) => {
                    self.on_attachment(user, chat, attachment).await
                }
                EventPayload::Other => self.reply(chat, FALLBACK).await,
            }
        }
        self.release_user_lock(user, lock).await;
    }

    async fn user_lock(&self, user: UserId) -> Arc<Mutex<()>> {
        let mut locks = self.user_locks.lock().await;
        Arc::clone(locks.entry(user).or_default())
    }

    /// Forget the user's lock once nobody else holds or waits on it
    async fn release_user_lock(&self, user: UserId, lock: Arc<Mutex<()>>) {
        let mut locks = self.user_locks.lock().await;
        // one reference in the map, one here
        if Arc::strong_count(&lock) == 2 {
            locks.remove(&user);
        }
    }

    async fn on_command(&self, chat: ChatId, name: &str) {
        match name {
            "start" => {
                if let Err(e) = self
                    .messenger
                    .send_menu(chat, MENU_PROMPT, &MenuAction::ALL)
                    .await
                {
                    warn!("Failed to send menu to chat {}: {:#}", chat.0, e);
                }
            }
            _ => self.reply(chat, "Unknown command. Use /start").await,
        }
    }

    async fn on_menu(&self, user: UserId, chat: ChatId, selection: MenuSelection) {
        let Some(action) = MenuAction::parse(&selection.data) else {
            warn!("Unknown menu action {:?} from user {}", selection.data, user);
            self.answer(&selection.callback_id, Some("Unknown action")).await;
            return;
        };

        let prompt = match action {
            MenuAction::VideoSample => "Send a video file to generate a sample.".to_string(),
            MenuAction::AudioTrim => {
                let (_, replaced) = self.sessions.trim.create(user, TrimState::AwaitingFile).await;
                with_discard_notice(replaced, "trim", "Send an audio file to trim.")
            }
            MenuAction::AudioMerge => {
                let (_, replaced) = self
                    .sessions
                    .merge
                    .create(user, MergeState::AwaitingCount)
                    .await;
                with_discard_notice(
                    replaced,
                    "merge",
                    "How many audio files would you like to merge? Send a number (e.g. 3).",
                )
            }
        };
        info!("User {} selected {}", user, action.as_str());

        match selection.message {
            Some(message) => {
                if let Err(e) = self.messenger.edit_text(chat, message, &prompt).await {
                    warn!("Failed to edit menu in chat {}: {:#}", chat.0, e);
                    self.reply(chat, &prompt).await;
                }
            }
            None => self.reply(chat, &prompt).await,
        }
        self.answer(&selection.callback_id, None).await;
    }

    async fn on_text(&self, user: UserId, chat: ChatId, text: &str) {
        let merge = self
            .sessions
            .merge
            .update(user, |s| s.awaits_count().then(|| s.accept_count(text)))
            .await;
        if let Some((id, Some(step))) = merge {
            if text.trim().is_empty() {
                self.reply(chat, "Please send a number of files to merge.").await;
                return;
            }
            self.on_merge_step(user, chat, id, step).await;
            return;
        }

        let trim = self
            .sessions
            .trim
            .update(user, |s| s.awaits_timestamp().then(|| s.accept_text(text)))
            .await;
        if let Some((id, Some(step))) = trim {
            self.on_trim_step(user, chat, id, step).await;
            return;
        }

        self.reply(chat, FALLBACK).await;
    }

    async fn on_attachment(&self, user: UserId, chat: ChatId, attachment: Attachment) {
        match classify(&attachment) {
            MediaKind::Audio => self.on_audio(user, chat, attachment).await,
            MediaKind::Video => {
                info!("Video sample requested by user {}", user);
                self.spawn_sample(chat, attachment);
            }
            MediaKind::Unsupported => self.reply(chat, FALLBACK).await,
        }
    }

    async fn on_audio(&self, user: UserId, chat: ChatId, attachment: Attachment) {
        // a merge that is already running does not capture new files
        let merge = self
            .sessions
            .merge
            .update(user, |s| {
                (!matches!(s, MergeState::Running)).then(|| s.accept_file(attachment.clone()))
            })
            .await;
        let merge_running = match merge {
            Some((id, Some(step))) => {
                self.on_merge_step(user, chat, id, step).await;
                return;
            }
            Some((_, None)) => true,
            None => false,
        };

        match self
            .sessions
            .trim
            .update(user, |s| s.accept_file(attachment))
            .await
        {
            Some((id, step)) => self.on_trim_step(user, chat, id, step).await,
            None if merge_running => self.reply(chat, BUSY).await,
            None => self.reply(chat, NO_SESSION).await,
        }
    }

    async fn on_merge_step(&self, user: UserId, chat: ChatId, id: Uuid, step: MergeStep) {
        match step {
            MergeStep::CountSet(n) => {
                self.reply(chat, &format!("Please send {} audio files for merging.", n))
                    .await
            }
            MergeStep::InvalidCount => {
                self.reply(chat, "Invalid number. Send a positive integer.").await
            }
            MergeStep::Received { count, expected } => {
                self.reply(chat, &format!("Received {}/{}", count, expected)).await
            }
            MergeStep::Ready(job) => {
                let n = job.inputs.len();
                self.reply(chat, &format!("Received {}/{}", n, n)).await;
                self.spawn_merge(user, chat, id, job);
            }
            MergeStep::CountPending => {
                self.reply(chat, "Please send a number of files to merge.").await
            }
            MergeStep::Busy => self.reply(chat, BUSY).await,
        }
    }

    async fn on_trim_step(&self, user: UserId, chat: ChatId, id: Uuid, step: TrimStep) {
        let text = match step {
            TrimStep::AskStart => "Please send the start timestamp (HH:MM:SS) for trimming.",
            TrimStep::AskEnd => "Now send the end timestamp (HH:MM:SS) for trimming.",
            TrimStep::InvalidStart => {
                "Invalid timestamp format. Please send start time as HH:MM:SS"
            }
            TrimStep::InvalidEnd => "Invalid timestamp format. Please send end time as HH:MM:SS",
            TrimStep::FileAlreadyQueued => {
                "A file is already queued for trimming. Please send the timestamps (HH:MM:SS)."
            }
            TrimStep::NotAwaitingText => FALLBACK,
            TrimStep::Busy => BUSY,
            TrimStep::Ready(job) => {
                self.spawn_trim(user, chat, id, job);
                return;
            }
        };
        self.reply(chat, text).await;
    }

    fn spawn_trim(&self, user: UserId, chat: ChatId, id: Uuid, job: TrimJob) {
        let pipeline = Arc::clone(&self.pipeline);
        let store = Arc::clone(&self.sessions.trim);
        self.tasks.spawn(async move {
            if let Err(e) = pipeline.run_trim(chat, job).await {
                error!("Trim job for user {} failed: {}", user, e);
            }
            store.delete_if(user, id).await;
        });
    }

    fn spawn_merge(&self, user: UserId, chat: ChatId, id: Uuid, job: MergeJob) {
        let pipeline = Arc::clone(&self.pipeline);
        let store = Arc::clone(&self.sessions.merge);
        self.tasks.spawn(async move {
            if let Err(e) = pipeline.run_merge(chat, job).await {
                error!("Merge job for user {} failed: {}", user, e);
            }
            store.delete_if(user, id).await;
        });
    }

    fn spawn_sample(&self, chat: ChatId, attachment: Attachment) {
        let pipeline = Arc::clone(&self.pipeline);
        self.tasks.spawn(async move {
            if let Err(e) = pipeline.run_sample(chat, attachment).await {
                error!("Video sample for chat {} failed: {}", chat.0, e);
            }
        });
    }

    async fn reply(&self, chat: ChatId, text: &str) {
        if let Err(e) = self.messenger.send_text(chat, text).await {
            warn!("Failed to send message to chat {}: {:#}", chat.0, e);
        }
    }

    async fn answer(&self, callback_id: &str, text: Option<&str>) {
        if let Err(e) = self.messenger.answer_menu(callback_id, text).await {
            warn!("Failed to answer menu selection {}: {:#}", callback_id, e);
        }
    }
}

fn with_discard_notice(replaced: bool, kind: &str, prompt: &str) -> String {
    if replaced {
        format!("Previous {} session discarded. {}", kind, prompt)
    } else {
        prompt.to_string()
    }
}
