use super::state::{MergeState, TrimState};
use crate::bot::UserId;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use uuid::Uuid;

/// One user's in-progress conversation for a single job kind
#[derive(Debug, Clone)]
pub struct Session<S> {
    /// Distinguishes this session from a later one for the same user
    pub id: Uuid,
    pub created_at: Instant,
    pub state: S,
}

/// In-memory registry of sessions keyed by user
///
/// A single lock guards the whole map; every mutation goes through it.
pub struct SessionStore<S> {
    name: &'static str,
    sessions: Mutex<HashMap<UserId, Session<S>>>,
}

impl<S: Clone + Send> SessionStore<S> {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// Start a fresh session, replacing any existing one for `user`
    ///
    /// Returns the new session id and whether a previous session was dropped.
    pub async fn create(&self, user: UserId, state: S) -> (Uuid, bool) {
        let session = Session {
            id: Uuid::new_v4(),
            created_at: Instant::now(),
            state,
        };
        let id = session.id;
        let replaced = self.sessions.lock().await.insert(user, session).is_some();
        debug!("{} session {} created for user {}", self.name, id, user);
        (id, replaced)
    }

    pub async fn get(&self, user: UserId) -> Option<Session<S>> {
        self.sessions.lock().await.get(&user).cloned()
    }

    /// Apply `f` to the user's state under the registry lock
    pub async fn update<R>(&self, user: UserId, f: impl FnOnce(&mut S) -> R) -> Option<(Uuid, R)> {
        let mut sessions = self.sessions.lock().await;
        let session = sessions.get_mut(&user)?;
        let out = f(&mut session.state);
        Some((session.id, out))
    }

    pub async fn delete(&self, user: UserId) -> bool {
        self.sessions.lock().await.remove(&user).is_some()
    }

    /// Delete the session only if it is still the one identified by `id`
    pub async fn delete_if(&self, user: UserId, id: Uuid) -> bool {
        let mut sessions = self.sessions.lock().await;
        match sessions.get(&user) {
            Some(session) if session.id == id => {
                sessions.remove(&user);
                true
            }
            _ => false,
        }
    }

    /// Drop sessions created more than `max_age` ago; returns how many went
    pub async fn sweep(&self, max_age: Duration) -> usize {
        let now = Instant::now();
        let mut sessions = self.sessions.lock().await;
        let before = sessions.len();
        sessions.retain(|_, s| now.duration_since(s.created_at) <= max_age);
        before - sessions.len()
    }

    pub async fn len(&self) -> usize {
        self.sessions.lock().await.len()
    }
}

/// The two independent registries, one per session-tracked job kind
#[derive(Clone)]
pub struct Sessions {
    pub trim: Arc<SessionStore<TrimState>>,
    pub merge: Arc<SessionStore<MergeState>>,
}

impl Sessions {
    pub fn new() -> Self {
        Self {
            trim: Arc::new(SessionStore::new("trim")),
            merge: Arc::new(SessionStore::new("merge")),
        }
    }

    /// Expire old sessions in both registries, one lock at a time
    pub async fn sweep(&self, max_age: Duration) -> usize {
        let trims = self.trim.sweep(max_age).await;
        let merges = self.merge.sweep(max_age).await;
        if trims + merges > 0 {
            info!("Expired {} trim and {} merge sessions", trims, merges);
        }
        trims + merges
    }
}

impl Default for Sessions {
    fn default() -> Self {
        Self::new()
    }
}

/// Periodically expire sessions until `shutdown` is cancelled
pub fn spawn_sweeper(
    sessions: Sessions,
    every: Duration,
    max_age: Duration,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!(
            "Session sweeper started (every {}s, max age {}s)",
            every.as_secs(),
            max_age.as_secs()
        );
        let mut ticker = tokio::time::interval_at(Instant::now() + every, every);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    sessions.sweep(max_age).await;
                }
                _ = shutdown.cancelled() => break,
            }
        }

        info!("Session sweeper stopped");
    })
}
