//! Live sessions keyed by their join code.

use std::{
    sync::Arc,
    time::{Duration, SystemTime},
};

use dashmap::{DashMap, mapref::entry::Entry};
use rand::Rng;
use tokio::sync::{mpsc, oneshot, watch};
use tracing::info;

use crate::{
    error::ServiceError,
    state::{
        driver::SceneDriver,
        hub::{Hub, HubCommand},
        question::Question,
        scene::SceneProgress,
        session::Session,
    },
};

/// Characters used in join codes; look-alikes (`I`, `O`, `0`) are left out.
pub const CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ123456789";
const HUB_QUEUE_CAPACITY: usize = 64;

/// Cheap handle on a running session.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    code: String,
    created_at: SystemTime,
    commands: mpsc::Sender<HubCommand>,
    progress: watch::Receiver<SceneProgress>,
}

impl SessionHandle {
    /// Join code.
    pub fn code(&self) -> &str {
        &self.code
    }

    /// Creation time.
    pub fn created_at(&self) -> SystemTime {
        self.created_at
    }

    /// Latest progress published by the scene driver.
    pub fn progress(&self) -> SceneProgress {
        *self.progress.borrow()
    }

    /// Whether the session still accepts participants.
    pub fn is_alive(&self) -> bool {
        self.progress.borrow().alive && !self.commands.is_closed()
    }

    /// Queue a command for the hub.
    pub async fn send(&self, command: HubCommand) -> Result<(), ServiceError> {
        self.commands
            .send(command)
            .await
            .map_err(|_| ServiceError::Unavailable(format!("session {} has ended", self.code)))
    }

    /// Names of the connected participants.
    pub async fn roster(&self) -> Result<Vec<String>, ServiceError> {
        let (reply, names) = oneshot::channel();
        self.send(HubCommand::Roster { reply }).await?;
        names
            .await
            .map_err(|_| ServiceError::Unavailable(format!("session {} has ended", self.code)))
    }
}

/// Registry of every session known to the server.
#[derive(Debug, Clone)]
pub struct SessionRegistry {
    sessions: Arc<DashMap<String, SessionHandle>>,
    code_length: usize,
    reveal_dwell: Duration,
}

impl SessionRegistry {
    /// Empty registry generating `code_length` codes and holding reveals for `reveal_dwell`.
    pub fn new(code_length: usize, reveal_dwell: Duration) -> Self {
        Self {
            sessions: Arc::new(DashMap::new()),
            code_length: code_length.max(1),
            reveal_dwell,
        }
    }

    /// Start a session over `pool` and register it under a fresh code.
    pub fn create(&self, pool: Vec<Question>, target_question_count: usize) -> SessionHandle {
        let (commands, command_rx) = mpsc::channel(HUB_QUEUE_CAPACITY);
        let (progress_tx, progress) = watch::channel(SceneProgress::default());
        let (signals, signal_rx) = mpsc::unbounded_channel();

        let handle = loop {
            let code = generate_code(self.code_length);
            if let Entry::Vacant(slot) = self.sessions.entry(code.clone()) {
                let handle = SessionHandle {
                    code,
                    created_at: SystemTime::now(),
                    commands: commands.clone(),
                    progress: progress.clone(),
                };
                slot.insert(handle.clone());
                break handle;
            }
        };

        let session = Session::new(handle.code.clone(), pool, target_question_count);
        info!(
            session = %handle.code,
            questions = session.target_question_count(),
            "session created"
        );

        let hub = Hub::new(session, progress, command_rx, signals);
        let driver = SceneDriver::new(
            handle.code.clone(),
            progress_tx,
            commands,
            signal_rx,
            self.reveal_dwell,
        );
        tokio::spawn(hub.run());
        tokio::spawn(driver.run());

        handle
    }

    /// Look up a session by code.
    pub fn get(&self, code: &str) -> Option<SessionHandle> {
        self.sessions.get(code).map(|entry| entry.value().clone())
    }

    /// Forget a session and ask its hub to stop.
    pub fn remove(&self, code: &str) -> Option<SessionHandle> {
        let (_, handle) = self.sessions.remove(code)?;
        let _ = handle.commands.try_send(HubCommand::Terminate);
        info!(session = %code, "session removed");
        Some(handle)
    }

    /// Drop every session that is no longer alive; returns how many were removed.
    pub fn sweep(&self) -> usize {
        let before = self.sessions.len();
        self.sessions.retain(|code, handle| {
            let alive = handle.is_alive();
            if !alive {
                info!(session = %code, "session reclaimed");
            }
            alive
        });
        before.saturating_sub(self.sessions.len())
    }

    /// Number of registered sessions.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Whether no session is registered.
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

fn generate_code(length: usize) -> String {
    let mut rng = rand::rng();
    (0..length)
        .map(|_| CODE_ALPHABET[rng.random_range(0..CODE_ALPHABET.len())] as char)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> SessionRegistry {
        SessionRegistry::new(4, Duration::from_millis(10))
    }

    #[test]
    fn codes_use_the_unambiguous_alphabet() {
        for _ in 0..100 {
            let code = generate_code(6);
            assert_eq!(code.len(), 6);
            assert!(code.bytes().all(|b| CODE_ALPHABET.contains(&b)));
        }
    }

    #[tokio::test]
    async fn created_sessions_are_registered_and_alive() {
        let registry = registry();
        let first = registry.create(Vec::new(), 5);
        let second = registry.create(Vec::new(), 5);

        assert_ne!(first.code(), second.code());
        assert_eq!(registry.len(), 2);
        assert!(registry.get(first.code()).is_some_and(|h| h.is_alive()));
        assert_eq!(first.roster().await.unwrap(), Vec::<String>::new());
        assert_eq!(registry.sweep(), 0);
    }

    #[tokio::test]
    async fn sweep_removes_sessions_whose_hub_stopped() {
        let registry = registry();
        let ended = registry.create(Vec::new(), 5);
        let live = registry.create(Vec::new(), 5);

        ended.send(HubCommand::Terminate).await.unwrap();
        ended.commands.closed().await;

        assert!(!ended.is_alive());
        assert_eq!(registry.sweep(), 1);
        assert!(registry.get(ended.code()).is_none());
        assert!(registry.get(live.code()).is_some());
        assert!(ended.roster().await.is_err());
    }

    #[tokio::test]
    async fn remove_forgets_the_session() {
        let registry = registry();
        let handle = registry.create(Vec::new(), 1);
        assert!(registry.remove(handle.code()).is_some());
        assert!(registry.remove(handle.code()).is_none());
        assert!(registry.is_empty());
    }
}
