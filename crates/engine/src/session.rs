use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::info;

use crate::process::EngineHandle;

/// Name of the built-in opponent: the engine plays for itself.
pub const ENGINE_OPPONENT: &str = "gnubg";

/// Identifies one game by its player pairing. Lookup matches either side.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionKey {
    pub challenger: String,
    pub opponent: String,
}

impl SessionKey {
    pub fn new(challenger: impl Into<String>, opponent: impl Into<String>) -> Self {
        Self { challenger: challenger.into(), opponent: opponent.into() }
    }

    pub fn involves(&self, player: &str) -> bool {
        self.challenger == player || self.opponent == player
    }

    pub fn opponent_of(&self, player: &str) -> Option<&str> {
        if self.challenger == player {
            Some(&self.opponent)
        } else if self.opponent == player {
            Some(&self.challenger)
        } else {
            None
        }
    }
}

/// One in-progress game and its exclusively-owned engine subprocess.
///
/// The registry lock is only held for map access; the per-session mutex
/// serializes command exchanges, preserving arrival order within a session.
#[derive(Clone)]
pub struct ActiveSession {
    pub key: SessionKey,
    pub created_at: DateTime<Utc>,
    pub handle: Arc<Mutex<Box<dyn EngineHandle>>>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("session limit of {max} reached")]
    Capacity { max: usize },
    #[error("`{player}` already has an active session")]
    AlreadyPlaying { player: String },
}

impl From<SessionError> for gammon_core::errors::RelayError {
    fn from(value: SessionError) -> Self {
        match value {
            SessionError::Capacity { max } => Self::Capacity { max },
            SessionError::AlreadyPlaying { player } => Self::AlreadyPlaying { player },
        }
    }
}

/// Explicitly owned, synchronized table of active sessions.
///
/// This is the sole admission-control mechanism: `insert` is the
/// authoritative capacity check, so the number of live sessions can never
/// exceed `max_games` no matter how requests interleave.
pub struct SessionRegistry {
    max_games: usize,
    sessions: Mutex<HashMap<SessionKey, ActiveSession>>,
}

impl SessionRegistry {
    pub fn new(max_games: usize) -> Self {
        Self { max_games, sessions: Mutex::new(HashMap::new()) }
    }

    pub fn max_games(&self) -> usize {
        self.max_games
    }

    pub async fn len(&self) -> usize {
        self.sessions.lock().await.len()
    }

    /// Advisory pre-check so callers can avoid spawning a subprocess that
    /// `insert` would reject anyway. `insert` remains authoritative.
    pub async fn check_admission(&self, key: &SessionKey) -> Result<(), SessionError> {
        let sessions = self.sessions.lock().await;
        admission_error(&sessions, self.max_games, key).map_or(Ok(()), Err)
    }

    /// Admit a new session, taking ownership of its engine handle. A handle
    /// rejected here is terminated before the error is returned.
    pub async fn insert(
        &self,
        key: SessionKey,
        handle: Box<dyn EngineHandle>,
    ) -> Result<ActiveSession, SessionError> {
        let rejection = {
            let mut sessions = self.sessions.lock().await;
            match admission_error(&sessions, self.max_games, &key) {
                Some(error) => error,
                None => {
                    let session = ActiveSession {
                        key: key.clone(),
                        created_at: Utc::now(),
                        handle: Arc::new(Mutex::new(handle)),
                    };
                    sessions.insert(key.clone(), session.clone());
                    info!(
                        event_name = "relay.registry.session_added",
                        challenger = %key.challenger,
                        opponent = %key.opponent,
                        active = sessions.len(),
                        max_games = self.max_games,
                        "session admitted"
                    );
                    return Ok(session);
                }
            }
        };

        let mut handle = handle;
        handle.terminate().await;
        Err(rejection)
    }

    pub async fn find(&self, player: &str) -> Option<ActiveSession> {
        let sessions = self.sessions.lock().await;
        sessions.values().find(|session| session.key.involves(player)).cloned()
    }

    /// Remove the session involving `player`, freeing its capacity slot. The
    /// caller is responsible for terminating the returned handle.
    pub async fn remove(&self, player: &str) -> Option<ActiveSession> {
        let mut sessions = self.sessions.lock().await;
        let key = sessions.keys().find(|key| key.involves(player)).cloned()?;
        let session = sessions.remove(&key);
        info!(
            event_name = "relay.registry.session_removed",
            challenger = %key.challenger,
            opponent = %key.opponent,
            active = sessions.len(),
            "session removed"
        );
        session
    }

    /// Active pairings, sorted for stable presentation.
    pub async fn snapshot(&self) -> Vec<SessionKey> {
        let sessions = self.sessions.lock().await;
        let mut keys: Vec<SessionKey> = sessions.keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Terminate every session. Used on relay shutdown.
    pub async fn shutdown(&self) {
        let drained: Vec<ActiveSession> = {
            let mut sessions = self.sessions.lock().await;
            sessions.drain().map(|(_, session)| session).collect()
        };

        for session in drained {
            session.handle.lock().await.terminate().await;
        }
    }
}

fn admission_error(
    sessions: &HashMap<SessionKey, ActiveSession>,
    max_games: usize,
    key: &SessionKey,
) -> Option<SessionError> {
    for player in [key.challenger.as_str(), key.opponent.as_str()] {
        if player != ENGINE_OPPONENT && sessions.keys().any(|existing| existing.involves(player)) {
            return Some(SessionError::AlreadyPlaying { player: player.to_owned() });
        }
    }

    if sessions.len() >= max_games {
        return Some(SessionError::Capacity { max: max_games });
    }

    None
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    use async_trait::async_trait;

    use super::{SessionError, SessionKey, SessionRegistry, ENGINE_OPPONENT};
    use crate::process::{EngineError, EngineHandle};

    struct StubHandle {
        terminated: Arc<AtomicBool>,
    }

    #[async_trait]
    impl EngineHandle for StubHandle {
        async fn exchange(&mut self, _command: &str) -> Result<String, EngineError> {
            Ok(String::new())
        }

        async fn terminate(&mut self) {
            self.terminated.store(true, Ordering::SeqCst);
        }
    }

    fn stub() -> (Box<dyn EngineHandle>, Arc<AtomicBool>) {
        let terminated = Arc::new(AtomicBool::new(false));
        (Box::new(StubHandle { terminated: Arc::clone(&terminated) }), terminated)
    }

    #[tokio::test]
    async fn capacity_is_enforced_and_rejected_handles_are_terminated() {
        let registry = SessionRegistry::new(1);

        let (first, _) = stub();
        registry
            .insert(SessionKey::new("austin", ENGINE_OPPONENT), first)
            .await
            .expect("first session fits");

        let (second, second_terminated) = stub();
        let error = registry
            .insert(SessionKey::new("blair", ENGINE_OPPONENT), second)
            .await
            .err()
            .expect("second session must be rejected");

        assert_eq!(error, SessionError::Capacity { max: 1 });
        assert!(second_terminated.load(Ordering::SeqCst), "rejected handle must be terminated");
        assert_eq!(registry.len().await, 1);
    }

    #[tokio::test]
    async fn a_player_cannot_join_two_games() {
        let registry = SessionRegistry::new(4);

        let (first, _) = stub();
        registry
            .insert(SessionKey::new("austin", "blair"), first)
            .await
            .expect("first session fits");

        // austin as challenger, and blair challenged by someone else
        for key in [SessionKey::new("austin", ENGINE_OPPONENT), SessionKey::new("casey", "blair")] {
            let (handle, _) = stub();
            let error = registry.insert(key, handle).await.err().expect("must be rejected");
            assert!(matches!(error, SessionError::AlreadyPlaying { .. }));
        }

        assert_eq!(registry.len().await, 1);
    }

    #[tokio::test]
    async fn multiple_engine_games_may_run_concurrently() {
        let registry = SessionRegistry::new(2);

        for challenger in ["austin", "blair"] {
            let (handle, _) = stub();
            registry
                .insert(SessionKey::new(challenger, ENGINE_OPPONENT), handle)
                .await
                .expect("gnubg opponent does not count as a busy player");
        }

        assert_eq!(registry.len().await, 2);
    }

    #[tokio::test]
    async fn remove_frees_a_slot_for_the_next_game() {
        let registry = SessionRegistry::new(1);

        let (first, _) = stub();
        registry
            .insert(SessionKey::new("austin", "blair"), first)
            .await
            .expect("first session fits");

        // either participant can be used for lookup
        let session = registry.remove("blair").await.expect("session should be found");
        assert_eq!(session.key.opponent_of("blair"), Some("austin"));
        assert_eq!(registry.len().await, 0);

        let (next, _) = stub();
        registry
            .insert(SessionKey::new("casey", ENGINE_OPPONENT), next)
            .await
            .expect("freed slot should admit a new session");
    }

    #[tokio::test]
    async fn find_matches_either_participant() {
        let registry = SessionRegistry::new(1);
        let (handle, _) = stub();
        registry.insert(SessionKey::new("austin", "blair"), handle).await.expect("insert");

        assert!(registry.find("austin").await.is_some());
        assert!(registry.find("blair").await.is_some());
        assert!(registry.find("casey").await.is_none());
    }

    #[tokio::test]
    async fn shutdown_terminates_every_session() {
        let registry = SessionRegistry::new(2);

        let (first, first_terminated) = stub();
        let (second, second_terminated) = stub();
        registry.insert(SessionKey::new("austin", ENGINE_OPPONENT), first).await.expect("insert");
        registry.insert(SessionKey::new("blair", ENGINE_OPPONENT), second).await.expect("insert");

        registry.shutdown().await;

        assert!(first_terminated.load(Ordering::SeqCst));
        assert!(second_terminated.load(Ordering::SeqCst));
        assert_eq!(registry.len().await, 0);
    }

    #[tokio::test]
    async fn snapshot_is_sorted_for_stable_output() {
        let registry = SessionRegistry::new(3);
        for challenger in ["casey", "austin", "blair"] {
            let (handle, _) = stub();
            registry
                .insert(SessionKey::new(challenger, ENGINE_OPPONENT), handle)
                .await
                .expect("insert");
        }

        let names: Vec<String> =
            registry.snapshot().await.into_iter().map(|key| key.challenger).collect();
        assert_eq!(names, ["austin", "blair", "casey"]);
    }
}
