//! In-memory session store.
//!
//! Sessions are ephemeral: nothing is persisted and a session is gone once
//! ended or the process exits. A turn runs on a copy of the stored state
//! that replaces the original only when the turn completes, so a dropped
//! turn future leaves the session as it was.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::debug;

use super::orchestrator::{Orchestrator, ResponseBundle};
use crate::core::{Profile, SessionId, SessionState};
use crate::error::SessionError;

/// Sessions keyed by id, driven by one orchestrator.
#[derive(Debug)]
pub struct SessionStore {
    orchestrator: Arc<Orchestrator>,
    sessions: Mutex<HashMap<SessionId, SessionState>>,
}

impl SessionStore {
    /// Creates an empty store.
    pub fn new(orchestrator: Arc<Orchestrator>) -> Self {
        Self {
            orchestrator,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<SessionId, SessionState>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Starts a session for `profile`.
    pub fn start(&self, profile: Profile) -> SessionId {
        let state = SessionState::new(profile);
        let id = state.session_id;
        self.lock().insert(id, state);
        debug!(session = %id, "session started");
        id
    }

    /// Handles one user turn for session `id`.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::NotFound`] for an unknown or ended session,
    /// or [`SessionError::Malformed`] from the orchestrator.
    pub async fn handle_turn(
        &self,
        id: SessionId,
        text: &str,
    ) -> Result<ResponseBundle, SessionError> {
        let mut state = self
            .lock()
            .get(&id)
            .cloned()
            .ok_or_else(|| SessionError::NotFound {
                session_id: id.to_string(),
            })?;

        let bundle = self.orchestrator.step(&mut state, text).await?;

        // An ended session stays ended.
        if let Some(slot) = self.lock().get_mut(&id) {
            *slot = state;
        }
        Ok(bundle)
    }

    /// Ends session `id`, returning its final state.
    pub fn end(&self, id: SessionId) -> Option<SessionState> {
        let state = self.lock().remove(&id);
        if state.is_some() {
            debug!(session = %id, "session ended");
        }
        state
    }

    /// Returns a copy of session `id`.
    pub fn get(&self, id: SessionId) -> Option<SessionState> {
        self.lock().get(&id).cloned()
    }

    /// Number of live sessions.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether no session is live.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::config::EngineConfig;
    use crate::agent::prompt::PromptSet;
    use crate::core::DialogueState;
    use crate::knowledge::KnowledgeBase;

    fn store() -> SessionStore {
        let kb = KnowledgeBase::bundled().unwrap_or_else(|e| unreachable!("{e}"));
        let orch = Orchestrator::with_prompts(
            Arc::new(kb),
            None,
            EngineConfig::default(),
            PromptSet::defaults(),
        );
        SessionStore::new(Arc::new(orch))
    }

    #[tokio::test]
    async fn test_turns_are_written_back() {
        let store = store();
        let id = store.start(Profile::default());
        store
            .handle_turn(id, "I have a fever")
            .await
            .unwrap_or_else(|e| unreachable!("{e}"));
        let state = store.get(id).unwrap_or_else(|| unreachable!());
        assert_eq!(state.turn_history.len(), 2);
        assert_eq!(state.current_state, DialogueState::AwaitingAnswer);
    }

    #[tokio::test]
    async fn test_unknown_session() {
        let store = store();
        let id = uuid::Uuid::new_v4();
        assert!(matches!(
            store.handle_turn(id, "hi").await,
            Err(SessionError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_end_removes_session() {
        let store = store();
        let id = store.start(Profile::default());
        assert_eq!(store.len(), 1);
        assert!(store.end(id).is_some());
        assert!(store.is_empty());
        assert!(store.get(id).is_none());
        assert!(store.end(id).is_none());
    }

    #[tokio::test]
    async fn test_sessions_are_independent() {
        let store = store();
        let a = store.start(Profile::default());
        let b = store.start(Profile::with_age(80));
        store
            .handle_turn(a, "I have a rash")
            .await
            .unwrap_or_else(|e| unreachable!("{e}"));
        assert_eq!(store.get(b).map(|s| s.turn_history.len()), Some(0));
        assert_eq!(store.get(a).map(|s| s.turn_history.len()), Some(2));
    }

    #[tokio::test]
    async fn test_dropped_turn_leaves_state() {
        let store = store();
        let id = store.start(Profile::default());
        let before = store.get(id).map(|s| s.turn_history.len());
        drop(store.handle_turn(id, "fever"));
        assert_eq!(store.get(id).map(|s| s.turn_history.len()), before);
    }
}
