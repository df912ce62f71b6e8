//! Process-wide session registry with optional file persistence.

use cadence_core::context::ContextMap;
use cadence_core::error::SessionError;
use cadence_core::message::ConversationMessage;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::session::ConversationSession;
use crate::store::SessionStore;

/// Shared handle to a live session.
///
/// The manager keeps one handle per session; agents and tool executors hold
/// clones while they work on it.
pub type SessionHandle = Arc<RwLock<ConversationSession>>;

/// Owns every live session, optionally mirrored to a [`SessionStore`].
///
/// Safe for concurrent create/get/update/delete from independent workflow
/// runs. Concurrent writes to the *same* session are last-writer-wins.
#[derive(Debug, Default)]
pub struct SessionManager {
    sessions: RwLock<HashMap<String, SessionHandle>>,
    store: Option<SessionStore>,
}

impl SessionManager {
    /// An in-memory manager.
    pub fn new() -> Self {
        Self::default()
    }

    /// A manager persisting every session to `store`.
    pub fn with_store(store: SessionStore) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            store: Some(store),
        }
    }

    pub fn store(&self) -> Option<&SessionStore> {
        self.store.as_ref()
    }

    /// Mint a new session, optionally seeded with a system message.
    pub async fn create_session(
        &self,
        provider_name: &str,
        model: Option<String>,
        context: ContextMap,
        system_prompt: Option<&str>,
    ) -> Result<SessionHandle, SessionError> {
        let mut session = ConversationSession::new(provider_name, model, context);
        if let Some(prompt) = system_prompt {
            session.add_message(ConversationMessage::system(prompt));
        }

        if let Some(store) = &self.store {
            store.save(&session).await?;
        }

        let session_id = session.session_id.clone();
        let handle = Arc::new(RwLock::new(session));
        self.sessions
            .write()
            .await
            .insert(session_id.clone(), handle.clone());

        info!(session_id = %session_id, provider = %provider_name, "Session created");
        Ok(handle)
    }

    /// Look up a session, rehydrating it from the store on a memory miss.
    pub async fn get_session(&self, session_id: &str) -> Result<SessionHandle, SessionError> {
        if let Some(handle) = self.sessions.read().await.get(session_id) {
            return Ok(handle.clone());
        }

        self.load_session(session_id).await
    }

    /// Rehydrate a session from the store, replacing nothing already live.
    pub async fn load_session(&self, session_id: &str) -> Result<SessionHandle, SessionError> {
        let Some(store) = &self.store else {
            return Err(SessionError::NotFound(session_id.to_string()));
        };

        let session = store
            .load(session_id)
            .await?
            .ok_or_else(|| SessionError::NotFound(session_id.to_string()))?;

        debug!(session_id = %session_id, "Session loaded from store");
        let mut sessions = self.sessions.write().await;
        // Another task may have loaded it while we were reading the file
        let handle = sessions
            .entry(session_id.to_string())
            .or_insert_with(|| Arc::new(RwLock::new(session)))
            .clone();
        Ok(handle)
    }

    /// Persist the current state of a session.
    pub async fn update_session(&self, handle: &SessionHandle) -> Result<(), SessionError> {
        let snapshot = handle.read().await.clone();

        self.sessions
            .write()
            .await
            .entry(snapshot.session_id.clone())
            .or_insert_with(|| handle.clone());

        if let Some(store) = &self.store {
            store.save(&snapshot).await?;
        }
        Ok(())
    }

    /// Remove a session from memory and from the store.
    pub async fn delete_session(&self, session_id: &str) -> Result<(), SessionError> {
        let in_memory = self.sessions.write().await.remove(session_id).is_some();
        let on_disk = match &self.store {
            Some(store) => store.delete(session_id).await?,
            None => false,
        };

        if !in_memory && !on_disk {
            return Err(SessionError::NotFound(session_id.to_string()));
        }
        info!(session_id = %session_id, "Session deleted");
        Ok(())
    }

    /// Every known session, live ones taking precedence over their persisted
    /// copy, oldest first.
    pub async fn list_sessions(&self) -> Result<Vec<ConversationSession>, SessionError> {
        let mut by_id: HashMap<String, ConversationSession> = HashMap::new();

        if let Some(store) = &self.store {
            for session in store.list().await? {
                by_id.insert(session.session_id.clone(), session);
            }
        }

        let handles: Vec<SessionHandle> = self.sessions.read().await.values().cloned().collect();
        for handle in handles {
            let session = handle.read().await.clone();
            by_id.insert(session.session_id.clone(), session);
        }

        let mut sessions: Vec<ConversationSession> = by_id.into_values().collect();
        sessions.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(sessions)
    }

    /// Number of live (in-memory) sessions.
    pub async fn live_count(&self) -> usize {
        self.sessions.read().await.len()
    }
}
