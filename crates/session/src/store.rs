//! File-backed session storage: one pretty-printed JSON file per session.
//!
//! Storage location: `<dir>/<session_id>.json`, where the directory comes
//! from `SessionConfig::resolved_dir` (`~/.cadence/sessions` by default).
//! Writes go to a temp file first and are renamed into place, so a crash
//! mid-write never leaves a half-written session behind.

use cadence_core::error::SessionError;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::session::ConversationSession;

const EXTENSION: &str = "json";

/// Directory of persisted sessions.
#[derive(Debug, Clone)]
pub struct SessionStore {
    dir: PathBuf,
}

impl SessionStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, session_id: &str) -> Result<PathBuf, SessionError> {
        let valid = !session_id.is_empty()
            && session_id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(SessionError::Storage(format!(
                "invalid session id '{session_id}'"
            )));
        }
        Ok(self.dir.join(format!("{session_id}.{EXTENSION}")))
    }

    /// Write a session, replacing any previous version.
    pub async fn save(&self, session: &ConversationSession) -> Result<(), SessionError> {
        let path = self.path_for(&session.session_id)?;

        tokio::fs::create_dir_all(&self.dir).await.map_err(|e| {
            SessionError::Storage(format!("Failed to create session directory: {e}"))
        })?;

        let content = serde_json::to_string_pretty(session)
            .map_err(|e| SessionError::Storage(format!("Failed to serialize session: {e}")))?;

        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, content)
            .await
            .map_err(|e| SessionError::Storage(format!("Failed to write session file: {e}")))?;
        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(|e| SessionError::Storage(format!("Failed to move session file: {e}")))?;

        debug!(session_id = %session.session_id, path = %path.display(), "Session saved");
        Ok(())
    }

    /// Read one session. `Ok(None)` when no file exists.
    pub async fn load(&self, session_id: &str) -> Result<Option<ConversationSession>, SessionError> {
        let path = self.path_for(session_id)?;
        let content = match tokio::fs::read_to_string(&path).await {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(SessionError::Storage(format!(
                    "Failed to read session file: {e}"
                )));
            }
        };

        serde_json::from_str(&content)
            .map(Some)
            .map_err(|e| SessionError::Corrupted {
                path: path.display().to_string(),
                reason: e.to_string(),
            })
    }

    /// Remove a session file. Returns whether a file was removed.
    pub async fn delete(&self, session_id: &str) -> Result<bool, SessionError> {
        let path = self.path_for(session_id)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(SessionError::Storage(format!(
                "Failed to delete session file: {e}"
            ))),
        }
    }

    /// Load every readable session. Malformed files are skipped.
    pub async fn list(&self) -> Result<Vec<ConversationSession>, SessionError> {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            // Directory doesn't exist yet: nothing persisted
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(SessionError::Storage(format!(
                    "Failed to read session directory: {e}"
                )));
            }
        };

        let mut sessions = Vec::new();
        loop {
            let entry = match entries.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(e) => {
                    warn!(error = %e, "Failed to read session directory entry");
                    continue;
                }
            };

            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(EXTENSION) {
                continue;
            }

            let content = match tokio::fs::read_to_string(&path).await {
                Ok(c) => c,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Skipping unreadable session file");
                    continue;
                }
            };

            match serde_json::from_str::<ConversationSession>(&content) {
                Ok(session) => sessions.push(session),
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Skipping corrupted session file");
                }
            }
        }

        sessions.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(sessions)
    }
}
