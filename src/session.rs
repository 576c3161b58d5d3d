//! Live session tracking.
//!
//! Maps connection/session identifiers to usernames. The transport
//! layer calls [`SessionTracker::remove_session`] when a connection
//! drops, which frees every cell lock the departed user was holding.
//! Without this, a crashed client would pin its rows until TTL expiry.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tracing::info;
use uuid::Uuid;

use crate::registry::CellLockRegistry;

/// Tracks which user is behind each live session.
pub struct SessionTracker {
    locks: Arc<CellLockRegistry>,
    sessions: Mutex<HashMap<String, String>>,
}

impl SessionTracker {
    pub fn new(locks: Arc<CellLockRegistry>) -> Self {
        Self {
            locks,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// Register a session under an externally supplied identifier
    /// (the transport owns session ids).
    pub fn add_session(&self, session_id: impl Into<String>, username: impl Into<String>) {
        let session_id = session_id.into();
        let username = username.into();
        info!(user = %username, "connect");
        self.sessions.lock().unwrap().insert(session_id, username);
    }

    /// Start a session with a freshly minted id, for callers that have
    /// no transport-provided identifier.
    pub fn begin(&self, username: impl Into<String>) -> String {
        let session_id = Uuid::new_v4().to_string();
        self.add_session(session_id.clone(), username);
        session_id
    }

    /// Drop a session and free every lock its user held. Returns the
    /// username, or `None` for an unknown session id.
    pub fn remove_session(&self, session_id: &str) -> Option<String> {
        let username = self.sessions.lock().unwrap().remove(session_id)?;
        let released = self.locks.release_all_by_owner(&username);
        info!(user = %username, released, "disconnect");
        Some(username)
    }

    /// Username behind a session id.
    pub fn user(&self, session_id: &str) -> Option<String> {
        self.sessions.lock().unwrap().get(session_id).cloned()
    }

    /// Whether the user has at least one live session.
    pub fn is_connected(&self, username: &str) -> bool {
        self.sessions
            .lock()
            .unwrap()
            .values()
            .any(|user| user == username)
    }

    /// Number of live sessions.
    pub fn len(&self) -> usize {
        self.sessions.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
