//! Session Storage Trait
//!
//! A session is an opaque identifier (the `SESSION` cookie value) plus an
//! ordered queue of wire-ready messages waiting for the client's next poll.
//! Backends must make [`SessionStorage::poll`] an atomic take-and-clear with
//! respect to concurrent [`SessionStorage::enqueue`] calls.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::SystemTime;
use uuid::Uuid;

/// Length of identifiers produced by [`new_session_id`]
pub const SESSION_ID_LEN: usize = 32;

/// Generate a fresh session identifier (UUID v4, 32 lowercase hex characters)
pub fn new_session_id() -> String {
    Uuid::new_v4().simple().to_string()
}

/// Whether `candidate` has the shape of an identifier this crate would issue
pub fn is_well_formed_session_id(candidate: &str) -> bool {
    candidate.len() == SESSION_ID_LEN
        && candidate
            .bytes()
            .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
}

/// Snapshot of a session's bookkeeping
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionInfo {
    /// Opaque session identifier
    pub session_id: String,
    /// Session creation timestamp (Unix millis)
    pub created_at: u64,
    /// Last activity timestamp (Unix millis)
    pub last_activity: u64,
    /// Number of messages waiting for the next poll
    pub pending: usize,
}

impl Default for SessionInfo {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionInfo {
    /// Create a new session with a random identifier
    pub fn new() -> Self {
        Self::with_id(new_session_id())
    }

    /// Create session with specific ID
    pub fn with_id(session_id: String) -> Self {
        let now = chrono::Utc::now().timestamp_millis() as u64;
        Self {
            session_id,
            created_at: now,
            last_activity: now,
            pending: 0,
        }
    }

    /// Update last activity timestamp
    pub fn touch(&mut self) {
        self.last_activity = chrono::Utc::now().timestamp_millis() as u64;
    }

    /// Check if session is expired based on timeout
    pub fn is_expired(&self, timeout_minutes: u64) -> bool {
        let now = chrono::Utc::now().timestamp_millis() as u64;
        let timeout_millis = timeout_minutes.saturating_mul(60 * 1000);
        now.saturating_sub(self.last_activity) > timeout_millis
    }
}

/// Outcome of mapping a cookie value to a session
#[derive(Debug, Clone)]
pub struct SessionResolution {
    pub session: SessionInfo,
    /// `true` when the session did not exist before this call
    pub created: bool,
}

/// Core trait for session storage backends
#[async_trait]
pub trait SessionStorage: Send + Sync {
    /// Error type for storage operations
    type Error: std::error::Error + Send + Sync + 'static;

    /// Get the backend name for logging and debugging
    fn backend_name(&self) -> &'static str;

    // ============================================================================
    // Session Management
    // ============================================================================

    /// Create a new session with a generated identifier and an empty queue
    async fn create_session(&self) -> Result<SessionInfo, Self::Error>;

    /// Create session with a specific session ID
    async fn create_session_with_id(&self, session_id: String) -> Result<SessionInfo, Self::Error>;

    /// Map an optional cookie value to a live session.
    ///
    /// Never fails because the presented id is unknown: a stale or forged id
    /// yields a session all the same. Lookup and creation happen under one
    /// critical section, so concurrent requests carrying the same stale id
    /// end up sharing one session.
    async fn resolve_session(&self, presented: Option<&str>)
    -> Result<SessionResolution, Self::Error>;

    /// Get session by ID
    async fn get_session(&self, session_id: &str) -> Result<Option<SessionInfo>, Self::Error>;

    /// Delete session completely
    async fn delete_session(&self, session_id: &str) -> Result<bool, Self::Error>;

    /// List all session IDs
    async fn list_sessions(&self) -> Result<Vec<String>, Self::Error>;

    // ============================================================================
    // Pending Queue
    // ============================================================================

    /// Append a message to the session's queue. Returns the new queue length.
    async fn enqueue(&self, session_id: &str, message: Value) -> Result<usize, Self::Error>;

    /// Atomically take every queued message, oldest first, leaving the queue empty
    async fn poll(&self, session_id: &str) -> Result<Vec<Value>, Self::Error>;

    // ============================================================================
    // Cleanup and Maintenance
    // ============================================================================

    /// Remove sessions idle since before `older_than` (returns removed IDs)
    async fn expire_sessions(&self, older_than: SystemTime) -> Result<Vec<String>, Self::Error>;

    /// Get session count for monitoring
    async fn session_count(&self) -> Result<usize, Self::Error>;

    /// Total queued messages across all sessions
    async fn pending_count(&self) -> Result<usize, Self::Error>;
}

/// Unified error type for session storage backends
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionStorageError {
    #[error("Session not found: {0}")]
    SessionNotFound(String),

    #[error("Maximum sessions limit reached: {0}")]
    MaxSessionsReached(usize),

    #[error("Pending queue of session {session_id} is full ({limit} messages)")]
    MaxPendingReached { session_id: String, limit: usize },

    #[error("Generic storage error: {0}")]
    Generic(String),
}

/// Type-erased storage handle shared by the server, the dispatcher and backend outboxes
pub type BoxedSessionStorage = dyn SessionStorage<Error = SessionStorageError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_ids_are_well_formed() {
        let id = new_session_id();
        assert_eq!(id.len(), SESSION_ID_LEN);
        assert!(is_well_formed_session_id(&id));
        assert_ne!(id, new_session_id());
    }

    #[test]
    fn test_malformed_ids() {
        assert!(!is_well_formed_session_id(""));
        assert!(!is_well_formed_session_id("abc"));
        assert!(!is_well_formed_session_id(&"A".repeat(SESSION_ID_LEN)));
        assert!(!is_well_formed_session_id(&"g".repeat(SESSION_ID_LEN)));
        assert!(!is_well_formed_session_id(&"0".repeat(SESSION_ID_LEN + 1)));
        assert!(is_well_formed_session_id(&"0".repeat(SESSION_ID_LEN)));
    }

    #[test]
    fn test_expiry() {
        let mut info = SessionInfo::with_id("s".to_string());
        assert!(!info.is_expired(1));
        info.last_activity -= 2 * 60 * 1000;
        assert!(info.is_expired(1));
        info.touch();
        assert!(!info.is_expired(1));
    }

    #[test]
    fn test_huge_timeout_never_expires() {
        let mut info = SessionInfo::with_id("s".to_string());
        info.last_activity = 0;
        assert!(!info.is_expired(u64::MAX));
    }
}
