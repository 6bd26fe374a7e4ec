//! In-Memory Session Storage Implementation
//!
//! Sessions live in an `Arc<RwLock<HashMap>>`; each session's queue sits
//! behind its own mutex so enqueue and poll on different sessions never
//! contend. Everything is lost when the process exits.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::SystemTime;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::{
    SessionInfo, SessionResolution, SessionStorage, SessionStorageError, is_well_formed_session_id,
    new_session_id,
};

/// Configuration for in-memory session storage
#[derive(Debug, Clone)]
pub struct InMemoryConfig {
    /// Maximum sessions to keep (for memory management)
    pub max_sessions: usize,
    /// Maximum queued messages per session before pushes are refused
    pub max_pending_per_session: usize,
    /// Re-create an unknown but well-formed cookie id instead of issuing a new one.
    /// Keeps clients pinned to the same id across a restart.
    pub adopt_stale_ids: bool,
}

impl Default for InMemoryConfig {
    fn default() -> Self {
        Self {
            max_sessions: 100_000,          // 100k concurrent sessions
            max_pending_per_session: 10_000, // 10k queued pushes per session
            adopt_stale_ids: true,
        }
    }
}

/// Statistics for in-memory storage
#[derive(Debug, Clone)]
pub struct InMemoryStats {
    pub session_count: usize,
    pub total_pending: usize,
    pub max_sessions: usize,
    pub max_pending_per_session: usize,
}

struct SessionEntry {
    created_at: u64,
    last_activity: AtomicU64,
    pending: Mutex<VecDeque<Value>>,
}

impl SessionEntry {
    fn new() -> Self {
        let now = now_millis();
        Self {
            created_at: now,
            last_activity: AtomicU64::new(now),
            pending: Mutex::new(VecDeque::new()),
        }
    }

    fn touch(&self) {
        self.last_activity.store(now_millis(), Ordering::Relaxed);
    }

    fn info(&self, session_id: &str) -> SessionInfo {
        SessionInfo {
            session_id: session_id.to_string(),
            created_at: self.created_at,
            last_activity: self.last_activity.load(Ordering::Relaxed),
            pending: self.pending.lock().len(),
        }
    }
}

fn now_millis() -> u64 {
    chrono::Utc::now().timestamp_millis() as u64
}

/// In-memory storage for sessions and their pending queues
#[derive(Clone)]
pub struct InMemorySessionStorage {
    /// All sessions by session ID
    sessions: Arc<RwLock<HashMap<String, Arc<SessionEntry>>>>,
    /// Configuration
    config: InMemoryConfig,
}

impl std::fmt::Debug for InMemorySessionStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemorySessionStorage")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Default for InMemorySessionStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemorySessionStorage {
    /// Create new in-memory session storage with default configuration
    pub fn new() -> Self {
        Self::with_config(InMemoryConfig::default())
    }

    /// Create new in-memory session storage with custom configuration
    pub fn with_config(config: InMemoryConfig) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            config,
        }
    }

    pub fn config(&self) -> &InMemoryConfig {
        &self.config
    }

    /// Get current statistics
    pub async fn stats(&self) -> InMemoryStats {
        let sessions = self.sessions.read().await;
        InMemoryStats {
            session_count: sessions.len(),
            total_pending: sessions.values().map(|e| e.pending.lock().len()).sum(),
            max_sessions: self.config.max_sessions,
            max_pending_per_session: self.config.max_pending_per_session,
        }
    }

    async fn entry(&self, session_id: &str) -> Result<Arc<SessionEntry>, SessionStorageError> {
        let sessions = self.sessions.read().await;
        sessions
            .get(session_id)
            .cloned()
            .ok_or_else(|| SessionStorageError::SessionNotFound(session_id.to_string()))
    }

    fn insert_locked(
        &self,
        sessions: &mut HashMap<String, Arc<SessionEntry>>,
        session_id: String,
    ) -> Result<SessionInfo, SessionStorageError> {
        if sessions.len() >= self.config.max_sessions {
            warn!(
                "Refusing new session, limit of {} reached",
                self.config.max_sessions
            );
            return Err(SessionStorageError::MaxSessionsReached(self.config.max_sessions));
        }
        let entry = Arc::new(SessionEntry::new());
        let info = entry.info(&session_id);
        sessions.insert(session_id, entry);
        Ok(info)
    }
}

#[async_trait]
impl SessionStorage for InMemorySessionStorage {
    type Error = SessionStorageError;

    fn backend_name(&self) -> &'static str {
        "InMemory"
    }

    // ============================================================================
    // Session Management
    // ============================================================================

    async fn create_session(&self) -> Result<SessionInfo, Self::Error> {
        let mut sessions = self.sessions.write().await;
        let mut session_id = new_session_id();
        while sessions.contains_key(&session_id) {
            session_id = new_session_id();
        }
        let info = self.insert_locked(&mut sessions, session_id)?;
        debug!("Created session: {}", info.session_id);
        Ok(info)
    }

    async fn create_session_with_id(&self, session_id: String) -> Result<SessionInfo, Self::Error> {
        let mut sessions = self.sessions.write().await;
        if let Some(existing) = sessions.get(&session_id) {
            return Ok(existing.info(&session_id));
        }
        let info = self.insert_locked(&mut sessions, session_id)?;
        debug!("Created session with ID: {}", info.session_id);
        Ok(info)
    }

    async fn resolve_session(
        &self,
        presented: Option<&str>,
    ) -> Result<SessionResolution, Self::Error> {
        if let Some(id) = presented {
            let sessions = self.sessions.read().await;
            if let Some(entry) = sessions.get(id) {
                entry.touch();
                return Ok(SessionResolution {
                    session: entry.info(id),
                    created: false,
                });
            }
        }

        let mut sessions = self.sessions.write().await;

        if let Some(id) = presented {
            // Another request may have created it between the two locks
            if let Some(entry) = sessions.get(id) {
                entry.touch();
                return Ok(SessionResolution {
                    session: entry.info(id),
                    created: false,
                });
            }
            if self.config.adopt_stale_ids && is_well_formed_session_id(id) {
                let session = self.insert_locked(&mut sessions, id.to_string())?;
                debug!("Adopted stale session id: {}", id);
                return Ok(SessionResolution {
                    session,
                    created: true,
                });
            }
            debug!("Ignoring unrecognised session cookie");
        }

        let mut session_id = new_session_id();
        while sessions.contains_key(&session_id) {
            session_id = new_session_id();
        }
        let session = self.insert_locked(&mut sessions, session_id)?;
        debug!("Created session: {}", session.session_id);
        Ok(SessionResolution {
            session,
            created: true,
        })
    }

    async fn get_session(&self, session_id: &str) -> Result<Option<SessionInfo>, Self::Error> {
        let sessions = self.sessions.read().await;
        Ok(sessions.get(session_id).map(|entry| entry.info(session_id)))
    }

    async fn delete_session(&self, session_id: &str) -> Result<bool, Self::Error> {
        let mut sessions = self.sessions.write().await;
        let removed = sessions.remove(session_id).is_some();
        if removed {
            debug!("Deleted session: {}", session_id);
        }
        Ok(removed)
    }

    async fn list_sessions(&self) -> Result<Vec<String>, Self::Error> {
        let sessions = self.sessions.read().await;
        Ok(sessions.keys().cloned().collect())
    }

    // ============================================================================
    // Pending Queue
    // ============================================================================

    async fn enqueue(&self, session_id: &str, message: Value) -> Result<usize, Self::Error> {
        let entry = self.entry(session_id).await?;
        let mut pending = entry.pending.lock();
        if pending.len() >= self.config.max_pending_per_session {
            return Err(SessionStorageError::MaxPendingReached {
                session_id: session_id.to_string(),
                limit: self.config.max_pending_per_session,
            });
        }
        pending.push_back(message);
        Ok(pending.len())
    }

    async fn poll(&self, session_id: &str) -> Result<Vec<Value>, Self::Error> {
        let entry = self.entry(session_id).await?;
        entry.touch();
        let drained = std::mem::take(&mut *entry.pending.lock());
        if !drained.is_empty() {
            debug!(
                "Drained {} pending messages for session {}",
                drained.len(),
                session_id
            );
        }
        Ok(drained.into())
    }

    // ============================================================================
    // Cleanup and Maintenance
    // ============================================================================

    async fn expire_sessions(&self, older_than: SystemTime) -> Result<Vec<String>, Self::Error> {
        let mut sessions = self.sessions.write().await;

        let cutoff_millis = older_than
            .duration_since(SystemTime::UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64;

        let mut expired_sessions = Vec::new();
        sessions.retain(|session_id, entry| {
            if entry.last_activity.load(Ordering::Relaxed) < cutoff_millis {
                expired_sessions.push(session_id.clone());
                false
            } else {
                true
            }
        });

        if !expired_sessions.is_empty() {
            info!("Expired {} sessions", expired_sessions.len());
        }

        Ok(expired_sessions)
    }

    async fn session_count(&self) -> Result<usize, Self::Error> {
        let sessions = self.sessions.read().await;
        Ok(sessions.len())
    }

    async fn pending_count(&self) -> Result<usize, Self::Error> {
        let sessions = self.sessions.read().await;
        Ok(sessions.values().map(|e| e.pending.lock().len()).sum())
    }
}
