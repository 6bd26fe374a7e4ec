//! Notification Bridge - connects handler pushes to the session store
//!
//! Handlers push through [`SessionContext`](stratum_json_rpc::SessionContext);
//! this outbox appends to the session's pending queue, which the next HTTP
//! request on that session drains.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, warn};

use stratum_json_rpc::{OutboxError, SessionOutbox};
use stratum_session_storage::{BoxedSessionStorage, SessionStorageError};

/// Outbox writing into a [`SessionStorage`](stratum_session_storage::SessionStorage) queue
#[derive(Clone)]
pub struct StorageOutbox {
    session_id: String,
    storage: Arc<BoxedSessionStorage>,
}

impl StorageOutbox {
    pub fn new(session_id: impl Into<String>, storage: Arc<BoxedSessionStorage>) -> Self {
        Self {
            session_id: session_id.into(),
            storage,
        }
    }
}

#[async_trait]
impl SessionOutbox for StorageOutbox {
    fn session_id(&self) -> &str {
        &self.session_id
    }

    async fn push(&self, message: Value) -> Result<(), OutboxError> {
        match self.storage.enqueue(&self.session_id, message).await {
            Ok(depth) => {
                debug!("Queued message for session {} (depth {})", self.session_id, depth);
                Ok(())
            }
            Err(SessionStorageError::SessionNotFound(id)) => Err(OutboxError::SessionGone(id)),
            Err(SessionStorageError::MaxPendingReached { session_id, limit }) => {
                warn!(
                    "Dropping message for session {}: {} messages already pending",
                    session_id, limit
                );
                Err(OutboxError::Full { session_id, limit })
            }
            Err(err) => Err(OutboxError::Backend(err.to_string())),
        }
    }
}
