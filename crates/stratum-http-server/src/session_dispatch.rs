//! Per-session dispatch: direct responses first, then whatever the session
//! had pending, encoded as one response body.

use std::sync::Arc;

use tracing::{debug, error, warn};

use stratum_json_rpc::batch::SERIALIZATION_FALLBACK;
use stratum_json_rpc::{
    DispatchOutcome, JsonRpcDispatcher, JsonRpcMessage, MethodError, SessionContext,
    encode_response_body, serialize_messages,
};
use stratum_session_storage::{BoxedSessionStorage, SessionStorageError};

use crate::notification_bridge::StorageOutbox;

/// Couples the JSON-RPC dispatcher with the session store
#[derive(Clone)]
pub struct SessionDispatcher {
    dispatcher: Arc<JsonRpcDispatcher<MethodError>>,
    storage: Arc<BoxedSessionStorage>,
}

impl SessionDispatcher {
    pub fn new(
        dispatcher: Arc<JsonRpcDispatcher<MethodError>>,
        storage: Arc<BoxedSessionStorage>,
    ) -> Self {
        Self {
            dispatcher,
            storage,
        }
    }

    pub fn dispatcher(&self) -> &Arc<JsonRpcDispatcher<MethodError>> {
        &self.dispatcher
    }

    /// Context handed to handlers, with pushes routed to the session's queue
    pub fn session_context(&self, session_id: &str) -> SessionContext {
        SessionContext::new(session_id).with_outbox(Arc::new(StorageOutbox::new(
            session_id,
            Arc::clone(&self.storage),
        )))
    }

    /// Dispatch `raw` on behalf of `session_id` and produce the response body.
    ///
    /// An unparseable payload answers with its single parse fault and leaves
    /// the queue untouched.
    pub async fn dispatch(&self, session_id: &str, raw: &[u8]) -> String {
        let session = self.session_context(session_id);

        let responses = match self.dispatcher.dispatch_payload(raw, &session).await {
            DispatchOutcome::Entries(responses) => responses,
            DispatchOutcome::Malformed(fault) => {
                return encode_response_body(&serialize_messages(&[JsonRpcMessage::from(fault)]));
            }
        };

        let mut items = serialize_messages(&responses);
        items.extend(self.drain(session_id).await);
        encode_response_body(&items)
    }

    async fn drain(&self, session_id: &str) -> Vec<String> {
        let pending = match self.storage.poll(session_id).await {
            Ok(pending) => pending,
            Err(SessionStorageError::SessionNotFound(_)) => {
                debug!("Session {} vanished before its queue was drained", session_id);
                return Vec::new();
            }
            Err(err) => {
                warn!("Failed to drain session {}: {}", session_id, err);
                return Vec::new();
            }
        };

        pending
            .iter()
            .map(|message| {
                serde_json::to_string(message).unwrap_or_else(|err| {
                    error!("Failed to serialize queued message: {}", err);
                    SERIALIZATION_FALLBACK.to_string()
                })
            })
            .collect()
    }
}
