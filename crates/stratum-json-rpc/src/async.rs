use std::fmt;
use std::marker::PhantomData;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use futures::FutureExt;
use futures::future::BoxFuture;
use serde_json::Value;
use tracing::{debug, warn};

use crate::{
    error::{JsonRpcError, JsonRpcErrorObject, ToJsonRpcError},
    notification::JsonRpcNotification,
    registry::MethodRegistry,
    request::JsonRpcRequest,
    response::JsonRpcMessage,
    validate::validate_request,
};

/// Why a message could not be queued for a session
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OutboxError {
    #[error("Session not found: {0}")]
    SessionGone(String),

    #[error("Pending queue of session {session_id} is full ({limit} messages)")]
    Full { session_id: String, limit: usize },

    #[error("No outbox attached to this session context")]
    Detached,

    #[error("Outbox backend error: {0}")]
    Backend(String),
}

/// Sink for messages that a session's client will receive on its next poll
#[async_trait]
pub trait SessionOutbox: Send + Sync {
    /// Session the queued messages belong to
    fn session_id(&self) -> &str;

    /// Append a wire-ready message to the session's pending queue
    async fn push(&self, message: Value) -> Result<(), OutboxError>;
}

/// Per-call session information handed to every handler
#[derive(Clone)]
pub struct SessionContext {
    /// Opaque session identifier (the cookie value)
    pub session_id: String,
    /// Where asynchronous pushes for this session go
    pub outbox: Option<Arc<dyn SessionOutbox>>,
    /// Time the request was received (Unix milliseconds)
    pub timestamp: u64,
}

impl SessionContext {
    pub fn new(session_id: impl Into<String>) -> Self {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or_default();
        Self {
            session_id: session_id.into(),
            outbox: None,
            timestamp,
        }
    }

    pub fn with_outbox(mut self, outbox: Arc<dyn SessionOutbox>) -> Self {
        self.outbox = Some(outbox);
        self
    }

    /// Queue a raw message for the session
    pub async fn push(&self, message: Value) -> Result<(), OutboxError> {
        match &self.outbox {
            Some(outbox) => outbox.push(message).await,
            None => Err(OutboxError::Detached),
        }
    }

    /// Queue a notification for the session
    pub async fn notify(&self, notification: &JsonRpcNotification) -> Result<(), OutboxError> {
        self.push(notification.to_value()).await
    }
}

impl fmt::Debug for SessionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionContext")
            .field("session_id", &self.session_id)
            .field("has_outbox", &self.outbox.is_some())
            .field("timestamp", &self.timestamp)
            .finish()
    }
}

/// Trait for handling JSON-RPC method calls
#[async_trait]
pub trait JsonRpcHandler: Send + Sync {
    /// The error type returned by this handler
    type Error: ToJsonRpcError;

    /// Handle a validated request on behalf of a session.
    /// Returns domain errors only; the dispatcher converts them to faults.
    async fn handle(
        &self,
        request: &JsonRpcRequest,
        session: &SessionContext,
    ) -> Result<Value, Self::Error>;
}

/// A handler backed by a closure
pub struct FunctionHandler<F, E> {
    handler_fn: F,
    _error: PhantomData<fn() -> E>,
}

impl<F, E> FunctionHandler<F, E>
where
    E: ToJsonRpcError,
    F: Fn(JsonRpcRequest, SessionContext) -> BoxFuture<'static, Result<Value, E>> + Send + Sync,
{
    pub fn new(handler_fn: F) -> Self {
        Self {
            handler_fn,
            _error: PhantomData,
        }
    }
}

#[async_trait]
impl<F, E> JsonRpcHandler for FunctionHandler<F, E>
where
    E: ToJsonRpcError,
    F: Fn(JsonRpcRequest, SessionContext) -> BoxFuture<'static, Result<Value, E>> + Send + Sync,
{
    type Error = E;

    async fn handle(
        &self,
        request: &JsonRpcRequest,
        session: &SessionContext,
    ) -> Result<Value, Self::Error> {
        (self.handler_fn)(request.clone(), session.clone()).await
    }
}

/// Dispatcher behaviour switches
#[derive(Debug, Clone, Default)]
pub struct DispatcherConfig {
    /// Return handler diagnostics in -32603 messages. Off by default so
    /// untrusted clients only see the generic text.
    pub expose_internal_errors: bool,
}

/// Result of dispatching one raw payload
#[derive(Debug, Clone)]
pub enum DispatchOutcome {
    /// The payload was not JSON. Answer with this single fault and stop.
    Malformed(JsonRpcError),
    /// Direct responses, in request order. Notifications contribute nothing.
    Entries(Vec<JsonRpcMessage>),
}

/// JSON-RPC dispatcher: validation, invocation and fault mapping
pub struct JsonRpcDispatcher<E>
where
    E: ToJsonRpcError,
{
    registry: MethodRegistry<E>,
    config: DispatcherConfig,
}

impl<E> JsonRpcDispatcher<E>
where
    E: ToJsonRpcError,
{
    pub fn new(registry: MethodRegistry<E>, config: DispatcherConfig) -> Self {
        Self { registry, config }
    }

    pub fn config(&self) -> &DispatcherConfig {
        &self.config
    }

    /// Decode a raw body into request entries. A lone object becomes a
    /// one-element batch.
    pub fn parse_payload(raw: &[u8]) -> Result<Vec<Value>, JsonRpcError> {
        let value: Value = serde_json::from_slice(raw)
            .map_err(|err| JsonRpcError::parse_error(Some(err.to_string())))?;
        Ok(match value {
            Value::Array(entries) => entries,
            single => vec![single],
        })
    }

    /// Parse and dispatch a raw payload
    pub async fn dispatch_payload(&self, raw: &[u8], session: &SessionContext) -> DispatchOutcome {
        match Self::parse_payload(raw) {
            Ok(entries) => DispatchOutcome::Entries(self.dispatch_batch(entries, session).await),
            Err(fault) => {
                debug!("Unparseable payload for session {}: {}", session.session_id, fault);
                DispatchOutcome::Malformed(fault)
            }
        }
    }

    /// Dispatch every entry in order. A bad entry yields its fault and the batch continues.
    pub async fn dispatch_batch(
        &self,
        entries: Vec<Value>,
        session: &SessionContext,
    ) -> Vec<JsonRpcMessage> {
        let mut responses = Vec::with_capacity(entries.len());
        for entry in entries {
            if let Some(response) = self.dispatch_entry(entry, session).await {
                responses.push(response);
            }
        }
        responses
    }

    /// Validate and dispatch one entry. `None` means nothing is sent back (notification).
    pub async fn dispatch_entry(
        &self,
        entry: Value,
        session: &SessionContext,
    ) -> Option<JsonRpcMessage> {
        let request = match validate_request(entry) {
            Ok(request) => request,
            Err(fault) => {
                debug!("Rejected request entry: {}", fault);
                return Some(JsonRpcMessage::Error(fault));
            }
        };

        let outcome = self.invoke(&request, session).await;

        let Some(id) = request.id.clone() else {
            if let Err(error) = &outcome {
                debug!(
                    "Notification {} failed ({}: {}), nothing sent",
                    request.method, error.code, error.message
                );
            }
            return None;
        };

        Some(match outcome {
            Ok(result) => JsonRpcMessage::success(request.version, id, result),
            Err(error) => JsonRpcMessage::Error(
                JsonRpcError::new(Some(id), error).with_version(request.version),
            ),
        })
    }

    async fn invoke(
        &self,
        request: &JsonRpcRequest,
        session: &SessionContext,
    ) -> Result<Value, JsonRpcErrorObject> {
        let Some(handler) = self.registry.get(&request.method) else {
            debug!("Method not found: {}", request.method);
            return Err(JsonRpcErrorObject::method_not_found(&request.method));
        };

        debug!(
            "Dispatching {} for session {}",
            request.method, session.session_id
        );

        match AssertUnwindSafe(handler.handle(request, session))
            .catch_unwind()
            .await
        {
            Ok(Ok(result)) => Ok(result),
            Ok(Err(domain_error)) => Err(self.redact(domain_error.to_error_object())),
            Err(panic) => {
                let detail = if let Some(s) = panic.downcast_ref::<&str>() {
                    format!("Server error: panic in {}: {}", request.method, s)
                } else if let Some(s) = panic.downcast_ref::<String>() {
                    format!("Server error: panic in {}: {}", request.method, s)
                } else {
                    format!("Server error: panic in {}", request.method)
                };
                warn!("{}", detail);
                Err(self.redact(JsonRpcErrorObject::internal_error(Some(detail))))
            }
        }
    }

    fn redact(&self, error: JsonRpcErrorObject) -> JsonRpcErrorObject {
        if error.is_internal() && !self.config.expose_internal_errors {
            JsonRpcErrorObject::internal_error(None)
        } else {
            error
        }
    }

    /// Get all registered methods
    pub fn registered_methods(&self) -> Vec<String> {
        self.registry.methods()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MethodError;
    use crate::types::{JsonRpcVersion, RequestId};
    use serde_json::json;
    use std::sync::Mutex;

    struct TestHandler;

    #[async_trait]
    impl JsonRpcHandler for TestHandler {
        type Error = MethodError;

        async fn handle(
            &self,
            request: &JsonRpcRequest,
            session: &SessionContext,
        ) -> Result<Value, Self::Error> {
            match request.method.as_str() {
                "client.version" => Ok(json!("0.9")),
                "echo.session" => Ok(json!(session.session_id)),
                "needs.one" => match request.get_param_index(0) {
                    Some(value) if request.params.len() == 1 => Ok(value.clone()),
                    _ => Err(MethodError::invalid_params("expected exactly one argument")),
                },
                "fail" => Err(MethodError::internal("backend unavailable")),
                "boom" => panic!("exploded"),
                other => Err(MethodError::MethodNotFound(other.to_string())),
            }
        }
    }

    #[derive(Default)]
    struct RecordingOutbox {
        pushed: Mutex<Vec<Value>>,
    }

    #[async_trait]
    impl SessionOutbox for RecordingOutbox {
        fn session_id(&self) -> &str {
            "s1"
        }

        async fn push(&self, message: Value) -> Result<(), OutboxError> {
            self.pushed.lock().unwrap().push(message);
            Ok(())
        }
    }

    fn dispatcher(expose_internal_errors: bool) -> JsonRpcDispatcher<MethodError> {
        let mut registry = MethodRegistry::new();
        registry
            .register_methods(
                ["client.version", "echo.session", "needs.one", "fail", "boom"],
                TestHandler,
            )
            .unwrap();
        JsonRpcDispatcher::new(registry, DispatcherConfig { expose_internal_errors })
    }

    fn entries(outcome: DispatchOutcome) -> Vec<JsonRpcMessage> {
        match outcome {
            DispatchOutcome::Entries(entries) => entries,
            DispatchOutcome::Malformed(fault) => panic!("unexpected parse fault: {fault}"),
        }
    }

    fn error_code(message: &JsonRpcMessage) -> i64 {
        match message {
            JsonRpcMessage::Error(err) => err.error.code,
            JsonRpcMessage::Response(resp) => panic!("expected error, got {resp:?}"),
        }
    }

    #[tokio::test]
    async fn test_single_request_echoes_id() {
        let session = SessionContext::new("s1");
        let out = entries(
            dispatcher(false)
                .dispatch_payload(br#"{"id":1,"method":"client.version","params":[]}"#, &session)
                .await,
        );

        assert_eq!(out.len(), 1);
        assert_eq!(out[0].id(), Some(&RequestId::from(1)));
        assert_eq!(
            serde_json::to_value(&out[0]).unwrap(),
            json!({"id": 1, "result": "0.9"})
        );
    }

    #[tokio::test]
    async fn test_v2_request_gets_v2_envelope() {
        let session = SessionContext::new("s1");
        let out = entries(
            dispatcher(false)
                .dispatch_payload(
                    br#"{"jsonrpc":"2.0","id":"a","method":"echo.session"}"#,
                    &session,
                )
                .await,
        );
        assert_eq!(
            serde_json::to_value(&out[0]).unwrap(),
            json!({"jsonrpc": "2.0", "id": "a", "result": "s1"})
        );
    }

    #[tokio::test]
    async fn test_parse_error_is_transport_level() {
        let session = SessionContext::new("s1");
        match dispatcher(false).dispatch_payload(b"{not json", &session).await {
            DispatchOutcome::Malformed(fault) => {
                assert_eq!(fault.code(), -32700);
                assert_eq!(fault.id, None);
            }
            DispatchOutcome::Entries(_) => panic!("expected parse fault"),
        }
    }

    #[tokio::test]
    async fn test_invalid_utf8_is_parse_error() {
        let session = SessionContext::new("s1");
        let outcome = dispatcher(false).dispatch_payload(&[0xff, 0xfe, b'{'], &session).await;
        assert!(matches!(outcome, DispatchOutcome::Malformed(f) if f.code() == -32700));
    }

    #[tokio::test]
    async fn test_batch_continues_past_bad_entries() {
        let session = SessionContext::new("s1");
        let body = br#"[
            {"id":1,"method":"client.version"},
            {"id":2},
            42,
            {"id":3,"method":"no.such.method"},
            {"id":4,"method":"needs.one","params":[1,2]},
            {"id":5,"method":"needs.one","params":["x"]}
        ]"#;
        let out = entries(dispatcher(false).dispatch_payload(body, &session).await);

        assert_eq!(out.len(), 6);
        assert!(!out[0].is_error());
        assert_eq!(error_code(&out[1]), -32600);
        assert_eq!(out[1].id(), Some(&RequestId::from(2)));
        assert_eq!(error_code(&out[2]), -32600);
        assert_eq!(out[2].id(), None);
        assert_eq!(error_code(&out[3]), -32601);
        assert_eq!(error_code(&out[4]), -32602);
        assert_eq!(
            serde_json::to_value(&out[5]).unwrap(),
            json!({"id": 5, "result": "x"})
        );
    }

    #[tokio::test]
    async fn test_notifications_produce_no_entries() {
        let session = SessionContext::new("s1");
        let body = br#"[
            {"jsonrpc":"2.0","method":"client.version"},
            {"id":null,"method":"client.version"},
            {"id":null,"method":"no.such.method"},
            {"jsonrpc":"2.0","method":"fail"}
        ]"#;
        let out = entries(dispatcher(false).dispatch_payload(body, &session).await);
        assert!(out.is_empty());
    }

    #[tokio::test]
    async fn test_empty_batch_is_a_poll() {
        let session = SessionContext::new("s1");
        let out = entries(dispatcher(false).dispatch_payload(b"[]", &session).await);
        assert!(out.is_empty());
    }

    #[tokio::test]
    async fn test_internal_errors_are_redacted_by_default() {
        let session = SessionContext::new("s1");
        let out = entries(
            dispatcher(false)
                .dispatch_payload(br#"{"id":7,"method":"fail"}"#, &session)
                .await,
        );
        let JsonRpcMessage::Error(fault) = &out[0] else {
            panic!("expected fault");
        };
        assert_eq!(fault.error.code, -32603);
        assert_eq!(fault.error.message, "Internal error");
        assert_eq!(fault.version, JsonRpcVersion::V1_0);
    }

    #[tokio::test]
    async fn test_internal_errors_exposed_when_configured() {
        let session = SessionContext::new("s1");
        let out = entries(
            dispatcher(true)
                .dispatch_payload(br#"{"id":7,"method":"fail"}"#, &session)
                .await,
        );
        let JsonRpcMessage::Error(fault) = &out[0] else {
            panic!("expected fault");
        };
        assert_eq!(fault.error.message, "Server error: backend unavailable");
    }

    #[tokio::test]
    async fn test_panicking_handler_becomes_internal_error() {
        let session = SessionContext::new("s1");
        let body = br#"[{"id":1,"method":"boom"},{"id":2,"method":"client.version"}]"#;
        let out = entries(dispatcher(true).dispatch_payload(body, &session).await);

        assert_eq!(out.len(), 2);
        assert_eq!(error_code(&out[0]), -32603);
        let JsonRpcMessage::Error(fault) = &out[0] else {
            unreachable!()
        };
        assert!(fault.error.message.contains("exploded"));
        assert!(!out[1].is_error());
    }

    #[tokio::test]
    async fn test_function_handler_pushes_through_outbox() {
        let outbox = Arc::new(RecordingOutbox::default());
        let session = SessionContext::new("s1").with_outbox(outbox.clone());

        let mut registry = MethodRegistry::<MethodError>::new();
        registry
            .register(
                "blockchain.numblocks.subscribe",
                FunctionHandler::new(|_request: JsonRpcRequest, session: SessionContext| {
                    Box::pin(async move {
                        let notification = JsonRpcNotification::legacy(
                            "blockchain.numblocks.subscribe",
                            vec![json!(100)].into(),
                        );
                        session
                            .notify(&notification)
                            .await
                            .map_err(|e| MethodError::internal(e.to_string()))?;
                        Ok(json!(100))
                    }) as BoxFuture<'static, Result<Value, MethodError>>
                }),
            )
            .unwrap();
        let dispatcher = JsonRpcDispatcher::new(registry, DispatcherConfig::default());

        let out = entries(
            dispatcher
                .dispatch_payload(
                    br#"{"id":1,"method":"blockchain.numblocks.subscribe"}"#,
                    &session,
                )
                .await,
        );
        assert_eq!(serde_json::to_value(&out[0]).unwrap(), json!({"id": 1, "result": 100}));
        assert_eq!(
            *outbox.pushed.lock().unwrap(),
            vec![json!({"method": "blockchain.numblocks.subscribe", "params": [100]})]
        );
    }

    #[tokio::test]
    async fn test_push_without_outbox_fails() {
        let session = SessionContext::new("s1");
        assert_eq!(session.push(json!({})).await, Err(OutboxError::Detached));
    }

    #[test]
    fn test_registered_methods() {
        let methods = dispatcher(false).registered_methods();
        assert!(methods.contains(&"client.version".to_string()));
        assert_eq!(methods.len(), 5);
    }
}
