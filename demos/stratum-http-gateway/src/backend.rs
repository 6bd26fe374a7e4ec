//! Demo chain backend
//!
//! Answers the Stratum method set from an in-process chain tip and pushes
//! `blockchain.numblocks.subscribe` notifications to subscribed sessions
//! whenever the ticker mines a block.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use stratum_json_rpc::{
    JsonRpcHandler, JsonRpcNotification, JsonRpcRequest, MethodError, OutboxError, SessionContext,
    SessionOutbox,
};

/// Methods answered by [`DemoBackend`]
pub const GATEWAY_METHODS: [&str; 7] = [
    "server.peers.subscribe",
    "server.banner",
    "blockchain.transaction.broadcast",
    "blockchain.address.get_history",
    "blockchain.address.subscribe",
    "blockchain.numblocks.subscribe",
    "client.version",
];

const NUMBLOCKS_METHOD: &str = "blockchain.numblocks.subscribe";
const GENESIS_HEIGHT: u64 = 0;

struct ChainState {
    banner: String,
    height: AtomicU64,
    block_subscribers: Mutex<HashMap<String, Arc<dyn SessionOutbox>>>,
}

/// Backend processor shared by every registered method
#[derive(Clone)]
pub struct DemoBackend {
    state: Arc<ChainState>,
}

impl DemoBackend {
    pub fn new(banner: impl Into<String>) -> Self {
        Self::with_height(banner, GENESIS_HEIGHT)
    }

    pub fn with_height(banner: impl Into<String>, height: u64) -> Self {
        Self {
            state: Arc::new(ChainState {
                banner: banner.into(),
                height: AtomicU64::new(height),
                block_subscribers: Mutex::new(HashMap::new()),
            }),
        }
    }

    pub fn height(&self) -> u64 {
        self.state.height.load(Ordering::SeqCst)
    }

    pub fn subscriber_count(&self) -> usize {
        self.state.block_subscribers.lock().len()
    }

    /// Advance the tip by one block and notify subscribers. Returns the new height.
    pub async fn mine_block(&self) -> u64 {
        let height = self.state.height.fetch_add(1, Ordering::SeqCst) + 1;
        let push =
            JsonRpcNotification::legacy(NUMBLOCKS_METHOD, vec![json!(height)].into()).to_value();

        let subscribers: Vec<Arc<dyn SessionOutbox>> =
            self.state.block_subscribers.lock().values().cloned().collect();

        for outbox in subscribers {
            match outbox.push(push.clone()).await {
                Ok(()) => {}
                Err(OutboxError::SessionGone(session_id)) => {
                    debug!("Dropping subscriber {}: session expired", session_id);
                    self.state.block_subscribers.lock().remove(&session_id);
                }
                Err(err) => warn!("Push to {} failed: {}", outbox.session_id(), err),
            }
        }

        debug!("Block {} mined", height);
        height
    }

    /// Mine a block every `interval` until `token` is cancelled
    pub async fn run_block_ticker(self, interval: Duration, token: CancellationToken) {
        let mut ticker = tokio::time::interval(interval);
        ticker.tick().await;
        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                _ = ticker.tick() => {
                    self.mine_block().await;
                }
            }
        }
        info!("Block ticker stopped at height {}", self.height());
    }

    fn single_string_param<'a>(
        request: &'a JsonRpcRequest,
        what: &str,
    ) -> Result<&'a str, MethodError> {
        match (request.params.len(), request.get_param_index(0)) {
            (1, Some(Value::String(value))) if !value.is_empty() => Ok(value.as_str()),
            _ => Err(MethodError::invalid_params(format!(
                "{} takes exactly one argument: {}",
                request.method, what
            ))),
        }
    }

    fn subscribe_blocks(&self, session: &SessionContext) -> Result<Value, MethodError> {
        let outbox = session
            .outbox
            .clone()
            .ok_or_else(|| MethodError::internal("session cannot receive pushes"))?;
        self.state
            .block_subscribers
            .lock()
            .insert(session.session_id.clone(), outbox);
        Ok(json!(self.height()))
    }

    // The demo chain carries no transactions, so no address ever has history
    // and its status can never change. Nothing is retained per session.
    fn subscribe_address(request: &JsonRpcRequest) -> Result<Value, MethodError> {
        Self::single_string_param(request, "address")?;
        Ok(Value::Null)
    }

    fn broadcast(request: &JsonRpcRequest) -> Result<Value, MethodError> {
        let raw_tx = Self::single_string_param(request, "raw transaction hex")?;
        if raw_tx.len() % 2 != 0 || !raw_tx.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(MethodError::invalid_params("transaction is not valid hex"));
        }
        Err(MethodError::Server {
            code: -32000,
            message: "no upstream node; transaction not relayed".to_string(),
        })
    }
}

#[async_trait]
impl JsonRpcHandler for DemoBackend {
    type Error = MethodError;

    async fn handle(
        &self,
        request: &JsonRpcRequest,
        session: &SessionContext,
    ) -> Result<Value, Self::Error> {
        match request.method.as_str() {
            "server.banner" => Ok(json!(self.state.banner)),
            "server.peers.subscribe" => Ok(json!([])),
            "client.version" => Ok(json!(env!("CARGO_PKG_VERSION"))),
            "blockchain.numblocks.subscribe" => self.subscribe_blocks(session),
            "blockchain.address.subscribe" => Self::subscribe_address(request),
            "blockchain.address.get_history" => {
                Self::single_string_param(request, "address")?;
                Ok(json!([]))
            }
            "blockchain.transaction.broadcast" => Self::broadcast(request),
            other => Err(MethodError::MethodNotFound(other.to_string())),
        }
    }
}
