//! Shared test backend

use async_trait::async_trait;
use serde_json::{Value, json};

use stratum_json_rpc::{
    JsonRpcHandler, JsonRpcNotification, JsonRpcRequest, MethodError, SessionContext,
};

use crate::{HttpRpcServer, HttpRpcServerBuilder};

pub const TEST_HEIGHT: u64 = 123_456;

pub struct TestBackend;

#[async_trait]
impl JsonRpcHandler for TestBackend {
    type Error = MethodError;

    async fn handle(
        &self,
        request: &JsonRpcRequest,
        session: &SessionContext,
    ) -> Result<Value, Self::Error> {
        match request.method.as_str() {
            "client.version" => Ok(json!("0.9")),
            "server.banner" => Ok(json!("Welcome to the test gateway")),
            "blockchain.numblocks.subscribe" => {
                let push = JsonRpcNotification::legacy(
                    "blockchain.numblocks.subscribe",
                    vec![json!(TEST_HEIGHT)].into(),
                );
                session
                    .notify(&push)
                    .await
                    .map_err(|err| MethodError::internal(err.to_string()))?;
                Ok(json!(TEST_HEIGHT))
            }
            "blockchain.address.get_history" => match request.get_param_index(0) {
                Some(Value::String(_)) if request.params.len() == 1 => Ok(json!([])),
                _ => Err(MethodError::invalid_params("expected one address")),
            },
            "blockchain.transaction.broadcast" => Err(MethodError::internal("node offline")),
            other => Err(MethodError::MethodNotFound(other.to_string())),
        }
    }
}

pub const TEST_METHODS: [&str; 5] = [
    "client.version",
    "server.banner",
    "blockchain.numblocks.subscribe",
    "blockchain.address.get_history",
    "blockchain.transaction.broadcast",
];

pub fn test_builder() -> HttpRpcServerBuilder {
    HttpRpcServer::builder().register_handler(TEST_METHODS, TestBackend)
}

pub fn test_server() -> HttpRpcServer {
    test_builder().build().unwrap()
}
