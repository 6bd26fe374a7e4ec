//! # JSON-RPC Envelope and Dispatch
//!
//! Transport-agnostic JSON-RPC core used by the Stratum HTTP gateway. It speaks
//! both JSON-RPC 1.0 (`id` without `jsonrpc`) and 2.0 (`jsonrpc` marker), accepts
//! single requests and batches, and never lets a bad entry abort its batch.
//!
//! ## Features
//! - Version detection and structural validation of raw request objects
//! - Startup-validated method registry with typed async handlers
//! - Fault mapping for unknown methods, parameter errors, handler failures and panics
//! - Response-body encoding that splices pre-serialized entries without re-encoding

pub mod batch;
pub mod error;
pub mod notification;
pub mod request;
pub mod response;
pub mod types;
pub mod validate;

#[cfg(feature = "async")]
pub mod r#async;
#[cfg(feature = "async")]
pub mod registry;

pub mod prelude;

// Re-export main types
pub use batch::{encode_response_body, serialize_messages};
pub use error::{
    JsonRpcError, JsonRpcErrorCode, JsonRpcErrorObject, JsonRpcTransportError, MethodError,
    ToJsonRpcError,
};
pub use notification::JsonRpcNotification;
pub use request::{JsonRpcRequest, RequestParams};
pub use response::{JsonRpcMessage, JsonRpcResponse};
pub use types::{JsonRpcVersion, RequestId};
pub use validate::validate_request;

#[cfg(feature = "async")]
pub use r#async::{
    DispatchOutcome, DispatcherConfig, FunctionHandler, JsonRpcDispatcher, JsonRpcHandler,
    OutboxError, SessionContext, SessionOutbox,
};
#[cfg(feature = "async")]
pub use registry::{MethodRegistry, RegistryError};

/// JSON-RPC 2.0 version constant
pub const JSONRPC_VERSION: &str = "2.0";

/// Standard JSON-RPC error codes, shared by 1.0 and 2.0 requests
pub mod error_codes {
    pub const PARSE_ERROR: i64 = -32700;
    pub const INVALID_REQUEST: i64 = -32600;
    pub const METHOD_NOT_FOUND: i64 = -32601;
    pub const INVALID_PARAMS: i64 = -32602;
    pub const INTERNAL_ERROR: i64 = -32603;

    // Server error range: -32099 to -32000
    pub const SERVER_ERROR_START: i64 = -32099;
    pub const SERVER_ERROR_END: i64 = -32000;
}
