//! # JSON-RPC Prelude
//!
//! Convenient re-exports of the most commonly used types.
//!
//! ```rust
//! use stratum_json_rpc::prelude::*;
//! ```

pub use crate::error::{
    JsonRpcError, JsonRpcErrorCode, JsonRpcErrorObject, MethodError, ToJsonRpcError,
};
pub use crate::notification::JsonRpcNotification;
pub use crate::request::{JsonRpcRequest, RequestParams};
pub use crate::response::{JsonRpcMessage, JsonRpcResponse};
pub use crate::types::{JsonRpcVersion, RequestId};
pub use crate::validate::validate_request;

#[cfg(feature = "async")]
pub use crate::r#async::{JsonRpcDispatcher, JsonRpcHandler, SessionContext, SessionOutbox};
#[cfg(feature = "async")]
pub use crate::registry::MethodRegistry;

// Standard error codes
pub use crate::error_codes::*;
