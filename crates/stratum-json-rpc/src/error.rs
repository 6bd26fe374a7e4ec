use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use thiserror::Error;

use crate::error_codes;
use crate::types::{JsonRpcVersion, RequestId};

/// JSON-RPC error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JsonRpcErrorCode {
    ParseError,
    InvalidRequest,
    MethodNotFound,
    InvalidParams,
    InternalError,
    ServerError(i64), // -32099 to -32000
}

impl JsonRpcErrorCode {
    pub fn code(&self) -> i64 {
        match self {
            JsonRpcErrorCode::ParseError => error_codes::PARSE_ERROR,
            JsonRpcErrorCode::InvalidRequest => error_codes::INVALID_REQUEST,
            JsonRpcErrorCode::MethodNotFound => error_codes::METHOD_NOT_FOUND,
            JsonRpcErrorCode::InvalidParams => error_codes::INVALID_PARAMS,
            JsonRpcErrorCode::InternalError => error_codes::INTERNAL_ERROR,
            JsonRpcErrorCode::ServerError(code) => *code,
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            JsonRpcErrorCode::ParseError => "Parse error",
            JsonRpcErrorCode::InvalidRequest => "Invalid Request",
            JsonRpcErrorCode::MethodNotFound => "Method not found",
            JsonRpcErrorCode::InvalidParams => "Invalid params",
            JsonRpcErrorCode::InternalError => "Internal error",
            JsonRpcErrorCode::ServerError(_) => "Server error",
        }
    }
}

impl fmt::Display for JsonRpcErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code(), self.message())
    }
}

/// JSON-RPC Error object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcErrorObject {
    pub code: i64,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl JsonRpcErrorObject {
    pub fn new(code: JsonRpcErrorCode, message: Option<String>, data: Option<Value>) -> Self {
        Self {
            code: code.code(),
            message: message.unwrap_or_else(|| code.message().to_string()),
            data,
        }
    }

    pub fn parse_error(data: Option<Value>) -> Self {
        Self::new(JsonRpcErrorCode::ParseError, None, data)
    }

    pub fn invalid_request(message: Option<String>) -> Self {
        Self::new(JsonRpcErrorCode::InvalidRequest, message, None)
    }

    pub fn method_not_found(method: &str) -> Self {
        Self::new(
            JsonRpcErrorCode::MethodNotFound,
            Some(format!("Method '{}' not supported", method)),
            None,
        )
    }

    pub fn invalid_params(message: &str) -> Self {
        Self::new(
            JsonRpcErrorCode::InvalidParams,
            Some(message.to_string()),
            None,
        )
    }

    pub fn internal_error(message: Option<String>) -> Self {
        Self::new(JsonRpcErrorCode::InternalError, message, None)
    }

    /// Implementation-defined server error. Codes outside -32099..=-32000
    /// are reported as internal errors instead.
    pub fn server_error(code: i64, message: &str, data: Option<Value>) -> Self {
        if (error_codes::SERVER_ERROR_START..=error_codes::SERVER_ERROR_END).contains(&code) {
            Self::new(
                JsonRpcErrorCode::ServerError(code),
                Some(message.to_string()),
                data,
            )
        } else {
            Self::new(
                JsonRpcErrorCode::InternalError,
                Some(message.to_string()),
                data,
            )
        }
    }

    pub fn is_internal(&self) -> bool {
        self.code == error_codes::INTERNAL_ERROR
    }
}

/// A fault: the error envelope returned in place of a result.
///
/// `id` echoes the request id, or is `null` when the request could not be
/// correlated (parse failures, entries that are not objects).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcError {
    #[serde(
        rename = "jsonrpc",
        default = "JsonRpcVersion::legacy",
        skip_serializing_if = "JsonRpcVersion::is_legacy"
    )]
    pub version: JsonRpcVersion,
    pub id: Option<RequestId>,
    pub error: JsonRpcErrorObject,
}

impl JsonRpcError {
    pub fn new(id: Option<RequestId>, error: JsonRpcErrorObject) -> Self {
        Self {
            version: JsonRpcVersion::V2_0,
            id,
            error,
        }
    }

    /// Answer in the envelope of the request's version.
    pub fn with_version(mut self, version: JsonRpcVersion) -> Self {
        self.version = version;
        self
    }

    pub fn parse_error(detail: Option<String>) -> Self {
        Self::new(None, JsonRpcErrorObject::parse_error(detail.map(Value::String)))
    }

    pub fn invalid_request(id: Option<RequestId>, message: impl Into<String>) -> Self {
        Self::new(id, JsonRpcErrorObject::invalid_request(Some(message.into())))
    }

    pub fn method_not_found(id: Option<RequestId>, method: &str) -> Self {
        Self::new(id, JsonRpcErrorObject::method_not_found(method))
    }

    pub fn invalid_params(id: Option<RequestId>, message: &str) -> Self {
        Self::new(id, JsonRpcErrorObject::invalid_params(message))
    }

    pub fn internal_error(id: Option<RequestId>, message: Option<String>) -> Self {
        Self::new(id, JsonRpcErrorObject::internal_error(message))
    }

    pub fn code(&self) -> i64 {
        self.error.code
    }
}

impl fmt::Display for JsonRpcError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "JSON-RPC Error {}: {}",
            self.error.code, self.error.message
        )
    }
}

impl std::error::Error for JsonRpcError {}

/// Transport-level errors for JSON-RPC processing (no domain logic)
#[derive(Debug, Error)]
pub enum JsonRpcTransportError {
    #[error("JSON parse error: {0}")]
    JsonParseError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Protocol error: {0}")]
    ProtocolError(String),
}

/// Trait for errors that can be converted to JSON-RPC error objects
pub trait ToJsonRpcError: std::error::Error + Send + Sync + 'static {
    /// Convert this error to a JSON-RPC error object
    fn to_error_object(&self) -> JsonRpcErrorObject;
}

/// Domain error returned by method handlers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MethodError {
    /// Parameters do not match what the method expects (arity or type).
    #[error("Invalid params: {0}")]
    InvalidParams(String),

    #[error("Method '{0}' not supported")]
    MethodNotFound(String),

    #[error("{0}")]
    Internal(String),

    #[error("{message}")]
    Server { code: i64, message: String },
}

impl MethodError {
    pub fn invalid_params(message: impl Into<String>) -> Self {
        MethodError::InvalidParams(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        MethodError::Internal(message.into())
    }
}

impl ToJsonRpcError for MethodError {
    fn to_error_object(&self) -> JsonRpcErrorObject {
        match self {
            MethodError::InvalidParams(message) => JsonRpcErrorObject::invalid_params(message),
            MethodError::MethodNotFound(method) => JsonRpcErrorObject::method_not_found(method),
            MethodError::Internal(message) => {
                JsonRpcErrorObject::internal_error(Some(format!("Server error: {}", message)))
            }
            MethodError::Server { code, message } => {
                JsonRpcErrorObject::server_error(*code, message, None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_error_codes() {
        assert_eq!(JsonRpcErrorCode::ParseError.code(), -32700);
        assert_eq!(JsonRpcErrorCode::InvalidRequest.code(), -32600);
        assert_eq!(JsonRpcErrorCode::MethodNotFound.code(), -32601);
        assert_eq!(JsonRpcErrorCode::InvalidParams.code(), -32602);
        assert_eq!(JsonRpcErrorCode::InternalError.code(), -32603);
    }

    #[test]
    fn test_error_serialization() {
        let error = JsonRpcError::method_not_found(Some(RequestId::from(1)), "test");
        let json = serde_json::to_value(&error).unwrap();
        assert_eq!(json["jsonrpc"], "2.0");
        assert_eq!(json["id"], 1);
        assert_eq!(json["error"]["code"], -32601);
        assert_eq!(json["error"]["message"], "Method 'test' not supported");
    }

    #[test]
    fn test_legacy_fault_has_no_version_marker() {
        let error = JsonRpcError::invalid_params(Some(RequestId::from("a")), "bad")
            .with_version(JsonRpcVersion::V1_0);
        let json = serde_json::to_value(&error).unwrap();
        assert_eq!(json, json!({"id": "a", "error": {"code": -32602, "message": "bad"}}));
    }

    #[test]
    fn test_uncorrelated_fault_serializes_null_id() {
        let error = JsonRpcError::parse_error(Some("EOF while parsing".to_string()));
        let json = serde_json::to_value(&error).unwrap();
        assert_eq!(json["id"], Value::Null);
        assert_eq!(json["error"]["code"], -32700);
        assert_eq!(json["error"]["data"], "EOF while parsing");
    }

    #[test]
    fn test_server_error_range() {
        let inside = JsonRpcErrorObject::server_error(-32001, "busy", None);
        assert_eq!(inside.code, -32001);

        let outside = JsonRpcErrorObject::server_error(42, "odd", None);
        assert_eq!(outside.code, -32603);
        assert_eq!(outside.message, "odd");
    }

    #[test]
    fn test_method_error_mapping() {
        assert_eq!(
            MethodError::invalid_params("expected 1 argument").to_error_object().code,
            -32602
        );
        assert_eq!(
            MethodError::MethodNotFound("x".into()).to_error_object().code,
            -32601
        );

        let internal = MethodError::internal("db down").to_error_object();
        assert_eq!(internal.code, -32603);
        assert_eq!(internal.message, "Server error: db down");
    }
}
