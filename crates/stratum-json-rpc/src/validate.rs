//! Structural validation of a single request entry.
//!
//! Runs once at the boundary; everything past it works on [`JsonRpcRequest`].

use serde_json::Value;

use crate::error::JsonRpcError;
use crate::request::{JsonRpcRequest, RequestParams};
use crate::types::{JsonRpcVersion, RequestId, json_type_name};

/// Validate one entry of a request payload.
///
/// Every failure is an invalid-request fault (-32600) carrying the entry's id
/// when one could be read, `null` otherwise.
pub fn validate_request(entry: Value) -> Result<JsonRpcRequest, JsonRpcError> {
    let mut object = match entry {
        Value::Object(object) => object,
        other => {
            return Err(JsonRpcError::invalid_request(
                None,
                format!("Request must be an object, not {}", json_type_name(&other)),
            ));
        }
    };

    let id = match object.get("id") {
        None | Some(Value::Null) => None,
        Some(raw) => match RequestId::from_json(raw) {
            Some(id) => Some(id),
            None => {
                return Err(JsonRpcError::invalid_request(
                    None,
                    format!("Request id must be a string or number, not {}", json_type_name(raw)),
                ));
            }
        },
    };

    let Some(version) = JsonRpcVersion::detect(&object) else {
        return Err(JsonRpcError::invalid_request(
            id,
            "Request carries neither 'jsonrpc' nor 'id'",
        ));
    };

    let params = match object.remove("params") {
        None => RequestParams::default(),
        Some(Value::Array(list)) => RequestParams::Array(list),
        Some(Value::Object(map)) => RequestParams::Object(map),
        Some(_) => return Err(invalid_method_or_params(id, version)),
    };

    let method = match object.remove("method") {
        Some(Value::String(method)) if !method.is_empty() => method,
        _ => return Err(invalid_method_or_params(id, version)),
    };

    Ok(JsonRpcRequest {
        version,
        id,
        method,
        params,
    })
}

fn invalid_method_or_params(id: Option<RequestId>, version: JsonRpcVersion) -> JsonRpcError {
    JsonRpcError::invalid_request(id, "Invalid request parameters or method").with_version(version)
}
