//! HTTP response builders for the JSON-RPC endpoint
//!
//! Every response closes the connection and states its length. RPC responses
//! additionally carry the session cookie when one is known.

use bytes::Bytes;
use http_body_util::Full;
use hyper::header::{self, HeaderValue};
use hyper::{Response, StatusCode};
use tracing::{error, warn};

use stratum_json_rpc::JsonRpcError;
use stratum_json_rpc::batch::SERIALIZATION_FALLBACK;

use crate::cookie::session_cookie_value;

/// Content type of every RPC response body
pub const JSON_RPC_CONTENT_TYPE: &str = "application/json-rpc";

/// HTTP body type for JSON-RPC responses
pub type JsonRpcBody = Full<Bytes>;

fn plain_response(
    status: StatusCode,
    body: Bytes,
    content_type: &'static str,
) -> Response<JsonRpcBody> {
    let length = body.len();
    let mut response = Response::new(Full::new(body));
    *response.status_mut() = status;
    let headers = response.headers_mut();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(content_type));
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(length));
    headers.insert(header::CONNECTION, HeaderValue::from_static("close"));
    response
}

/// Build an RPC response, pinning the client to `session_id` when given.
pub fn rpc_response(
    status: StatusCode,
    body: String,
    session_id: Option<&str>,
) -> Response<JsonRpcBody> {
    let mut response = plain_response(status, Bytes::from(body), JSON_RPC_CONTENT_TYPE);
    if let Some(session_id) = session_id {
        match session_cookie_value(session_id) {
            Ok(cookie) => {
                response.headers_mut().insert(header::SET_COOKIE, cookie);
            }
            Err(err) => warn!("Session id is not a valid cookie value: {}", err),
        }
    }
    response
}

/// Build an RPC response whose body is a single fault.
pub fn fault_response(
    status: StatusCode,
    fault: &JsonRpcError,
    session_id: Option<&str>,
) -> Response<JsonRpcBody> {
    let body = serde_json::to_string(fault).unwrap_or_else(|err| {
        error!("Failed to serialize fault: {}", err);
        SERIALIZATION_FALLBACK.to_string()
    });
    rpc_response(status, body, session_id)
}

/// The fault sent when request handling fails outside of dispatch
pub fn server_fault() -> JsonRpcError {
    JsonRpcError::internal_error(None, Some("Server error".to_string()))
}

/// 404 for paths other than the RPC endpoints
pub fn not_found_response() -> Response<JsonRpcBody> {
    plain_response(
        StatusCode::NOT_FOUND,
        Bytes::from_static(b"Not Found"),
        "text/plain",
    )
}

/// 405 for HTTP methods other than GET and POST
pub fn method_not_allowed_response() -> Response<JsonRpcBody> {
    let mut response = plain_response(
        StatusCode::METHOD_NOT_ALLOWED,
        Bytes::from_static(b"Method Not Allowed"),
        "text/plain",
    );
    response
        .headers_mut()
        .insert(header::ALLOW, HeaderValue::from_static("GET, POST"));
    response
}
