//! JSON-RPC over HTTP handler with cookie sessions
//!
//! Per request: route check, session resolution from the `SESSION` cookie,
//! bounded body read, dispatch and drain, then a response that re-sends the
//! cookie. Every path ends in a well-formed HTTP response.

use std::fmt::Display;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use bytes::Bytes;
use futures::FutureExt;
use http_body::Body;
use hyper::header::CONTENT_LENGTH;
use hyper::{HeaderMap, Method, Request, Response, StatusCode};
use tracing::{debug, error, warn};

use stratum_json_rpc::JsonRpcError;
use stratum_session_storage::BoxedSessionStorage;

use crate::{
    HttpRpcError, ServerConfig,
    body::{BodyLimits, read_body},
    cookie::extract_session_cookie,
    json_rpc_responses::*,
    session_dispatch::SessionDispatcher,
};

/// Payload dispatched for a GET: an empty batch, so only pending messages come back
const POLL_PAYLOAD: &[u8] = b"[]";

/// JSON-RPC over HTTP handler
#[derive(Clone)]
pub struct SessionHttpHandler {
    pub(crate) config: Arc<ServerConfig>,
    pub(crate) dispatcher: SessionDispatcher,
    pub(crate) session_storage: Arc<BoxedSessionStorage>,
}

impl SessionHttpHandler {
    pub fn new(
        config: Arc<ServerConfig>,
        dispatcher: SessionDispatcher,
        session_storage: Arc<BoxedSessionStorage>,
    ) -> Self {
        Self {
            config,
            dispatcher,
            session_storage,
        }
    }

    fn body_limits(&self) -> BodyLimits {
        BodyLimits {
            max_body_size: self.config.max_body_size,
            read_timeout: self.config.body_read_timeout,
        }
    }

    /// Handle a request, turning a panic anywhere in the pipeline into a 500 fault.
    pub async fn serve<B>(&self, req: Request<B>) -> Response<JsonRpcBody>
    where
        B: Body<Data = Bytes>,
        B::Error: Display,
    {
        match AssertUnwindSafe(self.handle_request(req)).catch_unwind().await {
            Ok(response) => response,
            Err(_) => {
                error!("Request handling panicked");
                fault_response(StatusCode::INTERNAL_SERVER_ERROR, &server_fault(), None)
            }
        }
    }

    /// Handle one HTTP exchange
    pub async fn handle_request<B>(&self, req: Request<B>) -> Response<JsonRpcBody>
    where
        B: Body<Data = Bytes>,
        B::Error: Display,
    {
        let method = req.method().clone();
        let path = req.uri().path().to_string();
        debug!("Handling {} {}", method, path);

        if !self.config.rpc_paths.iter().any(|rpc_path| *rpc_path == path) {
            return not_found_response();
        }
        if method != Method::GET && method != Method::POST {
            return method_not_allowed_response();
        }

        let presented = extract_session_cookie(req.headers());
        let session_id = match self.session_storage.resolve_session(presented.as_deref()).await {
            Ok(resolution) => {
                if resolution.created {
                    debug!("Assigned session {}", resolution.session.session_id);
                }
                resolution.session.session_id
            }
            Err(err) => {
                error!("Failed to resolve session: {}", err);
                return fault_response(StatusCode::INTERNAL_SERVER_ERROR, &server_fault(), None);
            }
        };

        let raw = if method == Method::GET {
            Bytes::from_static(POLL_PAYLOAD)
        } else {
            match self.read_post_body(req).await {
                Ok(raw) => raw,
                Err(HttpRpcError::PayloadTooLarge { limit }) => {
                    warn!("Rejected oversized body for session {}", session_id);
                    let fault = JsonRpcError::invalid_request(
                        None,
                        format!("Request body exceeds {limit} bytes"),
                    );
                    return fault_response(StatusCode::PAYLOAD_TOO_LARGE, &fault, Some(&session_id));
                }
                Err(err) => {
                    warn!("Failed to read body for session {}: {}", session_id, err);
                    return fault_response(
                        StatusCode::INTERNAL_SERVER_ERROR,
                        &server_fault(),
                        Some(&session_id),
                    );
                }
            }
        };

        let body = self.dispatcher.dispatch(&session_id, &raw).await;
        rpc_response(StatusCode::OK, body, Some(&session_id))
    }

    async fn read_post_body<B>(&self, req: Request<B>) -> crate::Result<Bytes>
    where
        B: Body<Data = Bytes>,
        B::Error: Display,
    {
        let declared = declared_length(req.headers())?;
        read_body(req.into_body(), declared, &self.body_limits()).await
    }
}

fn declared_length(headers: &HeaderMap) -> crate::Result<Option<usize>> {
    let Some(value) = headers.get(CONTENT_LENGTH) else {
        return Ok(None);
    };
    value
        .to_str()
        .ok()
        .and_then(|s| s.trim().parse::<usize>().ok())
        .map(Some)
        .ok_or_else(|| HttpRpcError::InvalidRequest("malformed Content-Length".to_string()))
}
