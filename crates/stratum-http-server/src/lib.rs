//! # Stratum HTTP Server
//!
//! Session-aware JSON-RPC over HTTP. Every client is pinned to a session by a
//! `SESSION` cookie; synchronous replies and messages pushed to the session
//! between requests share the same HTTP round trip.
//!
//! ## Features
//! - GET is a bare poll, POST carries a request or a batch
//! - Bounded, deadline-limited body reads
//! - One task per connection, no keep-alive
//! - Idle-session eviction and a built-in `stop` method

pub mod body;
pub mod cookie;
pub mod json_rpc_responses;
pub mod notification_bridge;
pub mod prelude;
pub mod server;
pub mod session_dispatch;
pub mod session_handler;

#[cfg(test)]
mod tests;

// Re-export main types
pub use body::{BodyLimits, read_body};
pub use cookie::{SESSION_COOKIE, extract_session_cookie, session_cookie_value};
pub use notification_bridge::StorageOutbox;
pub use server::{
    HttpRpcServer, HttpRpcServerBuilder, MIN_READ_BUFFER_SIZE, STOP_METHOD, ServerConfig,
    ServerStats,
};
pub use session_dispatch::SessionDispatcher;
pub use session_handler::SessionHttpHandler;

// Re-export foundational types
pub use stratum_json_rpc::{JsonRpcDispatcher, JsonRpcHandler, MethodError, SessionContext};

/// Result type for HTTP RPC operations
pub type Result<T> = std::result::Result<T, HttpRpcError>;

/// HTTP RPC specific errors
#[derive(Debug, thiserror::Error)]
pub enum HttpRpcError {
    #[error("HTTP error: {0}")]
    Http(#[from] hyper::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Session storage error: {0}")]
    Storage(#[from] stratum_session_storage::SessionStorageError),

    #[error("Method registration error: {0}")]
    Registry(#[from] stratum_json_rpc::RegistryError),

    #[error("Failed to read request body: {0}")]
    BodyRead(String),

    #[error("Timed out reading request body")]
    BodyTimeout,

    #[error("Request body exceeds {limit} bytes")]
    PayloadTooLarge { limit: usize },

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Invalid server configuration: {0}")]
    Config(String),
}
