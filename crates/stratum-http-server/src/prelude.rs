//! # HTTP Server Prelude
//!
//! ```rust
//! use stratum_http_server::prelude::*;
//! ```

pub use crate::{
    HttpRpcError, HttpRpcServer, HttpRpcServerBuilder, Result, ServerConfig, ServerStats,
    SessionHttpHandler,
};

pub use stratum_json_rpc::prelude::*;
pub use stratum_session_storage::prelude::*;
