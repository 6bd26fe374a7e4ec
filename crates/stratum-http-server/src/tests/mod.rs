//! Test modules for stratum-http-server
//!
//! Handler tests drive [`SessionHttpHandler`](crate::SessionHttpHandler) with
//! in-memory bodies; end-to-end tests speak raw HTTP/1.1 to a running server.

mod common;
