//! # Session Storage
//!
//! Cookie-keyed sessions for the Stratum HTTP gateway. Each session owns a FIFO
//! queue of wire-ready messages produced between client polls; any HTTP request
//! on the session drains it.
//!
//! The [`SessionStorage`] trait is the contract the server depends on. The
//! in-memory backend is the only one shipped: sessions are ephemeral and do not
//! survive a restart.

// Core trait and types
mod traits;
pub use traits::*;

// Implementations
#[cfg(feature = "in-memory")]
pub mod in_memory;
pub mod prelude;

// Re-export for convenience
/// In-memory session storage implementation
#[cfg(feature = "in-memory")]
pub use in_memory::{InMemoryConfig, InMemorySessionStorage, InMemoryStats};

/// Create a default in-memory session storage instance
#[cfg(feature = "in-memory")]
pub fn create_default_storage() -> InMemorySessionStorage {
    InMemorySessionStorage::new()
}

/// Create an in-memory session storage with custom limits
#[cfg(feature = "in-memory")]
pub fn create_memory_storage(config: InMemoryConfig) -> InMemorySessionStorage {
    InMemorySessionStorage::with_config(config)
}
