//! # Session Storage Prelude
//!
//! ```rust
//! use stratum_session_storage::prelude::*;
//! ```

// Core trait and types
pub use crate::traits::{
    BoxedSessionStorage, SessionInfo, SessionResolution, SessionStorage, SessionStorageError,
};

#[cfg(feature = "in-memory")]
pub use crate::in_memory::{InMemoryConfig, InMemorySessionStorage, InMemoryStats};

// Convenience functions
#[cfg(feature = "in-memory")]
pub use crate::{create_default_storage, create_memory_storage};
