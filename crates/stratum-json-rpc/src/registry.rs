//! Method name → handler table, populated once before the server starts.

use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;

use crate::r#async::JsonRpcHandler;
use crate::error::ToJsonRpcError;

/// Errors raised while building a registry
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("Method name must not be empty")]
    EmptyMethodName,

    #[error("Method '{0}' is already registered")]
    Duplicate(String),

    #[error("Method '{0}' is reserved")]
    Reserved(String),
}

/// Registry of method handlers.
///
/// Read-only once handed to a [`crate::JsonRpcDispatcher`], so lookups need no locking.
pub struct MethodRegistry<E>
where
    E: ToJsonRpcError,
{
    handlers: HashMap<String, Arc<dyn JsonRpcHandler<Error = E>>>,
    reserved: Vec<String>,
}

impl<E> MethodRegistry<E>
where
    E: ToJsonRpcError,
{
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
            reserved: Vec::new(),
        }
    }

    /// Reserve a name so that only [`MethodRegistry::register_reserved`] may bind it.
    pub fn reserve(mut self, method: impl Into<String>) -> Self {
        self.reserved.push(method.into());
        self
    }

    /// Register a handler for a specific method
    pub fn register<H>(
        &mut self,
        method: impl Into<String>,
        handler: H,
    ) -> Result<(), RegistryError>
    where
        H: JsonRpcHandler<Error = E> + 'static,
    {
        self.insert(method.into(), Arc::new(handler), false)
    }

    /// Register one handler for several methods
    pub fn register_methods<H, I, S>(&mut self, methods: I, handler: H) -> Result<(), RegistryError>
    where
        H: JsonRpcHandler<Error = E> + 'static,
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let handler: Arc<dyn JsonRpcHandler<Error = E>> = Arc::new(handler);
        for method in methods {
            self.insert(method.into(), Arc::clone(&handler), false)?;
        }
        Ok(())
    }

    /// Bind a reserved name. Used by the server to install built-in methods.
    pub fn register_reserved<H>(&mut self, method: &str, handler: H) -> Result<(), RegistryError>
    where
        H: JsonRpcHandler<Error = E> + 'static,
    {
        self.insert(method.to_string(), Arc::new(handler), true)
    }

    fn insert(
        &mut self,
        method: String,
        handler: Arc<dyn JsonRpcHandler<Error = E>>,
        allow_reserved: bool,
    ) -> Result<(), RegistryError> {
        if method.is_empty() {
            return Err(RegistryError::EmptyMethodName);
        }
        if !allow_reserved && self.reserved.iter().any(|r| *r == method) {
            return Err(RegistryError::Reserved(method));
        }
        if self.handlers.contains_key(&method) {
            return Err(RegistryError::Duplicate(method));
        }
        self.handlers.insert(method, handler);
        Ok(())
    }

    pub fn get(&self, method: &str) -> Option<&Arc<dyn JsonRpcHandler<Error = E>>> {
        self.handlers.get(method)
    }

    pub fn contains(&self, method: &str) -> bool {
        self.handlers.contains_key(method)
    }

    /// Registered method names, sorted
    pub fn methods(&self) -> Vec<String> {
        let mut methods: Vec<String> = self.handlers.keys().cloned().collect();
        methods.sort();
        methods
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl<E> Default for MethodRegistry<E>
where
    E: ToJsonRpcError,
{
    fn default() -> Self {
        Self::new()
    }
}
