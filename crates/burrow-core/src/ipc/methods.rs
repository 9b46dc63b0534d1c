//! Explicit method-name → handler registry.
//!
//! Built once by whoever embeds an [`IpcServer`](super::IpcServer), then
//! frozen behind an `Arc`. Lookups never take a lock.

use super::server::IpcDispatch;
use crate::{BurrowError, Result};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// A single RPC method.
///
/// Handlers are expected to be short, read-only operations; the server does
/// not cancel a handler midway.
#[async_trait::async_trait]
pub trait MethodHandler: Send + Sync + 'static {
    async fn call(&self, params: serde_json::Value) -> Result<serde_json::Value>;
}

#[async_trait::async_trait]
impl<F> MethodHandler for F
where
    F: Fn(serde_json::Value) -> Result<serde_json::Value> + Send + Sync + 'static,
{
    async fn call(&self, params: serde_json::Value) -> Result<serde_json::Value> {
        self(params)
    }
}

/// Mapping from method name to handler.
#[derive(Clone, Default)]
pub struct MethodRegistry {
    handlers: HashMap<String, Arc<dyn MethodHandler>>,
}

impl MethodRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler, builder style. A later registration under the same
    /// name replaces the earlier one.
    pub fn register(mut self, name: impl Into<String>, handler: impl MethodHandler) -> Self {
        self.insert(name, handler);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, handler: impl MethodHandler) {
        self.handlers.insert(name.into(), Arc::new(handler));
    }

    pub fn contains(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    /// Registered method names, sorted.
    pub fn methods(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl fmt::Debug for MethodRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodRegistry")
            .field("methods", &self.methods())
            .finish()
    }
}

#[async_trait::async_trait]
impl IpcDispatch for MethodRegistry {
    async fn dispatch(
        &self,
        method: &str,
        params: serde_json::Value,
    ) -> std::result::Result<serde_json::Value, BurrowError> {
        let handler = self
            .handlers
            .get(method)
            .cloned()
            .ok_or_else(|| BurrowError::MethodNotFound {
                method: method.to_string(),
            })?;
        handler.call(params).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn echo(params: serde_json::Value) -> Result<serde_json::Value> {
        Ok(params)
    }

    #[tokio::test]
    async fn test_dispatch_by_name() {
        let registry = MethodRegistry::new()
            .register("echo", echo)
            .register("ping", |_: serde_json::Value| -> Result<serde_json::Value> {
                Ok(json!("pong"))
            });

        assert_eq!(registry.methods(), vec!["echo", "ping"]);
        assert_eq!(
            registry.dispatch("echo", json!({"a": 1})).await.unwrap(),
            json!({"a": 1})
        );
        assert_eq!(registry.dispatch("ping", json!(null)).await.unwrap(), json!("pong"));
    }

    #[tokio::test]
    async fn test_unknown_method() {
        let registry = MethodRegistry::new().register("echo", echo);
        match registry.dispatch("missing", json!(null)).await {
            Err(BurrowError::MethodNotFound { method }) => assert_eq!(method, "missing"),
            other => panic!("Expected MethodNotFound, got: {:?}", other),
        }
    }

    #[test]
    fn test_registries_are_independent() {
        let a = MethodRegistry::new().register("only-a", echo);
        let b = MethodRegistry::new();
        assert!(a.contains("only-a"));
        assert!(!b.contains("only-a"));
    }
}
