//! Control server embedded in every RPC-enabled instance.

use crate::ipc::{IpcServer, IpcServerHandle, MethodHandler, MethodRegistry};
use crate::models::Configuration;
use crate::registry::InstanceRegistry;
use crate::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;

/// Name of the method returning an instance's live configuration.
pub const SHOW_INSTANCE_METHOD: &str = "show-instance";

/// Configuration shared between the orchestrator and the control server.
pub type SharedConfiguration = Arc<RwLock<Configuration>>;

/// `show-instance` handler: snapshots the configuration it was built with.
pub struct ShowInstance {
    config: SharedConfiguration,
}

impl ShowInstance {
    pub fn new(config: SharedConfiguration) -> Self {
        Self { config }
    }
}

#[async_trait::async_trait]
impl MethodHandler for ShowInstance {
    async fn call(&self, _params: serde_json::Value) -> Result<serde_json::Value> {
        let snapshot = self.config.read().await.clone();
        Ok(serde_json::to_value(snapshot)?)
    }
}

/// A running control server. Dropping it stops the listener.
pub struct ControlServer {
    id: String,
    handle: IpcServerHandle,
}

impl ControlServer {
    /// Bind `listen`, serve `methods` plus `show-instance`, and publish the
    /// bound address for instance `id`.
    ///
    /// The configuration's `rpc-address` is updated to the concrete bound
    /// address before it is published, so anyone who discovers the instance
    /// also sees the real address in its configuration.
    pub async fn start(
        registry: &dyn InstanceRegistry,
        id: &str,
        listen: &str,
        config: SharedConfiguration,
        methods: MethodRegistry,
    ) -> Result<Self> {
        let methods = methods.register(SHOW_INSTANCE_METHOD, ShowInstance::new(config.clone()));
        let handle = IpcServer::start(listen, Arc::new(methods)).await?;
        let addr = handle.addr().to_string();

        config.write().await.rpc_address = addr.clone();
        registry.publish_address(id, &addr)?;

        info!(id, rpc = %addr, "Control server ready");

        Ok(Self {
            id: id.to_string(),
            handle,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn addr(&self) -> SocketAddr {
        self.handle.addr()
    }

    pub fn shutdown(&mut self) {
        self.handle.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ipc::{CallContext, IpcClient};
    use crate::registry::MemoryRegistry;

    #[tokio::test]
    async fn test_start_publishes_bound_address() {
        let registry = MemoryRegistry::new();
        let config = Arc::new(RwLock::new(Configuration {
            id: "api".to_string(),
            ..Configuration::default()
        }));

        let mut server = ControlServer::start(
            &registry,
            "api",
            "127.0.0.1:0",
            config.clone(),
            MethodRegistry::new(),
        )
        .await
        .unwrap();

        let published = registry.read_address("api").unwrap();
        assert_eq!(published, server.addr().to_string());
        assert_ne!(server.addr().port(), 0);
        assert_eq!(config.read().await.rpc_address, published);

        server.shutdown();
    }

    #[tokio::test]
    async fn test_show_instance_reflects_live_configuration() {
        let registry = MemoryRegistry::new();
        let config = Arc::new(RwLock::new(Configuration {
            id: "api".to_string(),
            ..Configuration::default()
        }));

        let mut server = ControlServer::start(
            &registry,
            "api",
            "127.0.0.1:0",
            config.clone(),
            MethodRegistry::new(),
        )
        .await
        .unwrap();

        config.write().await.verbose = true;

        let client = IpcClient::new(server.addr().to_string());
        let value = client
            .call(&CallContext::default(), SHOW_INSTANCE_METHOD, serde_json::Value::Null)
            .await
            .unwrap();

        assert_eq!(value["id"], "api");
        assert_eq!(value["verbose"], true);
        assert_eq!(value["rpc-address"], server.addr().to_string());

        server.shutdown();
    }

    #[tokio::test]
    async fn test_extra_methods_are_served() {
        let registry = MemoryRegistry::new();
        let config = Arc::new(RwLock::new(Configuration::default()));
        let methods = MethodRegistry::new().register(
            "uptime",
            |_: serde_json::Value| -> Result<serde_json::Value> { Ok(serde_json::json!(42)) },
        );

        let mut server = ControlServer::start(&registry, "x", "127.0.0.1:0", config, methods)
            .await
            .unwrap();

        let client = IpcClient::new(server.addr().to_string());
        let value = client
            .call(&CallContext::default(), "uptime", serde_json::Value::Null)
            .await
            .unwrap();
        assert_eq!(value, serde_json::json!(42));

        server.shutdown();
    }
}
