//! Startup sequence of one instance.
//!
//! 1. detach if requested (the parent stops here)
//! 2. ensure the instance directory exists
//! 3. start the control server and publish its address, if RPC is enabled
//! 4. hand the resolved configuration to the tunnel engine
//!
//! Any failure before step 4 aborts without a tunnel attempt.

use crate::cancel::CancellationToken;
use crate::config::AppConfig;
use crate::control::ControlServer;
use crate::daemon::{detached_instance_id, DetachOutcome, DetachRequest, Detacher};
use crate::ipc::MethodRegistry;
use crate::models::Configuration;
use crate::registry::InstanceRegistry;
use crate::{BurrowError, Result};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// The data plane driven by an instance.
#[async_trait::async_trait]
pub trait TunnelEngine: Send + Sync {
    /// Human-readable identity for logs.
    fn describe(&self) -> String;

    /// Run the tunnel until it fails or is dropped.
    async fn start(&self, config: &Configuration) -> Result<()>;
}

/// How [`Orchestrator::start_instance`] ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartOutcome {
    /// This process was the detaching parent; the instance runs as `pid`.
    Detached { id: String, pid: u32 },
    /// The instance ran in this process and has shut down.
    Finished { id: String },
}

/// Drives one instance from configuration to running tunnel.
pub struct Orchestrator {
    registry: Arc<dyn InstanceRegistry>,
    detacher: Arc<dyn Detacher>,
    engine: Arc<dyn TunnelEngine>,
    methods: MethodRegistry,
}

impl Orchestrator {
    pub fn new(
        registry: Arc<dyn InstanceRegistry>,
        detacher: Arc<dyn Detacher>,
        engine: Arc<dyn TunnelEngine>,
    ) -> Self {
        Self {
            registry,
            detacher,
            engine,
            methods: MethodRegistry::new(),
        }
    }

    /// Additional RPC methods served next to `show-instance`.
    pub fn with_methods(mut self, methods: MethodRegistry) -> Self {
        self.methods = methods;
        self
    }

    /// Start an instance and run it until the engine returns or `shutdown`
    /// is cancelled.
    ///
    /// After a graceful shutdown the instance directory is removed. When the
    /// engine fails the directory is left in place with its log.
    pub async fn start_instance(
        &self,
        mut config: Configuration,
        shutdown: CancellationToken,
    ) -> Result<StartOutcome> {
        if config.detach {
            if config.id.is_empty() {
                config.id = detached_instance_id().unwrap_or_else(generate_instance_id);
            }

            match self.detacher.detach(&DetachRequest::current(&config.id))? {
                DetachOutcome::Parent { pid } => {
                    return Ok(StartOutcome::Detached { id: config.id, pid });
                }
                DetachOutcome::Child => {}
            }
        }

        if config.id.is_empty() {
            config.id = std::process::id().to_string();
        }

        if let Some(dest) = config.destination.iter().find(|d| d.port.is_none()) {
            return Err(BurrowError::InvalidAddress {
                value: dest.to_string(),
                message: "destination address must include a port".to_string(),
            });
        }

        let id = config.id.clone();
        self.registry.ensure_directory(&id)?;

        let shared = Arc::new(RwLock::new(config));
        let rpc = {
            let config = shared.read().await;
            config.rpc.then(|| config.rpc_address.clone())
        };
        let mut server = match rpc {
            Some(listen) => Some(
                ControlServer::start(
                    &*self.registry,
                    &id,
                    &listen,
                    shared.clone(),
                    self.methods.clone(),
                )
                .await?,
            ),
            None => None,
        };

        let resolved = shared.read().await.clone();
        info!(id = %id, engine = %self.engine.describe(), "Starting tunnel");

        let result = tokio::select! {
            result = self.engine.start(&resolved) => result,
            _ = shutdown.cancelled() => {
                info!(id = %id, "Shutdown requested");
                Ok(())
            }
        };

        if let Some(server) = server.as_mut() {
            server.shutdown();
        }

        match result {
            Ok(()) => {
                if let Err(e) = self.registry.remove_directory(&id) {
                    warn!(id = %id, error = %e, "Failed to remove instance directory");
                }
                debug!(id = %id, "Instance finished");
                Ok(StartOutcome::Finished { id })
            }
            Err(e) => Err(e),
        }
    }
}

/// Short random instance id.
pub fn generate_instance_id() -> String {
    uuid::Uuid::new_v4()
        .simple()
        .to_string()
        .chars()
        .take(AppConfig::GENERATED_ID_LEN)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::MemoryRegistry;
    use std::sync::Mutex;
    use std::time::Duration;

    #[derive(Default)]
    struct RecordingEngine {
        seen: Mutex<Vec<Configuration>>,
        published: Mutex<Vec<String>>,
        registry: Option<Arc<MemoryRegistry>>,
        fail: bool,
        hang: bool,
    }

    #[async_trait::async_trait]
    impl TunnelEngine for RecordingEngine {
        fn describe(&self) -> String {
            "recording".to_string()
        }

        async fn start(&self, config: &Configuration) -> Result<()> {
            self.seen.lock().unwrap().push(config.clone());
            if let Some(registry) = &self.registry {
                let addr = registry.read_address(&config.id).unwrap();
                self.published.lock().unwrap().push(addr);
            }
            if self.hang {
                tokio::time::sleep(Duration::from_secs(60)).await;
            }
            if self.fail {
                return Err(BurrowError::Tunnel {
                    message: "server refused".to_string(),
                });
            }
            Ok(())
        }
    }

    struct FixedDetacher(DetachOutcome);

    impl Detacher for FixedDetacher {
        fn detach(&self, _request: &DetachRequest) -> Result<DetachOutcome> {
            Ok(self.0)
        }
    }

    fn config(id: &str) -> Configuration {
        let mut config = Configuration {
            id: id.to_string(),
            ..Configuration::default()
        };
        config.destination.push_str("127.0.0.1:5432").unwrap();
        config
    }

    fn orchestrator(
        registry: Arc<MemoryRegistry>,
        detach: DetachOutcome,
        engine: Arc<RecordingEngine>,
    ) -> Orchestrator {
        Orchestrator::new(registry, Arc::new(FixedDetacher(detach)), engine)
    }

    #[tokio::test]
    async fn test_foreground_publishes_then_cleans_up() {
        let registry = Arc::new(MemoryRegistry::new());
        let engine = Arc::new(RecordingEngine {
            registry: Some(registry.clone()),
            ..RecordingEngine::default()
        });

        let outcome = orchestrator(registry.clone(), DetachOutcome::Child, engine.clone())
            .start_instance(config("web"), CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(outcome, StartOutcome::Finished { id: "web".into() });

        let seen = engine.seen.lock().unwrap();
        let published = engine.published.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert!(!seen[0].rpc_address.ends_with(":0"));
        assert_eq!(published[0], seen[0].rpc_address);

        assert!(registry.list_instance_ids().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_rpc_disabled_publishes_nothing() {
        let registry = Arc::new(MemoryRegistry::new());
        let engine = Arc::new(RecordingEngine {
            registry: Some(registry.clone()),
            ..RecordingEngine::default()
        });

        let mut cfg = config("quiet");
        cfg.rpc = false;
        orchestrator(registry, DetachOutcome::Child, engine.clone())
            .start_instance(cfg, CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(engine.published.lock().unwrap()[0], "");
    }

    #[tokio::test]
    async fn test_detach_parent_generates_id_and_skips_engine() {
        let registry = Arc::new(MemoryRegistry::new());
        let engine = Arc::new(RecordingEngine::default());

        let mut cfg = config("");
        cfg.detach = true;
        let outcome = orchestrator(registry, DetachOutcome::Parent { pid: 4242 }, engine.clone())
            .start_instance(cfg, CancellationToken::new())
            .await
            .unwrap();

        match outcome {
            StartOutcome::Detached { id, pid } => {
                assert_eq!(pid, 4242);
                if detached_instance_id().is_none() {
                    assert_eq!(id.len(), AppConfig::GENERATED_ID_LEN);
                }
            }
            other => panic!("Expected Detached, got: {:?}", other),
        }
        assert!(engine.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_foreground_without_id_uses_pid() {
        let registry = Arc::new(MemoryRegistry::new());
        let engine = Arc::new(RecordingEngine::default());

        let mut cfg = config("");
        cfg.rpc = false;
        let outcome = orchestrator(registry, DetachOutcome::Child, engine)
            .start_instance(cfg, CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(
            outcome,
            StartOutcome::Finished {
                id: std::process::id().to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_destination_without_port_is_rejected() {
        let registry = Arc::new(MemoryRegistry::new());
        let engine = Arc::new(RecordingEngine::default());

        let mut cfg = config("db");
        cfg.destination.push_str("db.internal").unwrap();

        let result = orchestrator(registry.clone(), DetachOutcome::Child, engine.clone())
            .start_instance(cfg, CancellationToken::new())
            .await;

        assert!(matches!(result, Err(BurrowError::InvalidAddress { .. })));
        assert!(engine.seen.lock().unwrap().is_empty());
        assert!(registry.list_instance_ids().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_engine_error_is_propagated() {
        let registry = Arc::new(MemoryRegistry::new());
        let engine = Arc::new(RecordingEngine {
            fail: true,
            ..RecordingEngine::default()
        });

        let result = orchestrator(registry.clone(), DetachOutcome::Child, engine)
            .start_instance(config("broken"), CancellationToken::new())
            .await;

        match result {
            Err(BurrowError::Tunnel { message }) => assert_eq!(message, "server refused"),
            other => panic!("Expected Tunnel, got: {:?}", other),
        }
        assert_eq!(registry.list_instance_ids().unwrap(), vec!["broken"]);
    }

    #[tokio::test]
    async fn test_shutdown_stops_running_engine() {
        let registry = Arc::new(MemoryRegistry::new());
        let engine = Arc::new(RecordingEngine {
            hang: true,
            ..RecordingEngine::default()
        });
        let shutdown = CancellationToken::new();

        let trigger = shutdown.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.cancel();
        });

        let outcome = orchestrator(registry.clone(), DetachOutcome::Child, engine)
            .start_instance(config("long"), shutdown)
            .await
            .unwrap();

        assert_eq!(outcome, StartOutcome::Finished { id: "long".into() });
        assert!(registry.list_instance_ids().unwrap().is_empty());
    }

    #[test]
    fn test_generated_ids_are_short_and_hex() {
        let id = generate_instance_id();
        assert_eq!(id.len(), AppConfig::GENERATED_ID_LEN);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(generate_instance_id(), id);
    }
}
