//! The four operations a command-line front end needs.

use crate::cancel::CancellationToken;
use crate::control::{ControlClient, InstanceReport};
use crate::daemon::{stop_instance, Detacher, ReexecDetacher};
use crate::ipc::{CallContext, MethodRegistry};
use crate::models::Configuration;
use crate::orchestrator::{Orchestrator, StartOutcome, TunnelEngine};
use crate::platform::{ProcessTable, SystemProcessTable};
use crate::registry::{FsRegistry, InstanceRegistry};
use crate::{BurrowError, Result};
use std::sync::Arc;

/// Facade over registry, daemon, control client and orchestrator.
pub struct ControlPlane {
    registry: Arc<dyn InstanceRegistry>,
    process_table: Arc<dyn ProcessTable>,
    orchestrator: Orchestrator,
    client: ControlClient,
}

impl ControlPlane {
    pub fn new(
        registry: Arc<dyn InstanceRegistry>,
        process_table: Arc<dyn ProcessTable>,
        detacher: Arc<dyn Detacher>,
        engine: Arc<dyn TunnelEngine>,
    ) -> Self {
        Self {
            orchestrator: Orchestrator::new(registry.clone(), detacher, engine),
            client: ControlClient::new(registry.clone(), process_table.clone()),
            registry,
            process_table,
        }
    }

    /// Control plane over the default home (`~/.burrow`), the host process
    /// table and re-exec detachment.
    pub fn open_default(engine: Arc<dyn TunnelEngine>) -> Result<Self> {
        let registry = FsRegistry::open_default()?;
        Ok(Self::open(registry, engine))
    }

    /// Like [`open_default`](Self::open_default) with an explicit registry.
    pub fn open(registry: FsRegistry, engine: Arc<dyn TunnelEngine>) -> Self {
        let detacher = Arc::new(ReexecDetacher::new(registry.clone()));
        Self::new(
            Arc::new(registry),
            Arc::new(SystemProcessTable),
            detacher,
            engine,
        )
    }

    /// Context (timeout, cancellation) used for every RPC call.
    pub fn with_call_context(mut self, ctx: CallContext) -> Self {
        self.client = self.client.with_context(ctx);
        self
    }

    /// Extra RPC methods served by instances started through this plane.
    pub fn with_methods(mut self, methods: MethodRegistry) -> Self {
        self.orchestrator = self.orchestrator.with_methods(methods);
        self
    }

    pub fn registry(&self) -> &Arc<dyn InstanceRegistry> {
        &self.registry
    }

    pub async fn start_instance(
        &self,
        config: Configuration,
        shutdown: CancellationToken,
    ) -> Result<StartOutcome> {
        self.orchestrator.start_instance(config, shutdown).await
    }

    /// Stop a detached instance; returns the pid that was terminated.
    pub async fn stop_instance(&self, id: &str) -> Result<u32> {
        let registry = self.registry.clone();
        let process_table = self.process_table.clone();
        let id = id.to_string();

        // Termination polls with blocking sleeps.
        tokio::task::spawn_blocking(move || stop_instance(&*registry, &*process_table, &id))
            .await
            .map_err(|e| BurrowError::Other(format!("stop task failed: {}", e)))?
    }

    pub async fn show_instance(&self, id: &str) -> Result<InstanceReport> {
        self.client.show_one(id).await
    }

    pub async fn show_all_instances(&self) -> Result<Vec<InstanceReport>> {
        self.client.show_all().await
    }
}
