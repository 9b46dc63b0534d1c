//! Queries against other instances' control servers.

use super::server::SHOW_INSTANCE_METHOD;
use crate::ipc::{CallContext, IpcClient};
use crate::platform::ProcessTable;
use crate::registry::InstanceRegistry;
use crate::{BurrowError, Result};
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::debug;

/// One instance's configuration as reported over RPC.
pub type InstanceReport = Map<String, Value>;

/// Client resolving instances through the registry.
#[derive(Clone)]
pub struct ControlClient {
    registry: Arc<dyn InstanceRegistry>,
    process_table: Arc<dyn ProcessTable>,
    ctx: CallContext,
}

impl ControlClient {
    pub fn new(registry: Arc<dyn InstanceRegistry>, process_table: Arc<dyn ProcessTable>) -> Self {
        Self {
            registry,
            process_table,
            ctx: CallContext::default(),
        }
    }

    /// Use `ctx` for every call made by this client. Each call gets the full
    /// timeout of its own.
    pub fn with_context(mut self, ctx: CallContext) -> Self {
        self.ctx = ctx;
        self
    }

    /// Call `method` on instance `id`.
    ///
    /// An instance that has not published an address is
    /// [`BurrowError::InstanceNotReady`].
    pub async fn call_by_id(&self, id: &str, method: &str, params: Value) -> Result<Value> {
        let addr = self.registry.read_address(id)?;
        if addr.is_empty() {
            return Err(BurrowError::InstanceNotReady { id: id.to_string() });
        }

        IpcClient::new(addr).call(&self.ctx, method, params).await
    }

    /// Configuration of one instance. Every failure is returned.
    pub async fn show_one(&self, id: &str) -> Result<InstanceReport> {
        let value = self.call_by_id(id, SHOW_INSTANCE_METHOD, Value::Null).await?;
        into_report(value)
    }

    /// Configuration of every live, reachable instance.
    ///
    /// Entries without a live process, without a published address, or whose
    /// call fails are left out. Only a failure to enumerate the registry is
    /// returned as an error.
    pub async fn show_all(&self) -> Result<Vec<InstanceReport>> {
        let mut reports = Vec::new();

        for id in self.registry.list_instance_ids()? {
            let pid = match self.registry.read_pid(&id) {
                Ok(pid) => pid,
                Err(e) => {
                    debug!(id = %id, error = %e, "skipping instance: pid could not be resolved");
                    continue;
                }
            };

            if !self.process_table.exists(pid) {
                debug!(id = %id, pid, "skipping instance: process is not running");
                continue;
            }

            let rpc = match self.registry.read_address(&id) {
                Ok(addr) if !addr.is_empty() => addr,
                Ok(_) => {
                    debug!(id = %id, pid, "skipping instance: no rpc address published");
                    continue;
                }
                Err(e) => {
                    debug!(id = %id, pid, error = %e, "skipping instance: rpc address unreadable");
                    continue;
                }
            };

            let value = match IpcClient::new(rpc.as_str())
                .call(&self.ctx, SHOW_INSTANCE_METHOD, Value::Null)
                .await
            {
                Ok(value) => value,
                Err(e) => {
                    debug!(
                        id = %id,
                        rpc = %rpc,
                        transport = e.is_transport(),
                        error = %e,
                        "skipping instance: show-instance call failed"
                    );
                    continue;
                }
            };

            match into_report(value) {
                Ok(report) => reports.push(report),
                Err(e) => debug!(id = %id, rpc = %rpc, error = %e, "skipping instance"),
            }
        }

        Ok(reports)
    }
}

fn into_report(value: Value) -> Result<InstanceReport> {
    match value {
        Value::Object(map) => Ok(map),
        other => Err(BurrowError::Protocol {
            message: format!("expected an object from {}, got {}", SHOW_INSTANCE_METHOD, other),
        }),
    }
}
