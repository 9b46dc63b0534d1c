//! Execution of resolved plans.

use crate::cli::Plan;
use crate::relay::RelayEngine;
use anyhow::{Context, Result};
use burrow_core::{
    AliasStore, BurrowError, CancellationToken, ControlPlane, FsRegistry, JsonAliasStore,
    StartOutcome,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub async fn execute(plan: Plan, registry: FsRegistry, aliases: &JsonAliasStore) -> Result<()> {
    match plan {
        Plan::Start(config) => {
            let plane = ControlPlane::open(registry, Arc::new(RelayEngine));
            let shutdown = CancellationToken::new();
            tokio::spawn(cancel_on_signal(shutdown.clone()));

            match plane.start_instance(config, shutdown).await? {
                StartOutcome::Detached { id, pid } => {
                    info!(id = %id, pid, "Instance running in the background")
                }
                StartOutcome::Finished { id } => info!(id = %id, "Instance stopped"),
            }
        }
        Plan::AddAlias(alias) => {
            aliases.save(&alias)?;
            info!(name = %alias.name, "Alias saved");
        }
        Plan::DeleteAlias(name) => {
            if !aliases.delete(&name)? {
                return Err(BurrowError::AliasNotFound { name }.into());
            }
            info!(name = %name, "Alias deleted");
        }
        Plan::ShowAlias(Some(name)) => print_json(&aliases.require(&name)?)?,
        Plan::ShowAlias(None) => print_json(&aliases.list()?)?,
        Plan::ShowInstances(Some(id)) => {
            let plane = ControlPlane::open(registry, Arc::new(RelayEngine));
            let report = plane
                .show_instance(&id)
                .await
                .with_context(|| format!("could not query instance {}", id))?;
            print_json(&report)?;
        }
        Plan::ShowInstances(None) => {
            let plane = ControlPlane::open(registry, Arc::new(RelayEngine));
            print_json(&plane.show_all_instances().await?)?;
        }
        Plan::Stop(id) => {
            let plane = ControlPlane::open(registry, Arc::new(RelayEngine));
            let pid = plane.stop_instance(&id).await?;
            info!(id = %id, pid, "Instance stopped");
        }
    }
    Ok(())
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Cancel `token` on Ctrl-C, or SIGTERM on Unix.
async fn cancel_on_signal(token: CancellationToken) {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => debug!("Received Ctrl-C"),
                    _ = term.recv() => debug!("Received SIGTERM"),
                }
            }
            Err(e) => {
                warn!("Could not install SIGTERM handler: {}", e);
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Could not install Ctrl-C handler: {}", e);
            return;
        }
        debug!("Received Ctrl-C");
    }

    token.cancel();
}
