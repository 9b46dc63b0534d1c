//! Burrow Core - instance registry, daemonization and RPC control plane.
//!
//! Every burrow instance is an independent OS process. Instances find each
//! other through a directory tree under `~/.burrow` and answer queries over
//! a small JSON-RPC server bound to localhost. This crate owns that control
//! plane; the tunnel itself is plugged in through [`TunnelEngine`].
//!
//! # Example
//!
//! ```rust,ignore
//! use burrow_core::{ControlPlane, FsRegistry};
//!
//! #[tokio::main]
//! async fn main() -> burrow_core::Result<()> {
//!     let plane = ControlPlane::open(FsRegistry::open_default()?, engine);
//!
//!     for report in plane.show_all_instances().await? {
//!         println!("{} -> {}", report["id"], report["rpc-address"]);
//!     }
//!
//!     plane.stop_instance("db-tunnel").await?;
//!     Ok(())
//! }
//! ```

pub mod alias;
pub mod atomic;
pub mod cancel;
pub mod config;
pub mod control;
pub mod daemon;
pub mod error;
pub mod ipc;
pub mod models;
pub mod orchestrator;
pub mod platform;
pub mod registry;

mod plane;

// Re-export commonly used types
pub use alias::{AliasStore, JsonAliasStore, MemoryAliasStore};
pub use cancel::{CancellationToken, CancelledError};
pub use control::{ControlClient, ControlServer, InstanceReport, SHOW_INSTANCE_METHOD};
pub use daemon::{DetachOutcome, DetachRequest, Detacher, ReexecDetacher};
pub use error::{BurrowError, Result};
pub use ipc::{CallContext, MethodHandler, MethodRegistry};
pub use models::{AddressInput, AddressInputList, Alias, Configuration};
pub use orchestrator::{Orchestrator, StartOutcome, TunnelEngine};
pub use plane::ControlPlane;
pub use platform::{ProcessTable, SystemProcessTable};
pub use registry::{FsRegistry, InstanceRegistry, MemoryRegistry};
