//! Daemon lifecycle: detaching an instance into the background and stopping
//! it later from another invocation.
//!
//! ```text
//! Foreground ──detach──▶ Parent: relocate pid/log into <home>/<id>/, exit 0
//!                  └───▶ Child:  continue as Running
//! Running ──burrow stop <id>──▶ SIGTERM (SIGKILL after a grace period), pid file removed
//! ```

mod reexec;
mod stop;

pub use reexec::ReexecDetacher;
pub use stop::stop_instance;

use crate::config::DaemonConfig;
use std::ffi::OsString;

/// What to detach.
#[derive(Debug, Clone)]
pub struct DetachRequest {
    pub id: String,
    /// Arguments the background process is started with (program name excluded).
    pub args: Vec<OsString>,
}

impl DetachRequest {
    /// Request re-running the current command line for instance `id`.
    pub fn current(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            args: std::env::args_os().skip(1).collect(),
        }
    }
}

/// Which side of the detach the caller is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetachOutcome {
    /// The background process `pid` exists and its files are in place.
    /// The caller should exit with status 0.
    Parent { pid: u32 },
    /// The caller is the background process and keeps running.
    Child,
}

/// Capability to move an instance into the background.
pub trait Detacher: Send + Sync {
    fn detach(&self, request: &DetachRequest) -> crate::Result<DetachOutcome>;
}

/// Id handed to this process by a detaching parent, if any.
pub fn detached_instance_id() -> Option<String> {
    std::env::var(DaemonConfig::DETACHED_ENV_VAR)
        .ok()
        .filter(|id| !id.is_empty())
}

/// Message telling the user how to stop a detached instance.
pub fn stop_instructions(id: &str) -> String {
    format!(
        "execute \"burrow stop {}\" if you like to stop it at any time",
        id
    )
}
