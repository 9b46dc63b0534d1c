//! Filesystem-backed instance registry for cross-process discovery.
//!
//! Every running instance owns one directory directly under the burrow home:
//!
//! ```text
//! <home>/<instance-id>/pid         # decimal process id, detached instances only
//! <home>/<instance-id>/rpc         # "<host>:<port>", RPC-enabled instances only
//! <home>/<instance-id>/burrow.log  # daemon log output, detached instances only
//! ```
//!
//! Directory existence does not imply liveness. Readers must tolerate
//! directories without `pid`/`rpc` files (startup in progress, RPC disabled)
//! and directories left behind by crashed processes.

pub mod fs_registry;
pub mod memory;

pub use fs_registry::FsRegistry;
pub use memory::MemoryRegistry;

use crate::config::RegistryConfig;
use crate::{BurrowError, Result};
use std::path::PathBuf;

/// Storage backend for instance registry entries.
///
/// Each process only ever writes to its own instance's entry.
pub trait InstanceRegistry: Send + Sync {
    /// Deterministic location of an instance directory. Never touches disk.
    fn resolve_directory(&self, id: &str) -> Result<PathBuf>;

    /// Create the instance directory (and the home directory) if absent.
    fn ensure_directory(&self, id: &str) -> Result<PathBuf>;

    /// Published RPC address of an instance, or empty if not yet published.
    fn read_address(&self, id: &str) -> Result<String>;

    /// Publish the RPC address of an instance.
    fn publish_address(&self, id: &str, addr: &str) -> Result<()>;

    /// Pid stored in the instance's pid file, `None` if there is no pid file.
    fn read_pid_file(&self, id: &str) -> Result<Option<u32>>;

    /// Store the pid file of an instance.
    fn write_pid_file(&self, id: &str, pid: u32) -> Result<()>;

    /// Remove the pid file of an instance. Missing files are not an error.
    fn remove_pid_file(&self, id: &str) -> Result<()>;

    /// Ids of every registry entry, in enumeration order.
    fn list_instance_ids(&self) -> Result<Vec<String>>;

    /// Remove an instance directory and everything in it.
    fn remove_directory(&self, id: &str) -> Result<()>;

    /// Resolve the pid of an instance.
    ///
    /// A numeric `id` is taken as a raw pid without any lookup, so operators
    /// can target an OS process directly.
    fn read_pid(&self, id: &str) -> Result<u32> {
        if let Ok(pid) = id.parse::<u32>() {
            return Ok(pid);
        }

        match self.read_pid_file(id)? {
            Some(pid) => Ok(pid),
            None => {
                let path = self
                    .resolve_directory(id)?
                    .join(RegistryConfig::PID_FILE_NAME);
                Err(BurrowError::io_with_path(
                    std::io::Error::new(std::io::ErrorKind::NotFound, "pid file not found"),
                    path,
                ))
            }
        }
    }
}

/// Reject ids that would escape the home directory when joined.
pub(crate) fn validate_instance_id(id: &str) -> Result<()> {
    if id.is_empty()
        || id == "."
        || id == ".."
        || id.contains('/')
        || id.contains('\\')
    {
        return Err(BurrowError::InvalidParams {
            message: format!("invalid instance id {:?}", id),
        });
    }
    Ok(())
}

/// Parse pid file contents.
pub(crate) fn parse_pid(id: &str, contents: &str) -> Result<u32> {
    contents
        .trim()
        .parse::<u32>()
        .map_err(|_| BurrowError::InvalidPid {
            id: id.to_string(),
            value: contents.to_string(),
        })
}
