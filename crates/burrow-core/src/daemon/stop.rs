use crate::config::DaemonConfig;
use crate::platform::{terminate_process, ProcessTable};
use crate::registry::InstanceRegistry;
use crate::{BurrowError, Result};
use tracing::{info, warn};

/// Stop the detached instance `id`.
///
/// - no pid file: [`BurrowError::NoInstanceRunning`], nothing is signaled
/// - pid file but no such process: the stale pid file is removed and
///   [`BurrowError::ProcessNotFound`] is returned
/// - otherwise SIGTERM, SIGKILL after [`DaemonConfig::STOP_TIMEOUT`], then the
///   pid file is removed
///
/// The rest of the instance directory is left to the stopped process's own
/// shutdown.
pub fn stop_instance(
    registry: &dyn InstanceRegistry,
    process_table: &dyn ProcessTable,
    id: &str,
) -> Result<u32> {
    let pid = registry
        .read_pid_file(id)?
        .ok_or_else(|| BurrowError::NoInstanceRunning { id: id.to_string() })?;

    if !process_table.exists(pid) {
        warn!(id, pid, "Removing stale pid file");
        registry.remove_pid_file(id)?;
        return Err(BurrowError::ProcessNotFound { pid });
    }

    if !terminate_process(pid, DaemonConfig::STOP_TIMEOUT)? {
        return Err(BurrowError::SignalFailed {
            pid,
            message: "process is still running after SIGKILL".to_string(),
        });
    }

    registry.remove_pid_file(id)?;
    info!(id, pid, "Instance stopped");

    Ok(pid)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::MemoryRegistry;

    struct NoProcesses;

    impl ProcessTable for NoProcesses {
        fn exists(&self, _pid: u32) -> bool {
            false
        }
    }

    #[test]
    fn test_stop_without_pid_file() {
        let registry = MemoryRegistry::new();
        registry.ensure_directory("idle").unwrap();

        match stop_instance(&registry, &NoProcesses, "idle") {
            Err(BurrowError::NoInstanceRunning { id }) => assert_eq!(id, "idle"),
            other => panic!("Expected NoInstanceRunning, got: {:?}", other),
        }
    }

    #[test]
    fn test_stop_stale_pid_file_is_removed() {
        let registry = MemoryRegistry::new();
        registry.write_pid_file("ghost", 4_000_000).unwrap();

        assert!(matches!(
            stop_instance(&registry, &NoProcesses, "ghost"),
            Err(BurrowError::ProcessNotFound { pid: 4_000_000 })
        ));
        assert_eq!(registry.read_pid_file("ghost").unwrap(), None);
    }

    #[test]
    fn test_stop_never_reads_outside_home() {
        use crate::registry::FsRegistry;
        use std::fs;

        let temp = tempfile::TempDir::new().unwrap();
        let home = temp.path().join("user").join(".burrow");
        fs::create_dir_all(&home).unwrap();
        let outside = temp.path().join("user").join("pid");
        fs::write(&outside, "4000000").unwrap();

        let registry = FsRegistry::new(&home);
        assert!(matches!(
            stop_instance(&registry, &NoProcesses, ".."),
            Err(BurrowError::InvalidParams { .. })
        ));
        assert!(outside.exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_stop_terminates_process() {
        use crate::platform::{is_process_alive, SystemProcessTable};

        let child = std::process::Command::new("sleep").arg("30").spawn().unwrap();
        let pid = child.id();

        let registry = MemoryRegistry::new();
        registry.write_pid_file("sleeper", pid).unwrap();

        assert_eq!(
            stop_instance(&registry, &SystemProcessTable, "sleeper").unwrap(),
            pid
        );
        assert!(!is_process_alive(pid));
        assert_eq!(registry.read_pid_file("sleeper").unwrap(), None);
    }
}
