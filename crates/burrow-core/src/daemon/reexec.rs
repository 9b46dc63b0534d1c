//! Detaching by re-executing the current program in a new session.

use super::{detached_instance_id, stop_instructions, DetachOutcome, DetachRequest, Detacher};
use crate::atomic::atomic_write;
use crate::config::DaemonConfig;
use crate::platform::terminate_process;
use crate::registry::{FsRegistry, InstanceRegistry};
use crate::{BurrowError, Result};
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tracing::{debug, info, warn};

/// Detacher spawning a copy of the current executable.
///
/// The child is recognized by [`DaemonConfig::DETACHED_ENV_VAR`] carrying the
/// instance id. Its output goes to a staging log under the home directory and
/// its pid to a staging pid file; both are then moved into the instance
/// directory. Staging names carry the parent pid, so concurrent starts never
/// share a staging file.
#[derive(Debug, Clone)]
pub struct ReexecDetacher {
    registry: FsRegistry,
    program: Option<PathBuf>,
}

impl ReexecDetacher {
    pub fn new(registry: FsRegistry) -> Self {
        Self {
            registry,
            program: None,
        }
    }

    /// Spawn `program` instead of the current executable.
    pub fn with_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.program = Some(program.into());
        self
    }

    fn staging_file(&self, extension: &str) -> PathBuf {
        self.registry.home().join(format!(
            "{}.{}.{}",
            DaemonConfig::STAGING_PREFIX,
            std::process::id(),
            extension
        ))
    }

    fn spawn(&self, request: &DetachRequest, log_path: &Path) -> Result<u32> {
        let program = match &self.program {
            Some(program) => program.clone(),
            None => crate::platform::current_exe()?,
        };

        let log = File::create(log_path).map_err(|e| BurrowError::io_with_path(e, log_path))?;
        let log_err = log
            .try_clone()
            .map_err(|e| BurrowError::io_with_path(e, log_path))?;

        let mut cmd = Command::new(&program);
        cmd.args(&request.args)
            .env(DaemonConfig::DETACHED_ENV_VAR, &request.id)
            .stdin(Stdio::null())
            .stdout(Stdio::from(log))
            .stderr(Stdio::from(log_err));

        new_session(&mut cmd);

        let child = cmd.spawn().map_err(|e| BurrowError::Detach {
            message: format!("Failed to spawn {}: {}", program.display(), e),
        })?;

        Ok(child.id())
    }
}

impl Detacher for ReexecDetacher {
    fn detach(&self, request: &DetachRequest) -> Result<DetachOutcome> {
        if detached_instance_id().as_deref() == Some(request.id.as_str()) {
            debug!(id = %request.id, "Running as detached instance");
            return Ok(DetachOutcome::Child);
        }

        self.registry.ensure_home()?;
        let staging_log = self.staging_file("log");
        let staging_pid = self.staging_file("pid");

        let pid = self.spawn(request, &staging_log)?;
        if let Err(e) = self.install(request, pid, &staging_pid, &staging_log) {
            self.abandon(&request.id, pid, &staging_pid, &staging_log);
            return Err(e);
        }

        info!(id = %request.id, pid, "{}", stop_instructions(&request.id));

        Ok(DetachOutcome::Parent { pid })
    }
}

impl ReexecDetacher {
    /// Write the staging pid and move both staging files into the instance
    /// directory.
    fn install(
        &self,
        request: &DetachRequest,
        pid: u32,
        staging_pid: &Path,
        staging_log: &Path,
    ) -> Result<()> {
        atomic_write(staging_pid, pid.to_string().as_bytes())?;
        self.registry.ensure_directory(&request.id)?;
        relocate(staging_pid, &self.registry.pid_file(&request.id)?)?;
        relocate(staging_log, &self.registry.log_file(&request.id)?)
    }

    /// Stop a child that could not be registered and drop whatever it left.
    fn abandon(&self, id: &str, pid: u32, staging_pid: &Path, staging_log: &Path) {
        match terminate_process(pid, DaemonConfig::STOP_TIMEOUT) {
            Ok(true) => debug!(id, pid, "Stopped unregistered detached process"),
            Ok(false) => warn!(id, pid, "Unregistered detached process is still running"),
            Err(e) => warn!(id, pid, error = %e, "Could not stop unregistered detached process"),
        }

        for path in [staging_pid, staging_log] {
            if let Err(e) = fs::remove_file(path) {
                if e.kind() != std::io::ErrorKind::NotFound {
                    warn!(path = %path.display(), error = %e, "Could not remove staging file");
                }
            }
        }

        // A relocated pid file would point at the process just stopped.
        if self.registry.read_pid_file(id).ok().flatten() == Some(pid) {
            if let Err(e) = self.registry.remove_pid_file(id) {
                warn!(id, error = %e, "Could not remove pid file");
            }
        }
    }
}

fn relocate(from: &Path, to: &Path) -> Result<()> {
    fs::rename(from, to).map_err(|e| BurrowError::Detach {
        message: format!(
            "Failed to move {} to {}: {}",
            from.display(),
            to.display(),
            e
        ),
    })
}

/// Run the child in its own session so it survives the terminal closing.
#[cfg(unix)]
#[allow(unsafe_code)]
fn new_session(cmd: &mut Command) {
    use std::os::unix::process::CommandExt;

    // SAFETY: setsid() is async-signal-safe and only affects the child
    // between fork and exec.
    unsafe {
        cmd.pre_exec(|| {
            if libc::setsid() == -1 {
                return Err(std::io::Error::last_os_error());
            }
            Ok(())
        });
    }
}

#[cfg(windows)]
fn new_session(cmd: &mut Command) {
    use std::os::windows::process::CommandExt;
    use windows_sys::Win32::System::Threading::{CREATE_NEW_PROCESS_GROUP, DETACHED_PROCESS};

    cmd.creation_flags(CREATE_NEW_PROCESS_GROUP | DETACHED_PROCESS);
}

#[cfg(not(any(unix, windows)))]
fn new_session(_cmd: &mut Command) {}
