//! Platform-specific process management.
//!
//! Liveness checks back the registry's "directory existence does not imply
//! liveness" rule; termination backs `burrow stop`.

use crate::error::{BurrowError, Result};
use std::time::Duration;
use tracing::{debug, warn};

/// Lookup into the operating system's process table.
///
/// Abstracted so aggregate queries can be tested against a fake table.
pub trait ProcessTable: Send + Sync {
    /// Returns whether a process with this pid currently exists.
    fn exists(&self, pid: u32) -> bool;
}

/// The real process table of the host.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemProcessTable;

impl ProcessTable for SystemProcessTable {
    fn exists(&self, pid: u32) -> bool {
        is_process_alive(pid)
    }
}

/// Whether `pid` has exited but not been reaped yet.
///
/// Orphaned detached instances are reaped by whatever init the system runs,
/// which inside containers may never happen.
#[cfg(target_os = "linux")]
fn is_zombie(pid: u32) -> bool {
    let Ok(stat) = std::fs::read_to_string(format!("/proc/{}/stat", pid)) else {
        return false;
    };
    // The command name is parenthesized and may contain anything; the state
    // is the first field after the last ')'.
    stat.rsplit_once(')')
        .and_then(|(_, rest)| rest.split_whitespace().next())
        .is_some_and(|state| state == "Z")
}

#[cfg(all(unix, not(target_os = "linux")))]
fn is_zombie(_pid: u32) -> bool {
    false
}

/// Check if a process with the given PID is alive.
///
/// # Platform Behavior
/// - **Linux/macOS**: Uses `kill(pid, 0)`; `EPERM` still means the process exists.
///   On Linux an unreaped zombie counts as dead.
/// - **Windows**: Uses `OpenProcess` with `PROCESS_QUERY_LIMITED_INFORMATION`
pub fn is_process_alive(pid: u32) -> bool {
    #[cfg(unix)]
    {
        use nix::errno::Errno;
        use nix::sys::signal::kill;
        use nix::unistd::Pid;

        let Ok(raw) = i32::try_from(pid) else {
            return false;
        };
        if raw <= 0 {
            return false;
        }
        match kill(Pid::from_raw(raw), None) {
            Ok(()) | Err(Errno::EPERM) => !is_zombie(pid),
            Err(_) => false,
        }
    }

    #[cfg(windows)]
    {
        windows_process_alive(pid)
    }

    #[cfg(not(any(unix, windows)))]
    {
        warn!("Process alive check not implemented for this platform");
        true
    }
}

#[cfg(windows)]
#[allow(unsafe_code)]
fn windows_process_alive(pid: u32) -> bool {
    use windows_sys::Win32::Foundation::CloseHandle;
    use windows_sys::Win32::System::Threading::{OpenProcess, PROCESS_QUERY_LIMITED_INFORMATION};

    // SAFETY: OpenProcess has no memory preconditions; the handle is closed
    // before returning and never escapes this function.
    unsafe {
        let handle = OpenProcess(PROCESS_QUERY_LIMITED_INFORMATION, 0, pid);
        if !handle.is_null() {
            CloseHandle(handle);
            true
        } else {
            false
        }
    }
}

/// Terminate a process gracefully, then forcefully if needed.
///
/// # Platform Behavior
/// - **Linux/macOS**: Sends SIGTERM, waits up to `timeout`, then SIGKILL
/// - **Windows**: Uses `taskkill /PID {pid} /F /T`
///
/// Returns `true` once the process is gone.
pub fn terminate_process(pid: u32, timeout: Duration) -> Result<bool> {
    if !is_process_alive(pid) {
        debug!("Process {} is not running", pid);
        return Ok(true);
    }

    #[cfg(unix)]
    {
        terminate_process_unix(pid, timeout)
    }

    #[cfg(windows)]
    {
        let _ = timeout;
        terminate_process_windows(pid)
    }

    #[cfg(not(any(unix, windows)))]
    {
        let _ = timeout;
        Err(BurrowError::SignalFailed {
            pid,
            message: "Process termination not implemented for this platform".into(),
        })
    }
}

#[cfg(unix)]
fn terminate_process_unix(pid: u32, timeout: Duration) -> Result<bool> {
    use nix::errno::Errno;
    use nix::sys::signal::{kill, Signal};
    use nix::sys::wait::{waitpid, WaitPidFlag};
    use nix::unistd::Pid;
    use std::thread::sleep;

    let raw = i32::try_from(pid).map_err(|_| BurrowError::ProcessNotFound { pid })?;
    let nix_pid = Pid::from_raw(raw);

    debug!("Sending SIGTERM to process {}", pid);
    match kill(nix_pid, Signal::SIGTERM) {
        Ok(()) => {}
        Err(Errno::ESRCH) => return Ok(true),
        Err(e) => {
            return Err(BurrowError::SignalFailed {
                pid,
                message: e.to_string(),
            })
        }
    }

    let wait_interval = Duration::from_millis(100);
    let iterations = (timeout.as_millis() / 100).max(1);

    for _ in 0..iterations {
        sleep(wait_interval);
        // Reap if the target happens to be our own child (ECHILD otherwise).
        let _ = waitpid(nix_pid, Some(WaitPidFlag::WNOHANG));
        if !is_process_alive(pid) {
            debug!("Process {} terminated gracefully", pid);
            return Ok(true);
        }
    }

    warn!("Process {} ignored SIGTERM, sending SIGKILL", pid);
    match kill(nix_pid, Signal::SIGKILL) {
        Ok(()) => {}
        Err(Errno::ESRCH) => return Ok(true),
        Err(e) => {
            return Err(BurrowError::SignalFailed {
                pid,
                message: e.to_string(),
            })
        }
    }

    sleep(wait_interval);
    let _ = waitpid(nix_pid, Some(WaitPidFlag::WNOHANG));

    Ok(!is_process_alive(pid))
}

#[cfg(windows)]
fn terminate_process_windows(pid: u32) -> Result<bool> {
    use std::process::Command;

    debug!("Terminating process {} with taskkill", pid);

    let output = Command::new("taskkill")
        .args(["/PID", &pid.to_string(), "/F", "/T"])
        .output()
        .map_err(|e| BurrowError::SignalFailed {
            pid,
            message: format!("Failed to run taskkill: {}", e),
        })?;

    if output.status.success() {
        Ok(true)
    } else {
        let stderr = String::from_utf8_lossy(&output.stderr);
        if stderr.contains("not found") || stderr.contains("not running") {
            Ok(true)
        } else {
            Err(BurrowError::SignalFailed {
                pid,
                message: stderr.trim().to_string(),
            })
        }
    }
}
