//! Platform abstraction layer for cross-platform compatibility.
//!
//! All `#[cfg]` blocks for OS-specific behavior live in this module (and in
//! the detacher, which owns the process-spawning boundary).
//!
//! - `paths` - Home directory and executable resolution
//! - `process` - Process table lookup and termination
//!
//! # Supported Platforms
//!
//! - **Linux**: Full support
//! - **macOS**: Full support
//! - **Windows**: Full support (detached children run in a new process group)

pub mod paths;
pub mod process;

pub use paths::{burrow_home, current_exe};
pub use process::{is_process_alive, terminate_process, ProcessTable, SystemProcessTable};

/// Returns the current platform name.
pub fn current_platform() -> &'static str {
    #[cfg(target_os = "linux")]
    {
        "linux"
    }
    #[cfg(target_os = "windows")]
    {
        "windows"
    }
    #[cfg(target_os = "macos")]
    {
        "macos"
    }
    #[cfg(not(any(target_os = "linux", target_os = "windows", target_os = "macos")))]
    {
        "unknown"
    }
}
