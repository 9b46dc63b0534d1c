//! Platform-specific path utilities.

use crate::config::RegistryConfig;
use crate::error::{BurrowError, Result};
use std::path::PathBuf;

/// Get the burrow home directory, where every instance directory lives.
///
/// # Platform Behavior
/// Uses the `dirs` crate which handles platform differences:
/// - **Linux/macOS**: `~/.burrow`
/// - **Windows**: `C:\Users\{user}\.burrow`
///
/// Never touches disk.
pub fn burrow_home() -> Result<PathBuf> {
    let home = dirs::home_dir().ok_or(BurrowError::HomeDirUnavailable)?;
    Ok(home.join(RegistryConfig::HOME_DIR_NAME))
}

/// Path to the executable of the current process, used to re-execute detached children.
pub fn current_exe() -> Result<PathBuf> {
    std::env::current_exe().map_err(|e| BurrowError::Io {
        message: "Could not resolve current executable".to_string(),
        path: None,
        source: Some(e),
    })
}
