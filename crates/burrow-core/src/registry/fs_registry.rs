//! Directory-tree registry rooted at the burrow home.

use super::{parse_pid, validate_instance_id, InstanceRegistry};
use crate::atomic::atomic_write;
use crate::config::RegistryConfig;
use crate::{BurrowError, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

/// Registry backed by one directory per instance under a single home.
#[derive(Debug, Clone)]
pub struct FsRegistry {
    home: PathBuf,
}

impl FsRegistry {
    /// Open the registry at the default home (`~/.burrow`).
    pub fn open_default() -> Result<Self> {
        Ok(Self::new(crate::platform::burrow_home()?))
    }

    /// Open the registry at a specific home directory.
    pub fn new(home: impl Into<PathBuf>) -> Self {
        Self { home: home.into() }
    }

    pub fn home(&self) -> &Path {
        &self.home
    }

    /// Create the home directory if absent.
    pub fn ensure_home(&self) -> Result<&Path> {
        fs::create_dir_all(&self.home)
            .map_err(|e| BurrowError::io_with_path(e, &self.home))?;
        Ok(&self.home)
    }

    /// Directory of an instance. Ids that would leave the home are rejected.
    fn instance_dir(&self, id: &str) -> Result<PathBuf> {
        validate_instance_id(id)?;
        Ok(self.home.join(id))
    }

    /// Location of the pid file of an instance (it may not exist).
    pub fn pid_file(&self, id: &str) -> Result<PathBuf> {
        Ok(self.instance_dir(id)?.join(RegistryConfig::PID_FILE_NAME))
    }

    /// Location of the daemon log of an instance (it may not exist).
    pub fn log_file(&self, id: &str) -> Result<PathBuf> {
        Ok(self.instance_dir(id)?.join(RegistryConfig::LOG_FILE_NAME))
    }

    fn rpc_file(&self, id: &str) -> Result<PathBuf> {
        Ok(self.instance_dir(id)?.join(RegistryConfig::RPC_FILE_NAME))
    }
}

impl InstanceRegistry for FsRegistry {
    fn resolve_directory(&self, id: &str) -> Result<PathBuf> {
        self.instance_dir(id)
    }

    fn ensure_directory(&self, id: &str) -> Result<PathBuf> {
        let dir = self.instance_dir(id)?;
        // create_dir_all succeeds when the directory already exists, including
        // when another process creates it concurrently.
        fs::create_dir_all(&dir).map_err(|e| BurrowError::Io {
            message: format!("Failed to create instance directory {}", dir.display()),
            path: Some(dir.clone()),
            source: Some(e),
        })?;
        Ok(dir)
    }

    fn read_address(&self, id: &str) -> Result<String> {
        let path = self.rpc_file(id)?;
        match fs::read_to_string(&path) {
            Ok(addr) => Ok(addr.trim().to_string()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(String::new()),
            Err(e) => Err(BurrowError::io_with_path(e, path)),
        }
    }

    fn publish_address(&self, id: &str, addr: &str) -> Result<()> {
        let dir = self.ensure_directory(id)?;
        atomic_write(&dir.join(RegistryConfig::RPC_FILE_NAME), addr.as_bytes())
    }

    fn read_pid_file(&self, id: &str) -> Result<Option<u32>> {
        let path = self.pid_file(id)?;
        match fs::read_to_string(&path) {
            Ok(contents) => parse_pid(id, &contents).map(Some),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(BurrowError::io_with_path(e, path)),
        }
    }

    fn write_pid_file(&self, id: &str, pid: u32) -> Result<()> {
        let dir = self.ensure_directory(id)?;
        atomic_write(
            &dir.join(RegistryConfig::PID_FILE_NAME),
            pid.to_string().as_bytes(),
        )
    }

    fn remove_pid_file(&self, id: &str) -> Result<()> {
        let path = self.pid_file(id)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(BurrowError::io_with_path(e, path)),
        }
    }

    fn list_instance_ids(&self) -> Result<Vec<String>> {
        if !self.home.exists() {
            return Ok(Vec::new());
        }

        let mut ids = Vec::new();
        // min_depth(1) skips the home directory's own entry.
        for entry in WalkDir::new(&self.home).min_depth(1).max_depth(1) {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    debug!("Skipping unreadable registry entry: {}", e);
                    continue;
                }
            };
            if !entry.file_type().is_dir() {
                continue;
            }
            ids.push(entry.file_name().to_string_lossy().to_string());
        }
        Ok(ids)
    }

    fn remove_directory(&self, id: &str) -> Result<()> {
        let dir = self.instance_dir(id)?;
        match fs::remove_dir_all(&dir) {
            Ok(()) => {
                debug!("Removed instance directory {}", dir.display());
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(BurrowError::io_with_path(e, dir)),
        }
    }
}
