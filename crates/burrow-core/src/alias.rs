//! Persistence of named configuration templates.
//!
//! Aliases live next to instance directories as regular files
//! (`<home>/<name>.alias.json`), so registry enumeration never mistakes one
//! for an instance.

use crate::atomic::{atomic_read_json, atomic_write_json};
use crate::config::RegistryConfig;
use crate::models::Alias;
use crate::registry::validate_instance_id;
use crate::{BurrowError, Result};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Storage of aliases by name.
pub trait AliasStore: Send + Sync {
    /// Look up an alias. `None` if it was never saved.
    fn get(&self, name: &str) -> Result<Option<Alias>>;

    /// Create or replace an alias.
    fn save(&self, alias: &Alias) -> Result<()>;

    /// Remove an alias. Returns whether it existed.
    fn delete(&self, name: &str) -> Result<bool>;

    /// Every stored alias, sorted by name.
    fn list(&self) -> Result<Vec<Alias>>;

    /// Like [`get`](Self::get) but a missing alias is an error.
    fn require(&self, name: &str) -> Result<Alias> {
        self.get(name)?.ok_or_else(|| BurrowError::AliasNotFound {
            name: name.to_string(),
        })
    }
}

/// Alias store writing one JSON file per alias under the burrow home.
#[derive(Debug, Clone)]
pub struct JsonAliasStore {
    home: PathBuf,
}

impl JsonAliasStore {
    pub fn new(home: impl Into<PathBuf>) -> Self {
        Self { home: home.into() }
    }

    pub fn home(&self) -> &Path {
        &self.home
    }

    fn alias_file(&self, name: &str) -> Result<PathBuf> {
        validate_instance_id(name)?;
        Ok(self
            .home
            .join(format!("{}{}", name, RegistryConfig::ALIAS_FILE_SUFFIX)))
    }
}

impl AliasStore for JsonAliasStore {
    fn get(&self, name: &str) -> Result<Option<Alias>> {
        atomic_read_json(&self.alias_file(name)?)
    }

    fn save(&self, alias: &Alias) -> Result<()> {
        let path = self.alias_file(&alias.name)?;
        fs::create_dir_all(&self.home).map_err(|e| BurrowError::io_with_path(e, &self.home))?;
        atomic_write_json(&path, alias)?;
        debug!(alias = %alias.name, path = %path.display(), "Saved alias");
        Ok(())
    }

    fn delete(&self, name: &str) -> Result<bool> {
        let path = self.alias_file(name)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(BurrowError::io_with_path(e, path)),
        }
    }

    fn list(&self) -> Result<Vec<Alias>> {
        if !self.home.exists() {
            return Ok(Vec::new());
        }

        let mut aliases = Vec::new();
        for entry in WalkDir::new(&self.home)
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name()
        {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    debug!("Skipping unreadable alias entry: {}", e);
                    continue;
                }
            };
            let is_alias = entry.file_type().is_file()
                && entry
                    .file_name()
                    .to_string_lossy()
                    .ends_with(RegistryConfig::ALIAS_FILE_SUFFIX);
            if !is_alias {
                continue;
            }

            match atomic_read_json::<Alias>(entry.path()) {
                Ok(Some(alias)) => aliases.push(alias),
                Ok(None) => {}
                Err(e) => warn!("Ignoring unreadable alias {}: {}", entry.path().display(), e),
            }
        }
        Ok(aliases)
    }
}

/// Alias store kept in memory.
#[derive(Debug, Default)]
pub struct MemoryAliasStore {
    aliases: Mutex<BTreeMap<String, Alias>>,
}

impl MemoryAliasStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, BTreeMap<String, Alias>>> {
        self.aliases
            .lock()
            .map_err(|_| BurrowError::Other("memory alias store lock poisoned".to_string()))
    }
}

impl AliasStore for MemoryAliasStore {
    fn get(&self, name: &str) -> Result<Option<Alias>> {
        Ok(self.lock()?.get(name).cloned())
    }

    fn save(&self, alias: &Alias) -> Result<()> {
        validate_instance_id(&alias.name)?;
        self.lock()?.insert(alias.name.clone(), alias.clone());
        Ok(())
    }

    fn delete(&self, name: &str) -> Result<bool> {
        Ok(self.lock()?.remove(name).is_some())
    }

    fn list(&self) -> Result<Vec<Alias>> {
        Ok(self.lock()?.values().cloned().collect())
    }
}
