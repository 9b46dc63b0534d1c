//! In-memory registry used to exercise discovery without touching disk.

use super::{validate_instance_id, InstanceRegistry};
use crate::{BurrowError, Result};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard};

#[derive(Debug, Clone, Default)]
struct MemoryEntry {
    address: Option<String>,
    pid: Option<u32>,
}

/// Registry that keeps entries in a map. Enumeration is sorted by id.
#[derive(Debug, Default)]
pub struct MemoryRegistry {
    home: PathBuf,
    entries: Mutex<BTreeMap<String, MemoryEntry>>,
}

impl MemoryRegistry {
    pub fn new() -> Self {
        Self {
            home: PathBuf::from("/memory/.burrow"),
            entries: Mutex::new(BTreeMap::new()),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, BTreeMap<String, MemoryEntry>>> {
        self.entries
            .lock()
            .map_err(|_| BurrowError::Other("memory registry lock poisoned".to_string()))
    }
}

impl InstanceRegistry for MemoryRegistry {
    fn resolve_directory(&self, id: &str) -> Result<PathBuf> {
        validate_instance_id(id)?;
        Ok(self.home.join(id))
    }

    fn ensure_directory(&self, id: &str) -> Result<PathBuf> {
        validate_instance_id(id)?;
        self.lock()?.entry(id.to_string()).or_default();
        Ok(self.home.join(id))
    }

    fn read_address(&self, id: &str) -> Result<String> {
        validate_instance_id(id)?;
        Ok(self
            .lock()?
            .get(id)
            .and_then(|e| e.address.clone())
            .unwrap_or_default())
    }

    fn publish_address(&self, id: &str, addr: &str) -> Result<()> {
        validate_instance_id(id)?;
        self.lock()?.entry(id.to_string()).or_default().address = Some(addr.to_string());
        Ok(())
    }

    fn read_pid_file(&self, id: &str) -> Result<Option<u32>> {
        validate_instance_id(id)?;
        Ok(self.lock()?.get(id).and_then(|e| e.pid))
    }

    fn write_pid_file(&self, id: &str, pid: u32) -> Result<()> {
        validate_instance_id(id)?;
        self.lock()?.entry(id.to_string()).or_default().pid = Some(pid);
        Ok(())
    }

    fn remove_pid_file(&self, id: &str) -> Result<()> {
        validate_instance_id(id)?;
        if let Some(entry) = self.lock()?.get_mut(id) {
            entry.pid = None;
        }
        Ok(())
    }

    fn list_instance_ids(&self) -> Result<Vec<String>> {
        Ok(self.lock()?.keys().cloned().collect())
    }

    fn remove_directory(&self, id: &str) -> Result<()> {
        validate_instance_id(id)?;
        self.lock()?.remove(id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_registry_behaves_like_directories() {
        let registry = MemoryRegistry::new();
        registry.ensure_directory("a").unwrap();
        assert_eq!(registry.read_address("a").unwrap(), "");

        registry.publish_address("a", "127.0.0.1:9").unwrap();
        registry.write_pid_file("b", 77).unwrap();

        assert_eq!(registry.read_address("a").unwrap(), "127.0.0.1:9");
        assert_eq!(registry.read_pid("b").unwrap(), 77);
        assert_eq!(registry.read_pid("42").unwrap(), 42);
        assert_eq!(registry.list_instance_ids().unwrap(), vec!["a", "b"]);

        registry.remove_directory("a").unwrap();
        assert_eq!(registry.list_instance_ids().unwrap(), vec!["b"]);
    }

    #[test]
    fn test_memory_registry_rejects_escaping_ids() {
        let registry = MemoryRegistry::new();
        for id in ["..", "a/b", ""] {
            assert!(registry.resolve_directory(id).is_err());
            assert!(registry.read_address(id).is_err());
            assert!(registry.read_pid_file(id).is_err());
            assert!(registry.remove_pid_file(id).is_err());
            assert!(registry.remove_directory(id).is_err());
        }
    }

    #[test]
    fn test_memory_registry_missing_pid_is_error() {
        let registry = MemoryRegistry::new();
        registry.ensure_directory("a").unwrap();
        assert!(registry.read_pid("a").is_err());
    }
}
