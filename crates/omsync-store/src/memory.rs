//! In-memory implementation of the PrefStore trait.
//!
//! Same semantics as SQLite but nothing survives the process. Writes can be
//! switched off to exercise the write-failure path.

use std::collections::BTreeMap;
use std::sync::RwLock;

use crate::error::{Result, StoreError};
use crate::traits::{check_namespace, PrefStore};

/// In-memory preference store.
pub struct MemoryPrefs {
    inner: RwLock<MemoryPrefsInner>,
}

#[derive(Default)]
struct MemoryPrefsInner {
    /// Namespace selected by `begin`.
    open: Option<String>,

    /// (namespace, key) -> value.
    entries: BTreeMap<(String, String), String>,

    read_only: bool,
}

impl MemoryPrefs {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(MemoryPrefsInner::default()),
        }
    }

    /// Make every `put` and `remove` fail with [`StoreError::WriteFailed`].
    pub fn set_read_only(&self, read_only: bool) -> Result<()> {
        self.inner.write()?.read_only = read_only;
        Ok(())
    }

    /// Total number of stored values across namespaces.
    pub fn len(&self) -> Result<usize> {
        Ok(self.inner.read()?.entries.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }
}

impl Default for MemoryPrefs {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryPrefsInner {
    fn namespace(&self) -> Result<&str> {
        self.open.as_deref().ok_or(StoreError::NoNamespace)
    }

    fn check_writable(&self, key: &str) -> Result<()> {
        if self.read_only {
            return Err(StoreError::WriteFailed {
                key: key.to_string(),
                reason: "store is read-only".to_string(),
            });
        }
        Ok(())
    }
}

impl PrefStore for MemoryPrefs {
    fn begin(&self, namespace: &str) -> Result<()> {
        check_namespace(namespace)?;
        self.inner.write()?.open = Some(namespace.to_string());
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Option<String>> {
        let inner = self.inner.read()?;
        let ns = inner.namespace()?;
        Ok(inner.entries.get(&(ns.to_string(), key.to_string())).cloned())
    }

    fn put(&self, key: &str, value: &str) -> Result<()> {
        let mut inner = self.inner.write()?;
        inner.check_writable(key)?;
        let ns = inner.namespace()?.to_string();
        inner.entries.insert((ns, key.to_string()), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<bool> {
        let mut inner = self.inner.write()?;
        inner.check_writable(key)?;
        let ns = inner.namespace()?.to_string();
        Ok(inner.entries.remove(&(ns, key.to_string())).is_some())
    }

    fn keys(&self) -> Result<Vec<String>> {
        let inner = self.inner.read()?;
        let ns = inner.namespace()?;
        Ok(inner
            .entries
            .keys()
            .filter(|(n, _)| n == ns)
            .map(|(_, k)| k.clone())
            .collect())
    }

    fn end(&self) {
        if let Ok(mut inner) = self.inner.write() {
            inner.open = None;
        }
    }
}
