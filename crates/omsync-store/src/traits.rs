//! PrefStore trait: the abstract interface for preference persistence.

use crate::error::{Result, StoreError};

/// Maximum namespace length accepted by every backend.
pub const MAX_NAMESPACE_LEN: usize = 15;

/// Key/value persistence for property values.
///
/// Keys are property paths and values are wire-form strings. All access
/// happens between [`begin`](Self::begin) and [`end`](Self::end), which
/// select the namespace the keys live in. Prefer [`PrefSession`], which
/// pairs the two.
pub trait PrefStore: Send + Sync {
    /// Open `namespace` for the calls that follow.
    fn begin(&self, namespace: &str) -> Result<()>;

    /// Read a value.
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// Write a value, replacing any previous one.
    fn put(&self, key: &str, value: &str) -> Result<()>;

    /// Delete a value. Returns whether one existed.
    fn remove(&self, key: &str) -> Result<bool>;

    /// All keys in the open namespace, sorted.
    fn keys(&self) -> Result<Vec<String>>;

    /// Close the namespace opened by `begin`.
    fn end(&self);
}

pub(crate) fn check_namespace(namespace: &str) -> Result<()> {
    if namespace.is_empty() || namespace.len() > MAX_NAMESPACE_LEN {
        return Err(StoreError::InvalidNamespace(namespace.to_string()));
    }
    Ok(())
}

/// An open namespace. Calls [`PrefStore::end`] when dropped.
pub struct PrefSession<'a> {
    store: &'a dyn PrefStore,
}

impl<'a> PrefSession<'a> {
    pub fn open(store: &'a dyn PrefStore, namespace: &str) -> Result<Self> {
        store.begin(namespace)?;
        Ok(Self { store })
    }

    pub fn get(&self, key: &str) -> Result<Option<String>> {
        self.store.get(key)
    }

    pub fn put(&self, key: &str, value: &str) -> Result<()> {
        self.store.put(key, value)
    }

    pub fn remove(&self, key: &str) -> Result<bool> {
        self.store.remove(key)
    }

    pub fn keys(&self) -> Result<Vec<String>> {
        self.store.keys()
    }
}

impl Drop for PrefSession<'_> {
    fn drop(&mut self) {
        self.store.end();
    }
}
