//! SQLite implementation of the PrefStore trait.
//!
//! The primary backend. Uses rusqlite with bundled SQLite; the connection
//! sits behind a mutex so the store can be shared.

use std::path::Path;
use std::sync::Mutex;

use rusqlite::{params, Connection, OptionalExtension};

use crate::error::{Result, StoreError};
use crate::migration;
use crate::traits::{check_namespace, PrefStore};

/// SQLite-backed preference store.
pub struct SqlitePrefs {
    conn: Mutex<Connection>,
    open: Mutex<Option<String>>,
}

impl SqlitePrefs {
    /// Open a database at the given path, creating and migrating it as
    /// needed.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let mut conn = Connection::open(path)?;
        migration::migrate(&mut conn)?;
        Ok(Self::from_connection(conn))
    }

    /// Open an in-memory database.
    pub fn open_memory() -> Result<Self> {
        let mut conn = Connection::open_in_memory()?;
        migration::migrate(&mut conn)?;
        Ok(Self::from_connection(conn))
    }

    fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
            open: Mutex::new(None),
        }
    }

    fn namespace(&self) -> Result<String> {
        self.open.lock()?.clone().ok_or(StoreError::NoNamespace)
    }

    fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection, &str) -> Result<T>,
    {
        let ns = self.namespace()?;
        let conn = self.conn.lock()?;
        f(&conn, &ns)
    }
}

impl PrefStore for SqlitePrefs {
    fn begin(&self, namespace: &str) -> Result<()> {
        check_namespace(namespace)?;
        *self.open.lock()? = Some(namespace.to_string());
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Option<String>> {
        self.with_conn(|conn, ns| {
            Ok(conn
                .query_row(
                    "SELECT value FROM prefs WHERE namespace = ?1 AND key = ?2",
                    params![ns, key],
                    |row| row.get(0),
                )
                .optional()?)
        })
    }

    fn put(&self, key: &str, value: &str) -> Result<()> {
        self.with_conn(|conn, ns| {
            conn.execute(
                "INSERT INTO prefs (namespace, key, value, updated_at) VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(namespace, key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
                params![ns, key, value, migration::now_millis()],
            )
            .map_err(|e| StoreError::WriteFailed {
                key: key.to_string(),
                reason: e.to_string(),
            })?;
            Ok(())
        })
    }

    fn remove(&self, key: &str) -> Result<bool> {
        self.with_conn(|conn, ns| {
            let removed = conn
                .execute(
                    "DELETE FROM prefs WHERE namespace = ?1 AND key = ?2",
                    params![ns, key],
                )
                .map_err(|e| StoreError::WriteFailed {
                    key: key.to_string(),
                    reason: e.to_string(),
                })?;
            Ok(removed > 0)
        })
    }

    fn keys(&self) -> Result<Vec<String>> {
        self.with_conn(|conn, ns| {
            let mut stmt = conn.prepare("SELECT key FROM prefs WHERE namespace = ?1 ORDER BY key")?;
            let keys = stmt
                .query_map(params![ns], |row| row.get(0))?
                .collect::<std::result::Result<Vec<String>, _>>()?;
            Ok(keys)
        })
    }

    fn end(&self) {
        if let Ok(mut open) = self.open.lock() {
            *open = None;
        }
    }
}
