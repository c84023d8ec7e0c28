//! # omsync Store
//!
//! Preference persistence for omsync. Property values can be saved under
//! their path string and restored later, scoped by a namespace.
//!
//! ## Key Types
//!
//! - [`PrefStore`] - The key/value interface the dispatcher talks to
//! - [`SqlitePrefs`] - SQLite-backed store that survives restarts
//! - [`MemoryPrefs`] - In-memory store for tests
//! - [`PrefSession`] - Guard that holds a namespace open and ends it on drop
//!
//! ## Usage
//!
//! ```rust
//! use omsync_store::{MemoryPrefs, PrefSession};
//!
//! let prefs = MemoryPrefs::new();
//! let session = PrefSession::open(&prefs, "OM").unwrap();
//! session.put("lt", "500").unwrap();
//! assert_eq!(session.get("lt").unwrap().as_deref(), Some("500"));
//! ```

pub mod error;
pub mod memory;
pub mod migration;
pub mod sqlite;
pub mod traits;

pub use error::{Result, StoreError};
pub use memory::MemoryPrefs;
pub use sqlite::SqlitePrefs;
pub use traits::{PrefSession, PrefStore};
