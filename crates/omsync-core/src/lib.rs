//! # omsync Core
//!
//! Pure primitives for omsync: typed properties, the object tree, path
//! resolution and the textual command grammar.
//!
//! This crate contains no I/O, no storage, no networking. Everything that
//! touches the outside world (effectors, preferences, the radio link) is
//! reached through traits defined here or in the sibling crates.
//!
//! ## Key Types
//!
//! - [`Property`] - A typed, named leaf value with a dirty flag
//! - [`Object`] - An ordered container of properties and child objects
//! - [`Root`] - The top-level object, aware of its [`Role`]
//! - [`Connector`] - The seam to the effector or sensor behind an object
//! - [`RootDef`] - Declarative tree definition the tree is built from
//! - [`Command`] - A parsed `<op><path><value>` command
//!
//! ## Paths
//!
//! Every node has a one-character id unique among its siblings. A node's
//! path is the concatenation of ids from just below the root down to the
//! node itself, so property `t` of object `l` has path `lt`.

pub mod command;
pub mod connector;
pub mod error;
pub mod object;
pub mod property;
pub mod root;
pub mod schema;
pub mod types;
pub mod value;

pub use command::{Command, Op, HEARTBEAT, SEPARATOR};
pub use connector::{Connector, ConnectorRegistry, ObjectRef};
pub use error::{CoreError, Result, ValueError};
pub use object::{Locator, NodeRef, Object, Resolved};
pub use property::Property;
pub use root::Root;
pub use schema::{ObjectDef, PropertyDef, RootDef};
pub use types::{validate_id, PropertyFlags, Role};
pub use value::{PropertyKind, Value, MAX_TEXT_LEN};
