//! # omsync
//!
//! Keep a tree of typed properties in step between a device and a
//! controller over a slow, lossy link that carries a couple of hundred
//! bytes per frame, and move files over the same link.
//!
//! ## Overview
//!
//! Each end builds the same tree from a [`RootDef`](omsync_core::RootDef)
//! and wraps it in an [`Endpoint`]. Changing a property on one end marks it
//! dirty; the next [`Endpoint::tick`] sends it as `=<path><value>` and the
//! other end applies it. Effectors and sensors are bound to objects through
//! [`Connector`](omsync_core::Connector)s.
//!
//! Commands are single ASCII characters followed by a path:
//!
//! | op | meaning |
//! |----|---------|
//! | `=` | assign a value |
//! | `?` | ask for the value(s) to be sent |
//! | `*` | log the value(s) |
//! | `>` | save to preferences |
//! | `<` | load from preferences |
//! | `!` | log saved values |
//! | `-` | remove saved values |
//!
//! ## Usage
//!
//! ```rust,no_run
//! use omsync::core::{ObjectDef, PropertyDef, Role, RootDef};
//! use omsync::sync::{LinkHandle, MemoryLink};
//! use omsync::Endpoint;
//!
//! fn example() -> omsync::Result<()> {
//!     let schema = RootDef::new().object(
//!         ObjectDef::new('l', "Lights").property(PropertyDef::long('t', "Speed", 0, 60000)),
//!     );
//!
//!     let (a, b) = (LinkHandle::new(), LinkHandle::new());
//!     let (wire_a, wire_b) = MemoryLink::pair(a.clone(), b.clone());
//!
//!     let mut device = Endpoint::builder(Role::Device, schema.clone()).build(a, wire_a.clone())?;
//!     let mut controller = Endpoint::builder(Role::Controller, schema).build(b, wire_b)?;
//!
//!     controller.command("=lt500")?;
//!     controller.tick();
//!     wire_a.pump();
//!     device.tick();
//!     assert_eq!(device.root().property("lt").and_then(|p| p.as_long()), Some(500));
//!     Ok(())
//! }
//! ```
//!
//! ## Re-exports
//!
//! - `omsync::core` - Properties, the tree, paths and commands
//! - `omsync::store` - Preference stores
//! - `omsync::sync` - Agent, change sync and file transfer

pub mod config;
pub mod dispatch;
pub mod endpoint;
pub mod error;
pub mod log_level;

pub use omsync_core as core;
pub use omsync_store as store;
pub use omsync_sync as sync;

pub use config::{EndpointConfig, QueryMode};
pub use dispatch::{Dispatcher, Origin, Outcome};
pub use endpoint::{Endpoint, EndpointBuilder, EndpointEvent};
pub use error::{EndpointError, Result};
pub use log_level::LogLevel;

pub use omsync_core::{Command, Op, Property, Role, Root, Value};
