//! # omsync Testkit
//!
//! Testing utilities for omsync.
//!
//! ## Overview
//!
//! - **Fixtures**: a representative tree, a connector that records what the
//!   tree asks of it, and a device/controller pair joined by an in-memory
//!   link
//! - **Lossy link**: a transport wrapper that drops a share of frames
//! - **Generators**: proptest strategies for kinds, values and commands
//!
//! ## Test Fixtures
//!
//! ```rust
//! use omsync::EndpointConfig;
//! use omsync_testkit::fixtures::{falcon_connectors, falcon_schema, Pair, RecordingConnector};
//!
//! let recorder = RecordingConnector::new();
//! let mut pair = Pair::with(falcon_schema(), falcon_connectors(&recorder), EndpointConfig::default());
//! pair.controller.command("=les500").unwrap();
//! pair.settle();
//! assert_eq!(pair.device.root().property("les").and_then(|p| p.as_long()), Some(500));
//! ```

pub mod fixtures;
pub mod generators;
pub mod lossy;

pub use fixtures::{falcon_connectors, falcon_schema, Call, Pair, RecordingConnector};
pub use lossy::LossyLink;
