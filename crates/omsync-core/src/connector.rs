//! Connectors: the seam between an object and its effector or sensor.
//!
//! A connector is shared by every property of the object it is attached to.
//! The tree calls it; it never owns or holds on to the tree.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::property::Property;
use crate::value::Value;

/// Identity of the object a connector callback is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObjectRef<'a> {
    pub id: char,
    pub name: &'a str,
    pub path: &'a str,
}

/// Callbacks an effector implements to be bound to an object.
///
/// Implementations typically keep per-object state keyed by
/// [`ObjectRef::path`] behind interior mutability.
pub trait Connector: Send + Sync {
    /// The object was attached to the tree.
    fn init(&self, object: ObjectRef<'_>) {
        let _ = object;
    }

    /// `property` was changed locally; apply it to the effector.
    fn push(&self, object: ObjectRef<'_>, property: &Property);

    /// Report the effector's current value for `property`, if it has one.
    fn pull(&self, object: ObjectRef<'_>, property: &Property) -> Option<Value>;
}

/// Named connectors that tree definitions refer to.
#[derive(Clone, Default)]
pub struct ConnectorRegistry {
    connectors: HashMap<String, Arc<dyn Connector>>,
}

impl ConnectorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `connector` under `name`, replacing any previous one.
    pub fn register(&mut self, name: impl Into<String>, connector: Arc<dyn Connector>) {
        self.connectors.insert(name.into(), connector);
    }

    pub fn with(mut self, name: impl Into<String>, connector: Arc<dyn Connector>) -> Self {
        self.register(name, connector);
        self
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Connector>> {
        self.connectors.get(name).cloned()
    }
}

impl fmt::Debug for ConnectorRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.connectors.keys().collect();
        names.sort();
        f.debug_struct("ConnectorRegistry")
            .field("connectors", &names)
            .finish()
    }
}
