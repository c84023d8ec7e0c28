//! Declarative tree definitions.
//!
//! A tree is described as plain data (buildable in code or decoded from
//! JSON) and turned into an owned [`Root`] once at startup. Connectors are
//! referenced by name and looked up in a [`ConnectorRegistry`].
//!
//! ```
//! use omsync_core::{ConnectorRegistry, ObjectDef, PropertyDef, Role, RootDef};
//!
//! let root = RootDef::new()
//!     .object(
//!         ObjectDef::new('l', "Lights")
//!             .property(PropertyDef::boolean('o', "On"))
//!             .property(PropertyDef::long('t', "Speed", 0, 60000)),
//!     )
//!     .build(Role::Device, &ConnectorRegistry::new())
//!     .unwrap();
//! assert_eq!(root.property("lt").unwrap().name(), "Speed");
//! ```

use std::collections::HashSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::connector::{Connector, ConnectorRegistry};
use crate::error::{CoreError, Result};
use crate::object::Object;
use crate::property::Property;
use crate::root::Root;
use crate::types::{validate_id, PropertyFlags, Role};
use crate::value::PropertyKind;

/// Id of the root when a definition does not name one.
pub const DEFAULT_ROOT_ID: char = 'R';

/// Definition of one property.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyDef {
    pub id: char,
    pub name: String,
    #[serde(flatten)]
    pub kind: PropertyKind,
    #[serde(default)]
    pub flags: PropertyFlags,
    /// Wire form of the starting value.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
}

impl PropertyDef {
    pub fn new(id: char, name: impl Into<String>, kind: PropertyKind) -> Self {
        Self {
            id,
            name: name.into(),
            kind,
            flags: PropertyFlags::NONE,
            default: None,
        }
    }

    pub fn boolean(id: char, name: impl Into<String>) -> Self {
        Self::new(id, name, PropertyKind::Bool)
    }

    pub fn long(id: char, name: impl Into<String>, min: i64, max: i64) -> Self {
        Self::new(id, name, PropertyKind::long(min, max))
    }

    pub fn hex(id: char, name: impl Into<String>, min: i64, max: i64) -> Self {
        Self::new(id, name, PropertyKind::Long { min, max, radix: 16 })
    }

    pub fn chars(id: char, name: impl Into<String>, valid: impl Into<String>) -> Self {
        Self::new(id, name, PropertyKind::Char { valid: valid.into() })
    }

    pub fn text(id: char, name: impl Into<String>) -> Self {
        Self::new(id, name, PropertyKind::Text)
    }

    pub fn local(mut self) -> Self {
        self.flags.local = true;
        self
    }

    pub fn read_only_device(mut self) -> Self {
        self.flags.read_only_device = true;
        self
    }

    pub fn write_only_device(mut self) -> Self {
        self.flags.write_only_device = true;
        self
    }

    pub fn default_value(mut self, value: impl Into<String>) -> Self {
        self.default = Some(value.into());
        self
    }
}

/// Definition of one object and its subtree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectDef {
    pub id: char,
    pub name: String,
    /// Name of the connector in the registry.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connector: Option<String>,
    #[serde(default)]
    pub properties: Vec<PropertyDef>,
    #[serde(default)]
    pub objects: Vec<ObjectDef>,
}

impl ObjectDef {
    pub fn new(id: char, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            connector: None,
            properties: Vec::new(),
            objects: Vec::new(),
        }
    }

    pub fn connector(mut self, name: impl Into<String>) -> Self {
        self.connector = Some(name.into());
        self
    }

    pub fn property(mut self, property: PropertyDef) -> Self {
        self.properties.push(property);
        self
    }

    pub fn properties(mut self, properties: impl IntoIterator<Item = PropertyDef>) -> Self {
        self.properties.extend(properties);
        self
    }

    pub fn object(mut self, object: ObjectDef) -> Self {
        self.objects.push(object);
        self
    }
}

/// Definition of a whole tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RootDef {
    #[serde(default = "default_root_id")]
    pub id: char,
    #[serde(default = "default_root_name")]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connector: Option<String>,
    #[serde(default)]
    pub properties: Vec<PropertyDef>,
    #[serde(default)]
    pub objects: Vec<ObjectDef>,
}

fn default_root_id() -> char {
    DEFAULT_ROOT_ID
}

fn default_root_name() -> String {
    "Root".to_string()
}

impl Default for RootDef {
    fn default() -> Self {
        Self::new()
    }
}

impl RootDef {
    pub fn new() -> Self {
        Self {
            id: DEFAULT_ROOT_ID,
            name: default_root_name(),
            connector: None,
            properties: Vec::new(),
            objects: Vec::new(),
        }
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn with_id(mut self, id: char) -> Self {
        self.id = id;
        self
    }

    pub fn property(mut self, property: PropertyDef) -> Self {
        self.properties.push(property);
        self
    }

    pub fn object(mut self, object: ObjectDef) -> Self {
        self.objects.push(object);
        self
    }

    /// Validate the definition and build the tree.
    ///
    /// Objects are attached parent first: a connector's `init` runs before
    /// its properties are attached, and each property is pulled from the
    /// connector as it is attached.
    pub fn build(&self, role: Role, connectors: &ConnectorRegistry) -> Result<Root> {
        validate_id(self.id).map_err(CoreError::Schema)?;
        if self.objects.iter().any(|o| o.id == self.id)
            || self.properties.iter().any(|p| p.id == self.id)
        {
            return Err(CoreError::Schema(format!(
                "root id '{}' reused by a child of the root",
                self.id
            )));
        }

        let connector = lookup(connectors, self.connector.as_deref())?;
        let mut object = Object::new(self.id, self.name.clone(), String::new(), role, connector);
        object.init_connector();
        populate(&mut object, &self.properties, &self.objects, role, connectors)?;

        tracing::debug!(
            "built {} tree with {} properties",
            role,
            object.iter_properties().count()
        );
        Ok(Root::new(object))
    }
}

fn lookup(
    connectors: &ConnectorRegistry,
    name: Option<&str>,
) -> Result<Option<Arc<dyn Connector>>> {
    match name {
        None => Ok(None),
        Some(name) => connectors
            .get(name)
            .map(Some)
            .ok_or_else(|| CoreError::Schema(format!("unknown connector: {}", name))),
    }
}

fn populate(
    object: &mut Object,
    properties: &[PropertyDef],
    objects: &[ObjectDef],
    role: Role,
    connectors: &ConnectorRegistry,
) -> Result<()> {
    let mut seen = HashSet::new();
    let ids = properties.iter().map(|p| p.id).chain(objects.iter().map(|o| o.id));
    for id in ids {
        validate_id(id).map_err(CoreError::Schema)?;
        if !seen.insert(id) {
            return Err(CoreError::Schema(format!(
                "duplicate id '{}' under [{}]",
                id,
                object.path()
            )));
        }
    }

    for def in properties {
        let path = format!("{}{}", object.path(), def.id);
        def.kind
            .check()
            .map_err(|e| CoreError::Schema(format!("property {}: {}", path, e)))?;
        let initial = match &def.default {
            Some(text) => def
                .kind
                .parse(text)
                .map_err(|e| CoreError::Schema(format!("property {} default: {}", path, e)))?,
            None => def.kind.initial(),
        };
        object.attach_property(Property::new(
            def.id,
            def.name.clone(),
            path,
            def.kind.clone(),
            def.flags,
            initial,
        ));
    }

    for def in objects {
        let path = format!("{}{}", object.path(), def.id);
        let connector = lookup(connectors, def.connector.as_deref())?;
        let mut child = Object::new(def.id, def.name.clone(), path, role, connector);
        child.init_connector();
        populate(&mut child, &def.properties, &def.objects, role, connectors)?;
        object.attach_object(child);
    }
    Ok(())
}
