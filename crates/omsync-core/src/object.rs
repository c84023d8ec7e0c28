//! Objects: ordered containers of properties and child objects.
//!
//! Insertion order is traversal order is wire order. Nodes are addressed
//! from outside the tree by path strings or by [`Locator`] indices, never
//! by reference.

use std::fmt;
use std::sync::Arc;

use crate::connector::{Connector, ObjectRef};
use crate::error::{CoreError, Result};
use crate::property::Property;
use crate::types::Role;
use crate::value::Value;

/// Index path to a node: child object indices from the root, then
/// optionally a property index within the last object.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Locator {
    pub objects: Vec<usize>,
    pub property: Option<usize>,
}

impl Locator {
    /// The locator of the object resolution started from.
    pub fn root() -> Self {
        Self::default()
    }

    pub fn is_object(&self) -> bool {
        self.property.is_none()
    }
}

/// Outcome of resolving a path: where it led and how many characters of the
/// input the path itself used. Whatever follows is the command's value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved {
    pub locator: Locator,
    pub consumed: usize,
}

/// A borrowed tree node.
#[derive(Debug, Clone, Copy)]
pub enum NodeRef<'a> {
    Object(&'a Object),
    Property(&'a Property),
}

impl<'a> NodeRef<'a> {
    pub fn id(&self) -> char {
        match self {
            NodeRef::Object(o) => o.id(),
            NodeRef::Property(p) => p.id(),
        }
    }

    pub fn name(&self) -> &'a str {
        match self {
            NodeRef::Object(o) => o.name(),
            NodeRef::Property(p) => p.name(),
        }
    }

    pub fn path(&self) -> &'a str {
        match self {
            NodeRef::Object(o) => o.path(),
            NodeRef::Property(p) => p.path(),
        }
    }

    pub fn is_object(&self) -> bool {
        matches!(self, NodeRef::Object(_))
    }

    /// One-line human description used by dump commands.
    pub fn describe(&self) -> String {
        match self {
            NodeRef::Object(o) => format!("object path: {}  name: {}", o.path(), o.name()),
            NodeRef::Property(p) => format!(
                "property path: {}  name: {}  value: {}",
                p.path(),
                p.name(),
                p.value_string()
            ),
        }
    }
}

/// A tree node owning properties and child objects, optionally bound to a
/// [`Connector`].
pub struct Object {
    id: char,
    name: String,
    path: String,
    role: Role,
    properties: Vec<Property>,
    objects: Vec<Object>,
    connector: Option<Arc<dyn Connector>>,
}

impl Object {
    pub(crate) fn new(
        id: char,
        name: impl Into<String>,
        path: String,
        role: Role,
        connector: Option<Arc<dyn Connector>>,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            path,
            role,
            properties: Vec::new(),
            objects: Vec::new(),
            connector,
        }
    }

    pub fn id(&self) -> char {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Path from the root; empty for the root itself.
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn info(&self) -> ObjectRef<'_> {
        ObjectRef {
            id: self.id,
            name: &self.name,
            path: &self.path,
        }
    }

    pub fn has_connector(&self) -> bool {
        self.connector.is_some()
    }

    pub fn properties(&self) -> &[Property] {
        &self.properties
    }

    pub fn objects(&self) -> &[Object] {
        &self.objects
    }

    pub fn property(&self, id: char) -> Option<&Property> {
        self.properties.iter().find(|p| p.id() == id)
    }

    pub fn object(&self, id: char) -> Option<&Object> {
        self.objects.iter().find(|o| o.id == id)
    }

    pub fn object_mut(&mut self, id: char) -> Option<&mut Object> {
        self.objects.iter_mut().find(|o| o.id == id)
    }

    fn property_index(&self, id: char) -> Result<usize> {
        self.properties
            .iter()
            .position(|p| p.id() == id)
            .ok_or_else(|| CoreError::NodeNotFound(format!("{}{}", self.path, id)))
    }

    // ─────────────────────────────────────────────────────────────────────
    // Construction
    // ─────────────────────────────────────────────────────────────────────

    pub(crate) fn init_connector(&self) {
        if let Some(connector) = &self.connector {
            connector.init(self.info());
        }
    }

    /// Attach a property and seed it from the effector.
    pub(crate) fn attach_property(&mut self, property: Property) {
        self.properties.push(property);
        let index = self.properties.len() - 1;
        self.pull_at(index);
    }

    pub(crate) fn attach_object(&mut self, object: Object) {
        self.objects.push(object);
    }

    // ─────────────────────────────────────────────────────────────────────
    // Values
    // ─────────────────────────────────────────────────────────────────────

    /// Set property `id` to `value`, pushing to the connector on change.
    pub fn set(&mut self, id: char, value: Value) -> Result<bool> {
        let index = self.property_index(id)?;
        self.set_at(index, value)
    }

    /// Parse `text` into property `id`, pushing to the connector on change.
    pub fn assign(&mut self, id: char, text: &str) -> Result<bool> {
        let index = self.property_index(id)?;
        self.assign_at(index, text)
    }

    pub(crate) fn set_at(&mut self, index: usize, value: Value) -> Result<bool> {
        let property = &mut self.properties[index];
        let changed = property.set(value).map_err(|source| CoreError::InvalidValue {
            path: property.path().to_string(),
            source,
        })?;
        if changed {
            self.push_at(index);
        }
        Ok(changed)
    }

    pub(crate) fn assign_at(&mut self, index: usize, text: &str) -> Result<bool> {
        let property = &mut self.properties[index];
        let changed = property
            .set_str(text)
            .map_err(|source| CoreError::InvalidValue {
                path: property.path().to_string(),
                source,
            })?;
        if changed {
            self.push_at(index);
        }
        Ok(changed)
    }

    pub(crate) fn push_at(&self, index: usize) {
        let property = &self.properties[index];
        if !property.flags().pushes(self.role) {
            return;
        }
        if let Some(connector) = &self.connector {
            connector.push(self.info(), property);
        }
    }

    /// Refresh property `index` from the connector without marking it dirty.
    ///
    /// Returns whether a value was read back.
    pub(crate) fn pull_at(&mut self, index: usize) -> bool {
        let Some(connector) = &self.connector else {
            return false;
        };
        let property = &self.properties[index];
        if !property.flags().pulls(self.role) {
            return false;
        }
        let Some(value) = connector.pull(self.info(), property) else {
            return false;
        };
        let property = &mut self.properties[index];
        match property.store(value) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!("connector returned invalid value for {}: {}", property.path(), e);
                false
            }
        }
    }

    pub(crate) fn property_at(&self, index: usize) -> &Property {
        &self.properties[index]
    }

    pub(crate) fn property_at_mut(&mut self, index: usize) -> &mut Property {
        &mut self.properties[index]
    }

    // ─────────────────────────────────────────────────────────────────────
    // Traversal
    // ─────────────────────────────────────────────────────────────────────

    /// All properties of this subtree in tree order: own properties first,
    /// then each child object's subtree.
    pub fn iter_properties(&self) -> Box<dyn Iterator<Item = &Property> + '_> {
        Box::new(
            self.properties
                .iter()
                .chain(self.objects.iter().flat_map(|o| o.iter_properties())),
        )
    }

    /// Visit every node of this subtree: the object, its properties, then
    /// each child object recursively.
    pub fn walk(&self, f: &mut dyn FnMut(NodeRef<'_>)) {
        f(NodeRef::Object(self));
        for p in &self.properties {
            f(NodeRef::Property(p));
        }
        for o in &self.objects {
            o.walk(f);
        }
    }

    /// Visit every property of this subtree in tree order with mutable
    /// access to its owning object and the property's index there.
    pub fn visit_properties_mut(&mut self, f: &mut dyn FnMut(&mut Object, usize)) {
        for index in 0..self.properties.len() {
            f(self, index);
        }
        for o in &mut self.objects {
            o.visit_properties_mut(f);
        }
    }

    /// Force every property of this subtree dirty.
    pub fn mark_all_changed(&mut self) {
        self.visit_properties_mut(&mut |obj, index| obj.property_at_mut(index).mark_changed());
    }

    /// Clear the dirty flag of every changed property of this subtree in
    /// tree order, handing each one to `f` as it is cleared.
    pub fn drain_changed(&mut self, f: &mut dyn FnMut(&Property)) {
        for p in &mut self.properties {
            if p.take_changed() {
                f(p);
            }
        }
        for o in &mut self.objects {
            o.drain_changed(f);
        }
    }

    /// Refresh every property of this subtree from its connector.
    pub fn pull_all(&mut self) -> usize {
        let mut pulled = 0;
        self.visit_properties_mut(&mut |obj, index| {
            if obj.pull_at(index) {
                pulled += 1;
            }
        });
        pulled
    }

    // ─────────────────────────────────────────────────────────────────────
    // Addressing
    // ─────────────────────────────────────────────────────────────────────

    /// Resolve `path` relative to this object.
    ///
    /// Ids are consumed one at a time. A child object id descends into that
    /// child; if nothing further resolves below it, the child itself is the
    /// result. A property id ends resolution. Returns `None` when the first
    /// id matches nothing.
    pub fn resolve(&self, path: &str) -> Option<Resolved> {
        let ids: Vec<char> = path.chars().collect();
        let mut locator = Locator::default();
        let consumed = resolve_in(self, &ids, 0, &mut locator)?;
        Some(Resolved { locator, consumed })
    }

    pub fn object_at(&self, indices: &[usize]) -> Option<&Object> {
        match indices.split_first() {
            None => Some(self),
            Some((first, rest)) => self.objects.get(*first)?.object_at(rest),
        }
    }

    pub fn object_at_mut(&mut self, indices: &[usize]) -> Option<&mut Object> {
        match indices.split_first() {
            None => Some(self),
            Some((first, rest)) => self.objects.get_mut(*first)?.object_at_mut(rest),
        }
    }

    pub fn node(&self, locator: &Locator) -> Option<NodeRef<'_>> {
        let object = self.object_at(&locator.objects)?;
        match locator.property {
            None => Some(NodeRef::Object(object)),
            Some(index) => object.properties.get(index).map(NodeRef::Property),
        }
    }
}

fn resolve_in(object: &Object, ids: &[char], at: usize, locator: &mut Locator) -> Option<usize> {
    let id = *ids.get(at)?;
    if let Some(child) = object.objects.iter().position(|o| o.id == id) {
        locator.objects.push(child);
        return Some(resolve_in(&object.objects[child], ids, at + 1, locator).unwrap_or(at + 1));
    }
    let index = object.properties.iter().position(|p| p.id() == id)?;
    locator.property = Some(index);
    Some(at + 1)
}

impl fmt::Debug for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Object")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("path", &self.path)
            .field("properties", &self.properties)
            .field("objects", &self.objects)
            .field("connector", &self.connector.is_some())
            .finish()
    }
}
