//! The root object.

use std::ops::{Deref, DerefMut};

use crate::error::{CoreError, Result};
use crate::object::{Locator, NodeRef, Object, Resolved};
use crate::property::Property;
use crate::types::Role;
use crate::value::Value;

/// The top-level object of a tree, aware of which end of the link it is.
///
/// Built once from a [`RootDef`](crate::RootDef) and never restructured.
#[derive(Debug)]
pub struct Root {
    object: Object,
}

impl Root {
    pub(crate) fn new(object: Object) -> Self {
        Self { object }
    }

    pub fn role(&self) -> Role {
        self.object.role()
    }

    pub fn is_device(&self) -> bool {
        self.role().is_device()
    }

    /// Resolve a command path.
    ///
    /// A path starting with the root's own id is rooted: the id is skipped
    /// and, if nothing after it resolves, the root itself is the result.
    pub fn resolve(&self, path: &str) -> Result<Resolved> {
        if let Some(rest) = path.strip_prefix(self.object.id()) {
            return Ok(match self.object.resolve(rest) {
                Some(mut resolved) => {
                    resolved.consumed += 1;
                    resolved
                }
                None => Resolved {
                    locator: Locator::root(),
                    consumed: 1,
                },
            });
        }
        self.object
            .resolve(path)
            .ok_or_else(|| CoreError::NodeNotFound(path.to_string()))
    }

    /// The property at exactly `path`, if there is one.
    pub fn property(&self, path: &str) -> Option<&Property> {
        let resolved = self.resolve(path).ok()?;
        if resolved.consumed != path.len() {
            return None;
        }
        match self.object.node(&resolved.locator)? {
            NodeRef::Property(p) => Some(p),
            NodeRef::Object(_) => None,
        }
    }

    /// Set the property at `path`, pushing to its connector on change.
    pub fn set(&mut self, path: &str, value: Value) -> Result<bool> {
        let (object, index) = self.property_slot(path)?;
        object.set_at(index, value)
    }

    /// Parse `text` into the property at `path`.
    pub fn assign(&mut self, path: &str, text: &str) -> Result<bool> {
        let (object, index) = self.property_slot(path)?;
        object.assign_at(index, text)
    }

    /// Set an enumerated-character property by position in its legal set.
    pub fn set_index(&mut self, path: &str, index: usize) -> Result<bool> {
        let (object, slot) = self.property_slot(path)?;
        let value = object
            .property_at(slot)
            .value_at(index)
            .map_err(|source| CoreError::InvalidValue {
                path: path.to_string(),
                source,
            })?;
        object.set_at(slot, value)
    }

    /// Apply a value the peer sent. The connector is pushed on change but
    /// the property is not marked dirty, so the value is not echoed back.
    pub fn assign_from_peer(&mut self, path: &str, text: &str) -> Result<bool> {
        let (object, index) = self.property_slot(path)?;
        let changed = object.assign_at(index, text)?;
        object.property_at_mut(index).take_changed();
        Ok(changed)
    }

    /// Force the node at `locator` dirty: one property, or every property
    /// of an object's subtree. Returns how many properties were marked.
    pub fn mark_changed(&mut self, locator: &Locator) -> usize {
        let Some(object) = self.object.object_at_mut(&locator.objects) else {
            return 0;
        };
        match locator.property {
            Some(index) if index < object.properties().len() => {
                object.property_at_mut(index).mark_changed();
                1
            }
            Some(_) => 0,
            None => {
                object.mark_all_changed();
                object.iter_properties().count()
            }
        }
    }

    /// Re-read the node at `path` from its connectors and mark it dirty so
    /// the fresh values go out on the next sync pass.
    pub fn refresh(&mut self, path: &str) -> Result<usize> {
        let resolved = self.resolve(path)?;
        let locator = resolved.locator;
        if let Some(object) = self.object.object_at_mut(&locator.objects) {
            match locator.property {
                Some(index) => {
                    object.pull_at(index);
                }
                None => {
                    object.pull_all();
                }
            }
        }
        Ok(self.mark_changed(&locator))
    }

    fn property_slot(&mut self, path: &str) -> Result<(&mut Object, usize)> {
        let resolved = self.resolve(path)?;
        if resolved.consumed != path.len() {
            return Err(CoreError::NodeNotFound(path.to_string()));
        }
        let Some(index) = resolved.locator.property else {
            return Err(CoreError::AssignToObject(path.to_string()));
        };
        let object = self
            .object
            .object_at_mut(&resolved.locator.objects)
            .ok_or_else(|| CoreError::NodeNotFound(path.to_string()))?;
        Ok((object, index))
    }

    /// Number of dirty properties in the tree.
    pub fn changed_count(&self) -> usize {
        self.object.iter_properties().filter(|p| p.is_changed()).count()
    }
}

impl Deref for Root {
    type Target = Object;

    fn deref(&self) -> &Object {
        &self.object
    }
}

impl DerefMut for Root {
    fn deref_mut(&mut self) -> &mut Object {
        &mut self.object
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connector::ConnectorRegistry;
    use crate::schema::{ObjectDef, PropertyDef, RootDef};

    fn lights() -> Root {
        RootDef::new()
            .object(
                ObjectDef::new('l', "Lights")
                    .property(PropertyDef::boolean('o', "On"))
                    .property(PropertyDef::long('t', "Speed", 0, 60000))
                    .object(ObjectDef::new('e', "Engine").property(PropertyDef::boolean('o', "On"))),
            )
            .object(ObjectDef::new('s', "Sound").property(PropertyDef::long('v', "Volume", 0, 21)))
            .build(Role::Device, &ConnectorRegistry::new())
            .unwrap()
    }

    #[test]
    fn test_resolve_property() {
        let root = lights();
        let r = root.resolve("lt500").unwrap();
        assert_eq!(r.consumed, 2);
        assert_eq!(r.locator.objects, vec![0]);
        assert_eq!(r.locator.property, Some(1));
    }

    #[test]
    fn test_resolve_nested_object() {
        let root = lights();
        let r = root.resolve("le").unwrap();
        assert_eq!(r.consumed, 2);
        assert!(r.locator.is_object());
        assert_eq!(root.node(&r.locator).unwrap().name(), "Engine");

        let r = root.resolve("leo").unwrap();
        assert_eq!(root.node(&r.locator).unwrap().path(), "leo");
    }

    #[test]
    fn test_resolve_falls_back_to_object() {
        let root = lights();
        let r = root.resolve("lx").unwrap();
        assert_eq!(r.consumed, 1);
        assert_eq!(root.node(&r.locator).unwrap().name(), "Lights");
    }

    #[test]
    fn test_resolve_not_found() {
        let root = lights();
        assert!(matches!(root.resolve("x"), Err(CoreError::NodeNotFound(_))));
        assert!(matches!(root.resolve(""), Err(CoreError::NodeNotFound(_))));
    }

    #[test]
    fn test_rooted_path() {
        let root = lights();
        let r = root.resolve("R").unwrap();
        assert_eq!(r.locator, Locator::root());
        assert_eq!(r.consumed, 1);

        let r = root.resolve("Rlt").unwrap();
        assert_eq!(r.consumed, 3);
        assert_eq!(r.locator.property, Some(1));

        let r = root.resolve("Rzz").unwrap();
        assert_eq!(r.locator, Locator::root());
    }

    #[test]
    fn test_set_by_path() {
        let mut root = lights();
        assert!(root.set("lt", Value::Long(500)).unwrap());
        assert_eq!(root.property("lt").unwrap().as_long(), Some(500));
        assert_eq!(root.changed_count(), 1);
        assert!(matches!(
            root.set("l", Value::Long(1)),
            Err(CoreError::AssignToObject(_))
        ));
        assert!(matches!(
            root.assign("lt", "70000"),
            Err(CoreError::InvalidValue { .. })
        ));
        assert_eq!(root.property("lt").unwrap().as_long(), Some(500));
    }

    #[test]
    fn test_property_order() {
        let root = lights();
        let paths: Vec<&str> = root.iter_properties().map(|p| p.path()).collect();
        assert_eq!(paths, vec!["lo", "lt", "leo", "sv"]);
    }

    #[test]
    fn test_mark_all_changed() {
        let mut root = lights();
        root.mark_all_changed();
        assert_eq!(root.changed_count(), 4);
    }

    #[test]
    fn test_mark_changed_locator() {
        let mut root = lights();
        let locator = root.resolve("le").unwrap().locator;
        assert_eq!(root.mark_changed(&locator), 1);
        let locator = root.resolve("sv").unwrap().locator;
        assert_eq!(root.mark_changed(&locator), 1);
        assert_eq!(root.changed_count(), 2);
        assert_eq!(root.mark_changed(&Locator::root()), 4);
    }

    #[test]
    fn test_assign_from_peer_stays_clean() {
        let mut root = lights();
        assert!(root.assign_from_peer("lt", "42").unwrap());
        assert_eq!(root.property("lt").unwrap().as_long(), Some(42));
        assert_eq!(root.changed_count(), 0);
    }

    proptest::proptest! {
        #[test]
        fn test_resolve_is_total(path in "[a-zA-Z]{0,6}") {
            let root = lights();
            match root.resolve(&path) {
                Ok(resolved) => {
                    proptest::prop_assert!(resolved.consumed >= 1);
                    proptest::prop_assert!(resolved.consumed <= path.len());
                    proptest::prop_assert!(root.node(&resolved.locator).is_some());
                }
                Err(e) => proptest::prop_assert!(matches!(e, CoreError::NodeNotFound(_))),
            }
        }

        #[test]
        fn test_rooted_path_never_fails(suffix in "[a-zA-Z]{0,6}") {
            let root = lights();
            let rooted = format!("R{}", suffix);
            proptest::prop_assert!(root.resolve(&rooted).is_ok());
        }
    }
}
