//! Properties: typed leaf values with change tracking.

use crate::error::ValueError;
use crate::types::PropertyFlags;
use crate::value::{PropertyKind, Value};

/// A named, typed leaf of the object tree.
///
/// The `changed` flag records that the value differs from what the peer was
/// last told. It starts cleared and is cleared again when the change-sync
/// pass emits the value.
#[derive(Debug, Clone)]
pub struct Property {
    id: char,
    name: String,
    path: String,
    kind: PropertyKind,
    flags: PropertyFlags,
    value: Value,
    changed: bool,
}

impl Property {
    pub(crate) fn new(
        id: char,
        name: impl Into<String>,
        path: String,
        kind: PropertyKind,
        flags: PropertyFlags,
        value: Value,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            path,
            kind,
            flags,
            value,
            changed: false,
        }
    }

    pub fn id(&self) -> char {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Path from the root, e.g. `lt`.
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn kind(&self) -> &PropertyKind {
        &self.kind
    }

    pub fn flags(&self) -> PropertyFlags {
        self.flags
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn is_changed(&self) -> bool {
        self.changed
    }

    /// Wire form of the current value.
    pub fn value_string(&self) -> String {
        self.kind.format(&self.value)
    }

    /// Store `value` if it is legal and different.
    ///
    /// Returns `Ok(true)` when the value actually changed, in which case the
    /// dirty flag is now set. Equal values leave the flag untouched.
    pub fn set(&mut self, value: Value) -> Result<bool, ValueError> {
        self.kind.validate(&value)?;
        if value == self.value {
            return Ok(false);
        }
        self.value = value;
        self.changed = true;
        Ok(true)
    }

    /// Parse the wire form and [`set`](Self::set) it.
    pub fn set_str(&mut self, text: &str) -> Result<bool, ValueError> {
        let value = self.kind.parse(text)?;
        self.set(value)
    }

    /// Replace the value without marking it dirty.
    ///
    /// Used for values read back from the effector, which the tree mirrors
    /// rather than originates.
    pub(crate) fn store(&mut self, value: Value) -> Result<(), ValueError> {
        self.kind.validate(&value)?;
        self.value = value;
        Ok(())
    }

    /// Force the dirty flag regardless of value equality.
    pub fn mark_changed(&mut self) {
        self.changed = true;
    }

    /// Read and clear the dirty flag.
    pub fn take_changed(&mut self) -> bool {
        std::mem::take(&mut self.changed)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self.value {
            Value::Bool(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_long(&self) -> Option<i64> {
        match self.value {
            Value::Long(n) => Some(n),
            _ => None,
        }
    }

    pub fn as_char(&self) -> Option<char> {
        match self.value {
            Value::Char(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match &self.value {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Position of an enumerated character within its legal set.
    pub fn index(&self) -> Option<usize> {
        match (&self.kind, &self.value) {
            (PropertyKind::Char { valid }, Value::Char(c)) => valid.chars().position(|v| v == *c),
            _ => None,
        }
    }

    /// The enumerated character at `index` of the legal set.
    pub fn value_at(&self, index: usize) -> Result<Value, ValueError> {
        match &self.kind {
            PropertyKind::Char { valid } => valid
                .chars()
                .nth(index)
                .map(Value::Char)
                .ok_or_else(|| ValueError::BadIndex {
                    index,
                    valid: valid.clone(),
                }),
            _ => Err(ValueError::TypeMismatch { expected: "char" }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn speed() -> Property {
        Property::new(
            't',
            "Speed",
            "lt".into(),
            PropertyKind::long(0, 60000),
            PropertyFlags::NONE,
            Value::Long(0),
        )
    }

    #[test]
    fn test_starts_clean() {
        assert!(!speed().is_changed());
    }

    #[test]
    fn test_set_same_value_is_noop() {
        let mut p = speed();
        assert!(!p.set(Value::Long(0)).unwrap());
        assert!(!p.is_changed());
    }

    #[test]
    fn test_set_new_value_marks_dirty() {
        let mut p = speed();
        assert!(p.set_str("500").unwrap());
        assert!(p.is_changed());
        assert_eq!(p.as_long(), Some(500));
        assert!(p.take_changed());
        assert!(!p.is_changed());
    }

    #[test]
    fn test_rejected_value_keeps_old() {
        let mut p = speed();
        p.set_str("500").unwrap();
        p.take_changed();
        assert!(p.set_str("70000").is_err());
        assert_eq!(p.as_long(), Some(500));
        assert!(!p.is_changed());
    }

    #[test]
    fn test_store_does_not_mark_dirty() {
        let mut p = speed();
        p.store(Value::Long(42)).unwrap();
        assert_eq!(p.as_long(), Some(42));
        assert!(!p.is_changed());
    }

    #[test]
    fn test_char_index() {
        let mut p = Property::new(
            'l',
            "LogLevel",
            "dl".into(),
            PropertyKind::Char {
                valid: "NFEWIDV".into(),
            },
            PropertyFlags::NONE,
            Value::Char('N'),
        );
        assert_eq!(p.index(), Some(0));
        let v = p.value_at(4).unwrap();
        p.set(v).unwrap();
        assert_eq!(p.as_char(), Some('I'));
        assert_eq!(p.index(), Some(4));
        assert!(p.value_at(7).is_err());
    }
}
