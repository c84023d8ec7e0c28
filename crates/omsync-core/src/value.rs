//! Property value types and their string forms.
//!
//! Values travel on the wire as text, so every kind knows how to parse and
//! format itself. Formatting then parsing any legal value yields the same
//! value back.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::command::SEPARATOR;
use crate::error::ValueError;

/// Longest text value, in bytes. Keeps one assignment inside a change packet.
pub const MAX_TEXT_LEN: usize = 128;

/// Characters a text value may not carry: the separator, and what the
/// receiving end strips from a frame.
const RESERVED: [char; 4] = [SEPARATOR, '\r', '\n', '\0'];

/// The type of a property together with its validation constraints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PropertyKind {
    /// `0`/`1` on the wire; `f`/`t` and `false`/`true` are also accepted.
    Bool,
    /// Signed integer limited to `min..=max`, formatted in `radix` (10 or 16).
    Long {
        #[serde(default = "default_min")]
        min: i64,
        #[serde(default = "default_max")]
        max: i64,
        #[serde(default = "default_radix")]
        radix: u32,
    },
    /// A single character drawn from `valid`.
    Char { valid: String },
    /// Free text. May not contain the packet separator.
    Text,
}

fn default_min() -> i64 {
    i64::MIN
}

fn default_max() -> i64 {
    i64::MAX
}

fn default_radix() -> u32 {
    10
}

/// A property value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Bool(bool),
    Long(i64),
    Char(char),
    Text(String),
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(b) => write!(f, "{}", b),
            Value::Long(n) => write!(f, "{}", n),
            Value::Char(c) => write!(f, "{}", c),
            Value::Text(s) => f.write_str(s),
        }
    }
}

impl PropertyKind {
    /// Integer kind with the default decimal radix.
    pub fn long(min: i64, max: i64) -> Self {
        PropertyKind::Long {
            min,
            max,
            radix: 10,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            PropertyKind::Bool => "bool",
            PropertyKind::Long { .. } => "long",
            PropertyKind::Char { .. } => "char",
            PropertyKind::Text => "string",
        }
    }

    /// The value a freshly built property holds.
    ///
    /// Integers start at zero clamped into range, enumerated characters at
    /// their first legal character.
    pub fn initial(&self) -> Value {
        match self {
            PropertyKind::Bool => Value::Bool(false),
            PropertyKind::Long { min, max, .. } => Value::Long(0i64.clamp(*min, (*max).max(*min))),
            PropertyKind::Char { valid } => Value::Char(valid.chars().next().unwrap_or(' ')),
            PropertyKind::Text => Value::Text(String::new()),
        }
    }

    /// Check type, range and membership of `value`.
    pub fn validate(&self, value: &Value) -> Result<(), ValueError> {
        match (self, value) {
            (PropertyKind::Bool, Value::Bool(_)) => Ok(()),
            (PropertyKind::Long { min, max, .. }, Value::Long(n)) => {
                if n < min || n > max {
                    Err(ValueError::OutOfRange {
                        value: *n,
                        min: *min,
                        max: *max,
                    })
                } else {
                    Ok(())
                }
            }
            (PropertyKind::Char { valid }, Value::Char(c)) => {
                if valid.contains(*c) {
                    Ok(())
                } else {
                    Err(ValueError::NotInSet {
                        ch: *c,
                        valid: valid.clone(),
                    })
                }
            }
            (PropertyKind::Text, Value::Text(s)) => {
                if s.len() > MAX_TEXT_LEN {
                    return Err(ValueError::TooLong {
                        len: s.len(),
                        max: MAX_TEXT_LEN,
                    });
                }
                match s.chars().find(|c| RESERVED.contains(c)) {
                    Some(c) => Err(ValueError::ReservedChar(c)),
                    None => Ok(()),
                }
            }
            _ => Err(ValueError::TypeMismatch {
                expected: self.type_name(),
            }),
        }
    }

    /// Parse the wire form of a value and validate it.
    pub fn parse(&self, text: &str) -> Result<Value, ValueError> {
        let value = match self {
            PropertyKind::Bool => match text {
                "1" | "t" | "true" => Value::Bool(true),
                "0" | "f" | "false" => Value::Bool(false),
                _ => return Err(ValueError::NotABool(text.to_string())),
            },
            PropertyKind::Long { radix, .. } => {
                let trimmed = text.trim();
                let n = i64::from_str_radix(trimmed, *radix).map_err(|_| {
                    ValueError::NotANumber {
                        text: text.to_string(),
                        radix: *radix,
                    }
                })?;
                Value::Long(n)
            }
            PropertyKind::Char { .. } => {
                let mut chars = text.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) => Value::Char(c),
                    _ => return Err(ValueError::NotOneChar(text.to_string())),
                }
            }
            PropertyKind::Text => Value::Text(text.to_string()),
        };
        self.validate(&value)?;
        Ok(value)
    }

    /// Format a value for the wire.
    ///
    /// Hex integers are lowercase without prefix; negatives keep a sign.
    pub fn format(&self, value: &Value) -> String {
        match (self, value) {
            (_, Value::Bool(b)) => (if *b { "1" } else { "0" }).to_string(),
            (PropertyKind::Long { radix: 16, .. }, Value::Long(n)) => {
                if *n < 0 {
                    format!("-{:x}", n.unsigned_abs())
                } else {
                    format!("{:x}", n)
                }
            }
            (_, Value::Long(n)) => n.to_string(),
            (_, Value::Char(c)) => c.to_string(),
            (_, Value::Text(s)) => s.clone(),
        }
    }

    pub(crate) fn check(&self) -> Result<(), String> {
        match self {
            PropertyKind::Long { min, max, radix } => {
                if min > max {
                    return Err(format!("min {} greater than max {}", min, max));
                }
                if *radix != 10 && *radix != 16 {
                    return Err(format!("unsupported radix {}", radix));
                }
            }
            PropertyKind::Char { valid } => {
                if valid.is_empty() {
                    return Err("empty character set".into());
                }
                if valid.contains(SEPARATOR) {
                    return Err("character set contains the separator".into());
                }
            }
            PropertyKind::Bool | PropertyKind::Text => {}
        }
        Ok(())
    }
}
