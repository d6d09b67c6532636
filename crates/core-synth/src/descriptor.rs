//! Connection descriptors returned by node agents
//!
//! A descriptor is an opaque JSON object whose layout depends on the
//! protocol the node serves. The synthesizer only reads the handful of
//! fields it needs and ignores everything else, so descriptors are kept as
//! an untyped map instead of a closed struct.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Attribute bag a node returns after creating a credential
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionDescriptor(Map<String, Value>);

impl ConnectionDescriptor {
    /// Wrap a JSON value, returning `None` unless it is an object
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(map) => Some(Self(map)),
            _ => None,
        }
    }

    /// String field at the top level, if present and a string
    pub fn str_field(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    /// String field at the top level, or `default` when absent
    pub fn str_or<'a>(&'a self, key: &str, default: &'a str) -> &'a str {
        self.str_field(key).unwrap_or(default)
    }

    /// Nested object at the top level
    pub fn block(&self, key: &str) -> Option<Block<'_>> {
        Block::lookup(&self.0, key)
    }
}

/// Borrowed view of a nested object inside a descriptor
#[derive(Debug, Clone, Copy)]
pub struct Block<'a>(&'a Map<String, Value>);

impl<'a> Block<'a> {
    fn lookup(map: &'a Map<String, Value>, key: &str) -> Option<Self> {
        map.get(key).and_then(Value::as_object).map(Block)
    }

    pub fn block(&self, key: &str) -> Option<Block<'a>> {
        Self::lookup(self.0, key)
    }

    pub fn str_field(&self, key: &str) -> Option<&'a str> {
        self.0.get(key).and_then(Value::as_str)
    }

    pub fn str_or(&self, key: &str, default: &'a str) -> &'a str {
        self.str_field(key).unwrap_or(default)
    }

    /// Port number; integral floats are accepted since some agents emit `443.0`
    pub fn port(&self) -> Option<u16> {
        let number = match self.0.get("port")? {
            Value::Number(n) => n,
            _ => return None,
        };
        let raw = number.as_u64().or_else(|| {
            number
                .as_f64()
                .filter(|f| f.fract() == 0.0 && *f >= 0.0)
                .map(|f| f as u64)
        })?;
        u16::try_from(raw).ok()
    }
}
