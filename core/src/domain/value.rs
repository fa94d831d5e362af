//! Extensible, type-tagged value map used for INode xattrs, Replica/Pool
//! extra fields, and plugin configuration pairs.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A single heterogeneous value. Deliberately a closed enum rather than raw
/// JSON: the bag this crate threads around (xattrs, pool capacity/free
/// metadata, plugin config pairs) is typed, not arbitrary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Value {
    Bool(bool),
    I64(i64),
    U64(u64),
    Double(f64),
    Str(String),
    Bytes(Vec<u8>),
    StringArray(Vec<String>),
}

impl Value {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::I64(v) => Some(*v),
            Value::U64(v) => i64::try_from(*v).ok(),
            _ => None,
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Value::U64(v) => Some(*v),
            Value::I64(v) => u64::try_from(*v).ok(),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_owned())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::I64(v)
    }
}

impl From<u64> for Value {
    fn from(v: u64) -> Self {
        Value::U64(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

/// An ordered (insertion order not preserved, keys sorted) extensible bag.
pub type ValueMap = BTreeMap<String, Value>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_serde_json() {
        let mut m: ValueMap = ValueMap::new();
        m.insert("capacity".into(), Value::U64(1_000_000));
        m.insert("setname".into(), Value::Str("default".into()));
        let s = serde_json::to_string(&m).unwrap();
        let back: ValueMap = serde_json::from_str(&s).unwrap();
        assert_eq!(m, back);
    }

    #[test]
    fn numeric_coercions() {
        assert_eq!(Value::I64(-1).as_i64(), Some(-1));
        assert_eq!(Value::U64(5).as_i64(), Some(5));
        assert_eq!(Value::I64(-1).as_u64(), None);
    }
}
