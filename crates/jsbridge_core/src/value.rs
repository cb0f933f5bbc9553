//! Host-side dynamic values
//!
//! `HostValue` is the engine-independent shape of anything that crosses the
//! bridge. It is produced fresh on every marshal call and carries no identity.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A value on the host side of the bridge.
///
/// Numbers compare numerically across `Int` and `Float`, so `Int(3)` equals
/// `Float(3.0)`. NaN equals NaN, so values read back from the engine compare
/// equal to what was sent. Object equality ignores key order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum HostValue {
    Null,
    #[default]
    Undefined,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Array(Vec<HostValue>),
    Object(HostMap),
}

impl HostValue {
    /// Short name of the variant, used in diagnostics.
    pub fn type_name(&self) -> &'static str {
        match self {
            HostValue::Undefined => "undefined",
            HostValue::Null => "null",
            HostValue::Bool(_) => "bool",
            HostValue::Int(_) => "int",
            HostValue::Float(_) => "float",
            HostValue::String(_) => "string",
            HostValue::Array(_) => "array",
            HostValue::Object(_) => "object",
        }
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self, HostValue::Undefined)
    }

    /// True for both `Undefined` and `Null`.
    pub fn is_absent(&self) -> bool {
        matches!(self, HostValue::Undefined | HostValue::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            HostValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Integer view. Floats qualify only when they hold an exact integer.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            HostValue::Int(i) => Some(*i),
            HostValue::Float(f) if f.fract() == 0.0 && f.abs() <= MAX_SAFE_INTEGER => {
                Some(*f as i64)
            }
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            HostValue::Int(i) => Some(*i as f64),
            HostValue::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            HostValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[HostValue]> {
        match self {
            HostValue::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&HostMap> {
        match self {
            HostValue::Object(map) => Some(map),
            _ => None,
        }
    }
}

/// Largest integer a double represents exactly (2^53).
pub const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_992.0;

impl PartialEq for HostValue {
    fn eq(&self, other: &Self) -> bool {
        use HostValue::*;
        match (self, other) {
            (Undefined, Undefined) | (Null, Null) => true,
            (Bool(a), Bool(b)) => a == b,
            (Int(a), Int(b)) => a == b,
            (Float(a), Float(b)) => a == b || (a.is_nan() && b.is_nan()),
            (Int(a), Float(b)) | (Float(b), Int(a)) => (*a as f64) == *b,
            (String(a), String(b)) => a == b,
            (Array(a), Array(b)) => a == b,
            (Object(a), Object(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Display for HostValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HostValue::Undefined => f.write_str("undefined"),
            other => write!(f, "{}", serde_json::Value::from(other.clone())),
        }
    }
}

// ============================================================================
// Conversions from Rust scalars
// ============================================================================

impl From<bool> for HostValue {
    fn from(value: bool) -> Self {
        HostValue::Bool(value)
    }
}

impl From<i32> for HostValue {
    fn from(value: i32) -> Self {
        HostValue::Int(value.into())
    }
}

impl From<i64> for HostValue {
    fn from(value: i64) -> Self {
        HostValue::Int(value)
    }
}

impl From<f64> for HostValue {
    fn from(value: f64) -> Self {
        HostValue::Float(value)
    }
}

impl From<&str> for HostValue {
    fn from(value: &str) -> Self {
        HostValue::String(value.to_string())
    }
}

impl From<String> for HostValue {
    fn from(value: String) -> Self {
        HostValue::String(value)
    }
}

impl<T: Into<HostValue>> From<Vec<T>> for HostValue {
    fn from(items: Vec<T>) -> Self {
        HostValue::Array(items.into_iter().map(Into::into).collect())
    }
}

impl From<HostMap> for HostValue {
    fn from(map: HostMap) -> Self {
        HostValue::Object(map)
    }
}

impl<T: Into<HostValue>> From<Option<T>> for HostValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(HostValue::Null, Into::into)
    }
}

// ============================================================================
// serde_json interop
// ============================================================================

impl From<serde_json::Value> for HostValue {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => HostValue::Null,
            serde_json::Value::Bool(b) => HostValue::Bool(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => HostValue::Int(i),
                None => HostValue::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            serde_json::Value::String(s) => HostValue::String(s),
            serde_json::Value::Array(items) => {
                HostValue::Array(items.into_iter().map(HostValue::from).collect())
            }
            serde_json::Value::Object(map) => HostValue::Object(
                map.into_iter()
                    .map(|(k, v)| (k, HostValue::from(v)))
                    .collect(),
            ),
        }
    }
}

/// Undefined becomes `null`, as does any non-finite float.
impl From<HostValue> for serde_json::Value {
    fn from(value: HostValue) -> Self {
        match value {
            HostValue::Undefined | HostValue::Null => serde_json::Value::Null,
            HostValue::Bool(b) => serde_json::Value::Bool(b),
            HostValue::Int(i) => serde_json::Value::from(i),
            HostValue::Float(f) => serde_json::Number::from_f64(f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            HostValue::String(s) => serde_json::Value::String(s),
            HostValue::Array(items) => {
                serde_json::Value::Array(items.into_iter().map(serde_json::Value::from).collect())
            }
            HostValue::Object(map) => serde_json::Value::Object(
                map.into_iter()
                    .map(|(k, v)| (k, serde_json::Value::from(v)))
                    .collect(),
            ),
        }
    }
}

// ============================================================================
// HostMap
// ============================================================================

/// String-keyed mapping that remembers insertion order.
///
/// Equality ignores order: two maps are equal when they hold the same keys
/// with equal values.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HostMap {
    entries: IndexMap<String, HostValue>,
}

impl HostMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: IndexMap::with_capacity(capacity),
        }
    }

    /// Insert or overwrite `key`. An overwritten key keeps its position.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<HostValue>) -> Option<HostValue> {
        self.entries.insert(key.into(), value.into())
    }

    pub fn get(&self, key: &str) -> Option<&HostValue> {
        self.entries.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Remove `key`, keeping the order of the remaining entries.
    pub fn remove(&mut self, key: &str) -> Option<HostValue> {
        self.entries.shift_remove(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &HostValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl PartialEq for HostMap {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len()
            && self
                .iter()
                .all(|(key, value)| other.get(key).is_some_and(|v| v == value))
    }
}

impl<K: Into<String>, V: Into<HostValue>> FromIterator<(K, V)> for HostMap {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }
}

impl IntoIterator for HostMap {
    type Item = (String, HostValue);
    type IntoIter = indexmap::map::IntoIter<String, HostValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numbers_compare_across_variants() {
        assert_eq!(HostValue::Int(3), HostValue::Float(3.0));
        assert_ne!(HostValue::Int(3), HostValue::Float(3.5));
        assert_ne!(HostValue::Int(0), HostValue::Bool(false));
        assert_ne!(HostValue::Undefined, HostValue::Null);
    }

    #[test]
    fn test_nan_equals_nan() {
        assert_eq!(HostValue::Float(f64::NAN), HostValue::Float(f64::NAN));
        assert_ne!(HostValue::Float(f64::NAN), HostValue::Float(1.0));
        assert_ne!(HostValue::Int(0), HostValue::Float(f64::NAN));
    }

    #[test]
    fn test_large_map_keeps_order_and_lookups() {
        let map: HostMap = (0..50_000).map(|i| (format!("key{i}"), i)).collect();
        assert_eq!(map.len(), 50_000);
        assert_eq!(map.keys().next(), Some("key0"));
        assert_eq!(map.keys().last(), Some("key49999"));
        assert_eq!(map.get("key31337"), Some(&HostValue::Int(31337)));
    }

    #[test]
    fn test_map_remove_keeps_order() {
        let mut map: HostMap = [("a", 1), ("b", 2), ("c", 3)].into_iter().collect();
        assert_eq!(map.remove("a"), Some(HostValue::Int(1)));
        assert_eq!(map.keys().collect::<Vec<_>>(), vec!["b", "c"]);
        assert_eq!(serde_json::to_string(&map).unwrap(), r#"{"b":2,"c":3}"#);
    }

    #[test]
    fn test_map_equality_ignores_order() {
        let a: HostMap = [("a", 1), ("b", 2)].into_iter().collect();
        let b: HostMap = [("b", 2), ("a", 1)].into_iter().collect();
        assert_eq!(a, b);

        let c: HostMap = [("a", 1)].into_iter().collect();
        assert_ne!(a, c);
    }

    #[test]
    fn test_map_insert_overwrites_in_place() {
        let mut map = HostMap::new();
        map.insert("first", 1);
        map.insert("second", 2);
        assert_eq!(map.insert("first", "again"), Some(HostValue::Int(1)));

        let keys: Vec<_> = map.keys().collect();
        assert_eq!(keys, vec!["first", "second"]);
        assert_eq!(map.get("first"), Some(&HostValue::from("again")));
    }

    #[test]
    fn test_json_interop() {
        let json = serde_json::json!({"a": 1, "b": [2, 3.5, "x", null, true]});
        let value = HostValue::from(json.clone());

        let object = value.as_object().unwrap();
        assert_eq!(object.get("a"), Some(&HostValue::Int(1)));
        let items = object.get("b").and_then(HostValue::as_array).unwrap();
        assert_eq!(items[1], HostValue::Float(3.5));
        assert_eq!(items[3], HostValue::Null);

        assert_eq!(serde_json::Value::from(value), json);
    }

    #[test]
    fn test_undefined_serializes_as_null() {
        let value = HostValue::Array(vec![HostValue::Undefined, HostValue::Float(f64::NAN)]);
        assert_eq!(serde_json::to_string(&value).unwrap(), "[null,null]");
        assert_eq!(HostValue::Undefined.to_string(), "undefined");
    }

    #[test]
    fn test_deserialize_prefers_int() {
        let value: HostValue = serde_json::from_str(r#"{"n": 7, "f": 7.25, "z": null}"#).unwrap();
        let object = value.as_object().unwrap();
        assert!(matches!(object.get("n"), Some(HostValue::Int(7))));
        assert!(matches!(object.get("f"), Some(HostValue::Float(_))));
        assert!(matches!(object.get("z"), Some(HostValue::Null)));
    }

    #[test]
    fn test_as_i64_accepts_integral_floats() {
        assert_eq!(HostValue::Float(4.0).as_i64(), Some(4));
        assert_eq!(HostValue::Float(4.5).as_i64(), None);
        assert_eq!(HostValue::from("4").as_i64(), None);
    }
}
