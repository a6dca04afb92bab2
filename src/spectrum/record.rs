use std::fmt::Display;
use std::ops::Index;

use indexmap::map::{IntoIter, Iter, Keys, ValuesMut};
use indexmap::IndexMap;

use super::bindata::DecodedArray;

/// A single value stored in a [`Record`].
///
/// Controlled vocabulary facts, XML attributes, and element text are scalars,
/// child elements are nested records or lists of them, and decoded binary data
/// arrays are [`DecodedArray`]s.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Value {
    /// An empty placeholder, e.g. a childless element with no attributes
    #[default]
    Empty,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    List(Vec<Value>),
    Record(Record),
    Array(DecodedArray),
}

impl Value {
    /// Whether this value carries no information: the empty placeholder, an
    /// empty string, collection or array, a zero, or `false`.
    pub fn is_falsy(&self) -> bool {
        match self {
            Value::Empty => true,
            Value::Bool(b) => !b,
            Value::Int(i) => *i == 0,
            Value::Float(f) => *f == 0.0,
            Value::Text(s) => s.is_empty(),
            Value::List(v) => v.is_empty(),
            Value::Record(r) => r.is_empty(),
            Value::Array(a) => a.is_empty(),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_record(&self) -> Option<&Record> {
        match self {
            Value::Record(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&DecodedArray> {
        match self {
            Value::Array(a) => Some(a),
            _ => None,
        }
    }

    /// Convert a scalar to an integer the way a strict integer cast would:
    /// floats are truncated, text must spell an integer.
    pub fn coerce_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            Value::Float(f) if f.is_finite() => Some(f.trunc() as i64),
            Value::Bool(b) => Some(*b as i64),
            Value::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Empty => Ok(()),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::Text(s) => f.write_str(s),
            Value::List(v) => write!(f, "[{} values]", v.len()),
            Value::Record(r) => write!(f, "{{{} entries}}", r.len()),
            Value::Array(a) => write!(f, "<{} {:?} values>", a.len(), a.dtype()),
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<Record> for Value {
    fn from(value: Record) -> Self {
        Value::Record(value)
    }
}

impl From<DecodedArray> for Value {
    fn from(value: DecodedArray) -> Self {
        Value::Array(value)
    }
}

/**
An ordered mapping from field name to [`Value`], the shape every element read
from an mzML document takes.

A wrapper around [`indexmap::IndexMap`], entries keep the order they were
first inserted in. Removal preserves the order of the remaining entries.
*/
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Record(IndexMap<String, Value>);

/// A [`Record`] built from a `<spectrum>` element
pub type SpectrumRecord = Record;

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    #[inline]
    pub fn get_mut(&mut self, key: &str) -> Option<&mut Value> {
        self.0.get_mut(key)
    }

    /// Insert `value` under `key`, replacing and returning any previous value.
    /// A replaced entry keeps its position.
    #[inline]
    pub fn insert<K: Into<String>>(&mut self, key: K, value: Value) -> Option<Value> {
        self.0.insert(key.into(), value)
    }

    #[inline]
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.0.shift_remove(key)
    }

    #[inline]
    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Append `value` to the list stored under `key`, creating it if needed.
    /// A scalar already stored under `key` becomes the first list element.
    pub fn push_to_list<K: Into<String>>(&mut self, key: K, value: Value) {
        let slot = self.0.entry(key.into()).or_insert(Value::List(Vec::new()));
        match slot {
            Value::List(values) => values.push(value),
            other => {
                let first = std::mem::take(other);
                *other = Value::List(vec![first, value]);
            }
        }
    }

    /// Copy every entry of `other` into this record, overwriting on collision
    pub fn merge(&mut self, other: Record) {
        for (k, v) in other {
            self.0.insert(k, v);
        }
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn keys(&self) -> Keys<'_, String, Value> {
        self.0.keys()
    }

    pub fn iter(&self) -> Iter<'_, String, Value> {
        self.0.iter()
    }

    pub fn values_mut(&mut self) -> ValuesMut<'_, String, Value> {
        self.0.values_mut()
    }

    /// Look up a decoded array, e.g. `"m/z array"`
    pub fn get_array(&self, key: &str) -> Option<&DecodedArray> {
        self.get(key).and_then(Value::as_array)
    }

    pub fn get_int(&self, key: &str) -> Option<i64> {
        self.get(key).and_then(Value::as_int)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }

    pub fn get_record(&self, key: &str) -> Option<&Record> {
        self.get(key).and_then(Value::as_record)
    }

    /// The element's `id` attribute, if it had one
    pub fn id(&self) -> Option<&str> {
        self.get_str("id")
    }

    pub fn into_inner(self) -> IndexMap<String, Value> {
        self.0
    }
}

impl Index<&str> for Record {
    type Output = Value;

    fn index(&self, key: &str) -> &Self::Output {
        &self.0[key]
    }
}

impl IntoIterator for Record {
    type Item = (String, Value);
    type IntoIter = IntoIter<String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a Record {
    type Item = (&'a String, &'a Value);
    type IntoIter = Iter<'a, String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl<K: Into<String>> FromIterator<(K, Value)> for Record {
    fn from_iter<T: IntoIterator<Item = (K, Value)>>(iter: T) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}

impl<K: Into<String>> Extend<(K, Value)> for Record {
    fn extend<T: IntoIterator<Item = (K, Value)>>(&mut self, iter: T) {
        self.0.extend(iter.into_iter().map(|(k, v)| (k.into(), v)))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_order_preserved() {
        let mut rec: Record = [("id", Value::from("scan=1")), ("index", Value::Int(0))]
            .into_iter()
            .collect();
        rec.insert("ms level", Value::Float(2.0));
        rec.insert("id", Value::from("scan=2"));
        let keys: Vec<_> = rec.keys().map(|k| k.as_str()).collect();
        assert_eq!(keys, ["id", "index", "ms level"]);
        assert_eq!(rec.id(), Some("scan=2"));

        rec.remove("index");
        let keys: Vec<_> = rec.keys().map(|k| k.as_str()).collect();
        assert_eq!(keys, ["id", "ms level"]);
    }

    #[test]
    fn test_push_to_list() {
        let mut rec = Record::new();
        rec.insert("name", Value::from("MSn spectrum"));
        rec.push_to_list("name", Value::from("centroid spectrum"));
        rec.push_to_list("scan", Value::Int(1));
        assert_eq!(
            rec["name"],
            Value::List(vec!["MSn spectrum".into(), "centroid spectrum".into()])
        );
        assert_eq!(rec["scan"], Value::List(vec![Value::Int(1)]));
    }

    #[test]
    fn test_falsy_and_coercion() {
        assert!(Value::Empty.is_falsy());
        assert!(Value::Text(String::new()).is_falsy());
        assert!(Value::Float(0.0).is_falsy());
        assert!(!Value::from("m/z").is_falsy());
        assert_eq!(Value::Float(2.0).coerce_int(), Some(2));
        assert_eq!(Value::from(" 3 ").coerce_int(), Some(3));
        assert_eq!(Value::from("MS1").coerce_int(), None);
        assert_eq!(Value::Record(Record::new()).coerce_int(), None);
    }
}
