//! Self-describing typed document tree.
//!
//! [`Value`] is one tagged tree so a [`Document`] can hold nested maps,
//! arrays and scalars the way a BSON document would, without pulling in
//! wire-decoding (out of scope here — the key encoder only ever sees
//! already-parsed documents).

mod path;
#[cfg(test)]
#[path = "path_test.rs"]
mod path_test;

pub use path::FieldPath;

use std::cmp::Ordering;
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A decimal128-equivalent value. We keep it as a fixed-point
/// (unscaled, scale) pair rather than pulling in a bignum dependency;
/// good enough to preserve ordering and round-trip for the values this
/// crate's tests construct.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Decimal {
    pub unscaled: i128,
    pub scale: i32,
}

impl Decimal {
    pub fn as_f64(&self) -> f64 {
        self.unscaled as f64 / 10f64.powi(self.scale)
    }
}

/// One node of a [`Document`]'s typed tree.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum Value {
    Null,
    MinKey,
    MaxKey,
    Bool(bool),
    I32(i32),
    I64(i64),
    F64(f64),
    Decimal(Decimal),
    Str(String),
    Binary(Vec<u8>),
    DateTime(i64), // millis since epoch
    Array(Vec<Value>),
    Object(BTreeMap<String, Value>),
}

/// Numeric-type-preserving identity: used by tests exercising "type bits
/// distinguish them".
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NumericKind {
    I32,
    I64,
    F64,
    Decimal,
}

impl Value {
    pub fn numeric_kind(&self) -> Option<NumericKind> {
        match self {
            Value::I32(_) => Some(NumericKind::I32),
            Value::I64(_) => Some(NumericKind::I64),
            Value::F64(_) => Some(NumericKind::F64),
            Value::Decimal(_) => Some(NumericKind::Decimal),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::I32(v) => Some(*v as f64),
            Value::I64(v) => Some(*v as f64),
            Value::F64(v) => Some(*v),
            Value::Decimal(d) => Some(d.as_f64()),
            _ => None,
        }
    }

    pub fn is_array(&self) -> bool {
        matches!(self, Value::Array(_))
    }

    /// Numeric equivalence: integer, long, double, and decimal values
    /// with equal numeric value compare equal. NaN is handled by the
    /// caller (canonicalized before this is reached).
    pub fn numeric_eq(&self, other: &Value) -> bool {
        match (self.as_f64(), other.as_f64()) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        }
    }
}

// PartialEq up to numeric equivalence: a decode round-trip that changes
// I32 to I64 without changing value should still compare equal when
// type bits are not consulted.
impl PartialEq for Value {
    fn eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::MinKey, Value::MinKey) => true,
            (Value::MaxKey, Value::MaxKey) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Binary(a), Value::Binary(b)) => a == b,
            (Value::DateTime(a), Value::DateTime(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => a == b,
            (a, b) if a.numeric_kind().is_some() && b.numeric_kind().is_some() => {
                a.numeric_eq(b)
            }
            _ => false,
        }
    }
}

/// Ordering used for key encoding / min-max sentinel placement. MinKey
/// sorts before everything, MaxKey after everything, matching BSON's
/// canonical type-ordering intent.
impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Value) -> Option<Ordering> {
        use Value::*;
        Some(match (self, other) {
            (MinKey, MinKey) => Ordering::Equal,
            (MinKey, _) => Ordering::Less,
            (_, MinKey) => Ordering::Greater,
            (MaxKey, MaxKey) => Ordering::Equal,
            (MaxKey, _) => Ordering::Greater,
            (_, MaxKey) => Ordering::Less,
            (Null, Null) => Ordering::Equal,
            (a, b) if a.numeric_kind().is_some() && b.numeric_kind().is_some() => {
                let (x, y) = (a.as_f64().unwrap(), b.as_f64().unwrap());
                if x.is_nan() && y.is_nan() {
                    Ordering::Equal
                } else {
                    x.partial_cmp(&y)?
                }
            }
            (Str(a), Str(b)) => a.cmp(b),
            (Binary(a), Binary(b)) => a.cmp(b),
            (DateTime(a), DateTime(b)) => a.cmp(b),
            (Bool(a), Bool(b)) => a.cmp(b),
            (Array(a), Array(b)) => a.partial_cmp(b)?,
            _ => return None,
        })
    }
}

/// A collection document: a self-describing typed tree rooted at an
/// object.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Document(pub Value);

impl Document {
    pub fn new(root: BTreeMap<String, Value>) -> Document {
        Document(Value::Object(root))
    }

    /// Resolve every value reachable at `path`, expanding arrays along
    /// the way so that arrays produce one value per element. Returns
    /// the values paired with the set of path-prefixes at which an
    /// array was traversed (used to compute `MultikeyPaths`).
    pub fn resolve_path(&self, path: &FieldPath) -> Vec<(Value, Vec<String>)> {
        let mut out = Vec::new();
        resolve(&self.0, path.components(), Vec::new(), &mut out);
        out
    }

    /// All dotted paths reachable under `prefix`, used by wildcard
    /// indexes.
    pub fn expand_subtree(&self, prefix: &FieldPath) -> Vec<FieldPath> {
        let mut out = Vec::new();
        if let Some(root) = navigate(&self.0, prefix.components()) {
            let mut cur = prefix.to_string();
            collect_leaf_paths(root, &mut cur, &mut out);
        }
        out
    }
}

fn navigate<'a>(v: &'a Value, comps: &[String]) -> Option<&'a Value> {
    match comps.split_first() {
        None => Some(v),
        Some((head, rest)) => match v {
            Value::Object(map) => map.get(head).and_then(|v| navigate(v, rest)),
            _ => None,
        },
    }
}

fn resolve(v: &Value, comps: &[String], arrays_seen: Vec<String>, out: &mut Vec<(Value, Vec<String>)>) {
    // An array reached at any point (including the terminal value once
    // `comps` is exhausted) expands to one recursive call per element
    // rather than being handed to the caller whole — `{a: [1, 2, 3]}`
    // indexed on `a` must produce three scalar entries, not one
    // Array-valued entry.
    if let Value::Array(items) = v {
        for item in items {
            resolve(item, comps, arrays_seen.clone(), out);
        }
        return;
    }
    match comps.split_first() {
        None => out.push((v.clone(), arrays_seen)),
        Some((head, rest)) => match v {
            Value::Object(map) => match map.get(head) {
                Some(child) => {
                    // Tag `head` — the field whose value the array
                    // actually is — not whatever field a later path
                    // component happens to look up inside each element.
                    let mut next_arrays_seen = arrays_seen;
                    if matches!(child, Value::Array(_)) {
                        next_arrays_seen.push(head.clone());
                    }
                    resolve(child, rest, next_arrays_seen, out)
                }
                None => {} // missing field: caller treats as absent
            },
            _ => {}
        },
    }
}

fn collect_leaf_paths(v: &Value, prefix: &mut String, out: &mut Vec<FieldPath>) {
    match v {
        Value::Object(map) => {
            for (k, child) in map {
                let len = prefix.len();
                if !prefix.is_empty() {
                    prefix.push('.');
                }
                prefix.push_str(k);
                collect_leaf_paths(child, prefix, out);
                prefix.truncate(len);
            }
        }
        Value::Array(items) => {
            for item in items {
                collect_leaf_paths(item, prefix, out);
            }
        }
        _ => out.push(FieldPath::from_dotted(prefix)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn obj(pairs: &[(&str, Value)]) -> Document {
        let mut map = BTreeMap::new();
        for (k, v) in pairs {
            map.insert(k.to_string(), v.clone());
        }
        Document::new(map)
    }

    #[test]
    fn top_level_array_expands_to_one_entry_per_element() {
        let document = obj(&[("a", Value::Array(vec![Value::I32(1), Value::I32(2), Value::I32(3)]))]);
        let resolved = document.resolve_path(&FieldPath::from_dotted("a"));
        assert_eq!(resolved, vec![
            (Value::I32(1), vec!["a".to_string()]),
            (Value::I32(2), vec!["a".to_string()]),
            (Value::I32(3), vec!["a".to_string()]),
        ]);
    }

    #[test]
    fn nested_array_tags_the_field_that_holds_the_array() {
        let mut item1 = BTreeMap::new();
        item1.insert("b".to_string(), Value::I32(1));
        let mut item2 = BTreeMap::new();
        item2.insert("b".to_string(), Value::I32(2));
        let document = obj(&[("a", Value::Array(vec![Value::Object(item1), Value::Object(item2)]))]);
        let resolved = document.resolve_path(&FieldPath::from_dotted("a.b"));
        assert_eq!(resolved, vec![
            (Value::I32(1), vec!["a".to_string()]),
            (Value::I32(2), vec!["a".to_string()]),
        ]);
    }

    #[test]
    fn scalar_field_has_no_array_prefix() {
        let document = obj(&[("a", Value::I32(1))]);
        let resolved = document.resolve_path(&FieldPath::from_dotted("a"));
        assert_eq!(resolved, vec![(Value::I32(1), Vec::new())]);
    }
}
