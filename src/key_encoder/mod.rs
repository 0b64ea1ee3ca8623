//! Key Encoder: translates a document plus a descriptor
//! into zero or more `(OrderedKey, TypeBits, MultikeyPathSet)` triples.

mod encode;
mod ordered_key;

pub use encode::{encode, ConstraintHandling, EncodeMode, EncodeResult};
pub use ordered_key::{encode_value, FieldTypeBit, OrderedKey, RecordId, TypeBits};

use std::collections::{BTreeMap, BTreeSet};

/// For each indexed field, the set of array-containing path prefixes
/// encountered at indexing time. Empty for every field means not
/// multikey.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MultikeyPaths {
    pub per_field: BTreeMap<String, BTreeSet<String>>,
}

impl MultikeyPaths {
    pub fn new() -> MultikeyPaths {
        MultikeyPaths::default()
    }

    pub fn record(&mut self, field: &str, array_prefixes: &[String]) {
        if array_prefixes.is_empty() {
            return;
        }
        let entry = self.per_field.entry(field.to_string()).or_default();
        // Record every prefix of the array-containing path traversed.
        let mut acc = String::new();
        for comp in array_prefixes {
            if !acc.is_empty() {
                acc.push('.');
            }
            acc.push_str(comp);
            entry.insert(acc.clone());
        }
    }

    pub fn merge(&mut self, other: &MultikeyPaths) {
        for (field, paths) in &other.per_field {
            self.per_field.entry(field.clone()).or_default().extend(paths.iter().cloned());
        }
    }

    /// Multikey overall: any field's component set is non-empty.
    pub fn is_multikey(&self) -> bool {
        self.per_field.values().any(|s| !s.is_empty())
    }
}
