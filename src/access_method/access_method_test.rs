use std::collections::BTreeMap;
use std::sync::Arc;

use super::*;
use crate::catalog::descriptor::{FieldSpec, IndexDescriptor, IndexKind, KeyPattern};
use crate::document::{Document, Value};
use crate::key_encoder::RecordId;
use crate::sdi::BTreeMapSdi;

fn doc(pairs: &[(&str, Value)]) -> Document {
    let mut map = BTreeMap::new();
    for (k, v) in pairs {
        map.insert(k.to_string(), v.clone());
    }
    Document::new(map)
}

#[test]
fn btree_insert_then_remove() {
    let descriptor = IndexDescriptor::new("a_1", KeyPattern::new(vec![FieldSpec::asc("a")]));
    let am = new_btree(descriptor, Arc::new(BTreeMapSdi::new()));
    let document = doc(&[("a", Value::I32(1))]);
    let result = am.insert(&document, RecordId::Long(1)).unwrap();
    assert_eq!(result.keys_inserted, 1);
    assert_eq!(am.stats().num_keys, 1);
    am.remove(&document, RecordId::Long(1)).unwrap();
    assert_eq!(am.stats().num_keys, 0);
}

#[test]
fn hashed_single_key_per_document() {
    let descriptor =
        IndexDescriptor::new("h_1", KeyPattern::new(vec![FieldSpec::asc("a")])).with_kind(IndexKind::Hashed);
    let am = new_hashed(descriptor, Arc::new(BTreeMapSdi::new()));
    let document = doc(&[("a", Value::Array(vec![Value::I32(1), Value::I32(2)]))]);
    let result = am.insert(&document, RecordId::Long(1)).unwrap();
    assert_eq!(result.keys_inserted, 1);
}

#[test]
fn text_tokenizes_and_drops_stopwords() {
    let descriptor = IndexDescriptor::new("t", KeyPattern::new(vec![FieldSpec::asc("body")]));
    let am = TextAccessMethod::new(descriptor, Arc::new(BTreeMapSdi::new()));
    let document = doc(&[("body", Value::Str("the Quick fox".to_string()))]);
    let result = am.insert(&document, RecordId::Long(1)).unwrap();
    assert_eq!(result.keys_inserted, 2); // "the" is a stopword
}

#[test]
fn columnar_keys_each_path_independently() {
    let descriptor = IndexDescriptor::new("c", KeyPattern::new(vec![])).with_kind(IndexKind::Columnar);
    let am = ColumnarAccessMethod::new(descriptor, Arc::new(|| Arc::new(BTreeMapSdi::new()) as Arc<dyn crate::sdi::SortedDataInterface>));
    let document = doc(&[("a", Value::I32(1)), ("b", Value::I32(2))]);
    am.insert(&document, RecordId::Long(1)).unwrap();
    assert_eq!(am.num_cells(), 2);
}
