use std::collections::BTreeMap;

use super::*;
use crate::catalog::descriptor::{FieldSpec, IndexDescriptor, KeyPattern};
use crate::catalog::{standard_access_method_factory, IndexCatalog};
use crate::document::{Document, Value};

fn doc(n: i32) -> (RecordId, Document) {
    let mut map = BTreeMap::new();
    map.insert("a".to_string(), Value::I32(n));
    (RecordId::Long(n as i64), Document::new(map))
}

#[test]
fn register_conflict_on_same_collection_and_index_name() {
    let _ = env_logger::builder().is_test(true).try_init();
    let ibc = IndexBuildCoordinator::new();
    ibc.register("coll", vec!["a_1".into()]).unwrap();
    let err = ibc.register("coll", vec!["a_1".into()]).unwrap_err();
    assert!(matches!(err, Error::IndexBuildAlreadyInProgress(_)));
}

#[test]
fn run_build_commits_and_catalog_entry_becomes_ready() {
    let catalog = IndexCatalog::new(standard_access_method_factory());
    let descriptor = IndexDescriptor::new("a_1", KeyPattern::new(vec![FieldSpec::asc("a")]));
    let entry = catalog.prepare_for_index_build(descriptor).unwrap();

    let ibc = IndexBuildCoordinator::new();
    let state = ibc.register("coll", vec!["a_1".into()]).unwrap();
    let interceptor = Interceptor::new();
    let documents = vec![doc(1), doc(2), doc(3)].into_iter();

    ibc.run_build(&state, &catalog, &[entry.clone()], documents, &interceptor, None).unwrap();

    assert!(entry.is_ready());
    assert!(state.is_complete());
    assert_eq!(entry.access_method.stats().num_keys, 3);
}

#[test]
fn abort_build_drops_unfinished_entry() {
    let catalog = IndexCatalog::new(standard_access_method_factory());
    let descriptor = IndexDescriptor::new("a_1", KeyPattern::new(vec![FieldSpec::asc("a")]));
    catalog.prepare_for_index_build(descriptor).unwrap();

    let ibc = IndexBuildCoordinator::new();
    let state = ibc.register("coll", vec!["a_1".into()]).unwrap();
    ibc.abort_build(&state, &catalog, "killOp", None).unwrap();

    assert!(state.is_aborted());
    assert!(catalog.find_index_by_name("a_1").is_none());
}
