use super::*;
use crate::catalog::descriptor::{FieldSpec, IndexDescriptor, KeyPattern};

fn catalog() -> IndexCatalog {
    IndexCatalog::new(standard_access_method_factory())
}

#[test]
fn create_on_empty_collection_is_immediately_ready() {
    let catalog = catalog();
    let descriptor = IndexDescriptor::new("a_1", KeyPattern::new(vec![FieldSpec::asc("a")]));
    let entry = catalog.create_index_on_empty_collection(descriptor).unwrap();
    assert!(entry.is_ready());
}

#[test]
fn prepare_for_build_starts_not_ready() {
    let catalog = catalog();
    let descriptor = IndexDescriptor::new("a_1", KeyPattern::new(vec![FieldSpec::asc("a")]));
    let entry = catalog.prepare_for_index_build(descriptor).unwrap();
    assert!(!entry.is_ready());
    catalog.index_build_success("a_1").unwrap();
    assert!(catalog.find_index_by_name("a_1").unwrap().is_ready());
}

#[test]
fn duplicate_name_with_same_spec_is_already_exists() {
    let catalog = catalog();
    let descriptor = IndexDescriptor::new("a_1", KeyPattern::new(vec![FieldSpec::asc("a")]));
    catalog.create_index_on_empty_collection(descriptor.clone()).unwrap();
    let err = catalog.create_index_on_empty_collection(descriptor).unwrap_err();
    assert!(matches!(err, Error::IndexAlreadyExists(_)));
}

#[test]
fn equivalent_spec_under_different_name_conflicts() {
    let catalog = catalog();
    let a = IndexDescriptor::new("a_1", KeyPattern::new(vec![FieldSpec::asc("a")]));
    let b = IndexDescriptor::new("a_one", KeyPattern::new(vec![FieldSpec::asc("a")]));
    catalog.create_index_on_empty_collection(a).unwrap();
    let err = catalog.create_index_on_empty_collection(b).unwrap_err();
    assert!(matches!(err, Error::IndexOptionsConflict(_)));
}

#[test]
fn drop_unfinished_refuses_ready_index() {
    let catalog = catalog();
    let descriptor = IndexDescriptor::new("a_1", KeyPattern::new(vec![FieldSpec::asc("a")]));
    catalog.create_index_on_empty_collection(descriptor).unwrap();
    assert!(catalog.drop_unfinished_index("a_1").is_err());
    assert!(catalog.drop_index("a_1").is_ok());
}

#[test]
fn shard_key_prefixed_lookup() {
    let catalog = catalog();
    let descriptor =
        IndexDescriptor::new("sk", KeyPattern::new(vec![FieldSpec::asc("shard"), FieldSpec::asc("extra")]));
    catalog.create_index_on_empty_collection(descriptor).unwrap();
    let shard_key = KeyPattern::new(vec![FieldSpec::asc("shard")]);
    assert!(catalog.find_shard_key_prefixed_index(&shard_key).is_some());
}
