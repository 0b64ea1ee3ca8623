//! Collection: the per-namespace entry point a caller actually invokes
//! `createIndexes`/`dropIndexes`/`collMod` against, tying together the
//! catalog, the build coordinator, and the lock hierarchy in one handle
//! rather than exposing them as separate objects callers must sequence
//! themselves.

use std::sync::Arc;

use crate::catalog::descriptor::{IndexDescriptor, KeyPattern};
use crate::catalog::{standard_access_method_factory, IndexCatalog};
use crate::error::{Error, Result};
use crate::ibc::{IndexBuildCoordinator, Interceptor};
use crate::lock::{LockManager, LockMode};
use crate::storage_engine::{OplogWriter, RecordStore};

/// The default `_id` index name every collection is assumed to carry
/// and which `dropIndexes` refuses to touch.
pub const ID_INDEX_NAME: &str = "_id_";

pub struct CreateIndexesRequest {
    pub specs: Vec<IndexDescriptor>,
}

/// The three ways `dropIndexes` may name its targets.
pub enum DropIndexesSpec {
    All,
    Name(String),
    Names(Vec<String>),
    KeyPattern(KeyPattern),
}

#[derive(Clone, Debug, Default)]
pub struct CollModOptions {
    pub index: Option<CollModIndexOptions>,
}

#[derive(Clone, Debug)]
pub struct CollModIndexOptions {
    pub name: String,
    pub hidden: Option<bool>,
    pub expire_after_seconds: Option<u64>,
}

#[derive(Clone, Debug, Default)]
pub struct CreateIndexesReply {
    pub indexes_before: usize,
    pub indexes_after: usize,
    pub created: Vec<String>,
}

/// One namespace: its document store plus the index machinery layered
/// over it. `R` is the storage engine's collection-scan implementation
///; the reference in-memory SDI factory is always used for
/// the indexes themselves regardless of `R`.
pub struct Collection<R: RecordStore> {
    database: String,
    name: String,
    record_store: Arc<R>,
    catalog: IndexCatalog,
    ibc: IndexBuildCoordinator,
    locks: Arc<LockManager>,
}

impl<R: RecordStore> Collection<R> {
    pub fn new(database: &str, name: &str, record_store: Arc<R>, locks: Arc<LockManager>) -> Collection<R> {
        Collection {
            database: database.to_string(),
            name: name.to_string(),
            record_store,
            catalog: IndexCatalog::new(standard_access_method_factory()),
            ibc: IndexBuildCoordinator::new(),
            locks,
        }
    }

    pub fn catalog(&self) -> &IndexCatalog {
        &self.catalog
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// A truly empty collection builds inline; a non-empty one goes
    /// through the index-build coordinator so concurrent writers keep
    /// seeing consistent reads while the scan and drains run.
    pub fn create_indexes(
        &self,
        request: CreateIndexesRequest,
        oplog: Option<&dyn OplogWriter>,
    ) -> Result<CreateIndexesReply> {
        let _guard = self.locks.lock_collection(&self.database, &self.name, LockMode::IntentExclusive);
        let before = self.catalog.get_index_iterator(true).len();
        let mut created = Vec::new();

        let mut pending = Vec::new();
        for descriptor in request.specs {
            if let Some(existing) = self.catalog.find_index_by_name(&descriptor.name) {
                if existing.descriptor.identical_to(&descriptor) {
                    continue;
                }
                if existing.descriptor.equivalent_to(&descriptor) {
                    return Err(Error::IndexOptionsConflict(format!(
                        "index '{}' already exists with different options",
                        descriptor.name
                    )));
                }
            }
            pending.push(descriptor);
        }

        if self.record_store.num_records() == 0 {
            for descriptor in pending {
                let entry = self.catalog.create_index_on_empty_collection(descriptor)?;
                created.push(entry.descriptor.name.clone());
            }
        } else if !pending.is_empty() {
            let mut entries = Vec::new();
            let mut names = Vec::new();
            for descriptor in pending {
                let entry = self.catalog.prepare_for_index_build(descriptor)?;
                names.push(entry.descriptor.name.clone());
                entries.push(entry);
            }
            let state = self.ibc.register(&self.name, names.clone())?;
            let interceptor = Interceptor::new();
            let documents = self.record_store.iter();
            match self.ibc.run_build(&state, &self.catalog, &entries, documents, &interceptor, oplog) {
                Ok(()) => created.extend(names),
                Err(err) => {
                    let _ = self.ibc.abort_build(&state, &self.catalog, &format!("{}", err), oplog);
                    return Err(err);
                }
            }
        }

        let after = self.catalog.get_index_iterator(true).len();
        Ok(CreateIndexesReply { indexes_before: before, indexes_after: after, created })
    }

    /// Resolves `spec` to concrete names, refuses to drop `_id_`, then
    /// removes each ready index.
    pub fn drop_indexes(&self, spec: DropIndexesSpec) -> Result<Vec<String>> {
        let _guard = self.locks.lock_collection(&self.database, &self.name, LockMode::IntentExclusive);
        let names = self.resolve_drop_names(spec)?;
        let mut dropped = Vec::new();
        for name in names {
            if name == ID_INDEX_NAME {
                return Err(Error::InvalidOptions("cannot drop the _id index".to_string()));
            }
            self.catalog.drop_index(&name)?;
            dropped.push(name);
        }
        Ok(dropped)
    }

    fn resolve_drop_names(&self, spec: DropIndexesSpec) -> Result<Vec<String>> {
        match spec {
            DropIndexesSpec::All => Ok(self
                .catalog
                .get_index_iterator(false)
                .into_iter()
                .map(|e| e.descriptor.name.clone())
                .filter(|n| n != ID_INDEX_NAME)
                .collect()),
            DropIndexesSpec::Name(name) => Ok(vec![name]),
            DropIndexesSpec::Names(names) => Ok(names),
            DropIndexesSpec::KeyPattern(pattern) => {
                let entry = self
                    .catalog
                    .find_index_by_key_pattern(&pattern)
                    .ok_or_else(|| Error::IndexNotFound("no index with that key pattern".to_string()))?;
                Ok(vec![entry.descriptor.name.clone()])
            }
        }
    }

    /// `collMod`'s index-options branch: hidden/TTL are
    /// the only descriptor fields a running index may change without a
    /// rebuild, so this swaps in an updated descriptor over the same
    /// live access method rather than dropping and recreating.
    pub fn coll_mod(&self, options: CollModOptions) -> Result<()> {
        let _guard = self.locks.lock_collection(&self.database, &self.name, LockMode::IntentExclusive);
        let Some(index_opts) = options.index else {
            return Ok(());
        };
        let entry = self
            .catalog
            .find_index_by_name(&index_opts.name)
            .ok_or_else(|| Error::IndexNotFound(index_opts.name.clone()))?;
        let mut updated = entry.descriptor.clone();
        if let Some(hidden) = index_opts.hidden {
            updated.hidden = hidden;
        }
        if let Some(ttl) = index_opts.expire_after_seconds {
            updated.expire_after_seconds = Some(ttl);
        }
        drop(entry);
        self.catalog.modify_index_descriptor(&index_opts.name, updated)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::descriptor::FieldSpec;
    use crate::document::{Document, Value};
    use crate::key_encoder::RecordId;
    use std::collections::BTreeMap;
    use std::sync::RwLock;

    struct MemoryRecordStore {
        docs: RwLock<Vec<(RecordId, Document)>>,
    }

    impl MemoryRecordStore {
        fn new(docs: Vec<(RecordId, Document)>) -> MemoryRecordStore {
            MemoryRecordStore { docs: RwLock::new(docs) }
        }
    }

    impl RecordStore for MemoryRecordStore {
        fn iter(&self) -> Box<dyn Iterator<Item = (RecordId, Document)> + '_> {
            Box::new(self.docs.read().unwrap().clone().into_iter())
        }

        fn num_records(&self) -> u64 {
            self.docs.read().unwrap().len() as u64
        }
    }

    fn doc(n: i32) -> (RecordId, Document) {
        let mut map = BTreeMap::new();
        map.insert("a".to_string(), Value::I32(n));
        (RecordId::Long(n as i64), Document::new(map))
    }

    #[test]
    fn create_indexes_on_empty_collection_is_immediate() {
        let store = Arc::new(MemoryRecordStore::new(Vec::new()));
        let collection = Collection::new("db", "coll", store, Arc::new(LockManager::new()));
        let reply = collection
            .create_indexes(
                CreateIndexesRequest { specs: vec![IndexDescriptor::new("a_1", KeyPattern::new(vec![FieldSpec::asc("a")]))] },
                None,
            )
            .unwrap();
        assert_eq!(reply.created, vec!["a_1".to_string()]);
        assert!(collection.catalog().find_index_by_name("a_1").unwrap().is_ready());
    }

    #[test]
    fn create_indexes_on_populated_collection_goes_through_build() {
        let store = Arc::new(MemoryRecordStore::new(vec![doc(1), doc(2)]));
        let collection = Collection::new("db", "coll", store, Arc::new(LockManager::new()));
        let reply = collection
            .create_indexes(
                CreateIndexesRequest { specs: vec![IndexDescriptor::new("a_1", KeyPattern::new(vec![FieldSpec::asc("a")]))] },
                None,
            )
            .unwrap();
        assert_eq!(reply.created, vec!["a_1".to_string()]);
        let entry = collection.catalog().find_index_by_name("a_1").unwrap();
        assert!(entry.is_ready());
        assert_eq!(entry.access_method.stats().num_keys, 2);
    }

    #[test]
    fn drop_indexes_refuses_the_id_index() {
        let store = Arc::new(MemoryRecordStore::new(Vec::new()));
        let collection = Collection::new("db", "coll", store, Arc::new(LockManager::new()));
        collection
            .create_indexes(
                CreateIndexesRequest { specs: vec![IndexDescriptor::new(ID_INDEX_NAME, KeyPattern::new(vec![FieldSpec::asc("_id")]))] },
                None,
            )
            .unwrap();
        let err = collection.drop_indexes(DropIndexesSpec::Name(ID_INDEX_NAME.to_string())).unwrap_err();
        assert!(matches!(err, Error::InvalidOptions(_)));
    }

    #[test]
    fn coll_mod_updates_hidden_without_losing_keys() {
        let store = Arc::new(MemoryRecordStore::new(vec![doc(1)]));
        let collection = Collection::new("db", "coll", store, Arc::new(LockManager::new()));
        collection
            .create_indexes(
                CreateIndexesRequest { specs: vec![IndexDescriptor::new("a_1", KeyPattern::new(vec![FieldSpec::asc("a")]))] },
                None,
            )
            .unwrap();
        collection
            .coll_mod(CollModOptions {
                index: Some(CollModIndexOptions { name: "a_1".to_string(), hidden: Some(true), expire_after_seconds: None }),
            })
            .unwrap();
        let entry = collection.catalog().find_index_by_name("a_1").unwrap();
        assert!(entry.descriptor.hidden);
        assert_eq!(entry.access_method.stats().num_keys, 1);
    }
}
