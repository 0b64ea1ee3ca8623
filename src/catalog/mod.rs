//! Index Catalog: the collection-scoped registry of
//! [`IndexCatalogEntry`] handles, a registry dispatching operations
//! across several live indexes by name.

pub mod descriptor;
mod entry;
#[cfg(test)]
#[path = "catalog_test.rs"]
mod catalog_test;

pub use descriptor::IndexDescriptor;
pub use entry::{IndexCatalogEntry, Readiness};

use std::sync::{Arc, RwLock};

use crate::access_method::AccessMethod;
use crate::error::{Error, Result};
use crate::key_encoder::MultikeyPaths;
use crate::sdi::SortedDataInterface;

/// Builds the access method (and its backing SDI) for one descriptor.
/// Injected rather than a global `static` registry, matching how a
/// top-level storage handle takes its factory as a constructor
/// argument instead of reaching for a singleton.
pub type AccessMethodFactory = Arc<dyn Fn(&IndexDescriptor) -> Box<dyn AccessMethod> + Send + Sync>;

pub fn default_sdi_factory() -> Arc<dyn Fn() -> Arc<dyn SortedDataInterface> + Send + Sync> {
    Arc::new(|| Arc::new(crate::sdi::BTreeMapSdi::new()) as Arc<dyn SortedDataInterface>)
}

/// Builds the standard access methods (b-tree/hashed/geo/wildcard/
/// text/columnar) over the in-memory reference SDI. Production
/// deployments supply their own factory wired to a real storage engine.
pub fn standard_access_method_factory() -> AccessMethodFactory {
    let sdi_factory = default_sdi_factory();
    Arc::new(move |descriptor: &IndexDescriptor| -> Box<dyn AccessMethod> {
        use crate::access_method::*;
        use descriptor::IndexKind;
        match descriptor.kind {
            IndexKind::BTree => new_btree(descriptor.clone(), sdi_factory()),
            IndexKind::Hashed => new_hashed(descriptor.clone(), sdi_factory()),
            IndexKind::Geo2d => new_geo_2d(descriptor.clone(), sdi_factory()),
            IndexKind::Geo2dSphere => new_geo_2dsphere(descriptor.clone(), sdi_factory()),
            IndexKind::Wildcard => new_wildcard(descriptor.clone(), sdi_factory()),
            IndexKind::Text => Box::new(TextAccessMethod::new(descriptor.clone(), sdi_factory())),
            IndexKind::Columnar => {
                let f = sdi_factory.clone();
                Box::new(ColumnarAccessMethod::new(descriptor.clone(), Arc::new(move || f())))
            }
        }
    })
}

/// The collection-scoped set of indexes and their build state.
pub struct IndexCatalog {
    entries: RwLock<Vec<Arc<IndexCatalogEntry>>>,
    access_method_factory: AccessMethodFactory,
}

impl IndexCatalog {
    pub fn new(access_method_factory: AccessMethodFactory) -> IndexCatalog {
        IndexCatalog { entries: RwLock::new(Vec::new()), access_method_factory }
    }

    fn check_name_conflict(&self, descriptor: &IndexDescriptor) -> Result<()> {
        let entries = self.entries.read().unwrap();
        for entry in entries.iter() {
            if entry.descriptor.name == descriptor.name {
                if entry.descriptor.equivalent_to(descriptor) {
                    return Err(Error::IndexAlreadyExists(descriptor.name.clone()));
                }
                return Err(Error::IndexKeySpecsConflict(format!(
                    "index name '{}' already in use with a different spec",
                    descriptor.name
                )));
            }
            if entry.descriptor.name != descriptor.name && entry.descriptor.equivalent_to(descriptor) {
                return Err(Error::IndexOptionsConflict(format!(
                    "an equivalent index already exists under the name '{}'",
                    entry.descriptor.name
                )));
            }
        }
        Ok(())
    }

    /// Fast path for a truly empty collection: build and mark ready in
    /// one step, no [`crate::ibc`] coordination needed. Callers must have verified the collection holds zero
    /// documents; this function does not re-check.
    pub fn create_index_on_empty_collection(&self, descriptor: IndexDescriptor) -> Result<Arc<IndexCatalogEntry>> {
        self.check_name_conflict(&descriptor)?;
        let am = (self.access_method_factory)(&descriptor);
        let entry = IndexCatalogEntry::new(descriptor, am);
        entry.mark_ready();
        self.entries.write().unwrap().push(entry.clone());
        Ok(entry)
    }

    /// Registers a new entry in `Building` state, to be driven through
    /// to readiness by the index-build coordinator.
    pub fn prepare_for_index_build(&self, descriptor: IndexDescriptor) -> Result<Arc<IndexCatalogEntry>> {
        self.check_name_conflict(&descriptor)?;
        let am = (self.access_method_factory)(&descriptor);
        let entry = IndexCatalogEntry::new(descriptor, am);
        self.entries.write().unwrap().push(entry.clone());
        Ok(entry)
    }

    pub fn index_build_success(&self, name: &str) -> Result<()> {
        let entry = self.find_index_by_name(name).ok_or_else(|| Error::IndexNotFound(name.to_string()))?;
        entry.mark_ready();
        Ok(())
    }

    /// Removes a ready index. Returns its descriptor.
    pub fn drop_index(&self, name: &str) -> Result<IndexDescriptor> {
        let mut entries = self.entries.write().unwrap();
        let pos = entries
            .iter()
            .position(|e| e.descriptor.name == name && e.readiness() == Readiness::Ready)
            .ok_or_else(|| Error::IndexNotFound(name.to_string()))?;
        Ok(entries.remove(pos).descriptor.clone())
    }

    /// Removes an in-progress (never readied) index, used when a build
    /// is aborted.
    pub fn drop_unfinished_index(&self, name: &str) -> Result<()> {
        let mut entries = self.entries.write().unwrap();
        let pos = entries
            .iter()
            .position(|e| e.descriptor.name == name && e.readiness() != Readiness::Ready)
            .ok_or_else(|| Error::IndexNotFound(name.to_string()))?;
        entries.remove(pos);
        Ok(())
    }

    /// Removes an entry regardless of readiness state.
    pub fn remove_index(&self, name: &str) -> Result<IndexDescriptor> {
        let mut entries = self.entries.write().unwrap();
        let pos = entries
            .iter()
            .position(|e| e.descriptor.name == name)
            .ok_or_else(|| Error::IndexNotFound(name.to_string()))?;
        Ok(entries.remove(pos).descriptor.clone())
    }

    pub fn find_index_by_name(&self, name: &str) -> Option<Arc<IndexCatalogEntry>> {
        self.entries.read().unwrap().iter().find(|e| e.descriptor.name == name).cloned()
    }

    pub fn find_index_by_key_pattern(&self, pattern: &descriptor::KeyPattern) -> Option<Arc<IndexCatalogEntry>> {
        self.entries.read().unwrap().iter().find(|e| &e.descriptor.key_pattern == pattern).cloned()
    }

    /// An index whose key pattern starts with `shard_key_pattern`,
    /// needed so sharding can pick an existing index to enforce the
    /// shard key constraint instead of building a redundant one.
    pub fn find_shard_key_prefixed_index(
        &self,
        shard_key_pattern: &descriptor::KeyPattern,
    ) -> Option<Arc<IndexCatalogEntry>> {
        self.entries
            .read()
            .unwrap()
            .iter()
            .find(|e| {
                e.descriptor.key_pattern.0.len() >= shard_key_pattern.0.len()
                    && e.descriptor.key_pattern.0[..shard_key_pattern.0.len()] == shard_key_pattern.0[..]
            })
            .cloned()
    }

    pub fn get_entry(&self, name: &str) -> Option<Arc<IndexCatalogEntry>> {
        self.find_index_by_name(name)
    }

    /// All entries, optionally including ones still `Building`/`Frozen`.
    pub fn get_index_iterator(&self, include_unfinished: bool) -> Vec<Arc<IndexCatalogEntry>> {
        self.entries
            .read()
            .unwrap()
            .iter()
            .filter(|e| include_unfinished || e.readiness() == Readiness::Ready)
            .cloned()
            .collect()
    }

    /// Drops every index (used when the collection itself is dropped).
    pub fn remove_existing_indexes(&self) -> Vec<IndexDescriptor> {
        let mut entries = self.entries.write().unwrap();
        entries.drain(..).map(|e| e.descriptor.clone()).collect()
    }

    /// No-op re-read hook for a persisted catalog; the in-memory
    /// reference catalog has nothing to refresh from.
    pub fn refresh_entry(&self, name: &str) -> Option<Arc<IndexCatalogEntry>> {
        self.find_index_by_name(name)
    }

    /// `collMod`'s index-options update: swaps in a
    /// descriptor with `hidden`/`expire_after_seconds` changed while
    /// keeping the entry's live access method and data, rather than
    /// rebuilding the index from scratch. Fails if another handle to
    /// the old entry is still outstanding, since the access method can
    /// only be moved out of a uniquely-owned `Arc`.
    pub fn modify_index_descriptor(&self, name: &str, updated: IndexDescriptor) -> Result<Arc<IndexCatalogEntry>> {
        let mut entries = self.entries.write().unwrap();
        let pos = entries
            .iter()
            .position(|e| e.descriptor.name == name)
            .ok_or_else(|| Error::IndexNotFound(name.to_string()))?;
        let old = entries.remove(pos);
        let was_ready = old.readiness() == Readiness::Ready;
        let access_method = match Arc::try_unwrap(old) {
            Ok(entry) => entry.access_method,
            Err(old) => {
                entries.push(old);
                return Err(Error::BackgroundOperationInProgressForNamespace(name.to_string()));
            }
        };
        let entry = IndexCatalogEntry::new(updated, access_method);
        if was_ready {
            entry.mark_ready();
        }
        entries.push(entry.clone());
        Ok(entry)
    }

    pub fn set_multikey(&self, name: &str, paths: &MultikeyPaths) -> Result<()> {
        let entry = self.find_index_by_name(name).ok_or_else(|| Error::IndexNotFound(name.to_string()))?;
        entry.set_multikey(paths);
        Ok(())
    }

    /// Conservative refusal hook for the empty-collection fast path
    ///: even if the collection looks empty,
    /// refuse the fast path while any entry still has unflushed
    /// interceptor writes pending.
    pub fn has_pending_side_writes(&self, name: &str) -> bool {
        self.find_index_by_name(name).map(|e| e.has_pending_side_writes()).unwrap_or(false)
    }
}
