//! [`IndexCatalogEntry`]: the catalog's live handle onto one index —
//! descriptor plus readiness, multikey, and build-provenance state.
//! Entries are non-owning handles: the catalog hands out
//! `Arc<IndexCatalogEntry>` clones rather than references into its own
//! table, the same snapshot-handle shape as a versioned in-memory tree
//! lets readers keep a consistent view while the table underneath
//! mutates.

use std::sync::{Arc, RwLock};

use crate::access_method::AccessMethod;
use crate::catalog::descriptor::{IndexDescriptor, PrepareUniqueState};
use crate::key_encoder::MultikeyPaths;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Readiness {
    /// Visible to reads and writes.
    Ready,
    /// Under construction; only the build's own writes see it.
    Building,
    /// Build frozen by `dropIndex`/`killOp`; no further writes applied.
    Frozen,
}

struct Mutable {
    readiness: Readiness,
    multikey: MultikeyPaths,
    prepare_unique: Option<PrepareUniqueState>,
    minimum_visible_snapshot: Option<u64>,
    pending_side_writes: u64,
}

/// One entry in the catalog. The descriptor is immutable; readiness,
/// multikey tracking, and the `prepareUnique` draining/ready boundary
/// are the only fields that change after registration.
pub struct IndexCatalogEntry {
    pub descriptor: IndexDescriptor,
    pub access_method: Box<dyn AccessMethod>,
    state: RwLock<Mutable>,
}

impl IndexCatalogEntry {
    pub fn new(descriptor: IndexDescriptor, access_method: Box<dyn AccessMethod>) -> Arc<IndexCatalogEntry> {
        let prepare_unique = descriptor.prepare_unique.then_some(PrepareUniqueState::Draining);
        Arc::new(IndexCatalogEntry {
            descriptor,
            access_method,
            state: RwLock::new(Mutable {
                readiness: Readiness::Building,
                multikey: MultikeyPaths::new(),
                prepare_unique,
                minimum_visible_snapshot: None,
                pending_side_writes: 0,
            }),
        })
    }

    /// Whether the build's interceptor has side-table writes still
    /// waiting to be drained into the index.
    pub fn has_pending_side_writes(&self) -> bool {
        self.state.read().unwrap().pending_side_writes > 0
    }

    pub fn record_side_write(&self) {
        self.state.write().unwrap().pending_side_writes += 1;
    }

    pub fn drain_side_writes(&self, n: u64) {
        let mut state = self.state.write().unwrap();
        state.pending_side_writes = state.pending_side_writes.saturating_sub(n);
    }

    pub fn is_ready(&self) -> bool {
        self.state.read().unwrap().readiness == Readiness::Ready
    }

    pub fn readiness(&self) -> Readiness {
        self.state.read().unwrap().readiness
    }

    pub fn mark_ready(&self) {
        self.state.write().unwrap().readiness = Readiness::Ready;
    }

    pub fn mark_frozen(&self) {
        self.state.write().unwrap().readiness = Readiness::Frozen;
    }

    pub fn is_multikey(&self) -> bool {
        self.state.read().unwrap().multikey.is_multikey()
    }

    pub fn multikey_paths(&self) -> MultikeyPaths {
        self.state.read().unwrap().multikey.clone()
    }

    pub fn set_multikey(&self, paths: &MultikeyPaths) {
        if paths.is_multikey() {
            self.state.write().unwrap().multikey.merge(paths);
        }
    }

    /// `prepareUnique` starts `Draining` (duplicates from before the
    /// request still tolerated) and transitions to `Ready` once the
    /// drain completes.
    pub fn prepare_unique_state(&self) -> Option<PrepareUniqueState> {
        self.state.read().unwrap().prepare_unique
    }

    pub fn mark_prepare_unique_ready(&self) {
        let mut state = self.state.write().unwrap();
        if state.prepare_unique.is_some() {
            state.prepare_unique = Some(PrepareUniqueState::Ready);
        }
    }

    /// Enforces uniqueness only once `prepareUnique` has drained
    /// (Draining still accepts duplicates so concurrent writers are not
    /// blocked mid-drain).
    pub fn enforces_uniqueness(&self) -> bool {
        if !self.descriptor.unique {
            return false;
        }
        match self.prepare_unique_state() {
            Some(PrepareUniqueState::Draining) => false,
            _ => true,
        }
    }

    pub fn minimum_visible_snapshot(&self) -> Option<u64> {
        self.state.read().unwrap().minimum_visible_snapshot
    }

    pub fn set_minimum_visible_snapshot(&self, ts: u64) {
        self.state.write().unwrap().minimum_visible_snapshot = Some(ts);
    }
}
