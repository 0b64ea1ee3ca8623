//! Index-Build Coordinator: drives each index build
//! through the [`state::BuildPhase`] state machine, explicitly injected
//! rather than reached through a global `static` — a `Collection` owns
//! one `IndexBuildCoordinator` directly rather than looking builds up
//! through a process-wide registry.

pub mod events;
pub mod interceptor;
pub mod state;
#[cfg(test)]
#[path = "ibc_test.rs"]
mod ibc_test;

pub use interceptor::{Interceptor, SideTableOp};
pub use state::{BuildPhase, ReplIndexBuildState};

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use crate::access_method::AccessMethod;
use crate::catalog::{IndexCatalog, IndexCatalogEntry};
use crate::document::Document;
use crate::error::{Error, Result};
use crate::key_encoder::{ConstraintHandling, RecordId};
use crate::storage_engine::OplogWriter;

use events::{AbortIndexBuild, CommitIndexBuild, StartIndexBuild};

pub struct IndexBuildCoordinator {
    builds: RwLock<Vec<Arc<ReplIndexBuildState>>>,
    next_id: AtomicU64,
}

impl IndexBuildCoordinator {
    pub fn new() -> IndexBuildCoordinator {
        IndexBuildCoordinator { builds: RwLock::new(Vec::new()), next_id: AtomicU64::new(0) }
    }

    /// Registers a new build, refusing it if any in-flight build on the
    /// same collection already targets one of the same index names.
    pub fn register(&self, collection: &str, index_names: Vec<String>) -> Result<Arc<ReplIndexBuildState>> {
        {
            let builds = self.builds.read().unwrap();
            for build in builds.iter() {
                if build.collection != collection {
                    continue;
                }
                if build.is_aborted() || build.is_complete() {
                    continue;
                }
                if build.index_names.iter().any(|n| index_names.contains(n)) {
                    return Err(Error::IndexBuildAlreadyInProgress(format!(
                        "build already in progress for {:?} on '{}'",
                        index_names, collection
                    )));
                }
            }
        }
        self.next_id.fetch_add(1, Ordering::Relaxed);
        let build_uuid = uuid::Uuid::new_v4().to_string();
        log::info!("starting index build {} on '{}': {:?}", build_uuid, collection, index_names);
        let state = ReplIndexBuildState::new(build_uuid, collection.to_string(), index_names);
        self.builds.write().unwrap().push(state.clone());
        Ok(state)
    }

    pub fn get(&self, build_uuid: &str) -> Option<Arc<ReplIndexBuildState>> {
        self.builds.read().unwrap().iter().find(|b| b.build_uuid == build_uuid).cloned()
    }

    pub fn abort_by_build_uuid(&self, build_uuid: &str, reason: &str) -> Result<()> {
        let state = self.get(build_uuid).ok_or_else(|| Error::IndexNotFound(build_uuid.to_string()))?;
        state.transition(BuildPhase::CleanupAborted(reason.to_string()))
    }

    pub fn abort_by_collection(&self, collection: &str, reason: &str) {
        for build in self.builds.read().unwrap().iter() {
            if build.collection == collection && !build.is_complete() && !build.is_aborted() {
                let _ = build.transition(BuildPhase::CleanupAborted(reason.to_string()));
            }
        }
    }

    pub fn abort_by_index_names(&self, collection: &str, index_names: &[String], reason: &str) {
        for build in self.builds.read().unwrap().iter() {
            if build.collection == collection
                && !build.is_complete()
                && !build.is_aborted()
                && build.index_names.iter().any(|n| index_names.contains(n))
            {
                let _ = build.transition(BuildPhase::CleanupAborted(reason.to_string()));
            }
        }
    }

    /// Runs one build end to end: bulk-load from `documents`, then three
    /// rounds of side-table drain separated by phase transitions.
    /// `interceptor` must already be wired into the collection's write
    /// path before this call starts, so writes racing the initial scan
    /// land in the side table instead of being missed entirely.
    pub fn run_build(
        &self,
        state: &Arc<ReplIndexBuildState>,
        catalog: &IndexCatalog,
        entries: &[Arc<IndexCatalogEntry>],
        documents: impl Iterator<Item = (RecordId, Document)>,
        interceptor: &Interceptor,
        oplog: Option<&dyn OplogWriter>,
    ) -> Result<()> {
        if let Some(oplog) = oplog {
            oplog.log_start_index_build(StartIndexBuild {
                build_uuid: state.build_uuid.clone(),
                collection: state.collection.clone(),
                index_names: state.index_names.clone(),
            });
        }

        state.transition(BuildPhase::Scanning)?;
        for (record_id, document) in documents {
            self.check_aborted(state)?;
            for entry in entries {
                apply_insert(entry, &document, record_id.clone(), interceptor)?;
            }
        }

        state.transition(BuildPhase::Drain1)?;
        self.drain_once(entries, interceptor)?;

        state.transition(BuildPhase::Drain2)?;
        self.drain_once(entries, interceptor)?;

        state.transition(BuildPhase::AwaitingCommit)?;

        state.transition(BuildPhase::Drain3)?;
        self.drain_once(entries, interceptor)?;

        state.transition(BuildPhase::Committed)?;
        for entry in entries {
            catalog.index_build_success(&entry.descriptor.name)?;
        }

        if let Some(oplog) = oplog {
            oplog.log_commit_index_build(CommitIndexBuild {
                build_uuid: state.build_uuid.clone(),
                collection: state.collection.clone(),
                index_names: state.index_names.clone(),
            });
        }
        Ok(())
    }

    pub fn abort_build(
        &self,
        state: &Arc<ReplIndexBuildState>,
        catalog: &IndexCatalog,
        reason: &str,
        oplog: Option<&dyn OplogWriter>,
    ) -> Result<()> {
        state.transition(BuildPhase::CleanupAborted(reason.to_string()))?;
        for name in &state.index_names {
            let _ = catalog.drop_unfinished_index(name);
        }
        if let Some(oplog) = oplog {
            oplog.log_abort_index_build(AbortIndexBuild {
                build_uuid: state.build_uuid.clone(),
                collection: state.collection.clone(),
                index_names: state.index_names.clone(),
                reason: reason.to_string(),
            });
        }
        Ok(())
    }

    fn check_aborted(&self, state: &Arc<ReplIndexBuildState>) -> Result<()> {
        if state.is_aborted() {
            return Err(Error::IndexBuildAborted(state.build_uuid.clone()));
        }
        Ok(())
    }

    fn drain_once(&self, entries: &[Arc<IndexCatalogEntry>], interceptor: &Interceptor) -> Result<()> {
        let ops = interceptor.drain();
        for op in ops {
            match op {
                SideTableOp::Insert(document, record_id) => {
                    for entry in entries {
                        apply_insert(entry, &document, record_id.clone(), interceptor)?;
                    }
                }
                SideTableOp::Remove(document, record_id) => {
                    for entry in entries {
                        entry.access_method.remove(&document, record_id.clone())?;
                    }
                }
            }
        }
        Ok(())
    }
}

impl Default for IndexBuildCoordinator {
    fn default() -> IndexBuildCoordinator {
        IndexBuildCoordinator::new()
    }
}

fn apply_insert(
    entry: &Arc<IndexCatalogEntry>,
    document: &Document,
    record_id: RecordId,
    interceptor: &Interceptor,
) -> Result<()> {
    let handling = if entry.descriptor.unique {
        ConstraintHandling::Strict
    } else {
        ConstraintHandling::RelaxedUnfiltered
    };
    match entry.access_method.insert_with_handling(document, record_id, handling) {
        Ok(result) => {
            if result.multikey_paths.is_multikey() {
                entry.set_multikey(&result.multikey_paths);
            }
            Ok(())
        }
        Err(err) if !entry.descriptor.unique => {
            interceptor.record_skipped(format!("{}", err));
            Ok(())
        }
        Err(err) => Err(err),
    }
}
