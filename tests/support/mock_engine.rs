//! In-process `RecordStore`/`OplogWriter` pair for end-to-end tests:
//! a plain `Vec` behind a lock standing in for a real storage engine.

use std::sync::{Arc, Mutex, RwLock};

use collection_index::{Document, OplogWriter, RecordId, RecordStore};

pub struct MockRecordStore {
    docs: RwLock<Vec<(RecordId, Document)>>,
}

impl MockRecordStore {
    pub fn new(docs: Vec<(RecordId, Document)>) -> Arc<MockRecordStore> {
        Arc::new(MockRecordStore { docs: RwLock::new(docs) })
    }

    pub fn insert(&self, record_id: RecordId, document: Document) {
        self.docs.write().unwrap().push((record_id, document));
    }

    pub fn remove(&self, record_id: &RecordId) {
        self.docs.write().unwrap().retain(|(id, _)| id != record_id);
    }

    pub fn snapshot(&self) -> Vec<(RecordId, Document)> {
        self.docs.read().unwrap().clone()
    }
}

impl RecordStore for MockRecordStore {
    fn iter(&self) -> Box<dyn Iterator<Item = (RecordId, Document)> + '_> {
        Box::new(self.docs.read().unwrap().clone().into_iter())
    }

    fn num_records(&self) -> u64 {
        self.docs.read().unwrap().len() as u64
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum OplogEntry {
    Start(String),
    Commit(String),
    Abort(String, String),
}

/// Records every build-lifecycle event it's handed, so a test can
/// assert the exact sequence a step-down/restart would need to resume
/// from.
#[derive(Default)]
pub struct MockOplog {
    entries: Mutex<Vec<OplogEntry>>,
}

impl MockOplog {
    pub fn new() -> MockOplog {
        MockOplog::default()
    }

    pub fn entries(&self) -> Vec<OplogEntry> {
        self.entries.lock().unwrap().clone()
    }
}

impl OplogWriter for MockOplog {
    fn log_start_index_build(&self, event: collection_index::ibc::events::StartIndexBuild) {
        self.entries.lock().unwrap().push(OplogEntry::Start(event.build_uuid));
    }

    fn log_commit_index_build(&self, event: collection_index::ibc::events::CommitIndexBuild) {
        self.entries.lock().unwrap().push(OplogEntry::Commit(event.build_uuid));
    }

    fn log_abort_index_build(&self, event: collection_index::ibc::events::AbortIndexBuild) {
        self.entries.lock().unwrap().push(OplogEntry::Abort(event.build_uuid, event.reason));
    }
}
