//! Side-table interceptor: buffers writes that race an
//! in-progress build's collection scan so a later drain phase can
//! apply them against the partially-built index — the same "append
//! now, replay later" shape as a write-ahead log, minus durability,
//! since a build's side table dies with the process if the build
//! itself is aborted.

use std::collections::VecDeque;
use std::sync::Mutex;

use crate::document::Document;
use crate::key_encoder::RecordId;

#[derive(Clone, Debug)]
pub enum SideTableOp {
    Insert(Document, RecordId),
    Remove(Document, RecordId),
}

pub struct Interceptor {
    queue: Mutex<VecDeque<SideTableOp>>,
    skipped: Mutex<Vec<String>>,
}

impl Interceptor {
    pub fn new() -> Interceptor {
        Interceptor { queue: Mutex::new(VecDeque::new()), skipped: Mutex::new(Vec::new()) }
    }

    pub fn record_insert(&self, document: Document, record_id: RecordId) {
        self.queue.lock().unwrap().push_back(SideTableOp::Insert(document, record_id));
    }

    pub fn record_remove(&self, document: Document, record_id: RecordId) {
        self.queue.lock().unwrap().push_back(SideTableOp::Remove(document, record_id));
    }

    /// A constraint violation (e.g. a parallel-array document) that the
    /// build's relaxed `ConstraintHandling` suppressed rather than
    /// failing the whole build over.
    pub fn record_skipped(&self, reason: String) {
        self.skipped.lock().unwrap().push(reason);
    }

    pub fn skipped(&self) -> Vec<String> {
        self.skipped.lock().unwrap().clone()
    }

    pub fn pending_len(&self) -> usize {
        self.queue.lock().unwrap().len()
    }

    /// Remove and return everything queued so far. Ops queued *during*
    /// the drain (by concurrent writers) are left for the next drain
    /// phase — this never blocks writers out.
    pub fn drain(&self) -> Vec<SideTableOp> {
        self.queue.lock().unwrap().drain(..).collect()
    }
}

impl Default for Interceptor {
    fn default() -> Interceptor {
        Interceptor::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn drain_empties_the_queue() {
        let interceptor = Interceptor::new();
        interceptor.record_insert(Document::new(BTreeMap::new()), RecordId::Long(1));
        assert_eq!(interceptor.pending_len(), 1);
        let drained = interceptor.drain();
        assert_eq!(drained.len(), 1);
        assert_eq!(interceptor.pending_len(), 0);
    }

    #[test]
    fn skipped_reasons_accumulate() {
        let interceptor = Interceptor::new();
        interceptor.record_skipped("parallel arrays".into());
        assert_eq!(interceptor.skipped(), vec!["parallel arrays".to_string()]);
    }
}
