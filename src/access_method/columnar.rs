use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use crate::catalog::descriptor::{IndexDescriptor, Projection};
use crate::document::{Document, FieldPath};
use crate::error::Result;
use crate::key_encoder::{encode_value, OrderedKey, RecordId, TypeBits};
use crate::sdi::{BulkBuilder, DupPolicy, SdiCursor, SortedDataInterface, ValidationReport};

/// Columnar access method: one [`SortedDataInterface`] per projected
/// leaf path ("cell store"), rather than wildcard's single shared SDI
/// interleaving every path's keys together. A real deployment would sit
/// an LRU cache behind this to bound how many per-path stores stay
/// resident; that layer is out of scope here.
pub struct ColumnarAccessMethod {
    descriptor: IndexDescriptor,
    projection: Projection,
    factory: Arc<dyn Fn() -> Arc<dyn SortedDataInterface> + Send + Sync>,
    cells: RwLock<BTreeMap<String, Arc<dyn SortedDataInterface>>>,
    // True once some leaf path produced more than one cell entry for a
    // single document, i.e. that path ran through an array.
    multikey: AtomicBool,
}

impl ColumnarAccessMethod {
    pub fn new(
        descriptor: IndexDescriptor,
        factory: Arc<dyn Fn() -> Arc<dyn SortedDataInterface> + Send + Sync>,
    ) -> ColumnarAccessMethod {
        let projection = descriptor.projection.clone().unwrap_or_else(Projection::include_all);
        ColumnarAccessMethod {
            descriptor,
            projection,
            factory,
            cells: RwLock::new(BTreeMap::new()),
            multikey: AtomicBool::new(false),
        }
    }

    fn cell_for(&self, path: &str) -> Arc<dyn SortedDataInterface> {
        if let Some(sdi) = self.cells.read().unwrap().get(path) {
            return sdi.clone();
        }
        let mut cells = self.cells.write().unwrap();
        cells.entry(path.to_string()).or_insert_with(|| (self.factory)()).clone()
    }

    fn dup_policy(&self) -> DupPolicy {
        if self.descriptor.unique {
            DupPolicy::Reject
        } else {
            DupPolicy::Allow
        }
    }

    pub fn num_cells(&self) -> usize {
        self.cells.read().unwrap().len()
    }

    /// A cursor over one path's cell, or `None` if nothing has ever
    /// been indexed under it.
    pub fn cursor_for_path(&self, path: &str) -> Option<Box<dyn SdiCursor>> {
        self.cells.read().unwrap().get(path).map(|sdi| sdi.new_cursor(crate::sdi::Direction::Forward))
    }
}

impl super::AccessMethod for ColumnarAccessMethod {
    fn insert(&self, document: &Document, record_id: RecordId) -> Result<super::InsertResult> {
        let root = FieldPath::from_dotted("");
        let mut keys_inserted = 0u64;
        for path in document.expand_subtree(&root) {
            if !self.projection.accepts(&path) {
                continue;
            }
            let cell = self.cell_for(path.as_str());
            let resolved = document.resolve_path(&path);
            if resolved.len() > 1 {
                self.multikey.store(true, Ordering::Relaxed);
            }
            for (value, _) in resolved {
                let mut user_key = Vec::new();
                let mut bits = TypeBits::new();
                encode_value(&value, false, &mut user_key, &mut bits);
                let key = OrderedKey::new(user_key, bits, record_id.clone());
                cell.insert(&key, self.dup_policy())?;
                keys_inserted += 1;
            }
        }
        Ok(super::InsertResult { keys_inserted, multikey_paths: Default::default() })
    }

    fn remove(&self, document: &Document, record_id: RecordId) -> Result<()> {
        let root = FieldPath::from_dotted("");
        for path in document.expand_subtree(&root) {
            if !self.projection.accepts(&path) {
                continue;
            }
            let cell = self.cell_for(path.as_str());
            for (value, _) in document.resolve_path(&path) {
                let mut user_key = Vec::new();
                let mut bits = TypeBits::new();
                encode_value(&value, false, &mut user_key, &mut bits);
                cell.unindex(&OrderedKey::new(user_key, bits, record_id.clone()))?;
            }
        }
        Ok(())
    }

    fn initiate_bulk(&self) -> Box<dyn BulkBuilder> {
        // Bulk loading a columnar index loads each cell independently;
        // the coordinating builder lives in `crate::bulk_builder`.
        self.cell_for("$columnar_root").make_bulk_builder()
    }

    fn validate(&self) -> Result<ValidationReport> {
        let mut report = ValidationReport::default();
        for cell in self.cells.read().unwrap().values() {
            let r = cell.validate()?;
            report.num_keys += r.num_keys;
            report.num_traversed += r.num_traversed;
            report.errors.extend(r.errors);
        }
        Ok(report)
    }

    fn compact(&self) -> Result<()> {
        for cell in self.cells.read().unwrap().values() {
            cell.compact()?;
        }
        Ok(())
    }

    fn initialize_as_empty(&self) -> Result<()> {
        self.cells.write().unwrap().clear();
        Ok(())
    }

    fn ident(&self) -> &str {
        &self.descriptor.name
    }

    fn stats(&self) -> super::AccessMethodStats {
        let cells = self.cells.read().unwrap();
        super::AccessMethodStats {
            num_keys: cells.values().map(|c| c.num_entries()).sum(),
            is_multikey: self.multikey.load(Ordering::Relaxed),
            space_used_bytes: cells.values().map(|c| c.space_used_bytes()).sum(),
        }
    }
}
