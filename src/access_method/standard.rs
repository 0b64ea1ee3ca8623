use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::catalog::descriptor::IndexDescriptor;
use crate::document::Document;
use crate::error::Result;
use crate::key_encoder::{self, ConstraintHandling, EncodeMode, RecordId};
use crate::sdi::{BulkBuilder, DupPolicy, SortedDataInterface, ValidationReport};

use super::{AccessMethod, AccessMethodStats, InsertResult};

/// Shared implementation for every index kind whose key shape is just
/// "whatever `key_encoder::encode` produces for this descriptor" —
/// b-tree, hashed, geo, and wildcard. Text and columnar
/// need their own payload shaping and get their own structs.
pub struct StandardAccessMethod {
    descriptor: IndexDescriptor,
    sdi: Arc<dyn SortedDataInterface>,
    // Sticky once true, mirroring how the catalog's own multikey flag
    // (`IndexCatalogEntry::set_multikey`) never clears once an array is
    // observed under the key pattern.
    multikey: AtomicBool,
}

impl StandardAccessMethod {
    pub fn new(descriptor: IndexDescriptor, sdi: Arc<dyn SortedDataInterface>) -> StandardAccessMethod {
        StandardAccessMethod { descriptor, sdi, multikey: AtomicBool::new(false) }
    }

    fn dup_policy(&self) -> DupPolicy {
        if self.descriptor.unique {
            DupPolicy::Reject
        } else {
            DupPolicy::Allow
        }
    }
}

impl AccessMethod for StandardAccessMethod {
    fn insert(&self, document: &Document, record_id: RecordId) -> Result<InsertResult> {
        self.insert_with_handling(document, record_id, ConstraintHandling::Strict)
    }

    fn insert_with_handling(
        &self,
        document: &Document,
        record_id: RecordId,
        handling: ConstraintHandling,
    ) -> Result<InsertResult> {
        let encoded = key_encoder::encode(document, &self.descriptor, record_id, EncodeMode::Adding, handling)?;
        for key in &encoded.keys {
            self.sdi.insert(key, self.dup_policy())?;
        }
        if encoded.multikey_paths.is_multikey() {
            self.multikey.store(true, Ordering::Relaxed);
        }
        Ok(InsertResult { keys_inserted: encoded.keys.len() as u64, multikey_paths: encoded.multikey_paths })
    }

    fn remove(&self, document: &Document, record_id: RecordId) -> Result<()> {
        let encoded = key_encoder::encode(
            document,
            &self.descriptor,
            record_id,
            EncodeMode::Removing,
            ConstraintHandling::RelaxedUnfiltered,
        )?;
        for key in &encoded.keys {
            self.sdi.unindex(key)?;
        }
        Ok(())
    }

    fn initiate_bulk(&self) -> Box<dyn BulkBuilder> {
        self.sdi.make_bulk_builder()
    }

    fn validate(&self) -> Result<ValidationReport> {
        self.sdi.validate()
    }

    fn compact(&self) -> Result<()> {
        self.sdi.compact()
    }

    fn initialize_as_empty(&self) -> Result<()> {
        self.sdi.init_as_empty()
    }

    fn ident(&self) -> &str {
        &self.descriptor.name
    }

    fn stats(&self) -> AccessMethodStats {
        AccessMethodStats {
            num_keys: self.sdi.num_entries(),
            is_multikey: self.multikey.load(Ordering::Relaxed),
            space_used_bytes: self.sdi.space_used_bytes(),
        }
    }
}
