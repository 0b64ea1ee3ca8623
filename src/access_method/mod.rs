//! Access Method: the per-index-kind trait that turns document events
//! into SDI operations, dispatching the same read/write contract across
//! the standard/hashed/wildcard/geo/text/columnar variants — one shared
//! trait, several small implementing structs, with the dispatch axis
//! being index *kind* rather than storage backend.

mod btree;
mod columnar;
mod geo;
mod hashed;
mod standard;
mod text;
mod wildcard;

#[cfg(test)]
#[path = "access_method_test.rs"]
mod access_method_test;

pub use btree::new_btree;
pub use columnar::ColumnarAccessMethod;
pub use geo::{new_geo_2d, new_geo_2dsphere};
pub use hashed::new_hashed;
pub use standard::StandardAccessMethod;
pub use text::TextAccessMethod;
pub use wildcard::new_wildcard;

use crate::document::Document;
use crate::error::Result;
use crate::key_encoder::{ConstraintHandling, MultikeyPaths, RecordId};
use crate::sdi::{BulkBuilder, ValidationReport};

#[derive(Clone, Debug, Default, PartialEq)]
pub struct InsertResult {
    pub keys_inserted: u64,
    pub multikey_paths: MultikeyPaths,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct AccessMethodStats {
    pub num_keys: u64,
    pub is_multikey: bool,
    pub space_used_bytes: u64,
}

/// One index kind's document-to-key lifecycle.
pub trait AccessMethod: Send + Sync {
    fn insert(&self, document: &Document, record_id: RecordId) -> Result<InsertResult>;

    /// Same as [`insert`](AccessMethod::insert) but lets an index build
    /// apply one of the relaxed `ConstraintHandling` modes instead of
    /// failing the whole build over a single document. Kinds with no compound-key concept (text, columnar)
    /// inherit the default, which ignores `handling` entirely.
    fn insert_with_handling(
        &self,
        document: &Document,
        record_id: RecordId,
        _handling: ConstraintHandling,
    ) -> Result<InsertResult> {
        self.insert(document, record_id)
    }

    fn remove(&self, document: &Document, record_id: RecordId) -> Result<()>;

    fn update(&self, old: &Document, new: &Document, record_id: RecordId) -> Result<InsertResult> {
        self.remove(old, record_id.clone())?;
        self.insert(new, record_id)
    }

    fn initiate_bulk(&self) -> Box<dyn BulkBuilder>;

    fn validate(&self) -> Result<ValidationReport>;

    fn compact(&self) -> Result<()>;

    fn initialize_as_empty(&self) -> Result<()>;

    fn ident(&self) -> &str;

    fn stats(&self) -> AccessMethodStats;
}
