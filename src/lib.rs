//! A MongoDB-style collection index subsystem: encode documents into
//! memcomparable keys, store those keys behind a pluggable sorted-data
//! interface, dispatch per-field indexing semantics through one of
//! several access method variants, track all of a collection's indexes
//! in a catalog, build new indexes online through a resumable
//! coordinator, and validate a built index against its collection.
//!
//! The module layout mirrors that pipeline:
//!
//! - [`document`] — the typed document tree indexes are built from.
//! - [`key_encoder`] — document + descriptor -> ordered key bytes.
//! - [`sdi`] — the storage-facing sorted-data contract.
//! - [`access_method`] — per-index-kind dispatch over the SDI.
//! - [`catalog`] — the collection-scoped registry of live indexes.
//! - [`ibc`] — the online index-build state machine.
//! - [`bulk_builder`] — external sort + bulk load used by a build's
//!   initial scan.
//! - [`validator`] — two-phase hash reconciliation between an index and
//!   its collection.
//! - [`lock`] — the hierarchical lock manager serializing catalog and
//!   build state changes.
//! - [`collection`] — the per-namespace entry point tying all of the
//!   above together.
//! - [`storage_engine`] — the external interfaces this crate is built
//!   against but does not itself implement.

pub mod access_method;
pub mod bulk_builder;
pub mod catalog;
pub mod collection;
pub mod document;
pub mod error;
pub mod hash;
pub mod ibc;
pub mod key_encoder;
pub mod lock;
pub mod sdi;
pub mod storage_engine;
pub mod validator;

pub use access_method::{AccessMethod, AccessMethodStats, InsertResult};
pub use catalog::{IndexCatalog, IndexCatalogEntry, IndexDescriptor, Readiness};
pub use collection::{
    CollModIndexOptions, CollModOptions, Collection, CreateIndexesReply, CreateIndexesRequest,
    DropIndexesSpec, ID_INDEX_NAME,
};
pub use document::{Decimal, Document, FieldPath, Value};
pub use error::{Error, Result};
pub use ibc::{BuildPhase, IndexBuildCoordinator, Interceptor, ReplIndexBuildState};
pub use key_encoder::{ConstraintHandling, MultikeyPaths, OrderedKey, RecordId, TypeBits};
pub use lock::{CollectionLockGuard, LockManager, LockMode};
pub use sdi::{BTreeMapSdi, SortedDataInterface, ValidationReport};
pub use storage_engine::{
    Interruption, OplogWriter, RecordStore, RecoveryUnit, ReplicationCoordinator, StorageEngine,
};
pub use validator::{Inconsistency, ValidationResult, Validator};
