//! External interfaces the index subsystem is built against but does
//! not itself implement: a record store to scan, an oplog
//! to append events to, a replication coordinator to ask about commit
//! quorum, and the storage engine's unit-of-work boundary — a log sink
//! plus a replay source, generalized to the index build's needs.

use std::sync::Arc;

use crate::document::Document;
use crate::error::Result;
use crate::ibc::events::{AbortIndexBuild, CommitIndexBuild, StartIndexBuild};
use crate::key_encoder::RecordId;

/// Read access to one collection's documents, in RecordId order, the
/// shape an index build's initial scan consumes.
pub trait RecordStore: Send + Sync {
    fn iter(&self) -> Box<dyn Iterator<Item = (RecordId, Document)> + '_>;

    fn num_records(&self) -> u64;
}

/// The durable oplog a build's phase transitions are appended to so a
/// secondary (or a crashed-and-restarted primary) can resume it.
pub trait OplogWriter: Send + Sync {
    fn log_start_index_build(&self, event: StartIndexBuild);

    fn log_commit_index_build(&self, event: CommitIndexBuild);

    fn log_abort_index_build(&self, event: AbortIndexBuild);
}

/// Asks whether this node may commit a build and, for multi-node
/// deployments, waits for the configured commit quorum before the
/// `AwaitingCommit` -> `Drain3` transition.
pub trait ReplicationCoordinator: Send + Sync {
    fn is_primary(&self) -> bool;

    fn wait_for_commit_quorum(&self, build_uuid: &str) -> Result<()>;
}

/// The storage engine's transaction boundary. Every catalog/AM
/// mutation in this crate happens inside one unit of work so an
/// interrupted build leaves no partial index state behind.
pub trait RecoveryUnit: Send + Sync {
    fn begin_unit_of_work(&self);

    fn commit_unit_of_work(&self) -> Result<()>;

    fn abort_unit_of_work(&self);
}

/// Cooperative cancellation hook checked at safe points during a long
/// scan or drain.
pub trait Interruption: Send + Sync {
    fn check_for_interrupt(&self) -> Result<()>;
}

/// Top-level handle a deployment implements to plug its real storage
/// into this crate.
pub trait StorageEngine: Send + Sync {
    fn record_store(&self, collection: &str) -> Arc<dyn RecordStore>;
}

/// Retries the wrapped operation while it keeps failing with
/// `WriteConflict`, matching MongoDB's `writeConflictRetry` idiom.
/// `max_attempts` bounds retries so a pathological hot key can't spin
/// forever.
pub fn write_conflict_retry<T>(max_attempts: u32, mut op: impl FnMut() -> Result<T>) -> Result<T> {
    let mut attempt = 0;
    loop {
        match op() {
            Ok(value) => return Ok(value),
            Err(err) if err.is_write_conflict() && attempt + 1 < max_attempts => {
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}
