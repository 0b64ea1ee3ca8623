//! Two-phase bounded-memory hash reconciliation, using [`CityHasher`]
//! for the per-key digest. Bucket state is a fixed array rather than a
//! roaring bitmap since each bucket needs a signed counter and an XOR
//! digest, not just a bit.

use std::collections::{HashMap, HashSet};
use std::hash::Hasher;

use rayon::prelude::*;

use crate::document::Document;
use crate::hash::CityHasher;
use crate::key_encoder::{self, ConstraintHandling, EncodeMode, RecordId};
use crate::sdi::SortedDataInterface;

/// Fixed at 2^16 so the bucket table (a few hundred KiB) stays resident
/// regardless of collection size — the whole point of the two-phase
/// design is never materializing every key at once.
pub const NUM_HASH_BUCKETS: usize = 1 << 16;

/// Per-index cap on how many bytes of concrete inconsistency detail the
/// refinement phase will collect before it switches to counting only.
pub const MAX_ERROR_BYTES: usize = 1024 * 1024;

/// Batch size for the parallel chunks the first pass folds documents
/// into before merging bucket tables; scaled to the available cores so
/// a single-core box doesn't pay thread-spawn overhead for nothing.
fn chunk_size(total_hint: usize) -> usize {
    let cores = num_cpus::get().max(1);
    (total_hint / (cores * 4)).max(256)
}

#[derive(Clone, Debug, PartialEq)]
pub enum Inconsistency {
    /// A key the collection scan expects but the index does not have.
    Missing { index: String, key: Vec<u8>, record_id: RecordId },
    /// A key present in the index with no corresponding document.
    Dangling { index: String, key: Vec<u8>, record_id: RecordId },
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ValidationResult {
    pub inconsistencies: Vec<Inconsistency>,
    /// Inconsistencies detected but not materialized once
    /// [`MAX_ERROR_BYTES`] was reached.
    pub truncated_count: u64,
}

impl ValidationResult {
    pub fn is_consistent(&self) -> bool {
        self.inconsistencies.is_empty() && self.truncated_count == 0
    }
}

#[derive(Clone, Copy, Default)]
struct Bucket {
    count: i64,
    digest: u64,
}

fn digest(bytes: &[u8]) -> u64 {
    let mut hasher = CityHasher::new();
    hasher.write(bytes);
    hasher.finish()
}

fn bucket_of(bytes: &[u8]) -> usize {
    (digest(bytes) as usize) % NUM_HASH_BUCKETS
}

fn fold_bucket(buckets: &mut [Bucket], full: &[u8], sign: i64) {
    let b = &mut buckets[bucket_of(full)];
    b.count += sign;
    b.digest ^= digest(full);
}

fn merge_buckets(into: &mut [Bucket], from: &[Bucket]) {
    for (a, b) in into.iter_mut().zip(from.iter()) {
        a.count += b.count;
        a.digest ^= b.digest;
    }
}

/// Reconciles one index against the collection it was built from.
pub struct Validator {
    index_name: String,
}

impl Validator {
    pub fn new(index_name: &str) -> Validator {
        Validator { index_name: index_name.to_string() }
    }

    /// `documents` is called once per pass that needs a fresh scan: the
    /// first pass over every document, and (only if buckets disagree) a
    /// second pass restricted to the dirty buckets during refinement.
    /// `sdi` is re-scanned directly since a cursor can be reopened
    /// cheaply. Both scans only ever touch `NUM_HASH_BUCKETS` counters,
    /// never the full key set, until a dirty bucket forces refinement.
    pub fn validate<'a>(
        &self,
        documents: &(dyn Fn() -> Box<dyn Iterator<Item = (RecordId, Document)> + 'a> + 'a),
        descriptor: &crate::catalog::descriptor::IndexDescriptor,
        sdi: &dyn SortedDataInterface,
    ) -> crate::error::Result<ValidationResult> {
        let batch: Vec<(RecordId, Document)> = documents().collect();
        let mut buckets: Vec<Bucket> = batch
            .par_chunks(chunk_size(batch.len().max(1)))
            .map(|chunk| -> crate::error::Result<Vec<Bucket>> {
                let mut local = vec![Bucket::default(); NUM_HASH_BUCKETS];
                for (record_id, document) in chunk {
                    let encoded = key_encoder::encode(
                        document,
                        descriptor,
                        record_id.clone(),
                        EncodeMode::Adding,
                        ConstraintHandling::RelaxedUnfiltered,
                    )?;
                    for key in &encoded.keys {
                        fold_bucket(&mut local, &key.full_bytes(), 1);
                    }
                }
                Ok(local)
            })
            .try_reduce(
                || vec![Bucket::default(); NUM_HASH_BUCKETS],
                |mut acc, local| {
                    merge_buckets(&mut acc, &local);
                    Ok(acc)
                },
            )?;

        let mut cursor = sdi.new_cursor(crate::sdi::Direction::Forward);
        while let Some(entry) = cursor.next() {
            fold_bucket(&mut buckets, &entry.full_bytes(), -1);
        }

        let dirty: Vec<usize> =
            buckets.iter().enumerate().filter(|(_, b)| b.count != 0 || b.digest != 0).map(|(i, _)| i).collect();
        if dirty.is_empty() {
            return Ok(ValidationResult::default());
        }
        log::warn!("index '{}' validate: {} dirty hash buckets, entering refinement", self.index_name, dirty.len());

        self.refine(&dirty, documents, descriptor, sdi)
    }

    /// Refinement pass: for the buckets the first pass flagged, build
    /// the exact expected (from `documents`) and actual (from `sdi`)
    /// key sets restricted to those buckets, and diff them — a key
    /// expected but not actual is `Missing`, actual but not expected is
    /// `Dangling` — capping total detail at [`MAX_ERROR_BYTES`].
    fn refine<'a>(
        &self,
        dirty: &[usize],
        documents: &(dyn Fn() -> Box<dyn Iterator<Item = (RecordId, Document)> + 'a> + 'a),
        descriptor: &crate::catalog::descriptor::IndexDescriptor,
        sdi: &dyn SortedDataInterface,
    ) -> crate::error::Result<ValidationResult> {
        let dirty_set: HashSet<usize> = dirty.iter().copied().collect();

        let mut expected: HashMap<Vec<u8>, RecordId> = HashMap::new();
        for (record_id, document) in documents() {
            let encoded = key_encoder::encode(
                &document,
                descriptor,
                record_id,
                EncodeMode::Adding,
                ConstraintHandling::RelaxedUnfiltered,
            )?;
            for key in &encoded.keys {
                let full = key.full_bytes();
                if dirty_set.contains(&bucket_of(&full)) {
                    expected.insert(full, key.record_id.clone());
                }
            }
        }

        let mut actual: HashMap<Vec<u8>, RecordId> = HashMap::new();
        let mut cursor = sdi.new_cursor(crate::sdi::Direction::Forward);
        while let Some(entry) = cursor.next() {
            let full = entry.full_bytes();
            if dirty_set.contains(&bucket_of(&full)) {
                actual.insert(full, entry.record_id.clone());
            }
        }

        let mut result = ValidationResult::default();
        let mut bytes_used = 0usize;
        for (full, record_id) in &expected {
            if actual.contains_key(full) {
                continue;
            }
            if bytes_used >= MAX_ERROR_BYTES {
                result.truncated_count += 1;
                continue;
            }
            bytes_used += full.len() + 16;
            result.inconsistencies.push(Inconsistency::Missing {
                index: self.index_name.clone(),
                key: full.clone(),
                record_id: record_id.clone(),
            });
        }
        for (full, record_id) in &actual {
            if expected.contains_key(full) {
                continue;
            }
            if bytes_used >= MAX_ERROR_BYTES {
                result.truncated_count += 1;
                continue;
            }
            bytes_used += full.len() + 16;
            result.inconsistencies.push(Inconsistency::Dangling {
                index: self.index_name.clone(),
                key: full.clone(),
                record_id: record_id.clone(),
            });
        }
        Ok(result)
    }
}
