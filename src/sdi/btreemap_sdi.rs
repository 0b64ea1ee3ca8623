use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use crate::error::{Error, Result};
use crate::key_encoder::{OrderedKey, RecordId};

use super::cursor::{Direction, SdiCursor};
use super::{BulkBuilder, DupPolicy, SortedDataInterface, ValidationReport};

/// Reference `SortedDataInterface` backed by an in-memory `BTreeMap`,
/// keyed by each entry's full byte string (user key + RecordId
/// suffix) rather than a typed `K`/`V` pair.
#[derive(Clone)]
pub struct BTreeMapSdi {
    inner: Arc<RwLock<BTreeMap<Vec<u8>, OrderedKey>>>,
    count: Arc<AtomicU64>,
}

impl BTreeMapSdi {
    pub fn new() -> BTreeMapSdi {
        BTreeMapSdi { inner: Arc::new(RwLock::new(BTreeMap::new())), count: Arc::new(AtomicU64::new(0)) }
    }
}

impl Default for BTreeMapSdi {
    fn default() -> BTreeMapSdi {
        BTreeMapSdi::new()
    }
}

impl SortedDataInterface for BTreeMapSdi {
    fn insert(&self, key: &OrderedKey, dup_policy: DupPolicy) -> Result<()> {
        if dup_policy == DupPolicy::Reject {
            let existing = self.find_loc(&key.user_key)?;
            if let Some(existing_rid) = existing {
                if existing_rid != key.record_id {
                    return Err(Error::DuplicateKey(crate::error::RehydratedKey {
                        index_name: String::new(),
                        fields: Vec::new(),
                        record_id: format!("{:?}", key.record_id),
                        collation: None,
                    }));
                }
            }
        }
        let mut map = self.inner.write().unwrap();
        if map.insert(key.full_bytes(), key.clone()).is_none() {
            self.count.fetch_add(1, Ordering::Relaxed);
        }
        Ok(())
    }

    fn unindex(&self, key: &OrderedKey) -> Result<()> {
        let mut map = self.inner.write().unwrap();
        if map.remove(&key.full_bytes()).is_some() {
            self.count.fetch_sub(1, Ordering::Relaxed);
        }
        Ok(())
    }

    fn find_loc(&self, user_key: &[u8]) -> Result<Option<RecordId>> {
        let map = self.inner.read().unwrap();
        let range = map.range((Bound::Included(user_key.to_vec()), Bound::Unbounded));
        for (full_key, entry) in range {
            if !full_key.starts_with(user_key) {
                break;
            }
            return Ok(Some(entry.record_id.clone()));
        }
        Ok(None)
    }

    fn new_cursor(&self, direction: Direction) -> Box<dyn SdiCursor> {
        let snapshot: Vec<OrderedKey> = self.inner.read().unwrap().values().cloned().collect();
        Box::new(BTreeMapCursor { snapshot, pos: 0, direction })
    }

    fn make_bulk_builder(&self) -> Box<dyn BulkBuilder> {
        Box::new(BTreeMapBulkBuilder { sdi: self.clone(), prev: None })
    }

    fn validate(&self) -> Result<ValidationReport> {
        let map = self.inner.read().unwrap();
        let mut report = ValidationReport { num_keys: self.num_entries(), num_traversed: 0, errors: Vec::new() };
        let mut prev: Option<&Vec<u8>> = None;
        for full_key in map.keys() {
            if let Some(p) = prev {
                if p >= full_key {
                    report.errors.push(format!("out-of-order entries at {:?}", full_key));
                }
            }
            prev = Some(full_key);
            report.num_traversed += 1;
        }
        Ok(report)
    }

    fn num_entries(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    fn space_used_bytes(&self) -> u64 {
        self.inner.read().unwrap().keys().map(|k| k.len() as u64).sum()
    }

    fn free_storage_bytes(&self) -> u64 {
        0
    }

    fn compact(&self) -> Result<()> {
        Ok(())
    }

    fn init_as_empty(&self) -> Result<()> {
        let mut map = self.inner.write().unwrap();
        map.clear();
        self.count.store(0, Ordering::Relaxed);
        Ok(())
    }
}

struct BTreeMapCursor {
    snapshot: Vec<OrderedKey>,
    pos: usize,
    direction: Direction,
}

impl SdiCursor for BTreeMapCursor {
    fn seek(&mut self, user_key: &[u8]) -> Option<OrderedKey> {
        match self.direction {
            Direction::Forward => {
                self.pos = self.snapshot.partition_point(|k| k.full_bytes().as_slice() < user_key);
            }
            Direction::Reverse => {
                self.pos = self.snapshot.partition_point(|k| k.full_bytes().as_slice() <= user_key);
            }
        }
        self.next()
    }

    fn next(&mut self) -> Option<OrderedKey> {
        match self.direction {
            Direction::Forward => {
                let entry = self.snapshot.get(self.pos).cloned();
                if entry.is_some() {
                    self.pos += 1;
                }
                entry
            }
            Direction::Reverse => {
                if self.pos == 0 {
                    return None;
                }
                self.pos -= 1;
                self.snapshot.get(self.pos).cloned()
            }
        }
    }
}

struct BTreeMapBulkBuilder {
    sdi: BTreeMapSdi,
    prev: Option<Vec<u8>>,
}

impl BulkBuilder for BTreeMapBulkBuilder {
    fn add(&mut self, key: OrderedKey) -> Result<()> {
        let full = key.full_bytes();
        if let Some(prev) = &self.prev {
            debug_assert!(*prev < full, "bulk builder requires ascending keys");
        }
        self.prev = Some(full);
        self.sdi.insert(&key, DupPolicy::Allow)
    }

    fn finish(self: Box<Self>) -> Result<()> {
        Ok(())
    }
}
