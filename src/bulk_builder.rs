//! External sort + bulk load for index builds: `Collector` plays the
//! role of the in-memory run builder, `Merger` does a k-way merge over
//! on-disk runs, and `Loader` streams the merged, already-sorted output
//! into the target SDI.
//!
//! Entries here are plain byte-keyed [`OrderedKey`]s rather than a
//! typed `K`/`V` pair, so the spill format is a small hand-rolled
//! binary codec instead of CBOR.

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::PathBuf;

use tempfile::NamedTempFile;

use crate::error::{Error, Result};
use crate::key_encoder::{FieldTypeBit, OrderedKey, RecordId, TypeBits};
use crate::sdi::BulkBuilder as SdiBulkBuilder;

/// Number of entries buffered in memory before a run is sorted and
/// spilled to a temp file. Kept small so tests exercise the multi-run
/// merge path without needing millions of documents.
pub const DEFAULT_SPILL_THRESHOLD: usize = 4096;

/// Accepts keys in arbitrary order, sorting and spilling fixed-size
/// runs to disk as they fill.
pub struct Collector {
    dir: PathBuf,
    spill_threshold: usize,
    buffer: Vec<OrderedKey>,
    spills: Vec<PathBuf>,
}

impl Collector {
    pub fn new(dir: impl Into<PathBuf>, spill_threshold: usize) -> Collector {
        Collector { dir: dir.into(), spill_threshold, buffer: Vec::new(), spills: Vec::new() }
    }

    pub fn add(&mut self, key: OrderedKey) -> Result<()> {
        self.buffer.push(key);
        if self.buffer.len() >= self.spill_threshold {
            self.spill()?;
        }
        Ok(())
    }

    fn spill(&mut self) -> Result<()> {
        if self.buffer.is_empty() {
            return Ok(());
        }
        self.buffer.sort_by(|a, b| a.full_bytes().cmp(&b.full_bytes()));
        let file = NamedTempFile::new_in(&self.dir).map_err(io_err)?;
        {
            let mut writer = BufWriter::new(file.reopen().map_err(io_err)?);
            for entry in &self.buffer {
                write_entry(&mut writer, entry).map_err(io_err)?;
            }
            writer.flush().map_err(io_err)?;
        }
        self.spills.push(file.into_temp_path().keep().map_err(|e| Error::DataCorruptionDetected(e.to_string()))?);
        self.buffer.clear();
        Ok(())
    }

    /// Finalizes collection: the last partial run stays in memory
    /// rather than being spilled unnecessarily, then hands off to
    /// [`Merger`].
    pub fn finish(mut self) -> Result<Merger> {
        self.buffer.sort_by(|a, b| a.full_bytes().cmp(&b.full_bytes()));
        Ok(Merger { spills: self.spills, tail: self.buffer })
    }
}

/// K-way merges the sorted runs [`Collector`] produced, exposed as one
/// ascending iterator of [`OrderedKey`].
pub struct Merger {
    spills: Vec<PathBuf>,
    tail: Vec<OrderedKey>,
}

impl Merger {
    /// Materializes the merge. The reference implementation reads every
    /// run fully into memory and sorts once; a storage-backed SDI would
    /// instead stream each run and merge incrementally.
    pub fn into_sorted_vec(self) -> Result<Vec<OrderedKey>> {
        let mut all = self.tail;
        for path in &self.spills {
            let mut reader = BufReader::new(File::open(path).map_err(io_err)?);
            loop {
                match read_entry(&mut reader) {
                    Ok(entry) => all.push(entry),
                    Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => break,
                    Err(e) => return Err(io_err(e)),
                }
            }
        }
        all.sort_by(|a, b| a.full_bytes().cmp(&b.full_bytes()));
        Ok(all)
    }
}

impl Drop for Merger {
    fn drop(&mut self) {
        for path in &self.spills {
            let _ = std::fs::remove_file(path);
        }
    }
}

/// Feeds an already-sorted sequence into a [`SdiBulkBuilder`], failing
/// fast if the sequence is not in fact ascending.
pub struct Loader;

impl Loader {
    pub fn load(sorted: Vec<OrderedKey>, builder: &mut dyn SdiBulkBuilder) -> Result<u64> {
        let mut prev: Option<Vec<u8>> = None;
        let mut loaded = 0u64;
        for entry in sorted {
            let full = entry.full_bytes();
            if let Some(p) = &prev {
                if p >= &full {
                    return Err(Error::DataCorruptionDetected(
                        "bulk loader received entries out of order".to_string(),
                    ));
                }
            }
            prev = Some(full);
            builder.add(entry)?;
            loaded += 1;
        }
        Ok(loaded)
    }
}

fn io_err(e: io::Error) -> Error {
    Error::DataCorruptionDetected(format!("bulk builder spill I/O error: {}", e))
}

fn type_bit_tag(bit: &FieldTypeBit) -> (u8, i32) {
    match bit {
        FieldTypeBit::Null => (0, 0),
        FieldTypeBit::MinKey => (1, 0),
        FieldTypeBit::MaxKey => (2, 0),
        FieldTypeBit::Bool => (3, 0),
        FieldTypeBit::I32 => (4, 0),
        FieldTypeBit::I64 => (5, 0),
        FieldTypeBit::F64 => (6, 0),
        FieldTypeBit::Decimal(scale) => (7, *scale),
        FieldTypeBit::Str => (8, 0),
        FieldTypeBit::Binary => (9, 0),
        FieldTypeBit::DateTime => (10, 0),
    }
}

fn type_bit_from_tag(tag: u8, scale: i32) -> io::Result<FieldTypeBit> {
    Ok(match tag {
        0 => FieldTypeBit::Null,
        1 => FieldTypeBit::MinKey,
        2 => FieldTypeBit::MaxKey,
        3 => FieldTypeBit::Bool,
        4 => FieldTypeBit::I32,
        5 => FieldTypeBit::I64,
        6 => FieldTypeBit::F64,
        7 => FieldTypeBit::Decimal(scale),
        8 => FieldTypeBit::Str,
        9 => FieldTypeBit::Binary,
        10 => FieldTypeBit::DateTime,
        _ => return Err(io::Error::new(io::ErrorKind::InvalidData, "unknown type bit tag")),
    })
}

fn write_entry(w: &mut impl Write, entry: &OrderedKey) -> io::Result<()> {
    w.write_all(&(entry.user_key.len() as u32).to_be_bytes())?;
    w.write_all(&entry.user_key)?;
    w.write_all(&(entry.type_bits.0.len() as u32).to_be_bytes())?;
    for bit in &entry.type_bits.0 {
        let (tag, scale) = type_bit_tag(bit);
        w.write_all(&[tag])?;
        w.write_all(&scale.to_be_bytes())?;
    }
    match &entry.record_id {
        RecordId::Long(n) => {
            w.write_all(&[0])?;
            w.write_all(&n.to_be_bytes())?;
        }
        RecordId::Bytes(b) => {
            w.write_all(&[1])?;
            w.write_all(&(b.len() as u32).to_be_bytes())?;
            w.write_all(b)?;
        }
    }
    Ok(())
}

fn read_entry(r: &mut impl Read) -> io::Result<OrderedKey> {
    let mut len_buf = [0u8; 4];
    read_exact_or_eof(r, &mut len_buf)?;
    let user_key_len = u32::from_be_bytes(len_buf) as usize;
    let mut user_key = vec![0u8; user_key_len];
    r.read_exact(&mut user_key)?;

    r.read_exact(&mut len_buf)?;
    let num_bits = u32::from_be_bytes(len_buf) as usize;
    let mut bits = TypeBits::new();
    for _ in 0..num_bits {
        let mut tag = [0u8; 1];
        r.read_exact(&mut tag)?;
        let mut scale_buf = [0u8; 4];
        r.read_exact(&mut scale_buf)?;
        bits.push(type_bit_from_tag(tag[0], i32::from_be_bytes(scale_buf))?);
    }

    let mut kind = [0u8; 1];
    r.read_exact(&mut kind)?;
    let record_id = match kind[0] {
        0 => {
            let mut buf = [0u8; 8];
            r.read_exact(&mut buf)?;
            RecordId::Long(i64::from_be_bytes(buf))
        }
        _ => {
            r.read_exact(&mut len_buf)?;
            let n = u32::from_be_bytes(len_buf) as usize;
            let mut buf = vec![0u8; n];
            r.read_exact(&mut buf)?;
            RecordId::Bytes(buf)
        }
    };
    Ok(OrderedKey::new(user_key, bits, record_id))
}

fn read_exact_or_eof(r: &mut impl Read, buf: &mut [u8]) -> io::Result<()> {
    let mut total = 0;
    while total < buf.len() {
        match r.read(&mut buf[total..]) {
            Ok(0) if total == 0 => return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "eof")),
            Ok(0) => return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "truncated entry")),
            Ok(n) => total += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sdi::{BTreeMapSdi, SortedDataInterface};

    fn key(n: u8, rid: i64) -> OrderedKey {
        OrderedKey::new(vec![n], TypeBits(vec![FieldTypeBit::I32]), RecordId::Long(rid))
    }

    #[test]
    fn collector_spills_and_merges_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let mut collector = Collector::new(dir.path(), 2);
        for n in [5u8, 1, 4, 2, 3] {
            collector.add(key(n, n as i64)).unwrap();
        }
        let merger = collector.finish().unwrap();
        let sorted = merger.into_sorted_vec().unwrap();
        let values: Vec<u8> = sorted.iter().map(|k| k.user_key[0]).collect();
        assert_eq!(values, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn loader_feeds_bulk_builder_and_rejects_out_of_order() {
        let sdi = BTreeMapSdi::new();
        let mut builder = sdi.make_bulk_builder();
        let sorted = vec![key(1, 1), key(2, 2), key(3, 3)];
        let loaded = Loader::load(sorted, builder.as_mut()).unwrap();
        assert_eq!(loaded, 3);
        builder.finish().unwrap();
        assert_eq!(sdi.num_entries(), 3);

        let sdi2 = BTreeMapSdi::new();
        let mut builder2 = sdi2.make_bulk_builder();
        let unsorted = vec![key(2, 2), key(1, 1)];
        assert!(Loader::load(unsorted, builder2.as_mut()).is_err());
    }
}
