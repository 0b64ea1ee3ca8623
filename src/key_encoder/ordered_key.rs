//! Memcomparable key encoding: [`OrderedKey`] bytes sort the same way as
//! the semantic values they were built from.
//!
//! Every field is encoded through the same tagged scheme so that
//! heterogeneous (possibly type-mismatched) fields in a compound key
//! still compare correctly against each other, and `TypeBits` lets us
//! recover the original numeric subtype afterward.

use crate::document::{Decimal, Value};

/// RecordId, long or string format, fixed per collection.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RecordId {
    Long(i64),
    Bytes(Vec<u8>),
}

impl RecordId {
    fn encode(&self, out: &mut Vec<u8>) {
        match self {
            RecordId::Long(n) => {
                out.push(0);
                out.extend_from_slice(&sortable_i64(*n));
            }
            RecordId::Bytes(b) => {
                out.push(1);
                encode_escaped_bytes(b, out);
            }
        }
    }

    fn decode(buf: &[u8], pos: &mut usize) -> RecordId {
        let tag = buf[*pos];
        *pos += 1;
        match tag {
            0 => {
                let n = unsortable_i64(&buf[*pos..*pos + 8]);
                *pos += 8;
                RecordId::Long(n)
            }
            _ => RecordId::Bytes(decode_escaped_bytes(buf, pos)),
        }
    }
}

/// Per-field tag recovering the value's original type. Ordering itself
/// never depends on this — only the later "recover the typed value"
/// step does.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum FieldTypeBit {
    Null,
    MinKey,
    MaxKey,
    Bool,
    I32,
    I64,
    F64,
    Decimal(i32), // scale
    Str,
    Binary,
    DateTime,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct TypeBits(pub Vec<FieldTypeBit>);

impl TypeBits {
    pub fn new() -> TypeBits {
        TypeBits(Vec::new())
    }

    pub fn push(&mut self, bit: FieldTypeBit) {
        self.0.push(bit)
    }

    pub fn extend(&mut self, other: &TypeBits) {
        self.0.extend(other.0.iter().cloned())
    }
}

/// A fully encoded index entry: the ordered key bytes (comparable
/// lexicographically), the companion type bits, and the RecordId
/// suffix every stored key carries.
#[derive(Clone, Debug, PartialEq)]
pub struct OrderedKey {
    /// Bytes for just the user-visible key, excluding the RecordId
    /// suffix. Two entries with equal `user_key` share the same
    /// "user-visible prefix" that uniqueness is enforced over.
    pub user_key: Vec<u8>,
    pub type_bits: TypeBits,
    pub record_id: RecordId,
}

impl OrderedKey {
    pub fn new(user_key: Vec<u8>, type_bits: TypeBits, record_id: RecordId) -> OrderedKey {
        OrderedKey { user_key, type_bits, record_id }
    }

    /// Full byte string as stored in the SDI: user key followed by the
    /// RecordId suffix, so stored keys are globally unique even when
    /// the user-visible key is not.
    pub fn full_bytes(&self) -> Vec<u8> {
        let mut out = self.user_key.clone();
        self.record_id.encode(&mut out);
        out
    }

    /// Recover the typed values that produced this key, one per field,
    /// using the companion type bits. Used to rehydrate `DuplicateKey`
    /// errors and by decode-round-trip tests.
    pub fn decode_values(&self) -> Vec<Value> {
        let mut pos = 0usize;
        let mut out = Vec::with_capacity(self.type_bits.0.len());
        for bit in &self.type_bits.0 {
            out.push(decode_one(&self.user_key, &mut pos, *bit));
        }
        out
    }
}

pub fn encode_value(v: &Value, descending: bool, out: &mut Vec<u8>, bits: &mut TypeBits) {
    let start = out.len();
    match v {
        Value::MinKey => {
            out.push(0x01);
            bits.push(FieldTypeBit::MinKey);
        }
        Value::Null => {
            out.push(0x10);
            bits.push(FieldTypeBit::Null);
        }
        Value::Bool(b) => {
            out.push(if *b { 0x21 } else { 0x20 });
            bits.push(FieldTypeBit::Bool);
        }
        Value::Str(s) => {
            out.push(0x40);
            encode_escaped_bytes(s.as_bytes(), out);
            bits.push(FieldTypeBit::Str);
        }
        Value::Binary(b) => {
            out.push(0x41);
            encode_escaped_bytes(b, out);
            bits.push(FieldTypeBit::Binary);
        }
        Value::DateTime(ms) => {
            out.push(0x35);
            out.extend_from_slice(&sortable_i64(*ms));
            bits.push(FieldTypeBit::DateTime);
        }
        Value::MaxKey => {
            out.push(0xFF);
            bits.push(FieldTypeBit::MaxKey);
        }
        _ if v.numeric_kind().is_some() => {
            let f = canonical_numeric(v);
            out.push(0x30);
            out.extend_from_slice(&sortable_f64(f));
            let bit = match v {
                Value::I32(_) => FieldTypeBit::I32,
                Value::I64(_) => FieldTypeBit::I64,
                Value::F64(_) => FieldTypeBit::F64,
                Value::Decimal(d) => FieldTypeBit::Decimal(d.scale),
                _ => unreachable!(),
            };
            bits.push(bit);
        }
        Value::Array(_) | Value::Object(_) => {
            panic!("encode_value called on a non-scalar; callers must expand arrays first")
        }
    }
    if descending {
        for b in &mut out[start..] {
            *b = !*b;
        }
    }
}

/// NaN sorts as a single canonical value.
fn canonical_numeric(v: &Value) -> f64 {
    let f = v.as_f64().unwrap();
    if f.is_nan() {
        f64::NAN
    } else {
        f
    }
}

fn decode_one(buf: &[u8], pos: &mut usize, bit: FieldTypeBit) -> Value {
    let tag = buf[*pos];
    match tag {
        0x01 => {
            *pos += 1;
            Value::MinKey
        }
        0xFF => {
            *pos += 1;
            Value::MaxKey
        }
        0x10 => {
            *pos += 1;
            Value::Null
        }
        0x20 => {
            *pos += 1;
            Value::Bool(false)
        }
        0x21 => {
            *pos += 1;
            Value::Bool(true)
        }
        0x40 => {
            *pos += 1;
            let raw = decode_escaped_bytes(buf, pos);
            Value::Str(String::from_utf8_lossy(&raw).into_owned())
        }
        0x41 => {
            *pos += 1;
            Value::Binary(decode_escaped_bytes(buf, pos))
        }
        0x35 => {
            *pos += 1;
            let ms = unsortable_i64(&buf[*pos..*pos + 8]);
            *pos += 8;
            Value::DateTime(ms)
        }
        0x30 => {
            *pos += 1;
            let f = unsortable_f64(&buf[*pos..*pos + 8]);
            *pos += 8;
            match bit {
                FieldTypeBit::I32 => Value::I32(f as i32),
                FieldTypeBit::I64 => Value::I64(f as i64),
                FieldTypeBit::Decimal(scale) => Value::Decimal(Decimal {
                    unscaled: (f * 10f64.powi(scale)).round() as i128,
                    scale,
                }),
                _ => Value::F64(f),
            }
        }
        _ => panic!("corrupt ordered key: unknown tag {}", tag),
    }
}

/// Maps an `f64` onto a `u64` whose unsigned big-endian byte order
/// matches the float's numeric order (standard IEEE-754 sortable-float
/// trick: flip all bits for negatives, flip just the sign bit for
/// non-negatives).
fn sortable_f64(f: f64) -> [u8; 8] {
    let bits = f.to_bits();
    let mapped = if bits & (1u64 << 63) != 0 { !bits } else { bits | (1u64 << 63) };
    mapped.to_be_bytes()
}

fn unsortable_f64(buf: &[u8]) -> f64 {
    let mapped = u64::from_be_bytes(buf.try_into().unwrap());
    let bits = if mapped & (1u64 << 63) != 0 { mapped & !(1u64 << 63) } else { !mapped };
    f64::from_bits(bits)
}

fn sortable_i64(n: i64) -> [u8; 8] {
    ((n as i128 + (1i128 << 63)) as u64).to_be_bytes()
}

fn unsortable_i64(buf: &[u8]) -> i64 {
    let u = u64::from_be_bytes(buf.try_into().unwrap());
    (u as i128 - (1i128 << 63)) as i64
}

/// Memcomparable byte-string encoding: every `0x00` byte is escaped as
/// `0x00 0xFF` and the string is terminated by `0x00 0x00`, so
/// concatenated fields remain unambiguous and lexicographic byte order
/// equals the encoded strings' natural order.
fn encode_escaped_bytes(raw: &[u8], out: &mut Vec<u8>) {
    for &b in raw {
        if b == 0x00 {
            out.push(0x00);
            out.push(0xFF);
        } else {
            out.push(b);
        }
    }
    out.push(0x00);
    out.push(0x00);
}

fn decode_escaped_bytes(buf: &[u8], pos: &mut usize) -> Vec<u8> {
    let mut out = Vec::new();
    loop {
        match buf[*pos] {
            0x00 if buf[*pos + 1] == 0x00 => {
                *pos += 2;
                break;
            }
            0x00 => {
                out.push(0x00);
                *pos += 2;
            }
            b => {
                out.push(b);
                *pos += 1;
            }
        }
    }
    out
}
