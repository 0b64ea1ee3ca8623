//! The `encode()` entry point.

use std::sync::Arc;

use crate::catalog::descriptor::{IndexDescriptor, IndexKind};
use crate::document::{Document, FieldPath, Value};
use crate::error::{Error, Result};

use super::ordered_key::{encode_value, OrderedKey, RecordId, TypeBits};
use super::MultikeyPaths;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EncodeMode {
    Adding,
    Removing,
}

/// The three enforcement modes of `getKeys`.
#[derive(Clone)]
pub enum ConstraintHandling {
    Strict,
    RelaxedUnfiltered,
    RelaxedWithCallback(Arc<dyn Fn(&Document) -> bool + Send + Sync>),
}

pub struct EncodeResult {
    pub keys: Vec<OrderedKey>,
    pub multikey_paths: MultikeyPaths,
    pub metadata_keys: Vec<OrderedKey>,
}

impl EncodeResult {
    fn empty() -> EncodeResult {
        EncodeResult { keys: Vec::new(), multikey_paths: MultikeyPaths::new(), metadata_keys: Vec::new() }
    }
}

pub fn encode(
    document: &Document,
    descriptor: &IndexDescriptor,
    record_id: RecordId,
    mode: EncodeMode,
    handling: ConstraintHandling,
) -> Result<EncodeResult> {
    // Partial indexes short-circuit to zero keys.
    if let Some(filter) = &descriptor.partial_filter {
        if !filter.eval(document) {
            return Ok(EncodeResult::empty());
        }
    }

    match descriptor.kind {
        IndexKind::Wildcard => encode_wildcard(document, descriptor, record_id, mode),
        IndexKind::Hashed => encode_hashed(document, descriptor, record_id),
        _ => encode_compound(document, descriptor, record_id, mode, handling),
    }
}

/// Ordered/b-tree, geo, and text indexes all key off the same compound
/// field-pattern path (geo/text payload shaping lives in
/// `access_method`, not here — the encoder only needs the key pattern).
fn encode_compound(
    document: &Document,
    descriptor: &IndexDescriptor,
    record_id: RecordId,
    mode: EncodeMode,
    handling: ConstraintHandling,
) -> Result<EncodeResult> {
    let mut per_field: Vec<Vec<(Value, Vec<String>)>> = Vec::new();
    let mut any_present = false;

    for field in &descriptor.key_pattern.0 {
        let mut resolved = document.resolve_path(&field.path);
        if resolved.is_empty() {
            resolved.push((Value::Null, Vec::new()));
        } else {
            any_present = true;
        }
        per_field.push(resolved);
    }

    // Sparse indexes emit zero keys for documents that omit every
    // indexed field.
    if descriptor.sparse && !any_present {
        return Ok(EncodeResult::empty());
    }

    // Parallel-array refusal: two distinct fields that both traverse
    // (different) arrays within the same document.
    if let Some((a, b)) = find_parallel_arrays(&descriptor.key_pattern.0, &per_field) {
        let suppress = match &handling {
            ConstraintHandling::Strict => false,
            ConstraintHandling::RelaxedUnfiltered => true,
            ConstraintHandling::RelaxedWithCallback(cb) => cb(document),
        };
        if suppress {
            return Ok(EncodeResult::empty());
        }
        return Err(Error::parallel_arrays(&descriptor.name, &a, &b));
    }

    let mut multikey_paths = MultikeyPaths::new();
    if mode == EncodeMode::Adding {
        for (field, resolved) in descriptor.key_pattern.0.iter().zip(per_field.iter()) {
            for (_, arrays) in resolved {
                multikey_paths.record(field.path.as_str(), arrays);
            }
        }
    }

    let mut keys = Vec::new();
    cartesian_encode(&descriptor.key_pattern.0, &per_field, descriptor, &mut Vec::new(), &mut |parts| {
        let mut user_key = Vec::new();
        let mut bits = TypeBits::new();
        for (field, value) in parts {
            let value = apply_collation(value, descriptor.collation.as_deref());
            encode_value(&value, field.descending, &mut user_key, &mut bits);
        }
        keys.push(OrderedKey::new(user_key, bits, record_id.clone()));
    });

    Ok(EncodeResult { keys, multikey_paths, metadata_keys: Vec::new() })
}

fn find_parallel_arrays(
    fields: &[crate::catalog::descriptor::FieldSpec],
    per_field: &[Vec<(Value, Vec<String>)>],
) -> Option<(String, String)> {
    let mut seen_root: Option<(String, String)> = None; // (field path, root array component)
    for (field, resolved) in fields.iter().zip(per_field.iter()) {
        if resolved.len() <= 1 {
            continue;
        }
        let root = resolved.iter().find_map(|(_, arrays)| arrays.first().cloned());
        let root = match root {
            Some(r) => r,
            None => continue,
        };
        match &seen_root {
            None => seen_root = Some((field.path.to_string(), root)),
            Some((prev_field, prev_root)) if prev_root != &root => {
                return Some((prev_field.clone(), field.path.to_string()));
            }
            _ => {}
        }
    }
    None
}

fn cartesian_encode<'a>(
    fields: &'a [crate::catalog::descriptor::FieldSpec],
    per_field: &'a [Vec<(Value, Vec<String>)>],
    _descriptor: &IndexDescriptor,
    acc: &mut Vec<(&'a crate::catalog::descriptor::FieldSpec, Value)>,
    emit: &mut dyn FnMut(&[(&'a crate::catalog::descriptor::FieldSpec, Value)]),
) {
    let idx = acc.len();
    if idx == fields.len() {
        emit(acc);
        return;
    }
    for (value, _) in &per_field[idx] {
        acc.push((&fields[idx], value.clone()));
        cartesian_encode(fields, per_field, _descriptor, acc, emit);
        acc.pop();
    }
}

/// Collation support is limited to the "simple binary" and "case
/// insensitive" strengths; anything
/// richer is out of scope without a real ICU binding.
fn apply_collation(value: &Value, collation: Option<&str>) -> Value {
    match (value, collation) {
        (Value::Str(s), Some(locale)) if locale != "simple" => Value::Str(s.to_lowercase()),
        _ => value.clone(),
    }
}

/// Wildcard indexes expand every path reachable from the projected
/// subtree; each emitted key carries the dotted path as an explicit
/// leading component so distinct paths sort disjointly.
fn encode_wildcard(
    document: &Document,
    descriptor: &IndexDescriptor,
    record_id: RecordId,
    mode: EncodeMode,
) -> Result<EncodeResult> {
    let root = FieldPath::from_dotted("");
    let projection = descriptor.projection.clone().unwrap_or_else(crate::catalog::descriptor::Projection::include_all);
    let mut paths: Vec<FieldPath> = document
        .expand_subtree(&root)
        .into_iter()
        .filter(|p| projection.accepts(p))
        .collect();
    paths.sort_by(|a, b| a.as_str().cmp(b.as_str()));

    let mut keys = Vec::new();
    let mut multikey_paths = MultikeyPaths::new();
    let mut metadata_keys = Vec::new();

    for path in &paths {
        for (value, arrays) in document.resolve_path(path) {
            if mode == EncodeMode::Adding {
                multikey_paths.record(path.as_str(), &arrays);
            }
            let mut user_key = Vec::new();
            let mut bits = TypeBits::new();
            encode_value(&Value::Str(path.to_string()), false, &mut user_key, &mut bits);
            encode_value(&value, false, &mut user_key, &mut bits);
            keys.push(OrderedKey::new(user_key, bits, record_id.clone()));

            if let Value::Array(items) = &value {
                if items.is_empty() {
                    let mut mk = Vec::new();
                    let mut mkb = TypeBits::new();
                    encode_value(&Value::Str(format!("$**_multikeyMetadata.{}", path)), false, &mut mk, &mut mkb);
                    metadata_keys.push(OrderedKey::new(mk, mkb, record_id.clone()));
                }
            }
        }
    }

    Ok(EncodeResult { keys, multikey_paths, metadata_keys })
}

/// Hashed indexes emit a single 64-bit hash per document per indexed
/// field; arrays are hashed as arrays, never multikey.
fn encode_hashed(document: &Document, descriptor: &IndexDescriptor, record_id: RecordId) -> Result<EncodeResult> {
    use crate::hash::CityHasher;
    use std::hash::Hasher;

    let mut user_key = Vec::new();
    let mut bits = TypeBits::new();
    for field in &descriptor.key_pattern.0 {
        let resolved = document.resolve_path(&field.path);
        let mut hasher = CityHasher::new();
        for (value, _) in &resolved {
            hasher.write(format!("{:?}", value).as_bytes());
        }
        if resolved.is_empty() {
            hasher.write(b"<missing>");
        }
        encode_value(&Value::I64(hasher.finish() as i64), field.descending, &mut user_key, &mut bits);
    }
    Ok(EncodeResult {
        keys: vec![OrderedKey::new(user_key, bits, record_id)],
        multikey_paths: MultikeyPaths::new(),
        metadata_keys: Vec::new(),
    })
}
