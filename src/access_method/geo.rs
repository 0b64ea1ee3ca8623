use std::collections::BTreeMap;
use std::sync::Arc;

use crate::catalog::descriptor::IndexDescriptor;
use crate::document::{Document, Value};
use crate::error::{Error, Result};
use crate::key_encoder::RecordId;
use crate::sdi::{BulkBuilder, SortedDataInterface, ValidationReport};

use super::standard::StandardAccessMethod;
use super::{AccessMethod, AccessMethodStats, InsertResult};

/// Base-32 geohash, enough bits of resolution that equal coordinates
/// geohash identically and nearby coordinates share a long common
/// prefix — the property a b-tree index needs to do range-bounded
/// proximity search.
const GEOHASH_ALPHABET: &[u8] = b"0123456789bcdefghjkmnpqrstuvwxyz";
const GEOHASH_BITS: u32 = 50;

fn geohash_encode(lon: f64, lat: f64) -> String {
    let mut lat_range = (-90.0f64, 90.0f64);
    let mut lon_range = (-180.0f64, 180.0f64);
    let mut bits = Vec::with_capacity(GEOHASH_BITS as usize);
    let mut even = true;
    for _ in 0..GEOHASH_BITS {
        if even {
            let mid = (lon_range.0 + lon_range.1) / 2.0;
            if lon >= mid {
                bits.push(true);
                lon_range.0 = mid;
            } else {
                bits.push(false);
                lon_range.1 = mid;
            }
        } else {
            let mid = (lat_range.0 + lat_range.1) / 2.0;
            if lat >= mid {
                bits.push(true);
                lat_range.0 = mid;
            } else {
                bits.push(false);
                lat_range.1 = mid;
            }
        }
        even = !even;
    }
    let mut out = String::new();
    for chunk in bits.chunks(5) {
        let mut idx = 0usize;
        for (i, bit) in chunk.iter().enumerate() {
            if *bit {
                idx |= 1 << (chunk.len() - 1 - i);
            }
        }
        out.push(GEOHASH_ALPHABET[idx] as char);
    }
    out
}

fn extract_lon_lat(value: &Value) -> Result<(f64, f64)> {
    match value {
        Value::Array(items) if items.len() == 2 => {
            let lon = items[0].as_f64().ok_or_else(|| Error::BadValue("geo coordinate must be numeric".into()))?;
            let lat = items[1].as_f64().ok_or_else(|| Error::BadValue("geo coordinate must be numeric".into()))?;
            Ok((lon, lat))
        }
        Value::Object(map) => {
            let coords = map
                .get("coordinates")
                .ok_or_else(|| Error::BadValue("GeoJSON value missing 'coordinates'".into()))?;
            extract_lon_lat(coords)
        }
        _ => Err(Error::BadValue("geo field must be a [lon, lat] pair or GeoJSON Point".into())),
    }
}

/// Rewrites a document so the geo field carries its geohash string in
/// place of raw coordinates, then reuses the compound-key path every
/// other ordered index goes through.
fn geohash_document(document: &Document, geo_field: &str) -> Result<Document> {
    let root = match &document.0 {
        Value::Object(map) => map,
        _ => return Err(Error::BadValue("document root must be an object".into())),
    };
    let mut out = BTreeMap::new();
    for (k, v) in root {
        if k == geo_field {
            let (lon, lat) = extract_lon_lat(v)?;
            out.insert(k.clone(), Value::Str(geohash_encode(lon, lat)));
        } else {
            out.insert(k.clone(), v.clone());
        }
    }
    Ok(Document::new(out))
}

struct GeoAccessMethod {
    geo_field: String,
    inner: StandardAccessMethod,
}

impl AccessMethod for GeoAccessMethod {
    fn insert(&self, document: &Document, record_id: RecordId) -> Result<InsertResult> {
        self.inner.insert(&geohash_document(document, &self.geo_field)?, record_id)
    }

    fn remove(&self, document: &Document, record_id: RecordId) -> Result<()> {
        self.inner.remove(&geohash_document(document, &self.geo_field)?, record_id)
    }

    fn initiate_bulk(&self) -> Box<dyn BulkBuilder> {
        self.inner.initiate_bulk()
    }

    fn validate(&self) -> Result<ValidationReport> {
        self.inner.validate()
    }

    fn compact(&self) -> Result<()> {
        self.inner.compact()
    }

    fn initialize_as_empty(&self) -> Result<()> {
        self.inner.initialize_as_empty()
    }

    fn ident(&self) -> &str {
        self.inner.ident()
    }

    fn stats(&self) -> AccessMethodStats {
        self.inner.stats()
    }
}

fn geo_field_name(descriptor: &IndexDescriptor) -> String {
    descriptor.key_pattern.0[0].path.to_string()
}

pub fn new_geo_2d(descriptor: IndexDescriptor, sdi: Arc<dyn SortedDataInterface>) -> Box<dyn AccessMethod> {
    let geo_field = geo_field_name(&descriptor);
    Box::new(GeoAccessMethod { geo_field, inner: StandardAccessMethod::new(descriptor, sdi) })
}

pub fn new_geo_2dsphere(descriptor: IndexDescriptor, sdi: Arc<dyn SortedDataInterface>) -> Box<dyn AccessMethod> {
    let geo_field = geo_field_name(&descriptor);
    Box::new(GeoAccessMethod { geo_field, inner: StandardAccessMethod::new(descriptor, sdi) })
}
