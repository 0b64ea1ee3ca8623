//! [`IndexDescriptor`]: immutable configuration of one index.
//! Descriptors are never mutated after creation; hide, TTL, and
//! validator changes all produce new descriptors via collMod.

use std::collections::BTreeSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::document::{Document, FieldPath, Value};

/// One field of a key pattern: a dotted path plus sort direction.
/// The index "type hint" is carried by [`IndexKind`] at the descriptor
/// level rather than per-field — one option set per index, not per
/// field.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub path: FieldPath,
    pub descending: bool,
}

impl FieldSpec {
    pub fn asc(path: &str) -> FieldSpec {
        FieldSpec { path: FieldPath::from_dotted(path), descending: false }
    }

    pub fn desc(path: &str) -> FieldSpec {
        FieldSpec { path: FieldPath::from_dotted(path), descending: true }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyPattern(pub Vec<FieldSpec>);

impl KeyPattern {
    pub fn new(fields: Vec<FieldSpec>) -> KeyPattern {
        KeyPattern(fields)
    }
}

/// Structural partial-filter predicate. Kept as a small comparable
/// expression tree (rather than an opaque closure) so that two
/// descriptors' filters can be compared for the "equivalent" relation
/// used by index-creation conflict detection.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum FilterExpr {
    Exists(FieldPath),
    Eq(FieldPath, Value),
    Gt(FieldPath, Value),
    Gte(FieldPath, Value),
    Lt(FieldPath, Value),
    Lte(FieldPath, Value),
    And(Vec<FilterExpr>),
}

impl FilterExpr {
    pub fn eval(&self, doc: &Document) -> bool {
        match self {
            FilterExpr::Exists(p) => !doc.resolve_path(p).is_empty(),
            FilterExpr::Eq(p, v) => doc.resolve_path(p).iter().any(|(x, _)| x == v),
            FilterExpr::Gt(p, v) => {
                doc.resolve_path(p).iter().any(|(x, _)| x.partial_cmp(v) == Some(std::cmp::Ordering::Greater))
            }
            FilterExpr::Gte(p, v) => doc.resolve_path(p).iter().any(|(x, _)| {
                matches!(x.partial_cmp(v), Some(std::cmp::Ordering::Greater) | Some(std::cmp::Ordering::Equal))
            }),
            FilterExpr::Lt(p, v) => {
                doc.resolve_path(p).iter().any(|(x, _)| x.partial_cmp(v) == Some(std::cmp::Ordering::Less))
            }
            FilterExpr::Lte(p, v) => doc.resolve_path(p).iter().any(|(x, _)| {
                matches!(x.partial_cmp(v), Some(std::cmp::Ordering::Less) | Some(std::cmp::Ordering::Equal))
            }),
            FilterExpr::And(exprs) => exprs.iter().all(|e| e.eval(doc)),
        }
    }
}

/// Authored + normalized wildcard/columnar projection.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Projection {
    pub authored: Vec<(FieldPath, bool)>, // (path, included)
    pub normalized: BTreeSet<String>,     // normalized dotted paths, included-only
}

impl Projection {
    pub fn include_all() -> Projection {
        Projection { authored: Vec::new(), normalized: BTreeSet::new() }
    }

    pub fn from_paths(paths: &[&str]) -> Projection {
        let authored = paths.iter().map(|p| (FieldPath::from_dotted(p), true)).collect();
        let normalized = paths.iter().map(|p| p.to_string()).collect();
        Projection { authored, normalized }
    }

    /// Whether `path` should be indexed under this projection: included
    /// if the projection is empty (whole-document wildcard), or if
    /// `path` is at/under one of the normalized included paths.
    pub fn accepts(&self, path: &FieldPath) -> bool {
        if self.normalized.is_empty() {
            return true;
        }
        self.normalized.iter().any(|p| {
            let p = FieldPath::from_dotted(p);
            p.is_prefix_of(path) || path.is_prefix_of(&p)
        })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum IndexKind {
    BTree,
    Hashed,
    Geo2d,
    Geo2dSphere,
    Text,
    Wildcard,
    Columnar,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PrepareUniqueState {
    Draining,
    Ready,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct IndexDescriptor {
    pub name: String,
    pub key_pattern: KeyPattern,
    pub kind: IndexKind,
    pub version: u32,
    pub unique: bool,
    pub sparse: bool,
    pub partial_filter: Option<Arc<FilterExpr>>,
    pub collation: Option<String>,
    pub projection: Option<Projection>,
    pub expire_after_seconds: Option<u64>,
    pub hidden: bool,
    pub prepare_unique: bool,
}

impl IndexDescriptor {
    pub fn new(name: &str, key_pattern: KeyPattern) -> IndexDescriptor {
        IndexDescriptor {
            name: name.to_string(),
            key_pattern,
            kind: IndexKind::BTree,
            version: 2,
            unique: false,
            sparse: false,
            partial_filter: None,
            collation: None,
            projection: None,
            expire_after_seconds: None,
            hidden: false,
            prepare_unique: false,
        }
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    pub fn sparse(mut self) -> Self {
        self.sparse = true;
        self
    }

    pub fn with_partial_filter(mut self, expr: FilterExpr) -> Self {
        self.partial_filter = Some(Arc::new(expr));
        self
    }

    pub fn with_kind(mut self, kind: IndexKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_projection(mut self, projection: Projection) -> Self {
        self.projection = Some(projection);
        self
    }

    pub fn with_ttl(mut self, seconds: u64) -> Self {
        self.expire_after_seconds = Some(seconds);
        self
    }

    /// Two descriptors are *identical* iff every option matches.
    pub fn identical_to(&self, other: &IndexDescriptor) -> bool {
        self == other
    }

    /// Two descriptors are *equivalent* iff the signature-defining
    /// subset matches: key pattern, collation, partial filter,
    /// normalized projection, and uniqueness (for name-uniqueness
    /// conflicts).
    pub fn equivalent_to(&self, other: &IndexDescriptor) -> bool {
        self.key_pattern == other.key_pattern
            && self.collation == other.collation
            && self.partial_filter == other.partial_filter
            && self.projection.as_ref().map(|p| &p.normalized)
                == other.projection.as_ref().map(|p| &p.normalized)
            && self.unique == other.unique
    }
}
