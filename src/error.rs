//! Crate-wide error taxonomy for the collection index subsystem.
//!
//! Mirrors the kinds the core raises or propagates (validation, conflict,
//! lifecycle, infrastructure). Every fallible operation in this crate
//! returns [`Result`].

use std::{fmt, result};

use crate::catalog::IndexDescriptor;
use crate::key_encoder::OrderedKey;

pub type Result<T> = result::Result<T, Error>;

/// One rehydrated offending key, field names restored from the
/// descriptor's key pattern, attached to [`Error::DuplicateKey`].
#[derive(Clone, Debug, PartialEq)]
pub struct RehydratedKey {
    pub index_name: String,
    pub fields: Vec<(String, String)>, // (field name, debug-printed value)
    pub record_id: String,
    pub collation: Option<String>,
}

#[derive(Debug)]
pub enum Error {
    // -- Validation --
    InvalidOptions(String),
    TypeMismatch(String),
    AmbiguousIndexKeyPattern(String),
    IndexNotFound(String),
    CannotCreateIndex(String),
    CannotIndexParallelArrays { index_name: String, paths: (String, String) },

    // -- Conflict --
    IndexBuildAlreadyInProgress(String),
    IndexBuildAborted(String),
    IndexAlreadyExists(String),
    IndexOptionsConflict(String),
    IndexKeySpecsConflict(String),
    DuplicateKey(RehydratedKey),

    // -- Lifecycle --
    NamespaceNotFound(String),
    CommandNotSupportedOnView(String),
    NotWritablePrimary(String),
    BackgroundOperationInProgressForNamespace(String),
    BackgroundOperationInProgressForDatabase(String),
    MovePrimaryInProgress(String),

    // -- Infrastructure --
    WriteConflict,
    DataCorruptionDetected(String),
    Interrupted(String),
    InterruptedAtShutdown(String),

    BadValue(String),
}

impl Error {
    pub(crate) fn parallel_arrays(index_name: &str, a: &str, b: &str) -> Error {
        Error::CannotIndexParallelArrays {
            index_name: index_name.to_string(),
            paths: (a.to_string(), b.to_string()),
        }
    }

    /// Whether the enclosing `writeConflictRetry` loop (see
    /// [`crate::storage_engine::write_conflict_retry`]) should retry this
    /// error at the transaction boundary. Only `WriteConflict` ever is.
    pub fn is_write_conflict(&self) -> bool {
        matches!(self, Error::WriteConflict)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::InvalidOptions(s) => write!(f, "InvalidOptions: {}", s),
            Error::TypeMismatch(s) => write!(f, "TypeMismatch: {}", s),
            Error::AmbiguousIndexKeyPattern(s) => write!(f, "AmbiguousIndexKeyPattern: {}", s),
            Error::IndexNotFound(s) => write!(f, "IndexNotFound: {}", s),
            Error::CannotCreateIndex(s) => write!(f, "CannotCreateIndex: {}", s),
            Error::CannotIndexParallelArrays { index_name, paths } => write!(
                f,
                "CannotIndexParallelArrays: index '{}' cannot index parallel arrays '{}' and '{}'",
                index_name, paths.0, paths.1
            ),
            Error::IndexBuildAlreadyInProgress(s) => {
                write!(f, "IndexBuildAlreadyInProgress: {}", s)
            }
            Error::IndexBuildAborted(s) => write!(f, "IndexBuildAborted: {}", s),
            Error::IndexAlreadyExists(s) => write!(f, "IndexAlreadyExists: {}", s),
            Error::IndexOptionsConflict(s) => write!(f, "IndexOptionsConflict: {}", s),
            Error::IndexKeySpecsConflict(s) => write!(f, "IndexKeySpecsConflict: {}", s),
            Error::DuplicateKey(k) => write!(
                f,
                "DuplicateKey: index '{}' recordId {} key {:?}",
                k.index_name, k.record_id, k.fields
            ),
            Error::NamespaceNotFound(s) => write!(f, "NamespaceNotFound: {}", s),
            Error::CommandNotSupportedOnView(s) => write!(f, "CommandNotSupportedOnView: {}", s),
            Error::NotWritablePrimary(s) => write!(f, "NotWritablePrimary: {}", s),
            Error::BackgroundOperationInProgressForNamespace(s) => {
                write!(f, "BackgroundOperationInProgressForNamespace: {}", s)
            }
            Error::BackgroundOperationInProgressForDatabase(s) => {
                write!(f, "BackgroundOperationInProgressForDatabase: {}", s)
            }
            Error::MovePrimaryInProgress(s) => write!(f, "MovePrimaryInProgress: {}", s),
            Error::WriteConflict => write!(f, "WriteConflict"),
            Error::DataCorruptionDetected(s) => write!(f, "DataCorruptionDetected: {}", s),
            Error::Interrupted(s) => write!(f, "Interrupted: {}", s),
            Error::InterruptedAtShutdown(s) => write!(f, "InterruptedAtShutdown: {}", s),
            Error::BadValue(s) => write!(f, "BadValue: {}", s),
        }
    }
}

impl std::error::Error for Error {}

/// Build the rehydrated key used by [`Error::DuplicateKey`]: field names
/// from the descriptor's key pattern, paired positionally with the
/// ordered key's decoded values.
pub fn rehydrate_duplicate(
    descriptor: &IndexDescriptor,
    key: &OrderedKey,
    record_id: String,
) -> Error {
    let decoded = key.decode_values();
    let fields = descriptor
        .key_pattern
        .0
        .iter()
        .zip(decoded.iter())
        .map(|(field, val)| (field.path.to_string(), format!("{:?}", val)))
        .collect();
    Error::DuplicateKey(RehydratedKey {
        index_name: descriptor.name.clone(),
        fields,
        record_id,
        collation: descriptor.collation.clone(),
    })
}
