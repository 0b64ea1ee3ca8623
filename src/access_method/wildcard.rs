use std::sync::Arc;

use crate::catalog::descriptor::IndexDescriptor;
use crate::sdi::SortedDataInterface;

use super::{AccessMethod, StandardAccessMethod};

/// Wildcard access method: one shared SDI holding every projected
/// path's keys, each prefixed with its dotted path. Path
/// expansion itself lives in `key_encoder::encode`'s `IndexKind::Wildcard`
/// arm; this is the same dispatch as `btree`/`hashed`.
pub fn new_wildcard(descriptor: IndexDescriptor, sdi: Arc<dyn SortedDataInterface>) -> Box<dyn AccessMethod> {
    Box::new(StandardAccessMethod::new(descriptor, sdi))
}
