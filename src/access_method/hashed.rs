use std::sync::Arc;

use crate::catalog::descriptor::IndexDescriptor;
use crate::sdi::SortedDataInterface;

use super::{AccessMethod, StandardAccessMethod};

/// Hashed access method: each document contributes exactly one key per
/// indexed field, so it is never multikey. Key shaping
/// lives entirely in `key_encoder::encode`'s `IndexKind::Hashed` arm.
pub fn new_hashed(descriptor: IndexDescriptor, sdi: Arc<dyn SortedDataInterface>) -> Box<dyn AccessMethod> {
    Box::new(StandardAccessMethod::new(descriptor, sdi))
}
