use std::sync::Arc;

use crate::catalog::descriptor::IndexDescriptor;
use crate::sdi::SortedDataInterface;

use super::{AccessMethod, StandardAccessMethod};

/// Ordered (b-tree) access method: the default index kind.
pub fn new_btree(descriptor: IndexDescriptor, sdi: Arc<dyn SortedDataInterface>) -> Box<dyn AccessMethod> {
    Box::new(StandardAccessMethod::new(descriptor, sdi))
}
