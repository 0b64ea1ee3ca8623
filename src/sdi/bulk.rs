use crate::error::Result;
use crate::key_encoder::OrderedKey;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DupPolicy {
    Allow,
    Reject,
}

/// One-shot bulk-load sink: keys must arrive in ascending
/// full-byte-string order and the implementation packs them without the
/// per-insert bookkeeping a live `insert` call needs.
pub trait BulkBuilder: Send {
    /// `key` must be `>` the previous key passed to this call; debug
    /// builds assert it.
    fn add(&mut self, key: OrderedKey) -> Result<()>;

    fn finish(self: Box<Self>) -> Result<()>;
}
