use crate::key_encoder::OrderedKey;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    Forward,
    Reverse,
}

/// A positionable scan over one SDI's entries, ordered by full byte
/// string (user key then RecordId), the way a sorted-index cursor walks
/// leaf blocks.
pub trait SdiCursor {
    /// Position at (or just past, per `direction`) `user_key` and
    /// return the first matching entry, if any.
    fn seek(&mut self, user_key: &[u8]) -> Option<OrderedKey>;

    fn next(&mut self) -> Option<OrderedKey>;
}
