//! Dotted field paths, as used by key patterns, partial filters, and
//! wildcard projections.

use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FieldPath {
    dotted: String,
    components: Vec<String>,
}

impl FieldPath {
    pub fn from_dotted(s: &str) -> FieldPath {
        let components = s.split('.').map(|c| c.to_string()).collect();
        FieldPath { dotted: s.to_string(), components }
    }

    pub fn components(&self) -> &[String] {
        &self.components
    }

    pub fn as_str(&self) -> &str {
        &self.dotted
    }

    /// True if `self` and `other` diverge at some component — i.e. they
    /// are not a prefix of one another and not equal. Used to test
    /// whether a wildcard projection path should accept a candidate.
    pub fn is_prefix_of(&self, other: &FieldPath) -> bool {
        self.components.len() <= other.components.len()
            && self.components.iter().zip(other.components.iter()).all(|(a, b)| a == b)
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.dotted)
    }
}

impl From<&str> for FieldPath {
    fn from(s: &str) -> FieldPath {
        FieldPath::from_dotted(s)
    }
}
