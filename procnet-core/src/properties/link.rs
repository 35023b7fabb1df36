//! Property links.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::path::PropertyPath;

/// A directed link: changes to `source` are pushed into `destination`.
///
/// A bidirectional link is two links, one in each direction.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PropertyLink {
    pub source: PropertyPath,
    pub destination: PropertyPath,
}

impl PropertyLink {
    pub fn new(source: PropertyPath, destination: PropertyPath) -> Self {
        Self {
            source,
            destination,
        }
    }

    /// The link going the other way.
    pub fn reversed(&self) -> Self {
        Self::new(self.destination.clone(), self.source.clone())
    }

    /// Check if the link touches the given processor at either end.
    pub fn involves(&self, processor: &str) -> bool {
        self.source.processor == processor || self.destination.processor == processor
    }
}

impl fmt::Display for PropertyLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.source, self.destination)
    }
}

/// Persisted form of a link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct LinkElement {
    pub source: String,
    pub destination: String,
}

impl From<&PropertyLink> for LinkElement {
    fn from(link: &PropertyLink) -> Self {
        Self {
            source: link.source.to_string(),
            destination: link.destination.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reversed_swaps_ends() {
        let link = PropertyLink::new(
            "a.x".parse().unwrap(),
            "b.y".parse().unwrap(),
        );
        let back = link.reversed();
        assert_eq!(back.to_string(), "b.y -> a.x");
        assert!(link.involves("a"));
        assert!(link.involves("b"));
        assert!(!link.involves("c"));
    }
}
