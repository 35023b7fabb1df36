//! Invalidation Levels
//!
//! Every change in the network carries a severity. A property that only
//! affects what a processor writes to its outports raises `InvalidOutput`;
//! a property that requires reallocating internal state (shaders, buffers,
//! lookup tables) raises `InvalidResources`.
//!
//! Levels are ordered so that combining two changes is just `max`.

use serde::{Deserialize, Serialize};

/// Severity of a change, ordered `Valid < InvalidOutput < InvalidResources`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvalidationLevel {
    /// Nothing needs to be recomputed.
    #[default]
    Valid,

    /// The outputs must be recomputed from the current inputs.
    InvalidOutput,

    /// Internal resources must be rebuilt before outputs are recomputed.
    InvalidResources,
}

impl InvalidationLevel {
    /// Check if this level requires any work.
    pub fn is_invalid(self) -> bool {
        self != InvalidationLevel::Valid
    }

    /// Combine two levels, keeping the more severe one.
    pub fn combine(self, other: InvalidationLevel) -> InvalidationLevel {
        self.max(other)
    }
}
