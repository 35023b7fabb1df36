//! Port connections.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::path::PortPath;

/// A directed edge from an outport to an inport.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PortConnection {
    pub outport: PortPath,
    pub inport: PortPath,
}

impl PortConnection {
    pub fn new(outport: PortPath, inport: PortPath) -> Self {
        Self { outport, inport }
    }

    /// Check if the connection touches the given processor at either end.
    pub fn involves(&self, processor: &str) -> bool {
        self.outport.processor == processor || self.inport.processor == processor
    }
}

impl fmt::Display for PortConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.outport, self.inport)
    }
}

/// Persisted form of a connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct ConnectionElement {
    pub outport: String,
    pub inport: String,
}

impl From<&PortConnection> for ConnectionElement {
    fn from(connection: &PortConnection) -> Self {
        Self {
            outport: connection.outport.to_string(),
            inport: connection.inport.to_string(),
        }
    }
}
