//! Dotted paths addressing ports and properties.
//!
//! Ports are addressed as `processor.port` and properties as
//! `processor.property[.child...]`. Identifiers themselves can never contain
//! a dot, which keeps every path unambiguous.

use std::fmt;
use std::str::FromStr;

use crate::error::NetworkError;

/// Check that `identifier` can name a processor, port or property.
pub fn validate_identifier(identifier: &str) -> Result<(), NetworkError> {
    if identifier.is_empty() || identifier.contains('.') {
        return Err(NetworkError::InvalidIdentifier(identifier.to_string()));
    }
    Ok(())
}

/// Address of a port: `processor.port`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PortPath {
    pub processor: String,
    pub port: String,
}

impl PortPath {
    pub fn new(processor: impl Into<String>, port: impl Into<String>) -> Self {
        Self {
            processor: processor.into(),
            port: port.into(),
        }
    }
}

impl fmt::Display for PortPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.processor, self.port)
    }
}

impl FromStr for PortPath {
    type Err = NetworkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || NetworkError::InvalidPath(s.to_string());
        let (processor, port) = s.split_once('.').ok_or_else(invalid)?;
        if processor.is_empty() || port.is_empty() || port.contains('.') {
            return Err(invalid());
        }
        Ok(Self::new(processor, port))
    }
}

/// Address of a property: `processor.property[.child...]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PropertyPath {
    pub processor: String,
    /// Identifiers from the top-level property down to the addressed one.
    pub property: Vec<String>,
}

impl PropertyPath {
    pub fn new<I, S>(processor: impl Into<String>, property: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            processor: processor.into(),
            property: property.into_iter().map(Into::into).collect(),
        }
    }

    /// The property part of the path without the processor, e.g. `camera.fov`.
    pub fn property_path(&self) -> String {
        self.property.join(".")
    }

    /// The same property path on another processor.
    pub fn with_processor(&self, processor: impl Into<String>) -> Self {
        Self {
            processor: processor.into(),
            property: self.property.clone(),
        }
    }
}

impl fmt::Display for PropertyPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.processor, self.property_path())
    }
}

impl FromStr for PropertyPath {
    type Err = NetworkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut segments = s.split('.');
        let processor = segments.next().unwrap_or_default();
        let property: Vec<String> = segments.map(str::to_string).collect();
        if processor.is_empty() || property.is_empty() || property.iter().any(String::is_empty) {
            return Err(NetworkError::InvalidPath(s.to_string()));
        }
        Ok(Self {
            processor: processor.to_string(),
            property,
        })
    }
}
