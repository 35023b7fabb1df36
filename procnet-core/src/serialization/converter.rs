//! Document Converters
//!
//! Documents written by older versions are upgraded before they are read.
//! Each [`VersionConverter`] upgrades a document by exactly one version, and
//! a [`ConverterChain`] runs every step between the document's version and
//! the current one, in ascending order, on the generic document tree.
//!
//! # Format History
//!
//! - **1 → 2**: connection elements renamed their keys `src`/`dst` to
//!   `outport`/`inport`.
//! - **2 → 3**: value property elements renamed their `value` key to
//!   `content`, including properties nested in composites.

use std::collections::BTreeMap;
use std::fmt;

use serde_json::Value;

use crate::error::SerializationError;

use super::document::{CURRENT_VERSION, KEY_VERSION};

/// One upgrade step, from [`source_version`](Self::source_version) to the
/// next version.
pub trait VersionConverter {
    fn source_version(&self) -> u32;

    fn convert(&self, document: &mut Value) -> Result<(), String>;
}

/// A converter backed by a closure.
pub struct FnConverter<F> {
    source_version: u32,
    convert: F,
}

impl<F> FnConverter<F>
where
    F: Fn(&mut Value) -> Result<(), String>,
{
    pub fn new(source_version: u32, convert: F) -> Self {
        Self {
            source_version,
            convert,
        }
    }
}

impl<F> VersionConverter for FnConverter<F>
where
    F: Fn(&mut Value) -> Result<(), String>,
{
    fn source_version(&self) -> u32 {
        self.source_version
    }

    fn convert(&self, document: &mut Value) -> Result<(), String> {
        (self.convert)(document)
    }
}

/// Ordered set of converters upgrading documents to a target version.
pub struct ConverterChain {
    target_version: u32,
    converters: BTreeMap<u32, Box<dyn VersionConverter>>,
}

impl ConverterChain {
    /// An empty chain upgrading to `target_version`.
    pub fn new(target_version: u32) -> Self {
        Self {
            target_version,
            converters: BTreeMap::new(),
        }
    }

    pub fn target_version(&self) -> u32 {
        self.target_version
    }

    /// Register a converter, replacing any earlier one for the same version.
    pub fn register(&mut self, converter: impl VersionConverter + 'static) -> &mut Self {
        self.converters
            .insert(converter.source_version(), Box::new(converter));
        self
    }

    /// Register a closure converting from `source_version`.
    pub fn register_fn<F>(&mut self, source_version: u32, convert: F) -> &mut Self
    where
        F: Fn(&mut Value) -> Result<(), String> + 'static,
    {
        self.register(FnConverter::new(source_version, convert))
    }

    /// Upgrade `document` from `version` to the target version.
    ///
    /// Fails without running any converter if a step is missing or the
    /// document is newer than the target.
    pub fn upgrade(&self, document: &mut Value, version: u32) -> Result<u32, SerializationError> {
        if version > self.target_version {
            return Err(SerializationError::UnsupportedVersion {
                found: version,
                supported: self.target_version,
            });
        }
        let gap = (version..self.target_version).find(|v| !self.converters.contains_key(v));
        if let Some(missing) = gap {
            return Err(SerializationError::MissingConverter(missing));
        }

        for (&from, converter) in self.converters.range(version..self.target_version) {
            tracing::debug!(from, to = from + 1, "upgrading document");
            converter
                .convert(document)
                .map_err(|message| SerializationError::Conversion {
                    version: from,
                    message,
                })?;
            if let Some(root) = document.as_object_mut() {
                root.insert(KEY_VERSION.to_string(), Value::from(from + 1));
            }
        }
        Ok(self.target_version)
    }
}

impl fmt::Debug for ConverterChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConverterChain")
            .field("target_version", &self.target_version)
            .field("steps", &self.converters.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl Default for ConverterChain {
    fn default() -> Self {
        network_converters()
    }
}

/// The converters for the network document format itself.
pub fn network_converters() -> ConverterChain {
    let mut chain = ConverterChain::new(CURRENT_VERSION);
    chain.register_fn(1, rename_connection_keys);
    chain.register_fn(2, rename_property_values);
    chain
}

fn rename_connection_keys(document: &mut Value) -> Result<(), String> {
    let Some(connections) = document.get_mut("connections") else {
        return Ok(());
    };
    let connections = connections
        .as_array_mut()
        .ok_or_else(|| "'connections' is not a list".to_string())?;
    for connection in connections {
        rename_key(connection, "src", "outport");
        rename_key(connection, "dst", "inport");
    }
    Ok(())
}

fn rename_property_values(document: &mut Value) -> Result<(), String> {
    let Some(processors) = document.get_mut("processors") else {
        return Ok(());
    };
    let processors = processors
        .as_array_mut()
        .ok_or_else(|| "'processors' is not a list".to_string())?;
    for processor in processors {
        if let Some(properties) = processor.get_mut("properties").and_then(Value::as_array_mut) {
            rename_in_properties(properties);
        }
    }
    Ok(())
}

fn rename_in_properties(properties: &mut [Value]) {
    for property in properties {
        rename_key(property, "value", "content");
        if let Some(children) = property.get_mut("properties").and_then(Value::as_array_mut) {
            rename_in_properties(children);
        }
    }
}

fn rename_key(element: &mut Value, from: &str, to: &str) {
    if let Some(object) = element.as_object_mut() {
        if let Some(value) = object.remove(from) {
            object.insert(to.to_string(), value);
        }
    }
}
