//! Writing networks to documents.

use std::fs;
use std::path::Path;

use serde_json::{Map, Value};

use crate::error::SerializationError;
use crate::network::ProcessorNetwork;
use crate::ports::ConnectionElement;
use crate::processor::Processor;
use crate::properties::{LinkElement, Property};

use super::document::{
    metadata_element, value_element, COMPOSITE_TYPE, CURRENT_VERSION, KEY_CONNECTIONS,
    KEY_DISPLAY_NAME, KEY_IDENTIFIER, KEY_LINKS, KEY_METADATA, KEY_PROCESSORS, KEY_PROPERTIES,
    KEY_TYPE, KEY_VERSION,
};

/// Writes the current version of the document format.
///
/// Output is deterministic: the same network always produces the same bytes.
#[derive(Debug, Clone, Copy)]
pub struct Serializer {
    pretty: bool,
}

impl Default for Serializer {
    fn default() -> Self {
        Self { pretty: true }
    }
}

impl Serializer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Write compact text instead of indented text.
    pub fn compact(mut self) -> Self {
        self.pretty = false;
        self
    }

    /// Build the document tree for a network.
    pub fn to_value(&self, network: &ProcessorNetwork) -> Result<Value, SerializationError> {
        let processors = network.processors().map(processor_element).collect();
        let connections = network
            .connections()
            .map(|connection| serde_json::to_value(ConnectionElement::from(connection)))
            .collect::<Result<Vec<_>, _>>()?;
        let links = network
            .links()
            .map(|link| serde_json::to_value(LinkElement::from(link)))
            .collect::<Result<Vec<_>, _>>()?;

        let mut root = Map::new();
        root.insert(KEY_VERSION.into(), Value::from(CURRENT_VERSION));
        root.insert(KEY_PROCESSORS.into(), Value::Array(processors));
        root.insert(KEY_CONNECTIONS.into(), Value::Array(connections));
        root.insert(KEY_LINKS.into(), Value::Array(links));
        Ok(Value::Object(root))
    }

    /// Serialize a network to document text.
    pub fn serialize(&self, network: &ProcessorNetwork) -> Result<String, SerializationError> {
        let document = self.to_value(network)?;
        let text = if self.pretty {
            serde_json::to_string_pretty(&document)?
        } else {
            serde_json::to_string(&document)?
        };
        Ok(text)
    }

    /// Serialize a network into a file.
    pub fn save(
        &self,
        network: &ProcessorNetwork,
        path: impl AsRef<Path>,
    ) -> Result<(), SerializationError> {
        let text = self.serialize(network)?;
        fs::write(path.as_ref(), text)?;
        tracing::debug!(
            path = %path.as_ref().display(),
            processors = network.len(),
            "network saved"
        );
        Ok(())
    }
}

fn processor_element(processor: &(dyn Processor + 'static)) -> Value {
    let base = processor.base();
    let mut element = Map::new();
    element.insert(KEY_IDENTIFIER.into(), Value::from(base.identifier()));
    element.insert(KEY_TYPE.into(), Value::from(processor.class_identifier()));
    if base.display_name() != base.identifier() {
        element.insert(KEY_DISPLAY_NAME.into(), Value::from(base.display_name()));
    }
    element.insert(
        KEY_PROPERTIES.into(),
        Value::Array(base.properties().iter().map(property_element).collect()),
    );
    if let Some(metadata) = metadata_element(base.metadata()) {
        element.insert(KEY_METADATA.into(), metadata);
    }
    Value::Object(element)
}

fn property_element(property: &Property) -> Value {
    let mut element = match property.value() {
        Some(value) => value_element(value),
        None => {
            let mut element = Map::new();
            element.insert(KEY_TYPE.into(), Value::from(COMPOSITE_TYPE));
            element.insert(
                KEY_PROPERTIES.into(),
                Value::Array(property.children().iter().map(property_element).collect()),
            );
            element
        }
    };
    element.insert(KEY_IDENTIFIER.into(), Value::from(property.identifier()));
    if let Some(metadata) = metadata_element(property.metadata()) {
        element.insert(KEY_METADATA.into(), metadata);
    }
    Value::Object(element)
}
