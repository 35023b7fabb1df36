//! Reading networks from documents.
//!
//! # How Loading Works
//!
//! 1. The text is parsed into a generic tree. Malformed text aborts.
//! 2. The root `version` is read (missing: abort) and the document is
//!    upgraded through the converter chain (a gap or a newer document:
//!    abort). Nothing in the network has been touched up to this point.
//! 3. With the network locked, processors are created through the factory,
//!    then their properties and metadata are restored, then connections and
//!    links are added. Each element that cannot be restored is reported to
//!    the error handler and skipped.
//! 4. Unlocking flushes a single batch of notifications.

use std::fs;
use std::path::Path;

use indexmap::IndexMap;
use serde_json::Value;

use crate::error::{ElementError, SerializationError};
use crate::network::ProcessorNetwork;
use crate::path::{PortPath, PropertyPath};
use crate::ports::ConnectionElement;
use crate::processor::{ProcessorBase, ProcessorFactory};
use crate::properties::{LinkElement, ValueKind};

use super::converter::{network_converters, ConverterChain};
use super::document::{
    document_version, missing, parse_document, read_metadata, read_value, COMPOSITE_TYPE,
    KEY_CONNECTIONS, KEY_CONTENT, KEY_DISPLAY_NAME, KEY_IDENTIFIER, KEY_LINKS, KEY_METADATA,
    KEY_PROCESSORS, KEY_PROPERTIES, KEY_TYPE,
};

type ErrorHandler<'a> = Box<dyn FnMut(ElementError) + 'a>;

/// Loads documents into a network.
///
/// ```
/// # use std::sync::Arc;
/// # use procnet_core::config::NetworkConfig;
/// # use procnet_core::jobs::ManualPool;
/// # use procnet_core::network::ProcessorNetwork;
/// # use procnet_core::processor::ProcessorFactory;
/// # use procnet_core::serialization::Deserializer;
/// let factory = ProcessorFactory::new();
/// let mut network =
///     ProcessorNetwork::with_pool(Arc::new(ManualPool::new()), NetworkConfig::default());
///
/// let mut errors = Vec::new();
/// Deserializer::new(&factory)
///     .with_handler(|err| errors.push(err))
///     .load(&mut network, r#"{ "version": 3, "processors": [] }"#)
///     .unwrap();
/// assert!(errors.is_empty());
/// ```
pub struct Deserializer<'a> {
    factory: &'a ProcessorFactory,
    converters: ConverterChain,
    handler: ErrorHandler<'a>,
}

impl<'a> Deserializer<'a> {
    /// A deserializer using the built-in converters and a handler that logs
    /// a warning per skipped element.
    pub fn new(factory: &'a ProcessorFactory) -> Self {
        Self {
            factory,
            converters: network_converters(),
            handler: Box::new(|err| tracing::warn!(error = %err, "skipping document element")),
        }
    }

    pub fn with_converters(mut self, converters: ConverterChain) -> Self {
        self.converters = converters;
        self
    }

    /// Route per-element failures to `handler` instead of the log.
    pub fn with_handler(mut self, handler: impl FnMut(ElementError) + 'a) -> Self {
        self.handler = Box::new(handler);
        self
    }

    /// Replace the contents of `network` with the document.
    pub fn load(
        &mut self,
        network: &mut ProcessorNetwork,
        text: &str,
    ) -> Result<(), SerializationError> {
        let document = self.prepare(text)?;
        network.lock();
        network.clear();
        self.restore(network, &document, false);
        network.unlock();
        Ok(())
    }

    /// Add the document's contents to `network`.
    ///
    /// Processors whose identifiers are already taken get a fresh identifier
    /// and their connections and links follow them. Returns the renames as
    /// `old -> new`.
    pub fn append(
        &mut self,
        network: &mut ProcessorNetwork,
        text: &str,
    ) -> Result<IndexMap<String, String>, SerializationError> {
        let document = self.prepare(text)?;
        network.lock();
        let renames = self.restore(network, &document, true);
        network.unlock();
        Ok(renames)
    }

    /// [`load`](Self::load) a document from a file.
    pub fn load_file(
        &mut self,
        network: &mut ProcessorNetwork,
        path: impl AsRef<Path>,
    ) -> Result<(), SerializationError> {
        let text = fs::read_to_string(path.as_ref())?;
        self.load(network, &text)?;
        tracing::debug!(
            path = %path.as_ref().display(),
            processors = network.len(),
            "network loaded"
        );
        Ok(())
    }

    /// Parse and upgrade. Every fatal check happens here.
    fn prepare(&self, text: &str) -> Result<Value, SerializationError> {
        let mut document = parse_document(text)?;
        let version = document_version(&document)?;
        if version < self.converters.target_version() {
            tracing::debug!(
                version,
                target = self.converters.target_version(),
                "document needs upgrading"
            );
        }
        self.converters.upgrade(&mut document, version)?;
        Ok(document)
    }

    fn restore(
        &mut self,
        network: &mut ProcessorNetwork,
        document: &Value,
        append: bool,
    ) -> IndexMap<String, String> {
        network.set_deserializing(true);
        let mut renames = IndexMap::new();

        let processors = elements(document, KEY_PROCESSORS, &mut *self.handler);
        for (index, element) in processors.iter().enumerate() {
            self.restore_processor(network, element, index, append, &mut renames);
        }
        let connections = elements(document, KEY_CONNECTIONS, &mut *self.handler);
        for (index, element) in connections.iter().enumerate() {
            match serde_json::from_value::<ConnectionElement>(element.clone()) {
                Ok(connection) => {
                    let result = remap_port(&connection.outport, &renames).and_then(|outport| {
                        let inport = remap_port(&connection.inport, &renames)?;
                        network.add_connection(&outport, &inport)
                    });
                    if let Err(err) = result {
                        (self.handler)(err.into());
                    }
                }
                Err(err) => {
                    (self.handler)(missing(&format!("connection #{index}"), &err.to_string()))
                }
            }
        }
        let links = elements(document, KEY_LINKS, &mut *self.handler);
        for (index, element) in links.iter().enumerate() {
            match serde_json::from_value::<LinkElement>(element.clone()) {
                Ok(link) => {
                    let result = remap_property(&link.source, &renames).and_then(|source| {
                        let destination = remap_property(&link.destination, &renames)?;
                        network.add_link(&source, &destination)
                    });
                    if let Err(err) = result {
                        (self.handler)(err.into());
                    }
                }
                Err(err) => {
                    (self.handler)(missing(&format!("link #{index}"), &err.to_string()))
                }
            }
        }

        network.set_deserializing(false);
        renames
    }

    fn restore_processor(
        &mut self,
        network: &mut ProcessorNetwork,
        element: &Value,
        index: usize,
        append: bool,
        renames: &mut IndexMap<String, String>,
    ) {
        let name = format!("processor #{index}");
        let Some(identifier) = element.get(KEY_IDENTIFIER).and_then(Value::as_str) else {
            (self.handler)(missing(&name, KEY_IDENTIFIER));
            return;
        };
        let Some(class) = element.get(KEY_TYPE).and_then(Value::as_str) else {
            (self.handler)(missing(identifier, KEY_TYPE));
            return;
        };

        let target = if append {
            network.unique_identifier(identifier)
        } else {
            identifier.to_string()
        };
        let Some(mut processor) = self.factory.create(class, &target) else {
            (self.handler)(ElementError::UnknownProcessorType {
                identifier: identifier.to_string(),
                class: class.to_string(),
            });
            return;
        };

        let base = processor.base_mut();
        if let Some(display_name) = element.get(KEY_DISPLAY_NAME).and_then(Value::as_str) {
            base.set_display_name(display_name);
        }
        read_metadata(
            element.get(KEY_METADATA),
            base.metadata_mut(),
            &target,
            &mut *self.handler,
        );
        if let Some(properties) = element.get(KEY_PROPERTIES).and_then(Value::as_array) {
            self.restore_properties(base, properties, None);
        }

        match network.add_boxed_processor(processor) {
            Ok(()) => {
                if target != identifier {
                    tracing::debug!(
                        from = %identifier,
                        to = %target,
                        "renamed appended processor"
                    );
                    renames.insert(identifier.to_string(), target);
                }
            }
            Err(err) => (self.handler)(err.into()),
        }
    }

    fn restore_properties(
        &mut self,
        base: &mut ProcessorBase,
        elements: &[Value],
        parent: Option<&str>,
    ) {
        for element in elements {
            let Some(identifier) = element.get(KEY_IDENTIFIER).and_then(Value::as_str) else {
                let owner = match parent {
                    Some(parent) => format!("{}.{parent}", base.identifier()),
                    None => base.identifier().to_string(),
                };
                (self.handler)(missing(&owner, KEY_IDENTIFIER));
                continue;
            };
            let relative = match parent {
                Some(parent) => format!("{parent}.{identifier}"),
                None => identifier.to_string(),
            };
            let path = format!("{}.{relative}", base.identifier());
            let type_name = element.get(KEY_TYPE).and_then(Value::as_str).unwrap_or_default();

            let Some(property) = base.property_mut(&relative) else {
                (self.handler)(ElementError::UnknownProperty { path });
                continue;
            };
            let expected = property.kind().map_or(COMPOSITE_TYPE, ValueKind::name);
            if type_name != expected {
                (self.handler)(ElementError::PropertyTypeMismatch {
                    path,
                    expected: expected.to_string(),
                    found: type_name.to_string(),
                });
                continue;
            }

            read_metadata(
                element.get(KEY_METADATA),
                property.metadata_mut(),
                &path,
                &mut *self.handler,
            );
            if property.is_composite() {
                if let Some(children) = element.get(KEY_PROPERTIES).and_then(Value::as_array) {
                    self.restore_properties(base, children, Some(&relative));
                }
                continue;
            }

            if element.get(KEY_CONTENT).is_none() {
                (self.handler)(missing(&path, KEY_CONTENT));
                continue;
            }
            match read_value(element, &path) {
                Ok(value) => {
                    if let Err(err) = property.set(value) {
                        (self.handler)(err.into());
                    }
                }
                Err(err) => (self.handler)(err),
            }
        }
    }
}

/// The array under `key`, or nothing. A non-array is reported.
fn elements<'d>(
    document: &'d Value,
    key: &str,
    handler: &mut dyn FnMut(ElementError),
) -> &'d [Value] {
    match document.get(key) {
        None => &[],
        Some(value) => match value.as_array() {
            Some(items) => items,
            None => {
                handler(missing("network", key));
                &[]
            }
        },
    }
}

fn remap_port(path: &str, renames: &IndexMap<String, String>) -> crate::error::Result<String> {
    let mut path: PortPath = path.parse()?;
    if let Some(renamed) = renames.get(&path.processor) {
        path.processor = renamed.clone();
    }
    Ok(path.to_string())
}

fn remap_property(
    path: &str,
    renames: &IndexMap<String, String>,
) -> crate::error::Result<String> {
    let path: PropertyPath = path.parse()?;
    Ok(match renames.get(&path.processor) {
        Some(renamed) => path.with_processor(renamed.clone()).to_string(),
        None => path.to_string(),
    })
}
