//! Document layout shared by the serializer and deserializer.
//!
//! ```text
//! {
//!   "version": 3,
//!   "processors": [
//!     { "identifier": "volume", "type": "org.Source", "display_name": "Volume",
//!       "properties": [
//!         { "identifier": "size", "type": "int", "content": "64" },
//!         { "identifier": "camera", "type": "composite", "properties": [ ... ] }
//!       ],
//!       "metadata": { "position": { "type": "vec2", "content": "10 20" } } }
//!   ],
//!   "connections": [ { "outport": "volume.out", "inport": "render.in" } ],
//!   "links": [ { "source": "volume.size", "destination": "render.size" } ]
//! }
//! ```
//!
//! Leaves carry their value as typed, string-rendered content. Optional keys
//! (`display_name` when equal to the identifier, empty `metadata`) are left
//! out so that documents stay stable across save/load cycles.

use serde_json::{Map, Value};

use crate::error::{ElementError, SerializationError};
use crate::metadata::MetaDataMap;
use crate::properties::{PropertyValue, ValueKind};

/// Version written by this build. Older documents are upgraded on load.
pub const CURRENT_VERSION: u32 = 3;

pub(crate) const KEY_VERSION: &str = "version";
pub(crate) const KEY_PROCESSORS: &str = "processors";
pub(crate) const KEY_CONNECTIONS: &str = "connections";
pub(crate) const KEY_LINKS: &str = "links";
pub(crate) const KEY_IDENTIFIER: &str = "identifier";
pub(crate) const KEY_TYPE: &str = "type";
pub(crate) const KEY_DISPLAY_NAME: &str = "display_name";
pub(crate) const KEY_PROPERTIES: &str = "properties";
pub(crate) const KEY_CONTENT: &str = "content";
pub(crate) const KEY_METADATA: &str = "metadata";

/// `type` of a property element that holds child properties.
pub(crate) const COMPOSITE_TYPE: &str = "composite";

/// Parse document text into the generic tree.
pub fn parse_document(text: &str) -> Result<Value, SerializationError> {
    Ok(serde_json::from_str(text)?)
}

/// Read the root version attribute.
pub fn document_version(document: &Value) -> Result<u32, SerializationError> {
    document
        .get(KEY_VERSION)
        .and_then(Value::as_u64)
        .and_then(|version| u32::try_from(version).ok())
        .ok_or(SerializationError::MissingVersion)
}

/// A typed leaf: `{ "type": kind, "content": rendered }`.
pub(crate) fn value_element(value: &PropertyValue) -> Map<String, Value> {
    let mut element = Map::new();
    element.insert(KEY_TYPE.into(), Value::from(value.kind().name()));
    element.insert(KEY_CONTENT.into(), Value::from(value.render()));
    element
}

/// Metadata as an object keyed by metadata key. `None` when empty.
pub(crate) fn metadata_element(metadata: &MetaDataMap) -> Option<Value> {
    if metadata.is_empty() {
        return None;
    }
    let entries = metadata
        .iter()
        .map(|(key, value)| (key.to_string(), Value::Object(value_element(value))))
        .collect();
    Some(Value::Object(entries))
}

/// Read a typed leaf back. `path` names the element in errors.
pub(crate) fn read_value(element: &Value, path: &str) -> Result<PropertyValue, ElementError> {
    let type_name = element
        .get(KEY_TYPE)
        .and_then(Value::as_str)
        .ok_or_else(|| missing(path, KEY_TYPE))?;
    let kind = ValueKind::from_name(type_name).ok_or_else(|| ElementError::InvalidValue {
        path: path.to_string(),
        kind: type_name.to_string(),
        content: String::new(),
    })?;
    let content = element
        .get(KEY_CONTENT)
        .and_then(Value::as_str)
        .ok_or_else(|| missing(path, KEY_CONTENT))?;
    PropertyValue::parse(kind, content).ok_or_else(|| ElementError::InvalidValue {
        path: path.to_string(),
        kind: kind.name().to_string(),
        content: content.to_string(),
    })
}

/// Load a metadata element into `metadata`, reporting bad entries.
pub(crate) fn read_metadata(
    element: Option<&Value>,
    metadata: &mut MetaDataMap,
    owner: &str,
    handler: &mut dyn FnMut(ElementError),
) {
    let Some(element) = element else {
        return;
    };
    let Some(entries) = element.as_object() else {
        handler(missing(owner, KEY_METADATA));
        return;
    };
    for (key, entry) in entries {
        match read_value(entry, &format!("{owner}#{key}")) {
            Ok(value) => metadata.set(key.clone(), value),
            Err(err) => handler(err),
        }
    }
}

pub(crate) fn missing(element: &str, field: &str) -> ElementError {
    ElementError::MissingField {
        element: element.to_string(),
        field: field.to_string(),
    }
}
