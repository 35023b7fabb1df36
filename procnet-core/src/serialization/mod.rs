//! Serialization
//!
//! Networks persist as versioned, hierarchical documents. The
//! [`Serializer`] always writes [`CURRENT_VERSION`]; the [`Deserializer`]
//! upgrades older documents through a [`ConverterChain`] before restoring
//! processors, properties, connections and links.
//!
//! Fatal problems (malformed text, missing or unsupported version, a failed
//! upgrade) abort the load with a [`SerializationError`] before the network
//! is touched. Problems with single elements are reported as
//! [`ElementError`]s to the deserializer's handler and the element is
//! skipped.
//!
//! [`SerializationError`]: crate::error::SerializationError
//! [`ElementError`]: crate::error::ElementError

mod converter;
mod deserializer;
mod document;
mod serializer;

pub use converter::{network_converters, ConverterChain, FnConverter, VersionConverter};
pub use deserializer::Deserializer;
pub use document::{document_version, parse_document, CURRENT_VERSION};
pub use serializer::Serializer;
