//! Procnet Core
//!
//! This crate provides the runtime of a dataflow processor network: a
//! directed graph of processors connected through typed ports, whose
//! parameters are typed properties that may be linked across processors.
//! It implements:
//!
//! - Network topology (processors, port connections, property links)
//! - Change propagation through links with cycle protection
//! - Invalidation and batched change notifications
//! - Background jobs on a shared worker pool with progress and cancellation
//! - Versioned persistence with a converter chain for older documents
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `network`: The processor network, its mutation API and evaluation
//! - `processor`: The processor trait, shared processor state and the factory
//! - `ports`: Typed inports/outports and connections
//! - `properties`: Typed values, properties and links
//! - `jobs`: Background work, worker pools and the dispatch queue
//! - `graph`: Dependency graph used for ordering and cycle checks
//! - `serialization`: Document serializer, deserializer and converters
//!
//! # Threading Model
//!
//! All network mutation and every `process()` call happen on one evaluation
//! thread. Background tasks run on a shared worker pool and hand their
//! results back through a queue that the evaluation thread drains with
//! [`ProcessorNetwork::poll`](network::ProcessorNetwork::poll).
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//!
//! use procnet_core::config::NetworkConfig;
//! use procnet_core::error::ProcessError;
//! use procnet_core::jobs::ManualPool;
//! use procnet_core::network::ProcessorNetwork;
//! use procnet_core::ports::{Inport, Outport};
//! use procnet_core::processor::{Processor, ProcessorBase};
//! use procnet_core::properties::Property;
//!
//! struct Number {
//!     base: ProcessorBase,
//! }
//!
//! impl Processor for Number {
//!     fn class_identifier(&self) -> &str {
//!         "org.procnet.Number"
//!     }
//!     fn base(&self) -> &ProcessorBase {
//!         &self.base
//!     }
//!     fn base_mut(&mut self) -> &mut ProcessorBase {
//!         &mut self.base
//!     }
//!     fn process(&mut self) -> Result<(), ProcessError> {
//!         let value = self.base.value::<f64>("value").unwrap_or_default();
//!         self.base
//!             .set_output("outport", value)
//!             .map_err(|e| ProcessError::failed(e.to_string()))
//!     }
//! }
//!
//! struct Print {
//!     base: ProcessorBase,
//! }
//!
//! impl Processor for Print {
//!     fn class_identifier(&self) -> &str {
//!         "org.procnet.Print"
//!     }
//!     fn base(&self) -> &ProcessorBase {
//!         &self.base
//!     }
//!     fn base_mut(&mut self) -> &mut ProcessorBase {
//!         &mut self.base
//!     }
//!     fn process(&mut self) -> Result<(), ProcessError> {
//!         let value = self.base.input::<f64>("inport").ok_or(ProcessError::MissingInput("inport".into()))?;
//!         println!("{value}");
//!         Ok(())
//!     }
//! }
//!
//! let mut network = ProcessorNetwork::with_pool(Arc::new(ManualPool::new()), NetworkConfig::default());
//! network.add_processor(Number {
//!     base: ProcessorBase::new("number")
//!         .with_outport(Outport::of::<f64>("outport"))
//!         .with_property(Property::new("value", "Value", 2.0)),
//! })?;
//! network.add_processor(Print {
//!     base: ProcessorBase::new("print").with_inport(Inport::of::<f64>("inport")),
//! })?;
//! network.add_connection("number.outport", "print.inport")?;
//!
//! let report = network.evaluate();
//! assert_eq!(report.processed, vec!["number", "print"]);
//!
//! network.set_property("number.value", 5.0)?;
//! assert!(!network.processor("print").unwrap().base().is_valid());
//! # Ok::<(), procnet_core::error::NetworkError>(())
//! ```

pub mod config;
pub mod error;
pub mod graph;
pub mod invalidation;
pub mod jobs;
pub mod metadata;
pub mod network;
pub mod observer;
pub mod path;
pub mod ports;
pub mod processor;
pub mod properties;
pub mod serialization;

// Lets the test fixtures name the crate the same way from inside and out.
#[cfg(test)]
extern crate self as procnet_core;

#[cfg(test)]
pub(crate) mod testing;

pub use config::NetworkConfig;
pub use error::{ElementError, NetworkError, ProcessError, SerializationError};
pub use invalidation::InvalidationLevel;
pub use network::{Evaluator, NetworkObserver, ProcessorNetwork};
pub use processor::{Processor, ProcessorBase, ProcessorFactory, ProcessorStatus};
pub use properties::{Property, PropertyValue};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
