//! Processors
//!
//! A processor is a node of the network: it reads its inports, computes, and
//! writes its outports. Concrete processors implement [`Processor`] and embed
//! a [`ProcessorBase`] for the state the network manages.

mod base;
mod factory;

use std::any::Any;
use std::fmt;

use crate::error::ProcessError;

pub use base::ProcessorBase;
pub use factory::ProcessorFactory;

/// Downcasting support for processors.
pub trait AsAny: Any {
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// A node of the processor network.
///
/// # Example
///
/// ```
/// use procnet_core::error::ProcessError;
/// use procnet_core::ports::Outport;
/// use procnet_core::processor::{Processor, ProcessorBase};
/// use procnet_core::properties::Property;
///
/// struct Constant {
///     base: ProcessorBase,
/// }
///
/// impl Processor for Constant {
///     fn class_identifier(&self) -> &str {
///         "org.procnet.Constant"
///     }
///     fn base(&self) -> &ProcessorBase {
///         &self.base
///     }
///     fn base_mut(&mut self) -> &mut ProcessorBase {
///         &mut self.base
///     }
///     fn process(&mut self) -> Result<(), ProcessError> {
///         let value = self.base.value::<f64>("value").unwrap_or_default();
///         self.base.set_output("outport", value).map_err(|e| ProcessError::failed(e.to_string()))
///     }
/// }
///
/// let constant = Constant {
///     base: ProcessorBase::new("constant")
///         .with_outport(Outport::of::<f64>("outport"))
///         .with_property(Property::new("value", "Value", 1.0)),
/// };
/// assert_eq!(constant.identifier(), "constant");
/// ```
pub trait Processor: AsAny {
    /// Type name used to recreate the processor from a document.
    fn class_identifier(&self) -> &str;

    fn base(&self) -> &ProcessorBase;

    fn base_mut(&mut self) -> &mut ProcessorBase;

    /// Compute outputs from inputs and properties.
    ///
    /// Runs on the evaluation thread. Slow work belongs in a background job
    /// submitted through [`ProcessorBase::jobs_mut`].
    fn process(&mut self) -> Result<(), ProcessError>;

    /// Rebuild internal resources. Called before `process()` when the
    /// processor was invalidated at `InvalidResources`.
    fn initialize_resources(&mut self) -> Result<(), ProcessError> {
        Ok(())
    }

    /// Progress of the newest background job changed.
    fn on_progress(&mut self, _progress: f32) {}

    /// One of this processor's properties changed. `path` is relative to the
    /// processor, e.g. `camera.fov`.
    fn property_changed(&mut self, _path: &str) {}

    fn identifier(&self) -> &str {
        self.base().identifier()
    }
}

impl dyn Processor {
    pub fn downcast_ref<T: Processor>(&self) -> Option<&T> {
        self.as_any().downcast_ref::<T>()
    }

    pub fn downcast_mut<T: Processor>(&mut self) -> Option<&mut T> {
        self.as_any_mut().downcast_mut::<T>()
    }
}

impl fmt::Debug for dyn Processor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Processor")
            .field("class", &self.class_identifier())
            .field("identifier", &self.identifier())
            .finish()
    }
}

/// Readiness of a processor as seen by an evaluation driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessorStatus {
    /// All required inputs are available.
    Ready,
    /// Some required input is missing or not yet valid.
    NotReady(String),
    /// The last computation failed.
    Error(String),
}

impl ProcessorStatus {
    pub fn is_ready(&self) -> bool {
        matches!(self, ProcessorStatus::Ready)
    }
}

impl fmt::Display for ProcessorStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProcessorStatus::Ready => f.write_str("ready"),
            ProcessorStatus::NotReady(reason) => write!(f, "not ready: {reason}"),
            ProcessorStatus::Error(message) => write!(f, "error: {message}"),
        }
    }
}
