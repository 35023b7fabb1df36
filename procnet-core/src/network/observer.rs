//! Network observers.

use crate::path::PropertyPath;
use crate::ports::PortConnection;
use crate::properties::{PropertyLink, PropertyValue};

/// Receives notifications about a [`ProcessorNetwork`](super::ProcessorNetwork).
///
/// All callbacks run on the evaluation thread, synchronously, in
/// registration order. Every method has an empty default so observers only
/// implement what they care about.
///
/// Invalidation begin/end callbacks never nest: a burst of changes, or a
/// whole locked batch, produces exactly one begin/end pair.
pub trait NetworkObserver: Send + Sync {
    fn on_processor_added(&self, _processor: &str) {}

    /// Fired before any connection or link of the processor is removed.
    fn on_processor_will_be_removed(&self, _processor: &str) {}

    fn on_processor_removed(&self, _processor: &str) {}

    fn on_connection_added(&self, _connection: &PortConnection) {}

    fn on_connection_removed(&self, _connection: &PortConnection) {}

    fn on_link_added(&self, _link: &PropertyLink) {}

    fn on_link_removed(&self, _link: &PropertyLink) {}

    fn on_invalidation_begin(&self) {}

    fn on_invalidation_end(&self) {}

    /// Some processor became invalid and the network should be evaluated.
    fn on_evaluate_request(&self) {}

    /// The structure of the network changed.
    fn on_network_modified(&self) {}

    fn on_property_changed(&self, _path: &PropertyPath, _value: &PropertyValue) {}

    fn on_background_work_started(&self, _processor: &str, _tasks: usize) {}

    /// A job ended; `remaining` jobs of the processor are still running.
    fn on_background_work_finished(&self, _processor: &str, _remaining: usize) {}

    fn on_progress(&self, _processor: &str, _progress: f32) {}

    fn on_processor_error(&self, _processor: &str, _message: &str) {}
}
