//! Shared processor state.

use crate::error::NetworkError;
use crate::invalidation::InvalidationLevel;
use crate::jobs::{JobCoordinator, JobOptions};
use crate::metadata::MetaDataMap;
use crate::ports::{Inport, Outport};
use crate::properties::{self, FromValue, Property, PropertyValue};

/// State every processor carries: ports, properties, status and jobs.
///
/// Processors embed one of these and expose it through
/// [`Processor::base`](super::Processor::base). The network reads and
/// updates it; processor code mostly reads inputs and properties and writes
/// outports.
#[derive(Debug)]
pub struct ProcessorBase {
    identifier: String,
    display_name: String,
    inports: Vec<Inport>,
    outports: Vec<Outport>,
    properties: Vec<Property>,
    invalidation_level: InvalidationLevel,
    error: Option<String>,
    progress: Option<f32>,
    metadata: MetaDataMap,
    jobs: JobCoordinator,
    requests: Vec<(String, PropertyValue)>,
}

impl ProcessorBase {
    /// New processors start at `InvalidResources` so their first evaluation
    /// initializes them.
    pub fn new(identifier: impl Into<String>) -> Self {
        let identifier = identifier.into();
        Self {
            display_name: identifier.clone(),
            identifier,
            inports: Vec::new(),
            outports: Vec::new(),
            properties: Vec::new(),
            invalidation_level: InvalidationLevel::InvalidResources,
            error: None,
            progress: None,
            metadata: MetaDataMap::new(),
            jobs: JobCoordinator::new(),
            requests: Vec::new(),
        }
    }

    pub fn with_display_name(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = display_name.into();
        self
    }

    pub fn with_inport(mut self, inport: Inport) -> Self {
        self.inports.push(inport);
        self
    }

    pub fn with_outport(mut self, outport: Outport) -> Self {
        self.outports.push(outport);
        self
    }

    pub fn with_property(mut self, property: Property) -> Self {
        self.properties.push(property);
        self
    }

    /// Set how background work is dispatched. See [`JobOptions`].
    pub fn with_job_options(mut self, options: JobOptions) -> Self {
        self.jobs.set_options(options);
        self
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub(crate) fn set_identifier(&mut self, identifier: impl Into<String>) {
        self.identifier = identifier.into();
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn set_display_name(&mut self, display_name: impl Into<String>) {
        self.display_name = display_name.into();
    }

    // ---- ports ----

    pub fn inports(&self) -> &[Inport] {
        &self.inports
    }

    pub fn inport(&self, identifier: &str) -> Option<&Inport> {
        self.inports.iter().find(|p| p.identifier() == identifier)
    }

    pub(crate) fn inports_mut(&mut self) -> &mut [Inport] {
        &mut self.inports
    }

    pub fn outports(&self) -> &[Outport] {
        &self.outports
    }

    pub fn outport(&self, identifier: &str) -> Option<&Outport> {
        self.outports.iter().find(|p| p.identifier() == identifier)
    }

    pub fn outport_mut(&mut self, identifier: &str) -> Option<&mut Outport> {
        self.outports.iter_mut().find(|p| p.identifier() == identifier)
    }

    /// Write a value to an outport.
    pub fn set_output<T: std::any::Any + Send + Sync>(
        &mut self,
        outport: &str,
        value: T,
    ) -> Result<(), NetworkError> {
        let port = self
            .outports
            .iter_mut()
            .find(|p| p.identifier() == outport)
            .ok_or_else(|| NetworkError::UnknownPort {
                processor: self.identifier.clone(),
                port: outport.to_string(),
            })?;
        port.set_data(value);
        Ok(())
    }

    /// Read the value on the first connection of an inport.
    pub fn input<T: std::any::Any>(&self, inport: &str) -> Option<&T> {
        self.inport(inport).and_then(Inport::get)
    }

    pub(crate) fn validate_outports(&mut self) {
        for port in &mut self.outports {
            port.set_valid();
        }
    }

    pub(crate) fn clear_outports(&mut self) {
        for port in &mut self.outports {
            port.clear();
        }
    }

    // ---- properties ----

    pub fn properties(&self) -> &[Property] {
        &self.properties
    }

    /// Look up a property by dotted path relative to this processor.
    pub fn property(&self, path: &str) -> Option<&Property> {
        let segments: Vec<&str> = path.split('.').collect();
        properties::find(&self.properties, &segments)
    }

    /// Mutable access to a property.
    ///
    /// Changes made here bypass links and invalidation. Use it to configure
    /// a processor before it joins a network; afterwards go through
    /// [`ProcessorNetwork::set_property`](crate::network::ProcessorNetwork::set_property)
    /// or [`request_property`](Self::request_property).
    pub fn property_mut(&mut self, path: &str) -> Option<&mut Property> {
        let segments: Vec<&str> = path.split('.').collect();
        properties::find_mut(&mut self.properties, &segments)
    }

    pub(crate) fn property_by_segments_mut(
        &mut self,
        segments: &[String],
    ) -> Option<&mut Property> {
        properties::find_mut(&mut self.properties, segments)
    }

    pub(crate) fn property_by_segments(&self, segments: &[String]) -> Option<&Property> {
        properties::find(&self.properties, segments)
    }

    /// Current value of a property as a concrete type.
    pub fn value<T: FromValue>(&self, path: &str) -> Option<T> {
        self.property(path).and_then(Property::get)
    }

    /// Ask the network to set one of this processor's properties once the
    /// current `process()` call returns. The change goes through links and
    /// invalidation like any other.
    pub fn request_property(&mut self, path: impl Into<String>, value: impl Into<PropertyValue>) {
        self.requests.push((path.into(), value.into()));
    }

    pub(crate) fn take_requests(&mut self) -> Vec<(String, PropertyValue)> {
        std::mem::take(&mut self.requests)
    }

    // ---- status ----

    pub fn invalidation_level(&self) -> InvalidationLevel {
        self.invalidation_level
    }

    pub fn is_valid(&self) -> bool {
        !self.invalidation_level.is_invalid()
    }

    /// Raise the level, clear any error, and invalidate all outports.
    pub(crate) fn invalidate(&mut self, level: InvalidationLevel) {
        self.invalidate_keeping_outputs(level);
        for port in &mut self.outports {
            port.invalidate();
        }
    }

    /// Raise the level and clear any error. Outports keep serving their
    /// current data.
    pub(crate) fn invalidate_keeping_outputs(&mut self, level: InvalidationLevel) {
        self.invalidation_level = self.invalidation_level.combine(level);
        self.error = None;
    }

    pub(crate) fn set_valid(&mut self) {
        self.invalidation_level = InvalidationLevel::Valid;
    }

    /// Message of the last failure, cleared on the next invalidation.
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub(crate) fn set_error(&mut self, message: impl Into<String>) {
        self.error = Some(message.into());
    }

    /// Progress of the newest background job in `[0, 1]`.
    pub fn progress(&self) -> Option<f32> {
        self.progress
    }

    pub(crate) fn set_progress(&mut self, progress: Option<f32>) {
        self.progress = progress;
    }

    pub fn metadata(&self) -> &MetaDataMap {
        &self.metadata
    }

    pub fn metadata_mut(&mut self) -> &mut MetaDataMap {
        &mut self.metadata
    }

    pub fn jobs(&self) -> &JobCoordinator {
        &self.jobs
    }

    pub fn jobs_mut(&mut self) -> &mut JobCoordinator {
        &mut self.jobs
    }
}
