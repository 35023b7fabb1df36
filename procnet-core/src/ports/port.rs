//! Ports
//!
//! Outports publish data produced by their processor; inports receive the
//! data of the outports connected to them. Data travels as type-erased
//! [`PortData`] and is recovered with a checked downcast, so a port can only
//! ever hand out the type it was declared with.

use std::any::{Any, TypeId};
use std::fmt;
use std::sync::Arc;

use smallvec::SmallVec;

/// The declared data type of a port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PortType {
    name: &'static str,
    id: Option<TypeId>,
}

impl PortType {
    /// Port type carrying values of `T`.
    pub fn of<T: Any + Send + Sync>() -> Self {
        Self {
            name: std::any::type_name::<T>(),
            id: Some(TypeId::of::<T>()),
        }
    }

    /// Port type accepting data of any type. Only meaningful for inports.
    pub fn any() -> Self {
        Self {
            name: "any",
            id: None,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Check if data of type `other` can flow into a port of this type.
    pub fn accepts(&self, other: &PortType) -> bool {
        self.id.is_none() || self.id == other.id
    }
}

impl fmt::Display for PortType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// Type-erased, shared port data.
#[derive(Clone)]
pub struct PortData {
    value: Arc<dyn Any + Send + Sync>,
    port_type: PortType,
}

impl PortData {
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self {
            value: Arc::new(value),
            port_type: PortType::of::<T>(),
        }
    }

    pub fn port_type(&self) -> PortType {
        self.port_type
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.value.downcast_ref::<T>()
    }
}

impl fmt::Debug for PortData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PortData")
            .field("type", &self.port_type.name)
            .finish()
    }
}

/// A processor output.
#[derive(Debug)]
pub struct Outport {
    identifier: String,
    port_type: PortType,
    data: Option<PortData>,
    valid: bool,
}

impl Outport {
    pub fn new(identifier: impl Into<String>, port_type: PortType) -> Self {
        Self {
            identifier: identifier.into(),
            port_type,
            data: None,
            valid: false,
        }
    }

    /// Outport carrying values of `T`.
    pub fn of<T: Any + Send + Sync>(identifier: impl Into<String>) -> Self {
        Self::new(identifier, PortType::of::<T>())
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn port_type(&self) -> PortType {
        self.port_type
    }

    /// Publish a value. The outport stays invalid until the network marks
    /// the owning processor's results as complete.
    pub fn set_data<T: Any + Send + Sync>(&mut self, value: T) {
        self.data = Some(PortData::new(value));
    }

    pub fn data(&self) -> Option<&PortData> {
        self.data.as_ref()
    }

    pub fn get<T: Any>(&self) -> Option<&T> {
        self.data.as_ref().and_then(PortData::downcast_ref)
    }

    pub fn has_data(&self) -> bool {
        self.data.is_some()
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }

    /// Valid and holding data; downstream processors may read it.
    pub fn is_ready(&self) -> bool {
        self.valid && self.data.is_some()
    }

    pub(crate) fn invalidate(&mut self) {
        self.valid = false;
    }

    pub(crate) fn set_valid(&mut self) {
        self.valid = self.data.is_some();
    }

    /// Drop the data and invalidate.
    pub fn clear(&mut self) {
        self.data = None;
        self.valid = false;
    }
}

/// Connection capacity of an inport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capacity {
    Single,
    /// Up to the given number of connections.
    Bounded(usize),
    Unbounded,
}

impl Capacity {
    pub fn allows(&self, connections: usize) -> bool {
        match *self {
            Capacity::Single => connections <= 1,
            Capacity::Bounded(max) => connections <= max,
            Capacity::Unbounded => true,
        }
    }
}

/// A processor input.
#[derive(Debug)]
pub struct Inport {
    identifier: String,
    port_type: PortType,
    optional: bool,
    capacity: Capacity,
    inputs: SmallVec<[PortData; 1]>,
}

impl Inport {
    pub fn new(identifier: impl Into<String>, port_type: PortType) -> Self {
        Self {
            identifier: identifier.into(),
            port_type,
            optional: false,
            capacity: Capacity::Single,
            inputs: SmallVec::new(),
        }
    }

    /// Inport accepting values of `T`.
    pub fn of<T: Any + Send + Sync>(identifier: impl Into<String>) -> Self {
        Self::new(identifier, PortType::of::<T>())
    }

    /// An optional inport does not block readiness when unconnected.
    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    pub fn with_capacity(mut self, capacity: Capacity) -> Self {
        self.capacity = capacity;
        self
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn port_type(&self) -> PortType {
        self.port_type
    }

    pub fn is_optional(&self) -> bool {
        self.optional
    }

    pub fn capacity(&self) -> Capacity {
        self.capacity
    }

    pub fn accepts(&self, outport: &Outport) -> bool {
        self.port_type.accepts(&outport.port_type)
    }

    /// Data of the first connected outport.
    pub fn data(&self) -> Option<&PortData> {
        self.inputs.first()
    }

    /// Value of the first connected outport.
    pub fn get<T: Any>(&self) -> Option<&T> {
        self.data().and_then(PortData::downcast_ref)
    }

    /// Values of all connected outports, in connection order.
    pub fn get_all<T: Any>(&self) -> Vec<&T> {
        self.inputs.iter().filter_map(PortData::downcast_ref).collect()
    }

    pub fn inputs(&self) -> &[PortData] {
        &self.inputs
    }

    pub fn has_data(&self) -> bool {
        !self.inputs.is_empty()
    }

    pub(crate) fn set_inputs(&mut self, inputs: SmallVec<[PortData; 1]>) {
        self.inputs = inputs;
    }
}
