//! Ports and connections.

mod connection;
mod port;

pub use connection::PortConnection;
pub use port::{Capacity, Inport, Outport, PortData, PortType};

pub(crate) use connection::ConnectionElement;
