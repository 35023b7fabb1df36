//! Properties
//!
//! Typed processor parameters, their values, and the links that keep
//! properties on different processors in sync.

mod link;
mod property;
mod value;

pub use link::PropertyLink;
pub use property::Property;
pub use value::{FromValue, PropertyValue, ValueKind};

pub(crate) use link::LinkElement;
pub(crate) use property::{find, find_mut};
