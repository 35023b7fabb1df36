//! Properties
//!
//! A property is a named, typed parameter owned by a processor. Value
//! properties hold a single [`PropertyValue`]; composite properties group
//! child properties and are addressed with dotted paths (`"camera.fov"`).
//!
//! # Change Notification
//!
//! Setting a property to a value equal to its current one is a no-op.
//! Otherwise the new value is stored and every observer registered with
//! [`Property::subscribe`] is called in registration order. The network
//! layers link propagation and invalidation on top of this.

use std::fmt;

use crate::error::NetworkError;
use crate::invalidation::InvalidationLevel;
use crate::metadata::MetaDataMap;
use crate::observer::{ObserverId, ObserverList};

use super::value::{FromValue, PropertyValue, ValueKind};

type ValueObserver = Box<dyn Fn(&PropertyValue) + Send + Sync>;

enum Content {
    Value(PropertyValue),
    Composite(Vec<Property>),
}

/// A named, typed processor parameter.
pub struct Property {
    identifier: String,
    display_name: String,
    content: Content,
    invalidation_level: InvalidationLevel,
    metadata: MetaDataMap,
    observers: ObserverList<ValueObserver>,
}

impl Property {
    /// Create a value property. Changes invalidate the owner's output.
    pub fn new(
        identifier: impl Into<String>,
        display_name: impl Into<String>,
        value: impl Into<PropertyValue>,
    ) -> Self {
        Self::with_content(identifier, display_name, Content::Value(value.into()))
    }

    /// Create a composite property grouping `children`.
    pub fn composite(
        identifier: impl Into<String>,
        display_name: impl Into<String>,
        children: Vec<Property>,
    ) -> Self {
        Self::with_content(identifier, display_name, Content::Composite(children))
    }

    fn with_content(
        identifier: impl Into<String>,
        display_name: impl Into<String>,
        content: Content,
    ) -> Self {
        Self {
            identifier: identifier.into(),
            display_name: display_name.into(),
            content,
            invalidation_level: InvalidationLevel::InvalidOutput,
            metadata: MetaDataMap::new(),
            observers: ObserverList::new(),
        }
    }

    /// Set the level at which changes invalidate the owning processor.
    pub fn with_invalidation_level(mut self, level: InvalidationLevel) -> Self {
        self.invalidation_level = level;
        self
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn invalidation_level(&self) -> InvalidationLevel {
        self.invalidation_level
    }

    pub fn is_composite(&self) -> bool {
        matches!(self.content, Content::Composite(_))
    }

    /// The current value, or `None` for composites.
    pub fn value(&self) -> Option<&PropertyValue> {
        match &self.content {
            Content::Value(value) => Some(value),
            Content::Composite(_) => None,
        }
    }

    /// The current value as a concrete type.
    pub fn get<T: FromValue>(&self) -> Option<T> {
        self.value().and_then(T::from_value)
    }

    /// The kind of value held, or `None` for composites.
    pub fn kind(&self) -> Option<ValueKind> {
        self.value().map(PropertyValue::kind)
    }

    /// Child properties. Empty for value properties.
    pub fn children(&self) -> &[Property] {
        match &self.content {
            Content::Value(_) => &[],
            Content::Composite(children) => children,
        }
    }

    pub fn child(&self, identifier: &str) -> Option<&Property> {
        self.children().iter().find(|p| p.identifier == identifier)
    }

    pub fn child_mut(&mut self, identifier: &str) -> Option<&mut Property> {
        match &mut self.content {
            Content::Value(_) => None,
            Content::Composite(children) => {
                children.iter_mut().find(|p| p.identifier == identifier)
            }
        }
    }

    /// Store a new value.
    ///
    /// Returns `Ok(true)` if the value changed and observers were notified,
    /// `Ok(false)` if it was equal to the current value.
    pub fn set(&mut self, value: impl Into<PropertyValue>) -> Result<bool, NetworkError> {
        let value = value.into();
        let current = match &mut self.content {
            Content::Value(current) => current,
            Content::Composite(_) => {
                return Err(NetworkError::NotAValueProperty(self.identifier.clone()))
            }
        };

        if current.kind() != value.kind() {
            return Err(NetworkError::TypeMismatch {
                property: self.identifier.clone(),
                expected: current.kind().to_string(),
                found: value.kind().to_string(),
            });
        }
        if *current == value {
            return Ok(false);
        }

        *current = value;
        for observer in self.observers.iter() {
            observer(current);
        }
        Ok(true)
    }

    /// Register a callback invoked with the new value after each change.
    pub fn subscribe<F>(&mut self, observer: F) -> ObserverId
    where
        F: Fn(&PropertyValue) + Send + Sync + 'static,
    {
        self.observers.add(Box::new(observer))
    }

    /// Remove a callback. Returns true if it was registered.
    pub fn unsubscribe(&mut self, id: ObserverId) -> bool {
        self.observers.remove(id)
    }

    pub fn metadata(&self) -> &MetaDataMap {
        &self.metadata
    }

    pub fn metadata_mut(&mut self) -> &mut MetaDataMap {
        &mut self.metadata
    }
}

impl fmt::Debug for Property {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut debug = f.debug_struct("Property");
        debug.field("identifier", &self.identifier);
        match &self.content {
            Content::Value(value) => debug.field("value", value),
            Content::Composite(children) => debug.field("children", children),
        };
        debug
            .field("invalidation_level", &self.invalidation_level)
            .field("observer_count", &self.observers.len())
            .finish()
    }
}

/// Resolve a path of identifiers against a list of properties.
pub(crate) fn find<'a, S: AsRef<str>>(
    properties: &'a [Property],
    segments: &[S],
) -> Option<&'a Property> {
    let (first, rest) = segments.split_first()?;
    let mut current = properties.iter().find(|p| p.identifier == first.as_ref())?;
    for segment in rest {
        current = current.child(segment.as_ref())?;
    }
    Some(current)
}

pub(crate) fn find_mut<'a, S: AsRef<str>>(
    properties: &'a mut [Property],
    segments: &[S],
) -> Option<&'a mut Property> {
    let (first, rest) = segments.split_first()?;
    let mut current = properties
        .iter_mut()
        .find(|p| p.identifier == first.as_ref())?;
    for segment in rest {
        current = current.child_mut(segment.as_ref())?;
    }
    Some(current)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn set_notifies_only_on_change() {
        let mut property = Property::new("threshold", "Threshold", 0.5);
        let count = Arc::new(AtomicUsize::new(0));
        let count_clone = count.clone();
        property.subscribe(move |_| {
            count_clone.fetch_add(1, Ordering::SeqCst);
        });

        assert_eq!(property.set(0.5), Ok(false));
        assert_eq!(count.load(Ordering::SeqCst), 0);

        assert_eq!(property.set(0.75), Ok(true));
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(property.get::<f64>(), Some(0.75));
    }

    #[test]
    fn set_rejects_other_kinds() {
        let mut property = Property::new("count", "Count", 3);
        let err = property.set("three").unwrap_err();
        assert!(matches!(err, NetworkError::TypeMismatch { .. }));
        assert_eq!(property.get::<i64>(), Some(3));
    }

    #[test]
    fn unsubscribed_observers_are_not_called() {
        let mut property = Property::new("flag", "Flag", false);
        let count = Arc::new(AtomicUsize::new(0));
        let count_clone = count.clone();
        let id = property.subscribe(move |_| {
            count_clone.fetch_add(1, Ordering::SeqCst);
        });

        assert!(property.unsubscribe(id));
        property.set(true).unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn composites_resolve_dotted_paths() {
        let mut properties = vec![Property::composite(
            "camera",
            "Camera",
            vec![
                Property::new("fov", "Field of View", 60.0),
                Property::composite("clip", "Clipping", vec![Property::new("near", "Near", 0.1)]),
            ],
        )];

        let near = find(&properties, &["camera", "clip", "near"]).unwrap();
        assert_eq!(near.get::<f64>(), Some(0.1));
        assert!(find(&properties, &["camera", "missing"]).is_none());

        let camera = find_mut(&mut properties, &["camera"]).unwrap();
        assert!(camera.is_composite());
        assert!(matches!(
            camera.set(1.0),
            Err(NetworkError::NotAValueProperty(_))
        ));
    }
}
