//! Property access and link propagation.
//!
//! # How Propagation Works
//!
//! A property change is one *trigger*. The trigger owns a visited set of
//! property paths and a work queue seeded with the changed property. Each
//! step writes a value into a property, then the property's outgoing links
//! enqueue their destinations with the value converted to the destination's
//! kind. A destination already visited during this trigger is skipped, so
//! link cycles terminate after one pass and every property is written at
//! most once per trigger.
//!
//! Setting a property to the value it already holds is not a change: the
//! owner is not invalidated and observers hear nothing. The value is still
//! pushed along the outgoing links, so a linked property that drifted away
//! is brought back in line.
//!
//! All invalidation caused by a trigger is bracketed by one
//! begin/end-invalidation pair.

use std::collections::{HashSet, VecDeque};

use crate::error::{NetworkError, Result};
use crate::path::PropertyPath;
use crate::properties::{FromValue, Property, PropertyLink, PropertyValue, ValueKind};

use super::ProcessorNetwork;

impl ProcessorNetwork {
    // ------------------------------------------------------------------------
    // Properties
    // ------------------------------------------------------------------------

    /// Set a property, given as `processor.property[.child...]`.
    ///
    /// Scalar values are converted to the property's kind; other kinds must
    /// match. The change is pushed along links and invalidates the owning
    /// processors.
    pub fn set_property(&mut self, path: &str, value: impl Into<PropertyValue>) -> Result<()> {
        let path: PropertyPath = path.parse()?;
        self.set_property_at(&path, value.into())
    }

    pub fn set_property_at(&mut self, path: &PropertyPath, value: PropertyValue) -> Result<()> {
        let kind = self.value_kind(path)?;
        let converted = value
            .convert_to(kind)
            .ok_or_else(|| NetworkError::TypeMismatch {
                property: path.to_string(),
                expected: kind.to_string(),
                found: value.kind().to_string(),
            })?;
        self.propagate_property(path.clone(), converted);
        Ok(())
    }

    /// Current value of a property.
    pub fn property_value(&self, path: &str) -> Result<PropertyValue> {
        let path: PropertyPath = path.parse()?;
        let property = self.resolve_property(&path)?;
        property
            .value()
            .cloned()
            .ok_or_else(|| NetworkError::NotAValueProperty(path.to_string()))
    }

    /// Current value of a property as a concrete type.
    pub fn get_property<T: FromValue>(&self, path: &str) -> Option<T> {
        self.property_value(path).ok().as_ref().and_then(T::from_value)
    }

    pub fn is_property_in_network(&self, path: &str) -> bool {
        path.parse::<PropertyPath>()
            .is_ok_and(|path| self.resolve_property(&path).is_ok())
    }

    pub(super) fn resolve_property(&self, path: &PropertyPath) -> Result<&Property> {
        let entry = self
            .processors
            .get(&path.processor)
            .ok_or_else(|| NetworkError::NotInNetwork(path.processor.clone()))?;
        entry
            .processor
            .base()
            .property_by_segments(&path.property)
            .ok_or_else(|| NetworkError::UnknownProperty {
                processor: path.processor.clone(),
                property: path.property_path(),
            })
    }

    pub(super) fn value_kind(&self, path: &PropertyPath) -> Result<ValueKind> {
        self.resolve_property(path)?
            .kind()
            .ok_or_else(|| NetworkError::NotAValueProperty(path.to_string()))
    }

    fn propagate_property(&mut self, origin: PropertyPath, value: PropertyValue) {
        let outermost = !self.linking;
        if outermost {
            self.linking = true;
            self.link_visited.clear();
        }
        self.begin_invalidation();

        let mut queue = VecDeque::from([(origin, value)]);
        while let Some((path, value)) = queue.pop_front() {
            if !self.link_visited.insert(path.clone()) {
                continue;
            }

            match self.write_property(&path, value) {
                Ok(_) => {}
                Err(err) => {
                    tracing::warn!(
                        property = %path,
                        error = %err,
                        "link destination rejected value"
                    );
                    continue;
                }
            }

            let Some(current) = self
                .resolve_property(&path)
                .ok()
                .and_then(|property| property.value().cloned())
            else {
                continue;
            };
            for link in self.links.iter().filter(|link| link.source == path) {
                if self.link_visited.contains(&link.destination) {
                    continue;
                }
                let Ok(kind) = self.value_kind(&link.destination) else {
                    continue;
                };
                if let Some(converted) = current.convert_to(kind) {
                    queue.push_back((link.destination.clone(), converted));
                }
            }
        }

        self.end_invalidation();
        if outermost {
            self.linking = false;
            self.link_visited.clear();
        }
    }

    /// Store a value and run the owner's change handling.
    /// Returns `Ok(true)` if the value changed.
    fn write_property(&mut self, path: &PropertyPath, value: PropertyValue) -> Result<bool> {
        let entry = self
            .processors
            .get_mut(&path.processor)
            .ok_or_else(|| NetworkError::NotInNetwork(path.processor.clone()))?;
        let property = entry
            .processor
            .base_mut()
            .property_by_segments_mut(&path.property)
            .ok_or_else(|| NetworkError::UnknownProperty {
                processor: path.processor.clone(),
                property: path.property_path(),
            })?;

        let changed = property.set(value.clone()).map_err(|err| match err {
            NetworkError::TypeMismatch {
                expected, found, ..
            } => NetworkError::TypeMismatch {
                property: path.to_string(),
                expected,
                found,
            },
            other => other,
        })?;
        if !changed {
            return Ok(false);
        }
        let level = property.invalidation_level();
        entry.processor.property_changed(&path.property_path());

        tracing::trace!(property = %path, %value, "property changed");
        self.notify(|o| o.on_property_changed(path, &value));
        if level.is_invalid() {
            self.propagate_invalidation(&path.processor, level);
        }
        Ok(true)
    }

    // ------------------------------------------------------------------------
    // Links
    // ------------------------------------------------------------------------

    /// Link two properties: changes to `source` are pushed to `destination`.
    ///
    /// Adding a link does not copy the current value.
    pub fn add_link(&mut self, source: &str, destination: &str) -> Result<()> {
        let link = PropertyLink::new(source.parse()?, destination.parse()?);
        self.insert_link(link)
    }

    /// Link two properties in both directions.
    pub fn add_bidirectional_link(&mut self, a: &str, b: &str) -> Result<()> {
        let forward = PropertyLink::new(a.parse()?, b.parse()?);
        let backward = forward.reversed();
        self.insert_link(forward.clone())?;
        if let Err(err) = self.insert_link(backward) {
            self.remove_link_entry(&forward);
            return Err(err);
        }
        Ok(())
    }

    pub(super) fn insert_link(&mut self, link: PropertyLink) -> Result<()> {
        let source_kind = self.value_kind(&link.source)?;
        let destination_kind = self.value_kind(&link.destination)?;
        if link.source == link.destination {
            return Err(NetworkError::SelfLink(link.source.to_string()));
        }
        if !source_kind.converts_to(destination_kind) {
            return Err(NetworkError::TypeMismatch {
                property: link.destination.to_string(),
                expected: destination_kind.to_string(),
                found: source_kind.to_string(),
            });
        }
        if self.links.contains(&link) {
            return Err(NetworkError::DuplicateLink {
                source_path: link.source.to_string(),
                destination: link.destination.to_string(),
            });
        }

        tracing::trace!(%link, "link added");
        self.links.insert(link.clone());
        self.version += 1;
        self.notify(|o| o.on_link_added(&link));
        self.network_modified();
        Ok(())
    }

    pub fn remove_link(&mut self, source: &str, destination: &str) -> Result<()> {
        let link = PropertyLink::new(source.parse()?, destination.parse()?);
        if !self.links.contains(&link) {
            return Err(NetworkError::NotInNetwork(link.to_string()));
        }
        self.remove_link_entry(&link);
        self.network_modified();
        Ok(())
    }

    pub(super) fn remove_link_entry(&mut self, link: &PropertyLink) {
        if self.links.shift_remove(link) {
            self.version += 1;
            tracing::trace!(%link, "link removed");
            self.notify(|o| o.on_link_removed(link));
        }
    }

    /// All links in the order they were added.
    pub fn links(&self) -> impl Iterator<Item = &PropertyLink> {
        self.links.iter()
    }

    /// Check for a link from `source` to `destination`.
    pub fn is_linked(&self, source: &str, destination: &str) -> bool {
        match (source.parse(), destination.parse()) {
            (Ok(source), Ok(destination)) => {
                self.links.contains(&PropertyLink::new(source, destination))
            }
            _ => false,
        }
    }

    /// Check for links in both directions between two properties.
    pub fn is_linked_bidirectional(&self, a: &str, b: &str) -> bool {
        self.is_linked(a, b) && self.is_linked(b, a)
    }

    /// Links going either way between two processors.
    pub fn links_between_processors(&self, a: &str, b: &str) -> Vec<&PropertyLink> {
        self.links
            .iter()
            .filter(|link| {
                (link.source.processor == a && link.destination.processor == b)
                    || (link.source.processor == b && link.destination.processor == a)
            })
            .collect()
    }

    /// Every property a change to `path` would reach through links,
    /// directly or transitively, in propagation order.
    pub fn properties_linked_to(&self, path: &str) -> Vec<PropertyPath> {
        let Ok(origin) = path.parse::<PropertyPath>() else {
            return Vec::new();
        };

        let mut visited = HashSet::from([origin.clone()]);
        let mut queue = VecDeque::from([origin]);
        let mut result = Vec::new();
        while let Some(current) = queue.pop_front() {
            for link in self.links.iter().filter(|link| link.source == current) {
                if visited.insert(link.destination.clone()) {
                    result.push(link.destination.clone());
                    queue.push_back(link.destination.clone());
                }
            }
        }
        result
    }
}
