//! Metadata
//!
//! Free-form key/value annotations attached to processors and properties,
//! such as editor positions or UI hints. Metadata never affects evaluation,
//! but it is persisted with the network.

use indexmap::IndexMap;

use crate::properties::{FromValue, PropertyValue};

/// An ordered map of metadata entries.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetaDataMap {
    entries: IndexMap<String, PropertyValue>,
}

impl MetaDataMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set an entry, replacing any previous value under the same key.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<PropertyValue>) {
        self.entries.insert(key.into(), value.into());
    }

    /// Get an entry as a concrete type.
    ///
    /// Returns `None` if the key is missing or holds a different kind.
    pub fn get<T: FromValue>(&self, key: &str) -> Option<T> {
        self.entries.get(key).and_then(T::from_value)
    }

    /// Get an entry, falling back to `default` when missing or mistyped.
    pub fn get_or<T: FromValue>(&self, key: &str, default: T) -> T {
        self.get(key).unwrap_or(default)
    }

    pub fn value(&self, key: &str) -> Option<&PropertyValue> {
        self.entries.get(key)
    }

    /// Remove an entry. Returns true if it existed.
    pub fn unset(&mut self, key: &str) -> bool {
        self.entries.shift_remove(key).is_some()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Copy every entry of `other` into this map, overwriting shared keys.
    pub fn copy_from(&mut self, other: &MetaDataMap) {
        for (key, value) in &other.entries {
            self.entries.insert(key.clone(), value.clone());
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &PropertyValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn typed_access_with_defaults() {
        let mut meta = MetaDataMap::new();
        meta.set("position", [10.0, 20.0]);
        meta.set("visible", true);

        assert_eq!(meta.get::<[f64; 2]>("position"), Some([10.0, 20.0]));
        assert_eq!(meta.get::<bool>("position"), None);
        assert!(meta.get_or("visible", false));
        assert_eq!(meta.get_or("missing", 7_i64), 7);
    }

    #[test]
    fn unset_and_copy() {
        let mut a = MetaDataMap::new();
        a.set("x", 1);
        a.set("y", 2);

        let mut b = MetaDataMap::new();
        b.set("y", 5);
        b.copy_from(&a);
        assert_eq!(b.get::<i64>("y"), Some(2));
        assert_eq!(b.len(), 2);

        assert!(b.unset("x"));
        assert!(!b.unset("x"));
        assert!(!b.contains("x"));
    }
}
