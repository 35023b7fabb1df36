//! Observer registration.
//!
//! Properties and networks both hand out an [`ObserverId`] when something
//! subscribes, and take it back to unsubscribe.

use std::sync::atomic::{AtomicU64, Ordering};

/// Unique identifier for a registered observer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(u64);

impl ObserverId {
    /// Generate a new unique observer ID.
    ///
    /// Uses an atomic counter to ensure uniqueness across threads.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for ObserverId {
    fn default() -> Self {
        Self::new()
    }
}

/// An ordered list of observers. Notification follows registration order.
pub(crate) struct ObserverList<T> {
    entries: Vec<(ObserverId, T)>,
}

impl<T> ObserverList<T> {
    pub(crate) fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    pub(crate) fn add(&mut self, observer: T) -> ObserverId {
        let id = ObserverId::new();
        self.entries.push((id, observer));
        id
    }

    /// Returns true if the observer was registered.
    pub(crate) fn remove(&mut self, id: ObserverId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(entry_id, _)| *entry_id != id);
        self.entries.len() != before
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = &T> {
        self.entries.iter().map(|(_, observer)| observer)
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}

impl<T> Default for ObserverList<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn observer_ids_are_unique() {
        let id1 = ObserverId::new();
        let id2 = ObserverId::new();
        assert_ne!(id1, id2);
    }

    #[test]
    fn removal_only_affects_the_given_observer() {
        let mut list = ObserverList::new();
        let first = list.add("first");
        let _second = list.add("second");

        assert!(list.remove(first));
        assert!(!list.remove(first));
        assert_eq!(list.iter().copied().collect::<Vec<_>>(), vec!["second"]);
        assert_eq!(list.len(), 1);
    }
}
