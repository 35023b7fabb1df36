//! Processor Factory
//!
//! Maps class identifiers to constructors so documents can recreate the
//! processors they name. The factory is passed explicitly to whoever needs
//! it; there is no global registry.

use std::fmt;

use indexmap::IndexMap;

use super::Processor;

type Constructor = Box<dyn Fn(&str) -> Box<dyn Processor> + Send + Sync>;

/// Registry of processor constructors keyed by class identifier.
#[derive(Default)]
pub struct ProcessorFactory {
    constructors: IndexMap<String, Constructor>,
}

impl ProcessorFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a constructor, which receives the new processor's identifier.
    ///
    /// Returns false if an earlier registration for the class was replaced.
    pub fn register<F, P>(&mut self, class_identifier: impl Into<String>, constructor: F) -> bool
    where
        F: Fn(&str) -> P + Send + Sync + 'static,
        P: Processor,
    {
        let class_identifier = class_identifier.into();
        tracing::trace!(class = %class_identifier, "registering processor type");
        self.constructors
            .insert(
                class_identifier,
                Box::new(move |identifier: &str| {
                    Box::new(constructor(identifier)) as Box<dyn Processor>
                }),
            )
            .is_none()
    }

    pub fn unregister(&mut self, class_identifier: &str) -> bool {
        self.constructors.shift_remove(class_identifier).is_some()
    }

    /// Create a processor of the given class.
    pub fn create(&self, class_identifier: &str, identifier: &str) -> Option<Box<dyn Processor>> {
        let constructor = self.constructors.get(class_identifier)?;
        let mut processor = constructor(identifier);
        if processor.identifier() != identifier {
            processor.base_mut().set_identifier(identifier);
        }
        Some(processor)
    }

    pub fn contains(&self, class_identifier: &str) -> bool {
        self.constructors.contains_key(class_identifier)
    }

    /// Registered class identifiers in registration order.
    pub fn class_identifiers(&self) -> impl Iterator<Item = &str> {
        self.constructors.keys().map(String::as_str)
    }
}

impl fmt::Debug for ProcessorFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcessorFactory")
            .field("classes", &self.constructors.keys().collect::<Vec<_>>())
            .finish()
    }
}
