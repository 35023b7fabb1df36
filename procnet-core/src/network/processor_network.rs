//! The processor network: ownership, structure and invalidation.

use std::collections::{HashSet, VecDeque};
use std::fmt;
use std::io;
use std::sync::Arc;

use indexmap::{IndexMap, IndexSet};

use crate::config::NetworkConfig;
use crate::error::{NetworkError, Result};
use crate::graph::DependencyGraph;
use crate::invalidation::InvalidationLevel;
use crate::jobs::{DispatchQueue, JobContext, ProcessorHandle, ThreadPool, WorkerPool};
use crate::observer::{ObserverId, ObserverList};
use crate::path::{validate_identifier, PortPath, PropertyPath};
use crate::ports::{Outport, PortConnection};
use crate::processor::Processor;
use crate::properties::PropertyLink;

use super::observer::NetworkObserver;

pub(super) struct ProcessorEntry {
    pub processor: Box<dyn Processor>,
    pub handle: ProcessorHandle,
}

/// A graph of processors joined by port connections and property links.
///
/// The network owns its processors and is driven from a single evaluation
/// thread. All structural mutation, property propagation and `process()`
/// calls happen there; background work comes back through
/// [`poll`](Self::poll).
pub struct ProcessorNetwork {
    pub(super) processors: IndexMap<String, ProcessorEntry>,
    pub(super) connections: IndexSet<PortConnection>,
    pub(super) links: IndexSet<PropertyLink>,
    pub(super) graph: DependencyGraph,
    pub(super) observers: ObserverList<Arc<dyn NetworkObserver>>,
    pub(super) config: NetworkConfig,
    pub(super) pool: Arc<dyn WorkerPool>,
    pub(super) dispatch: DispatchQueue,
    pub(super) version: u64,
    pub(super) next_generation: u64,

    // Batching
    pub(super) lock_depth: usize,
    pub(super) invalidation_depth: usize,
    pub(super) invalidation_notified: bool,
    pub(super) dirty: IndexSet<String>,
    pub(super) modified: bool,

    // Link propagation
    pub(super) linking: bool,
    pub(super) link_visited: HashSet<PropertyPath>,

    pub(super) deserializing: bool,
}

impl ProcessorNetwork {
    /// Create a network with the default configuration and its own pool.
    pub fn new() -> io::Result<Self> {
        Self::with_config(NetworkConfig::default())
    }

    /// Create a network with a [`ThreadPool`] sized by `config`.
    pub fn with_config(config: NetworkConfig) -> io::Result<Self> {
        let pool = Arc::new(ThreadPool::from_config(&config)?);
        Ok(Self::with_pool(pool, config))
    }

    /// Create a network that runs background work on `pool`.
    pub fn with_pool(pool: Arc<dyn WorkerPool>, config: NetworkConfig) -> Self {
        Self {
            processors: IndexMap::new(),
            connections: IndexSet::new(),
            links: IndexSet::new(),
            graph: DependencyGraph::new(),
            observers: ObserverList::new(),
            config,
            pool,
            dispatch: DispatchQueue::new(),
            version: 0,
            next_generation: 0,
            lock_depth: 0,
            invalidation_depth: 0,
            invalidation_notified: false,
            dirty: IndexSet::new(),
            modified: false,
            linking: false,
            link_visited: HashSet::new(),
            deserializing: false,
        }
    }

    pub fn config(&self) -> &NetworkConfig {
        &self.config
    }

    /// The shared worker pool.
    pub fn pool(&self) -> &Arc<dyn WorkerPool> {
        &self.pool
    }

    // ------------------------------------------------------------------------
    // Observers
    // ------------------------------------------------------------------------

    pub fn add_observer(&mut self, observer: Arc<dyn NetworkObserver>) -> ObserverId {
        self.observers.add(observer)
    }

    pub fn remove_observer(&mut self, id: ObserverId) -> bool {
        self.observers.remove(id)
    }

    pub(super) fn notify(&self, f: impl Fn(&dyn NetworkObserver)) {
        for observer in self.observers.iter() {
            f(observer.as_ref());
        }
    }

    pub(super) fn network_modified(&mut self) {
        if self.lock_depth > 0 {
            self.modified = true;
        } else {
            self.notify(|o| o.on_network_modified());
        }
    }

    // ------------------------------------------------------------------------
    // Processors
    // ------------------------------------------------------------------------

    /// Add a processor. Fails with `DuplicateIdentifier` if the identifier
    /// is taken.
    pub fn add_processor<P: Processor>(&mut self, processor: P) -> Result<()> {
        self.add_boxed_processor(Box::new(processor))
    }

    pub fn add_boxed_processor(&mut self, mut processor: Box<dyn Processor>) -> Result<()> {
        let identifier = processor.identifier().to_string();
        validate_identifier(&identifier)?;
        if self.processors.contains_key(&identifier) {
            return Err(NetworkError::DuplicateIdentifier(identifier));
        }

        let handle = ProcessorHandle {
            identifier: identifier.clone(),
            generation: self.next_generation,
        };
        self.next_generation += 1;

        processor.base_mut().jobs_mut().attach(JobContext {
            pool: Arc::clone(&self.pool),
            dispatch: self.dispatch.sender(),
            handle: handle.clone(),
            delay: self.config.debounce_delay(),
        });
        let level = processor
            .base()
            .invalidation_level()
            .combine(InvalidationLevel::InvalidOutput);

        self.processors
            .insert(identifier.clone(), ProcessorEntry { processor, handle });
        self.graph.add_node(&identifier);
        self.version += 1;

        tracing::trace!(processor = %identifier, "processor added");
        self.notify(|o| o.on_processor_added(&identifier));
        self.propagate_invalidation(&identifier, level);
        self.network_modified();
        Ok(())
    }

    /// Remove a processor together with every connection and link touching
    /// it, and stop its background jobs.
    pub fn remove_processor(&mut self, identifier: &str) -> Result<()> {
        if !self.processors.contains_key(identifier) {
            return Err(NetworkError::NotInNetwork(identifier.to_string()));
        }

        self.lock();
        self.notify(|o| o.on_processor_will_be_removed(identifier));

        let links: Vec<PropertyLink> = self
            .links
            .iter()
            .filter(|link| link.involves(identifier))
            .cloned()
            .collect();
        for link in &links {
            self.remove_link_entry(link);
        }

        let connections: Vec<PortConnection> = self
            .connections
            .iter()
            .filter(|connection| connection.involves(identifier))
            .cloned()
            .collect();
        for connection in &connections {
            self.remove_connection_entry(connection);
        }

        if let Some(mut entry) = self.processors.shift_remove(identifier) {
            entry.processor.base_mut().jobs_mut().detach();
        }
        self.graph.remove_node(identifier);
        self.dirty.shift_remove(identifier);
        self.version += 1;

        tracing::trace!(processor = %identifier, "processor removed");
        self.notify(|o| o.on_processor_removed(identifier));
        self.network_modified();
        self.unlock();
        Ok(())
    }

    /// Remove every processor.
    pub fn clear(&mut self) {
        self.lock();
        let identifiers: Vec<String> = self.processors.keys().rev().cloned().collect();
        for identifier in identifiers {
            // Identifiers come straight from the map, removal cannot fail.
            let _ = self.remove_processor(&identifier);
        }
        self.unlock();
    }

    pub fn contains(&self, identifier: &str) -> bool {
        self.processors.contains_key(identifier)
    }

    pub fn processor(&self, identifier: &str) -> Option<&(dyn Processor + 'static)> {
        self.processors.get(identifier).map(|entry| &*entry.processor)
    }

    /// Mutable access to a processor.
    ///
    /// Changes made through this reference bypass links and invalidation.
    pub fn processor_mut(&mut self, identifier: &str) -> Option<&mut (dyn Processor + 'static)> {
        self.processors
            .get_mut(identifier)
            .map(|entry| &mut *entry.processor)
    }

    /// Look up a processor as its concrete type.
    pub fn processor_as<T: Processor>(&self, identifier: &str) -> Option<&T> {
        self.processor(identifier)?.downcast_ref::<T>()
    }

    pub fn processor_as_mut<T: Processor>(&mut self, identifier: &str) -> Option<&mut T> {
        self.processor_mut(identifier)?.downcast_mut::<T>()
    }

    /// All processors in insertion order.
    pub fn processors(&self) -> impl Iterator<Item = &(dyn Processor + 'static)> {
        self.processors.values().map(|entry| &*entry.processor)
    }

    pub fn identifiers(&self) -> impl Iterator<Item = &str> {
        self.processors.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.processors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.processors.is_empty()
    }

    /// First identifier of the form `base`, `base2`, `base3`, ... not in use.
    pub fn unique_identifier(&self, base: &str) -> String {
        if !self.processors.contains_key(base) {
            return base.to_string();
        }
        (2..)
            .map(|n| format!("{base}{n}"))
            .find(|candidate| !self.processors.contains_key(candidate))
            .unwrap_or_else(|| base.to_string())
    }

    // ------------------------------------------------------------------------
    // Connections
    // ------------------------------------------------------------------------

    /// Connect an outport to an inport, both given as `processor.port`.
    pub fn add_connection(&mut self, outport: &str, inport: &str) -> Result<()> {
        self.connect(outport.parse()?, inport.parse()?, false)
    }

    /// Like [`add_connection`](Self::add_connection), but a single inport
    /// that is already connected has its connection replaced.
    pub fn add_connection_replacing(&mut self, outport: &str, inport: &str) -> Result<()> {
        self.connect(outport.parse()?, inport.parse()?, true)
    }

    fn connect(&mut self, outport: PortPath, inport: PortPath, replace: bool) -> Result<()> {
        let source = self.find_outport(&outport)?;
        let target = self.find_inport(&inport)?;
        if !target.accepts(source) {
            return Err(NetworkError::IncompatibleTypes {
                outport: outport.to_string(),
                outport_type: source.port_type().to_string(),
                inport: inport.to_string(),
                inport_type: target.port_type().to_string(),
            });
        }
        let capacity = target.capacity();

        let connection = PortConnection::new(outport, inport);
        if self.connections.contains(&connection) {
            return Err(NetworkError::DuplicateConnection {
                outport: connection.outport.to_string(),
                inport: connection.inport.to_string(),
            });
        }

        let existing: Vec<PortConnection> = self
            .connections
            .iter()
            .filter(|c| c.inport == connection.inport)
            .cloned()
            .collect();
        let mut replaced = None;
        if !capacity.allows(existing.len() + 1) {
            match existing.first() {
                Some(old) if replace && existing.len() == 1 => replaced = Some(old.clone()),
                _ => return Err(NetworkError::AlreadyConnected(connection.inport.to_string())),
            }
        }

        if self
            .graph
            .would_cycle(&connection.outport.processor, &connection.inport.processor)
        {
            return Err(NetworkError::WouldCreateCycle {
                outport: connection.outport.to_string(),
                inport: connection.inport.to_string(),
            });
        }

        self.lock();
        if let Some(old) = replaced {
            self.remove_connection_entry(&old);
        }
        self.connections.insert(connection.clone());
        self.graph
            .add_edge(&connection.outport.processor, &connection.inport.processor);
        self.version += 1;

        tracing::trace!(%connection, "connection added");
        self.notify(|o| o.on_connection_added(&connection));
        self.propagate_invalidation(
            &connection.inport.processor,
            InvalidationLevel::InvalidOutput,
        );
        self.network_modified();
        self.unlock();
        Ok(())
    }

    pub fn remove_connection(&mut self, outport: &str, inport: &str) -> Result<()> {
        let connection = PortConnection::new(outport.parse()?, inport.parse()?);
        if !self.connections.contains(&connection) {
            return Err(NetworkError::NotInNetwork(connection.to_string()));
        }
        self.remove_connection_entry(&connection);
        self.network_modified();
        Ok(())
    }

    fn remove_connection_entry(&mut self, connection: &PortConnection) {
        if !self.connections.shift_remove(connection) {
            return;
        }
        self.graph
            .remove_edge(&connection.outport.processor, &connection.inport.processor);
        self.version += 1;

        tracing::trace!(%connection, "connection removed");
        self.notify(|o| o.on_connection_removed(connection));
        self.propagate_invalidation(
            &connection.inport.processor,
            InvalidationLevel::InvalidOutput,
        );
    }

    pub fn is_connected(&self, outport: &str, inport: &str) -> bool {
        match (outport.parse(), inport.parse()) {
            (Ok(outport), Ok(inport)) => {
                self.connections.contains(&PortConnection::new(outport, inport))
            }
            _ => false,
        }
    }

    /// All connections in the order they were made.
    pub fn connections(&self) -> impl Iterator<Item = &PortConnection> {
        self.connections.iter()
    }

    /// Connections feeding the given inport.
    pub fn connections_to<'a>(
        &'a self,
        inport: &'a PortPath,
    ) -> impl Iterator<Item = &'a PortConnection> {
        self.connections.iter().filter(move |c| c.inport == *inport)
    }

    /// Check if `processor.port` names an inport or outport in the network.
    pub fn is_port_in_network(&self, path: &str) -> bool {
        let Ok(path) = path.parse::<PortPath>() else {
            return false;
        };
        self.processors.get(&path.processor).is_some_and(|entry| {
            let base = entry.processor.base();
            base.inport(&path.port).is_some() || base.outport(&path.port).is_some()
        })
    }

    pub(super) fn outport_at(&self, path: &PortPath) -> Option<&Outport> {
        self.processors
            .get(&path.processor)?
            .processor
            .base()
            .outport(&path.port)
    }

    fn find_outport(&self, path: &PortPath) -> Result<&Outport> {
        let entry = self
            .processors
            .get(&path.processor)
            .ok_or_else(|| NetworkError::NotInNetwork(path.processor.clone()))?;
        entry
            .processor
            .base()
            .outport(&path.port)
            .ok_or_else(|| NetworkError::UnknownPort {
                processor: path.processor.clone(),
                port: path.port.clone(),
            })
    }

    fn find_inport(&self, path: &PortPath) -> Result<&crate::ports::Inport> {
        let entry = self
            .processors
            .get(&path.processor)
            .ok_or_else(|| NetworkError::NotInNetwork(path.processor.clone()))?;
        entry
            .processor
            .base()
            .inport(&path.port)
            .ok_or_else(|| NetworkError::UnknownPort {
                processor: path.processor.clone(),
                port: path.port.clone(),
            })
    }

    // ------------------------------------------------------------------------
    // Invalidation
    // ------------------------------------------------------------------------

    /// Invalidate a processor and everything downstream of it.
    pub fn invalidate_processor(
        &mut self,
        identifier: &str,
        level: InvalidationLevel,
    ) -> Result<()> {
        if !self.processors.contains_key(identifier) {
            return Err(NetworkError::NotInNetwork(identifier.to_string()));
        }
        self.propagate_invalidation(identifier, level);
        Ok(())
    }

    pub(super) fn propagate_invalidation(&mut self, identifier: &str, level: InvalidationLevel) {
        self.begin_invalidation();
        self.invalidate_from(identifier, Some(level));
        self.end_invalidation();
    }

    /// Invalidate only what lies downstream of `identifier`.
    pub(super) fn invalidate_dependents(&mut self, identifier: &str) {
        self.begin_invalidation();
        self.invalidate_from(identifier, None);
        self.end_invalidation();
    }

    /// Breadth-first walk down the graph. A processor that delays
    /// invalidation still serves its old outputs, so the walk stops there.
    fn invalidate_from(&mut self, identifier: &str, level: Option<InvalidationLevel>) {
        let holds = match level {
            Some(level) => self.invalidate_one(identifier, level),
            None => false,
        };
        if holds {
            return;
        }

        let mut visited = HashSet::from([identifier.to_string()]);
        let mut queue: VecDeque<String> = self.graph.dependents(identifier).into();
        while let Some(current) = queue.pop_front() {
            if !visited.insert(current.clone()) {
                continue;
            }
            if !self.invalidate_one(&current, InvalidationLevel::InvalidOutput) {
                queue.extend(self.graph.dependents(&current));
            }
        }
    }

    /// Returns true if the processor kept its outports ready.
    fn invalidate_one(&mut self, identifier: &str, level: InvalidationLevel) -> bool {
        let Some(entry) = self.processors.get_mut(identifier) else {
            return false;
        };
        let base = entry.processor.base_mut();
        let holds = base.jobs().options().delay_invalidation;
        if holds {
            base.invalidate_keeping_outputs(level);
        } else {
            base.invalidate(level);
        }
        self.dirty.insert(identifier.to_string());
        holds
    }

    pub(super) fn begin_invalidation(&mut self) {
        if self.invalidation_depth == 0 && self.lock_depth == 0 {
            self.invalidation_notified = true;
            self.notify(|o| o.on_invalidation_begin());
        }
        self.invalidation_depth += 1;
    }

    pub(super) fn end_invalidation(&mut self) {
        self.invalidation_depth = self.invalidation_depth.saturating_sub(1);
        if self.invalidation_depth > 0 || !self.invalidation_notified {
            return;
        }
        self.invalidation_notified = false;
        self.notify(|o| o.on_invalidation_end());
        if !self.dirty.is_empty() {
            tracing::trace!(processors = self.dirty.len(), "requesting evaluation");
            self.dirty.clear();
            self.notify(|o| o.on_evaluate_request());
        }
    }

    // ------------------------------------------------------------------------
    // State queries
    // ------------------------------------------------------------------------

    /// Incremented on every structural edit.
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn is_invalidating(&self) -> bool {
        self.invalidation_depth > 0
    }

    pub fn is_linking(&self) -> bool {
        self.linking
    }

    pub fn is_deserializing(&self) -> bool {
        self.deserializing
    }

    pub(crate) fn set_deserializing(&mut self, deserializing: bool) {
        self.deserializing = deserializing;
    }

    /// Background jobs submitted and not yet finished, over all processors.
    pub fn running_background_jobs(&self) -> usize {
        self.processors
            .values()
            .map(|entry| entry.processor.base().jobs().running_jobs())
            .sum()
    }
}

impl Drop for ProcessorNetwork {
    fn drop(&mut self) {
        for entry in self.processors.values_mut() {
            entry.processor.base_mut().jobs_mut().detach();
        }
    }
}

impl fmt::Debug for ProcessorNetwork {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcessorNetwork")
            .field("processors", &self.processors.keys().collect::<Vec<_>>())
            .field("connections", &self.connections.len())
            .field("links", &self.links.len())
            .field("version", &self.version)
            .field("lock_depth", &self.lock_depth)
            .finish()
    }
}
