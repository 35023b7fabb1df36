//! Processor Dependency Graph
//!
//! The graph determines which processors a change reaches and the order in
//! which they must be evaluated.
//!
//! # Algorithm
//!
//! - Invalidation follows dependent edges breadth-first from the changed
//!   processor, visiting each downstream processor once.
//! - Evaluation order is a topological sort (Kahn's algorithm), so every
//!   processor comes after all the processors it reads from. Ties are broken
//!   by insertion order, which makes the order deterministic.
//! - A new edge is rejected if its target already reaches its source, which
//!   keeps the graph acyclic.

use std::collections::{HashMap, HashSet, VecDeque};

use indexmap::IndexMap;

use super::node::GraphNode;

/// Dependency graph over processor identifiers.
#[derive(Debug, Default, Clone)]
pub struct DependencyGraph {
    /// All nodes in insertion order.
    nodes: IndexMap<String, GraphNode>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_node(&mut self, id: &str) {
        self.nodes.entry(id.to_string()).or_default();
    }

    /// Remove a node and every edge involving it.
    pub fn remove_node(&mut self, id: &str) {
        let Some(node) = self.nodes.shift_remove(id) else {
            return;
        };

        // Remove this node from its dependencies' dependent lists
        for dependency in node.dependencies() {
            if let Some(dep) = self.nodes.get_mut(dependency) {
                dep.remove_dependent_all(id);
            }
        }

        // Remove this node from its dependents' dependency lists
        for dependent in node.dependents() {
            if let Some(node) = self.nodes.get_mut(dependent) {
                node.remove_dependency_all(id);
            }
        }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn node(&self, id: &str) -> Option<&GraphNode> {
        self.nodes.get(id)
    }

    /// Add an edge: `dependent` reads from `dependency`.
    pub fn add_edge(&mut self, dependency: &str, dependent: &str) {
        if let Some(node) = self.nodes.get_mut(dependency) {
            node.add_dependent(dependent);
        }
        if let Some(node) = self.nodes.get_mut(dependent) {
            node.add_dependency(dependency);
        }
    }

    /// Remove one edge between the two processors.
    pub fn remove_edge(&mut self, dependency: &str, dependent: &str) {
        if let Some(node) = self.nodes.get_mut(dependency) {
            node.remove_dependent(dependent);
        }
        if let Some(node) = self.nodes.get_mut(dependent) {
            node.remove_dependency(dependency);
        }
    }

    /// Direct dependents of a processor.
    pub fn dependents(&self, id: &str) -> Vec<String> {
        self.nodes
            .get(id)
            .map(|node| node.dependents().map(str::to_string).collect())
            .unwrap_or_default()
    }

    /// Every processor reachable downstream of `id`, breadth-first,
    /// excluding `id` itself.
    pub fn downstream(&self, id: &str) -> Vec<String> {
        let mut result = Vec::new();
        let mut visited = HashSet::new();
        let mut queue: VecDeque<&str> = VecDeque::new();
        visited.insert(id);

        if let Some(node) = self.nodes.get(id) {
            queue.extend(node.dependents());
        }

        while let Some(current) = queue.pop_front() {
            if !visited.insert(current) {
                continue;
            }
            result.push(current.to_string());
            if let Some(node) = self.nodes.get(current) {
                queue.extend(node.dependents());
            }
        }

        result
    }

    /// Check if `to` is reachable from `from` along dependent edges.
    pub fn reaches(&self, from: &str, to: &str) -> bool {
        from == to || self.downstream(from).iter().any(|id| id == to)
    }

    /// Check if adding `dependency -> dependent` would close a cycle.
    pub fn would_cycle(&self, dependency: &str, dependent: &str) -> bool {
        self.reaches(dependent, dependency)
    }

    /// All processors in dependency order.
    pub fn topological_order(&self) -> Vec<String> {
        let mut in_degree: HashMap<&str, usize> = HashMap::new();
        let mut queue = VecDeque::new();
        let mut result = Vec::with_capacity(self.nodes.len());

        for (id, node) in &self.nodes {
            let degree = node.in_degree();
            in_degree.insert(id.as_str(), degree);
            if degree == 0 {
                queue.push_back(id.as_str());
            }
        }

        // Kahn's algorithm
        while let Some(id) = queue.pop_front() {
            result.push(id.to_string());

            if let Some(node) = self.nodes.get(id) {
                for dependent in node.dependents() {
                    if let Some(degree) = in_degree.get_mut(dependent) {
                        *degree = degree.saturating_sub(1);
                        if *degree == 0 {
                            queue.push_back(dependent);
                        }
                    }
                }
            }
        }

        result
    }

    /// Number of processors in the graph.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn clear(&mut self) {
        self.nodes.clear();
    }
}
