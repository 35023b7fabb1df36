//! Graph Nodes
//!
//! This module defines the per-processor node of the dependency graph.

use indexmap::IndexMap;

/// A processor's position in the dependency graph.
///
/// Edges are counted: two connections between the same pair of processors
/// make one edge of multiplicity two, and the edge only disappears when both
/// connections are gone.
#[derive(Debug, Default, Clone)]
pub struct GraphNode {
    /// Processors this one reads from (upstream), with edge counts.
    dependencies: IndexMap<String, usize>,

    /// Processors reading from this one (downstream), with edge counts.
    dependents: IndexMap<String, usize>,
}

impl GraphNode {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_dependency(&mut self, id: &str) {
        *self.dependencies.entry(id.to_string()).or_insert(0) += 1;
    }

    pub fn remove_dependency(&mut self, id: &str) {
        decrement(&mut self.dependencies, id);
    }

    /// Upstream processors.
    pub fn dependencies(&self) -> impl Iterator<Item = &str> {
        self.dependencies.keys().map(String::as_str)
    }

    pub fn add_dependent(&mut self, id: &str) {
        *self.dependents.entry(id.to_string()).or_insert(0) += 1;
    }

    pub fn remove_dependent(&mut self, id: &str) {
        decrement(&mut self.dependents, id);
    }

    /// Downstream processors.
    pub fn dependents(&self) -> impl Iterator<Item = &str> {
        self.dependents.keys().map(String::as_str)
    }

    /// Drop every edge to `id`, whatever its multiplicity.
    pub fn remove_dependent_all(&mut self, id: &str) {
        self.dependents.shift_remove(id);
    }

    pub fn remove_dependency_all(&mut self, id: &str) {
        self.dependencies.shift_remove(id);
    }

    pub fn has_dependent(&self, id: &str) -> bool {
        self.dependents.contains_key(id)
    }

    pub fn in_degree(&self) -> usize {
        self.dependencies.len()
    }
}

fn decrement(counts: &mut IndexMap<String, usize>, id: &str) {
    if let Some(count) = counts.get_mut(id) {
        *count -= 1;
        if *count == 0 {
            counts.shift_remove(id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn edges_are_counted() {
        let mut node = GraphNode::new();
        node.add_dependent("b");
        node.add_dependent("b");
        node.add_dependent("c");
        assert_eq!(node.dependents().collect::<Vec<_>>(), vec!["b", "c"]);

        node.remove_dependent("b");
        assert!(node.has_dependent("b"));
        node.remove_dependent("b");
        assert!(!node.has_dependent("b"));

        // Removing an absent edge is a no-op
        node.remove_dependent("z");
        assert_eq!(node.dependents().count(), 1);
    }

    #[test]
    fn dependency_management() {
        let mut node = GraphNode::new();
        node.add_dependency("a");
        node.add_dependency("b");
        assert_eq!(node.in_degree(), 2);

        node.remove_dependency("a");
        assert_eq!(node.dependencies().collect::<Vec<_>>(), vec!["b"]);
    }
}
