//! Dependency Graph
//!
//! Tracks which processors read from which, as derived from the port
//! connections of a network.
//!
//! # Overview
//!
//! The graph is a directed acyclic graph (DAG) where:
//!
//! - Nodes are processors, keyed by identifier
//! - Edges point downstream: if B has an inport connected to an outport of
//!   A, there is an edge from A to B
//!
//! When a processor is invalidated, the network walks the graph to find all
//! affected processors. An evaluation driver walks it in topological order.
//!
//! Both forward (dependencies) and reverse (dependents) edges are stored so
//! traversal is cheap in both directions.

mod node;
mod scheduler;

pub use node::GraphNode;
pub use scheduler::DependencyGraph;
