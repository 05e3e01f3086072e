//! Dependency graph management using `petgraph`.
//!
//! Builds a directed graph from name-to-name dependencies and yields a
//! dependency-first topological order. Used for the build order of a
//! resolved catalog and for the startup order of compiled services.

use std::collections::HashMap;

use petgraph::graph::{Graph, NodeIndex};

/// A dependency graph keyed by name.
#[derive(Debug, Default)]
pub struct DependencyGraph {
    graph: Graph<String, ()>,
    nodes: HashMap<String, NodeIndex>,
}

impl DependencyGraph {
    /// Creates an empty dependency graph.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a node, returning the existing index if `name` is already present.
    pub fn add_node(&mut self, name: &str) -> NodeIndex {
        if let Some(&idx) = self.nodes.get(name) {
            return idx;
        }
        let idx = self.graph.add_node(name.to_owned());
        let _ = self.nodes.insert(name.to_owned(), idx);
        idx
    }

    /// Adds a dependency edge: `dependent` depends on `dependency`.
    ///
    /// The edge points from `dependency` to `dependent` so that a topological
    /// sort yields dependencies first. Missing nodes are created.
    pub fn add_dependency(&mut self, dependent: &str, dependency: &str) {
        let from = self.add_node(dependency);
        let to = self.add_node(dependent);
        let _ = self.graph.update_edge(from, to, ());
    }

    /// Number of nodes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.graph.node_count()
    }

    /// Returns `true` if the graph has no nodes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    /// Returns a dependency-first topological ordering of all nodes.
    ///
    /// The order is deterministic for a fixed insertion order.
    ///
    /// # Errors
    ///
    /// Returns the name of a node on a cycle if the graph is cyclic.
    pub fn resolve_order(&self) -> Result<Vec<String>, String> {
        match petgraph::algo::toposort(&self.graph, None) {
            Ok(indices) => Ok(indices
                .iter()
                .filter_map(|&idx| self.graph.node_weight(idx).cloned())
                .collect()),
            Err(cycle) => Err(self
                .graph
                .node_weight(cycle.node_id())
                .cloned()
                .unwrap_or_default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_graph_resolves_to_empty() {
        let graph = DependencyGraph::new();
        let order = graph.resolve_order().expect("should resolve");
        assert!(order.is_empty());
        assert!(graph.is_empty());
    }

    #[test]
    fn linear_dependency_chain() {
        let mut graph = DependencyGraph::new();
        graph.add_dependency("frontend", "backend");

        let order = graph.resolve_order().expect("should resolve");
        assert_eq!(order, vec!["backend", "frontend"]);
    }

    #[test]
    fn diamond_dependency() {
        let mut graph = DependencyGraph::new();
        graph.add_dependency("app", "numpy");
        graph.add_dependency("app", "scipy");
        graph.add_dependency("numpy", "openblas");
        graph.add_dependency("scipy", "openblas");
        graph.add_dependency("scipy", "numpy");

        let order = graph.resolve_order().expect("should resolve");
        assert_eq!(order.len(), 4);
        let pos = |name: &str| order.iter().position(|n| n == name).expect(name);
        assert!(pos("openblas") < pos("numpy"));
        assert!(pos("numpy") < pos("scipy"));
        assert!(pos("scipy") < pos("app"));
    }

    #[test]
    fn duplicate_nodes_and_edges_collapse() {
        let mut graph = DependencyGraph::new();
        graph.add_dependency("a", "b");
        graph.add_dependency("a", "b");
        let _ = graph.add_node("a");
        assert_eq!(graph.len(), 2);
    }

    #[test]
    fn cycle_detection_names_a_member() {
        let mut graph = DependencyGraph::new();
        graph.add_dependency("a", "b");
        graph.add_dependency("b", "c");
        graph.add_dependency("c", "a");

        let member = graph.resolve_order().unwrap_err();
        assert!(["a", "b", "c"].contains(&member.as_str()), "got: {member}");
    }
}
