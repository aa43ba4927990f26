//! Layered count graphs
//!
//! A `Graph<K, f64>` whose annotation counts how many layered graphs contained each
//! node. Cohort summary graphs are built by layering every patient graph, and two
//! cohorts are contrasted with [`Graph::subtract`].

use crate::common::NodeKey;
use crate::graph::Graph;
use std::collections::BTreeSet;

impl<K: NodeKey> Graph<K, f64> {
    /// Layer count of a node, zero when absent
    pub fn count(&self, node: &K) -> f64 {
        self.annotation(node).copied().unwrap_or(0.0)
    }

    /// Largest layer count in the graph
    pub fn max_count(&self) -> f64 {
        self.annotations().map(|(_, c)| *c).fold(0.0, f64::max)
    }

    /// Merge another graph's edges, then count one layer for each of its nodes
    pub fn add_layer<B: Clone>(&mut self, layer: &Graph<K, B>) {
        for edge in layer.edges() {
            self.insert_edge(edge.clone());
        }
        for node in layer.nodes() {
            self.add_node(node.clone());
            let next = self.count(node) + 1.0;
            // Node was registered above
            let _ = self.set_annotation(node, next);
        }
    }

    /// Nodes over-represented in `self` relative to `other`.
    ///
    /// A node is retained when `other` lacks it or when `lhs_factor * count`
    /// exceeds `rhs_factor * other_count`. The result holds the edges among
    /// retained nodes, annotated with the scaled count difference.
    pub fn subtract(&self, other: &Graph<K, f64>, lhs_factor: f64, rhs_factor: f64) -> Graph<K, f64> {
        let scaled_other = |node: &K| {
            if other.contains_node(node) {
                rhs_factor * other.count(node)
            } else {
                0.0
            }
        };

        let retained: BTreeSet<K> = self
            .nodes()
            .filter(|node| !other.contains_node(node) || lhs_factor * self.count(node) > scaled_other(node))
            .cloned()
            .collect();

        let mut result = self.empty_like();
        for node in &retained {
            if let Ok(edges) = self.neighbors(node) {
                for edge in edges.iter().filter(|e| retained.contains(&e.target)) {
                    result.insert_edge(edge.clone());
                }
            }
        }

        let nodes: Vec<K> = result.nodes().cloned().collect();
        for node in nodes {
            let difference = lhs_factor * self.count(&node) - scaled_other(&node);
            let _ = result.set_annotation(&node, difference);
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn patient(edges: &[(&'static str, &'static str)]) -> Graph<&'static str> {
        let mut g = Graph::new();
        for (a, b) in edges {
            g.add_edge(*a, *b, 900, true).unwrap();
        }
        g
    }

    #[test]
    fn test_add_layer_counts_nodes() {
        let mut layered: Graph<&str, f64> = Graph::new();
        layered.add_layer(&patient(&[("A", "B")]));
        layered.add_layer(&patient(&[("B", "C")]));

        assert_eq!(layered.count(&"A"), 1.0);
        assert_eq!(layered.count(&"B"), 2.0);
        assert_eq!(layered.count(&"C"), 1.0);
        assert_eq!(layered.count(&"Z"), 0.0);
        assert_eq!(layered.max_count(), 2.0);
        assert_eq!(layered.edge_count(), 4);
    }

    #[test]
    fn test_subtract() {
        let mut group1: Graph<&str, f64> = Graph::new();
        group1.add_layer(&patient(&[("A", "B"), ("B", "C")]));
        group1.add_layer(&patient(&[("A", "B")]));

        let mut group2: Graph<&str, f64> = Graph::new();
        group2.add_layer(&patient(&[("B", "C")]));

        let diff = group1.subtract(&group2, 1.0, 1.0);

        // A: absent from group2; B: 2 > 1; C: 1 vs 1 dropped
        assert_eq!(diff.nodes().copied().collect::<Vec<_>>(), vec!["A", "B"]);
        assert_eq!(diff.count(&"A"), 2.0);
        assert_eq!(diff.count(&"B"), 1.0);
        assert_eq!(diff.edge_count(), 2);
    }

    #[test]
    fn test_subtract_scaling() {
        let mut group1: Graph<&str, f64> = Graph::new();
        group1.add_layer(&patient(&[("A", "B")]));
        let mut group2: Graph<&str, f64> = Graph::new();
        group2.add_layer(&patient(&[("A", "B")]));

        assert!(group1.subtract(&group2, 1.0, 1.0).is_empty());
        let scaled = group1.subtract(&group2, 3.0, 1.0);
        assert_eq!(scaled.count(&"A"), 2.0);
    }
}
