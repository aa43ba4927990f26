//! Shared types for graph algorithms
//!
//! Edges and paths are generic over an opaque node key. Keys must be totally ordered:
//! the ordering canonicalizes undirected pairs and breaks ties deterministically.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::hash::Hash;

/// Bound satisfied by every node identifier used with [`crate::Graph`].
pub trait NodeKey: Ord + Hash + Clone + fmt::Debug {}

impl<T: Ord + Hash + Clone + fmt::Debug> NodeKey for T {}

/// A directed, weighted edge. Undirected relationships are stored as two edges.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Edge<K> {
    pub source: K,
    pub target: K,
    /// Confidence/strength score of the interaction
    pub weight: u32,
}

impl<K: Clone> Edge<K> {
    pub fn new(source: K, target: K, weight: u32) -> Self {
        Edge { source, target, weight }
    }

    /// The same relationship read in the opposite direction
    pub fn reversed(&self) -> Self {
        Edge {
            source: self.target.clone(),
            target: self.source.clone(),
            weight: self.weight,
        }
    }
}

impl<K: fmt::Display> fmt::Display for Edge<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.source, self.weight, self.target)
    }
}

/// A connected walk of edges.
///
/// The empty path is the "no path found" sentinel; it is never represented by `None`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Path<K> {
    edges: Vec<Edge<K>>,
    cost: f64,
}

impl<K: Clone + PartialEq> Path<K> {
    /// The "no path" sentinel
    pub fn empty() -> Self {
        Path { edges: Vec::new(), cost: 0.0 }
    }

    /// Build a path from contiguous edges and its total cost under some cost model.
    pub fn new(edges: Vec<Edge<K>>, cost: f64) -> Self {
        assert!(
            edges.windows(2).all(|w| w[0].target == w[1].source),
            "path edges must be contiguous"
        );
        Path { edges, cost }
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    /// Hop count
    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn edges(&self) -> &[Edge<K>] {
        &self.edges
    }

    /// Total cost under the cost model the path was computed with
    pub fn cost(&self) -> f64 {
        self.cost
    }

    /// Sum of raw edge weights
    pub fn total_weight(&self) -> u64 {
        self.edges.iter().map(|e| e.weight as u64).sum()
    }

    pub fn source(&self) -> Option<&K> {
        self.edges.first().map(|e| &e.source)
    }

    pub fn target(&self) -> Option<&K> {
        self.edges.last().map(|e| &e.target)
    }

    /// Visited nodes in walk order, endpoints included
    pub fn nodes(&self) -> Vec<K> {
        let mut nodes = Vec::with_capacity(self.edges.len() + 1);
        if let Some(first) = self.edges.first() {
            nodes.push(first.source.clone());
        }
        nodes.extend(self.edges.iter().map(|e| e.target.clone()));
        nodes
    }

    pub fn unique_nodes(&self) -> BTreeSet<K>
    where
        K: Ord,
    {
        self.nodes().into_iter().collect()
    }

    /// The same walk traversed from the other end
    pub fn reversed(&self) -> Self {
        Path {
            edges: self.edges.iter().rev().map(Edge::reversed).collect(),
            cost: self.cost,
        }
    }

    /// Read the path starting at `from`.
    ///
    /// Cached paths are stored in canonical orientation, so a caller that asked for
    /// the reverse pair gets the edge sequence flipped here.
    pub fn oriented_from(&self, from: &K) -> Self {
        match self.source() {
            Some(source) if source != from => self.reversed(),
            _ => self.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn abc() -> Path<&'static str> {
        Path::new(
            vec![Edge::new("A", "B", 500), Edge::new("B", "C", 400)],
            1100.0,
        )
    }

    #[test]
    fn test_path_nodes() {
        let path = abc();
        assert_eq!(path.nodes(), vec!["A", "B", "C"]);
        assert_eq!(path.len(), 2);
        assert_eq!(path.total_weight(), 900);
        assert_eq!(path.source(), Some(&"A"));
        assert_eq!(path.target(), Some(&"C"));
    }

    #[test]
    fn test_empty_path_sentinel() {
        let path: Path<&str> = Path::empty();
        assert!(path.is_empty());
        assert!(path.nodes().is_empty());
        assert!(path.unique_nodes().is_empty());
        assert_eq!(path.source(), None);
    }

    #[test]
    fn test_oriented_from() {
        let path = abc();
        let flipped = path.oriented_from(&"C");
        assert_eq!(flipped.nodes(), vec!["C", "B", "A"]);
        assert_eq!(flipped.cost(), path.cost());
        assert_eq!(path.oriented_from(&"A"), path);
    }

    #[test]
    #[should_panic(expected = "contiguous")]
    fn test_disconnected_edges_rejected() {
        Path::new(vec![Edge::new("A", "B", 1), Edge::new("C", "D", 1)], 2.0);
    }
}
