//! Weighted adjacency graph with per-node annotations
//!
//! One generic structure covers every graph flavor the analysis needs: the
//! interactome (`Graph<K>`), per-patient path graphs, and layered count graphs
//! (`Graph<K, f64>`, see [`crate::layered`]). Nodes exist implicitly as edge
//! endpoints. Adjacency is kept in ordered maps so iteration is reproducible.

use crate::common::{Edge, NodeKey};
use crate::pathfinding::{PathCache, PathSearch};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::io::{self, Write};
use thiserror::Error;

/// Errors that can occur during graph operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GraphError {
    #[error("Invalid edge {0}: endpoints must be distinct")]
    InvalidEdge(String),

    #[error("Node {0} not found")]
    UnknownNode(String),
}

pub type GraphResult<T> = Result<T, GraphError>;

/// Weighted graph: node -> outgoing edge set, plus an annotation per node.
///
/// The graph also owns a canonical shortest-path cache (see
/// [`crate::pathfinding`]); any structural mutation clears it.
#[derive(Debug)]
pub struct Graph<K, A = ()> {
    adjacency: BTreeMap<K, BTreeSet<Edge<K>>>,
    annotations: BTreeMap<K, A>,
    default_annotation: A,
    pub(crate) search: PathSearch,
    pub(crate) cache: PathCache<K>,
}

impl<K: NodeKey, A: Clone + Default> Graph<K, A> {
    pub fn new() -> Self {
        Self::with_default_annotation(A::default())
    }
}

impl<K: NodeKey, A: Clone + Default> Default for Graph<K, A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: NodeKey, A: Clone> Graph<K, A> {
    /// Create an empty graph whose implicitly created nodes start with `default_annotation`
    pub fn with_default_annotation(default_annotation: A) -> Self {
        Graph {
            adjacency: BTreeMap::new(),
            annotations: BTreeMap::new(),
            default_annotation,
            search: PathSearch::default(),
            cache: PathCache::new(),
        }
    }

    /// Set the parameters `find_path` searches with
    pub fn with_search(mut self, search: PathSearch) -> Self {
        self.search = search;
        self.cache.clear();
        self
    }

    pub fn search(&self) -> &PathSearch {
        &self.search
    }

    /// An empty graph sharing this graph's default annotation and search parameters
    pub fn empty_like(&self) -> Self {
        Self::with_default_annotation(self.default_annotation.clone()).with_search(self.search)
    }

    /// Register a node without edges
    pub fn add_node(&mut self, node: K) {
        self.annotations
            .entry(node.clone())
            .or_insert_with(|| self.default_annotation.clone());
        self.adjacency.entry(node).or_default();
    }

    /// Insert an edge, and its mirror when `bidirectional`. Self-loops are rejected.
    pub fn add_edge(&mut self, src: K, target: K, weight: u32, bidirectional: bool) -> GraphResult<()> {
        if src == target {
            return Err(GraphError::InvalidEdge(format!("{:?} -> {:?}", src, target)));
        }
        let edge = Edge::new(src, target, weight);
        if bidirectional {
            self.insert_edge(edge.reversed());
        }
        self.insert_edge(edge);
        Ok(())
    }

    /// Insert an already validated edge
    pub(crate) fn insert_edge(&mut self, edge: Edge<K>) {
        debug_assert!(edge.source != edge.target);
        self.add_node(edge.target.clone());
        self.add_node(edge.source.clone());
        if let Some(edges) = self.adjacency.get_mut(&edge.source) {
            edges.insert(edge);
        }
        self.cache.clear();
    }

    /// Remove a single directed edge. Returns whether it was present.
    pub fn remove_edge(&mut self, edge: &Edge<K>) -> bool {
        let removed = self
            .adjacency
            .get_mut(&edge.source)
            .map(|edges| edges.remove(edge))
            .unwrap_or(false);
        if removed {
            self.cache.clear();
        }
        removed
    }

    /// Remove a node, its annotation, and every edge touching it
    pub fn remove_node(&mut self, node: &K) -> bool {
        let Some(outgoing) = self.adjacency.remove(node) else {
            return false;
        };
        self.annotations.remove(node);
        for edge in outgoing {
            if let Some(edges) = self.adjacency.get_mut(&edge.target) {
                edges.retain(|e| &e.target != node);
            }
        }
        // Directed-only edges pointing at the node
        for edges in self.adjacency.values_mut() {
            edges.retain(|e| &e.target != node);
        }
        self.cache.clear();
        true
    }

    /// Outgoing edge set of a node
    pub fn neighbors(&self, node: &K) -> GraphResult<&BTreeSet<Edge<K>>> {
        self.adjacency
            .get(node)
            .ok_or_else(|| GraphError::UnknownNode(format!("{:?}", node)))
    }

    /// Number of outgoing edges, zero for unknown nodes
    pub fn degree(&self, node: &K) -> usize {
        self.adjacency.get(node).map(BTreeSet::len).unwrap_or(0)
    }

    pub fn contains_node(&self, node: &K) -> bool {
        self.adjacency.contains_key(node)
    }

    pub fn contains_edge(&self, edge: &Edge<K>) -> bool {
        self.adjacency
            .get(&edge.source)
            .map(|edges| edges.contains(edge))
            .unwrap_or(false)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &K> {
        self.adjacency.keys()
    }

    /// Every directed edge, grouped by source in key order
    pub fn edges(&self) -> impl Iterator<Item = &Edge<K>> {
        self.adjacency.values().flatten()
    }

    pub fn node_count(&self) -> usize {
        self.adjacency.len()
    }

    /// Number of directed edges (an undirected relationship counts twice)
    pub fn edge_count(&self) -> usize {
        self.adjacency.values().map(BTreeSet::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.adjacency.is_empty()
    }

    pub fn annotation(&self, node: &K) -> Option<&A> {
        self.annotations.get(node)
    }

    pub fn set_annotation(&mut self, node: &K, annotation: A) -> GraphResult<()> {
        match self.annotations.get_mut(node) {
            Some(slot) => {
                *slot = annotation;
                Ok(())
            }
            None => Err(GraphError::UnknownNode(format!("{:?}", node))),
        }
    }

    pub fn annotations(&self) -> impl Iterator<Item = (&K, &A)> {
        self.annotations.iter()
    }

    /// Edges among `nodes`, annotations carried over. Nodes left without edges are dropped.
    pub fn subgraph_with_nodes(&self, nodes: &BTreeSet<K>) -> Self {
        let mut sub = self.empty_like();
        for node in nodes {
            let Some(edges) = self.adjacency.get(node) else { continue };
            for edge in edges.iter().filter(|e| nodes.contains(&e.target)) {
                sub.insert_edge(edge.clone());
            }
        }
        sub.copy_annotations_from(self);
        sub
    }

    /// A graph holding exactly `edges`, annotations carried over
    pub fn subgraph_with_edges<'a, I>(&self, edges: I) -> Self
    where
        I: IntoIterator<Item = &'a Edge<K>>,
        K: 'a,
    {
        let mut sub = self.empty_like();
        for edge in edges {
            sub.insert_edge(edge.clone());
        }
        sub.copy_annotations_from(self);
        sub
    }

    pub(crate) fn copy_annotations_from(&mut self, other: &Self) {
        for (node, annotation) in self.annotations.iter_mut() {
            if let Some(a) = other.annotations.get(node) {
                *annotation = a.clone();
            }
        }
    }

    /// Write the graph as tab-separated text: one `node\tannotation` line per node,
    /// followed by one `source\ttarget\tweight` line per directed edge.
    pub fn save_to<W: Write>(&self, out: &mut W) -> io::Result<()>
    where
        K: fmt::Display,
        A: fmt::Display,
    {
        for node in self.adjacency.keys() {
            match self.annotations.get(node) {
                Some(a) => writeln!(out, "{}\t{}", node, a)?,
                None => writeln!(out, "{}", node)?,
            }
        }
        for edge in self.edges() {
            writeln!(out, "{}\t{}\t{}", edge.source, edge.target, edge.weight)?;
        }
        out.flush()
    }
}
