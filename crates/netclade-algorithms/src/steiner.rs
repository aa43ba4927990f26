//! Budgeted multi-terminal path union
//!
//! Greedy approximation of a minimum Steiner network: terminals are taken in
//! descending degree order and joined to every terminal already included through
//! cached shortest paths, until the next terminal would push the vertex count past
//! the budget. Processing stops at the first terminal that does not fit.

use crate::common::{Edge, NodeKey};
use crate::graph::Graph;
use crate::pathfinding::Pathfinder;
use std::cmp::Reverse;
use std::collections::BTreeSet;
use tracing::debug;

impl<K: NodeKey, A: Clone> Graph<K, A> {
    /// Reduce the graph to the union of shortest paths between `endpoints`,
    /// bounded by `max_vertices`.
    ///
    /// Terminals missing from the graph are ignored. The result never holds more than
    /// `max_vertices` nodes; when even the first pair does not fit it is empty.
    pub fn reduce_by_paths<'a, I>(&self, endpoints: I, max_vertices: usize) -> Graph<K, A>
    where
        I: IntoIterator<Item = &'a K>,
        K: 'a,
    {
        let mut reduced = self.empty_like();

        let unique: BTreeSet<&K> = endpoints.into_iter().filter(|k| self.contains_node(k)).collect();
        let mut terminals: Vec<&K> = unique.into_iter().collect();
        terminals.sort_by_key(|k| (Reverse(self.degree(k)), *k));

        let Some((&seed, rest)) = terminals.split_first() else {
            return reduced;
        };
        if max_vertices == 0 {
            return reduced;
        }

        let mut included_vertices: BTreeSet<K> = BTreeSet::new();
        included_vertices.insert(seed.clone());
        let mut included_terminals: Vec<&K> = vec![seed];
        let mut path_edges: BTreeSet<Edge<K>> = BTreeSet::new();

        for &terminal in rest {
            let paths: Vec<_> = included_terminals
                .iter()
                .map(|other| self.find_path(terminal, other))
                .filter(|path| !path.is_empty())
                .collect();

            let new_vertices: BTreeSet<K> = paths
                .iter()
                .flat_map(|path| path.nodes())
                .filter(|node| !included_vertices.contains(node))
                .collect();

            if included_vertices.len() + new_vertices.len() > max_vertices {
                debug!(
                    "Vertex budget {} reached with {} of {} terminals",
                    max_vertices,
                    included_terminals.len(),
                    terminals.len()
                );
                break;
            }
            if paths.is_empty() {
                continue;
            }

            for path in &paths {
                for edge in path.edges() {
                    let mirror = edge.reversed();
                    if self.contains_edge(&mirror) {
                        path_edges.insert(mirror);
                    }
                    path_edges.insert(edge.clone());
                }
            }
            included_vertices.extend(new_vertices);
            included_terminals.push(terminal);
        }

        for edge in path_edges {
            reduced.insert_edge(edge);
        }
        reduced.copy_annotations_from(self);
        reduced
    }
}
