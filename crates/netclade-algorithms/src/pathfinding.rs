//! Pathfinding algorithms
//!
//! Budgeted Dijkstra over [`Graph`] and the canonical path cache behind
//! [`Pathfinder::find_path`]. Two budgets are enforced together: cumulative path cost
//! and hop count. An unreachable target yields the empty [`Path`].

use crate::common::{Edge, NodeKey, Path};
use crate::graph::Graph;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BinaryHeap};
use std::sync::{Arc, RwLock};

/// Anything that can connect two nodes
pub trait Pathfinder<K> {
    fn find_path(&self, src: &K, dst: &K) -> Arc<Path<K>>;
}

/// Upper bounds on an acceptable path
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SearchBudget {
    /// Maximum cumulative cost
    pub max_path_cost: f64,
    /// Maximum number of edges
    pub max_path_length: usize,
}

impl Default for SearchBudget {
    fn default() -> Self {
        Self {
            max_path_cost: f64::INFINITY,
            max_path_length: usize::MAX,
        }
    }
}

/// How an edge weight becomes a traversal cost
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum CostModel {
    /// cost = weight
    Weight,
    /// cost = ceiling - weight, turning a confidence score into a distance
    Inverted { ceiling: u32 },
}

impl CostModel {
    pub fn cost<K>(&self, edge: &Edge<K>) -> f64 {
        match *self {
            CostModel::Weight => edge.weight as f64,
            CostModel::Inverted { ceiling } => ceiling as f64 - edge.weight as f64,
        }
    }
}

/// Parameters [`Pathfinder::find_path`] runs Dijkstra with
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PathSearch {
    pub cost_model: CostModel,
    pub budget: SearchBudget,
}

impl Default for PathSearch {
    fn default() -> Self {
        Self {
            cost_model: CostModel::Weight,
            budget: SearchBudget::default(),
        }
    }
}

/// Memoized paths keyed `lower -> upper -> path`.
///
/// Lookups and inserts go through a lock so one interactome can serve
/// concurrent `find_path` calls. The first path stored for a pair wins; every
/// later request for that pair, in either order, gets the same `Arc`.
#[derive(Debug)]
pub struct PathCache<K> {
    entries: RwLock<BTreeMap<K, BTreeMap<K, Arc<Path<K>>>>>,
}

impl<K: NodeKey> PathCache<K> {
    pub fn new() -> Self {
        PathCache {
            entries: RwLock::new(BTreeMap::new()),
        }
    }

    /// Look up a canonical `(lower, upper)` pair
    pub fn get(&self, lower: &K, upper: &K) -> Option<Arc<Path<K>>> {
        debug_assert!(lower <= upper, "non-canonical cache key");
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        entries.get(lower).and_then(|row| row.get(upper)).cloned()
    }

    /// Store a path under a canonical pair, returning whichever path ends up cached
    pub fn insert(&self, lower: K, upper: K, path: Path<K>) -> Arc<Path<K>> {
        assert!(lower <= upper, "non-canonical cache key");
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        entries
            .entry(lower)
            .or_default()
            .entry(upper)
            .or_insert_with(|| Arc::new(path))
            .clone()
    }

    pub fn len(&self) -> usize {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        entries.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&mut self) {
        self.entries
            .get_mut()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
    }

    /// Every cached pair in canonical order
    pub fn snapshot(&self) -> Vec<(K, K, Arc<Path<K>>)> {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        entries
            .iter()
            .flat_map(|(lower, row)| {
                row.iter()
                    .map(move |(upper, path)| (lower.clone(), upper.clone(), Arc::clone(path)))
            })
            .collect()
    }
}

/// State for Dijkstra priority queue: one label of `node`
struct State<K> {
    cost: f64,
    hops: usize,
    node: K,
    label: usize,
}

impl<K: Ord> PartialEq for State<K> {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl<K: Ord> Eq for State<K> {}

impl<K: Ord> Ord for State<K> {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed for min-heap; equal costs pop the smaller key, then the fewer hops first
        other
            .cost
            .partial_cmp(&self.cost)
            .unwrap_or(Ordering::Equal)
            .then_with(|| other.node.cmp(&self.node))
            .then_with(|| other.hops.cmp(&self.hops))
            .then_with(|| other.label.cmp(&self.label))
    }
}

impl<K: Ord> PartialOrd for State<K> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// One way of reaching a node, extending the label it came from
struct Label<K> {
    cost: f64,
    hops: usize,
    via: Option<(usize, Edge<K>)>,
    dominated: bool,
}

impl<K: NodeKey, A: Clone> Graph<K, A> {
    /// Dijkstra's Algorithm (Budgeted Weighted Shortest Path)
    ///
    /// `cost` maps each edge to a traversal cost; edges with negative or non-finite
    /// cost are never traversed. The search runs over `(node, hops)` labels: a node
    /// keeps every label not beaten on both cost and hop count, so a dearer but
    /// shorter route survives a cheaper long one. The result is the cheapest path
    /// within both `max_path_cost` and `max_path_length`, or the empty path.
    pub fn dijkstras<F>(
        &self,
        source: &K,
        target: &K,
        cost: F,
        max_path_cost: f64,
        max_path_length: usize,
    ) -> Path<K>
    where
        F: Fn(&Edge<K>) -> f64,
    {
        if source == target || !self.contains_node(source) || !self.contains_node(target) {
            return Path::empty();
        }

        let mut labels: Vec<Label<K>> = vec![Label { cost: 0.0, hops: 0, via: None, dominated: false }];
        // Pareto front of live labels per node
        let mut fronts: FxHashMap<K, Vec<usize>> = FxHashMap::default();
        fronts.insert(source.clone(), vec![0]);
        let mut heap = BinaryHeap::new();
        heap.push(State { cost: 0.0, hops: 0, node: source.clone(), label: 0 });

        let mut reached = None;
        while let Some(State { cost: current, hops, node, label }) = heap.pop() {
            if labels[label].dominated {
                continue;
            }
            if &node == target {
                reached = Some(label);
                break;
            }
            if hops >= max_path_length {
                continue;
            }

            let Ok(edges) = self.neighbors(&node) else { continue };
            for edge in edges {
                let edge_cost = cost(edge);
                if !edge_cost.is_finite() || edge_cost < 0.0 {
                    continue;
                }

                let next_cost = current + edge_cost;
                let next_hops = hops + 1;
                if next_cost > max_path_cost {
                    continue;
                }

                let front = fronts.entry(edge.target.clone()).or_default();
                if front
                    .iter()
                    .any(|&i| labels[i].cost <= next_cost && labels[i].hops <= next_hops)
                {
                    continue;
                }
                front.retain(|&i| {
                    let beaten = next_cost <= labels[i].cost && next_hops <= labels[i].hops;
                    labels[i].dominated |= beaten;
                    !beaten
                });

                let next = labels.len();
                front.push(next);
                labels.push(Label {
                    cost: next_cost,
                    hops: next_hops,
                    via: Some((label, edge.clone())),
                    dominated: false,
                });
                heap.push(State { cost: next_cost, hops: next_hops, node: edge.target.clone(), label: next });
            }
        }

        let Some(end) = reached else {
            return Path::empty();
        };

        // Reconstruct path
        let mut edges = Vec::with_capacity(labels[end].hops);
        let mut curr = end;
        while let Some((previous, edge)) = &labels[curr].via {
            edges.push(edge.clone());
            curr = *previous;
        }
        edges.reverse();
        Path::new(edges, labels[end].cost)
    }

    /// Seed the cache with a known path between `src` and `dst`, e.g. one loaded from disk.
    /// The path is stored in canonical orientation.
    pub fn seed_path(&self, src: &K, dst: &K, path: Path<K>) -> Arc<Path<K>> {
        if src <= dst {
            self.cache.insert(src.clone(), dst.clone(), path.oriented_from(src))
        } else {
            self.cache.insert(dst.clone(), src.clone(), path.oriented_from(dst))
        }
    }

    /// Cost of a path under this graph's cost model
    pub fn path_cost(&self, edges: &[Edge<K>]) -> f64 {
        edges.iter().map(|e| self.search.cost_model.cost(e)).sum()
    }

    /// All memoized paths, canonical pairs in key order
    pub fn cached_paths(&self) -> Vec<(K, K, Arc<Path<K>>)> {
        self.cache.snapshot()
    }

    pub fn cached_path_count(&self) -> usize {
        self.cache.len()
    }
}

impl<K: NodeKey, A: Clone> Pathfinder<K> for Graph<K, A> {
    /// Cached budgeted shortest path.
    ///
    /// The request is reordered so the smaller key comes first; both `(a, b)` and
    /// `(b, a)` resolve to the same cached path, whose edges run from the smaller key.
    fn find_path(&self, src: &K, dst: &K) -> Arc<Path<K>> {
        if src == dst {
            return Arc::new(Path::empty());
        }
        let (lower, upper) = if src < dst { (src, dst) } else { (dst, src) };

        if let Some(path) = self.cache.get(lower, upper) {
            return path;
        }

        let search = self.search;
        let path = self.dijkstras(
            lower,
            upper,
            |e| search.cost_model.cost(e),
            search.budget.max_path_cost,
            search.budget.max_path_length,
        );
        self.cache.insert(lower.clone(), upper.clone(), path)
    }
}
