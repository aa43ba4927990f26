//! Patient graph dissimilarity
//!
//! Two patients are compared by the features of their path graphs: either the
//! proteins (nodes) or the undirected interactions (edges) they contain.

use crate::bio::ProteinId;
use netclade_algorithms::Graph;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// Which graph features enter the intersection-over-union
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SimilarityMetric {
    #[default]
    Nodes,
    Edges,
}

impl FromStr for SimilarityMetric {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "nodes" | "node" => Ok(SimilarityMetric::Nodes),
            "edges" | "edge" => Ok(SimilarityMetric::Edges),
            other => Err(format!("unknown similarity metric '{}', expected nodes or edges", other)),
        }
    }
}

impl fmt::Display for SimilarityMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SimilarityMetric::Nodes => write!(f, "nodes"),
            SimilarityMetric::Edges => write!(f, "edges"),
        }
    }
}

/// A comparable graph feature. Edges are stored with the smaller endpoint first.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Feature {
    Node(ProteinId),
    Edge(ProteinId, ProteinId),
}

impl SimilarityMetric {
    pub fn features<A: Clone>(&self, graph: &Graph<ProteinId, A>) -> BTreeSet<Feature> {
        match self {
            SimilarityMetric::Nodes => graph.nodes().cloned().map(Feature::Node).collect(),
            SimilarityMetric::Edges => graph
                .edges()
                .map(|e| {
                    if e.source <= e.target {
                        Feature::Edge(e.source.clone(), e.target.clone())
                    } else {
                        Feature::Edge(e.target.clone(), e.source.clone())
                    }
                })
                .collect(),
        }
    }

    /// Dissimilarity of two graphs under this metric
    pub fn distance<A: Clone>(&self, a: &Graph<ProteinId, A>, b: &Graph<ProteinId, A>) -> f64 {
        iou_distance(&self.features(a), &self.features(b))
    }
}

/// `1 - |A ∩ B| / |A ∪ B|`; two empty sets are maximally distant
pub fn iou_distance<T: Ord>(a: &BTreeSet<T>, b: &BTreeSet<T>) -> f64 {
    let shared = a.intersection(b).count();
    let union = a.len() + b.len() - shared;
    if union == 0 {
        1.0
    } else {
        1.0 - shared as f64 / union as f64
    }
}
