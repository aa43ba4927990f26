//! Core algorithms for comparing patient cohorts by their interactome subnetworks.
//!
//! The crate is deliberately free of any file formats or biology: keys are opaque,
//! totally ordered identifiers and every structure here can be exercised with plain
//! strings in tests.

pub mod common;
pub mod graph;
pub mod pathfinding;
pub mod layered;
pub mod steiner;
pub mod distance;
pub mod tree;
pub mod upgma;
pub mod bootstrap;

pub use common::{Edge, NodeKey, Path};
pub use graph::{Graph, GraphError, GraphResult};
pub use pathfinding::{CostModel, PathCache, PathSearch, Pathfinder, SearchBudget};
pub use distance::{DistanceError, DistanceMatrix, DistanceResult};
pub use tree::{MergeTree, NodeIdx, TreeNode};
pub use upgma::build_tree;
pub use bootstrap::{
    retention_probability, BernoulliRetention, BootstrapConfig, BootstrapError,
    BootstrapEstimator, BootstrapOutcome, BootstrapResult, FullRetention, PresenceMatrix,
    Resampler, ResamplingScheme, WithReplacement, MIN_BOOTSTRAP_ROUNDS,
};
