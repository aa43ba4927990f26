//! Patient clustering and the results derived from it

pub mod cluster;
pub mod export;
pub mod pipeline;
pub mod similarity;

pub use cluster::{ClusterAnalysis, ClusterMap, SUMMARY_HEADERS};
pub use export::{CladeExport, GraphKind};
pub use pipeline::{AnalysisError, AnalysisResult, AnalysisSession};
pub use similarity::{Feature, SimilarityMetric};
