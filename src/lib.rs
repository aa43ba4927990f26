//! Netclade
//!
//! Compares two patient cohorts through the protein interaction subnetworks
//! implied by each patient's genes. Every patient's proteins are joined by
//! shortest interactome paths; patients are then clustered by how much their
//! subnetworks overlap, and each clade of the resulting dendrogram gets a
//! bootstrap confidence.
//!
//! The graph, clustering and bootstrap algorithms live in
//! [`netclade_algorithms`]; this crate adds the file formats, the biology and
//! the pipeline around them.
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use netclade::{AnalysisSession, Configuration};
//!
//! let config = Configuration::from_file("study/analysis.config")?;
//! let session = AnalysisSession::run(config)?;
//! session.write_outputs()?;
//!
//! for cluster in session.summary() {
//!     println!("{}", cluster.printable());
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod analysis;
pub mod bio;
pub mod config;
pub mod input;
pub mod network;

pub use analysis::{AnalysisError, AnalysisResult, AnalysisSession, ClusterAnalysis, SimilarityMetric};
pub use bio::{Cohort, CohortKind, GeneSet, ProteinId, ProteinRegistry};
pub use config::{AnalysisConfig, ConfigError, Configuration, GeneralConfig};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
