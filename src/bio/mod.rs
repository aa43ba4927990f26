//! Proteins, genes and patient cohorts

pub mod cohort;
pub mod registry;

pub use cohort::{Cohort, CohortError, CohortKind, CohortResult, GeneSet};
pub use registry::{ProteinId, ProteinRegistry, RegistryError, RegistryResult};
