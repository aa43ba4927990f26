//! Patient gene sets and cohorts
//!
//! A gene set file holds one patient per line, `patientId=GENE1,GENE2,...`.
//! Each patient's graph is the union of the shortest interactome paths between
//! every pair of its proteins.

use super::registry::{ProteinId, ProteinRegistry};
use crate::input::{is_ignorable, open_text};
use netclade_algorithms::{Graph, GraphError, Pathfinder};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::io::{self, BufRead};
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Error, Debug)]
pub enum CohortError {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Gene set line without a patient identifier
    #[error("Gene set file line {line} is not validly formed: {content}")]
    Malformed { line: usize, content: String },

    /// Patient listed twice, within or across groups
    #[error("Cannot have duplicate patient identifier: {0}")]
    DuplicatePatient(String),

    /// Patient id shaped like a cluster id (`C` followed by digits)
    #[error("Patient identifier {0} clashes with cluster identifiers; rename the patient")]
    ReservedPatientId(String),

    /// Graph construction error
    #[error("Graph error: {0}")]
    Graph(#[from] GraphError),
}

pub type CohortResult<T> = Result<T, CohortError>;

/// Which side of the comparison a cohort represents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CohortKind {
    Group1,
    Group2,
    Combined,
}

impl fmt::Display for CohortKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CohortKind::Group1 => write!(f, "Group1"),
            CohortKind::Group2 => write!(f, "Group2"),
            CohortKind::Combined => write!(f, "Group1AndGroup2"),
        }
    }
}

/// One patient's genes, their proteins, and the path graph connecting them
#[derive(Debug, Clone)]
pub struct GeneSet {
    genes: BTreeSet<String>,
    proteins: BTreeSet<ProteinId>,
    graph: Arc<Graph<ProteinId>>,
}

impl GeneSet {
    /// Resolve gene symbols through the registry. Unknown symbols are dropped with a warning.
    pub fn from_symbols<'a, I>(symbols: I, registry: &ProteinRegistry) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut genes = BTreeSet::new();
        let mut proteins = BTreeSet::new();
        for symbol in symbols {
            match registry.proteins_for(symbol) {
                Some(encoded) => {
                    genes.insert(symbol.to_string());
                    proteins.extend(encoded.iter().cloned());
                }
                None => warn!(
                    "Cannot find gene {} in the alias table; consider using the official HGNC symbol",
                    symbol
                ),
            }
        }
        Self::from_proteins(genes, proteins)
    }

    pub fn from_proteins(genes: BTreeSet<String>, proteins: BTreeSet<ProteinId>) -> Self {
        GeneSet {
            genes,
            proteins,
            graph: Arc::new(Graph::new()),
        }
    }

    pub fn genes(&self) -> &BTreeSet<String> {
        &self.genes
    }

    pub fn proteins(&self) -> &BTreeSet<ProteinId> {
        &self.proteins
    }

    pub fn graph(&self) -> &Graph<ProteinId> {
        &self.graph
    }

    /// Rebuild the graph from the pairwise paths between this gene set's proteins.
    /// Returns whether the graph has any node.
    pub fn compute_graph<P>(&mut self, pathfinder: &P) -> CohortResult<bool>
    where
        P: Pathfinder<ProteinId> + ?Sized,
    {
        let mut graph = Graph::new();
        let endpoints: Vec<&ProteinId> = self.proteins.iter().collect();
        for (i, src) in endpoints.iter().enumerate() {
            for dst in &endpoints[i + 1..] {
                let path = pathfinder.find_path(src, dst);
                for edge in path.edges() {
                    graph.add_edge(edge.source.clone(), edge.target.clone(), edge.weight, true)?;
                }
            }
        }
        let non_empty = !graph.is_empty();
        self.graph = Arc::new(graph);
        Ok(non_empty)
    }
}

/// Whether `id` has the `C<n>` shape given to internal clusters
pub fn is_cluster_id(id: &str) -> bool {
    id.strip_prefix('C')
        .is_some_and(|n| !n.is_empty() && n.bytes().all(|b| b.is_ascii_digit()))
}

/// A group of patients keyed by patient id
#[derive(Debug, Clone)]
pub struct Cohort {
    kind: CohortKind,
    patients: BTreeMap<String, GeneSet>,
}

impl Cohort {
    pub fn empty(kind: CohortKind) -> Self {
        Cohort {
            kind,
            patients: BTreeMap::new(),
        }
    }

    pub fn from_gene_sets(kind: CohortKind, patients: BTreeMap<String, GeneSet>) -> Self {
        Cohort { kind, patients }
    }

    /// Load a gene set file
    pub fn load(path: impl AsRef<Path>, kind: CohortKind, registry: &ProteinRegistry) -> CohortResult<Self> {
        let path = path.as_ref();
        info!("Loading {} gene sets from {:?}", kind, path);
        Self::from_reader(open_text(path)?, kind, registry)
    }

    pub fn from_reader<R: BufRead>(reader: R, kind: CohortKind, registry: &ProteinRegistry) -> CohortResult<Self> {
        let mut patients = BTreeMap::new();
        for (number, line) in reader.lines().enumerate() {
            let line = line?;
            if is_ignorable(&line) {
                continue;
            }
            let (patient, symbols) = match line.split_once('=') {
                Some((id, symbols)) if !id.trim().is_empty() => (id.trim().to_string(), symbols),
                _ => {
                    return Err(CohortError::Malformed {
                        line: number + 1,
                        content: line.clone(),
                    })
                }
            };
            if is_cluster_id(&patient) {
                return Err(CohortError::ReservedPatientId(patient));
            }
            let symbols = symbols.split(',').map(str::trim).filter(|s| !s.is_empty());
            let gene_set = GeneSet::from_symbols(symbols, registry);
            if patients.insert(patient.clone(), gene_set).is_some() {
                return Err(CohortError::DuplicatePatient(patient));
            }
        }
        Ok(Cohort { kind, patients })
    }

    /// Union of two cohorts; a patient present in both is an error
    pub fn combine(kind: CohortKind, first: &Cohort, second: &Cohort) -> CohortResult<Self> {
        let mut patients = first.patients.clone();
        for (id, gene_set) in &second.patients {
            if patients.insert(id.clone(), gene_set.clone()).is_some() {
                return Err(CohortError::DuplicatePatient(id.clone()));
            }
        }
        Ok(Cohort { kind, patients })
    }

    /// Compute every patient's graph in parallel and drop patients left with an empty graph.
    /// Returns the removed patient ids.
    pub fn compute_graphs<P>(&mut self, pathfinder: &P) -> CohortResult<Vec<String>>
    where
        P: Pathfinder<ProteinId> + Sync + ?Sized,
    {
        let outcomes = self
            .patients
            .par_iter_mut()
            .map(|(id, gene_set)| Ok((id.clone(), gene_set.compute_graph(pathfinder)?)))
            .collect::<CohortResult<Vec<(String, bool)>>>()?;

        let removed: Vec<String> = outcomes
            .into_iter()
            .filter(|(_, non_empty)| !non_empty)
            .map(|(id, _)| id)
            .collect();
        for id in &removed {
            warn!(
                "Patient {} has an empty graph; removing from analyses. \
                 This may be due to too few genes or path constraints too restrictive to connect any two genes; \
                 consider increasing maxPathLength or maxPathCost",
                id
            );
            self.patients.remove(id);
        }
        debug!("{} graphs computed for {}", self.patients.len(), self.kind);
        Ok(removed)
    }

    pub fn kind(&self) -> CohortKind {
        self.kind
    }

    pub fn patients(&self) -> &BTreeMap<String, GeneSet> {
        &self.patients
    }

    pub fn get(&self, patient: &str) -> Option<&GeneSet> {
        self.patients.get(patient)
    }

    pub fn contains(&self, patient: &str) -> bool {
        self.patients.contains_key(patient)
    }

    pub fn patient_ids(&self) -> impl Iterator<Item = &String> {
        self.patients.keys()
    }

    pub fn len(&self) -> usize {
        self.patients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patients.is_empty()
    }

    pub fn unique_genes(&self) -> BTreeSet<&String> {
        self.patients.values().flat_map(|gs| gs.genes.iter()).collect()
    }

    pub fn unique_proteins(&self) -> BTreeSet<ProteinId> {
        self.patients
            .values()
            .flat_map(|gs| gs.proteins.iter().cloned())
            .collect()
    }

    /// Layered graph over every patient
    pub fn layered_graph(&self) -> Graph<ProteinId, f64> {
        let mut layered = Graph::new();
        for gene_set in self.patients.values() {
            layered.add_layer(gene_set.graph());
        }
        layered
    }

    /// Cohort restricted to the given patients; unknown ids are ignored
    pub fn subset<'a, I>(&self, patients: I) -> Cohort
    where
        I: IntoIterator<Item = &'a str>,
    {
        let patients = patients
            .into_iter()
            .filter_map(|id| self.patients.get_key_value(id))
            .map(|(id, gs)| (id.clone(), gs.clone()))
            .collect();
        Cohort {
            kind: self.kind,
            patients,
        }
    }
}
