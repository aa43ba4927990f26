//! End-to-end analysis session
//!
//! Load aliases, cohorts and the interactome, connect every patient's proteins
//! through the interactome, cluster the patients by graph dissimilarity and
//! attach bootstrap support. The finished session answers the interactive
//! queries (cluster info, mean dissimilarity, clade export).

use super::cluster::{self, analyze_clusters, ClusterAnalysis, ClusterMap};
use super::export::{group_weights, CladeExport};
use super::similarity::{iou_distance, Feature};
use crate::bio::{Cohort, CohortError, CohortKind, ProteinId, ProteinRegistry, RegistryError};
use crate::config::{ConfigError, Configuration};
use crate::network::path_cache::{self, CacheLoad, PathCacheError, PathCacheHeader};
use crate::network::{interactome, InteractomeError};
use chrono::{DateTime, Utc};
use netclade_algorithms::{
    build_tree, BootstrapError, BootstrapEstimator, BootstrapOutcome, DistanceError, DistanceMatrix, Graph,
    MergeTree, NodeIdx, PresenceMatrix,
};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fs::{self, File};
use std::io::{self, BufWriter};
use std::path::PathBuf;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Error, Debug)]
pub enum AnalysisError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Alias table error
    #[error("Alias table error: {0}")]
    Registry(#[from] RegistryError),

    /// Interactome error
    #[error("Interactome error: {0}")]
    Interactome(#[from] InteractomeError),

    /// Gene set error
    #[error("Gene set error: {0}")]
    Cohort(#[from] CohortError),

    /// Path cache error
    #[error("Path cache error: {0}")]
    PathCache(#[from] PathCacheError),

    /// Distance error
    #[error("Distance error: {0}")]
    Distance(#[from] DistanceError),

    /// Bootstrap error
    #[error("Bootstrap error: {0}")]
    Bootstrap(#[from] BootstrapError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Every patient was dropped or none were given
    #[error("No patient graphs available")]
    NoPatients,

    /// Neither a cluster id nor a patient label
    #[error("{0} is not a valid cluster or patient identifier")]
    UnknownCluster(String),
}

pub type AnalysisResult<T> = Result<T, AnalysisError>;

/// Written next to the results so a run can be reproduced
#[derive(Serialize)]
struct RunRecord<'a> {
    timestamp: DateTime<Utc>,
    configuration: &'a Configuration,
    bootstrap: BootstrapOutcome,
    patients: usize,
}

pub struct AnalysisSession {
    config: Configuration,
    registry: ProteinRegistry,
    group1: Cohort,
    group2: Cohort,
    combined: Cohort,
    tree: MergeTree,
    distances: DistanceMatrix<NodeIdx>,
    clusters: ClusterMap,
    bootstrap: BootstrapOutcome,
}

impl AnalysisSession {
    /// Run the whole analysis from input files
    pub fn run(config: Configuration) -> AnalysisResult<Self> {
        let general = &config.general;
        let registry = ProteinRegistry::load(&general.protein_aliases_file)?;

        let group1 = Cohort::load(&general.group1_gene_set_file, CohortKind::Group1, &registry)?;
        let group2 = match &general.group2_gene_set_file {
            Some(path) if path.exists() => Cohort::load(path, CohortKind::Group2, &registry)?,
            Some(path) => {
                warn!("Group 2 gene set file {:?} not found; continuing with group 1 only", path);
                Cohort::empty(CohortKind::Group2)
            }
            None => Cohort::empty(CohortKind::Group2),
        };
        // Reject patients shared between groups before the expensive part
        Cohort::combine(CohortKind::Combined, &group1, &group2)?;

        let analysis = &config.analysis;
        let interactome = interactome::load(
            &general.protein_interactome_file,
            analysis.interactome_threshold(),
            analysis.search_budget(),
            &registry,
        )?;

        let header = PathCacheHeader {
            min_confidence: analysis.min_interactome_confidence,
            max_path_length: analysis.max_path_length,
            max_path_cost: analysis.max_path_cost,
        };
        let cache_file = config.path_cache_file();
        if analysis.reuse_previous_data {
            if let CacheLoad::Loaded(n) = path_cache::load_paths(&cache_file, &header, &interactome, &registry)? {
                info!("Reusing {} previously computed paths", n);
            }
        }

        let session = Self::from_cohorts(config, registry, group1, group2, &interactome)?;
        path_cache::save_paths(&cache_file, &header, &interactome)?;
        Ok(session)
    }

    /// Compute patient graphs against `interactome`, then cluster and bootstrap
    pub fn from_cohorts(
        config: Configuration,
        registry: ProteinRegistry,
        mut group1: Cohort,
        mut group2: Cohort,
        interactome: &Graph<ProteinId>,
    ) -> AnalysisResult<Self> {
        info!("Computing graphs for {} + {} patients", group1.len(), group2.len());
        group1.compute_graphs(interactome)?;
        group2.compute_graphs(interactome)?;
        let combined = Cohort::combine(CohortKind::Combined, &group1, &group2)?;
        if combined.is_empty() {
            return Err(AnalysisError::NoPatients);
        }

        let metric = config.analysis.similarity_metric;
        let features: BTreeMap<String, BTreeSet<Feature>> = combined
            .patients()
            .iter()
            .map(|(id, gene_set)| (id.clone(), metric.features(gene_set.graph())))
            .collect();

        // Leaves in sorted label order: the minimum-pair tie-break is then lexicographic
        let (w1, w2) = group_weights(group1.len(), group2.len());
        let mut tree = MergeTree::new();
        let leaves: Vec<NodeIdx> = features
            .keys()
            .map(|id| tree.add_leaf(id.as_str(), if group1.contains(id) { w1 } else { w2 }))
            .collect();

        let feature_sets: Vec<&BTreeSet<Feature>> = features.values().collect();
        let mut distances = DistanceMatrix::new();
        for (i, &a) in leaves.iter().enumerate() {
            distances.add_entity(a);
            for (j, &b) in leaves.iter().enumerate().skip(i + 1) {
                distances.set_distance(a, b, iou_distance(feature_sets[i], feature_sets[j]))?;
            }
        }

        build_tree(&mut tree, &distances);

        let bootstrap = if leaves.len() < 2 {
            info!("Only one patient graph; no clustering to bootstrap");
            BootstrapOutcome::Disabled
        } else {
            let presence = PresenceMatrix::from_sets(&features);
            let resampler = config.analysis.resampling.resampler();
            BootstrapEstimator::new(config.analysis.bootstrap()).run(&mut tree, &presence, resampler.as_ref())?
        };

        let clusters = analyze_clusters(&tree, &distances, &group1);
        info!("{} clusters analyzed", clusters.len());

        Ok(AnalysisSession {
            config,
            registry,
            group1,
            group2,
            combined,
            tree,
            distances,
            clusters,
            bootstrap,
        })
    }

    /// Write the run record, cluster summary and dendrogram into the output directory.
    /// With a single patient its graphs are exported instead of a dendrogram.
    pub fn write_outputs(&self) -> AnalysisResult<Vec<PathBuf>> {
        let output = &self.config.general.output_directory;
        let project = &self.config.general.project_name;
        fs::create_dir_all(output)?;
        let mut written = Vec::new();

        let record_file = output.join("configuration.json");
        let record = RunRecord {
            timestamp: Utc::now(),
            configuration: &self.config,
            bootstrap: self.bootstrap,
            patients: self.combined.len(),
        };
        fs::write(&record_file, serde_json::to_string_pretty(&record)?)?;
        written.push(record_file);

        if self.combined.len() == 1 {
            if let Some(id) = self.combined.patient_ids().next() {
                written.extend(self.export(id)?);
            }
            return Ok(written);
        }

        let summary_file = output.join(format!("{}_ClusterAnalyses.csv", project));
        cluster::write_summary_csv(&mut BufWriter::new(File::create(&summary_file)?), &self.clusters)?;
        written.push(summary_file);

        if let Some(root) = self.tree.root() {
            let dendrogram_file = output.join(format!("{}_Dendrogram.txt", project));
            fs::write(&dendrogram_file, format!("{}\n", self.tree.to_newick(root)))?;
            written.push(dendrogram_file);
        }

        info!("Results written to {:?}", output);
        Ok(written)
    }

    /// Export the reduced graphs of a cluster or a single patient
    pub fn export(&self, id: &str) -> AnalysisResult<Vec<PathBuf>> {
        let cluster = self.cluster(id)?;
        let patients: Vec<&str> = cluster.patients().collect();
        let group1 = self.group1.subset(patients.iter().copied());
        let group2 = self.group2.subset(patients.iter().copied());
        let combined = self.combined.subset(patients.iter().copied());
        info!(
            "Exporting {}: group 1 {:?}, group 2 {:?}",
            id, cluster.group1_patients, cluster.group2_patients
        );

        let export = CladeExport {
            id,
            project_name: &self.config.general.project_name,
            group1: &group1,
            group2: &group2,
            combined: &combined,
            newick: (!cluster.is_leaf).then(|| self.tree.to_newick(cluster.node)),
        };
        Ok(export.write(&self.config.general.output_directory, &self.config.analysis, &self.registry)?)
    }

    /// Mean pairwise dissimilarity between the patients of two clusters
    pub fn mean_dissimilarity(&self, x: &str, y: &str) -> AnalysisResult<f64> {
        let (x, y) = (self.cluster(x)?, self.cluster(y)?);
        Ok(cluster::mean_dissimilarity(&self.tree, &self.distances, x.node, y.node))
    }

    pub fn cluster(&self, id: &str) -> AnalysisResult<&ClusterAnalysis> {
        self.clusters
            .get(id)
            .ok_or_else(|| AnalysisError::UnknownCluster(id.to_string()))
    }

    /// Internal clusters in numeric order
    pub fn summary(&self) -> Vec<&ClusterAnalysis> {
        cluster::internal_clusters(&self.clusters)
    }

    pub fn config(&self) -> &Configuration {
        &self.config
    }

    pub fn registry(&self) -> &ProteinRegistry {
        &self.registry
    }

    pub fn group1(&self) -> &Cohort {
        &self.group1
    }

    pub fn group2(&self) -> &Cohort {
        &self.group2
    }

    pub fn combined(&self) -> &Cohort {
        &self.combined
    }

    pub fn tree(&self) -> &MergeTree {
        &self.tree
    }

    pub fn distances(&self) -> &DistanceMatrix<NodeIdx> {
        &self.distances
    }

    pub fn clusters(&self) -> &ClusterMap {
        &self.clusters
    }

    pub fn bootstrap_outcome(&self) -> BootstrapOutcome {
        self.bootstrap
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::interactome_search;
    use netclade_algorithms::SearchBudget;

    /// Hub H with spokes; every spoke pair is two hops through H
    fn fixture() -> (ProteinRegistry, Graph<ProteinId>) {
        let mut registry = ProteinRegistry::new();
        for p in ["A", "B", "C", "D", "E", "H"] {
            registry.register(p, &format!("G{}", p), "BioMart_HUGO");
        }
        let mut g = Graph::new().with_search(interactome_search(SearchBudget { max_path_cost: 200.0, max_path_length: 3 }));
        for p in ["A", "B", "C", "D", "E"] {
            g.add_edge(registry.resolve("H"), registry.resolve(p), 950, true).unwrap();
        }
        (registry, g)
    }

    fn config(extra: &[&str]) -> Configuration {
        let mut args = vec!["group1GeneSetFile=cases.txt", "bootstrappingRounds=0"];
        args.extend_from_slice(extra);
        Configuration::from_args(&args).unwrap()
    }

    fn cohorts(registry: &ProteinRegistry, cases: &str, controls: &str) -> (Cohort, Cohort) {
        (
            Cohort::from_reader(cases.as_bytes(), CohortKind::Group1, registry).unwrap(),
            Cohort::from_reader(controls.as_bytes(), CohortKind::Group2, registry).unwrap(),
        )
    }

    #[test]
    fn test_cluster_patients() {
        let (registry, interactome) = fixture();
        let (cases, controls) = cohorts(&registry, "c1=GA,GB\nc2=GA,GB,GC\n", "k1=GD,GE\nk2=GC,GD,GE\n");
        let session = AnalysisSession::from_cohorts(config(&[]), registry, cases, controls, &interactome).unwrap();

        let tree = session.tree();
        assert_eq!(tree.internal_count(), 3);
        assert_eq!(tree[tree.root().unwrap()].weight(), 4.0);

        let root = session.cluster("C1").unwrap();
        assert_eq!(root.group1_patients, vec!["c1", "c2"]);
        // Cases and controls separate below the root
        let (left, right) = tree[root.node].children().unwrap();
        let mut sides = vec![tree.signature(left).to_string(), tree.signature(right).to_string()];
        sides.sort();
        assert_eq!(sides, vec!["c1,c2", "k1,k2"]);
        assert_eq!(session.bootstrap_outcome(), BootstrapOutcome::Disabled);
    }

    #[test]
    fn test_leaf_weights_balance_groups() {
        let (registry, interactome) = fixture();
        let (cases, controls) = cohorts(&registry, "c1=GA,GB\n", "k1=GD,GE\nk2=GC,GD\nk3=GC,GE\n");
        let session = AnalysisSession::from_cohorts(config(&[]), registry, cases, controls, &interactome).unwrap();

        let tree = session.tree();
        assert_eq!(tree[tree.find_leaf("c1").unwrap()].weight(), 3.0);
        assert_eq!(tree[tree.find_leaf("k1").unwrap()].weight(), 1.0);
        assert!(session.mean_dissimilarity("c1", "k1").unwrap() > 0.0);
        assert!(matches!(
            session.mean_dissimilarity("c1", "C99"),
            Err(AnalysisError::UnknownCluster(id)) if id == "C99"
        ));
    }

    #[test]
    fn test_bootstrap_annotates_tree() {
        let (registry, interactome) = fixture();
        let (cases, controls) = cohorts(&registry, "c1=GA,GB\nc2=GA,GB\n", "k1=GD,GE\n");
        let config = config(&["bootstrappingRounds=100", "bootstrapSeed=7"]);
        let session = AnalysisSession::from_cohorts(config, registry, cases, controls, &interactome).unwrap();

        assert_eq!(session.bootstrap_outcome(), BootstrapOutcome::Completed { rounds: 100 });
        for cluster in session.summary() {
            let confidence = cluster.confidence.unwrap();
            assert!((0.0..=1.0).contains(&confidence));
        }
    }

    #[test]
    fn test_no_patients() {
        let (registry, interactome) = fixture();
        // A single gene never yields a path graph
        let (cases, controls) = cohorts(&registry, "c1=GA\n", "");
        let result = AnalysisSession::from_cohorts(config(&[]), registry, cases, controls, &interactome);
        assert!(matches!(result, Err(AnalysisError::NoPatients)));
    }

    #[test]
    fn test_single_patient_exports_its_graph() {
        let dir = tempfile::tempdir().unwrap();
        let (registry, interactome) = fixture();
        let (cases, controls) = cohorts(&registry, "c1=GA,GB\nc2=GA\n", "");
        let output = format!("outputDirectory={}", dir.path().display());
        let session =
            AnalysisSession::from_cohorts(config(&[output.as_str()]), registry, cases, controls, &interactome).unwrap();

        assert!(session.summary().is_empty());
        let written = session.write_outputs().unwrap();
        assert!(written.iter().any(|p| p.ends_with("c1/casesc1_Group1_Interactions.txt")));
        assert!(dir.path().join("configuration.json").exists());
    }
}
