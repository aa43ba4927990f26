//! Bootstrap clade support
//!
//! Each round resamples the item columns of a presence matrix (patients × proteins
//! or patients × edges), recomputes pairwise `1 - IoU` distances over the resampled
//! columns, clusters a fresh copy of the primary tree's leaves and records which
//! primary clades reappear. Rounds run in parallel; folding their results into the
//! primary tree is sequential.

use crate::distance::DistanceMatrix;
use crate::tree::{MergeTree, NodeIdx};
use crate::upgma::build_tree;
use ndarray::{Array1, Array2, Axis};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Fewer rounds than this give meaningless support values
pub const MIN_BOOTSTRAP_ROUNDS: usize = 100;

/// Rounds evaluated in parallel before their signatures are folded
const ROUNDS_PER_BATCH: usize = 64;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum BootstrapError {
    #[error("Resampled entity {0} is not a leaf of the primary tree")]
    UnknownLeaf(String),
}

pub type BootstrapResult<T> = Result<T, BootstrapError>;

/// Probability that a given item appears at least once among `n` draws with
/// replacement from `n` items: `1 - ((n - 1) / n)^n`
pub fn retention_probability(n: usize) -> f64 {
    if n == 0 {
        return 0.0;
    }
    let n = n as f64;
    1.0 - ((n - 1.0) / n).powf(n)
}

/// Draws the column indices of one resampled dataset
pub trait Resampler: Sync {
    /// Column indices out of `0..universe`, repeated when an item is drawn more than once
    fn resample(&self, universe: usize, rng: &mut StdRng) -> Vec<usize>;
}

/// `universe` uniform draws with replacement
#[derive(Debug, Clone, Copy, Default)]
pub struct WithReplacement;

impl Resampler for WithReplacement {
    fn resample(&self, universe: usize, rng: &mut StdRng) -> Vec<usize> {
        if universe == 0 {
            return Vec::new();
        }
        (0..universe).map(|_| rng.gen_range(0..universe)).collect()
    }
}

/// Keep each column independently with [`retention_probability`]
#[derive(Debug, Clone, Copy, Default)]
pub struct BernoulliRetention;

impl Resampler for BernoulliRetention {
    fn resample(&self, universe: usize, rng: &mut StdRng) -> Vec<usize> {
        let p = retention_probability(universe);
        (0..universe).filter(|_| rng.gen_bool(p)).collect()
    }
}

/// Every column exactly once; rounds reproduce the primary tree
#[derive(Debug, Clone, Copy, Default)]
pub struct FullRetention;

impl Resampler for FullRetention {
    fn resample(&self, universe: usize, _rng: &mut StdRng) -> Vec<usize> {
        (0..universe).collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResamplingScheme {
    #[default]
    Replacement,
    Bernoulli,
}

impl ResamplingScheme {
    pub fn resampler(&self) -> Box<dyn Resampler> {
        match self {
            ResamplingScheme::Replacement => Box::new(WithReplacement),
            ResamplingScheme::Bernoulli => Box::new(BernoulliRetention),
        }
    }
}

impl FromStr for ResamplingScheme {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "replacement" => Ok(ResamplingScheme::Replacement),
            "bernoulli" => Ok(ResamplingScheme::Bernoulli),
            other => Err(format!("unknown resampling scheme '{}'", other)),
        }
    }
}

impl fmt::Display for ResamplingScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResamplingScheme::Replacement => write!(f, "replacement"),
            ResamplingScheme::Bernoulli => write!(f, "bernoulli"),
        }
    }
}

/// Which items each labelled entity contains, as a 0/1 matrix
#[derive(Debug, Clone)]
pub struct PresenceMatrix {
    labels: Vec<String>,
    presence: Array2<f64>,
}

impl PresenceMatrix {
    /// Rows follow label order; columns index the union of all item sets in item order
    pub fn from_sets<T: Ord>(sets: &BTreeMap<String, BTreeSet<T>>) -> Self {
        let universe: BTreeSet<&T> = sets.values().flatten().collect();
        let column: BTreeMap<&T, usize> = universe.into_iter().enumerate().map(|(i, t)| (t, i)).collect();

        let mut presence = Array2::zeros((sets.len(), column.len()));
        for (row, items) in sets.values().enumerate() {
            for item in items {
                presence[[row, column[item]]] = 1.0;
            }
        }

        PresenceMatrix {
            labels: sets.keys().cloned().collect(),
            presence,
        }
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    /// Number of items (columns)
    pub fn universe(&self) -> usize {
        self.presence.ncols()
    }

    /// `1 - |A ∩ B| / |A ∪ B|` between every pair of rows, counting each column as
    /// many times as it appears in `columns`. An empty union gives distance 1.
    pub fn resampled_distances(&self, columns: &[usize]) -> DistanceMatrix<usize> {
        let mut multiplicity = Array1::<f64>::zeros(self.universe());
        for &c in columns {
            multiplicity[c] += 1.0;
        }

        let weighted = &self.presence * &multiplicity;
        let intersections = weighted.dot(&self.presence.t());
        let sizes = weighted.sum_axis(Axis(1));

        let rows = self.labels.len();
        let mut distances = DistanceMatrix::new();
        for i in 0..rows {
            distances.add_entity(i);
            for j in (i + 1)..rows {
                let shared = intersections[[i, j]];
                let union = sizes[i] + sizes[j] - shared;
                let d = if union > 0.0 { 1.0 - shared / union } else { 1.0 };
                distances.insert(i, j, d.max(0.0));
            }
        }
        distances
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BootstrapConfig {
    pub rounds: usize,
    /// Base seed; round `i` uses `seed + i`. Random when unset.
    pub seed: Option<u64>,
}

impl Default for BootstrapConfig {
    fn default() -> Self {
        Self { rounds: 1000, seed: None }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BootstrapOutcome {
    /// Zero rounds requested
    Disabled,
    /// Too few rounds requested to be meaningful
    Skipped { requested: usize },
    Completed { rounds: usize },
}

pub struct BootstrapEstimator {
    config: BootstrapConfig,
}

impl BootstrapEstimator {
    pub fn new(config: BootstrapConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &BootstrapConfig {
        &self.config
    }

    /// Annotate `primary` with bootstrap support.
    ///
    /// Every presence row must name a leaf of `primary`. Leaves of each round tree
    /// are registered in row order, matching how the primary leaves were laid out.
    pub fn run(
        &self,
        primary: &mut MergeTree,
        presence: &PresenceMatrix,
        resampler: &dyn Resampler,
    ) -> BootstrapResult<BootstrapOutcome> {
        let rounds = self.config.rounds;
        if rounds == 0 {
            return Ok(BootstrapOutcome::Disabled);
        }
        if rounds < MIN_BOOTSTRAP_ROUNDS {
            warn!(
                "Bootstrapping requires at least {} rounds, {} requested; skipping",
                MIN_BOOTSTRAP_ROUNDS, rounds
            );
            return Ok(BootstrapOutcome::Skipped { requested: rounds });
        }
        if primary.root().is_none() {
            debug!("Primary tree has no root; nothing to bootstrap");
            return Ok(BootstrapOutcome::Disabled);
        }

        let leaf_of_row: Vec<NodeIdx> = presence
            .labels()
            .iter()
            .map(|label| {
                primary
                    .find_leaf(label)
                    .ok_or_else(|| BootstrapError::UnknownLeaf(label.clone()))
            })
            .collect::<BootstrapResult<_>>()?;

        let base_seed = self.config.seed.unwrap_or_else(|| rand::thread_rng().gen());
        info!("Bootstrapping {} rounds (seed {})", rounds, base_seed);

        let mut start = 0;
        while start < rounds {
            let end = (start + ROUNDS_PER_BATCH).min(rounds);
            let template: &MergeTree = primary;
            let recovered: Vec<FxHashSet<String>> = (start..end)
                .into_par_iter()
                .map(|round| {
                    let mut rng = StdRng::seed_from_u64(base_seed.wrapping_add(round as u64));
                    let columns = resampler.resample(presence.universe(), &mut rng);
                    let distances = presence.resampled_distances(&columns);

                    let mut tree = MergeTree::new();
                    let distances =
                        distances.remap(|&row| template.clone_leaf_into(leaf_of_row[row], &mut tree));
                    match build_tree(&mut tree, &distances) {
                        Some(root) => tree.signatures(root),
                        None => FxHashSet::default(),
                    }
                })
                .collect();

            for signatures in &recovered {
                primary.record_bootstrap_round(signatures);
            }
            debug!("Bootstrap rounds {}..{} folded", start, end);
            start = end;
        }

        Ok(BootstrapOutcome::Completed { rounds })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sets(rows: &[(&str, &[u32])]) -> BTreeMap<String, BTreeSet<u32>> {
        rows.iter()
            .map(|(label, items)| (label.to_string(), items.iter().copied().collect()))
            .collect()
    }

    /// Primary tree built from the unresampled distances, leaves in row order
    fn primary_tree(presence: &PresenceMatrix) -> MergeTree {
        let all: Vec<usize> = (0..presence.universe()).collect();
        let mut tree = MergeTree::new();
        let leaves: Vec<NodeIdx> = presence.labels().iter().map(|l| tree.add_leaf(l.as_str(), 1.0)).collect();
        let distances = presence.resampled_distances(&all).remap(|&row| leaves[row]);
        build_tree(&mut tree, &distances);
        tree
    }

    #[test]
    fn test_retention_probability() {
        assert_eq!(retention_probability(0), 0.0);
        assert_eq!(retention_probability(1), 1.0);
        assert!((retention_probability(2) - 0.75).abs() < 1e-12);
        // Tends to 1 - 1/e
        assert!((retention_probability(100_000) - 0.632_12).abs() < 1e-4);
    }

    #[test]
    fn test_resampled_distances() {
        let presence = PresenceMatrix::from_sets(&sets(&[
            ("a", &[1, 2, 3]),
            ("b", &[2, 3, 4]),
            ("c", &[]),
        ]));
        assert_eq!(presence.universe(), 4);

        let all = presence.resampled_distances(&[0, 1, 2, 3]);
        assert!((all.get_distance(&0, &1).unwrap() - 0.5).abs() < 1e-12);
        assert_eq!(all.get_distance(&0, &2), Some(1.0));

        // Item 2 drawn twice, item 1 and 4 never: {2,2,3} vs {2,2,3}
        let resampled = presence.resampled_distances(&[1, 1, 2]);
        assert_eq!(resampled.get_distance(&0, &1), Some(0.0));

        // Empty union
        let none = presence.resampled_distances(&[]);
        assert_eq!(none.get_distance(&0, &1), Some(1.0));
        assert_eq!(none.entity_count(), 3);
    }

    #[test]
    fn test_resamplers() {
        let mut rng = StdRng::seed_from_u64(7);
        assert_eq!(FullRetention.resample(4, &mut rng), vec![0, 1, 2, 3]);

        let drawn = WithReplacement.resample(50, &mut rng);
        assert_eq!(drawn.len(), 50);
        assert!(drawn.iter().all(|&c| c < 50));

        let kept = BernoulliRetention.resample(50, &mut rng);
        assert!(kept.windows(2).all(|w| w[0] < w[1]));
        assert!(WithReplacement.resample(0, &mut rng).is_empty());
    }

    #[test]
    fn test_scheme_parsing() {
        assert_eq!("Bernoulli".parse::<ResamplingScheme>(), Ok(ResamplingScheme::Bernoulli));
        assert_eq!(ResamplingScheme::default().to_string(), "replacement");
        assert!("jackknife".parse::<ResamplingScheme>().is_err());
    }

    #[test]
    fn test_full_retention_confidence_is_one() {
        let presence = PresenceMatrix::from_sets(&sets(&[
            ("p1", &[1, 2, 3]),
            ("p2", &[1, 2, 3]),
            ("p3", &[1, 2, 3]),
        ]));
        let mut tree = primary_tree(&presence);
        let root = tree.root().unwrap();

        let estimator = BootstrapEstimator::new(BootstrapConfig { rounds: 100, seed: Some(1) });
        let outcome = estimator.run(&mut tree, &presence, &FullRetention).unwrap();

        assert_eq!(outcome, BootstrapOutcome::Completed { rounds: 100 });
        for idx in tree.preorder(root) {
            assert_eq!(tree[idx].bootstrap_rounds(), 100);
            assert_eq!(tree.confidence(idx), 1.0);
        }
    }

    #[test]
    fn test_confidence_bounds_and_determinism() {
        let presence = PresenceMatrix::from_sets(&sets(&[
            ("p1", &[1, 2, 3, 4]),
            ("p2", &[1, 2, 3, 5]),
            ("p3", &[6, 7, 8]),
            ("p4", &[6, 7, 9]),
            ("p5", &[2, 7, 10]),
        ]));
        let config = BootstrapConfig { rounds: 150, seed: Some(42) };

        let mut first = primary_tree(&presence);
        BootstrapEstimator::new(config).run(&mut first, &presence, &WithReplacement).unwrap();
        let mut second = primary_tree(&presence);
        BootstrapEstimator::new(config).run(&mut second, &presence, &WithReplacement).unwrap();

        let root = first.root().unwrap();
        for idx in first.preorder(root) {
            let c = first.confidence(idx);
            assert!((0.0..=1.0).contains(&c));
            assert_eq!(c, second.confidence(idx));
        }
        // Leaves and the root are recovered in every round
        assert_eq!(first.confidence(root), 1.0);
    }

    #[test]
    fn test_too_few_rounds_skipped() {
        let presence = PresenceMatrix::from_sets(&sets(&[("p1", &[1]), ("p2", &[2])]));
        let mut tree = primary_tree(&presence);
        let root = tree.root().unwrap();

        let outcome = BootstrapEstimator::new(BootstrapConfig { rounds: 99, seed: Some(0) })
            .run(&mut tree, &presence, &FullRetention)
            .unwrap();
        assert_eq!(outcome, BootstrapOutcome::Skipped { requested: 99 });
        assert!(tree.confidence(root).is_nan());

        let outcome = BootstrapEstimator::new(BootstrapConfig { rounds: 0, seed: None })
            .run(&mut tree, &presence, &FullRetention)
            .unwrap();
        assert_eq!(outcome, BootstrapOutcome::Disabled);
    }

    #[test]
    fn test_unknown_leaf() {
        let presence = PresenceMatrix::from_sets(&sets(&[("p1", &[1]), ("p2", &[2])]));
        let mut tree = MergeTree::new();
        let a = tree.add_leaf("p1", 1.0);
        let b = tree.add_leaf("other", 1.0);
        let root = tree.join(a, b, 0.5);
        tree.set_root(Some(root));

        let err = BootstrapEstimator::new(BootstrapConfig { rounds: 100, seed: Some(0) })
            .run(&mut tree, &presence, &FullRetention)
            .unwrap_err();
        assert_eq!(err, BootstrapError::UnknownLeaf("p2".to_string()));
    }
}
