//! Per-clade cluster analyses
//!
//! Internal nodes are numbered `C1, C2, ...` in pre-order from the root; leaves are
//! addressed by their patient label.

use crate::bio::Cohort;
use indexmap::IndexMap;
use netclade_algorithms::{DistanceMatrix, MergeTree, NodeIdx};
use serde::Serialize;
use std::fmt::Write as _;
use std::io::{self, Write};

/// Column headers of the cluster summary, in [`ClusterAnalysis::summary_row`] order
pub const SUMMARY_HEADERS: [&str; 10] = [
    "Cluster Id",
    "Normalized Height",
    "Number in Group 1",
    "Number in Group 2",
    "Group 1 Weight Percentage",
    "Group 2 Weight Percentage",
    "Max Dissimilarity",
    "Confidence",
    "Group 1 Patients",
    "Group 2 Patients",
];

/// Cluster id -> analysis, root cluster first
pub type ClusterMap = IndexMap<String, ClusterAnalysis>;

#[derive(Debug, Clone, Serialize)]
pub struct ClusterAnalysis {
    pub id: String,
    pub node: NodeIdx,
    pub is_leaf: bool,
    /// Height relative to the root's height
    pub normalized_height: f64,
    pub group1_count: usize,
    pub group2_count: usize,
    pub group1_weight: f64,
    pub group2_weight: f64,
    /// Largest dissimilarity between two patients of the clade
    pub max_dissimilarity: f64,
    /// Bootstrap support; `None` when no rounds ran
    pub confidence: Option<f64>,
    pub group1_patients: Vec<String>,
    pub group2_patients: Vec<String>,
}

impl ClusterAnalysis {
    fn new(
        id: String,
        tree: &MergeTree,
        node: NodeIdx,
        distances: &DistanceMatrix<NodeIdx>,
        group1: &Cohort,
        root_height: f64,
    ) -> Self {
        let clade = &tree[node];
        let leaves = clade.leaves();

        let mut group1_patients = Vec::new();
        let mut group2_patients = Vec::new();
        let mut group1_weight = 0.0;
        let mut max_dissimilarity: f64 = 0.0;
        for (i, &leaf) in leaves.iter().enumerate() {
            let label = tree[leaf].label();
            if group1.contains(label) {
                group1_weight += tree[leaf].weight();
                group1_patients.push(label.to_string());
            } else {
                group2_patients.push(label.to_string());
            }
            for &other in &leaves[i + 1..] {
                if let Some(d) = distances.get_distance(&leaf, &other) {
                    max_dissimilarity = max_dissimilarity.max(d);
                }
            }
        }
        group1_patients.sort();
        group2_patients.sort();

        let confidence = clade.confidence();
        ClusterAnalysis {
            id,
            node,
            is_leaf: clade.is_leaf(),
            normalized_height: if root_height > 0.0 { clade.height() / root_height } else { 0.0 },
            group1_count: group1_patients.len(),
            group2_count: group2_patients.len(),
            group1_weight,
            group2_weight: clade.weight() - group1_weight,
            max_dissimilarity,
            confidence: (!confidence.is_nan()).then_some(confidence),
            group1_patients,
            group2_patients,
        }
    }

    pub fn total_weight(&self) -> f64 {
        self.group1_weight + self.group2_weight
    }

    /// Every patient in the clade, group 1 first
    pub fn patients(&self) -> impl Iterator<Item = &str> {
        self.group1_patients
            .iter()
            .chain(self.group2_patients.iter())
            .map(String::as_str)
    }

    fn weight_percentage(&self, weight: f64) -> f64 {
        let total = self.total_weight();
        if total > 0.0 {
            weight * 100.0 / total
        } else {
            0.0
        }
    }

    /// Multi-line description for interactive display
    pub fn printable(&self) -> String {
        let mut out = String::new();
        if self.is_leaf {
            let group = if self.group1_count == 1 { 1 } else { 2 };
            let _ = write!(
                out,
                "Information for patient {}\n\tGroup = Group {}\n\tWeight = {}",
                self.id,
                group,
                self.total_weight()
            );
            return out;
        }

        let _ = writeln!(out, "Cluster analysis of {}", self.id);
        let _ = writeln!(out, "\tNormalized height = {:.6}", self.normalized_height);
        let _ = writeln!(
            out,
            "\tNumber in Group 1 = {} ({:.6}%)",
            self.group1_count,
            self.weight_percentage(self.group1_weight)
        );
        let _ = writeln!(
            out,
            "\tNumber in Group 2 = {} ({:.6}%)",
            self.group2_count,
            self.weight_percentage(self.group2_weight)
        );
        let _ = writeln!(out, "\tMax dissimilarity = {:.6}", self.max_dissimilarity);
        if let Some(confidence) = self.confidence {
            let _ = writeln!(out, "\tBootstrap confidence = {:.4}", confidence);
        }
        let _ = writeln!(out, "\tGroup 1 Patients = {}", join_patients(&self.group1_patients));
        let _ = write!(out, "\tGroup 2 Patients = {}", join_patients(&self.group2_patients));
        out
    }

    /// One summary line, columns as in [`SUMMARY_HEADERS`]
    pub fn summary_row(&self) -> Vec<String> {
        vec![
            self.id.clone(),
            format!("{:.6}", self.normalized_height),
            self.group1_count.to_string(),
            self.group2_count.to_string(),
            format!("{:.4}%", self.weight_percentage(self.group1_weight)),
            format!("{:.4}%", self.weight_percentage(self.group2_weight)),
            format!("{:.6}", self.max_dissimilarity),
            self.confidence.map(|c| format!("{:.4}", c)).unwrap_or_else(|| "-".to_string()),
            join_patients(&self.group1_patients),
            join_patients(&self.group2_patients),
        ]
    }
}

fn join_patients(patients: &[String]) -> String {
    if patients.is_empty() {
        "<none>".to_string()
    } else {
        patients.join(", ")
    }
}

/// Analyze every clade of `tree`: internal nodes in pre-order, then the leaves
pub fn analyze_clusters(tree: &MergeTree, distances: &DistanceMatrix<NodeIdx>, group1: &Cohort) -> ClusterMap {
    let mut clusters = ClusterMap::new();
    let Some(root) = tree.root() else {
        return clusters;
    };
    let root_height = tree[root].height();

    let order = tree.preorder(root);
    let mut next_id = 1;
    for &idx in order.iter().filter(|&&idx| !tree[idx].is_leaf()) {
        let id = format!("C{}", next_id);
        next_id += 1;
        clusters.insert(id.clone(), ClusterAnalysis::new(id, tree, idx, distances, group1, root_height));
    }
    for &idx in order.iter().filter(|&&idx| tree[idx].is_leaf()) {
        let id = tree[idx].label().to_string();
        clusters.insert(id.clone(), ClusterAnalysis::new(id, tree, idx, distances, group1, root_height));
    }
    clusters
}

/// Internal clusters in numeric id order
pub fn internal_clusters(clusters: &ClusterMap) -> Vec<&ClusterAnalysis> {
    let mut internal: Vec<&ClusterAnalysis> = clusters.values().filter(|c| !c.is_leaf).collect();
    internal.sort_by_key(|c| c.id[1..].parse::<usize>().unwrap_or(usize::MAX));
    internal
}

/// Write the internal cluster summary as CSV, every field quoted
pub fn write_summary_csv<W: Write>(out: &mut W, clusters: &ClusterMap) -> io::Result<()> {
    writeln!(out, "{}", csv_line(SUMMARY_HEADERS.iter().map(|h| h.to_string())))?;
    for cluster in internal_clusters(clusters) {
        writeln!(out, "{}", csv_line(cluster.summary_row()))?;
    }
    out.flush()
}

fn csv_line(fields: impl IntoIterator<Item = String>) -> String {
    fields
        .into_iter()
        .map(|f| format!("\"{}\"", f.replace('"', "\"\"")))
        .collect::<Vec<_>>()
        .join(",")
}

/// Mean dissimilarity between the patients of two clades: `Σ d(x, y) / (W_x · W_y)`
pub fn mean_dissimilarity(
    tree: &MergeTree,
    distances: &DistanceMatrix<NodeIdx>,
    x: NodeIdx,
    y: NodeIdx,
) -> f64 {
    let (x_leaves, y_leaves) = (tree[x].leaves(), tree[y].leaves());
    let total: f64 = x_leaves
        .iter()
        .flat_map(|a| y_leaves.iter().map(move |b| (a, b)))
        .map(|(a, b)| distances.get_distance(a, b).unwrap_or(0.0))
        .sum();
    total / (tree[x].weight() * tree[y].weight())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bio::{CohortKind, GeneSet};
    use netclade_algorithms::build_tree;
    use std::collections::{BTreeMap, BTreeSet};

    fn cohort(ids: &[&str]) -> Cohort {
        let patients: BTreeMap<String, GeneSet> = ids
            .iter()
            .map(|id| (id.to_string(), GeneSet::from_proteins(BTreeSet::new(), BTreeSet::new())))
            .collect();
        Cohort::from_gene_sets(CohortKind::Group1, patients)
    }

    /// a1, a2 in group 1 (weight 2), b1, b2 in group 2
    fn fixture() -> (MergeTree, DistanceMatrix<NodeIdx>, Cohort) {
        let mut tree = MergeTree::new();
        let a1 = tree.add_leaf("a1", 2.0);
        let a2 = tree.add_leaf("a2", 2.0);
        let b1 = tree.add_leaf("b1", 1.0);
        let b2 = tree.add_leaf("b2", 1.0);

        let mut distances = DistanceMatrix::new();
        distances.set_distance(a1, a2, 0.2).unwrap();
        distances.set_distance(b1, b2, 0.4).unwrap();
        distances.set_distance(a1, b1, 0.9).unwrap();
        distances.set_distance(a1, b2, 0.8).unwrap();
        distances.set_distance(a2, b1, 1.0).unwrap();
        distances.set_distance(a2, b2, 0.6).unwrap();
        build_tree(&mut tree, &distances);
        (tree, distances, cohort(&["a1", "a2"]))
    }

    #[test]
    fn test_preorder_numbering() {
        let (tree, distances, group1) = fixture();
        let clusters = analyze_clusters(&tree, &distances, &group1);

        let ids: Vec<&str> = clusters.keys().map(String::as_str).collect();
        assert_eq!(ids.len(), 7);
        assert_eq!(&ids[..3], &["C1", "C2", "C3"]);
        assert_eq!(clusters["C1"].node, tree.root().unwrap());
        assert!(clusters["a1"].is_leaf);
    }

    #[test]
    fn test_root_analysis() {
        let (tree, distances, group1) = fixture();
        let clusters = analyze_clusters(&tree, &distances, &group1);
        let root = &clusters["C1"];

        assert_eq!(root.normalized_height, 1.0);
        assert_eq!((root.group1_count, root.group2_count), (2, 2));
        assert_eq!((root.group1_weight, root.group2_weight), (4.0, 2.0));
        assert_eq!(root.max_dissimilarity, 1.0);
        assert_eq!(root.group1_patients, vec!["a1", "a2"]);
        assert!(root.confidence.is_none());

        let a_clade = clusters.values().find(|c| !c.is_leaf && c.group2_count == 0).unwrap();
        assert_eq!(a_clade.max_dissimilarity, 0.2);
        assert!(a_clade.printable().contains("Group 2 Patients = <none>"));
    }

    #[test]
    fn test_leaf_printable() {
        let (tree, distances, group1) = fixture();
        let clusters = analyze_clusters(&tree, &distances, &group1);
        assert_eq!(
            clusters["b1"].printable(),
            "Information for patient b1\n\tGroup = Group 2\n\tWeight = 1"
        );
    }

    #[test]
    fn test_summary_csv() {
        let (tree, distances, group1) = fixture();
        let clusters = analyze_clusters(&tree, &distances, &group1);
        let mut buffer = Vec::new();
        write_summary_csv(&mut buffer, &clusters).unwrap();
        let text = String::from_utf8(buffer).unwrap();

        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 4);
        assert!(lines[0].starts_with("\"Cluster Id\",\"Normalized Height\""));
        assert!(lines[1].starts_with("\"C1\",\"1.000000\",\"2\",\"2\",\"66.6667%\",\"33.3333%\""));
        assert!(lines[1].ends_with("\"a1, a2\",\"b1, b2\""));
    }

    #[test]
    fn test_mean_dissimilarity() {
        let (tree, distances, _) = fixture();
        let a1 = tree.find_leaf("a1").unwrap();
        let a2 = tree.find_leaf("a2").unwrap();
        let b1 = tree.find_leaf("b1").unwrap();
        let a_clade = tree[a1].parent().unwrap();
        assert_eq!(tree[a2].parent(), Some(a_clade));

        // (0.9 + 1.0) / (4 * 1)
        assert!((mean_dissimilarity(&tree, &distances, a_clade, b1) - 0.475).abs() < 1e-12);
    }
}
