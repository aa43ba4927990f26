//! Weighted-average linkage clustering
//!
//! Repeatedly merges the closest pair of clusters. The merged cluster's distance to
//! every other cluster is the average of its children's distances weighted by the
//! children's weights, so pre-weighted leaves (cohort size normalization) do not
//! skew the merge order.

use crate::distance::DistanceMatrix;
use crate::tree::{MergeTree, NodeIdx};
use tracing::debug;

/// Cluster the entities of `distances` (leaves of `tree`) into a binary dendrogram.
///
/// Returns the root, which is also recorded on `tree`. A matrix over a single
/// entity yields that entity as the root; an empty matrix yields `None`. Pairs
/// missing from the matrix are never merged directly.
pub fn build_tree(tree: &mut MergeTree, distances: &DistanceMatrix<NodeIdx>) -> Option<NodeIdx> {
    let mut matrix = distances.clone();
    let mut root = None;

    while let Some((a, b, distance)) = matrix.minimum_distance_entry() {
        let (weight_a, weight_b) = (tree[a].weight(), tree[b].weight());
        let merged = tree.join(a, b, distance / 2.0);

        let linked: Vec<(NodeIdx, f64)> = matrix
            .entities()
            .filter(|&&x| x != a && x != b)
            .filter_map(|&x| {
                let da = matrix.get_distance(&a, &x)?;
                let db = matrix.get_distance(&b, &x)?;
                Some((x, (weight_a * da + weight_b * db) / (weight_a + weight_b)))
            })
            .collect();

        matrix.remove_all_associated(&a);
        matrix.remove_all_associated(&b);
        matrix.add_entity(merged);
        for (x, d) in linked {
            matrix.insert(merged, x, d);
        }
        root = Some(merged);
    }

    if root.is_none() {
        let mut remaining = matrix.entities();
        root = match (remaining.next(), remaining.next()) {
            (Some(&only), None) => Some(only),
            _ => None,
        };
    } else if matrix.entity_count() > 1 {
        debug!(
            "{} clusters left unmerged for lack of distances",
            matrix.entity_count()
        );
    }

    tree.set_root(root);
    root
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaves(tree: &mut MergeTree, labels: &[&str]) -> Vec<NodeIdx> {
        labels.iter().map(|l| tree.add_leaf(*l, 1.0)).collect()
    }

    #[test]
    fn test_three_leaf_scenario() {
        let mut tree = MergeTree::new();
        let ids = leaves(&mut tree, &["X", "Y", "Z"]);
        let (x, y, z) = (ids[0], ids[1], ids[2]);

        let mut m = DistanceMatrix::new();
        m.set_distance(x, y, 0.2).unwrap();
        m.set_distance(x, z, 0.8).unwrap();
        m.set_distance(y, z, 0.6).unwrap();

        let root = build_tree(&mut tree, &m).unwrap();
        // The merged node has the larger index, so Z sorts first in the final pair
        let (left, right) = tree[root].children().unwrap();
        assert_eq!(left, z);
        assert_eq!(tree.signature(right), "X,Y");
        assert!((tree[right].height() - 0.1).abs() < 1e-12);
        assert!((tree[root].height() - 0.35).abs() < 1e-12);
        assert_eq!(tree[root].weight(), 3.0);
        assert_eq!(tree.root(), Some(root));
        // Input matrix left untouched
        assert_eq!(m.len(), 3);
    }

    #[test]
    fn test_weights_bias_linkage() {
        let mut tree = MergeTree::new();
        let a = tree.add_leaf("A", 3.0);
        let b = tree.add_leaf("B", 1.0);
        let c = tree.add_leaf("C", 1.0);

        let mut m = DistanceMatrix::new();
        m.set_distance(a, b, 0.2).unwrap();
        m.set_distance(a, c, 0.4).unwrap();
        m.set_distance(b, c, 0.8).unwrap();

        let root = build_tree(&mut tree, &m).unwrap();
        // (3 * 0.4 + 1 * 0.8) / 4 = 0.5
        assert!((tree[root].height() - 0.25).abs() < 1e-12);
        assert_eq!(tree[root].weight(), 5.0);
    }

    #[test]
    fn test_internal_node_count() {
        let labels = ["p1", "p2", "p3", "p4", "p5", "p6"];
        let mut tree = MergeTree::new();
        let ids = leaves(&mut tree, &labels);

        let mut m = DistanceMatrix::new();
        for (i, &a) in ids.iter().enumerate() {
            for (j, &b) in ids.iter().enumerate().skip(i + 1) {
                m.set_distance(a, b, ((i * 7 + j * 3) % 5) as f64 / 5.0).unwrap();
            }
        }

        let root = build_tree(&mut tree, &m).unwrap();
        assert_eq!(tree.internal_count(), labels.len() - 1);
        assert_eq!(tree[root].leaves().len(), labels.len());
        assert_eq!(tree[root].weight(), labels.len() as f64);
        for idx in tree.preorder(root) {
            if let Some(parent) = tree[idx].parent() {
                assert!(tree[parent].height() >= tree[idx].height() - 1e-12);
            }
        }
    }

    #[test]
    fn test_single_and_empty() {
        let mut tree = MergeTree::new();
        let only = tree.add_leaf("solo", 1.0);
        let mut m = DistanceMatrix::new();
        m.add_entity(only);
        assert_eq!(build_tree(&mut tree, &m), Some(only));

        let mut empty = MergeTree::new();
        assert_eq!(build_tree(&mut empty, &DistanceMatrix::new()), None);
    }
}
