//! Binary merge tree (dendrogram)
//!
//! Nodes live in an arena and refer to each other by [`NodeIdx`]. Leaves are
//! added up front; internal nodes are only created by joining two parentless
//! nodes, which keeps the tree strictly binary. After construction the only
//! mutable state is the pair of bootstrap counters on each node.

use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Index;

/// Index of a node in its [`MergeTree`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeIdx(pub usize);

impl fmt::Display for NodeIdx {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeNode {
    label: String,
    weight: f64,
    height: f64,
    parent: Option<NodeIdx>,
    children: Option<(NodeIdx, NodeIdx)>,
    /// Leaf descendants in left-to-right order; a leaf lists itself
    leaves: Vec<NodeIdx>,
    /// Sorted, comma-joined leaf labels
    signature: String,
    bootstrap_hits: u32,
    bootstrap_rounds: u32,
}

impl TreeNode {
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Patient-equivalent count
    pub fn weight(&self) -> f64 {
        self.weight
    }

    /// Half the distance at which the children were merged, zero for leaves
    pub fn height(&self) -> f64 {
        self.height
    }

    pub fn parent(&self) -> Option<NodeIdx> {
        self.parent
    }

    pub fn children(&self) -> Option<(NodeIdx, NodeIdx)> {
        self.children
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_none()
    }

    pub fn leaves(&self) -> &[NodeIdx] {
        &self.leaves
    }

    /// Canonical clade signature: the sorted, comma-joined leaf labels beneath this node
    pub fn signature(&self) -> &str {
        &self.signature
    }

    pub fn bootstrap_hits(&self) -> u32 {
        self.bootstrap_hits
    }

    pub fn bootstrap_rounds(&self) -> u32 {
        self.bootstrap_rounds
    }

    /// Fraction of bootstrap rounds that recovered this clade; NaN if none ran
    pub fn confidence(&self) -> f64 {
        if self.bootstrap_rounds == 0 {
            f64::NAN
        } else {
            self.bootstrap_hits as f64 / self.bootstrap_rounds as f64
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MergeTree {
    nodes: Vec<TreeNode>,
    root: Option<NodeIdx>,
}

impl Index<NodeIdx> for MergeTree {
    type Output = TreeNode;

    fn index(&self, idx: NodeIdx) -> &TreeNode {
        &self.nodes[idx.0]
    }
}

impl MergeTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_leaf(&mut self, label: impl Into<String>, weight: f64) -> NodeIdx {
        assert!(weight.is_finite() && weight > 0.0, "leaf weight must be positive");
        let idx = NodeIdx(self.nodes.len());
        let label = label.into();
        self.nodes.push(TreeNode {
            signature: label.clone(),
            label,
            weight,
            height: 0.0,
            parent: None,
            children: None,
            leaves: vec![idx],
            bootstrap_hits: 0,
            bootstrap_rounds: 0,
        });
        idx
    }

    /// Create the internal node joining `left` and `right` at `height`
    pub fn join(&mut self, left: NodeIdx, right: NodeIdx, height: f64) -> NodeIdx {
        assert_ne!(left, right, "cannot join a node with itself");
        assert!(
            self[left].parent.is_none() && self[right].parent.is_none(),
            "joined nodes must be parentless"
        );

        let idx = NodeIdx(self.nodes.len());
        let (l, r) = (&self[left], &self[right]);
        let mut leaves = Vec::with_capacity(l.leaves.len() + r.leaves.len());
        leaves.extend_from_slice(&l.leaves);
        leaves.extend_from_slice(&r.leaves);
        let mut labels: Vec<&str> = leaves.iter().map(|&leaf| self[leaf].label()).collect();
        labels.sort_unstable();
        let node = TreeNode {
            signature: labels.join(","),
            label: format!("({},{})", l.label, r.label),
            weight: l.weight + r.weight,
            height,
            parent: None,
            children: Some((left, right)),
            leaves,
            bootstrap_hits: 0,
            bootstrap_rounds: 0,
        };

        self.nodes.push(node);
        self.nodes[left.0].parent = Some(idx);
        self.nodes[right.0].parent = Some(idx);
        idx
    }

    pub fn node(&self, idx: NodeIdx) -> Option<&TreeNode> {
        self.nodes.get(idx.0)
    }

    pub fn root(&self) -> Option<NodeIdx> {
        self.root
    }

    pub fn set_root(&mut self, root: Option<NodeIdx>) {
        if let Some(idx) = root {
            assert!(self[idx].parent.is_none(), "root must be parentless");
        }
        self.root = root;
    }

    /// Total number of nodes, leaves included
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn internal_count(&self) -> usize {
        self.nodes.iter().filter(|n| !n.is_leaf()).count()
    }

    /// Labels of every leaf under `idx`, in tree order
    pub fn leaf_labels(&self, idx: NodeIdx) -> Vec<&str> {
        self[idx].leaves.iter().map(|&l| self[l].label()).collect()
    }

    pub fn signature(&self, idx: NodeIdx) -> &str {
        self[idx].signature()
    }

    /// Signatures of every clade in the subtree rooted at `idx`
    pub fn signatures(&self, idx: NodeIdx) -> FxHashSet<String> {
        self.preorder(idx)
            .into_iter()
            .map(|n| self[n].signature.clone())
            .collect()
    }

    /// Copy a leaf's label and weight into `target` as a fresh parentless leaf
    pub fn clone_leaf_into(&self, idx: NodeIdx, target: &mut MergeTree) -> NodeIdx {
        let leaf = &self[idx];
        assert!(leaf.is_leaf(), "only leaves can be cloned");
        target.add_leaf(leaf.label.clone(), leaf.weight)
    }

    pub fn find_leaf(&self, label: &str) -> Option<NodeIdx> {
        self.nodes
            .iter()
            .position(|n| n.is_leaf() && n.label == label)
            .map(NodeIdx)
    }

    /// Nodes of the subtree rooted at `idx`, parent before children, left before right
    pub fn preorder(&self, idx: NodeIdx) -> Vec<NodeIdx> {
        let mut order = Vec::new();
        let mut stack = vec![idx];
        while let Some(current) = stack.pop() {
            order.push(current);
            if let Some((left, right)) = self[current].children {
                stack.push(right);
                stack.push(left);
            }
        }
        order
    }

    /// Fold one bootstrap tree into the counters of every node under the root
    pub fn record_bootstrap_round(&mut self, recovered: &FxHashSet<String>) {
        let Some(root) = self.root else { return };
        for idx in self.preorder(root) {
            let node = &mut self.nodes[idx.0];
            let hit = recovered.contains(node.signature.as_str());
            node.bootstrap_rounds += 1;
            if hit {
                node.bootstrap_hits += 1;
            }
        }
    }

    pub fn confidence(&self, idx: NodeIdx) -> f64 {
        self[idx].confidence()
    }

    /// Newick rendering of the subtree at `idx`.
    ///
    /// Branch lengths are height differences to the parent; internal nodes carry
    /// their bootstrap confidence as the node label when it has been computed.
    pub fn to_newick(&self, idx: NodeIdx) -> String {
        let mut out = String::new();
        self.write_newick(idx, &mut out);
        out.push(';');
        out
    }

    fn write_newick(&self, idx: NodeIdx, out: &mut String) {
        let node = &self[idx];
        match node.children {
            Some((left, right)) => {
                out.push('(');
                self.write_newick(left, out);
                out.push(',');
                self.write_newick(right, out);
                out.push(')');
                let confidence = node.confidence();
                if !confidence.is_nan() {
                    out.push_str(&format!("{:.2}", confidence));
                }
            }
            None => out.push_str(&newick_label(&node.label)),
        }
        if let Some(parent) = node.parent {
            out.push_str(&format!(":{}", self[parent].height - node.height));
        }
    }
}

fn newick_label(label: &str) -> String {
    if label.chars().any(|c| "()[]',;:".contains(c) || c.is_whitespace()) {
        format!("'{}'", label.replace('\'', "''"))
    } else {
        label.to_string()
    }
}
