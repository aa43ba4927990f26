use netclade_algorithms::{
    build_tree, BootstrapConfig, BootstrapEstimator, BootstrapOutcome, CostModel, DistanceMatrix, FullRetention,
    Graph, MergeTree, NodeIdx, PathSearch, Pathfinder, PresenceMatrix, SearchBudget,
};
use std::collections::{BTreeMap, BTreeSet};

fn inverted(max_path_cost: f64, max_path_length: usize) -> PathSearch {
    PathSearch {
        cost_model: CostModel::Inverted { ceiling: 1000 },
        budget: SearchBudget { max_path_cost, max_path_length },
    }
}

/// 6x6 grid with deterministic pseudo-random scores in 500..1000
fn grid(search: PathSearch) -> Graph<u32> {
    let mut g = Graph::new().with_search(search);
    let score = |a: u32, b: u32| 500 + (a * 37 + b * 11) % 500;
    for row in 0..6 {
        for col in 0..6 {
            let node = row * 6 + col;
            if col < 5 {
                g.add_edge(node, node + 1, score(node, node + 1), true).unwrap();
            }
            if row < 5 {
                g.add_edge(node, node + 6, score(node, node + 6), true).unwrap();
            }
        }
    }
    g
}

#[test]
fn test_direct_edge_beats_cheaper_detour() {
    let mut g: Graph<&str> = Graph::new().with_search(inverted(f64::INFINITY, usize::MAX));
    g.add_edge("A", "B", 500, true).unwrap();
    g.add_edge("B", "C", 500, true).unwrap();
    g.add_edge("A", "C", 100, true).unwrap();

    let path = g.find_path(&"A", &"C");
    assert_eq!(path.cost(), 900.0);
    assert_eq!(path.len(), 1);
    assert_eq!(path.nodes(), vec!["A", "C"]);
}

#[test]
fn test_tighter_budgets_never_find_cheaper_paths() {
    let unbounded = grid(inverted(f64::INFINITY, usize::MAX));
    let (src, dst) = (0, 35);
    let best = unbounded.find_path(&src, &dst);
    assert!(!best.is_empty());

    let mut previous = f64::INFINITY;
    for max_len in 1..=best.len() {
        let path = grid(inverted(f64::INFINITY, max_len)).find_path(&src, &dst);
        if max_len < 10 {
            // 10 hops is the grid's minimum
            assert!(path.is_empty());
            continue;
        }
        assert!(!path.is_empty(), "no path within {} hops", max_len);
        assert!(path.len() <= max_len);
        assert!(path.cost() >= best.cost());
        assert!(path.cost() <= previous);
        previous = path.cost();
    }
    assert_eq!(previous, best.cost());

    let exact = grid(inverted(best.cost(), usize::MAX)).find_path(&src, &dst);
    assert_eq!(exact.cost(), best.cost());
    let capped = grid(inverted(best.cost() - 1.0, usize::MAX));
    assert!(capped.find_path(&src, &dst).is_empty());
}

#[test]
fn test_hop_limit_keeps_short_route_to_shared_node() {
    // X is cheapest via A-B-C-X but only A-X leaves room for the final hop
    let build = |max_path_length: usize, with_direct: bool| {
        let mut g: Graph<&str> = Graph::new().with_search(PathSearch {
            cost_model: CostModel::Weight,
            budget: SearchBudget { max_path_cost: f64::INFINITY, max_path_length },
        });
        g.add_edge("A", "B", 1, true).unwrap();
        g.add_edge("B", "C", 1, true).unwrap();
        g.add_edge("C", "X", 1, true).unwrap();
        g.add_edge("A", "X", 100, true).unwrap();
        g.add_edge("X", "T", 1, true).unwrap();
        if with_direct {
            g.add_edge("A", "T", 500, true).unwrap();
        }
        g
    };

    let path = build(3, false).find_path(&"A", &"T");
    assert_eq!(path.nodes(), vec!["A", "X", "T"]);
    assert_eq!(path.cost(), 101.0);

    let mut previous = f64::INFINITY;
    for (max_len, expected) in [(1, 500.0), (2, 101.0), (3, 101.0), (4, 4.0), (8, 4.0)] {
        let path = build(max_len, true).find_path(&"A", &"T");
        assert!(!path.is_empty());
        assert!(path.len() <= max_len);
        assert_eq!(path.cost(), expected);
        assert!(path.cost() <= previous);
        previous = path.cost();
    }
}

#[test]
fn test_reverse_requests_share_cost() {
    let g = grid(inverted(2000.0, 8));
    for (a, b) in [(0, 14), (3, 20), (7, 29), (35, 1)] {
        let forward = g.find_path(&a, &b);
        let backward = g.find_path(&b, &a);
        assert_eq!(forward.cost(), backward.cost());
        assert!(forward.cost() <= 2000.0);
        assert!(forward.len() <= 8);
    }
}

#[test]
fn test_reduce_respects_vertex_budget() {
    let g = grid(inverted(f64::INFINITY, usize::MAX));
    let endpoints: BTreeSet<u32> = [0, 5, 30, 35, 14].into_iter().collect();
    for budget in [0, 1, 4, 8, 12, 36] {
        let reduced = g.reduce_by_paths(&endpoints, budget);
        assert!(reduced.node_count() <= budget);
    }
    assert!(g.reduce_by_paths(&endpoints, 36).nodes().all(|n| g.contains_node(n)));
}

#[test]
fn test_wpgma_three_leaves() {
    let mut tree = MergeTree::new();
    let x = tree.add_leaf("X", 1.0);
    let y = tree.add_leaf("Y", 1.0);
    let z = tree.add_leaf("Z", 1.0);
    let mut dm = DistanceMatrix::new();
    dm.set_distance(x, y, 0.2).unwrap();
    dm.set_distance(x, z, 0.8).unwrap();
    dm.set_distance(y, z, 0.6).unwrap();
    assert_eq!(dm.get_distance(&z, &y), Some(0.6));

    let root = build_tree(&mut tree, &dm).unwrap();
    let xy = tree[x].parent().unwrap();
    assert_eq!(tree[y].parent(), Some(xy));
    assert!((tree[xy].height() - 0.1).abs() < 1e-12);
    assert!((tree[root].height() - 0.35).abs() < 1e-12);
    assert_eq!(tree[root].weight(), 3.0);
    assert_eq!(tree.internal_count(), 2);
}

#[test]
fn test_identical_sets_are_fully_supported() {
    let sets: BTreeMap<String, BTreeSet<&str>> = ["p1", "p2", "p3"]
        .into_iter()
        .map(|label| (label.to_string(), ["a", "b", "c"].into_iter().collect()))
        .collect();

    let mut tree = MergeTree::new();
    let leaves: Vec<NodeIdx> = sets.keys().map(|label| tree.add_leaf(label.as_str(), 1.0)).collect();
    let mut dm = DistanceMatrix::new();
    for (i, &a) in leaves.iter().enumerate() {
        for &b in &leaves[i + 1..] {
            dm.set_distance(a, b, 0.0).unwrap();
        }
    }
    let root = build_tree(&mut tree, &dm).unwrap();

    let estimator = BootstrapEstimator::new(BootstrapConfig { rounds: 100, seed: Some(1) });
    let outcome = estimator
        .run(&mut tree, &PresenceMatrix::from_sets(&sets), &FullRetention)
        .unwrap();
    assert_eq!(outcome, BootstrapOutcome::Completed { rounds: 100 });
    for node in tree.preorder(root) {
        assert_eq!(tree.confidence(node), 1.0);
    }
}
