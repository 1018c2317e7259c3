use gridclust::{
    BoundingBox,
    CleanupConfig,
    ClusterSet,
    ClusteringConfig,
    ClusteringState,
    DistanceMatrix,
    FlatCluster,
    HierarchicalClusterer,
    Linkage,
    MergeTree,
    PointStore,
    cluster_distance_matrix,
    cluster_points,
};

// Pairwise distances of the six point fixture, d(i, j) for i > j.
fn six_point_matrix() -> DistanceMatrix {
    let mut matrix = DistanceMatrix::new(6);
    let entries = [
        (1, 0, 0.5),
        (2, 0, 0.8),
        (2, 1, 0.3),
        (3, 0, 0.6),
        (3, 1, 0.8),
        (3, 2, 0.8),
        (4, 0, 0.8),
        (4, 1, 0.8),
        (4, 2, 0.8),
        (4, 3, 0.4),
        (5, 0, 0.7),
        (5, 1, 0.8),
        (5, 2, 0.8),
        (5, 3, 0.8),
        (5, 4, 0.8),
    ];
    for (i, j, d) in entries {
        matrix.set(i, j, d);
    }
    matrix
}

fn merges(tree: &MergeTree) -> Vec<(usize, usize, f64)> {
    tree.nodes()
        .iter()
        .map(|x| (x.left, x.right, x.distance))
        .collect()
}

#[test]
fn test_single_linkage_fixture() {
    let tree = cluster_distance_matrix(&six_point_matrix(), Linkage::Single, f64::INFINITY).unwrap();
    assert_eq!(
        merges(&tree),
        vec![
            (1, 2, 0.3),
            (3, 4, 0.4),
            (0, 1, 0.5),
            (0, 3, 0.6),
            (0, 5, 0.7)
        ]
    );
    assert!(tree.is_monotonic());
    assert_eq!(tree.final_partition().num_clusters(), 1);
}

#[test]
fn test_complete_linkage_fixture() {
    let tree =
        cluster_distance_matrix(&six_point_matrix(), Linkage::Complete, f64::INFINITY).unwrap();
    assert_eq!(
        merges(&tree),
        vec![
            (1, 2, 0.3),
            (3, 4, 0.4),
            (0, 5, 0.7),
            (0, 1, 0.8),
            (0, 3, 0.8)
        ]
    );
}

#[test]
fn test_threshold_truncates_tree() {
    let tree = cluster_distance_matrix(&six_point_matrix(), Linkage::Single, 0.6).unwrap();
    assert_eq!(tree.len(), 4);
    assert!(tree.nodes().iter().all(|x| x.distance <= 0.6));
    let partition = tree.final_partition();
    assert_eq!(partition.num_clusters(), 2);
    assert_eq!(partition.cluster_of(4), Some(0));
    assert_eq!(partition.cluster_of(5), Some(5));
}

// Points on a line whose single linkage merges mirror the fixture above,
// scaled by ten.
fn line_store() -> PointStore {
    let mut store = PointStore::new(2).unwrap();
    for x in [0.0, 5.0, 8.0, 14.0, 18.0, -7.0] {
        store.add(&[x, 100.0]).unwrap();
    }
    store
}

#[test]
fn test_engine_single_linkage_on_points() {
    let config = ClusteringConfig::new(vec![10.0, 10.0]);
    let result = cluster_points(&line_store(), config).unwrap();
    assert_eq!(
        merges(&result.tree),
        vec![
            (1, 2, 3.0),
            (3, 4, 4.0),
            (0, 1, 5.0),
            (0, 3, 6.0),
            (0, 5, 7.0)
        ]
    );
    assert_eq!(result.clusters.len(), 1);
    assert_eq!(result.clusters.get(0).unwrap().bounds.interval(0), (-7.0, 18.0));
}

#[test]
fn test_engine_threshold_truncates_tree() {
    let config = ClusteringConfig::new(vec![6.0, 6.0]).with_threshold(6.0);
    let result = cluster_points(&line_store(), config).unwrap();
    assert_eq!(result.tree.len(), 4);
    let partition = result.partition();
    assert_eq!(partition.num_clusters(), 2);
    assert_eq!(partition.clusters()[&5], vec![5]);
    assert_eq!(result.tree.final_partition(), partition);
}

#[test]
fn test_empty_and_single_point() {
    let store = PointStore::new(2).unwrap();
    let result = cluster_points(&store, ClusteringConfig::default()).unwrap();
    assert_eq!(result.tree.len(), 0);
    assert_eq!(result.clusters.len(), 0);
    assert_eq!(result.tree.to_newick(false), ";");

    let mut store = PointStore::new(2).unwrap();
    store.add(&[1.0, 1.0]).unwrap();
    let mut engine = HierarchicalClusterer::new(&store, ClusteringConfig::default()).unwrap();
    assert!(engine.step().is_none());
    assert_eq!(engine.state(), ClusteringState::Terminated);
    let result = engine.into_result();
    assert_eq!(result.tree.len(), 0);
    assert_eq!(result.clusters.len(), 1);
    assert_eq!(result.clusters.get(0).unwrap().members, vec![0]);
}

#[test]
fn test_cleanup_joins_small_gap() {
    let cluster = |id: usize, start: f64, end: f64| {
        let mut bounds = BoundingBox::from_point(&[start, 400.0]);
        bounds.enlarge(&[end, 400.2]);
        FlatCluster {
            id,
            members: vec![id],
            centroid: vec![(start + end) / 2.0, 400.1],
            bounds,
        }
    };
    let clusters = ClusterSet::new(vec![
        cluster(0, 0.0, 1.0),
        cluster(1, 1.05, 2.0),
        cluster(2, 10.0, 11.0),
    ]);
    let config = CleanupConfig {
        axis: 0,
        min_span: None,
        max_gap: Some(0.5),
    };
    let (out, summary) = config.apply(clusters);
    assert_eq!(summary.num_joined, 1);
    assert_eq!(out.len(), 2);
    assert_eq!(out.get(0).unwrap().bounds.interval(0), (0.0, 2.0));
    assert_eq!(out.get(0).unwrap().members, vec![0, 1]);
    assert_eq!(out.get(2).unwrap().bounds.interval(0), (10.0, 11.0));
}

#[test]
fn test_cut_is_idempotent() {
    let tree = cluster_distance_matrix(&six_point_matrix(), Linkage::Complete, f64::INFINITY).unwrap();
    for h in [0.0, 0.35, 0.5, 0.75, 1.0] {
        assert_eq!(tree.cut_at_distance(h), tree.cut_at_distance(h));
    }
    assert_eq!(tree.cut_into(4).unwrap(), tree.cut_into(4).unwrap());
    assert_eq!(tree.cut_at_distance(0.75).num_clusters(), 3);
}
