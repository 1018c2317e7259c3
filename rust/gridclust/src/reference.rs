//! Exhaustive agglomerative clustering.
//!
//! Every step compares all pairs of open clusters, without any spatial
//! index. This is O(n^3) and only meant for small inputs: precomputed
//! distance matrices and cross-checking the grid accelerated engine.
//! Both entry points use the same merge order as the engine, the pair
//! minimising `(distance, lower name, higher name)`.

use std::cmp::Ordering;
use tracing::instrument;

use crate::engine::{
    ClusteringConfig,
    ClusteringResult,
};
use crate::errors::{
    ConfigurationError,
    Result,
};
use crate::linkage::{
    Linkage,
    is_mergeable,
};
use crate::models::{
    ClusterRecord,
    ClusterSet,
    MergeNode,
    MergeTree,
    PointId,
    PointStore,
};

/// Symmetric matrix of point distances with an implicit zero diagonal,
/// stored as the condensed lower triangle.
#[derive(Debug, Clone, PartialEq)]
pub struct DistanceMatrix {
    size: usize,
    values: Vec<f64>,
}

impl DistanceMatrix {
    /// `size` x `size` matrix with every distance set to 0.
    pub fn new(size: usize) -> Self {
        Self {
            size,
            values: vec![0.0; size * size.saturating_sub(1) / 2],
        }
    }

    /// Fills the matrix with `f(i, j)` for every `i > j`.
    pub fn from_fn<F: FnMut(usize, usize) -> f64>(size: usize, mut f: F) -> Self {
        let mut values = Vec::with_capacity(size * size.saturating_sub(1) / 2);
        for i in 1..size {
            for j in 0..i {
                values.push(f(i, j));
            }
        }
        Self { size, values }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Sets `d(i, j)` (and therefore `d(j, i)`). Panics for `i == j` or
    /// indices out of range.
    pub fn set(&mut self, i: usize, j: usize, value: f64) {
        assert_ne!(i, j, "the diagonal of a distance matrix is fixed to 0");
        let idx = self.index(i, j);
        self.values[idx] = value;
    }

    pub fn get(&self, i: usize, j: usize) -> f64 {
        if i == j {
            assert!(i < self.size, "index {} out of range {}", i, self.size);
            return 0.0;
        }
        self.values[self.index(i, j)]
    }

    fn index(&self, i: usize, j: usize) -> usize {
        let (hi, lo) = if i > j { (i, j) } else { (j, i) };
        assert!(hi < self.size, "index {} out of range {}", hi, self.size);
        hi * (hi - 1) / 2 + lo
    }
}

/// Clusters the `size` items of a distance matrix.
///
/// Only pairwise linkages can be evaluated from point distances, centroid
/// linkage is rejected.
#[instrument(skip_all)]
pub fn cluster_distance_matrix(
    matrix: &DistanceMatrix,
    linkage: Linkage,
    threshold: f64,
) -> Result<MergeTree> {
    if !linkage.is_pairwise() {
        return Err(ConfigurationError::UnsupportedLinkage(linkage).into());
    }
    if !(threshold > 0.0) {
        return Err(ConfigurationError::NonPositiveThreshold(threshold).into());
    }
    let items = (0..matrix.size()).map(|i| (i, vec![i])).collect();
    let distance = |a: &Vec<usize>, b: &Vec<usize>| {
        let pairs = a
            .iter()
            .flat_map(|i| b.iter().map(move |j| matrix.get(*i, *j)));
        linkage
            .reduce_pairwise(pairs)
            .filter(|d| is_mergeable(*d, threshold))
    };
    let merge = |mut a: Vec<usize>, b: Vec<usize>| {
        a.extend(b);
        a
    };
    let (tree, _) = agglomerate(items, distance, merge, None);
    Ok(tree)
}

/// Clusters the points of a store comparing every pair of clusters at
/// every step. Produces the same merges as
/// [`crate::engine::HierarchicalClusterer`] for the same configuration.
#[instrument(skip_all)]
pub fn cluster_exhaustive(store: &PointStore, config: &ClusteringConfig) -> Result<ClusteringResult> {
    config.validate(store.dimension())?;
    let evaluator = config.evaluator();
    let mut items = Vec::with_capacity(store.len());
    for (id, coordinates) in store.iter() {
        let properties = store.properties(id)?;
        items.push((id, ClusterRecord::singleton(id, coordinates, properties)));
    }
    let (tree, clusters) = agglomerate(
        items,
        |a, b| evaluator.merge_distance(a, b),
        ClusterRecord::merge,
        config.max_merges,
    );
    Ok(ClusteringResult {
        tree,
        clusters: ClusterSet::from_records(clusters.iter()),
    })
}

// Items must be keyed by distinct names. `distance` returns None for pairs
// that may not merge and is always called with the lower named cluster
// first.
fn agglomerate<C, D, M>(
    mut items: Vec<(PointId, C)>,
    distance: D,
    merge: M,
    max_merges: Option<usize>,
) -> (MergeTree, Vec<C>)
where
    D: Fn(&C, &C) -> Option<f64>,
    M: Fn(C, C) -> C,
{
    items.sort_by_key(|x| x.0);
    let n = items.len();
    let names: Vec<PointId> = items.iter().map(|x| x.0).collect();
    let mut slots: Vec<Option<C>> = items.into_iter().map(|x| Some(x.1)).collect();
    let mut tree = MergeTree::new(names.clone());

    // cache[i * n + j], i < j
    let mut cache: Vec<Option<f64>> = vec![None; n * n];
    for i in 0..n {
        for j in (i + 1)..n {
            if let (Some(a), Some(b)) = (&slots[i], &slots[j]) {
                cache[i * n + j] = distance(a, b);
            }
        }
    }

    while max_merges.is_none_or(|max| tree.len() < max) {
        let mut best: Option<(f64, usize, usize)> = None;
        for i in 0..n {
            if slots[i].is_none() {
                continue;
            }
            for j in (i + 1)..n {
                if slots[j].is_none() {
                    continue;
                }
                let Some(d) = cache[i * n + j] else {
                    continue;
                };
                // Pairs are visited in (i, j) order, so keeping the first
                // minimum implements the tie-break on names.
                if best.is_none_or(|(bd, _, _)| d.total_cmp(&bd) == Ordering::Less) {
                    best = Some((d, i, j));
                }
            }
        }
        let Some((d, i, j)) = best else {
            break;
        };

        let (Some(left), Some(right)) = (slots[i].take(), slots[j].take()) else {
            unreachable!("selected pair of clusters must be open");
        };
        slots[i] = Some(merge(left, right));
        tree.push(MergeNode {
            left: names[i],
            right: names[j],
            distance: d,
        });

        for k in 0..n {
            if k == i {
                continue;
            }
            let (lo, hi) = if k < i { (k, i) } else { (i, k) };
            if let (Some(a), Some(b)) = (&slots[lo], &slots[hi]) {
                cache[lo * n + hi] = distance(a, b);
            }
        }
    }

    (tree, slots.into_iter().flatten().collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::GridClusterError;

    #[test]
    fn test_condensed_indexing() {
        let mut matrix = DistanceMatrix::new(4);
        matrix.set(3, 1, 2.5);
        assert_eq!(matrix.get(1, 3), 2.5);
        assert_eq!(matrix.get(3, 1), 2.5);
        assert_eq!(matrix.get(2, 2), 0.0);

        let matrix = DistanceMatrix::from_fn(4, |i, j| (i * 10 + j) as f64);
        assert_eq!(matrix.get(2, 0), 20.0);
        assert_eq!(matrix.get(1, 3), 31.0);
        assert_eq!(DistanceMatrix::new(0).size(), 0);
    }

    #[test]
    #[should_panic]
    fn test_out_of_range_panics() {
        DistanceMatrix::new(3).get(0, 3);
    }

    #[test]
    fn test_centroid_needs_coordinates() {
        let matrix = DistanceMatrix::new(3);
        assert_eq!(
            cluster_distance_matrix(&matrix, Linkage::Centroid, f64::INFINITY),
            Err(GridClusterError::Configuration(
                ConfigurationError::UnsupportedLinkage(Linkage::Centroid)
            ))
        );
    }

    #[test]
    fn test_threshold_stops_matrix_clustering() {
        let matrix = DistanceMatrix::from_fn(3, |i, j| (i - j) as f64 * 2.0);
        let tree = cluster_distance_matrix(&matrix, Linkage::Single, 1.0).unwrap();
        assert!(tree.is_empty());
        let tree = cluster_distance_matrix(&matrix, Linkage::Complete, 2.0).unwrap();
        assert_eq!(tree.len(), 1);
        assert_eq!(tree.nodes()[0].left, 0);
        assert_eq!(tree.nodes()[0].right, 1);
    }

    #[test]
    fn test_max_merges() {
        let mut store = PointStore::new(1).unwrap();
        for x in [0.0, 1.0, 3.0, 7.0] {
            store.add(&[x]).unwrap();
        }
        let config = ClusteringConfig::new(vec![1.0]).with_max_merges(2);
        let result = cluster_exhaustive(&store, &config).unwrap();
        assert_eq!(result.tree.len(), 2);
        assert_eq!(result.clusters.len(), 2);
    }
}
