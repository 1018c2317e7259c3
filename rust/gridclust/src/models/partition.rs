use serde::{
    Deserialize,
    Serialize,
};
use std::collections::BTreeMap;
use std::fmt::Display;

use super::PointId;

/// Flat assignment of every point to the cluster it ends up in.
///
/// Clusters are named after their smallest member id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Partition {
    assignment: BTreeMap<PointId, PointId>,
}

impl Partition {
    /// Builds a partition from `(point, cluster)` pairs.
    ///
    /// Cluster names are normalised to the smallest member of each cluster,
    /// so any labelling of the same grouping yields the same partition.
    pub fn from_assignment<T: IntoIterator<Item = (PointId, PointId)>>(pairs: T) -> Self {
        let mut lowest: BTreeMap<PointId, PointId> = BTreeMap::new();
        let raw: Vec<(PointId, PointId)> = pairs.into_iter().collect();
        for (point, label) in raw.iter() {
            lowest
                .entry(*label)
                .and_modify(|x| *x = (*x).min(*point))
                .or_insert(*point);
        }
        let assignment = raw
            .into_iter()
            .map(|(point, label)| (point, lowest[&label]))
            .collect();
        Self { assignment }
    }

    pub fn cluster_of(&self, point: PointId) -> Option<PointId> {
        self.assignment.get(&point).copied()
    }

    /// Number of assigned points.
    pub fn len(&self) -> usize {
        self.assignment.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assignment.is_empty()
    }

    pub fn num_clusters(&self) -> usize {
        self.clusters().len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (PointId, PointId)> + '_ {
        self.assignment.iter().map(|(k, v)| (*k, *v))
    }

    /// Members of every cluster, keyed by cluster name. Members are sorted.
    pub fn clusters(&self) -> BTreeMap<PointId, Vec<PointId>> {
        let mut out: BTreeMap<PointId, Vec<PointId>> = BTreeMap::new();
        for (point, cluster) in self.assignment.iter() {
            out.entry(*cluster).or_default().push(*point);
        }
        out
    }

    pub fn stats(&self) -> PartitionStats {
        let sizes: Vec<usize> = self.clusters().values().map(|x| x.len()).collect();
        let num_clusters = sizes.len();
        let mean_cluster_size = if num_clusters == 0 {
            0.0
        } else {
            self.len() as f64 / num_clusters as f64
        };
        PartitionStats {
            num_points: self.len(),
            num_clusters,
            num_singletons: sizes.iter().filter(|x| **x == 1).count(),
            largest_cluster: sizes.iter().copied().max().unwrap_or(0),
            mean_cluster_size,
        }
    }
}

/// Summary of the cluster population of a [`Partition`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PartitionStats {
    pub num_points: usize,
    pub num_clusters: usize,
    pub num_singletons: usize,
    pub largest_cluster: usize,
    pub mean_cluster_size: f64,
}

impl Display for PartitionStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} points in {} clusters ({} singletons, largest {}, mean size {:.2})",
            self.num_points,
            self.num_clusters,
            self.num_singletons,
            self.largest_cluster,
            self.mean_cluster_size
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_labels_are_normalised() {
        let a = Partition::from_assignment(vec![(0, 7), (1, 7), (2, 9), (5, 7)]);
        let b = Partition::from_assignment(vec![(0, 0), (1, 0), (2, 2), (5, 0)]);
        assert_eq!(a, b);
        assert_eq!(a.cluster_of(5), Some(0));
        assert_eq!(a.cluster_of(3), None);
        assert_eq!(a.num_clusters(), 2);
    }

    #[test]
    fn test_stats() {
        let part = Partition::from_assignment(vec![(0, 0), (1, 0), (2, 0), (3, 3)]);
        let stats = part.stats();
        assert_eq!(stats.num_points, 4);
        assert_eq!(stats.num_clusters, 2);
        assert_eq!(stats.num_singletons, 1);
        assert_eq!(stats.largest_cluster, 3);
        assert_eq!(stats.mean_cluster_size, 2.0);

        let empty = Partition::default().stats();
        assert_eq!(empty.num_clusters, 0);
        assert_eq!(empty.mean_cluster_size, 0.0);
    }
}
