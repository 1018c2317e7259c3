use serde::{
    Deserialize,
    Serialize,
};
use std::collections::BTreeMap;

use super::PointId;
use super::bounding_box::BoundingBox;
use super::cluster::ClusterRecord;
use super::partition::Partition;
use super::point_store::PointStore;
use crate::errors::Result;

/// A final cluster as handed to the caller, without any of the bookkeeping
/// the engine needs while clustering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlatCluster {
    pub id: PointId,
    /// Sorted member point ids.
    pub members: Vec<PointId>,
    pub centroid: Vec<f64>,
    pub bounds: BoundingBox,
}

impl FlatCluster {
    pub fn from_record(record: &ClusterRecord) -> Self {
        let mut members = record.members().to_vec();
        members.sort_unstable();
        Self {
            id: record.id(),
            members,
            centroid: record.centroid().to_vec(),
            bounds: record.bounds().clone(),
        }
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Takes over every member of `other`. The result is named after the
    /// smaller of the two ids.
    pub fn absorb(&mut self, other: FlatCluster) {
        let n_self = self.len() as f64;
        let n_other = other.len() as f64;
        for (c, o) in self.centroid.iter_mut().zip(other.centroid.iter()) {
            *c = (*c * n_self + o * n_other) / (n_self + n_other);
        }
        self.bounds.extend(&other.bounds);
        self.members.extend(other.members);
        self.members.sort_unstable();
        self.id = self.id.min(other.id);
    }
}

/// Collection of final clusters ordered by id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClusterSet {
    clusters: Vec<FlatCluster>,
}

impl ClusterSet {
    pub fn new(mut clusters: Vec<FlatCluster>) -> Self {
        clusters.sort_unstable_by_key(|x| x.id);
        Self { clusters }
    }

    pub fn from_records<'a, T: IntoIterator<Item = &'a ClusterRecord>>(records: T) -> Self {
        Self::new(records.into_iter().map(FlatCluster::from_record).collect())
    }

    /// Materializes the clusters of a partition, computing centroids and
    /// bounding boxes from the stored coordinates.
    pub fn from_partition(partition: &Partition, store: &PointStore) -> Result<Self> {
        let mut clusters = Vec::with_capacity(partition.num_clusters());
        for (id, members) in partition.clusters() {
            let mut centroid = vec![0.0; store.dimension()];
            let mut bounds: Option<BoundingBox> = None;
            for point in members.iter() {
                let coords = store.get(*point)?;
                for (c, v) in centroid.iter_mut().zip(coords.iter()) {
                    *c += v;
                }
                match bounds.as_mut() {
                    Some(b) => b.enlarge(coords),
                    None => bounds = Some(BoundingBox::from_point(coords)),
                }
            }
            let n = members.len() as f64;
            centroid.iter_mut().for_each(|c| *c /= n);
            // Partition clusters always have at least one member
            let bounds = bounds.unwrap_or_else(|| BoundingBox::from_point(&centroid));
            clusters.push(FlatCluster {
                id,
                members,
                centroid,
                bounds,
            });
        }
        Ok(Self::new(clusters))
    }

    pub fn len(&self) -> usize {
        self.clusters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clusters.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, FlatCluster> {
        self.clusters.iter()
    }

    pub fn get(&self, id: PointId) -> Option<&FlatCluster> {
        self.clusters
            .binary_search_by_key(&id, |x| x.id)
            .ok()
            .map(|i| &self.clusters[i])
    }

    pub fn into_vec(self) -> Vec<FlatCluster> {
        self.clusters
    }

    /// Total number of points over all clusters.
    pub fn num_points(&self) -> usize {
        self.clusters.iter().map(|x| x.len()).sum()
    }

    pub fn partition(&self) -> Partition {
        let assignment: BTreeMap<PointId, PointId> = self
            .clusters
            .iter()
            .flat_map(|c| c.members.iter().map(move |m| (*m, c.id)))
            .collect();
        Partition::from_assignment(assignment)
    }
}

impl<'a> IntoIterator for &'a ClusterSet {
    type Item = &'a FlatCluster;
    type IntoIter = std::slice::Iter<'a, FlatCluster>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
