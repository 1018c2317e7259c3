use serde::Serialize;

use super::PointId;
use super::bounding_box::BoundingBox;
use super::point_store::PointProperties;

/// A group of points that are (so far) clustered together.
///
/// A cluster is named after its smallest member id, so merging two
/// clusters keeps the name of the lower one. Member coordinates are
/// copied in so linkage distances can be evaluated without going back
/// to the point store.
#[derive(Debug, Clone, Serialize)]
pub struct ClusterRecord {
    id: PointId,
    members: Vec<PointId>,
    #[serde(skip)]
    member_coordinates: Vec<f64>,
    centroid: Vec<f64>,
    bounds: BoundingBox,
    group: Option<i64>,
    // Sorted. None as soon as any member is untagged.
    #[serde(skip)]
    tags: Option<Vec<i64>>,
}

impl ClusterRecord {
    pub fn singleton(id: PointId, coordinates: &[f64], properties: PointProperties) -> Self {
        Self {
            id,
            members: vec![id],
            member_coordinates: coordinates.to_vec(),
            centroid: coordinates.to_vec(),
            bounds: BoundingBox::from_point(coordinates),
            group: properties.group,
            tags: properties.tag.map(|t| vec![t]),
        }
    }

    /// Merges two clusters into a new one named after `left`.
    ///
    /// The new centroid is the member-count weighted mean of both centroids.
    pub fn merge(left: ClusterRecord, right: ClusterRecord) -> ClusterRecord {
        debug_assert!(left.id < right.id, "left cluster must have the lower id");
        debug_assert_eq!(left.dimension(), right.dimension());

        let nl = left.len() as f64;
        let nr = right.len() as f64;
        let centroid = left
            .centroid
            .iter()
            .zip(right.centroid.iter())
            .map(|(l, r)| (l * nl + r * nr) / (nl + nr))
            .collect();

        let mut bounds = left.bounds;
        bounds.extend(&right.bounds);

        let tags = match (left.tags, right.tags) {
            (Some(l), Some(r)) => Some(merge_sorted(&l, &r)),
            _ => None,
        };

        let mut members = left.members;
        members.extend_from_slice(&right.members);
        let mut member_coordinates = left.member_coordinates;
        member_coordinates.extend_from_slice(&right.member_coordinates);

        ClusterRecord {
            id: left.id,
            members,
            member_coordinates,
            centroid,
            bounds,
            group: left.group.or(right.group),
            tags,
        }
    }

    pub fn id(&self) -> PointId {
        self.id
    }

    pub fn members(&self) -> &[PointId] {
        &self.members
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn dimension(&self) -> usize {
        self.centroid.len()
    }

    pub fn centroid(&self) -> &[f64] {
        &self.centroid
    }

    pub fn bounds(&self) -> &BoundingBox {
        &self.bounds
    }

    pub fn member_coordinates(&self) -> std::slice::ChunksExact<'_, f64> {
        self.member_coordinates.chunks_exact(self.dimension())
    }

    /// Whether the point properties forbid merging these two clusters.
    pub fn is_merge_vetoed(&self, other: &ClusterRecord) -> bool {
        if let (Some(a), Some(b)) = (self.group, other.group) {
            if a != b {
                return true;
            }
        }
        match (&self.tags, &other.tags) {
            (Some(a), Some(b)) => sorted_intersect(a, b),
            _ => false,
        }
    }
}

fn merge_sorted(left: &[i64], right: &[i64]) -> Vec<i64> {
    let mut out = Vec::with_capacity(left.len() + right.len());
    let (mut i, mut j) = (0, 0);
    while i < left.len() && j < right.len() {
        if left[i] <= right[j] {
            out.push(left[i]);
            i += 1;
        } else {
            out.push(right[j]);
            j += 1;
        }
    }
    out.extend_from_slice(&left[i..]);
    out.extend_from_slice(&right[j..]);
    out
}

fn sorted_intersect(left: &[i64], right: &[i64]) -> bool {
    let (mut i, mut j) = (0, 0);
    while i < left.len() && j < right.len() {
        match left[i].cmp(&right[j]) {
            std::cmp::Ordering::Less => i += 1,
            std::cmp::Ordering::Greater => j += 1,
            std::cmp::Ordering::Equal => return true,
        }
    }
    false
}
