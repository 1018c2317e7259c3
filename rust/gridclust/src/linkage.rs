//! Distances between points and between clusters.

use serde::{
    Deserialize,
    Serialize,
};

use crate::errors::ConfigurationError;
use crate::models::ClusterRecord;

/// Rule used to turn point distances into a cluster distance.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Linkage {
    /// Minimum distance over all member pairs.
    #[default]
    Single,
    /// Maximum distance over all member pairs.
    Complete,
    /// Distance between the member-count weighted cluster centres.
    Centroid,
}

impl Linkage {
    /// Whether the distance only depends on member coordinates, so a
    /// precomputed point distance matrix is enough to evaluate it.
    pub fn is_pairwise(&self) -> bool {
        matches!(self, Linkage::Single | Linkage::Complete)
    }

    /// Cluster distance from an iterator of member pair distances.
    ///
    /// Returns None for an empty iterator or for centroid linkage.
    pub fn reduce_pairwise<T: IntoIterator<Item = f64>>(&self, distances: T) -> Option<f64> {
        match self {
            Linkage::Single => distances.into_iter().reduce(f64::min),
            Linkage::Complete => distances.into_iter().reduce(f64::max),
            Linkage::Centroid => None,
        }
    }
}

/// Point to point distance.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum DistanceMetric {
    #[default]
    Euclidean,
    /// Euclidean distance after dividing every axis by its scale, for data
    /// whose axes have different units (e.g. seconds and m/z).
    ScaledEuclidean { scale: Vec<f64> },
}

impl DistanceMetric {
    pub fn distance(&self, a: &[f64], b: &[f64]) -> f64 {
        debug_assert_eq!(a.len(), b.len());
        match self {
            DistanceMetric::Euclidean => a
                .iter()
                .zip(b.iter())
                .map(|(x, y)| (x - y) * (x - y))
                .sum::<f64>()
                .sqrt(),
            DistanceMetric::ScaledEuclidean { scale } => a
                .iter()
                .zip(b.iter())
                .zip(scale.iter())
                .map(|((x, y), s)| {
                    let d = (x - y) / s;
                    d * d
                })
                .sum::<f64>()
                .sqrt(),
        }
    }

    /// Largest displacement along `axis` two points can have while staying
    /// within `distance` of each other.
    pub fn axis_extent(&self, distance: f64, axis: usize) -> f64 {
        match self {
            DistanceMetric::Euclidean => distance,
            DistanceMetric::ScaledEuclidean { scale } => distance * scale[axis],
        }
    }

    pub fn validate(&self, dimension: usize) -> Result<(), ConfigurationError> {
        match self {
            DistanceMetric::Euclidean => Ok(()),
            DistanceMetric::ScaledEuclidean { scale } => {
                if scale.len() != dimension {
                    return Err(ConfigurationError::DimensionMismatch {
                        what: "metric scale",
                        expected: dimension,
                        real: scale.len(),
                    });
                }
                for (axis, value) in scale.iter().enumerate() {
                    if !(value.is_finite() && *value > 0.0) {
                        return Err(ConfigurationError::NonPositiveScale {
                            axis,
                            value: *value,
                        });
                    }
                }
                Ok(())
            }
        }
    }
}

/// `distance <= threshold`.
pub fn is_mergeable(distance: f64, threshold: f64) -> bool {
    distance <= threshold
}

/// Evaluates cluster distances under one linkage rule and metric and
/// decides which pairs may merge.
#[derive(Debug, Clone, PartialEq)]
pub struct LinkageEvaluator {
    linkage: Linkage,
    metric: DistanceMetric,
    threshold: f64,
}

impl LinkageEvaluator {
    pub fn new(linkage: Linkage, metric: DistanceMetric, threshold: f64) -> Self {
        Self {
            linkage,
            metric,
            threshold,
        }
    }

    /// Linkage distance between two clusters. A cluster is at distance 0
    /// from itself.
    pub fn distance(&self, a: &ClusterRecord, b: &ClusterRecord) -> f64 {
        if a.id() == b.id() {
            return 0.0;
        }
        match self.linkage {
            Linkage::Centroid => self.metric.distance(a.centroid(), b.centroid()),
            Linkage::Single | Linkage::Complete => {
                let pairs = a.member_coordinates().flat_map(|pa| {
                    b.member_coordinates()
                        .map(move |pb| self.metric.distance(pa, pb))
                });
                // Clusters are never empty
                self.linkage.reduce_pairwise(pairs).unwrap_or(f64::INFINITY)
            }
        }
    }

    pub fn is_mergeable(&self, distance: f64) -> bool {
        is_mergeable(distance, self.threshold)
    }

    /// Distance between two distinct clusters if they are allowed to
    /// merge, None for self pairs, vetoed pairs or pairs beyond the
    /// threshold.
    pub fn merge_distance(&self, a: &ClusterRecord, b: &ClusterRecord) -> Option<f64> {
        if a.id() == b.id() || a.is_merge_vetoed(b) {
            return None;
        }
        let d = self.distance(a, b);
        if self.is_mergeable(d) { Some(d) } else { None }
    }
}
