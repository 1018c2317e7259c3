use serde::{
    Deserialize,
    Serialize,
};
use tracing::warn;

use crate::errors::{
    ConfigurationError,
    Result,
};
use crate::grid::SearchRadius;
use crate::linkage::{
    DistanceMetric,
    Linkage,
    LinkageEvaluator,
};

/// Configuration of one clustering run.
///
/// Example:
/// ```
/// use gridclust::{ClusteringConfig, Linkage};
///
/// let config = ClusteringConfig::new(vec![0.5, 0.01])
///     .with_linkage(Linkage::Complete)
///     .with_threshold(0.5);
/// assert!(config.validate(2).is_ok());
/// ```
///
/// Grid cells should be at least as wide as the distance a merge may span
/// along each axis (`merge_threshold` for the plain euclidean metric). In
/// that case only the directly adjacent cells are searched for merge
/// candidates; narrower cells are supported but widen the search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusteringConfig {
    /// Width of a grid cell along every axis.
    pub cell_dimension: Vec<f64>,
    #[serde(default)]
    pub linkage: Linkage,
    #[serde(default)]
    pub metric: DistanceMetric,
    /// Largest linkage distance at which two clusters may still merge.
    /// `null` (or a missing value) means every pair may merge.
    #[serde(default = "unbounded", with = "threshold_serde")]
    pub merge_threshold: f64,
    /// Stop after this many merges.
    #[serde(default)]
    pub max_merges: Option<usize>,
}

fn unbounded() -> f64 {
    f64::INFINITY
}

impl Default for ClusteringConfig {
    fn default() -> Self {
        Self {
            cell_dimension: vec![1.0, 1.0],
            linkage: Linkage::Single,
            metric: DistanceMetric::Euclidean,
            merge_threshold: 1.0,
            max_merges: None,
        }
    }
}

impl ClusteringConfig {
    /// Single linkage, euclidean metric and no merge threshold.
    pub fn new(cell_dimension: Vec<f64>) -> Self {
        Self {
            cell_dimension,
            merge_threshold: f64::INFINITY,
            ..Default::default()
        }
    }

    pub fn with_linkage(mut self, linkage: Linkage) -> Self {
        self.linkage = linkage;
        self
    }

    pub fn with_metric(mut self, metric: DistanceMetric) -> Self {
        self.metric = metric;
        self
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.merge_threshold = threshold;
        self
    }

    pub fn with_max_merges(mut self, max_merges: usize) -> Self {
        self.max_merges = Some(max_merges);
        self
    }

    /// Checks the configuration against data with `dimension` axes.
    pub fn validate(&self, dimension: usize) -> Result<()> {
        if dimension == 0 {
            return Err(ConfigurationError::ZeroDimensions.into());
        }
        if self.cell_dimension.len() != dimension {
            return Err(ConfigurationError::DimensionMismatch {
                what: "cell dimension",
                expected: dimension,
                real: self.cell_dimension.len(),
            }
            .into());
        }
        for (axis, value) in self.cell_dimension.iter().enumerate() {
            if !(value.is_finite() && *value > 0.0) {
                return Err(ConfigurationError::NonPositiveCellDimension {
                    axis,
                    value: *value,
                }
                .into());
            }
        }
        // NaN fails this comparison as well
        if !(self.merge_threshold > 0.0) {
            return Err(ConfigurationError::NonPositiveThreshold(self.merge_threshold).into());
        }
        self.metric.validate(dimension)?;

        if self.merge_threshold.is_finite() {
            for (axis, cell) in self.cell_dimension.iter().enumerate() {
                let extent = self.metric.axis_extent(self.merge_threshold, axis);
                if *cell > 10.0 * extent {
                    warn!(
                        "Cell dimension {} on axis {} is much larger than the merge extent {}, \
                         every query will scan many points",
                        cell, axis, extent
                    );
                }
            }
        }
        Ok(())
    }

    pub fn evaluator(&self) -> LinkageEvaluator {
        LinkageEvaluator::new(self.linkage, self.metric.clone(), self.merge_threshold)
    }

    /// Number of cells around a query cell that can hold merge candidates.
    ///
    /// Per axis `floor(extent / cell_dimension) + 1` where `extent` is
    /// the largest displacement along that axis within the threshold. Two
    /// coordinates `extent` apart can sit that many cells apart when the
    /// ratio is a whole number, and rounding of the cell index can push a
    /// pair at exactly the threshold one cell further. Ratios within a few
    /// ulps below a whole number are rounded up for the same reason.
    pub fn search_radius(&self) -> Vec<SearchRadius> {
        if !self.merge_threshold.is_finite() {
            return vec![SearchRadius::Unbounded; self.cell_dimension.len()];
        }
        self.cell_dimension
            .iter()
            .enumerate()
            .map(|(axis, cell)| {
                let ratio = self.metric.axis_extent(self.merge_threshold, axis) / cell;
                let cells = (ratio + ratio * RADIUS_SLACK).floor() + 1.0;
                if cells.is_finite() && cells < (i32::MAX as f64) {
                    SearchRadius::Cells(cells as i64)
                } else {
                    SearchRadius::Unbounded
                }
            })
            .collect()
    }
}

const RADIUS_SLACK: f64 = 4.0 * f64::EPSILON;

// Infinity has no JSON representation, so an unbounded threshold is
// written as `null`.
mod threshold_serde {
    use serde::{
        Deserialize,
        Deserializer,
        Serializer,
    };

    pub fn serialize<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
        if value.is_finite() {
            serializer.serialize_some(value)
        } else {
            serializer.serialize_none()
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        let value: Option<f64> = Option::deserialize(deserializer)?;
        Ok(value.unwrap_or(f64::INFINITY))
    }
}
