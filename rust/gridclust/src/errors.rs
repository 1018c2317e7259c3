use std::fmt::Display;

use crate::linkage::Linkage;
use crate::models::PointId;

pub type Result<T> = std::result::Result<T, GridClusterError>;

#[derive(Debug, Clone, PartialEq)]
pub enum GridClusterError {
    InvalidCoordinate(InvalidCoordinateError),
    Configuration(ConfigurationError),
    NotFound(PointId),
    InvalidCut {
        requested: usize,
        min_clusters: usize,
        max_clusters: usize,
    },
}

impl Display for GridClusterError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidCoordinate(e) => write!(f, "Invalid coordinate: {}", e),
            Self::Configuration(e) => write!(f, "Invalid configuration: {}", e),
            Self::NotFound(id) => write!(f, "Point {} not found", id),
            Self::InvalidCut {
                requested,
                min_clusters,
                max_clusters,
            } => write!(
                f,
                "Cannot cut the tree into {} clusters, possible counts are {}..={}",
                requested, min_clusters, max_clusters
            ),
        }
    }
}

impl std::error::Error for GridClusterError {}

#[derive(Debug, Clone, PartialEq)]
pub enum InvalidCoordinateError {
    DimensionMismatch { expected: usize, real: usize },
    NotANumber { axis: usize },
    Infinite { axis: usize, value: f64 },
}

impl Display for InvalidCoordinateError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DimensionMismatch { expected, real } => write!(
                f,
                "expected {} dimensions but got {}",
                expected, real
            ),
            Self::NotANumber { axis } => write!(f, "NaN on axis {}", axis),
            Self::Infinite { axis, value } => write!(f, "{} on axis {}", value, axis),
        }
    }
}

impl From<InvalidCoordinateError> for GridClusterError {
    fn from(e: InvalidCoordinateError) -> Self {
        GridClusterError::InvalidCoordinate(e)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ConfigurationError {
    ZeroDimensions,
    DimensionMismatch {
        what: &'static str,
        expected: usize,
        real: usize,
    },
    NonPositiveCellDimension { axis: usize, value: f64 },
    NonPositiveThreshold(f64),
    NonPositiveScale { axis: usize, value: f64 },
    AxisOutOfRange { axis: usize, dimension: usize },
    UnsupportedLinkage(Linkage),
}

impl Display for ConfigurationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ZeroDimensions => write!(f, "points need at least one dimension"),
            Self::DimensionMismatch {
                what,
                expected,
                real,
            } => write!(
                f,
                "{} has {} dimensions but the points have {}",
                what, real, expected
            ),
            Self::NonPositiveCellDimension { axis, value } => write!(
                f,
                "cell dimension on axis {} must be positive and finite, got {}",
                axis, value
            ),
            Self::NonPositiveThreshold(x) => {
                write!(f, "merge threshold must be positive, got {}", x)
            }
            Self::NonPositiveScale { axis, value } => write!(
                f,
                "metric scale on axis {} must be positive and finite, got {}",
                axis, value
            ),
            Self::AxisOutOfRange { axis, dimension } => write!(
                f,
                "axis {} does not exist in {} dimensional data",
                axis, dimension
            ),
            Self::UnsupportedLinkage(linkage) => write!(
                f,
                "{:?} linkage needs point coordinates and cannot run on a distance matrix",
                linkage
            ),
        }
    }
}

impl From<ConfigurationError> for GridClusterError {
    fn from(e: ConfigurationError) -> Self {
        GridClusterError::Configuration(e)
    }
}
