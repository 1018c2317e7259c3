#![doc = include_str!("../README.md")]

// Declare modules
pub mod cleanup;
pub mod engine;
pub mod errors;
pub mod grid;
pub mod linkage;
pub mod models;
pub mod reference;

// Re-export main structures
pub use crate::cleanup::{
    CleanupConfig,
    CleanupSummary,
};
pub use crate::engine::{
    ClusteringConfig,
    ClusteringResult,
    ClusteringState,
    HierarchicalClusterer,
    cluster_points,
};
pub use crate::grid::{
    CellKey,
    SearchRadius,
    SpatialGrid,
};
pub use crate::linkage::{
    DistanceMetric,
    Linkage,
    LinkageEvaluator,
};
pub use crate::models::{
    BoundingBox,
    ClusterRecord,
    ClusterSet,
    CutConfig,
    FlatCluster,
    MergeNode,
    MergeTree,
    Partition,
    PartitionStats,
    PointId,
    PointProperties,
    PointStore,
};
pub use crate::reference::{
    DistanceMatrix,
    cluster_distance_matrix,
    cluster_exhaustive,
};

// Re-export errors
pub use crate::errors::{
    ConfigurationError,
    GridClusterError,
    InvalidCoordinateError,
};
