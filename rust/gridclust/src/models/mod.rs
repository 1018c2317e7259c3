pub mod bounding_box;
pub mod cluster;
pub mod cluster_set;
pub mod merge_tree;
pub mod partition;
pub mod point_store;

/// Stable identifier of a point, handed out by the [`PointStore`].
///
/// Clusters are named after their smallest member, so the same type is
/// used to refer to clusters.
pub type PointId = usize;

pub use bounding_box::BoundingBox;
pub use cluster::ClusterRecord;
pub use cluster_set::{
    ClusterSet,
    FlatCluster,
};
pub use merge_tree::{
    CutConfig,
    MergeNode,
    MergeTree,
};
pub use partition::{
    Partition,
    PartitionStats,
};
pub use point_store::{
    PointProperties,
    PointStore,
};
