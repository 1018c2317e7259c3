//! Grid accelerated agglomerative clustering.
//!
//! Every open cluster caches its nearest mergeable neighbour. The next
//! merge is the cached pair minimising `(distance, lower name, higher name)`,
//! after a merge only the clusters that pointed at one of the parents are
//! recomputed from scratch, every other cache is checked against the newly
//! formed cluster only. Candidate clusters are found through the spatial
//! grid, so clusters further apart than the merge threshold are never
//! compared.

mod config;
mod nearest;

use rayon::prelude::*;
use serde::Serialize;
use tracing::{
    debug,
    info,
    instrument,
};

use crate::errors::{
    GridClusterError,
    Result,
};
use crate::grid::{
    SearchRadius,
    SpatialGrid,
};
use crate::linkage::{
    Linkage,
    LinkageEvaluator,
};
use crate::models::{
    ClusterRecord,
    ClusterSet,
    MergeNode,
    MergeTree,
    Partition,
    PointId,
    PointStore,
};
pub use config::ClusteringConfig;
use nearest::{
    NearestNeighbour,
    NearestNeighbourQueue,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ClusteringState {
    /// Clusters and grid are populated, no distances computed yet.
    Initialized,
    Running,
    /// No further merge is possible (or allowed). Terminal.
    Terminated,
}

/// Runs the merge loop over the points of a [`PointStore`].
///
/// The engine starts with one cluster per point and performs one merge
/// per [`HierarchicalClusterer::step`] call, recording each merge in its
/// [`MergeTree`].
///
/// Single and complete linkage keep every member point in the grid at its
/// own coordinates and map points to their owning cluster; centroid
/// linkage keeps one grid entry per cluster at its centre and moves it
/// as clusters merge.
#[derive(Debug)]
pub struct HierarchicalClusterer {
    config: ClusteringConfig,
    evaluator: LinkageEvaluator,
    radius: Vec<SearchRadius>,
    grid: SpatialGrid,
    // Indexed by cluster name, None once the cluster has been merged away
    clusters: Vec<Option<ClusterRecord>>,
    // Indexed by point id
    owner: Vec<PointId>,
    num_points: usize,
    num_open: usize,
    queue: NearestNeighbourQueue,
    tree: MergeTree,
    state: ClusteringState,
}

impl HierarchicalClusterer {
    /// Builds the engine, one singleton cluster per live point.
    ///
    /// Fails with a configuration error when the configuration does not
    /// match the dimensionality of the store.
    pub fn new(store: &PointStore, config: ClusteringConfig) -> Result<Self> {
        config.validate(store.dimension())?;
        let mut grid = SpatialGrid::new(config.cell_dimension.clone())?;
        let id_bound = store.id_bound();
        let mut clusters: Vec<Option<ClusterRecord>> = vec![None; id_bound];
        let mut owner: Vec<PointId> = (0..id_bound).collect();
        let mut leaves = Vec::with_capacity(store.len());

        for (id, coordinates) in store.iter() {
            let properties = store.properties(id)?;
            clusters[id] = Some(ClusterRecord::singleton(id, coordinates, properties));
            owner[id] = id;
            grid.place(id, coordinates);
            leaves.push(id);
        }

        let num_points = leaves.len();
        let state = if num_points == 0 {
            ClusteringState::Terminated
        } else {
            ClusteringState::Initialized
        };

        Ok(Self {
            evaluator: config.evaluator(),
            radius: config.search_radius(),
            config,
            grid,
            clusters,
            owner,
            num_points,
            num_open: num_points,
            queue: NearestNeighbourQueue::new(),
            tree: MergeTree::new(leaves),
            state,
        })
    }

    pub fn config(&self) -> &ClusteringConfig {
        &self.config
    }

    pub fn state(&self) -> ClusteringState {
        self.state
    }

    pub fn tree(&self) -> &MergeTree {
        &self.tree
    }

    pub fn grid(&self) -> &SpatialGrid {
        &self.grid
    }

    pub fn num_points(&self) -> usize {
        self.num_points
    }

    pub fn num_open_clusters(&self) -> usize {
        self.num_open
    }

    pub fn open_clusters(&self) -> impl Iterator<Item = &ClusterRecord> + '_ {
        self.clusters.iter().filter_map(|x| x.as_ref())
    }

    pub fn cluster(&self, name: PointId) -> Option<&ClusterRecord> {
        self.clusters.get(name).and_then(|x| x.as_ref())
    }

    /// Name of the open cluster `point` currently belongs to.
    pub fn cluster_of(&self, point: PointId) -> Result<PointId> {
        let name = *self
            .owner
            .get(point)
            .ok_or(GridClusterError::NotFound(point))?;
        match self.cluster(name) {
            Some(_) => Ok(name),
            None => Err(GridClusterError::NotFound(point)),
        }
    }

    /// Current assignment of every point to its open cluster.
    pub fn partition(&self) -> Partition {
        Partition::from_assignment(
            self.open_clusters()
                .flat_map(|c| c.members().iter().map(move |m| (*m, c.id()))),
        )
    }

    /// Checks that every point belongs to exactly one open cluster and that
    /// the grid agrees with the open clusters.
    pub fn verify_partition(&self) -> bool {
        let mut seen = vec![false; self.owner.len()];
        let mut total = 0;
        for cluster in self.open_clusters() {
            for member in cluster.members() {
                if seen[*member] || self.owner[*member] != cluster.id() {
                    return false;
                }
                seen[*member] = true;
                total += 1;
            }
        }
        let expected_grid_len = match self.config.linkage {
            Linkage::Centroid => self.num_open,
            Linkage::Single | Linkage::Complete => self.num_points,
        };
        total == self.num_points
            && self.open_clusters().count() == self.num_open
            && self.grid.len() == expected_grid_len
    }

    /// Performs the next merge and returns it, or None once the engine has
    /// terminated.
    pub fn step(&mut self) -> Option<MergeNode> {
        match self.state {
            ClusteringState::Terminated => return None,
            ClusteringState::Initialized => {
                self.initialize_neighbours();
                self.state = ClusteringState::Running;
            }
            ClusteringState::Running => {}
        }

        if self.num_open <= 1 || self.max_merges_reached() {
            self.terminate();
            return None;
        }
        let Some((owner, nn)) = self.queue.peek_min() else {
            self.terminate();
            return None;
        };

        let node = MergeNode {
            left: owner.min(nn.neighbour),
            right: owner.max(nn.neighbour),
            distance: nn.distance,
        };
        self.merge(node);
        debug!(
            "Merged {} and {} at distance {}, {} clusters open",
            node.left, node.right, node.distance, self.num_open
        );
        Some(node)
    }

    /// Runs until termination. Returns the number of merges performed.
    #[instrument(skip_all)]
    pub fn run(&mut self) -> usize {
        let mut merges = 0;
        while self.step().is_some() {
            merges += 1;
        }
        merges
    }

    pub fn into_result(self) -> ClusteringResult {
        let clusters = ClusterSet::from_records(self.clusters.iter().filter_map(|x| x.as_ref()));
        ClusteringResult {
            tree: self.tree,
            clusters,
        }
    }

    fn max_merges_reached(&self) -> bool {
        self.config
            .max_merges
            .is_some_and(|max| self.tree.len() >= max)
    }

    fn terminate(&mut self) {
        if self.state != ClusteringState::Terminated {
            info!(
                "Clustering finished after {} merges, {} clusters remain",
                self.tree.len(),
                self.num_open
            );
        }
        self.state = ClusteringState::Terminated;
    }

    fn open(&self, name: PointId) -> &ClusterRecord {
        self.clusters[name]
            .as_ref()
            .unwrap_or_else(|| panic!("cluster {} is not open", name))
    }

    /// Distinct open clusters (other than `cluster`) that have a grid entry
    /// close enough to possibly merge with it.
    fn candidates(&self, cluster: &ClusterRecord) -> Vec<PointId> {
        let entries = match self.config.linkage {
            Linkage::Centroid => self.grid.neighbors_within(cluster.centroid(), &self.radius),
            Linkage::Single | Linkage::Complete => self.grid.neighbors_around(
                cluster.bounds().min(),
                cluster.bounds().max(),
                &self.radius,
            ),
        };
        let mut out: Vec<PointId> = entries
            .map(|entry| self.owner[entry])
            .filter(|name| *name != cluster.id())
            .collect();
        out.sort_unstable();
        out.dedup();
        out
    }

    fn nearest_of(&self, cluster: &ClusterRecord) -> Option<NearestNeighbour> {
        let mut best: Option<NearestNeighbour> = None;
        for name in self.candidates(cluster) {
            let other = self.open(name);
            if let Some(distance) = self.evaluator.merge_distance(cluster, other) {
                let candidate = NearestNeighbour {
                    distance,
                    neighbour: name,
                };
                if best.is_none_or(|b| candidate.is_closer_than(&b)) {
                    best = Some(candidate);
                }
            }
        }
        best
    }

    #[instrument(skip_all)]
    fn initialize_neighbours(&mut self) {
        info!(
            "Clustering {} points with {:?} linkage, threshold {}",
            self.num_points,
            self.config.linkage,
            self.config.merge_threshold
        );
        let this = &*self;
        let found: Vec<(PointId, NearestNeighbour)> = this
            .clusters
            .par_iter()
            .filter_map(|x| x.as_ref())
            .filter_map(|cluster| Some((cluster.id(), this.nearest_of(cluster)?)))
            .collect();
        for (owner, nn) in found {
            self.queue.insert(owner, nn);
        }
        debug!("{} clusters have a mergeable neighbour", self.queue.len());
    }

    fn merge(&mut self, node: MergeNode) {
        let MergeNode { left, right, .. } = node;
        self.queue.remove(left);
        self.queue.remove(right);
        let mut stale = self.queue.take_pointing_at(left);
        stale.extend(self.queue.take_pointing_at(right));
        stale.sort_unstable();
        stale.dedup();

        let left_cluster = self.clusters[left]
            .take()
            .unwrap_or_else(|| panic!("cluster {} is not open", left));
        let right_cluster = self.clusters[right]
            .take()
            .unwrap_or_else(|| panic!("cluster {} is not open", right));
        for member in right_cluster.members() {
            self.owner[*member] = left;
        }
        let merged = ClusterRecord::merge(left_cluster, right_cluster);
        if self.config.linkage == Linkage::Centroid {
            self.grid.erase(right);
            self.grid.place(left, merged.centroid());
        }
        self.clusters[left] = Some(merged);
        self.num_open -= 1;
        self.tree.push(node);

        // The merged cluster may now be the nearest neighbour of any
        // cluster around it.
        let merged = self.open(left);
        let mut best: Option<NearestNeighbour> = None;
        let mut improved: Vec<(PointId, NearestNeighbour)> = Vec::new();
        for name in self.candidates(merged) {
            let other = self.open(name);
            let Some(distance) = self.evaluator.merge_distance(merged, other) else {
                continue;
            };
            let towards_other = NearestNeighbour {
                distance,
                neighbour: name,
            };
            if best.is_none_or(|b| towards_other.is_closer_than(&b)) {
                best = Some(towards_other);
            }
            if stale.binary_search(&name).is_ok() {
                continue;
            }
            let towards_merged = NearestNeighbour {
                distance,
                neighbour: left,
            };
            let is_better = match self.queue.get(name) {
                Some(current) => towards_merged.is_closer_than(current),
                None => true,
            };
            if is_better {
                improved.push((name, towards_merged));
            }
        }
        for (name, nn) in improved {
            self.queue.insert(name, nn);
        }
        if let Some(nn) = best {
            self.queue.insert(left, nn);
        }

        for name in stale {
            if name == left || name == right {
                continue;
            }
            let refreshed = self.nearest_of(self.open(name));
            match refreshed {
                Some(nn) => self.queue.insert(name, nn),
                None => {
                    self.queue.remove(name);
                }
            }
        }
        debug_assert!(self.verify_partition());
    }
}

/// Output of a finished clustering run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ClusteringResult {
    pub tree: MergeTree,
    /// Clusters left open when the engine terminated.
    pub clusters: ClusterSet,
}

impl ClusteringResult {
    pub fn partition(&self) -> Partition {
        self.clusters.partition()
    }
}

/// Clusters every point of the store and returns the merge tree together
/// with the final clusters.
///
/// Example:
/// ```
/// use gridclust::{cluster_points, ClusteringConfig, PointStore};
///
/// let mut store = PointStore::new(2).unwrap();
/// for p in [[0.0, 0.0], [0.1, 0.0], [5.0, 5.0]] {
///     store.add(&p).unwrap();
/// }
/// let config = ClusteringConfig::new(vec![1.0, 1.0]).with_threshold(1.0);
/// let result = cluster_points(&store, config).unwrap();
/// assert_eq!(result.tree.len(), 1);
/// assert_eq!(result.clusters.len(), 2);
/// ```
#[instrument(skip_all)]
pub fn cluster_points(store: &PointStore, config: ClusteringConfig) -> Result<ClusteringResult> {
    let mut engine = HierarchicalClusterer::new(store, config)?;
    engine.run();
    Ok(engine.into_result())
}
