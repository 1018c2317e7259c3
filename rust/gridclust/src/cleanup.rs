//! Passes run over the final clusters after the merge loop.
//!
//! Both passes work on the extent of the clusters along one designated
//! axis (usually retention time). Small-cluster removal runs first so noise
//! clusters can never bridge a gap during joining. Neither pass can fail,
//! an axis that does not exist only disables them.

use serde::{
    Deserialize,
    Serialize,
};
use std::fmt::Display;
use tracing::{
    info,
    instrument,
    warn,
};

use crate::errors::{
    ConfigurationError,
    Result,
};
use crate::models::{
    ClusterSet,
    FlatCluster,
};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CleanupConfig {
    /// Axis along which spans and gaps are measured.
    #[serde(default)]
    pub axis: usize,
    /// Drop clusters spanning less than this along `axis`.
    #[serde(default)]
    pub min_span: Option<f64>,
    /// Join clusters separated by less than this along `axis`.
    #[serde(default)]
    pub max_gap: Option<f64>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CleanupSummary {
    pub num_removed: usize,
    pub num_joined: usize,
}

impl Display for CleanupSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "removed {} small clusters, joined {} clusters across gaps",
            self.num_removed, self.num_joined
        )
    }
}

impl CleanupConfig {
    pub fn validate(&self, dimension: usize) -> Result<()> {
        if self.axis >= dimension {
            return Err(ConfigurationError::AxisOutOfRange {
                axis: self.axis,
                dimension,
            }
            .into());
        }
        Ok(())
    }

    /// Runs small-cluster removal and then gap joining, each only when
    /// its parameter is set.
    #[instrument(skip_all)]
    pub fn apply(&self, clusters: ClusterSet) -> (ClusterSet, CleanupSummary) {
        let mut summary = CleanupSummary::default();
        let mut clusters = clusters;
        if let Some(min_span) = self.min_span {
            let (kept, removed) = remove_small_clusters(clusters, self.axis, min_span);
            clusters = kept;
            summary.num_removed = removed;
        }
        if let Some(max_gap) = self.max_gap {
            let (joined, num_joined) = join_gaps(clusters, self.axis, max_gap);
            clusters = joined;
            summary.num_joined = num_joined;
        }
        info!("Cleanup {}, {} clusters left", summary, clusters.len());
        (clusters, summary)
    }
}

fn axis_exists(clusters: &ClusterSet, axis: usize) -> bool {
    match clusters.iter().next() {
        Some(first) if axis >= first.bounds.dimension() => {
            warn!(
                "Cleanup axis {} does not exist in {} dimensional data, skipping",
                axis,
                first.bounds.dimension()
            );
            false
        }
        _ => true,
    }
}

/// Drops every cluster whose span along `axis` is below `min_span`.
/// Returns the kept clusters and the number of dropped ones.
pub fn remove_small_clusters(clusters: ClusterSet, axis: usize, min_span: f64) -> (ClusterSet, usize) {
    if !axis_exists(&clusters, axis) {
        return (clusters, 0);
    }
    let before = clusters.len();
    let kept: Vec<FlatCluster> = clusters
        .into_vec()
        .into_iter()
        .filter(|c| c.bounds.span(axis) >= min_span)
        .collect();
    let removed = before - kept.len();
    (ClusterSet::new(kept), removed)
}

/// Joins clusters separated along `axis` by less than `max_gap`.
///
/// Clusters are visited in ascending order of where they start along
/// `axis`. Each one is absorbed by the already visited cluster with the
/// smallest gap (lowest id on ties), provided their bounding boxes overlap
/// on every other axis; otherwise it is kept as is. Clusters whose spans
/// touch or overlap along `axis` have a gap of 0 and are joined as well.
/// Returns the resulting clusters and the number of absorbed ones.
pub fn join_gaps(clusters: ClusterSet, axis: usize, max_gap: f64) -> (ClusterSet, usize) {
    if !axis_exists(&clusters, axis) {
        return (clusters, 0);
    }
    let mut pending = clusters.into_vec();
    pending.sort_by(|a, b| {
        a.bounds.min()[axis]
            .total_cmp(&b.bounds.min()[axis])
            .then(a.id.cmp(&b.id))
    });

    let mut joined = 0;
    let mut out: Vec<FlatCluster> = Vec::with_capacity(pending.len());
    for cluster in pending {
        let mut target: Option<(f64, usize)> = None;
        for (idx, candidate) in out.iter().enumerate() {
            let gap = candidate.bounds.gap_along(&cluster.bounds, axis);
            if !(gap < max_gap) || !candidate.bounds.overlaps_except(&cluster.bounds, axis) {
                continue;
            }
            let better = match target {
                None => true,
                Some((best_gap, best_idx)) => {
                    gap < best_gap || (gap == best_gap && candidate.id < out[best_idx].id)
                }
            };
            if better {
                target = Some((gap, idx));
            }
        }
        match target {
            Some((_, idx)) => {
                out[idx].absorb(cluster);
                joined += 1;
            }
            None => out.push(cluster),
        }
    }
    (ClusterSet::new(out), joined)
}
