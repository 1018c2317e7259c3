//! Append-only log of merge events and the operations that turn it back
//! into flat clusters.
//!
//! Every node names its two parents by their cluster names (the smallest
//! member id of each parent), `left < right`, and the merged cluster keeps
//! the name `left`. Because of that a node never needs to reference an
//! earlier node explicitly; [`MergeTree::to_linkage_matrix`] translates the
//! log into the conventional "leaves `0..N`, merge nodes `N..`" layout.

use serde::{
    Deserialize,
    Serialize,
};
use std::collections::{
    BTreeMap,
    HashMap,
};

use super::PointId;
use super::partition::Partition;
use crate::errors::{
    GridClusterError,
    Result,
};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MergeNode {
    pub left: PointId,
    pub right: PointId,
    pub distance: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "MergeTreeParts")]
pub struct MergeTree {
    leaves: Vec<PointId>,
    nodes: Vec<MergeNode>,
}

// Deserialized trees go through the same checks as `MergeTree::from_parts`.
#[derive(Deserialize)]
struct MergeTreeParts {
    leaves: Vec<PointId>,
    nodes: Vec<MergeNode>,
}

impl TryFrom<MergeTreeParts> for MergeTree {
    type Error = GridClusterError;

    fn try_from(value: MergeTreeParts) -> Result<Self> {
        MergeTree::from_parts(value.leaves, value.nodes)
    }
}

/// How to flatten a [`MergeTree`] into a [`Partition`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum CutConfig {
    /// Keep every subtree whose root merged at or below `threshold`.
    Distance { threshold: f64 },
    /// Replay merges until `clusters` clusters remain.
    Count { clusters: usize },
}

impl CutConfig {
    pub fn apply(&self, tree: &MergeTree) -> Result<Partition> {
        match self {
            CutConfig::Distance { threshold } => Ok(tree.cut_at_distance(*threshold)),
            CutConfig::Count { clusters } => tree.cut_into(*clusters),
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum TreeRef {
    Leaf(PointId),
    Node(usize),
}

impl MergeTree {
    /// Empty tree over the given leaves (one per clustered point).
    pub fn new(mut leaves: Vec<PointId>) -> Self {
        leaves.sort_unstable();
        leaves.dedup();
        Self {
            leaves,
            nodes: Vec::new(),
        }
    }

    /// Rebuilds a tree from a stored merge log, checking that every node
    /// merges two clusters that are open at that point.
    pub fn from_parts(leaves: Vec<PointId>, nodes: Vec<MergeNode>) -> Result<Self> {
        let mut tree = Self::new(leaves);
        let mut open: HashMap<PointId, bool> = tree.leaves.iter().map(|x| (*x, true)).collect();
        for node in nodes {
            let left = node.left.min(node.right);
            let right = node.left.max(node.right);
            for id in [left, right] {
                if !open.get(&id).copied().unwrap_or(false) || left == right {
                    return Err(GridClusterError::NotFound(id));
                }
            }
            open.insert(right, false);
            tree.nodes.push(MergeNode {
                left,
                right,
                distance: node.distance,
            });
        }
        Ok(tree)
    }

    pub(crate) fn push(&mut self, node: MergeNode) {
        debug_assert!(node.left < node.right);
        self.nodes.push(node);
    }

    pub fn nodes(&self) -> &[MergeNode] {
        &self.nodes
    }

    pub fn leaves(&self) -> &[PointId] {
        &self.leaves
    }

    /// Number of merge nodes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Number of clusters left after every recorded merge.
    pub fn num_roots(&self) -> usize {
        self.leaves.len() - self.nodes.len()
    }

    /// Whether merge distances never decrease in emission order.
    pub fn is_monotonic(&self) -> bool {
        self.nodes
            .windows(2)
            .all(|w| w[0].distance <= w[1].distance)
    }

    /// Partition after replaying every merge.
    pub fn final_partition(&self) -> Partition {
        self.replay(self.nodes.len())
    }

    /// Flattens the tree top-down: a subtree stays whole when its root
    /// merged at a distance `<= threshold`, otherwise both children are
    /// visited. Pure, the tree is not modified.
    pub fn cut_at_distance(&self, threshold: f64) -> Partition {
        let (children, roots) = self.structure();
        let mut assignment = Vec::with_capacity(self.leaves.len());
        let mut stack: Vec<TreeRef> = roots;
        while let Some(current) = stack.pop() {
            match current {
                TreeRef::Leaf(id) => assignment.push((id, id)),
                TreeRef::Node(idx) => {
                    let node = &self.nodes[idx];
                    if node.distance <= threshold {
                        self.collect_leaves(&children, current, node.left, &mut assignment);
                    } else {
                        let (l, r) = children[idx];
                        stack.push(l);
                        stack.push(r);
                    }
                }
            }
        }
        Partition::from_assignment(assignment)
    }

    /// Flattens the tree into exactly `clusters` clusters by replaying the
    /// first `N - clusters` merges.
    pub fn cut_into(&self, clusters: usize) -> Result<Partition> {
        let n = self.leaves.len();
        let min_clusters = self.num_roots();
        let invalid = (clusters == 0 && n > 0) || clusters < min_clusters || clusters > n;
        if invalid {
            return Err(GridClusterError::InvalidCut {
                requested: clusters,
                min_clusters,
                max_clusters: n,
            });
        }
        Ok(self.replay(n - clusters))
    }

    /// Newick representation. Leaves are labelled with their point id;
    /// several roots are joined under an unlabelled synthetic root.
    pub fn to_newick(&self, include_distance: bool) -> String {
        let (children, roots) = self.structure();
        let mut rendered: Vec<Option<String>> = vec![None; self.nodes.len()];
        for (idx, node) in self.nodes.iter().enumerate() {
            let (l, r) = children[idx];
            let l = take_rendered(&mut rendered, l);
            let r = take_rendered(&mut rendered, r);
            let s = if include_distance {
                format!("({}:{},{}:{})", l, node.distance, r, node.distance)
            } else {
                format!("({},{})", l, r)
            };
            rendered[idx] = Some(s);
        }

        let mut roots: Vec<String> = roots
            .into_iter()
            .map(|x| take_rendered(&mut rendered, x))
            .collect();
        match roots.len() {
            0 => ";".to_string(),
            1 => format!("{};", roots.remove(0)),
            _ => format!("({});", roots.join(",")),
        }
    }

    /// Rows `[left, right, distance, size]` where leaves are numbered by
    /// their position in [`MergeTree::leaves`] and the cluster produced by
    /// the i-th merge is numbered `N + i`.
    pub fn to_linkage_matrix(&self) -> Vec<[f64; 4]> {
        let n = self.leaves.len();
        let (children, _) = self.structure();
        let position: HashMap<PointId, usize> =
            self.leaves.iter().enumerate().map(|(i, x)| (*x, i)).collect();
        let mut sizes: Vec<usize> = Vec::with_capacity(self.nodes.len());
        let index_of = |x: TreeRef| match x {
            TreeRef::Leaf(id) => position[&id],
            TreeRef::Node(idx) => n + idx,
        };

        let mut out = Vec::with_capacity(self.nodes.len());
        for (idx, node) in self.nodes.iter().enumerate() {
            let (l, r) = children[idx];
            let size_of = |x: TreeRef| match x {
                TreeRef::Leaf(_) => 1,
                TreeRef::Node(i) => sizes[i],
            };
            let size = size_of(l) + size_of(r);
            out.push([
                index_of(l) as f64,
                index_of(r) as f64,
                node.distance,
                size as f64,
            ]);
            sizes.push(size);
        }
        out
    }

    // For every node, the subtrees it joined; plus the subtrees that are
    // never merged again, ordered by cluster name.
    fn structure(&self) -> (Vec<(TreeRef, TreeRef)>, Vec<TreeRef>) {
        let mut latest: BTreeMap<PointId, TreeRef> =
            self.leaves.iter().map(|x| (*x, TreeRef::Leaf(*x))).collect();
        let mut children = Vec::with_capacity(self.nodes.len());
        for (idx, node) in self.nodes.iter().enumerate() {
            let l = latest
                .remove(&node.left)
                .unwrap_or_else(|| panic!("merge of closed cluster {}", node.left));
            let r = latest
                .remove(&node.right)
                .unwrap_or_else(|| panic!("merge of closed cluster {}", node.right));
            children.push((l, r));
            latest.insert(node.left, TreeRef::Node(idx));
        }
        (children, latest.into_values().collect())
    }

    fn collect_leaves(
        &self,
        children: &[(TreeRef, TreeRef)],
        start: TreeRef,
        label: PointId,
        out: &mut Vec<(PointId, PointId)>,
    ) {
        let mut stack = vec![start];
        while let Some(current) = stack.pop() {
            match current {
                TreeRef::Leaf(id) => out.push((id, label)),
                TreeRef::Node(idx) => {
                    let (l, r) = children[idx];
                    stack.push(l);
                    stack.push(r);
                }
            }
        }
    }

    fn replay(&self, num_merges: usize) -> Partition {
        let mut owner: HashMap<PointId, PointId> = self.leaves.iter().map(|x| (*x, *x)).collect();
        let mut members: HashMap<PointId, Vec<PointId>> =
            self.leaves.iter().map(|x| (*x, vec![*x])).collect();
        for node in self.nodes.iter().take(num_merges) {
            let moved = members.remove(&node.right).unwrap_or_default();
            for point in moved.iter() {
                owner.insert(*point, node.left);
            }
            members.entry(node.left).or_default().extend(moved);
        }
        Partition::from_assignment(owner)
    }
}

fn take_rendered(rendered: &mut [Option<String>], x: TreeRef) -> String {
    match x {
        TreeRef::Leaf(id) => id.to_string(),
        TreeRef::Node(idx) => rendered[idx].take().unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(left: PointId, right: PointId, distance: f64) -> MergeNode {
        MergeNode {
            left,
            right,
            distance,
        }
    }

    // Single linkage tree over six points.
    fn sample_tree() -> MergeTree {
        MergeTree::from_parts(
            (0..6).collect(),
            vec![
                node(1, 2, 0.3),
                node(3, 4, 0.4),
                node(0, 1, 0.5),
                node(0, 3, 0.6),
                node(0, 5, 0.7),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_cut_at_distance() {
        let tree = sample_tree();
        let part = tree.cut_at_distance(0.45);
        assert_eq!(part.num_clusters(), 4);
        assert_eq!(part.cluster_of(2), Some(1));
        assert_eq!(part.cluster_of(4), Some(3));
        assert_eq!(part.cluster_of(0), Some(0));

        assert_eq!(tree.cut_at_distance(10.0).num_clusters(), 1);
        assert_eq!(tree.cut_at_distance(0.0).num_clusters(), 6);
        // Cutting is pure
        assert_eq!(tree.cut_at_distance(0.45), part);
    }

    #[test]
    fn test_cut_into() {
        let tree = sample_tree();
        let part = tree.cut_into(3).unwrap();
        let clusters = part.clusters();
        assert_eq!(clusters[&0], vec![0, 1, 2]);
        assert_eq!(clusters[&3], vec![3, 4]);
        assert_eq!(clusters[&5], vec![5]);

        assert_eq!(tree.cut_into(6).unwrap().num_clusters(), 6);
        assert_eq!(tree.cut_into(1).unwrap(), tree.final_partition());
        assert!(matches!(
            tree.cut_into(0),
            Err(GridClusterError::InvalidCut { .. })
        ));
        assert!(tree.cut_into(7).is_err());
    }

    #[test]
    fn test_cut_into_forest() {
        let tree = MergeTree::from_parts((0..4).collect(), vec![node(0, 1, 1.0)]).unwrap();
        assert_eq!(tree.num_roots(), 3);
        assert_eq!(
            tree.cut_into(2),
            Err(GridClusterError::InvalidCut {
                requested: 2,
                min_clusters: 3,
                max_clusters: 4
            })
        );
        assert_eq!(MergeTree::default().cut_into(0).unwrap().len(), 0);
    }

    #[test]
    fn test_newick() {
        let tree = sample_tree();
        assert_eq!(tree.to_newick(false), "(((0,(1,2)),(3,4)),5);");
        assert_eq!(
            tree.to_newick(true),
            "(((0:0.5,(1:0.3,2:0.3):0.5):0.6,(3:0.4,4:0.4):0.6):0.7,5:0.7);"
        );

        let forest = MergeTree::from_parts(vec![0, 1, 2], vec![node(0, 2, 1.5)]).unwrap();
        assert_eq!(forest.to_newick(false), "((0,2),1);");
        assert_eq!(MergeTree::new(vec![0]).to_newick(true), "0;");
        assert_eq!(MergeTree::default().to_newick(true), ";");
    }

    #[test]
    fn test_linkage_matrix() {
        let tree = sample_tree();
        let matrix = tree.to_linkage_matrix();
        assert_eq!(matrix.len(), 5);
        assert_eq!(matrix[0], [1.0, 2.0, 0.3, 2.0]);
        assert_eq!(matrix[1], [3.0, 4.0, 0.4, 2.0]);
        assert_eq!(matrix[2], [0.0, 6.0, 0.5, 3.0]);
        assert_eq!(matrix[3], [8.0, 7.0, 0.6, 5.0]);
        assert_eq!(matrix[4], [9.0, 5.0, 0.7, 6.0]);
    }

    #[test]
    fn test_from_parts_rejects_closed_clusters() {
        let res = MergeTree::from_parts(vec![0, 1, 2], vec![node(0, 1, 1.0), node(1, 2, 2.0)]);
        assert_eq!(res, Err(GridClusterError::NotFound(1)));
        let res = MergeTree::from_parts(vec![0, 1], vec![node(0, 5, 1.0)]);
        assert_eq!(res, Err(GridClusterError::NotFound(5)));
        let res = MergeTree::from_parts(vec![0, 1], vec![node(1, 1, 1.0)]);
        assert_eq!(res, Err(GridClusterError::NotFound(1)));
    }

    #[test]
    fn test_monotonic() {
        assert!(sample_tree().is_monotonic());
        let tree = MergeTree::from_parts(vec![0, 1, 2], vec![node(0, 1, 1.0), node(0, 2, 0.5)])
            .unwrap();
        assert!(!tree.is_monotonic());
    }

    #[test]
    fn test_deserialize_checks_log() {
        let tree = sample_tree();
        let json = serde_json::to_string(&tree).unwrap();
        let back: MergeTree = serde_json::from_str(&json).unwrap();
        assert_eq!(back, tree);

        let bad = r#"{"leaves":[0,1],"nodes":[{"left":0,"right":3,"distance":1.0}]}"#;
        assert!(serde_json::from_str::<MergeTree>(bad).is_err());
    }
}
