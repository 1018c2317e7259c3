use nohash_hasher::BuildNoHashHasher;
use std::cmp::Ordering;
use std::collections::{
    BTreeSet,
    HashMap,
    HashSet,
};

use crate::models::PointId;

type IdMap<V> = HashMap<PointId, V, BuildNoHashHasher<PointId>>;
type IdSet = HashSet<PointId, BuildNoHashHasher<PointId>>;

/// Closest mergeable cluster of some open cluster.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct NearestNeighbour {
    pub distance: f64,
    pub neighbour: PointId,
}

impl NearestNeighbour {
    /// Candidate order for a fixed cluster: by distance, then by the
    /// neighbour name. For a fixed cluster this is the same order as the
    /// global `(distance, lower name, higher name)` merge order.
    pub(crate) fn is_closer_than(&self, other: &NearestNeighbour) -> bool {
        self.distance
            .total_cmp(&other.distance)
            .then(self.neighbour.cmp(&other.neighbour))
            == Ordering::Less
    }
}

#[derive(Debug, Clone, Copy)]
struct QueueKey {
    distance: f64,
    low: PointId,
    high: PointId,
    owner: PointId,
}

impl QueueKey {
    fn new(owner: PointId, nn: &NearestNeighbour) -> Self {
        Self {
            distance: nn.distance,
            low: owner.min(nn.neighbour),
            high: owner.max(nn.neighbour),
            owner,
        }
    }
}

impl Ord for QueueKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.distance
            .total_cmp(&other.distance)
            .then(self.low.cmp(&other.low))
            .then(self.high.cmp(&other.high))
            .then(self.owner.cmp(&other.owner))
    }
}

impl PartialOrd for QueueKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for QueueKey {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for QueueKey {}

/// Cached nearest neighbour of every open cluster, ordered so the next
/// merge is always the first entry.
///
/// A reverse index (neighbour -> clusters caching it) makes it cheap to
/// find the entries invalidated by a merge.
#[derive(Debug, Default)]
pub(crate) struct NearestNeighbourQueue {
    ordered: BTreeSet<QueueKey>,
    by_cluster: IdMap<NearestNeighbour>,
    pointed_by: IdMap<IdSet>,
}

impl NearestNeighbourQueue {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn len(&self) -> usize {
        self.by_cluster.len()
    }

    /// Sets the nearest neighbour of `owner`, replacing any previous entry.
    pub(crate) fn insert(&mut self, owner: PointId, nn: NearestNeighbour) {
        debug_assert_ne!(owner, nn.neighbour);
        self.remove(owner);
        self.ordered.insert(QueueKey::new(owner, &nn));
        self.pointed_by.entry(nn.neighbour).or_default().insert(owner);
        self.by_cluster.insert(owner, nn);
    }

    pub(crate) fn remove(&mut self, owner: PointId) -> Option<NearestNeighbour> {
        let nn = self.by_cluster.remove(&owner)?;
        self.ordered.remove(&QueueKey::new(owner, &nn));
        if let Some(owners) = self.pointed_by.get_mut(&nn.neighbour) {
            owners.remove(&owner);
            if owners.is_empty() {
                self.pointed_by.remove(&nn.neighbour);
            }
        }
        Some(nn)
    }

    pub(crate) fn get(&self, owner: PointId) -> Option<&NearestNeighbour> {
        self.by_cluster.get(&owner)
    }

    /// Globally closest pair as `(owner, neighbour)`.
    pub(crate) fn peek_min(&self) -> Option<(PointId, NearestNeighbour)> {
        let key = self.ordered.first()?;
        Some((key.owner, self.by_cluster[&key.owner]))
    }

    /// Drops every entry whose neighbour is `target` and returns the
    /// owners of those entries, sorted.
    pub(crate) fn take_pointing_at(&mut self, target: PointId) -> Vec<PointId> {
        let Some(owners) = self.pointed_by.remove(&target) else {
            return Vec::new();
        };
        let mut owners: Vec<PointId> = owners.into_iter().collect();
        owners.sort_unstable();
        for owner in owners.iter() {
            if let Some(nn) = self.by_cluster.remove(owner) {
                self.ordered.remove(&QueueKey::new(*owner, &nn));
            }
        }
        owners
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nn(distance: f64, neighbour: PointId) -> NearestNeighbour {
        NearestNeighbour {
            distance,
            neighbour,
        }
    }

    #[test]
    fn test_min_follows_tie_break() {
        let mut queue = NearestNeighbourQueue::new();
        queue.insert(5, nn(1.0, 9));
        queue.insert(9, nn(1.0, 5));
        queue.insert(3, nn(1.0, 7));
        queue.insert(7, nn(1.0, 3));
        queue.insert(1, nn(2.0, 0));
        let (owner, best) = queue.peek_min().unwrap();
        assert_eq!((owner.min(best.neighbour), owner.max(best.neighbour)), (3, 7));

        queue.insert(1, nn(0.5, 2));
        assert_eq!(queue.peek_min().unwrap().0, 1);
        assert_eq!(queue.len(), 5);
    }

    #[test]
    fn test_take_pointing_at() {
        let mut queue = NearestNeighbourQueue::new();
        queue.insert(0, nn(1.0, 4));
        queue.insert(1, nn(2.0, 4));
        queue.insert(2, nn(3.0, 0));
        queue.insert(4, nn(1.0, 0));
        assert_eq!(queue.take_pointing_at(4), vec![0, 1]);
        assert_eq!(queue.take_pointing_at(4), Vec::<PointId>::new());
        assert!(queue.get(0).is_none());
        assert_eq!(queue.len(), 2);
        // The remaining entries both point at 0
        assert_eq!(queue.peek_min().unwrap().0, 4);

        queue.remove(4);
        assert_eq!(queue.take_pointing_at(0), vec![2]);
        assert!(queue.peek_min().is_none());
    }

    #[test]
    fn test_reinsert_updates_reverse_index() {
        let mut queue = NearestNeighbourQueue::new();
        queue.insert(0, nn(1.0, 1));
        queue.insert(0, nn(0.5, 2));
        assert!(queue.take_pointing_at(1).is_empty());
        assert_eq!(queue.take_pointing_at(2), vec![0]);
    }

    #[test]
    fn test_is_closer_than() {
        assert!(nn(1.0, 5).is_closer_than(&nn(2.0, 1)));
        assert!(nn(1.0, 1).is_closer_than(&nn(1.0, 5)));
        assert!(!nn(1.0, 5).is_closer_than(&nn(1.0, 5)));
    }
}
