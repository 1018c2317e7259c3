//! Sparse hash grid over K-dimensional space.
//!
//! Every entry lives in exactly one cell, the cell index being the
//! per-axis `floor(coordinate / cell_dimension)`. Cells are created on the
//! first insertion and dropped once their last occupant leaves. The range
//! of occupied cell indices is tracked per axis so unbounded queries never
//! need to walk empty space.

mod walker;

use nohash_hasher::BuildNoHashHasher;
use std::collections::{
    BTreeMap,
    HashMap,
};
use tinyvec::TinyVec;

use crate::errors::{
    ConfigurationError,
    Result,
};
use crate::models::point_store::validate_coordinates;
pub use walker::Neighbors;
use walker::CellWalker;

/// Integer index of a grid cell, one component per axis.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CellKey(TinyVec<[i64; 4]>);

impl CellKey {
    pub fn as_slice(&self) -> &[i64] {
        self.0.as_slice()
    }
}

/// How many cells away from the query cell a search reaches on one axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchRadius {
    Cells(i64),
    Unbounded,
}

#[derive(Debug, Clone)]
pub struct SpatialGrid {
    cell_dimension: Vec<f64>,
    buckets: HashMap<CellKey, Vec<usize>>,
    locations: HashMap<usize, CellKey, BuildNoHashHasher<usize>>,
    // Per axis: cell index -> number of occupied cells with that index.
    axis_occupancy: Vec<BTreeMap<i64, usize>>,
}

impl SpatialGrid {
    pub fn new(cell_dimension: Vec<f64>) -> Result<Self> {
        if cell_dimension.is_empty() {
            return Err(ConfigurationError::ZeroDimensions.into());
        }
        for (axis, value) in cell_dimension.iter().enumerate() {
            if !(value.is_finite() && *value > 0.0) {
                return Err(ConfigurationError::NonPositiveCellDimension {
                    axis,
                    value: *value,
                }
                .into());
            }
        }
        let dimension = cell_dimension.len();
        Ok(Self {
            cell_dimension,
            buckets: HashMap::new(),
            locations: HashMap::with_hasher(Default::default()),
            axis_occupancy: vec![BTreeMap::new(); dimension],
        })
    }

    pub fn dimension(&self) -> usize {
        self.cell_dimension.len()
    }

    pub fn cell_dimension(&self) -> &[f64] {
        &self.cell_dimension
    }

    /// Number of entries in the grid.
    pub fn len(&self) -> usize {
        self.locations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locations.is_empty()
    }

    pub fn num_occupied_cells(&self) -> usize {
        self.buckets.len()
    }

    pub fn contains(&self, id: usize) -> bool {
        self.locations.contains_key(&id)
    }

    /// Cell the entry `id` currently lives in.
    pub fn location(&self, id: usize) -> Option<&CellKey> {
        self.locations.get(&id)
    }

    /// Entries of a single cell (empty if the cell is not occupied).
    pub fn cell_contents(&self, key: &CellKey) -> &[usize] {
        self.buckets.get(key).map(|x| x.as_slice()).unwrap_or(&[])
    }

    pub fn cell_of(&self, coordinates: &[f64]) -> CellKey {
        debug_assert_eq!(coordinates.len(), self.dimension());
        CellKey(
            coordinates
                .iter()
                .zip(self.cell_dimension.iter())
                .map(|(c, w)| (c / w).floor() as i64)
                .collect(),
        )
    }

    /// Inserts `id` at the given position, moving it if it was already present.
    pub fn insert(&mut self, id: usize, coordinates: &[f64]) -> Result<()> {
        validate_coordinates(self.dimension(), coordinates)?;
        self.place(id, coordinates);
        Ok(())
    }

    /// Same as [`SpatialGrid::insert`] for coordinates already known to be valid.
    pub(crate) fn place(&mut self, id: usize, coordinates: &[f64]) {
        let key = self.cell_of(coordinates);
        if let Some(current) = self.locations.get(&id) {
            if *current == key {
                return;
            }
            self.erase(id);
        }

        match self.buckets.get_mut(&key) {
            Some(bucket) => bucket.push(id),
            None => {
                for (axis, idx) in key.as_slice().iter().enumerate() {
                    *self.axis_occupancy[axis].entry(*idx).or_insert(0) += 1;
                }
                self.buckets.insert(key.clone(), vec![id]);
            }
        }
        self.locations.insert(id, key);
    }

    /// Removes `id` from its cell. Returns false (and does nothing) if the
    /// id is not in the grid.
    pub fn erase(&mut self, id: usize) -> bool {
        let Some(key) = self.locations.remove(&id) else {
            return false;
        };
        let now_empty = match self.buckets.get_mut(&key) {
            Some(bucket) => {
                if let Some(pos) = bucket.iter().position(|x| *x == id) {
                    bucket.swap_remove(pos);
                }
                bucket.is_empty()
            }
            None => false,
        };
        if now_empty {
            self.buckets.remove(&key);
            for (axis, idx) in key.as_slice().iter().enumerate() {
                let occ = &mut self.axis_occupancy[axis];
                if let Some(count) = occ.get_mut(idx) {
                    *count -= 1;
                    if *count == 0 {
                        occ.remove(idx);
                    }
                }
            }
        }
        true
    }

    /// Drops every entry, leaving an empty grid with the same geometry.
    pub fn clear(&mut self) {
        self.buckets.clear();
        self.locations.clear();
        self.axis_occupancy.iter_mut().for_each(|x| x.clear());
    }

    /// Inclusive (min, max) occupied cell index per axis, None when empty.
    pub fn occupied_range(&self) -> Option<Vec<(i64, i64)>> {
        self.axis_occupancy
            .iter()
            .map(|occ| {
                let lo = occ.first_key_value()?.0;
                let hi = occ.last_key_value()?.0;
                Some((*lo, *hi))
            })
            .collect()
    }

    /// Entries in the cell containing `coordinates` and all directly
    /// adjacent cells (the 3^K block).
    pub fn neighbors_of(&self, coordinates: &[f64]) -> Neighbors<'_> {
        let radius = vec![SearchRadius::Cells(1); self.dimension()];
        self.neighbors_within(coordinates, &radius)
    }

    /// Entries of every cell at most `radius[d]` cells away from the cell
    /// containing `coordinates` along each axis `d`.
    ///
    /// The sequence is produced lazily, each entry exactly once.
    pub fn neighbors_within(&self, coordinates: &[f64], radius: &[SearchRadius]) -> Neighbors<'_> {
        self.neighbors_around(coordinates, coordinates, radius)
    }

    /// Same as [`SpatialGrid::neighbors_within`] for every cell overlapping
    /// the box `[min, max]`: the cell range spanned by the box is widened
    /// by `radius[d]` cells on both sides.
    pub fn neighbors_around(
        &self,
        min: &[f64],
        max: &[f64],
        radius: &[SearchRadius],
    ) -> Neighbors<'_> {
        debug_assert_eq!(radius.len(), self.dimension());
        let Some(occupied) = self.occupied_range() else {
            return Neighbors::empty(self);
        };
        let min_cell = self.cell_of(min);
        let max_cell = self.cell_of(max);
        let mut lo = TinyVec::<[i64; 4]>::new();
        let mut hi = TinyVec::<[i64; 4]>::new();
        for (((c_lo, c_hi), r), (occ_lo, occ_hi)) in min_cell
            .as_slice()
            .iter()
            .zip(max_cell.as_slice().iter())
            .zip(radius.iter())
            .zip(occupied.into_iter())
        {
            let (l, h) = match r {
                SearchRadius::Cells(r) => (c_lo.saturating_sub(*r), c_hi.saturating_add(*r)),
                SearchRadius::Unbounded => (occ_lo, occ_hi),
            };
            lo.push(l.max(occ_lo));
            hi.push(h.min(occ_hi));
        }
        Neighbors::new(self, CellWalker::new(self, lo, hi))
    }

    /// All entries of the occupied cells overlapping the closed box
    /// `[min, max]`.
    pub fn query_region(&self, min: &[f64], max: &[f64]) -> Result<Vec<usize>> {
        validate_coordinates(self.dimension(), min)?;
        validate_coordinates(self.dimension(), max)?;
        // Inverted boxes contain nothing
        if min.iter().zip(max.iter()).any(|(a, b)| a > b) {
            return Ok(Vec::new());
        }
        let Some(occupied) = self.occupied_range() else {
            return Ok(Vec::new());
        };
        let lo_cell = self.cell_of(min);
        let hi_cell = self.cell_of(max);
        let lo: TinyVec<[i64; 4]> = lo_cell
            .as_slice()
            .iter()
            .zip(occupied.iter())
            .map(|(c, (occ_lo, _))| (*c).max(*occ_lo))
            .collect();
        let hi: TinyVec<[i64; 4]> = hi_cell
            .as_slice()
            .iter()
            .zip(occupied.iter())
            .map(|(c, (_, occ_hi))| (*c).min(*occ_hi))
            .collect();
        Ok(Neighbors::new(self, CellWalker::new(self, lo, hi)).collect())
    }

    pub(crate) fn buckets(&self) -> &HashMap<CellKey, Vec<usize>> {
        &self.buckets
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sorted(mut x: Vec<usize>) -> Vec<usize> {
        x.sort_unstable();
        x
    }

    #[test]
    fn test_cell_of_uses_floor() {
        let grid = SpatialGrid::new(vec![1.0, 0.5]).unwrap();
        assert_eq!(grid.cell_of(&[0.5, 0.75]).as_slice(), &[0, 1]);
        assert_eq!(grid.cell_of(&[-0.5, -0.1]).as_slice(), &[-1, -1]);
    }

    #[test]
    fn test_rejects_bad_cell_dimension() {
        assert!(SpatialGrid::new(vec![]).is_err());
        assert!(SpatialGrid::new(vec![1.0, 0.0]).is_err());
        assert!(SpatialGrid::new(vec![1.0, -1.0]).is_err());
        assert!(SpatialGrid::new(vec![f64::INFINITY]).is_err());
    }

    #[test]
    fn test_neighbors_block() {
        let mut grid = SpatialGrid::new(vec![1.0, 1.0]).unwrap();
        grid.insert(0, &[0.5, 0.5]).unwrap();
        grid.insert(1, &[1.5, 1.5]).unwrap();
        grid.insert(2, &[-0.5, 1.5]).unwrap();
        grid.insert(3, &[2.5, 0.5]).unwrap();
        grid.insert(4, &[0.6, 0.6]).unwrap();

        let found = sorted(grid.neighbors_of(&[0.1, 0.1]).collect());
        assert_eq!(found, vec![0, 1, 2, 4]);

        let found = sorted(grid.neighbors_of(&[2.9, 0.9]).collect());
        assert_eq!(found, vec![1, 3]);

        let radius = [SearchRadius::Cells(2), SearchRadius::Cells(0)];
        let found = sorted(grid.neighbors_within(&[0.5, 0.5], &radius).collect());
        assert_eq!(found, vec![0, 3, 4]);

        let radius = [SearchRadius::Unbounded, SearchRadius::Unbounded];
        let found = sorted(grid.neighbors_within(&[100.0, 100.0], &radius).collect());
        assert_eq!(found, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_neighbors_around_box() {
        let mut grid = SpatialGrid::new(vec![1.0]).unwrap();
        for i in 0..10 {
            grid.insert(i, &[i as f64 + 0.5]).unwrap();
        }
        let radius = [SearchRadius::Cells(1)];
        let found = sorted(grid.neighbors_around(&[3.2], &[5.9], &radius).collect());
        assert_eq!(found, vec![2, 3, 4, 5, 6]);
    }

    #[test]
    fn test_erase_and_occupied_range() {
        let mut grid = SpatialGrid::new(vec![1.0]).unwrap();
        grid.insert(0, &[-3.5]).unwrap();
        grid.insert(1, &[0.5]).unwrap();
        grid.insert(2, &[7.5]).unwrap();
        assert_eq!(grid.occupied_range(), Some(vec![(-4, 7)]));

        assert!(grid.erase(2));
        assert!(!grid.erase(2));
        assert!(!grid.erase(99));
        assert_eq!(grid.occupied_range(), Some(vec![(-4, 0)]));
        assert_eq!(grid.num_occupied_cells(), 2);

        grid.clear();
        assert!(grid.is_empty());
        assert_eq!(grid.occupied_range(), None);
        assert_eq!(grid.neighbors_of(&[0.0]).count(), 0);
    }

    #[test]
    fn test_reinsert_moves_entry() {
        let mut grid = SpatialGrid::new(vec![1.0, 1.0]).unwrap();
        grid.insert(7, &[0.5, 0.5]).unwrap();
        grid.insert(7, &[5.5, 5.5]).unwrap();
        assert_eq!(grid.len(), 1);
        assert_eq!(grid.num_occupied_cells(), 1);
        let key = grid.location(7).unwrap().clone();
        assert_eq!(key.as_slice(), &[5, 5]);
        assert_eq!(grid.cell_contents(&key), &[7]);
        assert!(grid.cell_contents(&grid.cell_of(&[0.5, 0.5])).is_empty());
        assert_eq!(grid.neighbors_of(&[0.5, 0.5]).count(), 0);
    }

    #[test]
    fn test_query_region() {
        let mut grid = SpatialGrid::new(vec![1.0, 1.0]).unwrap();
        for (i, x) in [0.5, 1.5, 2.5, 3.5, 4.5].iter().enumerate() {
            grid.insert(i, &[*x, 0.5]).unwrap();
        }
        let found = sorted(grid.query_region(&[1.2, 0.0], &[3.0, 1.0]).unwrap());
        assert_eq!(found, vec![1, 2]);
        assert!(grid.query_region(&[3.0, 0.0], &[1.0, 1.0]).unwrap().is_empty());
        assert!(grid.query_region(&[1.0], &[2.0]).is_err());
    }

    #[test]
    fn test_insert_rejects_nan() {
        let mut grid = SpatialGrid::new(vec![1.0, 1.0]).unwrap();
        assert!(grid.insert(0, &[f64::NAN, 0.0]).is_err());
        assert!(grid.is_empty());
    }
}
