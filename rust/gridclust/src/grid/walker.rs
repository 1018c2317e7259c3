use std::collections::hash_map;
use tinyvec::TinyVec;

use super::{
    CellKey,
    SpatialGrid,
};

type Cells = TinyVec<[i64; 4]>;

/// Visits the occupied cells inside an inclusive box of cell indices.
///
/// Small boxes are walked cell by cell (odometer style), boxes with more
/// cells than there are occupied cells are served by scanning the occupied
/// cells instead.
pub(crate) enum CellWalker<'a> {
    Block { lo: Cells, hi: Cells, cursor: Option<Cells> },
    Scan { lo: Cells, hi: Cells, cells: hash_map::Iter<'a, CellKey, Vec<usize>> },
    Done,
}

impl<'a> CellWalker<'a> {
    pub(crate) fn new(grid: &'a SpatialGrid, lo: Cells, hi: Cells) -> Self {
        if lo.iter().zip(hi.iter()).any(|(l, h)| l > h) {
            return CellWalker::Done;
        }
        let num_cells = lo
            .iter()
            .zip(hi.iter())
            .map(|(l, h)| (*h as i128 - *l as i128 + 1) as f64)
            .product::<f64>();

        if num_cells > grid.num_occupied_cells() as f64 {
            CellWalker::Scan {
                lo,
                hi,
                cells: grid.buckets().iter(),
            }
        } else {
            let cursor = Some(lo.clone());
            CellWalker::Block { lo, hi, cursor }
        }
    }

    fn next_bucket(&mut self, grid: &'a SpatialGrid) -> Option<&'a [usize]> {
        match self {
            CellWalker::Block { lo, hi, cursor } => loop {
                let current = cursor.as_mut()?;
                let key = CellKey(current.clone());
                if !advance(current, lo, hi) {
                    *cursor = None;
                }
                if let Some(bucket) = grid.buckets().get(&key) {
                    return Some(bucket.as_slice());
                }
            },
            CellWalker::Scan { lo, hi, cells } => {
                for (key, bucket) in cells.by_ref() {
                    let inside = key
                        .as_slice()
                        .iter()
                        .zip(lo.iter().zip(hi.iter()))
                        .all(|(k, (l, h))| l <= k && k <= h);
                    if inside {
                        return Some(bucket.as_slice());
                    }
                }
                None
            }
            CellWalker::Done => None,
        }
    }
}

// Moves the cursor to the next cell of the box, last axis fastest.
// Returns false once the whole box has been visited.
fn advance(cursor: &mut Cells, lo: &Cells, hi: &Cells) -> bool {
    for axis in (0..cursor.len()).rev() {
        if cursor[axis] < hi[axis] {
            cursor[axis] += 1;
            return true;
        }
        cursor[axis] = lo[axis];
    }
    false
}

/// Lazy, finite sequence of grid entries returned by the neighbour and
/// region queries.
pub struct Neighbors<'a> {
    grid: &'a SpatialGrid,
    walker: CellWalker<'a>,
    current: std::slice::Iter<'a, usize>,
}

impl<'a> Neighbors<'a> {
    pub(crate) fn new(grid: &'a SpatialGrid, walker: CellWalker<'a>) -> Self {
        Self {
            grid,
            walker,
            current: Default::default(),
        }
    }

    pub(crate) fn empty(grid: &'a SpatialGrid) -> Self {
        Self::new(grid, CellWalker::Done)
    }
}

impl Iterator for Neighbors<'_> {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        loop {
            if let Some(id) = self.current.next() {
                return Some(*id);
            }
            self.current = self.walker.next_bucket(self.grid)?.iter();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_advance_visits_every_cell_once() {
        let lo: Cells = [0i64, -1].iter().copied().collect();
        let hi: Cells = [1i64, 1].iter().copied().collect();
        let mut cursor = lo.clone();
        let mut seen = vec![cursor.to_vec()];
        while advance(&mut cursor, &lo, &hi) {
            seen.push(cursor.to_vec());
        }
        assert_eq!(
            seen,
            vec![
                vec![0, -1],
                vec![0, 0],
                vec![0, 1],
                vec![1, -1],
                vec![1, 0],
                vec![1, 1],
            ]
        );
    }

    #[test]
    fn test_scan_and_block_agree() {
        let mut grid = SpatialGrid::new(vec![1.0, 1.0]).unwrap();
        for i in 0..20 {
            let x = (i % 5) as f64 * 2.0 + 0.5;
            let y = (i / 5) as f64 * 3.0 + 0.5;
            grid.insert(i, &[x, y]).unwrap();
        }
        let lo: Cells = [0i64, 0].iter().copied().collect();
        let hi: Cells = [4i64, 6].iter().copied().collect();

        let mut block = Vec::new();
        let mut walker = CellWalker::Block {
            lo: lo.clone(),
            hi: hi.clone(),
            cursor: Some(lo.clone()),
        };
        while let Some(b) = walker.next_bucket(&grid) {
            block.extend_from_slice(b);
        }

        let mut scan = Vec::new();
        let mut walker = CellWalker::Scan {
            lo,
            hi,
            cells: grid.buckets().iter(),
        };
        while let Some(b) = walker.next_bucket(&grid) {
            scan.extend_from_slice(b);
        }

        block.sort_unstable();
        scan.sort_unstable();
        assert_eq!(block, scan);
        // x in cells {0, 2, 4}, y in cells {0, 3, 6}
        assert_eq!(block.len(), 9);
    }
}
