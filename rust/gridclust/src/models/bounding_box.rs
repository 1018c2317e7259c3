use serde::{
    Deserialize,
    Serialize,
};

/// Axis aligned, closed box spanned by a set of points.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    min: Vec<f64>,
    max: Vec<f64>,
}

impl BoundingBox {
    pub fn from_point(coordinates: &[f64]) -> Self {
        Self {
            min: coordinates.to_vec(),
            max: coordinates.to_vec(),
        }
    }

    pub fn dimension(&self) -> usize {
        self.min.len()
    }

    pub fn min(&self) -> &[f64] {
        &self.min
    }

    pub fn max(&self) -> &[f64] {
        &self.max
    }

    /// Grows the box so it contains the given point.
    pub fn enlarge(&mut self, coordinates: &[f64]) {
        debug_assert_eq!(coordinates.len(), self.dimension());
        for ((lo, hi), v) in self
            .min
            .iter_mut()
            .zip(self.max.iter_mut())
            .zip(coordinates.iter())
        {
            *lo = lo.min(*v);
            *hi = hi.max(*v);
        }
    }

    /// Grows the box so it contains `other`.
    pub fn extend(&mut self, other: &BoundingBox) {
        self.enlarge(&other.min);
        self.enlarge(&other.max);
    }

    pub fn interval(&self, axis: usize) -> (f64, f64) {
        (self.min[axis], self.max[axis])
    }

    pub fn span(&self, axis: usize) -> f64 {
        self.max[axis] - self.min[axis]
    }

    /// Closed-interval overlap along a single axis.
    pub fn overlaps_on(&self, other: &BoundingBox, axis: usize) -> bool {
        self.min[axis] <= other.max[axis] && other.min[axis] <= self.max[axis]
    }

    /// True if the boxes overlap on every axis except `skip_axis`.
    pub fn overlaps_except(&self, other: &BoundingBox, skip_axis: usize) -> bool {
        (0..self.dimension())
            .filter(|axis| *axis != skip_axis)
            .all(|axis| self.overlaps_on(other, axis))
    }

    /// Distance between the two intervals along `axis`, 0 when they overlap.
    pub fn gap_along(&self, other: &BoundingBox, axis: usize) -> f64 {
        let left_gap = other.min[axis] - self.max[axis];
        let right_gap = self.min[axis] - other.max[axis];
        left_gap.max(right_gap).max(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enlarge_and_span() {
        let mut bbox = BoundingBox::from_point(&[1.0, 10.0]);
        bbox.enlarge(&[3.0, 5.0]);
        assert_eq!(bbox.min(), &[1.0, 5.0]);
        assert_eq!(bbox.max(), &[3.0, 10.0]);
        assert_eq!(bbox.span(0), 2.0);
        assert_eq!(bbox.span(1), 5.0);
    }

    #[test]
    fn test_gap_and_overlap() {
        let mut a = BoundingBox::from_point(&[0.0, 100.0]);
        a.enlarge(&[1.0, 101.0]);
        let mut b = BoundingBox::from_point(&[1.5, 100.5]);
        b.enlarge(&[2.0, 100.5]);
        assert_eq!(a.gap_along(&b, 0), 0.5);
        assert_eq!(b.gap_along(&a, 0), 0.5);
        assert!(!a.overlaps_on(&b, 0));
        assert!(a.overlaps_except(&b, 0));
        assert_eq!(a.gap_along(&b, 1), 0.0);
    }
}
