use serde::{
    Deserialize,
    Serialize,
};

use super::PointId;
use crate::errors::{
    ConfigurationError,
    GridClusterError,
    InvalidCoordinateError,
    Result,
};

/// Optional per-point labels that restrict which clusters may merge.
///
/// - `group`: clusters whose groups are both set must share it.
/// - `tag`: if every member of two clusters is tagged, the two tag sets
///   must be disjoint (e.g. one feature per sample in a cluster).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PointProperties {
    #[serde(default)]
    pub group: Option<i64>,
    #[serde(default)]
    pub tag: Option<i64>,
}

/// Owns the coordinates of the points to be clustered.
///
/// Ids are handed out sequentially and are never re-used, so an id stays
/// valid (or becomes permanently unknown after [`PointStore::remove`]) for
/// the lifetime of the store.
#[derive(Debug, Clone)]
pub struct PointStore {
    dimension: usize,
    coordinates: Vec<f64>,
    properties: Vec<PointProperties>,
    alive: Vec<bool>,
    num_alive: usize,
}

impl PointStore {
    pub fn new(dimension: usize) -> Result<Self> {
        Self::with_capacity(dimension, 0)
    }

    pub fn with_capacity(dimension: usize, capacity: usize) -> Result<Self> {
        if dimension == 0 {
            return Err(ConfigurationError::ZeroDimensions.into());
        }
        Ok(Self {
            dimension,
            coordinates: Vec::with_capacity(capacity * dimension),
            properties: Vec::with_capacity(capacity),
            alive: Vec::with_capacity(capacity),
            num_alive: 0,
        })
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Number of live points.
    pub fn len(&self) -> usize {
        self.num_alive
    }

    pub fn is_empty(&self) -> bool {
        self.num_alive == 0
    }

    /// Upper bound (exclusive) of every id this store has handed out.
    pub fn id_bound(&self) -> usize {
        self.alive.len()
    }

    pub fn add(&mut self, coordinates: &[f64]) -> Result<PointId> {
        self.add_with_properties(coordinates, PointProperties::default())
    }

    pub fn add_with_properties(
        &mut self,
        coordinates: &[f64],
        properties: PointProperties,
    ) -> Result<PointId> {
        validate_coordinates(self.dimension, coordinates)?;
        let id = self.alive.len();
        self.coordinates.extend_from_slice(coordinates);
        self.properties.push(properties);
        self.alive.push(true);
        self.num_alive += 1;
        Ok(id)
    }

    pub fn get(&self, id: PointId) -> Result<&[f64]> {
        if !self.contains(id) {
            return Err(GridClusterError::NotFound(id));
        }
        Ok(self.slot(id))
    }

    pub fn properties(&self, id: PointId) -> Result<PointProperties> {
        if !self.contains(id) {
            return Err(GridClusterError::NotFound(id));
        }
        Ok(self.properties[id])
    }

    pub fn contains(&self, id: PointId) -> bool {
        self.alive.get(id).copied().unwrap_or(false)
    }

    /// Removing an unknown or already removed id is a no-op.
    pub fn remove(&mut self, id: PointId) {
        if let Some(alive) = self.alive.get_mut(id) {
            if *alive {
                *alive = false;
                self.num_alive -= 1;
            }
        }
    }

    pub fn ids(&self) -> impl Iterator<Item = PointId> + '_ {
        self.alive
            .iter()
            .enumerate()
            .filter_map(|(i, alive)| if *alive { Some(i) } else { None })
    }

    pub fn iter(&self) -> impl Iterator<Item = (PointId, &[f64])> + '_ {
        self.ids().map(move |id| (id, self.slot(id)))
    }

    fn slot(&self, id: PointId) -> &[f64] {
        let start = id * self.dimension;
        &self.coordinates[start..start + self.dimension]
    }
}

pub(crate) fn validate_coordinates(
    dimension: usize,
    coordinates: &[f64],
) -> std::result::Result<(), InvalidCoordinateError> {
    if coordinates.len() != dimension {
        return Err(InvalidCoordinateError::DimensionMismatch {
            expected: dimension,
            real: coordinates.len(),
        });
    }
    for (axis, value) in coordinates.iter().enumerate() {
        if value.is_nan() {
            return Err(InvalidCoordinateError::NotANumber { axis });
        }
        if value.is_infinite() {
            return Err(InvalidCoordinateError::Infinite {
                axis,
                value: *value,
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_and_get() {
        let mut store = PointStore::new(2).unwrap();
        let a = store.add(&[1.0, 2.0]).unwrap();
        let b = store.add(&[3.0, 4.0]).unwrap();
        assert_eq!(a, 0);
        assert_eq!(b, 1);
        assert_eq!(store.get(b).unwrap(), &[3.0, 4.0]);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_rejects_bad_coordinates() {
        let mut store = PointStore::new(2).unwrap();
        let res = store.add(&[1.0]);
        assert!(matches!(
            res,
            Err(GridClusterError::InvalidCoordinate(
                InvalidCoordinateError::DimensionMismatch {
                    expected: 2,
                    real: 1
                }
            ))
        ));
        let res = store.add(&[1.0, f64::NAN]);
        assert!(matches!(
            res,
            Err(GridClusterError::InvalidCoordinate(
                InvalidCoordinateError::NotANumber { axis: 1 }
            ))
        ));
        // Nothing was stored for the failed inserts
        assert!(store.is_empty());
        assert_eq!(store.id_bound(), 0);
    }

    #[test]
    fn test_remove_is_idempotent() {
        let mut store = PointStore::new(1).unwrap();
        let a = store.add(&[1.0]).unwrap();
        let b = store.add(&[2.0]).unwrap();
        store.remove(a);
        store.remove(a);
        store.remove(1234);
        assert_eq!(store.len(), 1);
        assert_eq!(store.get(a), Err(GridClusterError::NotFound(a)));
        assert_eq!(store.ids().collect::<Vec<_>>(), vec![b]);
        // Ids are not re-used
        let c = store.add(&[3.0]).unwrap();
        assert_eq!(c, 2);
    }

    #[test]
    fn test_zero_dimensions() {
        assert!(PointStore::new(0).is_err());
    }
}
