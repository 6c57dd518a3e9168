//! Categorical dimensions that split each node's population into cells.
//!
//! Cells are numbered row-major over the dimensions, so with the default
//! age × risk × vaccination layout cell `[a, r, v]` is `a * 4 + r * 2 + v`.
use serde::{Deserialize, Serialize};

use crate::error::SimError;

/// One categorical dimension and the names of its values
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StratificationDimension {
    pub name: String,
    pub values: Vec<String>,
}

impl StratificationDimension {
    pub fn new(name: &str, values: &[&str]) -> Self {
        StratificationDimension {
            name: name.to_string(),
            values: values.iter().map(ToString::to_string).collect(),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// A selection of cells: one entry per dimension, `None` meaning "every value".
///
/// Dimensions past the end of the filter are wildcards, so an empty filter
/// selects every cell and `[Some(0)]` selects the first age group.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StratificationFilter(pub Vec<Option<usize>>);

impl StratificationFilter {
    /// Selects every cell
    #[must_use]
    pub fn all() -> Self {
        StratificationFilter(Vec::new())
    }

    /// Selects exactly the cell with this key
    #[must_use]
    pub fn from_key(key: &[usize]) -> Self {
        StratificationFilter(key.iter().copied().map(Some).collect())
    }

    /// Returns a copy of this filter with `dimension` fixed to `value`
    #[must_use]
    pub fn with(mut self, dimension: usize, value: usize) -> Self {
        if self.0.len() <= dimension {
            self.0.resize(dimension + 1, None);
        }
        self.0[dimension] = Some(value);
        self
    }

    fn matches(&self, key: &[usize]) -> bool {
        self.0
            .iter()
            .zip(key)
            .all(|(wanted, value)| wanted.is_none_or(|wanted| wanted == *value))
    }
}

impl From<&[usize]> for StratificationFilter {
    fn from(key: &[usize]) -> Self {
        StratificationFilter::from_key(key)
    }
}

/// The ordered set of dimensions of a dataset
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stratifications {
    dimensions: Vec<StratificationDimension>,
    strides: Vec<usize>,
    num_cells: usize,
}

impl Stratifications {
    /// # Errors
    /// Returns `SimError::InvalidStratification` if there are no dimensions or
    /// any dimension has no values.
    pub fn new(dimensions: Vec<StratificationDimension>) -> Result<Self, SimError> {
        if dimensions.is_empty() {
            return Err(SimError::InvalidStratification(
                "at least one stratification dimension is required".to_string(),
            ));
        }
        if let Some(empty) = dimensions.iter().find(|dimension| dimension.is_empty()) {
            return Err(SimError::InvalidStratification(format!(
                "stratification dimension {} has no values",
                empty.name
            )));
        }

        let mut strides = vec![1; dimensions.len()];
        for index in (0..dimensions.len() - 1).rev() {
            strides[index] = strides[index + 1] * dimensions[index + 1].len();
        }
        let num_cells = strides[0] * dimensions[0].len();

        Ok(Stratifications {
            dimensions,
            strides,
            num_cells,
        })
    }

    /// Five age groups, two risk groups, and vaccination status
    #[must_use]
    pub fn seatird_default() -> Self {
        Stratifications::new(default_dimensions()).expect("default dimensions are non-empty")
    }

    #[must_use]
    pub fn dimensions(&self) -> &[StratificationDimension] {
        &self.dimensions
    }

    #[must_use]
    pub fn num_dimensions(&self) -> usize {
        self.dimensions.len()
    }

    #[must_use]
    pub fn num_cells(&self) -> usize {
        self.num_cells
    }

    /// The number of values in `dimension`, or 0 if it does not exist
    #[must_use]
    pub fn dimension_len(&self, dimension: usize) -> usize {
        self.dimensions.get(dimension).map_or(0, StratificationDimension::len)
    }

    /// Converts a full key to its cell index
    ///
    /// # Errors
    /// Returns `SimError::InvalidStratification` if the key has the wrong
    /// length or a value out of range.
    pub fn cell_index(&self, key: &[usize]) -> Result<usize, SimError> {
        if key.len() != self.dimensions.len() {
            return Err(SimError::InvalidStratification(format!(
                "key {key:?} has {} values, expected {}",
                key.len(),
                self.dimensions.len()
            )));
        }
        let mut cell = 0;
        for ((value, dimension), stride) in key.iter().zip(&self.dimensions).zip(&self.strides) {
            if *value >= dimension.len() {
                return Err(SimError::InvalidStratification(format!(
                    "value {value} out of range for dimension {}",
                    dimension.name
                )));
            }
            cell += value * stride;
        }
        Ok(cell)
    }

    /// The value of `dimension` in `cell`
    #[must_use]
    pub fn value_of(&self, cell: usize, dimension: usize) -> usize {
        (cell / self.strides[dimension]) % self.dimensions[dimension].len()
    }

    #[must_use]
    pub fn key_of(&self, cell: usize) -> Vec<usize> {
        (0..self.dimensions.len())
            .map(|dimension| self.value_of(cell, dimension))
            .collect()
    }

    /// Every cell selected by `filter`, in increasing order
    ///
    /// # Errors
    /// Returns `SimError::InvalidStratification` if the filter has more
    /// entries than there are dimensions or a fixed value is out of range.
    pub fn matching_cells(&self, filter: &StratificationFilter) -> Result<Vec<usize>, SimError> {
        if filter.0.len() > self.dimensions.len() {
            return Err(SimError::InvalidStratification(format!(
                "filter {:?} has more entries than the {} dimensions",
                filter.0,
                self.dimensions.len()
            )));
        }
        for (wanted, dimension) in filter.0.iter().zip(&self.dimensions) {
            if let Some(value) = wanted {
                if *value >= dimension.len() {
                    return Err(SimError::InvalidStratification(format!(
                        "value {value} out of range for dimension {}",
                        dimension.name
                    )));
                }
            }
        }
        Ok((0..self.num_cells)
            .filter(|cell| filter.matches(&self.key_of(*cell)))
            .collect())
    }
}

fn default_dimensions() -> Vec<StratificationDimension> {
    vec![
        StratificationDimension::new("age group", &["0-4", "5-24", "25-49", "50-64", "65+"]),
        StratificationDimension::new("risk group", &["Low", "High"]),
        StratificationDimension::new("vaccinated", &["Unvaccinated", "Vaccinated"]),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_layout() {
        let stratifications = Stratifications::seatird_default();
        assert_eq!(stratifications.num_dimensions(), 3);
        assert_eq!(stratifications.num_cells(), 20);
        assert_eq!(stratifications.cell_index(&[0, 0, 0]).unwrap(), 0);
        assert_eq!(stratifications.cell_index(&[1, 0, 1]).unwrap(), 5);
        assert_eq!(stratifications.cell_index(&[4, 1, 1]).unwrap(), 19);
        assert_eq!(stratifications.key_of(5), vec![1, 0, 1]);
    }

    #[test]
    fn key_round_trip_covers_every_cell() {
        let stratifications = Stratifications::seatird_default();
        for cell in 0..stratifications.num_cells() {
            let key = stratifications.key_of(cell);
            assert_eq!(stratifications.cell_index(&key).unwrap(), cell);
        }
    }

    #[test]
    fn rejects_bad_keys() {
        let stratifications = Stratifications::seatird_default();
        assert!(stratifications.cell_index(&[0, 0]).is_err());
        assert!(stratifications.cell_index(&[5, 0, 0]).is_err());
    }

    #[test]
    fn rejects_empty_dimension() {
        let result = Stratifications::new(vec![StratificationDimension::new("age", &[])]);
        assert!(matches!(result, Err(SimError::InvalidStratification(_))));
        assert!(Stratifications::new(Vec::new()).is_err());
    }

    #[test]
    fn wildcard_filters() {
        let stratifications = Stratifications::seatird_default();
        assert_eq!(
            stratifications
                .matching_cells(&StratificationFilter::all())
                .unwrap()
                .len(),
            20
        );
        assert_eq!(
            stratifications
                .matching_cells(&StratificationFilter::all().with(0, 2))
                .unwrap(),
            vec![8, 9, 10, 11]
        );
        assert_eq!(
            stratifications
                .matching_cells(&StratificationFilter(vec![None, Some(1), Some(0)]))
                .unwrap(),
            vec![2, 6, 10, 14, 18]
        );
        assert!(stratifications
            .matching_cells(&StratificationFilter(vec![None, None, None, None]))
            .is_err());
    }
}
