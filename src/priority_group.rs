//! Named population subsets used to target antivirals.
//!
//! A priority group is a list of stratification filters, e.g. "children"
//! might be `[[0], [1]]` (both of the first two age groups, any risk, any
//! vaccination status). A selection of several groups expands into the set
//! of distinct cells they cover.
use serde::{Deserialize, Serialize};

use crate::dataset::{StratificationFilter, Stratifications};
use crate::error::SimError;
use crate::hashing::HashSet;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriorityGroup {
    pub name: String,
    pub stratifications: Vec<StratificationFilter>,
}

impl PriorityGroup {
    /// Every cell covered by this group, in increasing order
    ///
    /// # Errors
    /// Returns `SimError::InvalidStratification` if a filter does not fit.
    pub fn cells(&self, stratifications: &Stratifications) -> Result<Vec<usize>, SimError> {
        let mut cells = Vec::new();
        for filter in &self.stratifications {
            cells.extend(stratifications.matching_cells(filter)?);
        }
        cells.sort_unstable();
        cells.dedup();
        Ok(cells)
    }
}

/// The distinct cells covered by the named groups, in increasing order
///
/// An empty selection covers every cell.
///
/// # Errors
/// Returns `SimError::InvalidParameter` if a name is not defined, or
/// `SimError::InvalidStratification` if a filter does not fit.
pub fn selected_cells(
    groups: &[PriorityGroup],
    selected: &[String],
    stratifications: &Stratifications,
) -> Result<Vec<usize>, SimError> {
    if selected.is_empty() {
        return Ok((0..stratifications.num_cells()).collect());
    }

    let mut seen = HashSet::default();
    for name in selected {
        let group = groups
            .iter()
            .find(|group| &group.name == name)
            .ok_or_else(|| SimError::InvalidParameter(format!("unknown priority group {name}")))?;
        seen.extend(group.cells(stratifications)?);
    }
    let mut cells: Vec<usize> = seen.into_iter().collect();
    cells.sort_unstable();
    Ok(cells)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn groups() -> Vec<PriorityGroup> {
        vec![
            PriorityGroup {
                name: "Children".to_string(),
                stratifications: vec![
                    StratificationFilter(vec![Some(0)]),
                    StratificationFilter(vec![Some(1)]),
                ],
            },
            PriorityGroup {
                name: "High risk".to_string(),
                stratifications: vec![StratificationFilter(vec![None, Some(1)])],
            },
        ]
    }

    #[test]
    fn group_cells() {
        let stratifications = Stratifications::seatird_default();
        assert_eq!(
            groups()[0].cells(&stratifications).unwrap(),
            (0..8).collect::<Vec<_>>()
        );
    }

    #[test]
    fn overlapping_selection_is_unique() {
        let stratifications = Stratifications::seatird_default();
        let selected = vec!["Children".to_string(), "High risk".to_string()];
        let cells = selected_cells(&groups(), &selected, &stratifications).unwrap();
        // ages 0-1 (cells 0..8) plus high risk cells of ages 2-4
        assert_eq!(cells, vec![0, 1, 2, 3, 4, 5, 6, 7, 10, 11, 14, 15, 18, 19]);
    }

    #[test]
    fn empty_selection_is_everyone() {
        let stratifications = Stratifications::seatird_default();
        assert_eq!(
            selected_cells(&groups(), &[], &stratifications).unwrap().len(),
            20
        );
    }

    #[test]
    fn unknown_group() {
        let stratifications = Stratifications::seatird_default();
        let result = selected_cells(&groups(), &["Retirees".to_string()], &stratifications);
        assert!(matches!(result, Err(SimError::InvalidParameter(_))));
    }

    #[test]
    fn deserializes_wildcards() {
        let group: PriorityGroup =
            serde_json::from_str(r#"{ "name": "Elderly", "stratifications": [[4, null, null]] }"#)
                .unwrap();
        assert_eq!(
            group.stratifications,
            vec![StratificationFilter(vec![Some(4), None, None])]
        );
    }
}
