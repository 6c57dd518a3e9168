//! Non-pharmaceutical interventions (school closures, distancing, ...).
//!
//! An NPI reduces contacts between age groups in a set of nodes for a window
//! of days. When several are active at once their effects compound.
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::dataset::NodeId;
use crate::error::SimError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Npi {
    pub name: String,
    /// First day the NPI is in effect
    pub execution_time: usize,
    /// Number of days the NPI stays in effect
    pub duration: usize,
    /// Per age group contact reduction in [0, 1]
    pub age_effectiveness: Vec<f64>,
    pub node_ids: Vec<NodeId>,
}

impl Npi {
    #[must_use]
    pub fn is_active(&self, node_id: NodeId, day: usize) -> bool {
        day >= self.execution_time
            && day < self.execution_time + self.duration
            && self.node_ids.contains(&node_id)
    }

    /// Reduction of contacts between an individual of `age_i` and one of `age_j`
    #[must_use]
    pub fn pair_effectiveness(&self, age_i: usize, age_j: usize) -> f64 {
        let e_i = self.age_effectiveness.get(age_i).copied().unwrap_or(0.0);
        let e_j = self.age_effectiveness.get(age_j).copied().unwrap_or(0.0);
        e_i + e_j - e_i * e_j
    }

    /// # Errors
    /// Returns `SimError::InvalidParameter` if the effectiveness vector does
    /// not have one value in [0, 1] per age group.
    pub fn validate(&self, num_age_groups: usize) -> Result<(), SimError> {
        if self.age_effectiveness.len() != num_age_groups {
            return Err(SimError::InvalidParameter(format!(
                "NPI {} has {} age effectiveness values, expected {num_age_groups}",
                self.name,
                self.age_effectiveness.len()
            )));
        }
        if self
            .age_effectiveness
            .iter()
            .any(|value| !(0.0..=1.0).contains(value))
        {
            return Err(SimError::InvalidParameter(format!(
                "NPI {} effectiveness must be within [0, 1]",
                self.name
            )));
        }
        Ok(())
    }
}

/// Combined reduction of every NPI active at `node_id` on `day`
#[must_use]
pub fn combined_effectiveness(
    npis: &[Npi],
    node_id: NodeId,
    day: usize,
    age_i: usize,
    age_j: usize,
) -> f64 {
    let pass_through: f64 = npis
        .iter()
        .filter(|npi| npi.is_active(node_id, day))
        .map(|npi| 1.0 - npi.pair_effectiveness(age_i, age_j))
        .product();
    1.0 - pass_through
}

/// Decides whether a contact between `age_i` and `age_j` is prevented
///
/// No random number is drawn when no NPI applies.
pub fn is_contact_blocked<R: Rng>(
    npis: &[Npi],
    node_id: NodeId,
    day: usize,
    age_i: usize,
    age_j: usize,
    rng: &mut R,
) -> bool {
    let effectiveness = combined_effectiveness(npis, node_id, day, age_i, age_j);
    if effectiveness <= 0.0 {
        return false;
    }
    rng.random::<f64>() <= effectiveness
}
