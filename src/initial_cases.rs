//! Seeding the epidemic from a CSV file of initial cases.
//!
//! Each row `node_id,count,age,risk,vaccination` exposes `count` susceptibles
//! in one cell of one node before the first day is simulated.
use std::path::Path;

use serde::Deserialize;

use crate::context::Context;
use crate::dataset::NodeId;
use crate::error::SimError;
use crate::simulation::ContextSimulationExt;
use crate::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct InitialCase {
    pub node_id: NodeId,
    pub count: u64,
    pub age: usize,
    pub risk: usize,
    pub vaccination: usize,
}

impl InitialCase {
    #[must_use]
    pub fn key(&self) -> [usize; 3] {
        [self.age, self.risk, self.vaccination]
    }
}

/// # Errors
/// Returns `SimError` if the file cannot be read or a row is malformed.
pub fn load_initial_cases(path: &Path) -> Result<Vec<InitialCase>, SimError> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)?;
    let mut cases = Vec::new();
    for record in reader.deserialize() {
        cases.push(record?);
    }
    Ok(cases)
}

pub trait ContextInitialCasesExt {
    /// Exposes every case; returns the total actually exposed
    ///
    /// # Errors
    /// Returns the first exposure error, such as an unknown node or a key
    /// outside the stratifications.
    fn seed_initial_cases(&mut self, cases: &[InitialCase]) -> Result<u64, SimError>;

    /// # Errors
    /// Returns `SimError` if the file cannot be loaded or a case cannot be seeded.
    fn load_initial_cases(&mut self, path: &Path) -> Result<u64, SimError>;
}

impl ContextInitialCasesExt for Context {
    fn seed_initial_cases(&mut self, cases: &[InitialCase]) -> Result<u64, SimError> {
        let mut total = 0;
        for case in cases {
            let exposed = self.expose(case.count, case.node_id, &case.key())?;
            if exposed < case.count {
                warn!(
                    "only {exposed} of {} initial cases seeded in node {}",
                    case.count, case.node_id
                );
            }
            total += exposed;
        }
        Ok(total)
    }

    fn load_initial_cases(&mut self, path: &Path) -> Result<u64, SimError> {
        let cases = load_initial_cases(path)?;
        let total = self.seed_initial_cases(&cases)?;
        info!(
            "seeded {total} initial cases from {} rows in {}",
            cases.len(),
            path.display()
        );
        Ok(total)
    }
}
