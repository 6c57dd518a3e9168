//! Medical resource ledgers and the transfers between them.
//!
//! A `Stockpile` records the quantity held on every simulated day and the
//! nodes it serves. The `StockpileNetwork` owns every stockpile and every
//! scheduled `Distribution`; distributions refer to stockpiles by
//! `StockpileId`, so the network is the only owner of either.
mod distribution;
mod network;

pub use distribution::{Distribution, DistributionId};
pub use network::{AppliedDistribution, StockpileNetwork};

use serde::Serialize;

use crate::dataset::NodeId;
use crate::error::SimError;

/// Index of a stockpile in its network
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct StockpileId(pub usize);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stockpile {
    name: String,
    quantities: Vec<u64>,
    node_ids: Vec<NodeId>,
}

impl Stockpile {
    /// Creates a stockpile holding `initial_quantity` on each of `num_times` days
    #[must_use]
    pub fn new(name: &str, num_times: usize, initial_quantity: u64, node_ids: Vec<NodeId>) -> Self {
        Stockpile {
            name: name.to_string(),
            quantities: vec![initial_quantity; num_times.max(1)],
            node_ids,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn node_ids(&self) -> &[NodeId] {
        &self.node_ids
    }

    pub fn set_node_ids(&mut self, node_ids: Vec<NodeId>) {
        self.node_ids = node_ids;
    }

    /// A stockpile that serves exactly one node
    #[must_use]
    pub fn is_node_stockpile(&self) -> bool {
        self.node_ids.len() == 1
    }

    #[must_use]
    pub fn serves_any(&self, node_ids: &[NodeId]) -> bool {
        self.node_ids.iter().any(|id| node_ids.contains(id))
    }

    #[must_use]
    pub fn num_times(&self) -> usize {
        self.quantities.len()
    }

    /// The full per-day quantity series
    #[must_use]
    pub fn quantities(&self) -> &[u64] {
        &self.quantities
    }

    /// # Errors
    /// Returns `SimError::TimeOutOfRange` if `time` is past the latest day.
    pub fn quantity(&self, time: usize) -> Result<u64, SimError> {
        self.quantities
            .get(time)
            .copied()
            .ok_or(SimError::TimeOutOfRange {
                time,
                num_times: self.quantities.len(),
            })
    }

    /// The quantity on the latest day
    #[must_use]
    pub fn latest_quantity(&self) -> u64 {
        self.quantities.last().copied().unwrap_or(0)
    }

    /// # Errors
    /// Returns `SimError::TimeOutOfRange` if `time` is past the latest day.
    pub fn set_quantity(&mut self, time: usize, quantity: u64) -> Result<(), SimError> {
        let num_times = self.quantities.len();
        let slot = self
            .quantities
            .get_mut(time)
            .ok_or(SimError::TimeOutOfRange { time, num_times })?;
        *slot = quantity;
        Ok(())
    }

    /// Panics if `time` is past the latest day
    pub(crate) fn quantity_mut(&mut self, time: usize) -> &mut u64 {
        &mut self.quantities[time]
    }

    pub(crate) fn copy_to_new_time_step(&mut self) {
        let latest = self.latest_quantity();
        self.quantities.push(latest);
    }
}
