use std::collections::BTreeMap;

use serde::Serialize;

use crate::dataset::NodeId;
use crate::stockpile::StockpileId;

/// Index of a distribution in its network
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct DistributionId(pub usize);

/// A transfer scheduled on `creation_time` that fires `transfer_delay` days later
///
/// With no source the quantity is new inventory. With no destination it is
/// broadcast to every node stockpile serving one of `target_node_ids`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Distribution {
    creation_time: usize,
    source: Option<StockpileId>,
    destination: Option<StockpileId>,
    target_node_ids: Vec<NodeId>,
    quantity: u64,
    transfer_delay: usize,
    clamped_quantity: Option<u64>,
    broadcast_quantities: BTreeMap<StockpileId, u64>,
}

impl Distribution {
    #[must_use]
    pub fn new(
        creation_time: usize,
        source: Option<StockpileId>,
        destination: Option<StockpileId>,
        target_node_ids: Vec<NodeId>,
        quantity: u64,
        transfer_delay: usize,
    ) -> Self {
        Distribution {
            creation_time,
            source,
            destination,
            target_node_ids,
            quantity,
            transfer_delay,
            clamped_quantity: None,
            broadcast_quantities: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn creation_time(&self) -> usize {
        self.creation_time
    }

    /// The day on which the transfer happens
    #[must_use]
    pub fn fire_time(&self) -> usize {
        self.creation_time + self.transfer_delay
    }

    #[must_use]
    pub fn source(&self) -> Option<StockpileId> {
        self.source
    }

    #[must_use]
    pub fn destination(&self) -> Option<StockpileId> {
        self.destination
    }

    #[must_use]
    pub fn target_node_ids(&self) -> &[NodeId] {
        &self.target_node_ids
    }

    /// The requested quantity
    #[must_use]
    pub fn quantity(&self) -> u64 {
        self.quantity
    }

    #[must_use]
    pub fn transfer_delay(&self) -> usize {
        self.transfer_delay
    }

    #[must_use]
    pub fn is_applied(&self) -> bool {
        self.clamped_quantity.is_some()
    }

    /// The quantity actually transferred; the requested quantity until applied
    #[must_use]
    pub fn clamped_quantity(&self) -> u64 {
        self.clamped_quantity.unwrap_or(self.quantity)
    }

    /// Per destination quantities of an applied broadcast
    #[must_use]
    pub fn broadcast_quantities(&self) -> &BTreeMap<StockpileId, u64> {
        &self.broadcast_quantities
    }

    pub(crate) fn record(&mut self, total: u64, broadcast: BTreeMap<StockpileId, u64>) {
        self.clamped_quantity = Some(total);
        self.broadcast_quantities = broadcast;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fire_time_and_clamping() {
        let mut distribution =
            Distribution::new(2, Some(StockpileId(0)), Some(StockpileId(1)), Vec::new(), 50, 3);
        assert_eq!(distribution.fire_time(), 5);
        assert!(!distribution.is_applied());
        assert_eq!(distribution.clamped_quantity(), 50);

        distribution.record(20, BTreeMap::new());
        assert!(distribution.is_applied());
        assert_eq!(distribution.clamped_quantity(), 20);
        assert_eq!(distribution.quantity(), 50);
    }
}
