use std::collections::BTreeMap;

use crate::dataset::NodeId;
use crate::error::SimError;
use crate::hashing::HashMap;
use crate::stockpile::{Distribution, DistributionId, Stockpile, StockpileId};
use crate::{debug, trace, warn};

/// One realized transfer into one stockpile
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AppliedDistribution {
    pub distribution: DistributionId,
    pub day: usize,
    /// The stockpile drawn from. For a pro rata share passed on to a node
    /// stockpile this is the multi-node stockpile that received the transfer.
    pub source: Option<StockpileId>,
    pub destination: StockpileId,
    pub quantity: u64,
}

#[derive(Debug, Clone, Default)]
pub struct StockpileNetwork {
    stockpiles: Vec<Stockpile>,
    distributions: Vec<Distribution>,
    node_populations: HashMap<NodeId, f64>,
    num_times: usize,
}

impl StockpileNetwork {
    #[must_use]
    pub fn new(num_times: usize) -> Self {
        StockpileNetwork {
            stockpiles: Vec::new(),
            distributions: Vec::new(),
            node_populations: HashMap::default(),
            num_times: num_times.max(1),
        }
    }

    #[must_use]
    pub fn num_times(&self) -> usize {
        self.num_times
    }

    #[must_use]
    pub fn latest_time(&self) -> usize {
        self.num_times - 1
    }

    /// Adds a stockpile holding `initial_quantity` on every existing day
    pub fn add_stockpile(
        &mut self,
        name: &str,
        node_ids: Vec<NodeId>,
        initial_quantity: u64,
    ) -> StockpileId {
        self.stockpiles
            .push(Stockpile::new(name, self.num_times, initial_quantity, node_ids));
        StockpileId(self.stockpiles.len() - 1)
    }

    /// Sets the population used to split transfers into multi-node stockpiles
    pub fn set_node_population(&mut self, node_id: NodeId, population: f64) {
        self.node_populations.insert(node_id, population);
    }

    #[must_use]
    pub fn node_population(&self, node_id: NodeId) -> f64 {
        self.node_populations.get(&node_id).copied().unwrap_or(0.0)
    }

    #[must_use]
    pub fn stockpiles(&self) -> &[Stockpile] {
        &self.stockpiles
    }

    #[must_use]
    pub fn stockpile(&self, id: StockpileId) -> Option<&Stockpile> {
        self.stockpiles.get(id.0)
    }

    fn try_stockpile_mut(&mut self, id: StockpileId) -> Result<&mut Stockpile, SimError> {
        self.stockpiles
            .get_mut(id.0)
            .ok_or(SimError::UnknownStockpile(id.0))
    }

    #[must_use]
    pub fn find_stockpile(&self, name: &str) -> Option<StockpileId> {
        self.stockpiles
            .iter()
            .position(|stockpile| stockpile.name() == name)
            .map(StockpileId)
    }

    /// The stockpile serving only `node_id`, if there is one
    #[must_use]
    pub fn node_stockpile(&self, node_id: NodeId) -> Option<StockpileId> {
        self.stockpiles
            .iter()
            .position(|stockpile| stockpile.node_ids() == [node_id])
            .map(StockpileId)
    }

    /// # Errors
    /// Returns `SimError` if the stockpile or day does not exist.
    pub fn quantity(&self, id: StockpileId, time: usize) -> Result<u64, SimError> {
        self.stockpile(id)
            .ok_or(SimError::UnknownStockpile(id.0))?
            .quantity(time)
    }

    /// # Errors
    /// Returns `SimError` if the stockpile or day does not exist.
    pub fn set_quantity(
        &mut self,
        id: StockpileId,
        time: usize,
        quantity: u64,
    ) -> Result<(), SimError> {
        self.try_stockpile_mut(id)?.set_quantity(time, quantity)
    }

    #[must_use]
    pub fn distributions(&self) -> &[Distribution] {
        &self.distributions
    }

    #[must_use]
    pub fn distribution(&self, id: DistributionId) -> Option<&Distribution> {
        self.distributions.get(id.0)
    }

    /// Schedules a transfer created on the latest day
    ///
    /// A transfer with no delay is applied immediately and its records are
    /// returned; otherwise it is applied by the `evolve` call for its fire day.
    ///
    /// # Errors
    /// Returns `SimError::UnknownStockpile` for an unknown source or
    /// destination, or `SimError::InvalidParameter` if they are the same.
    pub fn add_distribution(
        &mut self,
        source: Option<StockpileId>,
        destination: Option<StockpileId>,
        target_node_ids: Vec<NodeId>,
        quantity: u64,
        transfer_delay: usize,
    ) -> Result<(DistributionId, Vec<AppliedDistribution>), SimError> {
        for id in [source, destination].into_iter().flatten() {
            if self.stockpile(id).is_none() {
                return Err(SimError::UnknownStockpile(id.0));
            }
        }
        if source.is_some() && source == destination {
            return Err(SimError::InvalidParameter(
                "a distribution needs distinct source and destination".to_string(),
            ));
        }

        let distribution = Distribution::new(
            self.latest_time(),
            source,
            destination,
            target_node_ids,
            quantity,
            transfer_delay,
        );
        debug!(
            "distribution of {quantity} from {source:?} to {destination:?} fires on day {}",
            distribution.fire_time()
        );
        self.distributions.push(distribution);
        let id = DistributionId(self.distributions.len() - 1);

        let applied = if transfer_delay == 0 {
            self.apply(id, self.latest_time())
        } else {
            Vec::new()
        };
        Ok((id, applied))
    }

    /// Appends a day to every stockpile, carrying quantities forward, then
    /// applies the distributions that fire on `day`
    pub fn evolve(&mut self, day: usize) -> Vec<AppliedDistribution> {
        for stockpile in &mut self.stockpiles {
            stockpile.copy_to_new_time_step();
        }
        self.num_times += 1;
        if day != self.latest_time() {
            warn!(
                "stockpiles evolved to day {} but asked to apply day {day}",
                self.latest_time()
            );
        }
        self.apply_distributions(day)
    }

    /// Applies every distribution that fires on `day` and has not been applied
    pub fn apply_distributions(&mut self, day: usize) -> Vec<AppliedDistribution> {
        let due: Vec<DistributionId> = self
            .distributions
            .iter()
            .enumerate()
            .filter(|(_, distribution)| {
                distribution.fire_time() == day && !distribution.is_applied()
            })
            .map(|(index, _)| DistributionId(index))
            .collect();
        due.into_iter()
            .flat_map(|id| self.apply(id, day))
            .collect()
    }

    fn apply(&mut self, id: DistributionId, day: usize) -> Vec<AppliedDistribution> {
        if day >= self.num_times {
            return Vec::new();
        }
        let distribution = &self.distributions[id.0];
        let source = distribution.source();
        let requested = distribution.quantity();
        let broadcast_to_all = distribution.target_node_ids().is_empty();

        let destinations: Vec<StockpileId> = match distribution.destination() {
            Some(destination) => vec![destination],
            None => self
                .stockpiles
                .iter()
                .enumerate()
                .filter(|(_, stockpile)| {
                    if broadcast_to_all {
                        !stockpile.node_ids().is_empty()
                    } else {
                        stockpile.serves_any(distribution.target_node_ids())
                    }
                })
                .map(|(index, _)| StockpileId(index))
                .filter(|id| Some(*id) != source)
                .collect(),
        };

        let mut available = match source {
            Some(source) => self.stockpiles[source.0].quantities()[day],
            None => u64::MAX,
        };
        let mut applied = Vec::with_capacity(destinations.len());
        let mut broadcast = BTreeMap::new();
        let mut total = 0;
        for destination in destinations {
            let clamped = requested.min(available);
            available -= clamped;
            total += clamped;

            let held = self.stockpiles[destination.0].quantity_mut(day);
            *held = held.saturating_add(clamped);

            if self.distributions[id.0].destination().is_none() {
                broadcast.insert(destination, clamped);
            }
            applied.push(AppliedDistribution {
                distribution: id,
                day,
                source,
                destination,
                quantity: clamped,
            });
            applied.extend(self.split_to_nodes(id, destination, day, clamped));
        }
        if let Some(source) = source {
            *self.stockpiles[source.0].quantity_mut(day) = available;
        }
        if total < requested && self.distributions[id.0].destination().is_some() {
            warn!("distribution {} clamped from {requested} to {total}", id.0);
        }
        self.distributions[id.0].record(total, broadcast);
        applied
    }

    /// Passes a transfer into a multi-node stockpile on to the stockpiles of
    /// its nodes, pro rata by population
    ///
    /// Shares are truncated, so the remainder stays with the receiving
    /// stockpile.
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    fn split_to_nodes(
        &mut self,
        id: DistributionId,
        receiver: StockpileId,
        day: usize,
        quantity: u64,
    ) -> Vec<AppliedDistribution> {
        let node_ids = self.stockpiles[receiver.0].node_ids().to_vec();
        if node_ids.len() < 2 || quantity == 0 {
            return Vec::new();
        }
        let total_population: f64 = node_ids.iter().map(|id| self.node_population(*id)).sum();
        if total_population <= 0.0 {
            warn!(
                "stockpile {} serves no population; keeping {quantity}",
                self.stockpiles[receiver.0].name()
            );
            return Vec::new();
        }

        let mut shares = Vec::with_capacity(node_ids.len());
        for node_id in node_ids {
            let Some(node_stockpile) = self.node_stockpile(node_id) else {
                warn!("no stockpile for node {node_id}");
                continue;
            };
            let fraction = self.node_population(node_id) / total_population;
            let share = (fraction * quantity as f64).floor() as u64;
            let held = self.stockpiles[receiver.0].quantity_mut(day);
            let share = share.min(*held);
            *held -= share;
            let node_held = self.stockpiles[node_stockpile.0].quantity_mut(day);
            *node_held = node_held.saturating_add(share);
            trace!("{share} of distribution {} passed on to node {node_id}", id.0);
            shares.push(AppliedDistribution {
                distribution: id,
                day,
                source: Some(receiver),
                destination: node_stockpile,
                quantity: share,
            });
        }
        shares
    }
}
