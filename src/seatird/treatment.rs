//! Antiviral treatment drawn from node stockpiles.
use crate::dataset::NodeId;
use crate::error::SimError;
use crate::parameters::ParametersValues;
use crate::priority_group::selected_cells;
use crate::seatird::{whole, StochasticSeatird};
use crate::stockpile::StockpileId;
use crate::transition::{Compartment, TransitionType};
use crate::trace;

/// Antivirals used in one node on one day
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TreatmentOutcome {
    pub node_id: NodeId,
    pub stockpile: StockpileId,
    pub doses: u64,
    /// Individuals moved from treatable to recovered
    pub treated: u64,
}

impl StochasticSeatird {
    /// Treats the treatable in every node that has its own stockpile
    ///
    /// Doses are limited by stock, by adherence among the treatable, and by
    /// daily capacity; only the effective share of doses cures. Cures are
    /// split pro rata over the cells of the antiviral priority groups.
    pub(super) fn apply_treatments(
        &mut self,
        parameters: &ParametersValues,
    ) -> Result<Vec<TreatmentOutcome>, SimError> {
        let cells = selected_cells(
            &parameters.priority_groups,
            &parameters.antiviral_priority_groups,
            self.dataset.stratifications(),
        )?;
        let latest = self.dataset.latest_time();
        let mut outcomes = Vec::new();

        for node in 0..self.dataset.num_nodes() {
            let node_id = self.dataset.node_ids()[node];
            let Some(stockpile) = self.stockpiles.node_stockpile(node_id) else {
                continue;
            };
            let stock = self.stockpiles.quantity(stockpile, latest)?;
            if stock == 0 {
                continue;
            }
            let treatable: Vec<f64> = cells
                .iter()
                .map(|cell| self.latest(Compartment::Treatable, node, *cell))
                .collect();
            let total_treatable: f64 = treatable.iter().sum();
            if total_treatable <= 0.0 {
                continue;
            }

            let doses = stock
                .min(whole(total_treatable * parameters.antiviral_adherence))
                .min(whole(
                    self.cache.node_totals[node] * parameters.antiviral_capacity,
                ));
            if doses == 0 {
                continue;
            }
            self.stockpiles.set_quantity(stockpile, latest, stock - doses)?;

            let cures = whole(doses as f64 * parameters.antiviral_effectiveness);
            let mut treated = 0;
            if cures > 0 {
                for (cell, in_cell) in cells.iter().zip(&treatable) {
                    let share = whole(in_cell / total_treatable * cures as f64);
                    if share > 0 {
                        treated += self.treat_cell(node, *cell, share);
                    }
                }
            }
            trace!("node {node_id}: {doses} antiviral doses, {treated} treated");
            outcomes.push(TreatmentOutcome {
                node_id,
                stockpile,
                doses,
                treated,
            });
        }
        Ok(outcomes)
    }

    /// Moves up to `count` treatable individuals to recovered and drops the
    /// rest of their schedules, oldest first
    pub(super) fn treat_cell(&mut self, node: usize, cell: usize, count: u64) -> u64 {
        let moved = whole(self.compartments.apply(
            &mut self.dataset,
            TransitionType::TtoR,
            count as f64,
            node,
            cell,
        ));
        let slot = node * self.dataset.num_cells() + cell;
        for _ in 0..moved {
            let Some(id) = self.treatable[slot].shift_remove_index(0) else {
                break;
            };
            self.cancel_schedule(id);
        }
        moved
    }
}
