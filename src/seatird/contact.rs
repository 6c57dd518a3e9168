//! Within-node transmission through sampled contact events.
use rand::Rng;

use crate::npi::is_contact_blocked;
use crate::parameters::ParametersValues;
use crate::plan::PlanId;
use crate::seatird::{
    sample_exponential, whole, Schedule, ScheduleId, StochasticEvent, StochasticSeatird,
    AGE_DIMENSION, VACCINATED, VACCINATION_DIMENSION,
};
use crate::transition::Compartment;

impl StochasticSeatird {
    /// Rate at which one infected individual in `from_cell` contacts and
    /// could infect someone in `to_cell` of the same node
    pub(super) fn contact_rate(
        &self,
        parameters: &ParametersValues,
        node: usize,
        from_cell: usize,
        to_cell: usize,
    ) -> f64 {
        let node_total = self.cache.node_totals[node];
        if node_total <= 0.0 {
            return 0.0;
        }
        let stratifications = self.dataset.stratifications();
        let from_age = stratifications.value_of(from_cell, AGE_DIMENSION);
        let to_age = stratifications.value_of(to_cell, AGE_DIMENSION);
        let protection = if stratifications.value_of(to_cell, VACCINATION_DIMENSION) == VACCINATED {
            1.0 - parameters.vaccine_effectiveness
        } else {
            1.0
        };
        let fraction = self.cached_population(node, to_cell) / node_total;
        protection
            * parameters.beta()
            * parameters.contact_matrix[from_age][to_age]
            * parameters.susceptibility[to_age]
            * fraction
    }

    /// Queues the contact events of one infected individual for every target
    /// cell, from asymptomatic onset until recovery or death
    pub(super) fn queue_contacts(
        &mut self,
        parameters: &ParametersValues,
        node: usize,
        cell: usize,
        id: ScheduleId,
        schedule: &Schedule,
        plans: &mut Vec<PlanId>,
    ) {
        let until = schedule.infected_until();
        for to_cell in 0..self.dataset.num_cells() {
            let rate = self.contact_rate(parameters, node, cell, to_cell);
            if rate <= 0.0 {
                continue;
            }
            let state = &mut self.nodes[node];
            let mut previous = schedule.infected_from();
            let mut time = previous + sample_exponential(rate, &mut state.event_rng);
            while time < until {
                let event = StochasticEvent::contact(id, previous, time, cell, to_cell);
                plans.push(state.queue.add_plan(time, event, ()));
                previous = time;
                time += sample_exponential(rate, &mut state.event_rng);
            }
        }
    }

    /// Resolves one contact; returns the number of new exposures (0 or 1)
    pub(super) fn fire_contact(
        &mut self,
        parameters: &ParametersValues,
        node: usize,
        day: usize,
        event: &StochasticEvent,
    ) -> u64 {
        let stratifications = self.dataset.stratifications();
        let from_age = stratifications.value_of(event.from_cell, AGE_DIMENSION);
        let to_age = stratifications.value_of(event.to_cell, AGE_DIMENSION);
        let node_id = self.dataset.node_ids()[node];
        if is_contact_blocked(
            &parameters.npis,
            node_id,
            day,
            from_age,
            to_age,
            &mut self.nodes[node].npi_rng,
        ) {
            return 0;
        }

        // Nobody contacts themselves
        let mut pool = whole(self.cached_population(node, event.to_cell));
        if event.from_cell == event.to_cell {
            pool = pool.saturating_sub(1);
        }
        if pool == 0 {
            return 0;
        }
        let contact = self.nodes[node].event_rng.random_range(1..=pool);
        let susceptible = whole(self.latest(Compartment::Susceptible, node, event.to_cell));
        if susceptible >= contact {
            self.expose_cell(parameters, node, event.to_cell, 1, event.time)
        } else {
            0
        }
    }
}
