//! End of day infection between nodes linked by travel.
use rand_distr::{Binomial, Distribution};

use crate::parameters::ParametersValues;
use crate::seatird::{StochasticSeatird, AGE_DIMENSION, VACCINATED, VACCINATION_DIMENSION};
use crate::transition::Compartment;
use crate::warn;

impl StochasticSeatird {
    /// Per node, per age totals of the asymptomatic and of everyone transmitting
    fn infection_snapshot(&self, num_ages: usize) -> (Vec<Vec<f64>>, Vec<Vec<f64>>) {
        let stratifications = self.dataset.stratifications();
        let num_nodes = self.dataset.num_nodes();
        let mut asymptomatic = vec![vec![0.0; num_ages]; num_nodes];
        let mut transmitting = vec![vec![0.0; num_ages]; num_nodes];
        for node in 0..num_nodes {
            for cell in 0..self.dataset.num_cells() {
                let age = stratifications.value_of(cell, AGE_DIMENSION);
                let a = self.latest(Compartment::Asymptomatic, node, cell);
                asymptomatic[node][age] += a;
                transmitting[node][age] += a
                    + self.latest(Compartment::Treatable, node, cell)
                    + self.latest(Compartment::Infectious, node, cell);
            }
        }
        (asymptomatic, transmitting)
    }

    /// Probability, per age group, that an unvaccinated susceptible in `sink`
    /// is exposed through travel today
    pub(super) fn travel_probabilities(
        &self,
        parameters: &ParametersValues,
        sink: usize,
        asymptomatic: &[Vec<f64>],
        transmitting: &[Vec<f64>],
    ) -> Vec<f64> {
        let num_ages = parameters.num_age_groups();
        let scale = parameters.beta() * parameters.travel_contact_fraction;
        let contact = &parameters.contact_matrix;
        let sigma = &parameters.susceptibility;
        let flow = &parameters.age_flow_reductions;
        let population_sink = self.cache.node_totals[sink];

        let mut probabilities = vec![0.0; num_ages];
        for source in 0..self.dataset.num_nodes() {
            if source == sink {
                continue;
            }
            let outbound = self.dataset.travel_by_index(sink, source);
            let inbound = self.dataset.travel_by_index(source, sink);
            if outbound <= 0.0 && inbound <= 0.0 {
                continue;
            }
            let population_source = self.cache.node_totals[source];
            for (a, probability) in probabilities.iter_mut().enumerate() {
                let mut visiting = 0.0;
                let mut visited = 0.0;
                for b in 0..num_ages {
                    let force = scale * contact[a][b] * sigma[a];
                    visiting += transmitting[source][b] * force / flow[a];
                    visited += asymptomatic[source][b] * force / flow[b];
                }
                if population_source > 0.0 {
                    *probability += outbound * visiting / population_source;
                }
                if population_sink > 0.0 {
                    *probability += inbound * visited / population_sink;
                }
            }
        }
        probabilities
    }

    /// Exposes susceptibles in every node through travel; returns the total exposed
    pub(super) fn travel(&mut self, parameters: &ParametersValues) -> u64 {
        let num_ages = parameters.num_age_groups();
        let (asymptomatic, transmitting) = self.infection_snapshot(num_ages);
        // Travel exposures start their course at the end of the day
        let now = self.now + 1.0;
        let mut total = 0;

        for sink in 0..self.dataset.num_nodes() {
            let probabilities =
                self.travel_probabilities(parameters, sink, &asymptomatic, &transmitting);
            if probabilities.iter().all(|p| *p <= 0.0) {
                continue;
            }
            for cell in 0..self.dataset.num_cells() {
                let stratifications = self.dataset.stratifications();
                let age = stratifications.value_of(cell, AGE_DIMENSION);
                let mut probability = probabilities[age];
                if stratifications.value_of(cell, VACCINATION_DIMENSION) == VACCINATED {
                    probability *= 1.0 - parameters.vaccine_effectiveness;
                }
                let probability = probability.clamp(0.0, 1.0);
                let susceptible = self.latest(Compartment::Susceptible, sink, cell);
                #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
                let trials = (susceptible + 0.5).floor().max(0.0) as u64;
                if probability <= 0.0 || trials == 0 {
                    continue;
                }
                let exposures = match Binomial::new(trials, probability) {
                    Ok(binomial) => binomial.sample(&mut self.nodes[sink].travel_rng),
                    Err(e) => {
                        warn!("travel binomial({trials}, {probability}) rejected: {e}");
                        0
                    }
                };
                total += self.expose_cell(parameters, sink, cell, exposures, now);
            }
        }
        total
    }
}
