//! The stochastic SEATIRD disease model.
//!
//! Every exposure samples its whole future (see [`Schedule`]) and queues the
//! resulting transition and contact events on its node's queue. A call to
//! [`StochasticSeatird::simulate`] advances the dataset one day, applies
//! antiviral treatment, drains each node's events for the day, and finally
//! lets infection travel between nodes.
//!
//! Compartments are stored as dataset variables named after
//! [`Compartment`]; the engine is the only thing that writes them.
mod contact;
mod event;
mod schedule;
mod travel;
mod treatment;

pub use event::{EventKind, ScheduleId, StochasticEvent};
pub use schedule::{sample_exponential, DiseaseRates, Schedule, ScheduledTransition};
pub use treatment::TreatmentOutcome;

use indexmap::IndexSet;
use rand::rngs::SmallRng;
use strum::IntoEnumIterator;

use crate::dataset::{NodeId, NodeSelection, StratificationFilter, StratifiedDataSet, VariableId};
use crate::define_rng;
use crate::error::SimError;
use crate::hashing::HashMap;
use crate::parameters::{ParametersValues, HOSPITALIZATION_RATE};
use crate::plan::{PlanId, Queue};
use crate::random::stream_rng;
use crate::stockpile::{AppliedDistribution, StockpileNetwork};
use crate::transition::{Compartment, CompartmentVariables, TransitionType};
use crate::{debug, trace};

pub const AGE_DIMENSION: usize = 0;
pub const RISK_DIMENSION: usize = 1;
pub const VACCINATION_DIMENSION: usize = 2;
/// Value of the vaccination dimension for vaccinated individuals
pub const VACCINATED: usize = 1;

define_rng!(EventRng);
define_rng!(TravelRng);
define_rng!(NpiRng);

struct NodeState {
    queue: Queue<StochasticEvent, ()>,
    event_rng: SmallRng,
    travel_rng: SmallRng,
    npi_rng: SmallRng,
}

impl NodeState {
    fn new(base_seed: u64, node_id: NodeId) -> Self {
        let key = u64::from(node_id);
        NodeState {
            queue: Queue::new(),
            event_rng: stream_rng::<EventRng>(base_seed, key),
            travel_rng: stream_rng::<TravelRng>(base_seed, key),
            npi_rng: stream_rng::<NpiRng>(base_seed, key),
        }
    }
}

struct ScheduleRecord {
    node: usize,
    cell: usize,
    state: Compartment,
    plans: Vec<PlanId>,
}

/// Populations at the latest timestep, refreshed whenever it changes
#[derive(Default)]
struct PopulationCache {
    time: Option<usize>,
    node_totals: Vec<f64>,
    // [node][cell]
    cells: Vec<f64>,
}

/// What happened during one simulated day
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DayOutcome {
    /// Index of the timestep written by this day
    pub day: usize,
    pub events_fired: usize,
    pub contact_exposures: u64,
    pub travel_exposures: u64,
    pub treatments: Vec<TreatmentOutcome>,
    pub applied_distributions: Vec<AppliedDistribution>,
}

pub struct StochasticSeatird {
    dataset: StratifiedDataSet,
    compartments: CompartmentVariables,
    population: VariableId,
    stockpiles: StockpileNetwork,
    nodes: Vec<NodeState>,
    schedules: HashMap<ScheduleId, ScheduleRecord>,
    next_schedule: u64,
    // [node][cell], schedules currently in the treatable state
    treatable: Vec<IndexSet<ScheduleId>>,
    cache: PopulationCache,
    now: f64,
}

impl StochasticSeatird {
    /// Wraps a dataset in the disease model
    ///
    /// Missing compartment variables are created: `susceptible` as the
    /// population not already in another compartment, the rest empty. One
    /// empty stockpile is created per node and one per node group.
    ///
    /// # Errors
    /// Returns `SimError::ModelConfiguration` unless the dataset is stratified
    /// by age, risk, and a two-valued vaccination status.
    pub fn new(mut dataset: StratifiedDataSet, base_seed: u64) -> Result<Self, SimError> {
        let stratifications = dataset.stratifications();
        if stratifications.num_dimensions() != 3 {
            return Err(SimError::ModelConfiguration(format!(
                "the SEATIRD model needs 3 stratification dimensions, found {}",
                stratifications.num_dimensions()
            )));
        }
        if stratifications.dimension_len(VACCINATION_DIMENSION) != 2 {
            return Err(SimError::ModelConfiguration(
                "the vaccination dimension must have exactly two values".to_string(),
            ));
        }

        add_compartments(&mut dataset)?;
        let compartments = CompartmentVariables::resolve(&dataset)?;
        let population = dataset
            .variable_id("population")
            .ok_or_else(|| SimError::UnknownVariable("population".to_string()))?;
        if !dataset.has_variable("infected") {
            dataset.add_derived_variable(
                "infected",
                &[("asymptomatic", 1.0), ("treatable", 1.0), ("infectious", 1.0)],
            )?;
        }
        if !dataset.has_variable("hospitalized") {
            dataset.add_derived_variable(
                "hospitalized",
                &[
                    ("treatable", HOSPITALIZATION_RATE),
                    ("infectious", HOSPITALIZATION_RATE),
                ],
            )?;
        }

        let mut stockpiles = StockpileNetwork::new(dataset.num_times());
        for node_id in dataset.node_ids() {
            let name = dataset
                .node_name(*node_id)
                .map_or_else(|| node_id.to_string(), str::to_string);
            stockpiles.add_stockpile(&name, vec![*node_id], 0);
            let population =
                dataset.population(NodeSelection::Node(*node_id), &StratificationFilter::all());
            stockpiles.set_node_population(*node_id, population);
        }
        for group in dataset.group_names() {
            let members = dataset.group_node_ids(group).unwrap_or_default().to_vec();
            stockpiles.add_stockpile(group, members, 0);
        }

        let nodes = dataset
            .node_ids()
            .iter()
            .map(|node_id| NodeState::new(base_seed, *node_id))
            .collect();
        let treatable = vec![IndexSet::new(); dataset.num_nodes() * dataset.num_cells()];
        let now = dataset.latest_time() as f64;
        debug!(
            "SEATIRD model over {} nodes and {} cells starting at day {now}",
            dataset.num_nodes(),
            dataset.num_cells()
        );

        Ok(StochasticSeatird {
            dataset,
            compartments,
            population,
            stockpiles,
            nodes,
            schedules: HashMap::default(),
            next_schedule: 0,
            treatable,
            cache: PopulationCache::default(),
            now,
        })
    }

    #[must_use]
    pub fn dataset(&self) -> &StratifiedDataSet {
        &self.dataset
    }

    #[must_use]
    pub fn stockpiles(&self) -> &StockpileNetwork {
        &self.stockpiles
    }

    pub fn stockpiles_mut(&mut self) -> &mut StockpileNetwork {
        &mut self.stockpiles
    }

    /// Simulated time in days
    #[must_use]
    pub fn now(&self) -> f64 {
        self.now
    }

    /// Exposures whose individual has not yet recovered, died, or been treated
    #[must_use]
    pub fn active_schedules(&self) -> usize {
        self.schedules.len()
    }

    /// Number of queued events at a node
    #[must_use]
    pub fn pending_events(&self, node_id: NodeId) -> usize {
        self.dataset
            .node_index(node_id)
            .map_or(0, |node| self.nodes[node].queue.len())
    }

    /// Exposes up to `count` susceptibles in one cell before the first day
    ///
    /// Returns the number actually exposed, which is clamped to the
    /// susceptibles available.
    ///
    /// # Errors
    /// Returns `SimError::SimulationStarted` once a day has been simulated,
    /// or a lookup or configuration error for the node, key, or parameters.
    pub fn expose(
        &mut self,
        parameters: &ParametersValues,
        count: u64,
        node_id: NodeId,
        key: &[usize],
    ) -> Result<u64, SimError> {
        if self.dataset.num_times() != 1 {
            return Err(SimError::SimulationStarted);
        }
        self.check_parameters(parameters)?;
        let node = self
            .dataset
            .node_index(node_id)
            .ok_or(SimError::UnknownNode(node_id))?;
        let cell = self.dataset.stratifications().cell_index(key)?;
        self.precompute();
        let exposed = self.expose_cell(parameters, node, cell, count, self.now);
        if exposed < count {
            debug!("exposure of {count} in node {node_id} clamped to {exposed}");
        }
        Ok(exposed)
    }

    /// Advances the model by one day
    ///
    /// # Errors
    /// Returns `SimError` if the parameters do not fit the dataset.
    pub fn simulate(&mut self, parameters: &ParametersValues) -> Result<DayOutcome, SimError> {
        self.check_parameters(parameters)?;
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let day = self.now.floor() as usize;

        self.dataset.advance_time();
        let latest = self.dataset.latest_time();
        let applied_distributions = self.stockpiles.evolve(latest);
        self.precompute();
        let treatments = self.apply_treatments(parameters)?;

        let mut outcome = DayOutcome {
            day: latest,
            treatments,
            applied_distributions,
            ..DayOutcome::default()
        };
        for node in 0..self.nodes.len() {
            let (fired, exposures) = self.process_node(parameters, node, day);
            outcome.events_fired += fired;
            outcome.contact_exposures += exposures;
        }
        outcome.travel_exposures = self.travel(parameters);
        self.now += 1.0;

        debug!(
            "day {day}: {} events, {} contact and {} travel exposures",
            outcome.events_fired, outcome.contact_exposures, outcome.travel_exposures
        );
        Ok(outcome)
    }

    fn check_parameters(&self, parameters: &ParametersValues) -> Result<(), SimError> {
        parameters.validate()?;
        parameters.check_age_groups(
            self.dataset
                .stratifications()
                .dimension_len(AGE_DIMENSION),
        )
    }

    fn precompute(&mut self) {
        let latest = self.dataset.latest_time();
        if self.cache.time == Some(latest) {
            return;
        }
        let num_nodes = self.dataset.num_nodes();
        self.cache.cells.clear();
        self.cache.node_totals.clear();
        for node in 0..num_nodes {
            let cells = self.dataset.latest_cells(self.population, node);
            self.cache.node_totals.push(cells.iter().sum());
            self.cache.cells.extend_from_slice(cells);
        }
        self.cache.time = Some(latest);
        trace!("population cache refreshed for timestep {latest}");
    }

    fn cached_population(&self, node: usize, cell: usize) -> f64 {
        self.cache.cells[node * self.dataset.num_cells() + cell]
    }

    fn latest(&self, compartment: Compartment, node: usize, cell: usize) -> f64 {
        self.dataset
            .latest_value(self.compartments.get(compartment), node, cell)
    }

    /// Moves up to `count` susceptibles to exposed and schedules their futures
    fn expose_cell(
        &mut self,
        parameters: &ParametersValues,
        node: usize,
        cell: usize,
        count: u64,
        now: f64,
    ) -> u64 {
        let available = whole(self.latest(Compartment::Susceptible, node, cell));
        let exposed = count.min(available);
        if exposed == 0 {
            return 0;
        }
        self.compartments.apply(
            &mut self.dataset,
            TransitionType::StoE,
            exposed as f64,
            node,
            cell,
        );
        for _ in 0..exposed {
            self.schedule_exposure(parameters, node, cell, now);
        }
        exposed
    }

    fn schedule_exposure(
        &mut self,
        parameters: &ParametersValues,
        node: usize,
        cell: usize,
        now: f64,
    ) {
        let age = self
            .dataset
            .stratifications()
            .value_of(cell, AGE_DIMENSION);
        let rates = DiseaseRates::for_age(parameters, age);
        let schedule = Schedule::sample(now, &rates, &mut self.nodes[node].event_rng);

        let id = ScheduleId(self.next_schedule);
        self.next_schedule += 1;

        let queue = &mut self.nodes[node].queue;
        let mut plans: Vec<PlanId> = schedule
            .transitions()
            .into_iter()
            .map(|step| {
                let event = StochasticEvent::transition(
                    id,
                    step.transition,
                    step.initialization_time,
                    step.time,
                    cell,
                );
                queue.add_plan(step.time, event, ())
            })
            .collect();
        self.queue_contacts(parameters, node, cell, id, &schedule, &mut plans);

        self.schedules.insert(
            id,
            ScheduleRecord {
                node,
                cell,
                state: Compartment::Exposed,
                plans,
            },
        );
    }

    /// Fires every event of one node that falls within the current day
    fn process_node(
        &mut self,
        parameters: &ParametersValues,
        node: usize,
        day: usize,
    ) -> (usize, u64) {
        let end = self.now + 1.0;
        let mut fired = 0;
        let mut exposures = 0;
        while let Some(plan) = self.nodes[node].queue.get_next_plan_before(end) {
            let event = plan.data;
            match event.kind {
                EventKind::Transition(transition) => self.fire_transition(node, transition, &event),
                EventKind::Contact => {
                    exposures += self.fire_contact(parameters, node, day, &event);
                }
            }
            fired += 1;
        }
        (fired, exposures)
    }

    fn fire_transition(
        &mut self,
        node: usize,
        transition: TransitionType,
        event: &StochasticEvent,
    ) {
        let cell = event.from_cell;
        self.compartments
            .apply(&mut self.dataset, transition, 1.0, node, cell);

        let slot = node * self.dataset.num_cells() + cell;
        if transition.source() == Compartment::Treatable {
            self.treatable[slot].shift_remove(&event.schedule);
        }
        if transition.destination() == Compartment::Treatable {
            self.treatable[slot].insert(event.schedule);
        }

        if transition.destination().is_terminal() {
            self.schedules.remove(&event.schedule);
        } else if let Some(record) = self.schedules.get_mut(&event.schedule) {
            record.state = transition.destination();
        }
    }

    /// Removes every pending event of a schedule
    fn cancel_schedule(&mut self, id: ScheduleId) {
        if let Some(record) = self.schedules.remove(&id) {
            let queue = &mut self.nodes[record.node].queue;
            for plan in &record.plans {
                queue.cancel_plan(plan);
            }
            trace!(
                "cancelled schedule {id:?} in cell {} while {}",
                record.cell,
                record.state
            );
        }
    }
}

/// Whole individuals in a possibly fractional count
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn whole(value: f64) -> u64 {
    if value <= 0.0 {
        0
    } else {
        value.floor() as u64
    }
}

fn add_compartments(dataset: &mut StratifiedDataSet) -> Result<(), SimError> {
    let mut susceptible = if dataset.has_variable(Compartment::Susceptible.variable_name()) {
        None
    } else {
        Some(
            dataset
                .variable_data("population")
                .ok_or_else(|| SimError::UnknownVariable("population".to_string()))?
                .to_vec(),
        )
    };
    for compartment in Compartment::iter().skip(1) {
        let name = compartment.variable_name();
        match dataset.variable_data(name) {
            Some(values) => {
                if let Some(susceptible) = susceptible.as_mut() {
                    for (remaining, present) in susceptible.iter_mut().zip(values) {
                        *remaining = (*remaining - present).max(0.0);
                    }
                }
            }
            None => {
                dataset.new_variable(name)?;
            }
        }
    }
    if let Some(susceptible) = susceptible {
        dataset.insert_variable(Compartment::Susceptible.variable_name(), susceptible)?;
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::float_cmp)]
mod tests {
    use super::*;
    use crate::dataset::Stratifications;

    pub(super) fn two_nodes(travel: Vec<f64>) -> StratifiedDataSet {
        let mut population = vec![40.0; 20];
        population[0] = 240.0;
        population.extend(vec![25.0; 20]);
        StratifiedDataSet::new(
            vec![1, 2],
            Stratifications::seatird_default(),
            population,
            travel,
        )
        .unwrap()
    }

    pub(super) fn quiet_parameters() -> ParametersValues {
        ParametersValues {
            r0: 0.0,
            mean_latency_period: 1000.0,
            ..ParametersValues::default()
        }
    }

    fn total(model: &StochasticSeatird, variable: &str, node: NodeId) -> f64 {
        let dataset = model.dataset();
        dataset.get_value(
            variable,
            dataset.latest_time(),
            NodeSelection::Node(node),
            &StratificationFilter::all(),
        )
    }

    #[test]
    fn creates_compartments_and_stockpiles() {
        let model = StochasticSeatird::new(two_nodes(vec![0.0; 4]), 1).unwrap();
        assert_eq!(total(&model, "susceptible", 1), 1000.0);
        assert_eq!(total(&model, "susceptible", 2), 500.0);
        assert_eq!(total(&model, "infected", 1), 0.0);
        assert_eq!(model.stockpiles().stockpiles().len(), 2);
        assert!(model.stockpiles().node_stockpile(2).is_some());
        // Unnamed nodes name their stockpiles by id
        assert_eq!(
            model.stockpiles().find_stockpile("2"),
            model.stockpiles().node_stockpile(2)
        );
        assert_eq!(model.stockpiles().find_stockpile(""), None);
        assert_eq!(model.stockpiles().node_population(2), 500.0);
    }

    fn fire(model: &mut StochasticSeatird, schedule: u64, transition: TransitionType) {
        let event = StochasticEvent::transition(ScheduleId(schedule), transition, 0.0, 0.5, 0);
        model.fire_transition(0, transition, &event);
    }

    #[test]
    fn treatment_takes_the_oldest_treatable_first() {
        let mut dataset = two_nodes(vec![0.0; 4]);
        let mut asymptomatic = vec![0.0; 40];
        asymptomatic[0] = 3.0;
        dataset.insert_variable("asymptomatic", asymptomatic).unwrap();
        let mut model = StochasticSeatird::new(dataset, 1).unwrap();

        for schedule in 0..3 {
            fire(&mut model, schedule, TransitionType::AtoT);
        }
        fire(&mut model, 0, TransitionType::TtoI);
        let waiting: Vec<ScheduleId> = model.treatable[0].iter().copied().collect();
        assert_eq!(waiting, vec![ScheduleId(1), ScheduleId(2)]);

        assert_eq!(model.treat_cell(0, 0, 1), 1);
        let waiting: Vec<ScheduleId> = model.treatable[0].iter().copied().collect();
        assert_eq!(waiting, vec![ScheduleId(2)]);
        assert_eq!(total(&model, "infectious", 1), 1.0);
        assert_eq!(total(&model, "recovered", 1), 1.0);
    }

    #[test]
    fn rejects_wrong_dimensionality() {
        let stratifications = Stratifications::new(vec![
            crate::dataset::StratificationDimension::new("age", &["young", "old"]),
        ])
        .unwrap();
        let dataset = StratifiedDataSet::new(vec![1], stratifications, vec![1.0, 1.0], vec![0.0])
            .unwrap();
        assert!(matches!(
            StochasticSeatird::new(dataset, 0),
            Err(SimError::ModelConfiguration(_))
        ));
    }

    #[test]
    fn expose_clamps_to_susceptibles() {
        let mut model = StochasticSeatird::new(two_nodes(vec![0.0; 4]), 1).unwrap();
        let parameters = quiet_parameters();
        let exposed = model.expose(&parameters, 100, 2, &[1, 0, 0]).unwrap();
        assert_eq!(exposed, 25);
        assert_eq!(total(&model, "exposed", 2), 25.0);
        assert_eq!(model.active_schedules(), 25);
        assert!(model.pending_events(2) >= 50);
    }

    #[test]
    fn expose_after_first_day_is_rejected() {
        let mut model = StochasticSeatird::new(two_nodes(vec![0.0; 4]), 1).unwrap();
        let parameters = quiet_parameters();
        model.simulate(&parameters).unwrap();
        assert!(matches!(
            model.expose(&parameters, 1, 1, &[0, 0, 0]),
            Err(SimError::SimulationStarted)
        ));
    }

    #[test]
    fn events_drain_to_terminal_states() {
        let mut model = StochasticSeatird::new(two_nodes(vec![0.0; 4]), 3).unwrap();
        let parameters = ParametersValues {
            r0: 0.0,
            ..ParametersValues::default()
        };
        model.expose(&parameters, 50, 1, &[0, 0, 0]).unwrap();
        for _ in 0..200 {
            model.simulate(&parameters).unwrap();
        }
        assert_eq!(model.active_schedules(), 0);
        assert_eq!(model.pending_events(1), 0);
        let finished = total(&model, "recovered", 1) + total(&model, "deceased", 1);
        assert_eq!(finished, 50.0);
        assert_eq!(total(&model, "susceptible", 1), 950.0);
    }

    #[test]
    fn preloaded_compartments_reduce_susceptibles() {
        let mut dataset = two_nodes(vec![0.0; 4]);
        let mut recovered = vec![0.0; 40];
        recovered[0] = 40.0;
        dataset.insert_variable("recovered", recovered).unwrap();
        let model = StochasticSeatird::new(dataset, 1).unwrap();
        assert_eq!(total(&model, "susceptible", 1), 960.0);
        assert_eq!(total(&model, "recovered", 1), 40.0);
    }
}
