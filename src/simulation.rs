//! Runs the disease model inside a `Context`.
//!
//! The model and its threshold monitor live in a data plugin. Each simulated
//! day is a plan at integer time; after the day completes the plugin emits
//! change notifications that reports and other modules subscribe to.
use std::collections::BTreeSet;

use crate::context::{Context, ModelEvent};
use crate::dataset::{NodeId, StratifiedDataSet};
use crate::define_data_plugin;
use crate::error::SimError;
use crate::event_monitor::{EventMonitor, GroupThreshold, ThresholdMessage};
use crate::parameters::ContextParametersExt;
use crate::random::ContextRandomExt;
use crate::seatird::{DayOutcome, StochasticSeatird};
use crate::stockpile::{AppliedDistribution, DistributionId, StockpileId, StockpileNetwork};
use crate::{error, info, trace};

/// Emitted after a day is appended to the dataset
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataSetAdvancedEvent {
    /// Index of the new latest timestep
    pub day: usize,
    pub num_times: usize,
}
impl ModelEvent for DataSetAdvancedEvent {}

/// Emitted when a stockpile's quantity changes on `time`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StockpileChangedEvent {
    pub stockpile: StockpileId,
    pub time: usize,
    pub quantity: u64,
}
impl ModelEvent for StockpileChangedEvent {}

/// Emitted for every transfer into a stockpile
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DistributionAppliedEvent {
    pub applied: AppliedDistribution,
}
impl ModelEvent for DistributionAppliedEvent {}

#[derive(Debug, Clone, PartialEq)]
pub struct ThresholdCrossedEvent {
    pub message: ThresholdMessage,
}
impl ModelEvent for ThresholdCrossedEvent {}

struct SimulationData {
    model: Option<StochasticSeatird>,
    monitor: EventMonitor,
}

define_data_plugin!(
    SimulationPlugin,
    SimulationData,
    SimulationData {
        model: None,
        monitor: EventMonitor::default(),
    }
);

fn not_initialized() -> SimError {
    SimError::ModelConfiguration("the simulation has not been initialized".to_string())
}

/// Notifications for every stockpile touched by distributions or treatment
fn stockpile_changes(
    stockpiles: &StockpileNetwork,
    time: usize,
    ids: impl IntoIterator<Item = StockpileId>,
) -> Vec<StockpileChangedEvent> {
    let ids: BTreeSet<StockpileId> = ids.into_iter().collect();
    ids.into_iter()
        .filter_map(|stockpile| {
            let quantity = stockpiles.quantity(stockpile, time).ok()?;
            Some(StockpileChangedEvent {
                stockpile,
                time,
                quantity,
            })
        })
        .collect()
}

fn touched_by(applied: &[AppliedDistribution]) -> impl Iterator<Item = StockpileId> + '_ {
    applied
        .iter()
        .flat_map(|applied| [Some(applied.destination), applied.source])
        .flatten()
}

pub trait ContextSimulationExt {
    /// Wraps `dataset` in the disease model, seeded from the base seed
    ///
    /// Threshold alerts are installed for every node group.
    ///
    /// # Errors
    /// Returns `SimError::ModelConfiguration` if the dataset does not fit the model.
    ///
    /// # Panics
    /// Panics if `init_random` was not called first.
    fn init_simulation(&mut self, dataset: StratifiedDataSet) -> Result<(), SimError>;

    fn get_model(&self) -> Option<&StochasticSeatird>;

    fn get_dataset(&self) -> Option<&StratifiedDataSet>;

    fn get_stockpiles(&self) -> Option<&StockpileNetwork>;

    fn add_threshold_rule(&mut self, rule: GroupThreshold);

    /// Seeds `count` exposures in one cell of one node with the current parameters
    ///
    /// # Errors
    /// Returns `SimError::SimulationStarted` after the first day, or a lookup error.
    fn expose(&mut self, count: u64, node_id: NodeId, key: &[usize]) -> Result<u64, SimError>;

    /// Simulates one day with the current parameters and emits its notifications
    ///
    /// # Errors
    /// Returns `SimError` if the simulation is not initialized or the
    /// parameters do not fit the dataset.
    fn simulate_day(&mut self) -> Result<DayOutcome, SimError>;

    /// Schedules a distribution created on the latest day
    ///
    /// # Errors
    /// Returns `SimError::UnknownStockpile` or `SimError::InvalidParameter`
    /// for a bad source or destination.
    fn distribute(
        &mut self,
        source: Option<StockpileId>,
        destination: Option<StockpileId>,
        target_node_ids: Vec<NodeId>,
        quantity: u64,
        transfer_delay: usize,
    ) -> Result<DistributionId, SimError>;

    /// Sets a stockpile's quantity on the latest day
    ///
    /// # Errors
    /// Returns `SimError::UnknownStockpile` for an unknown stockpile.
    fn set_stockpile_quantity(&mut self, stockpile: StockpileId, quantity: u64)
        -> Result<(), SimError>;

    /// Plans `days` daily steps starting at the current time
    ///
    /// A step that fails logs the error and shuts the context down.
    fn schedule_days(&mut self, days: usize);
}

impl ContextSimulationExt for Context {
    fn init_simulation(&mut self, dataset: StratifiedDataSet) -> Result<(), SimError> {
        let model = StochasticSeatird::new(dataset, self.get_base_seed())?;
        let monitor = EventMonitor::with_default_rules(model.dataset());
        info!(
            "simulation initialized with {} nodes and {} stockpiles",
            model.dataset().num_nodes(),
            model.stockpiles().stockpiles().len()
        );
        let data = self.get_data_mut(SimulationPlugin);
        data.model = Some(model);
        data.monitor = monitor;
        Ok(())
    }

    fn get_model(&self) -> Option<&StochasticSeatird> {
        self.get_data(SimulationPlugin)?.model.as_ref()
    }

    fn get_dataset(&self) -> Option<&StratifiedDataSet> {
        self.get_model().map(StochasticSeatird::dataset)
    }

    fn get_stockpiles(&self) -> Option<&StockpileNetwork> {
        self.get_model().map(StochasticSeatird::stockpiles)
    }

    fn add_threshold_rule(&mut self, rule: GroupThreshold) {
        self.get_data_mut(SimulationPlugin).monitor.add_rule(rule);
    }

    fn expose(&mut self, count: u64, node_id: NodeId, key: &[usize]) -> Result<u64, SimError> {
        let parameters = self.get_parameters();
        let model = self
            .get_data_mut(SimulationPlugin)
            .model
            .as_mut()
            .ok_or_else(not_initialized)?;
        let exposed = model.expose(&parameters, count, node_id, key)?;
        trace!("exposed {exposed} in node {node_id} cell {key:?}");
        Ok(exposed)
    }

    fn simulate_day(&mut self) -> Result<DayOutcome, SimError> {
        let parameters = self.get_parameters();
        let data = self.get_data_mut(SimulationPlugin);
        let model = data.model.as_mut().ok_or_else(not_initialized)?;
        let outcome = model.simulate(&parameters)?;
        let messages = data.monitor.check_for_events(model.dataset());

        let touched = touched_by(&outcome.applied_distributions)
            .chain(outcome.treatments.iter().map(|treatment| treatment.stockpile));
        let changes = stockpile_changes(model.stockpiles(), outcome.day, touched);
        let advanced = DataSetAdvancedEvent {
            day: outcome.day,
            num_times: model.dataset().num_times(),
        };

        self.emit_event(advanced);
        for applied in &outcome.applied_distributions {
            self.emit_event(DistributionAppliedEvent { applied: *applied });
        }
        for change in changes {
            self.emit_event(change);
        }
        for message in messages {
            info!("{}", message.text);
            self.emit_event(ThresholdCrossedEvent { message });
        }
        Ok(outcome)
    }

    fn distribute(
        &mut self,
        source: Option<StockpileId>,
        destination: Option<StockpileId>,
        target_node_ids: Vec<NodeId>,
        quantity: u64,
        transfer_delay: usize,
    ) -> Result<DistributionId, SimError> {
        let model = self
            .get_data_mut(SimulationPlugin)
            .model
            .as_mut()
            .ok_or_else(not_initialized)?;
        let stockpiles = model.stockpiles_mut();
        let (id, applied) = stockpiles.add_distribution(
            source,
            destination,
            target_node_ids,
            quantity,
            transfer_delay,
        )?;
        let changes = stockpile_changes(stockpiles, stockpiles.latest_time(), touched_by(&applied));

        for applied in applied {
            self.emit_event(DistributionAppliedEvent { applied });
        }
        for change in changes {
            self.emit_event(change);
        }
        Ok(id)
    }

    fn set_stockpile_quantity(
        &mut self,
        stockpile: StockpileId,
        quantity: u64,
    ) -> Result<(), SimError> {
        let model = self
            .get_data_mut(SimulationPlugin)
            .model
            .as_mut()
            .ok_or_else(not_initialized)?;
        let stockpiles = model.stockpiles_mut();
        let time = stockpiles.latest_time();
        stockpiles.set_quantity(stockpile, time, quantity)?;
        self.emit_event(StockpileChangedEvent {
            stockpile,
            time,
            quantity,
        });
        Ok(())
    }

    fn schedule_days(&mut self, days: usize) {
        let start = self.get_current_time();
        for offset in 0..days {
            #[allow(clippy::cast_precision_loss)]
            let time = start + offset as f64;
            self.add_plan(time, |context| {
                if let Err(e) = context.simulate_day() {
                    error!("simulation stopped: {e}");
                    context.shutdown();
                }
            });
        }
    }
}

#[cfg(test)]
#[allow(clippy::float_cmp)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;
    use crate::dataset::{NodeSelection, StratificationFilter, Stratifications};
    use crate::parameters::ParametersValues;

    fn two_counties() -> StratifiedDataSet {
        let mut population = vec![50.0; 20];
        population.extend(vec![25.0; 20]);
        let mut dataset = StratifiedDataSet::new(
            vec![48453, 48209],
            Stratifications::seatird_default(),
            population,
            vec![0.0; 4],
        )
        .unwrap();
        dataset.set_node_metadata(48453, "Travis", Some("Central")).unwrap();
        dataset.set_node_metadata(48209, "Hays", Some("Central")).unwrap();
        dataset
    }

    fn context() -> Context {
        let mut context = Context::new();
        context.init_random(8);
        context
            .set_parameters(ParametersValues {
                r0: 0.0,
                mean_latency_period: 1000.0,
                ..ParametersValues::default()
            })
            .unwrap();
        context.init_simulation(two_counties()).unwrap();
        context
    }

    #[test]
    fn uninitialized_simulation_is_an_error() {
        let mut context = Context::new();
        assert!(matches!(
            context.simulate_day(),
            Err(SimError::ModelConfiguration(_))
        ));
        assert!(context.get_dataset().is_none());
    }

    #[test]
    fn scheduled_days_advance_the_dataset() {
        let mut context = context();
        let days = Rc::new(RefCell::new(Vec::new()));
        let days_clone = Rc::clone(&days);
        context.subscribe_to_event(move |_, event: DataSetAdvancedEvent| {
            days_clone.borrow_mut().push((event.day, event.num_times));
        });
        context.schedule_days(3);
        context.execute();
        assert_eq!(*days.borrow(), vec![(1, 2), (2, 3), (3, 4)]);
        assert_eq!(context.get_current_time(), 2.0);
        assert_eq!(context.get_dataset().unwrap().num_times(), 4);
    }

    #[test]
    fn exposures_only_before_the_first_day() {
        let mut context = context();
        assert_eq!(context.expose(10, 48209, &[1, 0, 0]).unwrap(), 10);
        context.simulate_day().unwrap();
        assert!(matches!(
            context.expose(10, 48209, &[1, 0, 0]),
            Err(SimError::SimulationStarted)
        ));
        let dataset = context.get_dataset().unwrap();
        assert_eq!(
            dataset.get_value(
                "susceptible",
                dataset.latest_time(),
                NodeSelection::Node(48209),
                &StratificationFilter::all()
            ),
            490.0
        );
    }

    #[test]
    fn distributions_notify_subscribers() {
        let mut context = context();
        let changes = Rc::new(RefCell::new(Vec::new()));
        let applied = Rc::new(RefCell::new(Vec::new()));
        let changes_clone = Rc::clone(&changes);
        let applied_clone = Rc::clone(&applied);
        context.subscribe_to_event(move |_, event: StockpileChangedEvent| {
            changes_clone.borrow_mut().push((event.stockpile, event.time, event.quantity));
        });
        context.subscribe_to_event(move |_, event: DistributionAppliedEvent| {
            applied_clone.borrow_mut().push(event.applied.quantity);
        });

        let stockpiles = context.get_stockpiles().unwrap();
        let central = stockpiles.find_stockpile("Central").unwrap();
        let travis = stockpiles.node_stockpile(48453).unwrap();
        context.set_stockpile_quantity(central, 1000).unwrap();
        context.distribute(Some(central), Some(travis), vec![], 200, 2).unwrap();
        context.add_plan(0.0, |context| {
            context.simulate_day().unwrap();
            context.simulate_day().unwrap();
        });
        context.execute();

        assert_eq!(*applied.borrow(), vec![200]);
        assert_eq!(
            *changes.borrow(),
            vec![
                (central, 0, 1000),
                (travis, 2, 200),
                (central, 2, 800),
            ]
        );
    }

    #[test]
    fn threshold_alerts_are_emitted() {
        let mut context = context();
        let alerts = Rc::new(RefCell::new(Vec::new()));
        let alerts_clone = Rc::clone(&alerts);
        context.subscribe_to_event(move |_, event: ThresholdCrossedEvent| {
            alerts_clone.borrow_mut().push(event.message.threshold);
        });
        context
            .set_parameters(ParametersValues {
                r0: 0.0,
                mean_latency_period: 0.001,
                mean_asymptomatic_period: 1000.0,
                mean_infectious_period: 1000.0,
                ..ParametersValues::default()
            })
            .unwrap();
        // 1500 people in Central; 0.5% is 7.5
        context.expose(8, 48453, &[0, 0, 0]).unwrap();
        context.schedule_days(1);
        context.execute();
        assert_eq!(*alerts.borrow(), vec![0.005]);
    }
}
