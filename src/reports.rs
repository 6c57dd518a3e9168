//! CSV reports of a run: daily variable values per node, stockpile
//! quantities, and threshold alerts.
use serde::Serialize;

use crate::context::Context;
use crate::dataset::{NodeId, NodeSelection, StratificationFilter};
use crate::define_report;
use crate::error::SimError;
use crate::report::ContextReportExt;
use crate::simulation::{
    ContextSimulationExt, DataSetAdvancedEvent, StockpileChangedEvent, ThresholdCrossedEvent,
};
use crate::{error, trace};

#[derive(Serialize)]
pub struct DailyVariableReportItem {
    pub day: usize,
    pub node_id: NodeId,
    pub variable: String,
    pub value: f64,
}
define_report!(DailyVariableReportItem);

#[derive(Serialize)]
pub struct StockpileReportItem {
    pub day: usize,
    pub stockpile: String,
    pub quantity: u64,
}
define_report!(StockpileReportItem);

#[derive(Serialize)]
pub struct AlertReportItem {
    pub day: usize,
    pub group: String,
    pub variable: String,
    pub value: f64,
    pub threshold: f64,
    pub text: String,
}
define_report!(AlertReportItem);

fn send_variables(context: &Context, variables: &[String], day: usize) {
    let Some(dataset) = context.get_dataset() else {
        error!("variable report requested before the simulation was initialized");
        return;
    };
    let all = StratificationFilter::all();
    for variable in variables {
        for node_id in dataset.node_ids() {
            let node = NodeSelection::Node(*node_id);
            let value = match dataset.try_get_value(variable, day, node, &all) {
                Ok(value) => value,
                Err(e) => {
                    error!("variable report: {e}");
                    return;
                }
            };
            context.send_report(DailyVariableReportItem {
                day,
                node_id: *node_id,
                variable: variable.clone(),
                value,
            });
        }
    }
}

/// Writes each variable per node for the current day and every day after
///
/// # Errors
/// Returns `SimError` if the report file cannot be opened.
pub fn init_variable_report(context: &mut Context, variables: &[String]) -> Result<(), SimError> {
    trace!("initializing variable report for {variables:?}");
    context.add_report::<DailyVariableReportItem>("daily_variables")?;
    if let Some(dataset) = context.get_dataset() {
        send_variables(context, variables, dataset.latest_time());
    }
    let variables = variables.to_vec();
    context.subscribe_to_event(move |context, event: DataSetAdvancedEvent| {
        send_variables(context, &variables, event.day);
    });
    Ok(())
}

/// Writes every stockpile's starting quantity and each later change
///
/// # Errors
/// Returns `SimError` if the report file cannot be opened.
pub fn init_stockpile_report(context: &mut Context) -> Result<(), SimError> {
    trace!("initializing stockpile report");
    context.add_report::<StockpileReportItem>("stockpiles")?;
    if let Some(stockpiles) = context.get_stockpiles() {
        let day = stockpiles.latest_time();
        for stockpile in stockpiles.stockpiles() {
            context.send_report(StockpileReportItem {
                day,
                stockpile: stockpile.name().to_string(),
                quantity: stockpile.latest_quantity(),
            });
        }
    }
    context.subscribe_to_event(|context, event: StockpileChangedEvent| {
        let Some(stockpile) = context
            .get_stockpiles()
            .and_then(|stockpiles| stockpiles.stockpile(event.stockpile))
        else {
            return;
        };
        context.send_report(StockpileReportItem {
            day: event.time,
            stockpile: stockpile.name().to_string(),
            quantity: event.quantity,
        });
    });
    Ok(())
}

/// # Errors
/// Returns `SimError` if the report file cannot be opened.
pub fn init_alert_report(context: &mut Context) -> Result<(), SimError> {
    trace!("initializing alert report");
    context.add_report::<AlertReportItem>("alerts")?;
    context.subscribe_to_event(|context, event: ThresholdCrossedEvent| {
        let message = event.message;
        context.send_report(AlertReportItem {
            day: message.day,
            group: message.group,
            variable: message.variable,
            value: message.value,
            threshold: message.threshold,
            text: message.text,
        });
    });
    Ok(())
}

/// Opens every report
///
/// # Errors
/// Returns `SimError` if a report file cannot be opened.
pub fn init(context: &mut Context, variables: &[String]) -> Result<(), SimError> {
    init_variable_report(context, variables)?;
    init_stockpile_report(context)?;
    init_alert_report(context)
}
