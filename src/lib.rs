//! A stochastic SEATIRD epidemic simulator over a network of nodes
//!
//! The population of each node (typically a county) is split into
//! stratification cells by age group, risk group, and vaccination status, and
//! each cell tracks how many people are susceptible, exposed, asymptomatic,
//! treatable, infectious, recovered, or deceased. Every exposure samples the
//! whole course of that person's infection up front; the resulting transitions
//! and contacts are drained day by day from a per-node event queue. Travel
//! between nodes spreads infection at the end of each day.
//!
//! Alongside the epidemic, a stockpile network tracks antiviral inventories
//! held by nodes and node groups and the scheduled transfers between them.
//! Node stockpiles supply daily antiviral treatment.
//!
//! The simulation is driven by a [`Context`], which provides
//! * Simulated time and a queue of timed plans (one plan per simulated day)
//! * Typed change notifications that modules subscribe to
//! * Data containers owned by each module
//! * Global properties such as the model [`parameters`]
//!
//! Most users start from the `pandemic-sim` binary or from
//! [`runner::run_with_custom_args`] with their own setup function:
//!
//! ```no_run
//! use pandemic_sim::prelude::*;
//! use pandemic_sim::dataset::load_dataset;
//! use std::path::Path;
//!
//! run_with_args(|context, _, _| {
//!     let dataset = load_dataset(Path::new("texas.json"))?;
//!     context.init_simulation(dataset)?;
//!     context.expose(100, 48453, &[2, 0, 0])?;
//!     context.schedule_days(60);
//!     Ok(())
//! })
//! .unwrap();
//! ```
pub mod context;
pub use context::{Context, ExecutionPhase, ModelEvent};

pub mod data_plugin;
pub mod dataset;

pub mod error;
pub use error::SimError;

pub mod event_monitor;
pub mod global_properties;
pub mod hashing;
pub mod initial_cases;
pub mod log;
pub mod npi;
pub mod parameters;
pub mod plan;
pub mod prelude;
pub mod priority_group;
pub mod random;
pub mod report;
pub mod reports;
pub mod runner;
pub mod seatird;
pub mod simulation;
pub mod stockpile;
pub mod transition;

// Re-exported for use in macros and by models.
pub use crate::log::{debug, error, info, trace, warn};
pub use csv;
pub use rand;
pub use rand_distr;
