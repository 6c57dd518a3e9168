//! Disease, travel, and intervention parameters.
//!
//! `ParametersValues` is deserialized from a JSON config file (every field
//! has a default), validated, and stored in the `Context` as the `Parameters`
//! global property. The model reads a copy at the start of every day, so a
//! change made between days takes effect on the next `simulate()`.
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::context::{Context, ModelEvent};
use crate::define_global_property;
use crate::error::SimError;
use crate::global_properties::ContextGlobalPropertiesExt;
use crate::info;
use crate::npi::Npi;
use crate::priority_group::PriorityGroup;

/// Number of age groups in the default contact matrix
pub const NUM_AGE_GROUPS: usize = 5;

/// Share of treatable and infectious individuals who are hospitalized
pub const HOSPITALIZATION_RATE: f64 = 0.05;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ParametersValues {
    /// Basic reproduction number
    pub r0: f64,
    /// Divides R0 to give the per-contact transmission rate
    pub beta_scale: f64,
    /// Mean days from exposure to asymptomatic infection
    pub mean_latency_period: f64,
    /// Mean days from asymptomatic onset to becoming treatable
    pub mean_asymptomatic_period: f64,
    /// Fixed days an individual stays treatable before becoming infectious
    pub treatable_period: f64,
    /// Mean days from asymptomatic onset to recovery
    pub mean_infectious_period: f64,
    /// Case fatality ratio per age group
    pub case_fatality_rates: Vec<f64>,
    /// Daily contacts between age groups, `contact_matrix[a][b]`
    pub contact_matrix: Vec<Vec<f64>>,
    /// Relative susceptibility per age group
    pub susceptibility: Vec<f64>,
    /// Scales the contact rate between travelers and residents
    pub travel_contact_fraction: f64,
    /// Divides the travel contact rate per age group
    pub age_flow_reductions: Vec<f64>,
    pub antiviral_effectiveness: f64,
    pub antiviral_adherence: f64,
    /// Maximum share of a node's population treated per day
    pub antiviral_capacity: f64,
    /// Names of the priority groups that receive antivirals; empty means everyone
    pub antiviral_priority_groups: Vec<String>,
    pub vaccine_effectiveness: f64,
    pub priority_groups: Vec<PriorityGroup>,
    pub npis: Vec<Npi>,
}

impl Default for ParametersValues {
    fn default() -> Self {
        ParametersValues {
            r0: 1.2,
            beta_scale: 65.0,
            mean_latency_period: 1.2,
            mean_asymptomatic_period: 1.9,
            treatable_period: 1.0,
            mean_infectious_period: 4.1,
            case_fatality_rates: vec![0.0001; NUM_AGE_GROUPS],
            contact_matrix: vec![
                vec![45.1228487783, 8.7808312353, 11.7757947836, 6.10114751268, 4.02227175596],
                vec![8.7808312353, 41.2889143668, 13.3332813497, 7.847051289, 4.22656343551],
                vec![11.7757947836, 13.3332813497, 21.4270155984, 13.7392636644, 6.92483172729],
                vec![6.10114751268, 7.847051289, 13.7392636644, 18.0482119252, 9.45371062356],
                vec![4.02227175596, 4.22656343551, 6.92483172729, 9.45371062356, 14.0529294262],
            ],
            susceptibility: vec![1.00, 0.98, 0.94, 0.91, 0.66],
            travel_contact_fraction: 0.39,
            age_flow_reductions: vec![10.0, 2.0, 1.0, 1.0, 2.0],
            antiviral_effectiveness: 0.15,
            antiviral_adherence: 0.8,
            antiviral_capacity: 0.02,
            antiviral_priority_groups: Vec::new(),
            vaccine_effectiveness: 0.8,
            priority_groups: Vec::new(),
            npis: Vec::new(),
        }
    }
}

impl ParametersValues {
    /// Per-contact transmission rate
    #[must_use]
    pub fn beta(&self) -> f64 {
        self.r0 / self.beta_scale
    }

    /// Exposed to asymptomatic rate
    #[must_use]
    pub fn tau(&self) -> f64 {
        1.0 / self.mean_latency_period
    }

    /// Asymptomatic to treatable rate
    #[must_use]
    pub fn kappa(&self) -> f64 {
        1.0 / self.mean_asymptomatic_period
    }

    /// Recovery rate
    #[must_use]
    pub fn gamma(&self) -> f64 {
        1.0 / self.mean_infectious_period
    }

    /// Mortality rate for an age group, chosen so that the probability of dying
    /// before recovering equals the group's case fatality ratio
    #[must_use]
    pub fn nu(&self, age: usize) -> f64 {
        let cfr = self.case_fatality_rates.get(age).copied().unwrap_or(0.0);
        -self.gamma() * (1.0 - cfr).ln()
    }

    #[must_use]
    pub fn num_age_groups(&self) -> usize {
        self.susceptibility.len()
    }

    /// Checks that the age-indexed tables fit a dataset with `num_age_groups`
    ///
    /// # Errors
    /// Returns `SimError::ModelConfiguration` on a size mismatch.
    pub fn check_age_groups(&self, num_age_groups: usize) -> Result<(), SimError> {
        if self.num_age_groups() != num_age_groups {
            return Err(SimError::ModelConfiguration(format!(
                "parameters describe {} age groups but the dataset has {num_age_groups}",
                self.num_age_groups()
            )));
        }
        Ok(())
    }

    /// # Errors
    /// Returns `SimError::InvalidParameter` describing the first problem found.
    pub fn validate(&self) -> Result<(), SimError> {
        let num_age_groups = self.num_age_groups();
        if num_age_groups == 0 {
            return invalid("susceptibility must have one value per age group");
        }
        if self.r0 < 0.0 || !self.r0.is_finite() {
            return invalid("r0 must be finite and non-negative");
        }
        if self.beta_scale <= 0.0 || !self.beta_scale.is_finite() {
            return invalid("beta_scale must be positive");
        }
        for (name, value) in [
            ("mean_latency_period", self.mean_latency_period),
            ("mean_asymptomatic_period", self.mean_asymptomatic_period),
            ("mean_infectious_period", self.mean_infectious_period),
        ] {
            if value <= 0.0 || !value.is_finite() {
                return invalid(&format!("{name} must be positive and finite"));
            }
        }
        if self.treatable_period < 0.0 || !self.treatable_period.is_finite() {
            return invalid("treatable_period must be finite and non-negative");
        }
        if self.case_fatality_rates.len() != num_age_groups
            || self
                .case_fatality_rates
                .iter()
                .any(|value| !(0.0..1.0).contains(value))
        {
            return invalid("case_fatality_rates must have one value in [0, 1) per age group");
        }
        if self.contact_matrix.len() != num_age_groups
            || self.contact_matrix.iter().any(|row| {
                row.len() != num_age_groups || row.iter().any(|value| *value < 0.0)
            })
        {
            return invalid("contact_matrix must be a square non-negative matrix over age groups");
        }
        if self.susceptibility.iter().any(|value| *value < 0.0) {
            return invalid("susceptibility must be non-negative");
        }
        if self.age_flow_reductions.len() != num_age_groups
            || self.age_flow_reductions.iter().any(|value| *value <= 0.0)
        {
            return invalid("age_flow_reductions must have one positive value per age group");
        }
        if self.travel_contact_fraction < 0.0 {
            return invalid("travel_contact_fraction must be non-negative");
        }
        for (name, value) in [
            ("antiviral_effectiveness", self.antiviral_effectiveness),
            ("antiviral_adherence", self.antiviral_adherence),
            ("antiviral_capacity", self.antiviral_capacity),
            ("vaccine_effectiveness", self.vaccine_effectiveness),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return invalid(&format!("{name} must be within [0, 1]"));
            }
        }
        for name in &self.antiviral_priority_groups {
            if !self.priority_groups.iter().any(|group| &group.name == name) {
                return invalid(&format!("unknown antiviral priority group {name}"));
            }
        }
        for npi in &self.npis {
            npi.validate(num_age_groups)?;
        }
        Ok(())
    }
}

fn invalid(message: &str) -> Result<(), SimError> {
    Err(SimError::InvalidParameter(message.to_string()))
}

define_global_property!(Parameters, ParametersValues, ParametersValues::validate);

/// Emitted after the parameters stored in the `Context` are replaced
#[derive(Debug, Clone, PartialEq)]
pub struct ParametersChangedEvent {
    pub parameters: ParametersValues,
}
impl ModelEvent for ParametersChangedEvent {}

pub trait ContextParametersExt {
    /// The current parameters, or the defaults if none were set
    fn get_parameters(&self) -> ParametersValues;

    /// Validates and stores new parameters and emits `ParametersChangedEvent`
    ///
    /// # Errors
    /// Returns `SimError::InvalidParameter` and keeps the previous values if
    /// validation fails.
    fn set_parameters(&mut self, parameters: ParametersValues) -> Result<(), SimError>;

    /// Loads parameters from a JSON file
    ///
    /// # Errors
    /// Returns `SimError` if the file cannot be read, parsed, or validated.
    fn load_parameters(&mut self, path: &Path) -> Result<(), SimError>;
}

impl ContextParametersExt for Context {
    fn get_parameters(&self) -> ParametersValues {
        self.get_global_property_value(Parameters)
            .cloned()
            .unwrap_or_default()
    }

    fn set_parameters(&mut self, parameters: ParametersValues) -> Result<(), SimError> {
        self.set_global_property_value(Parameters, parameters.clone())?;
        self.emit_event(ParametersChangedEvent { parameters });
        Ok(())
    }

    fn load_parameters(&mut self, path: &Path) -> Result<(), SimError> {
        info!("loading parameters from {}", path.display());
        self.load_global_property(Parameters, path)?;
        let parameters = self.get_parameters();
        self.emit_event(ParametersChangedEvent { parameters });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::io::Write;
    use std::rc::Rc;

    use assert_approx_eq::assert_approx_eq;
    use tempfile::NamedTempFile;

    use super::*;

    #[test]
    fn defaults_are_valid() {
        let parameters = ParametersValues::default();
        parameters.validate().unwrap();
        assert_approx_eq!(parameters.beta(), 1.2 / 65.0);
        assert_approx_eq!(parameters.tau(), 1.0 / 1.2);
        assert_approx_eq!(parameters.gamma(), 1.0 / 4.1);
    }

    #[test]
    fn mortality_rate_matches_case_fatality() {
        let mut parameters = ParametersValues::default();
        parameters.case_fatality_rates = vec![0.5; NUM_AGE_GROUPS];
        assert_approx_eq!(parameters.nu(2), parameters.gamma() * std::f64::consts::LN_2);
        parameters.case_fatality_rates = vec![0.0; NUM_AGE_GROUPS];
        assert_approx_eq!(parameters.nu(0), 0.0);
    }

    #[test]
    fn rejects_bad_values() {
        let mut parameters = ParametersValues::default();
        parameters.mean_infectious_period = 0.0;
        assert!(matches!(
            parameters.validate(),
            Err(SimError::InvalidParameter(_))
        ));

        let mut parameters = ParametersValues::default();
        parameters.contact_matrix.pop();
        assert!(parameters.validate().is_err());

        let mut parameters = ParametersValues::default();
        parameters.antiviral_priority_groups = vec!["Nobody".to_string()];
        assert!(parameters.validate().is_err());
    }

    #[test]
    fn partial_config_uses_defaults() {
        let parameters: ParametersValues =
            serde_json::from_str(r#"{ "r0": 2.5, "mean_latency_period": 2.0 }"#).unwrap();
        assert_approx_eq!(parameters.r0, 2.5);
        assert_approx_eq!(parameters.tau(), 0.5);
        assert_approx_eq!(parameters.beta_scale, 65.0);
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let result = serde_json::from_str::<ParametersValues>(r#"{ "r_naught": 2.5 }"#);
        assert!(result.is_err());
    }

    #[test]
    fn context_round_trip_emits_event() {
        let mut context = Context::new();
        assert_eq!(context.get_parameters(), ParametersValues::default());

        let seen = Rc::new(RefCell::new(None));
        let seen_clone = Rc::clone(&seen);
        context.subscribe_to_event(move |_, event: ParametersChangedEvent| {
            *seen_clone.borrow_mut() = Some(event.parameters.r0);
        });

        let mut parameters = ParametersValues::default();
        parameters.r0 = 3.0;
        context.set_parameters(parameters).unwrap();
        context.execute();
        assert_eq!(*seen.borrow(), Some(3.0));
        assert_approx_eq!(context.get_parameters().r0, 3.0);
    }

    #[test]
    fn invalid_update_keeps_previous() {
        let mut context = Context::new();
        let mut parameters = ParametersValues::default();
        parameters.r0 = 2.0;
        context.set_parameters(parameters.clone()).unwrap();
        parameters.beta_scale = -1.0;
        assert!(context.set_parameters(parameters).is_err());
        assert_approx_eq!(context.get_parameters().r0, 2.0);
        assert_approx_eq!(context.get_parameters().beta_scale, 65.0);
    }

    #[test]
    fn load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, r#"{{ "r0": 1.8, "antiviral_capacity": 0.05 }}"#).unwrap();
        let mut context = Context::new();
        context.load_parameters(file.path()).unwrap();
        assert_approx_eq!(context.get_parameters().r0, 1.8);
        assert_approx_eq!(context.get_parameters().antiviral_capacity, 0.05);
    }
}
