//! Threshold alerts on node groups.
//!
//! After every simulated day the monitor compares each rule's variable,
//! summed over the group, with the rule's thresholds. Only the highest
//! threshold crossed is reported; it and every lower threshold are then
//! retired so each alert fires once.
use serde::Serialize;

use crate::dataset::{NodeSelection, StratificationFilter, StratifiedDataSet};
use crate::{debug, error};

const INFECTED_FRACTIONS: [f64; 4] = [0.0025, 0.005, 0.0075, 0.01];
const DECEASED_COUNTS: [f64; 9] = [1.0, 5.0, 10.0, 25.0, 50.0, 100.0, 250.0, 500.0, 1000.0];

#[derive(Debug, Clone, PartialEq)]
pub struct GroupThreshold {
    pub group: String,
    pub variable: String,
    /// Remaining thresholds, ascending
    pub thresholds: Vec<f64>,
    /// Thresholds are fractions of the group population rather than counts
    pub fractional: bool,
}

impl GroupThreshold {
    #[must_use]
    pub fn new(group: &str, variable: &str, thresholds: &[f64], fractional: bool) -> Self {
        let mut thresholds = thresholds.to_vec();
        thresholds.sort_by(f64::total_cmp);
        GroupThreshold {
            group: group.to_string(),
            variable: variable.to_string(),
            thresholds,
            fractional,
        }
    }

    /// Checks the latest timestep, retiring every threshold that was crossed
    pub fn check(&mut self, dataset: &StratifiedDataSet) -> Option<ThresholdMessage> {
        let day = dataset.latest_time();
        let nodes = NodeSelection::Group(&self.group);
        let all = StratificationFilter::all();
        let value = match dataset.try_get_value(&self.variable, day, nodes, &all) {
            Ok(value) => value,
            Err(e) => {
                error!("threshold rule on {} in {}: {e}", self.variable, self.group);
                return None;
            }
        };
        let population = dataset.get_value("population", day, nodes, &all);

        let crossed = self.thresholds.iter().rposition(|threshold| {
            if self.fractional {
                population > 0.0 && value >= threshold * population
            } else {
                value >= *threshold
            }
        })?;
        let threshold = self.thresholds[crossed];
        self.thresholds = self.thresholds.split_off(crossed + 1);

        let text = if self.fractional {
            format!(
                "Day {day}: {:.2}% ({} individuals) of {} are now {}.",
                value / population * 100.0,
                value.floor(),
                self.group,
                self.variable
            )
        } else {
            format!(
                "Day {day}: there are now {} {} individuals in {}.",
                value.floor(),
                self.variable,
                self.group
            )
        };
        Some(ThresholdMessage {
            day,
            group: self.group.clone(),
            variable: self.variable.clone(),
            value,
            threshold,
            text,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ThresholdMessage {
    pub day: usize,
    pub group: String,
    pub variable: String,
    pub value: f64,
    pub threshold: f64,
    pub text: String,
}

#[derive(Debug, Clone, Default)]
pub struct EventMonitor {
    rules: Vec<GroupThreshold>,
}

impl EventMonitor {
    #[must_use]
    pub fn new(rules: Vec<GroupThreshold>) -> Self {
        EventMonitor { rules }
    }

    /// Infected-fraction and deceased-count alerts for every group
    #[must_use]
    pub fn with_default_rules(dataset: &StratifiedDataSet) -> Self {
        let mut rules = Vec::new();
        for group in dataset.group_names() {
            rules.push(GroupThreshold::new(group, "infected", &INFECTED_FRACTIONS, true));
            rules.push(GroupThreshold::new(group, "deceased", &DECEASED_COUNTS, false));
        }
        EventMonitor { rules }
    }

    pub fn add_rule(&mut self, rule: GroupThreshold) {
        self.rules.push(rule);
    }

    #[must_use]
    pub fn rules(&self) -> &[GroupThreshold] {
        &self.rules
    }

    pub fn check_for_events(&mut self, dataset: &StratifiedDataSet) -> Vec<ThresholdMessage> {
        let messages: Vec<ThresholdMessage> = self
            .rules
            .iter_mut()
            .filter_map(|rule| rule.check(dataset))
            .collect();
        for message in &messages {
            debug!("detected event: {}", message.text);
        }
        messages
    }
}

#[cfg(test)]
#[allow(clippy::float_cmp)]
mod tests {
    use super::*;
    use crate::dataset::Stratifications;

    fn dataset() -> StratifiedDataSet {
        let mut dataset = StratifiedDataSet::new(
            vec![1, 2],
            Stratifications::seatird_default(),
            vec![50.0; 40],
            vec![0.0; 4],
        )
        .unwrap();
        dataset.set_node_metadata(1, "Travis", Some("Central")).unwrap();
        dataset.set_node_metadata(2, "Hays", Some("Central")).unwrap();
        dataset.copy_variable("population", "susceptible").unwrap();
        dataset.new_variable("deceased").unwrap();
        dataset.new_variable("asymptomatic").unwrap();
        dataset
            .add_derived_variable("infected", &[("asymptomatic", 1.0)])
            .unwrap();
        dataset
    }

    #[test]
    fn default_rules_per_group() {
        let monitor = EventMonitor::with_default_rules(&dataset());
        assert_eq!(monitor.rules().len(), 2);
        assert_eq!(monitor.rules()[1].thresholds.len(), 9);
    }

    #[test]
    fn highest_crossed_threshold_is_reported_once() {
        let mut dataset = dataset();
        let mut monitor = EventMonitor::with_default_rules(&dataset);
        assert!(monitor.check_for_events(&dataset).is_empty());

        dataset
            .transition(30.0, "susceptible", "deceased", 1, &[2, 0, 0])
            .unwrap();
        let messages = monitor.check_for_events(&dataset);
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].threshold, 25.0);
        assert_eq!(
            messages[0].text,
            "Day 0: there are now 30 deceased individuals in Central."
        );
        assert_eq!(monitor.rules()[1].thresholds, vec![50.0, 100.0, 250.0, 500.0, 1000.0]);
        assert!(monitor.check_for_events(&dataset).is_empty());
    }

    #[test]
    fn fractional_thresholds_scale_with_population() {
        let mut dataset = dataset();
        let mut monitor = EventMonitor::with_default_rules(&dataset);
        // 2000 people; 0.5% is 10
        dataset
            .transition(12.0, "susceptible", "asymptomatic", 2, &[0, 1, 1])
            .unwrap();
        let messages = monitor.check_for_events(&dataset);
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].threshold, 0.005);
        assert!(messages[0].text.starts_with("Day 0: 0.60% (12 individuals)"));
    }

    #[test]
    fn unknown_variable_never_fires() {
        let dataset = dataset();
        let mut monitor = EventMonitor::new(vec![GroupThreshold::new(
            "Central",
            "hospitalized",
            &[1.0],
            false,
        )]);
        assert!(monitor.check_for_events(&dataset).is_empty());
        assert_eq!(monitor.rules()[0].thresholds, vec![1.0]);
    }
}
