//! The stratified time-series store.
//!
//! A `StratifiedDataSet` holds every variable as a dense array indexed by
//! (time, node, stratification cell), together with node metadata and the
//! travel matrix. Only the latest timestep is ever written; earlier timesteps
//! are history.
mod loader;
mod stratification;

pub use loader::{load_dataset, load_node_metadata, parse_dataset};
pub use stratification::{StratificationDimension, StratificationFilter, Stratifications};

use indexmap::IndexMap;

use crate::error::SimError;
use crate::hashing::HashMap;
use crate::{error, trace};

/// A stable node identifier, typically a county FIPS code
pub type NodeId = u32;

/// Index of a stored variable in its dataset
pub type VariableId = usize;

/// Which nodes a query sums over
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeSelection<'a> {
    All,
    Node(NodeId),
    Group(&'a str),
}

/// A variable computed on demand as a linear combination of stored variables
#[derive(Debug, Clone, PartialEq)]
pub struct DerivedVariable {
    terms: Vec<(String, f64)>,
}

impl DerivedVariable {
    #[must_use]
    pub fn terms(&self) -> &[(String, f64)] {
        &self.terms
    }
}

#[derive(Debug, Clone)]
pub struct StratifiedDataSet {
    num_times: usize,
    node_ids: Vec<NodeId>,
    node_index: HashMap<NodeId, usize>,
    node_names: Vec<String>,
    node_groups: Vec<Option<String>>,
    groups: IndexMap<String, Vec<NodeId>>,
    stratifications: Stratifications,
    // [from][to], row-major
    travel: Vec<f64>,
    variables: IndexMap<String, Vec<f64>>,
    derived_variables: IndexMap<String, DerivedVariable>,
}

impl StratifiedDataSet {
    /// Creates a dataset with one timestep and a `population` variable
    ///
    /// `population` is laid out `[node][cell]` and `travel` `[from][to]`.
    ///
    /// # Errors
    /// Returns `SimError::DataSetError` if node ids repeat, an array has the
    /// wrong length, or a value is negative or not finite.
    pub fn new(
        node_ids: Vec<NodeId>,
        stratifications: Stratifications,
        population: Vec<f64>,
        travel: Vec<f64>,
    ) -> Result<Self, SimError> {
        Self::with_history(1, node_ids, stratifications, population, travel)
    }

    /// Creates a dataset whose `population` already spans `num_times` timesteps
    ///
    /// `population` is laid out `[time][node][cell]`.
    ///
    /// # Errors
    /// Returns `SimError::DataSetError` on the same conditions as [`StratifiedDataSet::new`].
    pub fn with_history(
        num_times: usize,
        node_ids: Vec<NodeId>,
        stratifications: Stratifications,
        population: Vec<f64>,
        travel: Vec<f64>,
    ) -> Result<Self, SimError> {
        if num_times == 0 {
            return Err(SimError::DataSetError(
                "a dataset needs at least one timestep".to_string(),
            ));
        }
        let num_nodes = node_ids.len();
        let mut node_index = HashMap::default();
        for (index, id) in node_ids.iter().enumerate() {
            if node_index.insert(*id, index).is_some() {
                return Err(SimError::DataSetError(format!("duplicate node id {id}")));
            }
        }
        if travel.len() != num_nodes * num_nodes {
            return Err(SimError::DataSetError(format!(
                "travel has {} values, expected {}",
                travel.len(),
                num_nodes * num_nodes
            )));
        }
        if travel.iter().any(|value| !value.is_finite() || *value < 0.0) {
            return Err(SimError::DataSetError(
                "travel fractions must be finite and non-negative".to_string(),
            ));
        }

        let mut dataset = StratifiedDataSet {
            num_times,
            node_names: node_ids.iter().map(ToString::to_string).collect(),
            node_groups: vec![None; num_nodes],
            node_ids,
            node_index,
            groups: IndexMap::new(),
            stratifications,
            travel,
            variables: IndexMap::new(),
            derived_variables: IndexMap::new(),
        };
        dataset.insert_variable("population", population)?;
        Ok(dataset)
    }

    /// Registers a stored variable from a `[time][node][cell]` array
    ///
    /// # Errors
    /// Returns `SimError::DataSetError` if the name is taken, the length is
    /// wrong, or a value is negative or not finite.
    pub fn insert_variable(
        &mut self,
        name: &str,
        values: Vec<f64>,
    ) -> Result<VariableId, SimError> {
        if self.has_variable(name) {
            return Err(SimError::DataSetError(format!(
                "variable {name} already exists"
            )));
        }
        let expected = self.num_times * self.values_per_time();
        if values.len() != expected {
            return Err(SimError::DataSetError(format!(
                "variable {name} has {} values, expected {expected}",
                values.len()
            )));
        }
        if values.iter().any(|value| !value.is_finite() || *value < 0.0) {
            return Err(SimError::DataSetError(format!(
                "variable {name} has negative or non-finite values"
            )));
        }
        let (id, _) = self.variables.insert_full(name.to_string(), values);
        Ok(id)
    }

    /// Creates a zero-filled stored variable spanning every timestep
    ///
    /// # Errors
    /// Returns `SimError::DataSetError` if the name is taken.
    pub fn new_variable(&mut self, name: &str) -> Result<VariableId, SimError> {
        let zeros = vec![0.0; self.num_times * self.values_per_time()];
        self.insert_variable(name, zeros)
    }

    /// Creates `destination` as a copy of `source` over every timestep
    ///
    /// # Errors
    /// Returns `SimError::UnknownVariable` if `source` does not exist, or
    /// `SimError::DataSetError` if `destination` is taken.
    pub fn copy_variable(
        &mut self,
        source: &str,
        destination: &str,
    ) -> Result<VariableId, SimError> {
        let values = self
            .variables
            .get(source)
            .ok_or_else(|| SimError::UnknownVariable(source.to_string()))?
            .clone();
        self.insert_variable(destination, values)
    }

    /// Registers a derived variable as a linear combination of stored variables
    ///
    /// # Errors
    /// Returns `SimError::UnknownVariable` if a term is not a stored variable,
    /// or `SimError::DataSetError` if the name is taken.
    pub fn add_derived_variable(
        &mut self,
        name: &str,
        terms: &[(&str, f64)],
    ) -> Result<(), SimError> {
        if self.has_variable(name) {
            return Err(SimError::DataSetError(format!(
                "variable {name} already exists"
            )));
        }
        if let Some((missing, _)) = terms
            .iter()
            .find(|(term, _)| !self.variables.contains_key(*term))
        {
            return Err(SimError::UnknownVariable((*missing).to_string()));
        }
        self.derived_variables.insert(
            name.to_string(),
            DerivedVariable {
                terms: terms
                    .iter()
                    .map(|(term, weight)| ((*term).to_string(), *weight))
                    .collect(),
            },
        );
        Ok(())
    }

    /// Appends a timestep to every stored variable by copying the latest one
    pub fn advance_time(&mut self) {
        let names: Vec<String> = self.variables.keys().cloned().collect();
        for name in &names {
            self.copy_variable_to_new_time_step(name);
        }
        self.num_times += 1;
        trace!("dataset advanced to {} timesteps", self.num_times);
    }

    fn copy_variable_to_new_time_step(&mut self, name: &str) {
        let width = self.values_per_time();
        if let Some(values) = self.variables.get_mut(name) {
            let start = values.len() - width;
            values.extend_from_within(start..);
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

    #[must_use]
    pub fn num_nodes(&self) -> usize {
        self.node_ids.len()
    }

    #[must_use]
    pub fn num_cells(&self) -> usize {
        self.stratifications.num_cells()
    }

    #[must_use]
    pub fn stratifications(&self) -> &Stratifications {
        &self.stratifications
    }

    #[must_use]
    pub fn node_ids(&self) -> &[NodeId] {
        &self.node_ids
    }

    #[must_use]
    pub fn node_index(&self, node_id: NodeId) -> Option<usize> {
        self.node_index.get(&node_id).copied()
    }

    fn try_node_index(&self, node_id: NodeId) -> Result<usize, SimError> {
        self.node_index(node_id)
            .ok_or(SimError::UnknownNode(node_id))
    }

    /// The node's display name; its id as text if no name was attached
    #[must_use]
    pub fn node_name(&self, node_id: NodeId) -> Option<&str> {
        self.node_index(node_id)
            .map(|index| self.node_names[index].as_str())
    }

    #[must_use]
    pub fn node_group(&self, node_id: NodeId) -> Option<&str> {
        self.node_index(node_id)
            .and_then(|index| self.node_groups[index].as_deref())
    }

    /// Attaches a name and an optional group to a node
    ///
    /// # Errors
    /// Returns `SimError::UnknownNode` if the node does not exist.
    pub fn set_node_metadata(
        &mut self,
        node_id: NodeId,
        name: &str,
        group: Option<&str>,
    ) -> Result<(), SimError> {
        let index = self.try_node_index(node_id)?;
        self.node_names[index] = name.to_string();

        if let Some(previous) = self.node_groups[index].take() {
            if let Some(members) = self.groups.get_mut(&previous) {
                members.retain(|member| *member != node_id);
            }
        }
        if let Some(group) = group {
            self.groups
                .entry(group.to_string())
                .or_default()
                .push(node_id);
            self.node_groups[index] = Some(group.to_string());
        }
        Ok(())
    }

    /// Group names in the order they were first seen
    #[must_use]
    pub fn group_names(&self) -> Vec<&str> {
        self.groups.keys().map(String::as_str).collect()
    }

    #[must_use]
    pub fn group_node_ids(&self, group: &str) -> Option<&[NodeId]> {
        self.groups.get(group).map(Vec::as_slice)
    }

    /// Fraction of `from`'s population with contact exposure to `to`
    #[must_use]
    pub fn travel(&self, from: NodeId, to: NodeId) -> f64 {
        match (self.node_index(from), self.node_index(to)) {
            (Some(from), Some(to)) => self.travel_by_index(from, to),
            _ => {
                error!("travel lookup for unknown node pair ({from}, {to})");
                0.0
            }
        }
    }

    #[must_use]
    pub fn travel_by_index(&self, from: usize, to: usize) -> f64 {
        self.travel[from * self.node_ids.len() + to]
    }

    /// Stored variable names in registration order
    #[must_use]
    pub fn variable_names(&self) -> Vec<&str> {
        self.variables.keys().map(String::as_str).collect()
    }

    #[must_use]
    pub fn derived_variable_names(&self) -> Vec<&str> {
        self.derived_variables.keys().map(String::as_str).collect()
    }

    #[must_use]
    pub fn has_variable(&self, name: &str) -> bool {
        self.variables.contains_key(name) || self.derived_variables.contains_key(name)
    }

    #[must_use]
    pub fn variable_id(&self, name: &str) -> Option<VariableId> {
        self.variables.get_index_of(name)
    }

    /// The raw `[time][node][cell]` array of a stored variable
    #[must_use]
    pub fn variable_data(&self, name: &str) -> Option<&[f64]> {
        self.variables.get(name).map(Vec::as_slice)
    }

    /// Sum of `variable` over the selected nodes and cells
    ///
    /// Lookup failures are logged and yield 0; use [`StratifiedDataSet::try_get_value`]
    /// to receive the error instead.
    #[must_use]
    pub fn get_value(
        &self,
        variable: &str,
        time: usize,
        nodes: NodeSelection,
        filter: &StratificationFilter,
    ) -> f64 {
        self.try_get_value(variable, time, nodes, filter)
            .unwrap_or_else(|e| {
                error!("get_value({variable}, {time}, {nodes:?}, {filter:?}): {e}");
                0.0
            })
    }

    /// Sum of `variable` over the selected nodes and cells
    ///
    /// # Errors
    /// Returns `SimError` if the variable, node, group or time is unknown, or
    /// the filter does not fit the stratifications.
    pub fn try_get_value(
        &self,
        variable: &str,
        time: usize,
        nodes: NodeSelection,
        filter: &StratificationFilter,
    ) -> Result<f64, SimError> {
        if time >= self.num_times {
            return Err(SimError::TimeOutOfRange {
                time,
                num_times: self.num_times,
            });
        }
        let node_indices = self.select_nodes(nodes)?;
        let cells = self.stratifications.matching_cells(filter)?;

        if let Some(values) = self.variables.get(variable) {
            return Ok(self.sum(values, time, &node_indices, &cells));
        }
        if let Some(derived) = self.derived_variables.get(variable) {
            let mut total = 0.0;
            for (term, weight) in &derived.terms {
                let values = &self.variables[term.as_str()];
                total += weight * self.sum(values, time, &node_indices, &cells);
            }
            return Ok(total);
        }
        Err(SimError::UnknownVariable(variable.to_string()))
    }

    /// Total population of the selected nodes and cells at the latest timestep
    #[must_use]
    pub fn population(&self, nodes: NodeSelection, filter: &StratificationFilter) -> f64 {
        self.get_value("population", self.latest_time(), nodes, filter)
    }

    fn select_nodes(&self, nodes: NodeSelection) -> Result<Vec<usize>, SimError> {
        match nodes {
            NodeSelection::All => Ok((0..self.node_ids.len()).collect()),
            NodeSelection::Node(node_id) => Ok(vec![self.try_node_index(node_id)?]),
            NodeSelection::Group(group) => {
                let members = self
                    .group_node_ids(group)
                    .ok_or_else(|| SimError::UnknownGroup(group.to_string()))?;
                members.iter().map(|id| self.try_node_index(*id)).collect()
            }
        }
    }

    fn sum(&self, values: &[f64], time: usize, node_indices: &[usize], cells: &[usize]) -> f64 {
        let mut total = 0.0;
        for node in node_indices {
            let offset = self.offset(time, *node);
            total += cells.iter().map(|cell| values[offset + cell]).sum::<f64>();
        }
        total
    }

    fn values_per_time(&self) -> usize {
        self.node_ids.len() * self.stratifications.num_cells()
    }

    fn offset(&self, time: usize, node: usize) -> usize {
        (time * self.node_ids.len() + node) * self.stratifications.num_cells()
    }

    /// The cells of one node at the latest timestep
    #[must_use]
    pub fn latest_cells(&self, variable: VariableId, node: usize) -> &[f64] {
        let offset = self.offset(self.latest_time(), node);
        let width = self.stratifications.num_cells();
        &self.variables[variable][offset..offset + width]
    }

    #[must_use]
    pub fn latest_value(&self, variable: VariableId, node: usize, cell: usize) -> f64 {
        self.latest_cells(variable, node)[cell]
    }

    /// Moves up to `quantity` from `source` to `destination` in one cell at the
    /// latest timestep and returns the amount moved
    ///
    /// The amount is clamped to what `source` holds, so a source never goes
    /// negative.
    pub fn transition_cell(
        &mut self,
        quantity: f64,
        source: VariableId,
        destination: VariableId,
        node: usize,
        cell: usize,
    ) -> f64 {
        let index = self.offset(self.latest_time(), node) + cell;
        let available = self.variables[source][index];
        let moved = quantity.min(available).max(0.0);
        self.variables[source][index] -= moved;
        self.variables[destination][index] += moved;
        moved
    }

    /// Moves up to `quantity` between two named variables for one node and key
    ///
    /// # Errors
    /// Returns `SimError` if either variable, the node, or the key is unknown.
    pub fn transition(
        &mut self,
        quantity: f64,
        source: &str,
        destination: &str,
        node_id: NodeId,
        key: &[usize],
    ) -> Result<f64, SimError> {
        let source = self
            .variable_id(source)
            .ok_or_else(|| SimError::UnknownVariable(source.to_string()))?;
        let destination = self
            .variable_id(destination)
            .ok_or_else(|| SimError::UnknownVariable(destination.to_string()))?;
        let node = self.try_node_index(node_id)?;
        let cell = self.stratifications.cell_index(key)?;
        Ok(self.transition_cell(quantity, source, destination, node, cell))
    }
}

#[cfg(test)]
#[allow(clippy::float_cmp)]
mod tests {
    use super::*;

    fn two_node_dataset() -> StratifiedDataSet {
        let stratifications = Stratifications::seatird_default();
        let mut population = vec![10.0; 20];
        population.extend(vec![5.0; 20]);
        StratifiedDataSet::new(
            vec![6001, 6003],
            stratifications,
            population,
            vec![0.0, 0.1, 0.2, 0.0],
        )
        .unwrap()
    }

    #[test]
    fn population_queries() {
        let dataset = two_node_dataset();
        let all = StratificationFilter::all();
        assert_eq!(dataset.population(NodeSelection::All, &all), 300.0);
        assert_eq!(dataset.population(NodeSelection::Node(6003), &all), 100.0);
        assert_eq!(
            dataset.population(NodeSelection::Node(6001), &StratificationFilter::all().with(0, 1)),
            40.0
        );
        assert_eq!(dataset.travel(6001, 6003), 0.1);
        assert_eq!(dataset.travel(6003, 6001), 0.2);
    }

    #[test]
    fn unknown_lookups_return_zero() {
        let dataset = two_node_dataset();
        let all = StratificationFilter::all();
        assert_eq!(dataset.get_value("bogus", 0, NodeSelection::All, &all), 0.0);
        assert_eq!(
            dataset.get_value("population", 3, NodeSelection::All, &all),
            0.0
        );
        assert_eq!(
            dataset.get_value("population", 0, NodeSelection::Node(1), &all),
            0.0
        );
        assert_eq!(
            dataset.get_value("population", 0, NodeSelection::Group("West"), &all),
            0.0
        );
        assert_eq!(dataset.travel(1, 6001), 0.0);
    }

    #[test]
    fn try_get_value_reports_errors() {
        let dataset = two_node_dataset();
        let all = StratificationFilter::all();
        assert!(matches!(
            dataset.try_get_value("bogus", 0, NodeSelection::All, &all),
            Err(SimError::UnknownVariable(_))
        ));
        assert!(matches!(
            dataset.try_get_value("population", 1, NodeSelection::All, &all),
            Err(SimError::TimeOutOfRange { time: 1, num_times: 1 })
        ));
        assert!(matches!(
            dataset.try_get_value("population", 0, NodeSelection::Node(7), &all),
            Err(SimError::UnknownNode(7))
        ));
    }

    #[test]
    fn duplicate_ids_rejected() {
        let result = StratifiedDataSet::new(
            vec![1, 1],
            Stratifications::seatird_default(),
            vec![0.0; 40],
            vec![0.0; 4],
        );
        assert!(matches!(result, Err(SimError::DataSetError(_))));
    }

    #[test]
    fn wrong_population_length_rejected() {
        let result = StratifiedDataSet::new(
            vec![1, 2],
            Stratifications::seatird_default(),
            vec![0.0; 39],
            vec![0.0; 4],
        );
        assert!(matches!(result, Err(SimError::DataSetError(_))));
    }

    #[test]
    fn transition_clamps_at_source() {
        let mut dataset = two_node_dataset();
        dataset.copy_variable("population", "susceptible").unwrap();
        dataset.new_variable("exposed").unwrap();

        let moved = dataset
            .transition(25.0, "susceptible", "exposed", 6001, &[0, 0, 0])
            .unwrap();
        assert_eq!(moved, 10.0);

        let cell = StratificationFilter::from_key(&[0, 0, 0]);
        let node = NodeSelection::Node(6001);
        assert_eq!(dataset.get_value("susceptible", 0, node, &cell), 0.0);
        assert_eq!(dataset.get_value("exposed", 0, node, &cell), 10.0);

        let moved = dataset
            .transition(3.0, "susceptible", "exposed", 6001, &[0, 0, 0])
            .unwrap();
        assert_eq!(moved, 0.0);
    }

    #[test]
    fn advance_time_copies_latest() {
        let mut dataset = two_node_dataset();
        dataset.copy_variable("population", "susceptible").unwrap();
        dataset.new_variable("exposed").unwrap();
        dataset
            .transition(4.0, "susceptible", "exposed", 6003, &[1, 1, 0])
            .unwrap();

        dataset.advance_time();
        assert_eq!(dataset.num_times(), 2);
        dataset
            .transition(1.0, "susceptible", "exposed", 6003, &[1, 1, 0])
            .unwrap();

        let all = StratificationFilter::all();
        let node = NodeSelection::Node(6003);
        assert_eq!(dataset.get_value("exposed", 0, node, &all), 4.0);
        assert_eq!(dataset.get_value("exposed", 1, node, &all), 5.0);
        assert_eq!(dataset.get_value("susceptible", 1, node, &all), 95.0);
        assert_eq!(dataset.get_value("population", 1, node, &all), 100.0);
    }

    #[test]
    fn derived_variables_sum_terms() {
        let mut dataset = two_node_dataset();
        dataset.copy_variable("population", "susceptible").unwrap();
        dataset.new_variable("exposed").unwrap();
        dataset
            .transition(6.0, "susceptible", "exposed", 6001, &[0, 0, 0])
            .unwrap();
        dataset
            .add_derived_variable("weighted", &[("exposed", 0.5), ("susceptible", 1.0)])
            .unwrap();

        let all = StratificationFilter::all();
        assert_eq!(
            dataset.get_value("weighted", 0, NodeSelection::Node(6001), &all),
            3.0 + 194.0
        );
        assert_eq!(dataset.derived_variable_names(), vec!["weighted"]);
        assert!(matches!(
            dataset.add_derived_variable("broken", &[("missing", 1.0)]),
            Err(SimError::UnknownVariable(_))
        ));
    }

    #[test]
    fn groups() {
        let mut dataset = two_node_dataset();
        dataset.set_node_metadata(6001, "Alameda", Some("Bay Area")).unwrap();
        dataset.set_node_metadata(6003, "Alpine", Some("Sierra")).unwrap();
        assert_eq!(dataset.group_names(), vec!["Bay Area", "Sierra"]);
        assert_eq!(dataset.node_name(6001), Some("Alameda"));
        assert_eq!(dataset.node_group(6003), Some("Sierra"));

        let all = StratificationFilter::all();
        assert_eq!(
            dataset.population(NodeSelection::Group("Sierra"), &all),
            100.0
        );

        dataset.set_node_metadata(6003, "Alpine", Some("Bay Area")).unwrap();
        assert_eq!(dataset.group_node_ids("Bay Area"), Some(&[6001, 6003][..]));
        assert_eq!(dataset.group_node_ids("Sierra"), Some(&[][..]));
        assert!(matches!(
            dataset.set_node_metadata(42, "Nowhere", None),
            Err(SimError::UnknownNode(42))
        ));
    }
}
