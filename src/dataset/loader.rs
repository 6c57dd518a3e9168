//! Reading datasets and node metadata from disk.
//!
//! A dataset file is a JSON object:
//!
//! ```json
//! {
//!   "dimensions": { "time": 1, "node": 2, "stratification": 20 },
//!   "variables": [
//!     { "name": "ids", "dimensions": ["node"], "type": "int", "data": [6001, 6003] },
//!     { "name": "population", "dimensions": ["time", "node", "stratification"], "data": [ ... ] },
//!     { "name": "travel", "dimensions": ["node", "node"], "data": [ ... ] }
//!   ]
//! }
//! ```
//!
//! An optional `stratifications` array of `{ "name", "values" }` replaces the
//! default age × risk × vaccination layout. Every other float variable shaped
//! `[time, node, stratification]` is registered as a stored variable.
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use serde::Deserialize;

use crate::dataset::{NodeId, StratificationDimension, Stratifications, StratifiedDataSet};
use crate::error::SimError;
use crate::hashing::HashMap;
use crate::{debug, info, warn};

const TIME: &str = "time";
const NODE: &str = "node";
const STRATIFICATION: &str = "stratification";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
enum ValueType {
    #[default]
    Float,
    Int,
}

#[derive(Debug, Deserialize)]
struct VariableRecord {
    name: String,
    dimensions: Vec<String>,
    #[serde(default, rename = "type")]
    value_type: ValueType,
    data: Vec<f64>,
}

#[derive(Debug, Deserialize)]
struct DataSetFile {
    dimensions: HashMap<String, usize>,
    #[serde(default)]
    stratifications: Option<Vec<StratificationDimension>>,
    variables: Vec<VariableRecord>,
}

impl DataSetFile {
    fn dimension(&self, name: &str) -> Result<usize, SimError> {
        self.dimensions
            .get(name)
            .copied()
            .ok_or_else(|| SimError::DataSetError(format!("missing dimension {name}")))
    }

    fn variable(&self, name: &str, dimensions: &[&str]) -> Result<&VariableRecord, SimError> {
        let record = self
            .variables
            .iter()
            .find(|record| record.name == name)
            .ok_or_else(|| SimError::DataSetError(format!("missing variable {name}")))?;
        if record.dimensions != dimensions {
            return Err(SimError::DataSetError(format!(
                "variable {name} has dimensions {:?}, expected {dimensions:?}",
                record.dimensions
            )));
        }
        Ok(record)
    }
}

/// Loads a dataset from a JSON file
///
/// # Errors
/// Returns `SimError` if the file cannot be read or parsed, or a required
/// dimension or variable is missing or malformed.
pub fn load_dataset(path: &Path) -> Result<StratifiedDataSet, SimError> {
    info!("loading dataset from {}", path.display());
    let file = File::open(path)?;
    parse_dataset(BufReader::new(file))
}

/// Parses a dataset from any JSON reader
///
/// # Errors
/// Returns `SimError` on the same conditions as [`load_dataset`].
pub fn parse_dataset<R: Read>(reader: R) -> Result<StratifiedDataSet, SimError> {
    let file: DataSetFile = serde_json::from_reader(reader)?;

    let num_times = file.dimension(TIME)?;
    let num_nodes = file.dimension(NODE)?;
    let num_cells = file.dimension(STRATIFICATION)?;

    let stratifications = match &file.stratifications {
        Some(dimensions) => Stratifications::new(dimensions.clone())?,
        None => Stratifications::seatird_default(),
    };
    if stratifications.num_cells() != num_cells {
        return Err(SimError::DataSetError(format!(
            "stratification dimension is {num_cells} but the stratifications define {} cells",
            stratifications.num_cells()
        )));
    }

    let ids = file.variable("ids", &[NODE])?;
    let node_ids = ids
        .data
        .iter()
        .map(|value| to_node_id(*value))
        .collect::<Result<Vec<NodeId>, SimError>>()?;
    if node_ids.len() != num_nodes {
        return Err(SimError::DataSetError(format!(
            "ids has {} values, expected {num_nodes}",
            node_ids.len()
        )));
    }

    let population = file.variable("population", &[TIME, NODE, STRATIFICATION])?;
    let travel = file.variable("travel", &[NODE, NODE])?;

    let mut dataset = StratifiedDataSet::with_history(
        num_times,
        node_ids,
        stratifications,
        population.data.clone(),
        travel.data.clone(),
    )?;

    for record in &file.variables {
        if matches!(record.name.as_str(), "ids" | "population" | "travel") {
            continue;
        }
        if record.value_type == ValueType::Float
            && record.dimensions == [TIME, NODE, STRATIFICATION]
        {
            debug!("registering dataset variable {}", record.name);
            dataset.insert_variable(&record.name, record.data.clone())?;
        } else {
            debug!("skipping dataset variable {}", record.name);
        }
    }

    info!(
        "loaded dataset with {} nodes and {} timesteps",
        dataset.num_nodes(),
        dataset.num_times()
    );
    Ok(dataset)
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn to_node_id(value: f64) -> Result<NodeId, SimError> {
    if value.fract() != 0.0 || value < 0.0 || value > f64::from(NodeId::MAX) {
        return Err(SimError::DataSetError(format!("invalid node id {value}")));
    }
    Ok(value as NodeId)
}

#[derive(Debug, Deserialize)]
struct NodeMetadataRecord {
    id: NodeId,
    name: String,
    #[serde(default)]
    group: Option<String>,
}

/// Attaches names and groups from a headerless `id,name,group` CSV file
///
/// Rows for ids that are not in the dataset are skipped with a warning.
/// Returns the number of nodes updated.
///
/// # Errors
/// Returns `SimError` if the file cannot be read or a row is malformed.
pub fn load_node_metadata(dataset: &mut StratifiedDataSet, path: &Path) -> Result<usize, SimError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_path(path)?;

    let mut updated = 0;
    for record in reader.deserialize() {
        let record: NodeMetadataRecord = record?;
        if dataset.node_index(record.id).is_none() {
            warn!("node metadata for unknown node {}", record.id);
            continue;
        }
        let group = record.group.as_deref().filter(|group| !group.is_empty());
        dataset.set_node_metadata(record.id, &record.name, group)?;
        updated += 1;
    }
    Ok(updated)
}
