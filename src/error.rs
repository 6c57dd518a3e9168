use std::fmt::{self, Debug, Display};
use std::io;

use crate::dataset::NodeId;

/// Provides `SimError` and maps to other errors to
/// convert to a `SimError`
#[derive(Debug)]
#[allow(clippy::module_name_repetitions)]
pub enum SimError {
    IoError(io::Error),
    JsonError(serde_json::Error),
    CsvError(csv::Error),
    /// A dataset file is missing a required dimension or variable, or has the wrong shape
    DataSetError(String),
    UnknownVariable(String),
    UnknownNode(NodeId),
    UnknownGroup(String),
    UnknownStockpile(usize),
    TimeOutOfRange { time: usize, num_times: usize },
    InvalidStratification(String),
    InvalidParameter(String),
    ModelConfiguration(String),
    /// Seeding exposures is only allowed before the first simulated day
    SimulationStarted,
    ReportError(String),
    SimError(String),
}

impl From<io::Error> for SimError {
    fn from(error: io::Error) -> Self {
        SimError::IoError(error)
    }
}

impl From<serde_json::Error> for SimError {
    fn from(error: serde_json::Error) -> Self {
        SimError::JsonError(error)
    }
}

impl From<csv::Error> for SimError {
    fn from(error: csv::Error) -> Self {
        SimError::CsvError(error)
    }
}

impl From<String> for SimError {
    fn from(error: String) -> Self {
        SimError::SimError(error)
    }
}

impl From<&str> for SimError {
    fn from(error: &str) -> Self {
        SimError::SimError(error.to_string())
    }
}

impl std::error::Error for SimError {}

impl Display for SimError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Error: {self:?}")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn converts_from_str() {
        let error: SimError = "something broke".into();
        assert!(matches!(error, SimError::SimError(ref message) if message == "something broke"));
    }

    #[test]
    fn display_includes_variant() {
        let error = SimError::UnknownVariable("bogus".to_string());
        assert_eq!(error.to_string(), "Error: UnknownVariable(\"bogus\")");
    }

    #[test]
    fn converts_from_json_error() {
        let json_error = serde_json::from_str::<u32>("not a number").unwrap_err();
        let error: SimError = json_error.into();
        assert!(matches!(error, SimError::JsonError(_)));
    }
}
