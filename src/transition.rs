//! Disease compartments and the transitions between them.
//!
//! Each `TransitionType` maps to a fixed (source, destination) pair of
//! compartments through `TRANSITION_TABLE`. Firing a transition moves one
//! individual between the corresponding dataset variables.
use strum::{Display, EnumCount, EnumIter, IntoEnumIterator, IntoStaticStr};

use crate::dataset::{StratifiedDataSet, VariableId};
use crate::error::SimError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, EnumCount, IntoStaticStr, Display)]
#[strum(serialize_all = "lowercase")]
pub enum Compartment {
    Susceptible,
    Exposed,
    Asymptomatic,
    Treatable,
    Infectious,
    Recovered,
    Deceased,
}

impl Compartment {
    /// The dataset variable holding this compartment
    #[must_use]
    pub fn variable_name(self) -> &'static str {
        self.into()
    }

    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Compartment::Recovered | Compartment::Deceased)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter)]
pub enum TransitionType {
    StoE,
    EtoA,
    AtoT,
    AtoR,
    AtoD,
    TtoI,
    TtoR,
    TtoD,
    ItoR,
    ItoD,
}

static TRANSITION_TABLE: [(TransitionType, Compartment, Compartment); 10] = [
    (TransitionType::StoE, Compartment::Susceptible, Compartment::Exposed),
    (TransitionType::EtoA, Compartment::Exposed, Compartment::Asymptomatic),
    (TransitionType::AtoT, Compartment::Asymptomatic, Compartment::Treatable),
    (TransitionType::AtoR, Compartment::Asymptomatic, Compartment::Recovered),
    (TransitionType::AtoD, Compartment::Asymptomatic, Compartment::Deceased),
    (TransitionType::TtoI, Compartment::Treatable, Compartment::Infectious),
    (TransitionType::TtoR, Compartment::Treatable, Compartment::Recovered),
    (TransitionType::TtoD, Compartment::Treatable, Compartment::Deceased),
    (TransitionType::ItoR, Compartment::Infectious, Compartment::Recovered),
    (TransitionType::ItoD, Compartment::Infectious, Compartment::Deceased),
];

impl TransitionType {
    /// The (source, destination) compartments of this transition
    #[must_use]
    pub fn compartments(self) -> (Compartment, Compartment) {
        let (_, from, to) = TRANSITION_TABLE[self as usize];
        (from, to)
    }

    #[must_use]
    pub fn source(self) -> Compartment {
        self.compartments().0
    }

    #[must_use]
    pub fn destination(self) -> Compartment {
        self.compartments().1
    }
}

/// Dataset variable ids of every compartment, resolved once
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompartmentVariables {
    ids: [VariableId; Compartment::COUNT],
}

impl CompartmentVariables {
    /// # Errors
    /// Returns `SimError::UnknownVariable` if a compartment variable is missing.
    pub fn resolve(dataset: &StratifiedDataSet) -> Result<Self, SimError> {
        let mut ids = [0; Compartment::COUNT];
        for compartment in Compartment::iter() {
            ids[compartment as usize] = dataset
                .variable_id(compartment.variable_name())
                .ok_or_else(|| SimError::UnknownVariable(compartment.variable_name().to_string()))?;
        }
        Ok(CompartmentVariables { ids })
    }

    #[must_use]
    pub fn get(&self, compartment: Compartment) -> VariableId {
        self.ids[compartment as usize]
    }

    /// Moves up to `quantity` individuals along `transition` in one cell and
    /// returns the number moved
    pub fn apply(
        &self,
        dataset: &mut StratifiedDataSet,
        transition: TransitionType,
        quantity: f64,
        node: usize,
        cell: usize,
    ) -> f64 {
        let (from, to) = transition.compartments();
        dataset.transition_cell(quantity, self.get(from), self.get(to), node, cell)
    }
}
