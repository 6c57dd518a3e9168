pub use crate::context::{Context, ModelEvent};
pub use crate::dataset::{NodeId, NodeSelection, StratificationFilter, StratifiedDataSet};
pub use crate::error::SimError;
pub use crate::global_properties::ContextGlobalPropertiesExt;
pub use crate::initial_cases::ContextInitialCasesExt;
pub use crate::log::{debug, error, info, trace, warn};
pub use crate::parameters::{ContextParametersExt, ParametersValues};
pub use crate::random::ContextRandomExt;
pub use crate::report::ContextReportExt;
pub use crate::runner::{run_with_args, run_with_custom_args, BaseArgs};
pub use crate::simulation::{
    ContextSimulationExt, DataSetAdvancedEvent, DistributionAppliedEvent, StockpileChangedEvent,
    ThresholdCrossedEvent,
};
pub use crate::stockpile::{DistributionId, StockpileId};
pub use crate::{define_data_plugin, define_global_property, define_report, define_rng};
