use std::path::PathBuf;

use clap::Args;
use pandemic_sim::dataset::{load_dataset, load_node_metadata};
use pandemic_sim::initial_cases::ContextInitialCasesExt;
use pandemic_sim::reports;
use pandemic_sim::runner::run_with_custom_args;
use pandemic_sim::simulation::ContextSimulationExt;
use pandemic_sim::{error, info};

#[derive(Args, Debug)]
struct BatchArgs {
    /// JSON dataset with node populations and travel
    #[arg(long)]
    dataset: PathBuf,

    /// Headerless `id,name,group` CSV naming nodes and their groups
    #[arg(long)]
    node_metadata: Option<PathBuf>,

    /// CSV of `node_id,count,age,risk,vaccination` exposures seeded on day 0
    #[arg(long)]
    initial_cases: Option<PathBuf>,

    /// Number of days to simulate
    #[arg(long, default_value = "30")]
    days: usize,

    /// Variables written to the daily report
    #[arg(long = "output-variable", default_values_t = vec!["deceased".to_string()])]
    output_variables: Vec<String>,
}

fn main() {
    let result = run_with_custom_args(|context, _, batch: Option<BatchArgs>| {
        let Some(batch) = batch else {
            return Ok(());
        };
        let mut dataset = load_dataset(&batch.dataset)?;
        if let Some(path) = &batch.node_metadata {
            let named = load_node_metadata(&mut dataset, path)?;
            info!("named {named} nodes from {}", path.display());
        }
        context.init_simulation(dataset)?;
        if let Some(path) = &batch.initial_cases {
            context.load_initial_cases(path)?;
        }
        reports::init(context, &batch.output_variables)?;
        context.schedule_days(batch.days);
        Ok(())
    });

    match result {
        Ok(context) => {
            if let Some(dataset) = context.get_dataset() {
                println!("simulated {} days", dataset.latest_time());
            }
        }
        Err(e) => {
            error!("{e}");
            eprintln!("{e}");
            std::process::exit(1);
        }
    }
}
