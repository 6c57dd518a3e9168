use std::path::PathBuf;

use clap::{Args, Command, FromArgMatches as _};

use crate::context::Context;
use crate::error::SimError;
use crate::log::{set_log_level, LevelFilter};
use crate::parameters::ContextParametersExt;
use crate::random::ContextRandomExt;
use crate::report::ContextReportExt;
use crate::info;

/// Default cli arguments for the simulator runner
#[derive(Args, Debug, Default)]
pub struct BaseArgs {
    /// Random seed
    #[arg(short, long, default_value = "0")]
    pub random_seed: u64,

    /// Optional path for a JSON parameters file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Optional directory for report output
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,

    /// Optional prefix for report file names
    #[arg(long)]
    pub file_prefix: Option<String>,

    /// Replace report files that already exist
    #[arg(short, long)]
    pub force_overwrite: bool,

    /// Enable logging at this level (error, warn, info, debug, trace)
    #[arg(short, long)]
    pub log_level: Option<LevelFilter>,
}

#[derive(Args)]
pub struct PlaceholderCustom {}

fn create_cli() -> Command {
    let cli = Command::new("pandemic-sim");
    BaseArgs::augment_args(cli)
}

/// Runs a simulation with custom cli arguments.
///
/// This function allows you to define custom arguments and a setup function
///
/// # Parameters
/// - `setup_fn`: A function that takes a mutable reference to a `Context`, a `BaseArgs` struct,
///   a Option<A> where A is the custom cli arguments struct
///
/// # Errors
/// Returns an error if argument parsing or the setup function fails
pub fn run_with_custom_args<A, F>(setup_fn: F) -> Result<Context, Box<dyn std::error::Error>>
where
    A: Args,
    F: Fn(&mut Context, BaseArgs, Option<A>) -> Result<(), SimError>,
{
    let mut cli = create_cli();
    cli = A::augment_args(cli);
    let matches = cli.get_matches();

    let base_args_matches = BaseArgs::from_arg_matches(&matches)?;
    let custom_matches = A::from_arg_matches(&matches)?;
    run_with_args_internal(base_args_matches, Some(custom_matches), setup_fn)
}

/// Runs a simulation with default cli arguments
///
/// # Errors
/// Returns an error if argument parsing or the setup function fails
pub fn run_with_args<F>(setup_fn: F) -> Result<Context, Box<dyn std::error::Error>>
where
    F: Fn(&mut Context, BaseArgs, Option<PlaceholderCustom>) -> Result<(), SimError>,
{
    let cli = create_cli();
    let matches = cli.get_matches();

    let base_args_matches = BaseArgs::from_arg_matches(&matches)?;
    run_with_args_internal(base_args_matches, None, setup_fn)
}

fn run_with_args_internal<A, F>(
    args: BaseArgs,
    custom_args: Option<A>,
    setup_fn: F,
) -> Result<Context, Box<dyn std::error::Error>>
where
    F: Fn(&mut Context, BaseArgs, Option<A>) -> Result<(), SimError>,
{
    if let Some(level) = args.log_level {
        set_log_level(level);
    }

    let mut context = Context::new();

    if let Some(config) = &args.config {
        info!("loading parameters from {}", config.display());
        context.load_parameters(config)?;
    }

    let report_options = context.report_options();
    if let Some(output_dir) = &args.output_dir {
        report_options.directory(output_dir.clone());
    }
    if let Some(file_prefix) = &args.file_prefix {
        report_options.file_prefix(file_prefix);
    }
    report_options.overwrite(args.force_overwrite);

    context.init_random(args.random_seed);

    setup_fn(&mut context, args, custom_args)?;

    context.execute();
    Ok(context)
}
