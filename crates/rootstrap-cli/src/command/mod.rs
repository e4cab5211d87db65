use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use self::{generate_samples::GenerateSamplesArg, inspect::InspectArg, run::RunArg};

mod generate_samples;
mod inspect;
mod run;

#[derive(Debug, Clone, Parser)]
#[command(author, version, about, long_about = None)]
pub struct CommandArgs {
    /// Log verbosity (trace, debug, info, warn, error); `RUST_LOG` takes precedence
    #[arg(long, global = true, default_value = "info")]
    log_level: tracing::Level,
    #[command(subcommand)]
    mode: Mode,
}

#[derive(Debug, Clone, Subcommand)]
enum Mode {
    /// Bootstrap observables over a set of container files
    Run(#[clap(flatten)] RunArg),
    /// Write a toy ensemble of container files
    GenerateSamples(#[clap(flatten)] GenerateSamplesArg),
    /// List the histograms stored in a container file
    Inspect(#[clap(flatten)] InspectArg),
}

pub fn run() -> anyhow::Result<()> {
    let args = CommandArgs::parse();
    init_logging(args.log_level);
    match args.mode {
        Mode::Run(arg) => run::run(&arg)?,
        Mode::GenerateSamples(arg) => generate_samples::run(&arg)?,
        Mode::Inspect(arg) => inspect::run(&arg)?,
    }
    Ok(())
}

fn init_logging(level: tracing::Level) {
    let builder = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_target(false);
    match EnvFilter::try_from_default_env() {
        Ok(filter) => builder.with_env_filter(filter).init(),
        Err(_) => builder.with_max_level(level).init(),
    }
}
