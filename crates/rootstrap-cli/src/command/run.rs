use std::path::PathBuf;

use anyhow::{Context, bail};
use rand::Rng as _;
use rootstrap_engine::Bootstrapper;
use rootstrap_io::{FileSetReader, SplitStorage, export::export};
use tracing::info;

use crate::{
    config::RunConfig,
    expr::{Assignment, ObservableDef},
    schema::RunSummary,
    util::{self, Output},
};

#[derive(Default, Debug, Clone, clap::Args)]
pub(crate) struct RunArg {
    /// Input container files
    files: Vec<PathBuf>,
    /// JSON run configuration; flags below extend or override it
    #[arg(long)]
    config: Option<PathBuf>,
    /// Source to register, as `name=dotted.path` (repeatable)
    #[arg(long = "source", value_name = "NAME=PATH")]
    sources: Vec<Assignment>,
    /// Static source holding the integrated sample of a source, as `name=source` (repeatable)
    #[arg(long = "static", value_name = "NAME=SOURCE")]
    statics: Vec<Assignment>,
    /// Observable, as `name=operand` or `name=a<op>b` with op one of + - * / (repeatable)
    #[arg(long = "observable", value_name = "NAME=EXPR")]
    observables: Vec<String>,
    /// Number of bootstrap iterations [default: 1000]
    #[arg(long)]
    iterations: Option<usize>,
    /// 32-digit hex seed for reproducible resampling
    #[arg(long)]
    seed: Option<rootstrap_engine::ResampleSeed>,
    /// Maximum number of files extracted concurrently [default: 10]
    #[arg(long)]
    workers: Option<usize>,
    /// Merge histograms split across the top-level directories of each file
    #[arg(long)]
    split: bool,
    /// Concatenate split fragments along this axis instead of stacking them
    #[arg(long, requires = "split")]
    split_axis: Option<usize>,
    /// Summary output file path (stdout if omitted)
    #[arg(long)]
    output: Option<PathBuf>,
    /// Also write `<name>.mean` and `<name>.sigma` histograms to this container file
    #[arg(long)]
    export: Option<PathBuf>,
}

impl RunArg {
    fn to_config(&self) -> RunConfig {
        RunConfig {
            files: self.files.clone(),
            sources: self
                .sources
                .iter()
                .map(|a| (a.name.clone(), a.value.clone()))
                .collect(),
            statics: self
                .statics
                .iter()
                .map(|a| (a.name.clone(), a.value.clone()))
                .collect(),
            observables: self.observables.clone(),
            iterations: self.iterations,
            seed: self.seed,
            workers: self.workers,
            split: self.split.then_some(SplitStorage {
                axis: self.split_axis,
            }),
        }
    }

    fn resolve_config(&self) -> anyhow::Result<RunConfig> {
        let base = match &self.config {
            Some(path) => util::read_json_file::<RunConfig, _>("run configuration", path)?,
            None => RunConfig::default(),
        };
        Ok(base.merge(self.to_config()))
    }
}

pub(crate) fn run(arg: &RunArg) -> anyhow::Result<()> {
    let config = arg.resolve_config()?;
    if config.files.is_empty() {
        bail!("No input files given");
    }
    if config.sources.is_empty() {
        bail!("No sources given; use --source NAME=PATH");
    }
    if config.observables.is_empty() {
        bail!("No observables given; use --observable NAME=EXPR");
    }

    let seed = config.seed.unwrap_or_else(|| rand::rng().random());
    let reader = FileSetReader::new(config.files.clone())
        .with_workers(config.workers.unwrap_or(FileSetReader::DEFAULT_WORKERS))
        .with_split(config.split);
    info!(files = reader.files().len(), workers = reader.workers(), %seed, "loading sources");

    let mut bs = Bootstrapper::with_seed(reader, seed);
    for (name, path) in &config.sources {
        bs.register_source(name, path)
            .with_context(|| format!("Failed to register source '{name}'"))?;
    }
    for (name, source) in &config.statics {
        let source = source.clone();
        bs.register_static_source(name, move |ctx| Ok(ctx.integrated_sample(&source)?))
            .with_context(|| format!("Failed to register static source '{name}'"))?;
    }
    for declaration in &config.observables {
        let def = declaration
            .parse::<ObservableDef>()
            .with_context(|| format!("Invalid observable '{declaration}'"))?;
        let (edges, expr) = def
            .compile(&bs, &config.statics)
            .with_context(|| format!("Invalid observable '{declaration}'"))?;
        bs.register_observable(&def.name, edges, move |ctx| expr.eval(ctx))
            .with_context(|| format!("Failed to register observable '{}'", def.name))?;
    }

    bs.bootstrap(config.iterations())
        .context("Bootstrap run failed")?;

    let summary = RunSummary::new(&bs, seed, config.files.clone());
    Output::save_json(&summary, arg.output.clone())?;

    if let Some(path) = &arg.export {
        let container = export(
            bs.observable_names()
                .filter_map(|name| Some((name, bs.observable_edges(name)?, bs.collector(name)?))),
        )
        .context("Failed to build result container")?;
        container
            .save(path)
            .with_context(|| format!("Failed to export results to {}", path.display()))?;
        info!(path = %path.display(), "exported results");
    }

    Ok(())
}
