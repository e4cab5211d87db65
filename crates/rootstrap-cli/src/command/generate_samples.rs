use std::{fs, path::PathBuf};

use anyhow::Context;
use ndarray::{ArrayD, IxDyn};
use rootstrap_engine::Edges;
use rootstrap_io::container::{Container, Histogram};
use tracing::{debug, info};

const HISTOGRAMS: [&str; 2] = ["proton_dist", "pion_dist"];

#[derive(Debug, Clone, clap::Args)]
pub(crate) struct GenerateSamplesArg {
    /// Directory to write the container files into
    #[arg(long, default_value = ".")]
    output_dir: PathBuf,
    /// Number of files to generate
    #[arg(long, default_value_t = 5)]
    files: usize,
    /// Number of bins per histogram
    #[arg(long, default_value_t = 3)]
    bins: usize,
    /// Store every histogram split across this many top-level directories
    #[arg(long)]
    split: Option<usize>,
}

/// Writes `AnalysisResults<i>.json` files whose histograms hold `i + 1` in every bin.
pub(crate) fn run(arg: &GenerateSamplesArg) -> anyhow::Result<()> {
    let GenerateSamplesArg {
        output_dir,
        files,
        bins,
        split,
    } = arg;
    fs::create_dir_all(output_dir)
        .with_context(|| format!("Failed to create directory: {}", output_dir.display()))?;

    let edges = Edges::from_shape(&[*bins]);
    for file_index in 0..*files {
        #[expect(clippy::cast_precision_loss)]
        let content = (file_index + 1) as f64;
        let histogram = Histogram::new(&ArrayD::from_elem(IxDyn(&[*bins]), content), edges.clone())
            .context("Failed to build histogram")?;

        let mut container = Container::new();
        for name in HISTOGRAMS {
            let paths: Vec<String> = match split {
                Some(parts) => (0..*parts)
                    .map(|part| format!("part{part:02}.{name}"))
                    .collect(),
                None => vec![name.to_owned()],
            };
            for path in paths {
                container
                    .insert(&path, histogram.clone())
                    .with_context(|| format!("Failed to insert {path}"))?;
            }
        }

        let path = output_dir.join(format!("AnalysisResults{file_index}.json"));
        container
            .save(&path)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        debug!(path = %path.display(), content, "wrote sample file");
    }
    info!(
        files,
        bins,
        dir = %output_dir.display(),
        "generated sample files"
    );
    Ok(())
}
