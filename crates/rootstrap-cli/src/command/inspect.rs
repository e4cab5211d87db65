use std::{io::Write as _, path::PathBuf};

use anyhow::Context;
use rootstrap_io::{container::Container, path};

use crate::util::Output;

#[derive(Debug, Clone, clap::Args)]
pub(crate) struct InspectArg {
    /// Container file to inspect
    file: PathBuf,
    /// Output file path (stdout if omitted)
    #[arg(long)]
    output: Option<PathBuf>,
}

/// Prints one `path<TAB>shape` line per histogram in the file.
pub(crate) fn run(arg: &InspectArg) -> anyhow::Result<()> {
    let container = Container::open(&arg.file)
        .with_context(|| format!("Failed to read container file: {}", arg.file.display()))?;

    let mut output = Output::from_output_path(arg.output.clone())?;
    for (path, histogram) in path::histograms(container.root()) {
        writeln!(output, "{path}\t{:?}", histogram.shape())
            .with_context(|| format!("Failed to write to {}", output.display_path()))?;
    }
    output.finish()
}
