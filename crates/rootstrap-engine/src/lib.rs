//! Bootstrap resampling over ensembles of per-file histograms.
//!
//! A [`Bootstrapper`] owns one [`SampleSet`] per registered source: the histogram
//! stored under a dotted path, extracted from every input file and stacked along a
//! file axis. Each bootstrap iteration draws [`DrawWeights`] (an N-out-of-N draw with
//! replacement over the files), evaluates the registered observables against the
//! reweighted sources, and folds the results into one
//! [`Collector`](rootstrap_stats::collector::Collector) per observable.
//!
//! File access stays outside this crate, behind the [`SourceReader`] trait.

pub use self::{
    bootstrapper::{BootstrapError, Bootstrapper},
    context::{ContextError, IterationContext, StaticContext},
    edges::{Edges, EdgesSpec, InvalidEdgesError},
    reader::{Extracted, ReadError, SourceReader},
    resample::{DrawWeights, ResampleSeed},
    sample_set::{SampleSet, SampleSetBuilder, SampleSetError},
};
pub use rootstrap_stats::{collector::Collector, numeric::Weight};

mod bootstrapper;
mod context;
mod edges;
mod observable;
pub mod reader;
pub mod resample;
mod sample_set;

/// Error type returned by user callbacks.
pub type CallbackError = Box<dyn std::error::Error + Send + Sync>;
