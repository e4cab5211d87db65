use std::path::PathBuf;

use chrono::{DateTime, Utc};
use rootstrap_engine::{Bootstrapper, Edges, ResampleSeed};
use serde::Serialize;

/// Summary of a bootstrap run, printed as JSON.
///
/// `NaN` cells (no valid observation, or a single one for `sigma`) are written as `null`.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub generated_at: DateTime<Utc>,
    pub seed: ResampleSeed,
    pub iterations: usize,
    pub files: Vec<PathBuf>,
    pub observables: Vec<ObservableSummary>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ObservableSummary {
    pub name: String,
    pub edges: Edges,
    pub shape: Vec<usize>,
    /// Row-major mean per cell
    pub mean: Vec<f64>,
    /// Row-major standard deviation per cell
    pub sigma: Vec<f64>,
}

impl RunSummary {
    pub fn new(bs: &Bootstrapper, seed: ResampleSeed, files: Vec<PathBuf>) -> Self {
        let observables = bs
            .observable_names()
            .filter_map(|name| {
                let summary = bs.collector(name)?.summary()?;
                Some(ObservableSummary {
                    name: name.to_owned(),
                    edges: bs.observable_edges(name)?.clone(),
                    shape: summary.mean.shape().to_vec(),
                    mean: summary.mean.iter().copied().collect(),
                    sigma: summary.sigma.iter().copied().collect(),
                })
            })
            .collect();
        Self {
            generated_at: Utc::now(),
            seed,
            iterations: bs.completed_iterations(),
            files,
            observables,
        }
    }
}
