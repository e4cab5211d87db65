//! Run configuration file (`--config run.json`).
//!
//! ```json
//! {
//!   "files": ["AnalysisResults0.json", "AnalysisResults1.json"],
//!   "sources": { "proton": "proton_dist", "pion": "pion_dist" },
//!   "statics": { "proton_total": "proton" },
//!   "observables": ["ratio=proton/pion", "normalised=proton/proton_total"],
//!   "iterations": 10000,
//!   "seed": "000000000000000000000000000000ff",
//!   "workers": 4,
//!   "split": { "axis": null }
//! }
//! ```
//!
//! Every field is optional. Command-line flags extend or override the file.

use std::{collections::BTreeMap, path::PathBuf};

use rootstrap_engine::ResampleSeed;
use rootstrap_io::SplitStorage;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RunConfig {
    /// Input container files, in file-index order
    pub files: Vec<PathBuf>,
    /// Source name to dotted path
    pub sources: BTreeMap<String, String>,
    /// Static source name to the source whose integrated sample it holds
    pub statics: BTreeMap<String, String>,
    /// Observable declarations, in evaluation order
    pub observables: Vec<String>,
    pub iterations: Option<usize>,
    pub seed: Option<ResampleSeed>,
    pub workers: Option<usize>,
    pub split: Option<SplitStorage>,
}

impl RunConfig {
    pub const DEFAULT_ITERATIONS: usize = 1000;

    /// Applies `overrides` on top of `self`.
    ///
    /// Files are replaced when `overrides` lists any. Sources and statics are merged by
    /// name. Observables are appended. Scalar settings are replaced when set.
    #[must_use]
    pub fn merge(mut self, overrides: RunConfig) -> Self {
        if !overrides.files.is_empty() {
            self.files = overrides.files;
        }
        self.sources.extend(overrides.sources);
        self.statics.extend(overrides.statics);
        self.observables.extend(overrides.observables);
        self.iterations = overrides.iterations.or(self.iterations);
        self.seed = overrides.seed.or(self.seed);
        self.workers = overrides.workers.or(self.workers);
        self.split = overrides.split.or(self.split);
        self
    }

    pub fn iterations(&self) -> usize {
        self.iterations.unwrap_or(Self::DEFAULT_ITERATIONS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_documented_example() {
        let config: RunConfig = serde_json::from_str(
            r#"{
                "files": ["a.json", "b.json"],
                "sources": { "proton": "proton_dist" },
                "observables": ["yield=proton"],
                "seed": "000000000000000000000000000000ff",
                "split": { "axis": 1 }
            }"#,
        )
        .unwrap();
        assert_eq!(config.files.len(), 2);
        assert_eq!(config.sources["proton"], "proton_dist");
        assert_eq!(config.seed, Some(ResampleSeed::from_u128(0xff)));
        assert_eq!(config.split, Some(SplitStorage { axis: Some(1) }));
        assert_eq!(config.iterations(), RunConfig::DEFAULT_ITERATIONS);
    }

    #[test]
    fn test_unknown_fields_are_rejected() {
        assert!(serde_json::from_str::<RunConfig>(r#"{ "iteration": 5 }"#).is_err());
    }

    #[test]
    fn test_merge_overrides() {
        let base = RunConfig {
            files: vec!["a.json".into()],
            sources: BTreeMap::from([("p".to_owned(), "old".to_owned())]),
            observables: vec!["x=p".to_owned()],
            iterations: Some(10),
            workers: Some(2),
            ..RunConfig::default()
        };
        let overrides = RunConfig {
            sources: BTreeMap::from([
                ("p".to_owned(), "new".to_owned()),
                ("q".to_owned(), "q_dist".to_owned()),
            ]),
            observables: vec!["y=x*q".to_owned()],
            iterations: Some(20),
            ..RunConfig::default()
        };
        let merged = base.merge(overrides);
        assert_eq!(merged.files, [PathBuf::from("a.json")]);
        assert_eq!(merged.sources["p"], "new");
        assert_eq!(merged.sources["q"], "q_dist");
        assert_eq!(merged.observables, ["x=p", "y=x*q"]);
        assert_eq!(merged.iterations(), 20);
        assert_eq!(merged.workers, Some(2));
    }
}
