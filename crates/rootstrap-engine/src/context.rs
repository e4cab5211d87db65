//! Read-only views handed to user callbacks.
//!
//! Callbacks never capture the engine. Instead they receive a context that exposes
//! exactly what they are allowed to see:
//!
//! - [`StaticContext`] during registration: the fully populated sources (unweighted)
//!   and the static sources registered so far.
//! - [`IterationContext`] during a bootstrap iteration: additionally the current draw
//!   weights, the resampled source values and the observables already computed in
//!   the same iteration.

use std::collections::BTreeMap;

use ndarray::ArrayD;

use crate::{
    DrawWeights, Edges,
    sample_set::{SampleSet, SampleSetError},
};

/// Error raised by context lookups inside callbacks.
#[derive(Debug, Clone, PartialEq, Eq, derive_more::Display, derive_more::Error)]
pub enum ContextError {
    #[display("unknown source '{_0}'")]
    UnknownSource(#[error(not(source))] String),
    #[display("unknown static source '{_0}'")]
    UnknownStatic(#[error(not(source))] String),
    #[display("observable '{_0}' has not been computed yet in this iteration")]
    NotYetComputed(#[error(not(source))] String),
    #[display("cannot resample source '{name}': {source}")]
    Resample {
        name: String,
        source: SampleSetError,
    },
}

/// Context available to static-source callbacks and computed edges.
#[derive(Debug, Clone, Copy)]
pub struct StaticContext<'a> {
    pub(crate) sources: &'a BTreeMap<String, SampleSet>,
    pub(crate) statics: &'a BTreeMap<String, ArrayD<f64>>,
}

impl<'a> StaticContext<'a> {
    /// Unweighted sum of a source over all files.
    pub fn integrated_sample(&self, source: &str) -> Result<ArrayD<f64>, ContextError> {
        Ok(self.source(source)?.integrated_sample())
    }

    /// Edges of a source.
    pub fn edges(&self, source: &str) -> Result<&'a Edges, ContextError> {
        Ok(self.source(source)?.edges())
    }

    /// A static source registered earlier.
    pub fn static_value(&self, name: &str) -> Result<&'a ArrayD<f64>, ContextError> {
        self.statics
            .get(name)
            .ok_or_else(|| ContextError::UnknownStatic(name.to_owned()))
    }

    /// The populated sample set of a source.
    pub fn source(&self, name: &str) -> Result<&'a SampleSet, ContextError> {
        self.sources
            .get(name)
            .ok_or_else(|| ContextError::UnknownSource(name.to_owned()))
    }
}

/// Context available to observable and weight callbacks during one iteration.
#[derive(Debug, Clone, Copy)]
pub struct IterationContext<'a> {
    pub(crate) iteration: usize,
    pub(crate) weights: &'a DrawWeights,
    pub(crate) base: StaticContext<'a>,
    pub(crate) observable_index: &'a BTreeMap<String, usize>,
    pub(crate) computed: &'a [ArrayD<f64>],
}

impl<'a> IterationContext<'a> {
    /// Zero-based index of the iteration being computed.
    #[must_use]
    pub fn iteration(&self) -> usize {
        self.iteration
    }

    /// Draw weights of this iteration.
    #[must_use]
    pub fn weights(&self) -> &'a DrawWeights {
        self.weights
    }

    /// Resampled values of a source under this iteration's weights.
    pub fn values(&self, source: &str) -> Result<ArrayD<f64>, ContextError> {
        self.base
            .source(source)?
            .values(self.weights)
            .map_err(|source_err| ContextError::Resample {
                name: source.to_owned(),
                source: source_err,
            })
    }

    /// Edges of a source.
    pub fn edges(&self, source: &str) -> Result<&'a Edges, ContextError> {
        self.base.edges(source)
    }

    /// A static source.
    pub fn static_value(&self, name: &str) -> Result<&'a ArrayD<f64>, ContextError> {
        self.base.static_value(name)
    }

    /// Value of an observable computed earlier in this same iteration.
    pub fn observable(&self, name: &str) -> Result<&'a ArrayD<f64>, ContextError> {
        self.observable_index
            .get(name)
            .and_then(|&index| self.computed.get(index))
            .ok_or_else(|| ContextError::NotYetComputed(name.to_owned()))
    }
}
