use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{CallbackError, context::StaticContext};

/// Bin boundaries of an N-dimensional histogram, one sequence per dimension.
///
/// A dimension with `n` bins has `n + 1` boundaries.
///
/// # Example
///
/// ```
/// use rootstrap_engine::Edges;
///
/// let edges = Edges::new(vec![vec![0.0, 1.0, 2.0, 3.0]]);
/// assert_eq!(edges.ndim(), 1);
/// assert_eq!(edges.bin_counts(), vec![3]);
/// ```
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Edges(Vec<Vec<f64>>);

/// Error returned for an edges value that cannot describe any histogram.
#[derive(Debug, Clone, PartialEq, Eq, derive_more::Display, derive_more::Error)]
#[display("axis {axis} has {boundaries} boundaries, at least 2 are required")]
pub struct InvalidEdgesError {
    pub axis: usize,
    pub boundaries: usize,
}

impl Edges {
    #[must_use]
    pub fn new(axes: Vec<Vec<f64>>) -> Self {
        Self(axes)
    }

    /// Integer boundaries `0, 1, ..., bins` for a dimension without physical binning.
    #[must_use]
    pub fn index_axis(bins: usize) -> Vec<f64> {
        #[expect(clippy::cast_precision_loss)]
        (0..=bins).map(|i| i as f64).collect()
    }

    /// Edges made of [`index_axis`](Self::index_axis) boundaries for every dimension of `shape`.
    #[must_use]
    pub fn from_shape(shape: &[usize]) -> Self {
        Self(shape.iter().map(|&n| Self::index_axis(n)).collect())
    }

    /// Number of dimensions.
    #[must_use]
    pub fn ndim(&self) -> usize {
        self.0.len()
    }

    /// Boundaries of one dimension.
    #[must_use]
    pub fn axis(&self, axis: usize) -> Option<&[f64]> {
        self.0.get(axis).map(Vec::as_slice)
    }

    /// Iterates over the boundaries of every dimension.
    pub fn axes(&self) -> impl Iterator<Item = &[f64]> + '_ {
        self.0.iter().map(Vec::as_slice)
    }

    /// Number of bins per dimension.
    #[must_use]
    pub fn bin_counts(&self) -> Vec<usize> {
        self.0.iter().map(|b| b.len().saturating_sub(1)).collect()
    }

    /// Returns new edges with `boundaries` inserted as dimension `axis`.
    #[must_use]
    pub fn with_axis_inserted(&self, axis: usize, boundaries: Vec<f64>) -> Self {
        let mut axes = self.0.clone();
        axes.insert(axis.min(axes.len()), boundaries);
        Self(axes)
    }

    /// Returns new edges with dimension `axis` replaced by `boundaries`.
    #[must_use]
    pub fn with_axis_replaced(&self, axis: usize, boundaries: Vec<f64>) -> Self {
        let mut axes = self.0.clone();
        if let Some(slot) = axes.get_mut(axis) {
            *slot = boundaries;
        }
        Self(axes)
    }

    /// Checks that every dimension has at least two boundaries.
    pub fn validate(&self) -> Result<(), InvalidEdgesError> {
        match self.0.iter().position(|b| b.len() < 2) {
            Some(axis) => Err(InvalidEdgesError {
                axis,
                boundaries: self.0[axis].len(),
            }),
            None => Ok(()),
        }
    }
}

impl From<Vec<Vec<f64>>> for Edges {
    fn from(axes: Vec<Vec<f64>>) -> Self {
        Self(axes)
    }
}

type ComputeEdgesFn = Box<dyn FnOnce(&StaticContext<'_>) -> Result<Edges, CallbackError>>;

/// How an observable's bin edges are determined at registration time.
pub enum EdgesSpec {
    /// Reuse the edges of a registered source.
    Source(String),
    /// Explicit per-dimension boundaries.
    Explicit(Edges),
    /// Computed once, at registration, from the fully populated sources.
    Computed(ComputeEdgesFn),
}

impl EdgesSpec {
    /// Edges of the source registered under `name`.
    pub fn source(name: impl Into<String>) -> Self {
        Self::Source(name.into())
    }

    /// Edges computed by `f` when the observable is registered.
    pub fn computed<F>(f: F) -> Self
    where
        F: FnOnce(&StaticContext<'_>) -> Result<Edges, CallbackError> + 'static,
    {
        Self::Computed(Box::new(f))
    }
}

impl From<Edges> for EdgesSpec {
    fn from(edges: Edges) -> Self {
        Self::Explicit(edges)
    }
}

impl fmt::Debug for EdgesSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Source(name) => f.debug_tuple("Source").field(name).finish(),
            Self::Explicit(edges) => f.debug_tuple("Explicit").field(edges).finish(),
            Self::Computed(_) => f.write_str("Computed(..)"),
        }
    }
}
