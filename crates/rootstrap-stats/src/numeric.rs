//! Numeric conventions shared by the collector and the sample sets.
//!
//! Invalid or missing cells are marked with `NaN`. A `NaN` cell contributes
//! nothing to a sum and is not counted as an observation.

use ndarray::{ArrayD, IxDyn};

/// Weight applied to one call of [`Collector::add_weighted`](crate::collector::Collector::add_weighted).
///
/// A scalar weight applies to every cell; an array weight must be broadcastable
/// to the shape of the points it is applied to (numpy broadcasting rules, as
/// implemented by [`ndarray::ArrayBase::broadcast`]).
#[derive(Debug, Clone, PartialEq, derive_more::From)]
pub enum Weight {
    /// The same weight for every cell.
    Scalar(f64),
    /// Per-cell weights.
    Array(ArrayD<f64>),
}

impl Default for Weight {
    fn default() -> Self {
        Self::Scalar(1.0)
    }
}

/// Error returned when a weight array cannot be broadcast to the points' shape.
#[derive(Debug, Clone, PartialEq, Eq, derive_more::Display, derive_more::Error)]
#[display("weight of shape {weight:?} cannot be broadcast to shape {target:?}")]
pub struct BroadcastError {
    /// Shape of the weight array.
    pub weight: Vec<usize>,
    /// Shape it had to be broadcast to.
    pub target: Vec<usize>,
}

impl Weight {
    /// Expands the weight to an array of exactly `shape`.
    pub fn broadcast_to(&self, shape: &[usize]) -> Result<ArrayD<f64>, BroadcastError> {
        match self {
            Self::Scalar(w) => Ok(ArrayD::from_elem(IxDyn(shape), *w)),
            Self::Array(array) => array
                .broadcast(IxDyn(shape))
                .map(|view| view.to_owned())
                .ok_or_else(|| BroadcastError {
                    weight: array.shape().to_vec(),
                    target: shape.to_vec(),
                }),
        }
    }

    /// Checks broadcast compatibility without materializing the expanded array.
    pub fn check_broadcast(&self, shape: &[usize]) -> Result<(), BroadcastError> {
        match self {
            Self::Scalar(_) => Ok(()),
            Self::Array(array) => {
                if array.broadcast(IxDyn(shape)).is_some() {
                    Ok(())
                } else {
                    Err(BroadcastError {
                        weight: array.shape().to_vec(),
                        target: shape.to_vec(),
                    })
                }
            }
        }
    }
}

/// Returns `true` if the cell holds a valid observation.
#[must_use]
pub fn is_valid(value: f64) -> bool {
    !value.is_nan()
}

/// Divides `numerator` by `denominator`, yielding `NaN` where the denominator is zero.
#[must_use]
pub fn checked_ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator == 0.0 {
        f64::NAN
    } else {
        numerator / denominator
    }
}
