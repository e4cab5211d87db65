use ndarray::{ArrayD, IxDyn, Zip};

use crate::numeric::{self, BroadcastError, Weight};

/// Online accumulator of weighted observations over an N-dimensional array.
///
/// Each call to [`add_weighted`](Self::add_weighted) folds one array of points into
/// three running per-cell totals:
///
/// - **sum**: `Σ w·x`
/// - **square sum**: `Σ w·x²`
/// - **count**: `Σ w`
///
/// `NaN` points mark invalid cells: they contribute to none of the totals for that call,
/// so every cell effectively has its own number of observations.
///
/// The state is allocated lazily with the shape of the first array added; all later
/// arrays must have exactly that shape.
///
/// # Weights
///
/// The unbiased variance in [`sigma`](Self::sigma) treats weights as replication counts:
/// adding a point once with weight `w` is equivalent to adding it `w` times. Fractional
/// weights are accepted, but the `count - 1` correction then has no frequency
/// interpretation.
///
/// # Examples
///
/// ```
/// use ndarray::arr1;
/// use rootstrap_stats::collector::Collector;
///
/// let mut collector = Collector::new();
/// collector.add(&arr1(&[1.0, 10.0]).into_dyn()).unwrap();
/// collector.add(&arr1(&[3.0, f64::NAN]).into_dyn()).unwrap();
///
/// let mean = collector.mean().unwrap();
/// assert_eq!(mean[[0]], 2.0);
/// assert_eq!(mean[[1]], 10.0);
///
/// let sigma = collector.sigma().unwrap();
/// assert!((sigma[[0]] - 2.0_f64.sqrt()).abs() < 1e-12);
/// assert!(sigma[[1]].is_nan()); // a single valid observation
/// ```
#[derive(Debug, Clone, Default)]
pub struct Collector {
    state: Option<CollectorState>,
}

#[derive(Debug, Clone)]
struct CollectorState {
    sum: ArrayD<f64>,
    square_sum: ArrayD<f64>,
    count: ArrayD<f64>,
}

impl CollectorState {
    fn zeros(shape: &[usize]) -> Self {
        Self {
            sum: ArrayD::zeros(IxDyn(shape)),
            square_sum: ArrayD::zeros(IxDyn(shape)),
            count: ArrayD::zeros(IxDyn(shape)),
        }
    }
}

/// Error returned when an array cannot be folded into a [`Collector`].
#[derive(Debug, Clone, PartialEq, Eq, derive_more::Display, derive_more::Error)]
pub enum CollectorError {
    #[display("points of shape {found:?} do not match collector shape {expected:?}")]
    ShapeMismatch {
        expected: Vec<usize>,
        found: Vec<usize>,
    },
    #[display("invalid weight: {_0}")]
    Weight(BroadcastError),
}

impl From<BroadcastError> for CollectorError {
    fn from(err: BroadcastError) -> Self {
        Self::Weight(err)
    }
}

/// Mean and standard deviation snapshot of a [`Collector`].
#[derive(Debug, Clone)]
pub struct CollectorSummary {
    /// Weighted mean per cell (`NaN` where nothing valid was observed).
    pub mean: ArrayD<f64>,
    /// Unbiased weighted standard deviation per cell (`NaN` with one or no observation).
    pub sigma: ArrayD<f64>,
}

impl Collector {
    /// Creates an empty collector; its shape is fixed by the first `add`.
    #[must_use]
    pub const fn new() -> Self {
        Self { state: None }
    }

    /// Returns the accumulated shape, or `None` if nothing has been added yet.
    #[must_use]
    pub fn shape(&self) -> Option<&[usize]> {
        self.state.as_ref().map(|s| s.sum.shape())
    }

    /// Returns the per-cell accumulated weight (number of valid observations for unit weights).
    #[must_use]
    pub fn count(&self) -> Option<&ArrayD<f64>> {
        self.state.as_ref().map(|s| &s.count)
    }

    /// Adds `points` with unit weight.
    pub fn add(&mut self, points: &ArrayD<f64>) -> Result<(), CollectorError> {
        self.add_weighted(points, &Weight::Scalar(1.0))
    }

    /// Checks that `points` and `weight` could be added, without touching the state.
    pub fn validate(&self, points: &ArrayD<f64>, weight: &Weight) -> Result<(), CollectorError> {
        if let Some(shape) = self.shape()
            && shape != points.shape()
        {
            return Err(CollectorError::ShapeMismatch {
                expected: shape.to_vec(),
                found: points.shape().to_vec(),
            });
        }
        weight.check_broadcast(points.shape())?;
        Ok(())
    }

    /// Folds `points` into the running totals with the given weight.
    ///
    /// On error the collector is left unchanged.
    pub fn add_weighted(
        &mut self,
        points: &ArrayD<f64>,
        weight: &Weight,
    ) -> Result<(), CollectorError> {
        self.validate(points, weight)?;
        let weights = weight.broadcast_to(points.shape())?;

        let state = self
            .state
            .get_or_insert_with(|| CollectorState::zeros(points.shape()));
        Zip::from(&mut state.sum)
            .and(&mut state.square_sum)
            .and(&mut state.count)
            .and(points)
            .and(&weights)
            .for_each(|sum, square_sum, count, &x, &w| {
                if numeric::is_valid(x) {
                    *sum += x * w;
                    *square_sum += x * x * w;
                    *count += w;
                }
            });
        Ok(())
    }

    /// Returns the weighted mean per cell.
    ///
    /// Cells without any valid observation are `NaN`. Returns `None` before the first `add`.
    #[must_use]
    pub fn mean(&self) -> Option<ArrayD<f64>> {
        let state = self.state.as_ref()?;
        Some(
            Zip::from(&state.sum)
                .and(&state.count)
                .map_collect(|&sum, &count| cell_mean(sum, count)),
        )
    }

    /// Returns the unbiased weighted sample standard deviation per cell.
    ///
    /// Computed as `sqrt((Σw·x² − n·mean²) / (n − 1))` with `n = Σw`. Cells with `n <= 1`
    /// are `NaN`. Small negative variances caused by round-off are clamped to zero.
    /// Returns `None` before the first `add`.
    #[must_use]
    pub fn sigma(&self) -> Option<ArrayD<f64>> {
        let state = self.state.as_ref()?;
        Some(
            Zip::from(&state.sum)
                .and(&state.square_sum)
                .and(&state.count)
                .map_collect(|&sum, &square_sum, &count| cell_sigma(sum, square_sum, count)),
        )
    }

    /// Returns both mean and sigma, or `None` before the first `add`.
    #[must_use]
    pub fn summary(&self) -> Option<CollectorSummary> {
        Some(CollectorSummary {
            mean: self.mean()?,
            sigma: self.sigma()?,
        })
    }
}

fn cell_mean(sum: f64, count: f64) -> f64 {
    if count == 0.0 { f64::NAN } else { sum / count }
}

fn cell_sigma(sum: f64, square_sum: f64, count: f64) -> f64 {
    if count <= 1.0 {
        return f64::NAN;
    }
    let mean = sum / count;
    let variance = (square_sum - count * mean * mean) / (count - 1.0);
    // round-off can push an exactly-zero variance slightly below zero
    if variance < 0.0 { 0.0 } else { variance.sqrt() }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use ndarray::{arr1, arr2};

    use super::*;

    fn scalar(x: f64) -> ArrayD<f64> {
        arr1(&[x]).into_dyn()
    }

    fn reference_mean_std(values: &[f64]) -> (f64, f64) {
        #[expect(clippy::cast_precision_loss)]
        let n = values.len() as f64;
        let mean = values.iter().sum::<f64>() / n;
        let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);
        (mean, var.sqrt())
    }

    #[test]
    fn test_empty_collector_has_no_results() {
        let collector = Collector::new();
        assert!(collector.shape().is_none());
        assert!(collector.mean().is_none());
        assert!(collector.sigma().is_none());
        assert!(collector.summary().is_none());
    }

    #[test]
    fn test_unweighted_sequence_matches_reference() {
        let points = (0..50)
            .map(|i| f64::from(i) * 10.0 / 49.0)
            .collect::<Vec<_>>();
        let mut collector = Collector::new();
        for &p in &points {
            collector.add(&scalar(p)).unwrap();
        }

        let (mean, std) = reference_mean_std(&points);
        assert_relative_eq!(collector.mean().unwrap()[[0]], mean, max_relative = 1e-12);
        assert_relative_eq!(collector.sigma().unwrap()[[0]], std, max_relative = 1e-12);
    }

    #[test]
    fn test_weighting_equivalence() {
        let mut replicated = Collector::new();
        let mut weighted = Collector::new();
        for (x, w) in [(1.5, 3_u32), (-2.0, 1), (4.0, 2)] {
            for _ in 0..w {
                replicated.add(&scalar(x)).unwrap();
            }
            weighted
                .add_weighted(&scalar(x), &Weight::Scalar(f64::from(w)))
                .unwrap();
        }

        assert_relative_eq!(
            replicated.mean().unwrap()[[0]],
            weighted.mean().unwrap()[[0]],
            max_relative = 1e-12
        );
        assert_relative_eq!(
            replicated.sigma().unwrap()[[0]],
            weighted.sigma().unwrap()[[0]],
            max_relative = 1e-12
        );
    }

    #[test]
    fn test_nan_cells_are_masked_per_cell() {
        let mut collector = Collector::new();
        collector
            .add(&arr1(&[f64::NAN, 1.0, 2.0]).into_dyn())
            .unwrap();
        collector
            .add(&arr1(&[f64::NAN, f64::NAN, 4.0]).into_dyn())
            .unwrap();

        let mean = collector.mean().unwrap();
        let sigma = collector.sigma().unwrap();
        // never valid
        assert!(mean[[0]].is_nan());
        assert!(sigma[[0]].is_nan());
        // exactly one valid value
        assert_eq!(mean[[1]], 1.0);
        assert!(sigma[[1]].is_nan());
        // two valid values
        assert_eq!(mean[[2]], 3.0);
        assert_relative_eq!(sigma[[2]], 2.0_f64.sqrt(), max_relative = 1e-12);

        assert_eq!(
            collector.count().unwrap(),
            &arr1(&[0.0, 1.0, 2.0]).into_dyn()
        );
    }

    #[test]
    fn test_constant_input_has_zero_sigma() {
        let mut collector = Collector::new();
        for _ in 0..1000 {
            collector.add(&scalar(0.1)).unwrap();
        }
        let sigma = collector.sigma().unwrap()[[0]];
        assert!(sigma >= 0.0);
        assert!(sigma < 1e-6);
    }

    #[test]
    fn test_array_weight_is_broadcast() {
        let mut collector = Collector::new();
        let points = arr2(&[[1.0, 2.0], [3.0, 4.0]]).into_dyn();
        let weight = Weight::from(arr1(&[2.0, 0.0]).into_dyn());
        collector.add_weighted(&points, &weight).unwrap();

        let count = collector.count().unwrap();
        assert_eq!(count, &arr2(&[[2.0, 0.0], [2.0, 0.0]]).into_dyn());
        let mean = collector.mean().unwrap();
        assert_eq!(mean[[0, 0]], 1.0);
        assert!(mean[[0, 1]].is_nan());
    }

    #[test]
    fn test_shape_mismatch_leaves_state_untouched() {
        let mut collector = Collector::new();
        collector.add(&arr1(&[1.0, 2.0]).into_dyn()).unwrap();

        let err = collector
            .add(&arr1(&[1.0, 2.0, 3.0]).into_dyn())
            .unwrap_err();
        assert_eq!(
            err,
            CollectorError::ShapeMismatch {
                expected: vec![2],
                found: vec![3],
            }
        );

        let bad_weight = Weight::from(arr1(&[1.0, 1.0, 1.0]).into_dyn());
        assert!(matches!(
            collector.add_weighted(&arr1(&[5.0, 5.0]).into_dyn(), &bad_weight),
            Err(CollectorError::Weight(_))
        ));

        assert_eq!(collector.count().unwrap(), &arr1(&[1.0, 1.0]).into_dyn());
    }

    #[test]
    fn test_accessors_do_not_mutate() {
        let mut collector = Collector::new();
        collector.add(&scalar(1.0)).unwrap();
        collector.add(&scalar(3.0)).unwrap();
        let first = collector.summary().unwrap();
        let second = collector.summary().unwrap();
        assert_eq!(first.mean, second.mean);
        assert_eq!(first.sigma, second.sigma);

        collector.add(&scalar(5.0)).unwrap();
        assert_eq!(collector.mean().unwrap()[[0]], 3.0);
    }
}
