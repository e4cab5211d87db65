//! Online statistics for bootstrap resampling.
//!
//! This crate provides the accumulation side of the bootstrap engine:
//!
//! - **Collector**: running weighted sum, sum of squares and count per array cell,
//!   exposing the weighted mean and the unbiased sample standard deviation on demand
//! - **Numeric helpers**: NaN masking and weight broadcasting shared with the engine
//!
//! # Modules
//!
//! - [`collector`]: Online weighted mean/variance accumulator over N-dimensional arrays
//! - [`numeric`]: Weight broadcasting and NaN-masking conventions
//!
//! # Precision
//!
//! All accumulation happens in `f64`. Stable Rust has no wider IEEE float type, so
//! `f64` is the widest precision available; callers accumulating very long runs of
//! large values should expect the usual `f64` cancellation limits in `sigma()`.
//!
//! # Examples
//!
//! ## Mean and standard deviation of a scalar sequence
//!
//! ```
//! use ndarray::arr1;
//! use rootstrap_stats::collector::Collector;
//!
//! let mut collector = Collector::new();
//! for x in [1.0, 2.0, 3.0, 4.0, 5.0] {
//!     collector.add(&arr1(&[x]).into_dyn()).unwrap();
//! }
//! assert_eq!(collector.mean().unwrap()[[0]], 3.0);
//! ```
//!
//! ## Masking invalid cells
//!
//! ```
//! use ndarray::arr1;
//! use rootstrap_stats::collector::Collector;
//!
//! let mut collector = Collector::new();
//! collector.add(&arr1(&[1.0, f64::NAN]).into_dyn()).unwrap();
//! let mean = collector.mean().unwrap();
//! assert_eq!(mean[[0]], 1.0);
//! assert!(mean[[1]].is_nan());
//! ```

pub mod collector;
pub mod numeric;
