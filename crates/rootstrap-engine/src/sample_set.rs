use ndarray::{ArrayD, ArrayViewD, Axis, IxDyn};

use crate::{Edges, reader::Extracted, resample::DrawWeights};

/// The per-file histograms of one registered source.
///
/// Holds a stack of per-file arrays of identical shape, with the file index as the
/// trailing axis, plus the edges taken from the first file. A sample set is immutable
/// once built; resampling only changes the weights passed to [`values`](Self::values).
///
/// # Example
///
/// ```
/// use ndarray::arr1;
/// use rootstrap_engine::{DrawWeights, Edges, Extracted, SampleSetBuilder};
///
/// let mut builder = SampleSetBuilder::new("proton", "proton_dist");
/// for content in [1.0, 2.0, 3.0] {
///     builder
///         .push(Extracted::new(arr1(&[content, content]).into_dyn(), Edges::from_shape(&[2])))
///         .unwrap();
/// }
/// let set = builder.finish().unwrap();
///
/// assert_eq!(set.integrated_sample(), arr1(&[6.0, 6.0]).into_dyn());
/// let weights = DrawWeights::from_counts(vec![0, 0, 3]);
/// assert_eq!(set.values(&weights).unwrap(), arr1(&[9.0, 9.0]).into_dyn());
/// ```
#[derive(Debug, Clone)]
pub struct SampleSet {
    name: String,
    path: String,
    edges: Edges,
    stack: ArrayD<f64>,
}

/// Error raised while building or querying a [`SampleSet`].
#[derive(Debug, Clone, PartialEq, Eq, derive_more::Display, derive_more::Error)]
pub enum SampleSetError {
    #[display("file #{file_index} has shape {found:?}, expected {expected:?}")]
    ShapeMismatch {
        file_index: usize,
        expected: Vec<usize>,
        found: Vec<usize>,
    },
    #[display("no files to build the sample set from")]
    NoFiles,
    #[display("got {found} weights for {expected} files")]
    WeightCount { expected: usize, found: usize },
}

impl SampleSet {
    /// Name the source was registered under.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Dotted path the content was extracted from.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Edges taken from the first file.
    #[must_use]
    pub fn edges(&self) -> &Edges {
        &self.edges
    }

    /// Shape of one file's histogram.
    #[must_use]
    pub fn shape(&self) -> &[usize] {
        let shape = self.stack.shape();
        &shape[..shape.len() - 1]
    }

    /// Number of files in the stack.
    #[must_use]
    pub fn file_count(&self) -> usize {
        self.stack.len_of(self.file_axis())
    }

    /// Histogram of a single file.
    #[must_use]
    pub fn file(&self, file_index: usize) -> Option<ArrayViewD<'_, f64>> {
        (file_index < self.file_count())
            .then(|| self.stack.index_axis(self.file_axis(), file_index))
    }

    /// Weighted sum over files: `Σ_i weights[i] · file_i`.
    ///
    /// Files with zero weight are skipped entirely, so a file left out of a resample
    /// never contributes, even if it contains `NaN` cells.
    pub fn values(&self, weights: &DrawWeights) -> Result<ArrayD<f64>, SampleSetError> {
        if weights.len() != self.file_count() {
            return Err(SampleSetError::WeightCount {
                expected: self.file_count(),
                found: weights.len(),
            });
        }
        let mut sum = ArrayD::zeros(IxDyn(self.shape()));
        for (file, weight) in self.stack.axis_iter(self.file_axis()).zip(weights.iter()) {
            if weight != 0 {
                sum.scaled_add(f64::from(weight), &file);
            }
        }
        Ok(sum)
    }

    /// Unweighted sum over all files: the full, non-resampled ensemble.
    #[must_use]
    pub fn integrated_sample(&self) -> ArrayD<f64> {
        self.stack.sum_axis(self.file_axis())
    }

    fn file_axis(&self) -> Axis {
        Axis(self.stack.ndim() - 1)
    }
}

/// Incremental, all-or-nothing construction of a [`SampleSet`].
///
/// Files must be pushed in file-index order. The first file fixes the shape and the
/// edges; every later file must match that shape exactly. A builder that reported an
/// error should be dropped: only [`finish`](Self::finish) yields a usable set.
#[derive(Debug, Clone)]
pub struct SampleSetBuilder {
    name: String,
    path: String,
    edges: Option<Edges>,
    files: Vec<ArrayD<f64>>,
}

impl SampleSetBuilder {
    pub fn new(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            edges: None,
            files: vec![],
        }
    }

    /// Appends the next file's histogram.
    pub fn push(&mut self, extracted: Extracted) -> Result<(), SampleSetError> {
        let Extracted { values, edges } = extracted;
        if let Some(first) = self.files.first()
            && first.shape() != values.shape()
        {
            return Err(SampleSetError::ShapeMismatch {
                file_index: self.files.len(),
                expected: first.shape().to_vec(),
                found: values.shape().to_vec(),
            });
        }
        self.edges.get_or_insert(edges);
        self.files.push(values);
        Ok(())
    }

    /// Stacks the pushed files along a new trailing axis.
    pub fn finish(self) -> Result<SampleSet, SampleSetError> {
        let (Some(edges), Some(first)) = (self.edges, self.files.first()) else {
            return Err(SampleSetError::NoFiles);
        };
        let mut shape = first.shape().to_vec();
        let file_axis = Axis(shape.len());
        shape.push(self.files.len());

        let mut stack = ArrayD::zeros(IxDyn(&shape));
        for (mut slot, file) in stack.axis_iter_mut(file_axis).zip(&self.files) {
            slot.assign(file);
        }
        Ok(SampleSet {
            name: self.name,
            path: self.path,
            edges,
            stack,
        })
    }
}
