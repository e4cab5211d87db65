//! Boundary between the engine and the file-format layer.
//!
//! The engine never opens files itself. It asks a [`SourceReader`] for the content
//! stored under a dotted path in every input file, and receives one [`Extracted`]
//! histogram per file, in file-index order.

use std::{collections::BTreeMap, fmt};

use ndarray::ArrayD;

use crate::{CallbackError, Edges};

/// Histogram content extracted from one file.
#[derive(Debug, Clone, PartialEq)]
pub struct Extracted {
    /// Bin contents.
    pub values: ArrayD<f64>,
    /// Bin boundaries, one sequence per dimension of `values`.
    pub edges: Edges,
}

impl Extracted {
    #[must_use]
    pub fn new(values: ArrayD<f64>, edges: Edges) -> Self {
        Self { values, edges }
    }
}

/// Supplies per-file histogram content to the engine.
///
/// Implementations may extract files concurrently, but [`read_all`](Self::read_all)
/// must return the results ordered by file index: element `i` belongs to file `i`.
pub trait SourceReader: fmt::Debug {
    /// Number of input files.
    fn file_count(&self) -> usize;

    /// Human-readable identification of a file, used in error messages.
    fn file_label(&self, file_index: usize) -> String {
        format!("#{file_index}")
    }

    /// Extracts the histogram stored under the dotted `path` from every file.
    fn read_all(&self, path: &str) -> Result<Vec<Extracted>, ReadError>;
}

/// Extraction failure for one file.
#[derive(Debug, derive_more::Display)]
#[display("failed to extract from file {file}: {source}")]
pub struct ReadError {
    /// Index of the offending file.
    pub file_index: usize,
    /// Label of the offending file (usually its path).
    pub file: String,
    /// Underlying failure.
    pub source: CallbackError,
}

impl std::error::Error for ReadError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&*self.source)
    }
}

/// A [`SourceReader`] over histograms held in memory.
///
/// Each file is a map from dotted path to histogram content.
///
/// # Example
///
/// ```
/// use ndarray::arr1;
/// use rootstrap_engine::{Edges, Extracted, reader::{MemoryReader, SourceReader}};
///
/// let mut reader = MemoryReader::new();
/// for i in 0..3 {
///     reader.push_file([(
///         "hist".to_owned(),
///         Extracted::new(arr1(&[f64::from(i)]).into_dyn(), Edges::from_shape(&[1])),
///     )]);
/// }
/// assert_eq!(reader.file_count(), 3);
/// assert_eq!(reader.read_all("hist").unwrap().len(), 3);
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemoryReader {
    files: Vec<BTreeMap<String, Extracted>>,
}

/// Error of a [`MemoryReader`] lookup.
#[derive(Debug, Clone, PartialEq, Eq, derive_more::Display, derive_more::Error)]
#[display("path '{path}' not found")]
pub struct MissingPathError {
    #[error(not(source))]
    pub path: String,
}

impl MemoryReader {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a file with the given `(path, content)` entries.
    pub fn push_file<I>(&mut self, entries: I)
    where
        I: IntoIterator<Item = (String, Extracted)>,
    {
        self.files.push(entries.into_iter().collect());
    }
}

impl SourceReader for MemoryReader {
    fn file_count(&self) -> usize {
        self.files.len()
    }

    fn read_all(&self, path: &str) -> Result<Vec<Extracted>, ReadError> {
        self.files
            .iter()
            .enumerate()
            .map(|(file_index, file)| {
                file.get(path).cloned().ok_or_else(|| ReadError {
                    file_index,
                    file: self.file_label(file_index),
                    source: Box::new(MissingPathError {
                        path: path.to_owned(),
                    }),
                })
            })
            .collect()
    }
}
