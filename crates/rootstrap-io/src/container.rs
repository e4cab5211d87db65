//! Hierarchical histogram container files.
//!
//! A container is a JSON document holding a tree of named directories whose
//! leaves are N-dimensional histograms:
//!
//! ```json
//! {
//!   "kind": "directory",
//!   "entries": {
//!     "proton_dist": {
//!       "kind": "histogram",
//!       "shape": [3],
//!       "values": [1.0, 1.0, null],
//!       "edges": [[0.0, 1.0, 2.0, 3.0]]
//!     }
//!   }
//! }
//! ```
//!
//! Values are stored flattened in row-major order. Non-finite cells are written as
//! `null` and read back as `NaN`, so infinities do not survive a round trip.

use std::{
    collections::BTreeMap,
    fs::File,
    io::{BufReader, BufWriter, Write as _},
    path::{Path, PathBuf},
};

use ndarray::{ArrayD, IxDyn};
use rootstrap_engine::{Edges, Extracted};
use serde::{Deserialize, Serialize};

use crate::path::{self, ExtractError};

/// Navigation capabilities the dotted-path interpreter relies on.
pub trait ContainerNode {
    /// Named child of a directory; `None` for histograms and missing names.
    fn child(&self, name: &str) -> Option<&Self>;

    /// The histogram stored at this node, if it is one.
    fn as_histogram(&self) -> Option<&Histogram>;

    /// Children of a directory in name order; empty for histograms.
    fn children(&self) -> Box<dyn Iterator<Item = (&str, &Self)> + '_>;
}

/// A node of the container tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Node {
    Directory { entries: BTreeMap<String, Node> },
    Histogram(Histogram),
}

impl Node {
    #[must_use]
    pub fn directory() -> Self {
        Self::Directory {
            entries: BTreeMap::new(),
        }
    }
}

impl ContainerNode for Node {
    fn child(&self, name: &str) -> Option<&Self> {
        match self {
            Self::Directory { entries } => entries.get(name),
            Self::Histogram(_) => None,
        }
    }

    fn as_histogram(&self) -> Option<&Histogram> {
        match self {
            Self::Directory { .. } => None,
            Self::Histogram(histogram) => Some(histogram),
        }
    }

    fn children(&self) -> Box<dyn Iterator<Item = (&str, &Self)> + '_> {
        match self {
            Self::Directory { entries } => {
                Box::new(entries.iter().map(|(name, node)| (name.as_str(), node)))
            }
            Self::Histogram(_) => Box::new(std::iter::empty()),
        }
    }
}

/// A stored histogram: bin contents plus per-dimension edges.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Histogram {
    shape: Vec<usize>,
    #[serde(with = "nan_as_null")]
    values: Vec<f64>,
    edges: Edges,
}

/// Inconsistency between a histogram's shape, values and edges.
#[derive(Debug, Clone, PartialEq, Eq, derive_more::Display, derive_more::Error)]
pub enum HistogramError {
    #[display("shape {shape:?} holds more values than can be addressed")]
    ShapeOverflow { shape: Vec<usize> },
    #[display("shape {shape:?} holds {expected} values, found {found}")]
    ValueCount {
        shape: Vec<usize>,
        expected: usize,
        found: usize,
    },
    #[display("edges describe {found} dimensions, the histogram has {expected}")]
    EdgeDimensions { expected: usize, found: usize },
    #[display("axis {axis} has {bins} bins but {found} boundaries")]
    EdgeCount {
        axis: usize,
        bins: usize,
        found: usize,
    },
}

impl Histogram {
    /// Builds a histogram, checking that `edges` has `bins + 1` boundaries per dimension.
    pub fn new(values: &ArrayD<f64>, edges: Edges) -> Result<Self, HistogramError> {
        let histogram = Self {
            shape: values.shape().to_vec(),
            values: values.iter().copied().collect(),
            edges,
        };
        histogram.check()?;
        Ok(histogram)
    }

    #[must_use]
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    #[must_use]
    pub fn edges(&self) -> &Edges {
        &self.edges
    }

    /// Bin contents as an array of the stored shape.
    pub fn to_array(&self) -> Result<ArrayD<f64>, HistogramError> {
        self.check()?;
        ArrayD::from_shape_vec(IxDyn(&self.shape), self.values.clone()).map_err(|_| {
            HistogramError::ShapeOverflow {
                shape: self.shape.clone(),
            }
        })
    }

    pub fn to_extracted(&self) -> Result<Extracted, HistogramError> {
        Ok(Extracted::new(self.to_array()?, self.edges.clone()))
    }

    fn check(&self) -> Result<(), HistogramError> {
        let expected = self
            .shape
            .iter()
            .try_fold(1_usize, |acc, &n| acc.checked_mul(n))
            .ok_or_else(|| HistogramError::ShapeOverflow {
                shape: self.shape.clone(),
            })?;
        if self.values.len() != expected {
            return Err(HistogramError::ValueCount {
                shape: self.shape.clone(),
                expected,
                found: self.values.len(),
            });
        }
        if self.edges.ndim() != self.shape.len() {
            return Err(HistogramError::EdgeDimensions {
                expected: self.shape.len(),
                found: self.edges.ndim(),
            });
        }
        for (axis, (&bins, boundaries)) in self.shape.iter().zip(self.edges.axes()).enumerate() {
            if bins.checked_add(1) != Some(boundaries.len()) {
                return Err(HistogramError::EdgeCount {
                    axis,
                    bins,
                    found: boundaries.len(),
                });
            }
        }
        Ok(())
    }
}

/// Error raised while building or writing a container.
#[derive(Debug, derive_more::Display, derive_more::Error)]
pub enum WriteError {
    #[display("cannot write {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[display("cannot serialize container for {}: {source}", path.display())]
    Serialize {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[display("cannot insert at '{path}': {source}")]
    Path { path: String, source: ExtractError },
    #[display("'{path}' is already occupied")]
    Occupied { path: String },
    #[display("invalid histogram for '{path}': {source}")]
    Histogram {
        path: String,
        source: HistogramError,
    },
}

/// A whole container file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Container {
    root: Node,
}

impl Default for Container {
    fn default() -> Self {
        Self::new()
    }
}

impl Container {
    #[must_use]
    pub fn new() -> Self {
        Self {
            root: Node::directory(),
        }
    }

    #[must_use]
    pub fn root(&self) -> &Node {
        &self.root
    }

    /// Reads a container file.
    pub fn open(file: &Path) -> Result<Self, ExtractError> {
        let reader = File::open(file).map_err(|source| ExtractError::Io {
            path: file.to_owned(),
            source,
        })?;
        serde_json::from_reader(BufReader::new(reader)).map_err(|source| ExtractError::Parse {
            path: file.to_owned(),
            source,
        })
    }

    /// Writes the container to `file`, replacing any existing content.
    pub fn save(&self, file: &Path) -> Result<(), WriteError> {
        let io_error = |source| WriteError::Io {
            path: file.to_owned(),
            source,
        };
        let mut writer = BufWriter::new(File::create(file).map_err(io_error)?);
        serde_json::to_writer(&mut writer, self).map_err(|source| WriteError::Serialize {
            path: file.to_owned(),
            source,
        })?;
        writer.flush().map_err(io_error)
    }

    /// Stores `histogram` at the dotted `path`, creating intermediate directories.
    pub fn insert(&mut self, path: &str, histogram: Histogram) -> Result<(), WriteError> {
        let segments = path::split(path).map_err(|source| WriteError::Path {
            path: path.to_owned(),
            source,
        })?;
        let occupied = || WriteError::Occupied {
            path: path.to_owned(),
        };
        let Some((last, parents)) = segments.split_last() else {
            return Err(occupied());
        };

        let mut node = &mut self.root;
        for segment in parents {
            let Node::Directory { entries } = node else {
                return Err(occupied());
            };
            node = entries
                .entry((*segment).to_owned())
                .or_insert_with(Node::directory);
        }
        let Node::Directory { entries } = node else {
            return Err(occupied());
        };
        if entries.contains_key(*last) {
            return Err(occupied());
        }
        entries.insert((*last).to_owned(), Node::Histogram(histogram));
        Ok(())
    }
}

mod nan_as_null {
    use serde::{Deserialize as _, Deserializer, Serializer};

    pub(super) fn serialize<S>(values: &[f64], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_seq(values.iter().map(|&v| (!v.is_nan()).then_some(v)))
    }

    pub(super) fn deserialize<'de, D>(deserializer: D) -> Result<Vec<f64>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let values = Vec::<Option<f64>>::deserialize(deserializer)?;
        Ok(values.into_iter().map(|v| v.unwrap_or(f64::NAN)).collect())
    }
}
