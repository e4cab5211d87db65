//! Dotted-path resolution inside a container.
//!
//! A path such as `"Results.PID.proton_dist"` is split on `.` and resolved one
//! segment at a time through [`ContainerNode::child`]. The final node must be a
//! histogram.

use std::path::{Path, PathBuf};

use rootstrap_engine::Extracted;
use tracing::debug;

use crate::container::{Container, ContainerNode, Histogram, HistogramError};

/// Error raised while extracting a histogram from a container file.
#[derive(Debug, derive_more::Display, derive_more::Error)]
pub enum ExtractError {
    #[display("cannot open {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[display("cannot parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[display("segment '{segment}' of '{path}' not found")]
    SegmentNotFound { segment: String, path: String },
    #[display("'{path}' is not a histogram")]
    NotAHistogram { path: String },
    #[display("empty path or path segment in '{path}'")]
    EmptyPath { path: String },
    #[display("malformed histogram at '{path}': {source}")]
    Malformed {
        path: String,
        source: HistogramError,
    },
}

/// Splits a dotted path into its segments, rejecting empty segments.
pub fn split(path: &str) -> Result<Vec<&str>, ExtractError> {
    let segments = path.split('.').collect::<Vec<_>>();
    if segments.iter().any(|s| s.is_empty()) {
        return Err(ExtractError::EmptyPath {
            path: path.to_owned(),
        });
    }
    Ok(segments)
}

/// Walks `path` from `root` and returns the node it designates.
pub fn resolve<'a, N>(root: &'a N, path: &str) -> Result<&'a N, ExtractError>
where
    N: ContainerNode,
{
    split(path)?.into_iter().try_fold(root, |node, segment| {
        node.child(segment)
            .ok_or_else(|| ExtractError::SegmentNotFound {
                segment: segment.to_owned(),
                path: path.to_owned(),
            })
    })
}

/// Resolves `path` from `root` and extracts the histogram found there.
pub fn extract_from<N>(root: &N, path: &str) -> Result<Extracted, ExtractError>
where
    N: ContainerNode,
{
    let histogram =
        resolve(root, path)?
            .as_histogram()
            .ok_or_else(|| ExtractError::NotAHistogram {
                path: path.to_owned(),
            })?;
    histogram
        .to_extracted()
        .map_err(|source| ExtractError::Malformed {
            path: path.to_owned(),
            source,
        })
}

/// Opens a container file and extracts the histogram at the dotted `path`.
///
/// The file is read and dropped within the call.
pub fn extract(file: &Path, path: &str) -> Result<Extracted, ExtractError> {
    debug!(file = %file.display(), path, "extracting");
    let container = Container::open(file)?;
    extract_from(container.root(), path)
}

/// Every histogram below `root`, with its dotted path, in depth-first name order.
pub fn histograms<N>(root: &N) -> Vec<(String, &Histogram)>
where
    N: ContainerNode,
{
    fn walk<'a, N: ContainerNode>(
        node: &'a N,
        prefix: &str,
        found: &mut Vec<(String, &'a Histogram)>,
    ) {
        for (name, child) in node.children() {
            let path = if prefix.is_empty() {
                name.to_owned()
            } else {
                format!("{prefix}.{name}")
            };
            match child.as_histogram() {
                Some(histogram) => found.push((path, histogram)),
                None => walk(child, &path, found),
            }
        }
    }

    let mut found = vec![];
    walk(root, "", &mut found);
    found
}
