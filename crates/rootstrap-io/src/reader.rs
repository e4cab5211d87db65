use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
    thread,
};

use rootstrap_engine::{CallbackError, Extracted, ReadError, SourceReader};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    container::{Container, ContainerNode as _},
    merge,
    path::{self, ExtractError},
};

/// Layout of histograms split across the top-level directories of each file.
///
/// When enabled, a source path `p` is looked up as `d.p` under every top-level
/// directory `d`, and the fragments found are merged with [`merge::merge`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplitStorage {
    /// Axis to concatenate fragments along; `None` stacks them along a new leading axis.
    pub axis: Option<usize>,
}

/// A [`SourceReader`] over a list of container files on disk.
///
/// Files are extracted concurrently by a bounded number of scoped worker threads.
/// Each worker handles a contiguous chunk of the file list, so results come back
/// in file-index order whatever order the workers finish in.
#[derive(Debug, Clone)]
pub struct FileSetReader {
    files: Vec<PathBuf>,
    workers: usize,
    split: Option<SplitStorage>,
}

impl FileSetReader {
    pub const DEFAULT_WORKERS: usize = 10;

    #[must_use]
    pub fn new(files: Vec<PathBuf>) -> Self {
        Self {
            files,
            workers: Self::DEFAULT_WORKERS,
            split: None,
        }
    }

    /// Sets the maximum number of concurrent extractions (at least 1).
    #[must_use]
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    #[must_use]
    pub fn with_split(mut self, split: Option<SplitStorage>) -> Self {
        self.split = split;
        self
    }

    #[must_use]
    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }

    #[must_use]
    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Extracts the histogram at the dotted `path` from a single file.
    pub fn read_file(&self, file: &Path, path: &str) -> Result<Extracted, CallbackError> {
        let Some(split) = self.split else {
            return Ok(path::extract(file, path)?);
        };

        debug!(file = %file.display(), path, "extracting split fragments");
        let container = Container::open(file)?;
        let mut fragments = BTreeMap::new();
        for (dir, node) in container.root().children() {
            if node.as_histogram().is_some() {
                continue;
            }
            match path::extract_from(node, path) {
                Ok(fragment) => {
                    fragments.insert(format!("{dir}.{path}"), fragment);
                }
                Err(ExtractError::SegmentNotFound { .. }) => {}
                Err(err) => return Err(err.into()),
            }
        }
        Ok(merge::merge(&fragments, path, split.axis)?)
    }
}

impl SourceReader for FileSetReader {
    fn file_count(&self) -> usize {
        self.files.len()
    }

    fn file_label(&self, file_index: usize) -> String {
        self.files.get(file_index).map_or_else(
            || format!("#{file_index}"),
            |file| file.display().to_string(),
        )
    }

    fn read_all(&self, path: &str) -> Result<Vec<Extracted>, ReadError> {
        if self.files.is_empty() {
            return Ok(vec![]);
        }
        let chunk_size = self.files.len().div_ceil(self.workers);

        let results = thread::scope(|s| {
            let handles = self
                .files
                .chunks(chunk_size)
                .map(|chunk| {
                    s.spawn(move || {
                        chunk
                            .iter()
                            .map(|file| self.read_file(file, path))
                            .collect::<Vec<_>>()
                    })
                })
                .collect::<Vec<_>>();
            handles
                .into_iter()
                .flat_map(|handle| {
                    handle
                        .join()
                        .unwrap_or_else(|payload| std::panic::resume_unwind(payload))
                })
                .collect::<Vec<_>>()
        });

        results
            .into_iter()
            .enumerate()
            .map(|(file_index, result)| {
                result.map_err(|source| ReadError {
                    file_index,
                    file: self.file_label(file_index),
                    source,
                })
            })
            .collect()
    }
}
