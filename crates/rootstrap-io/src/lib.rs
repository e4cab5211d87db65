//! File-format side of `rootstrap`.
//!
//! Histograms live in JSON [`container`] files as a tree of directories. The
//! [`path`] module resolves dotted paths in that tree, [`merge`] reassembles
//! histograms split across sibling directories, and [`FileSetReader`] feeds the
//! bootstrap engine from a list of container files. [`export`] turns results back
//! into a container.

pub use self::reader::{FileSetReader, SplitStorage};

pub mod container;
pub mod export;
pub mod merge;
pub mod path;
mod reader;
