//! Error types for combine operations.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::frame::Shape;

/// Errors that can occur while combining frames.
#[derive(Debug, Error)]
pub enum Error {
    #[error("No frames provided for combining")]
    EmptyStack,

    #[error("Combining requires at least {required} frames, got {actual}")]
    NotEnoughFrames { required: usize, actual: usize },

    #[error("Shape mismatch for frame {index}: expected {expected}, got {actual}")]
    ShapeMismatch {
        index: usize,
        expected: Shape,
        actual: Shape,
    },

    #[error("Failed to load frame '{path}': {source}")]
    Load {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to write master frame '{path}': {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to create cache directory '{path}': {source}")]
    CreateCacheDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to create cache file '{path}': {source}")]
    CreateCacheFile {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to write cache file '{path}': {source}")]
    WriteCacheFile {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to open cache file '{path}': {source}")]
    OpenCacheFile {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to memory-map cache file '{path}': {source}")]
    MmapCacheFile {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}
