//! Memory budget for combining.
//!
//! The budget decides two things: whether a loaded stack stays in RAM or is
//! spilled to a memory-mapped disk cache, and how many rows are reduced per
//! block. Without an explicit limit the budget is 75% of the memory the
//! system currently reports as available.

use std::mem::size_of;
use std::path::PathBuf;

/// Minimum rows per block. A single row of every frame must always fit.
pub const MIN_CHUNK_ROWS: usize = 1;

/// Percentage of available system memory used when no limit is set.
pub const MEMORY_PERCENT: u64 = 75;

/// Memory and disk-cache behavior of a combine run.
#[derive(Debug, Clone, PartialEq)]
pub struct MemoryConfig {
    /// Soft cap on stack memory in bytes. `None` uses a share of available RAM.
    pub limit: Option<u64>,
    /// Directory for spilled frames.
    pub cache_dir: PathBuf,
    /// Keep spilled frames after combining.
    pub keep_cache: bool,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            limit: None,
            cache_dir: std::env::temp_dir().join("masterframe_cache"),
            keep_cache: false,
        }
    }
}

impl MemoryConfig {
    pub fn with_limit(limit: u64) -> Self {
        Self {
            limit: Some(limit),
            ..Default::default()
        }
    }

    pub fn with_cache_dir(mut self, cache_dir: impl Into<PathBuf>) -> Self {
        self.cache_dir = cache_dir.into();
        self
    }

    /// Bytes available for frame data: the explicit limit, or
    /// [`MEMORY_PERCENT`] of available system memory.
    pub fn usable_memory(&self) -> u64 {
        self.limit
            .unwrap_or_else(|| available_system_memory() * MEMORY_PERCENT / 100)
    }
}

/// Get available system memory in bytes.
fn available_system_memory() -> u64 {
    use sysinfo::System;

    let mut sys = System::new();
    sys.refresh_memory();
    sys.available_memory()
}

/// Bytes needed to hold `frame_count` frames of `pixel_count` pixels.
///
/// `None` on overflow, which callers treat as "does not fit".
pub fn stack_bytes(pixel_count: usize, frame_count: usize) -> Option<u64> {
    pixel_count
        .checked_mul(size_of::<f32>())
        .and_then(|v| v.checked_mul(frame_count))
        .map(|v| v as u64)
}

/// Check if a whole stack fits in `usable_memory`.
pub fn fits_in_memory(pixel_count: usize, frame_count: usize, usable_memory: u64) -> bool {
    stack_bytes(pixel_count, frame_count).is_some_and(|bytes| bytes <= usable_memory)
}

/// Rows per block so that one block of every frame fits in `usable_memory`.
///
/// Clamped to `[MIN_CHUNK_ROWS, rows]`.
pub fn compute_chunk_rows(
    row_len: usize,
    frame_count: usize,
    rows: usize,
    usable_memory: u64,
) -> usize {
    let bytes_per_row = stack_bytes(row_len, frame_count).unwrap_or(u64::MAX);

    let chunk_rows = if bytes_per_row == 0 {
        rows
    } else {
        usize::try_from(usable_memory / bytes_per_row).unwrap_or(usize::MAX)
    };
    let chunk_rows = chunk_rows.clamp(MIN_CHUNK_ROWS, rows.max(MIN_CHUNK_ROWS));

    tracing::info!(
        usable_memory_mb = usable_memory / (1024 * 1024),
        row_len,
        frame_count,
        bytes_per_row,
        chunk_rows,
        "Adaptive chunk sizing computed"
    );

    chunk_rows
}
