//! Masterframe - combine calibration frames into master frames.
//!
//! A stack of equal-shape frames (bias frames in the canonical use) is reduced
//! pixel by pixel: samples outside a sigma-clipping window around a robust
//! center are rejected and the survivors averaged. The result is tagged with
//! `COMBINED = T` in its header.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use masterframe::{combine_and_write, master_path, CombineConfig, FrameType};
//!
//! // `catalog`, `loader` and `writer` come from the application's I/O layer
//! let bias = catalog.of_type(FrameType::Bias);
//! let config = CombineConfig::sigma_clipped(5.0, 5.0).with_memory_limit(2 << 30);
//! let out = master_path("masters", FrameType::Bias, &config);
//! let master = combine_and_write(&bias, &loader, &writer, FrameType::Bias, &config, &out)?;
//! ```

pub mod frame;
pub(crate) mod math;
pub(crate) mod stacking;

#[cfg(test)]
pub(crate) mod testing;

// ============================================================================
// Frame model
// ============================================================================

pub use frame::{
    COMBINED, Catalog, CatalogEntry, Frame, FrameLoader, FrameType, FrameWriter, Header,
    HeaderValue, IMAGETYP, MemoryStore, NCOMBINE, Shape,
};

// ============================================================================
// Combining
// ============================================================================

pub use stacking::{
    AllRejected, CenterEstimator, CombineConfig, CombineMethod, DispersionEstimator, Error,
    MEMORY_PERCENT, MemoryConfig, ProgressCallback, Rejection, SigmaClipConfig, StackingProgress,
    StackingStage, combine, combine_and_write, combine_paths, combine_paths_with_progress,
    combine_with_progress, master_filename, master_path,
};

// ============================================================================
// Statistics
// ============================================================================

pub use math::MAD_TO_SIGMA;
