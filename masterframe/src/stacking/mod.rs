//! Combining frame stacks into master frames.

mod cache;
mod combine;
mod config;
mod error;
mod memory;
mod progress;
mod rejection;
mod stack;


pub use config::{AllRejected, CombineConfig, CombineMethod};
pub use error::Error;
pub use memory::{MEMORY_PERCENT, MemoryConfig};
pub use progress::{ProgressCallback, StackingProgress, StackingStage};
pub use rejection::{CenterEstimator, DispersionEstimator, Rejection, SigmaClipConfig};
pub use stack::{
    combine, combine_and_write, combine_paths, combine_paths_with_progress,
    combine_with_progress, master_filename, master_path,
};
