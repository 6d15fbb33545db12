//! Combine configuration.
//!
//! A single `CombineConfig` holds the combination method, pixel rejection,
//! the all-rejected fallback and memory settings.

use strum_macros::Display;

use crate::stacking::memory::MemoryConfig;
use crate::stacking::rejection::{Rejection, SigmaClipConfig};

/// Method for combining the surviving pixel values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display)]
#[strum(serialize_all = "lowercase")]
pub enum CombineMethod {
    /// Arithmetic mean.
    #[default]
    Mean,
    /// Median value.
    Median,
    /// Sum of values.
    Sum,
}

/// What a pixel becomes when rejection leaves no survivors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display)]
#[strum(serialize_all = "snake_case")]
pub enum AllRejected {
    /// Apply the combine method to every value, ignoring rejection.
    #[default]
    Unclipped,
    /// Use the center estimate of the rejecting pass.
    Center,
}

/// Configuration for combining a frame stack.
///
/// # Examples
///
/// ```
/// use masterframe::{CombineConfig, MemoryConfig, Rejection};
///
/// // Sigma-clipped mean with asymmetric thresholds
/// let config = CombineConfig::sigma_clipped(5.0, 5.0);
///
/// // Struct update syntax for custom settings
/// let config = CombineConfig {
///     rejection: Rejection::Extrema { n_low: 1, n_high: 1 },
///     memory: MemoryConfig::with_limit(256 * 1024 * 1024),
///     ..Default::default()
/// };
/// config.validate();
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct CombineConfig {
    /// How to combine pixel values across frames.
    pub method: CombineMethod,
    /// Pixel rejection applied before combining.
    pub rejection: Rejection,
    /// Fallback for fully rejected pixels.
    pub all_rejected: AllRejected,
    /// Fewest frames accepted. Below this the combine fails.
    pub min_frames: usize,
    /// Memory budget and disk cache.
    pub memory: MemoryConfig,
}

impl Default for CombineConfig {
    fn default() -> Self {
        Self {
            method: CombineMethod::Mean,
            rejection: Rejection::default(),
            all_rejected: AllRejected::Unclipped,
            min_frames: 1,
            memory: MemoryConfig::default(),
        }
    }
}

impl CombineConfig {
    // ========== Presets ==========

    /// Preset: sigma-clipped mean around the median with MAD dispersion.
    pub fn sigma_clipped(sigma_low: f32, sigma_high: f32) -> Self {
        Self {
            rejection: Rejection::SigmaClip(SigmaClipConfig::new_asymmetric(
                sigma_low, sigma_high,
            )),
            ..Default::default()
        }
    }

    /// Preset: plain mean, no rejection.
    pub fn mean() -> Self {
        Self {
            method: CombineMethod::Mean,
            rejection: Rejection::None,
            ..Default::default()
        }
    }

    /// Preset: median, no explicit rejection.
    pub fn median() -> Self {
        Self {
            method: CombineMethod::Median,
            rejection: Rejection::None,
            ..Default::default()
        }
    }

    /// Preset: mean of values within fixed bounds.
    pub fn min_max(low: Option<f32>, high: Option<f32>) -> Self {
        Self {
            rejection: Rejection::MinMax { low, high },
            ..Default::default()
        }
    }

    /// Preset: mean after dropping the lowest and highest samples.
    pub fn extrema(n_low: usize, n_high: usize) -> Self {
        Self {
            rejection: Rejection::Extrema { n_low, n_high },
            ..Default::default()
        }
    }

    // ========== Builders ==========

    pub fn with_memory_limit(mut self, limit: u64) -> Self {
        self.memory.limit = Some(limit);
        self
    }

    pub fn with_all_rejected(mut self, all_rejected: AllRejected) -> Self {
        self.all_rejected = all_rejected;
        self
    }

    pub fn with_min_frames(mut self, min_frames: usize) -> Self {
        self.min_frames = min_frames;
        self
    }

    // ========== Validation ==========

    /// Validate configuration parameters.
    ///
    /// # Panics
    ///
    /// Panics on non-positive sigma, zero iterations, inverted min/max
    /// bounds or a zero memory limit.
    pub fn validate(&self) {
        self.rejection.validate();
        if let Some(limit) = self.memory.limit {
            assert!(limit > 0, "Memory limit must be positive");
        }
    }
}
