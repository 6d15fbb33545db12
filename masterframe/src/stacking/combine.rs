//! Per-pixel reduction: rejection followed by the combine method.

use crate::math;
use crate::stacking::config::{AllRejected, CombineConfig, CombineMethod};
use crate::stacking::rejection::{Clipped, Rejection, ScratchBuffers};

impl CombineMethod {
    /// Reduce `values` to one number. May reorder `values`.
    pub(crate) fn apply(self, values: &mut [f32]) -> f32 {
        debug_assert!(!values.is_empty());
        match self {
            CombineMethod::Mean => math::mean_f32(values),
            CombineMethod::Median => math::median_f32_mut(values),
            CombineMethod::Sum => math::sum_f32(values),
        }
    }
}

/// Result for one output pixel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct PixelValue {
    pub value: f32,
    /// Set when every sample was rejected and the fallback policy applied.
    pub fallback: bool,
}

/// Rejection, combine method and all-rejected policy resolved for the pixel loop.
#[derive(Debug, Clone, Copy)]
pub(crate) struct PixelCombiner {
    method: CombineMethod,
    rejection: Rejection,
    all_rejected: AllRejected,
}

impl PixelCombiner {
    pub fn new(config: &CombineConfig) -> Self {
        Self {
            method: config.method,
            rejection: config.rejection,
            all_rejected: config.all_rejected,
        }
    }

    /// Combine one pixel sample. `values` is clobbered.
    pub fn combine(&self, values: &mut [f32], scratch: &mut ScratchBuffers) -> PixelValue {
        let keep_original =
            self.all_rejected == AllRejected::Unclipped && self.rejection.can_reject_all();
        if keep_original {
            scratch.original.clear();
            scratch.original.extend_from_slice(values);
        }

        match self.rejection.reject(values, scratch) {
            Clipped::Kept(n) => PixelValue {
                value: self.method.apply(&mut values[..n]),
                fallback: false,
            },
            Clipped::AllRejected { center } => {
                let value = match self.all_rejected {
                    AllRejected::Unclipped => self.method.apply(&mut scratch.original),
                    AllRejected::Center => center,
                };
                PixelValue {
                    value,
                    fallback: true,
                }
            }
        }
    }
}
