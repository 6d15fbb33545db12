//! Pixel rejection algorithms applied across the stack before combining.
//!
//! - Sigma clipping with a configurable center and dispersion estimator
//! - Min/max value bounds
//! - Extrema clipping (drop the N lowest and highest samples)

use strum_macros::Display;

use crate::math::{self, mad_std_f32, median_f32_with_scratch};

/// Reusable per-task buffers so the pixel loop does not allocate.
#[derive(Debug, Default)]
pub(crate) struct ScratchBuffers {
    /// Statistics workspace (median selection, absolute deviations).
    pub floats: Vec<f32>,
    /// Copy of the unclipped sample for the all-rejected fallback.
    pub original: Vec<f32>,
}

impl ScratchBuffers {
    pub fn with_capacity(frame_count: usize) -> Self {
        Self {
            floats: Vec::with_capacity(frame_count),
            original: Vec::with_capacity(frame_count),
        }
    }
}

/// Outcome of rejecting one pixel sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum Clipped {
    /// `values[..n]` holds the surviving samples.
    Kept(usize),
    /// Every sample fell outside the window. Carries the center estimate of
    /// the pass that rejected them.
    AllRejected { center: f32 },
}

/// Central estimate used by sigma clipping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display)]
#[strum(serialize_all = "snake_case")]
pub enum CenterEstimator {
    #[default]
    Median,
    Mean,
}

impl CenterEstimator {
    pub fn estimate(self, values: &[f32], scratch: &mut Vec<f32>) -> f32 {
        match self {
            CenterEstimator::Median => median_f32_with_scratch(values, scratch),
            CenterEstimator::Mean => math::mean_f32(values),
        }
    }
}

/// Dispersion estimate used by sigma clipping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display)]
#[strum(serialize_all = "snake_case")]
pub enum DispersionEstimator {
    /// Median absolute deviation about the median, scaled by 1.4826.
    #[default]
    MadStd,
    /// Population standard deviation about the mean.
    Std,
}

impl DispersionEstimator {
    pub fn estimate(self, values: &[f32], scratch: &mut Vec<f32>) -> f32 {
        match self {
            DispersionEstimator::MadStd => mad_std_f32(values, scratch),
            DispersionEstimator::Std => math::std_f32(values),
        }
    }
}

/// Configuration for sigma clipping.
///
/// A value `v` survives a pass when
/// `center - sigma_low * dispersion <= v <= center + sigma_high * dispersion`.
/// Both bounds are inclusive, so a zero dispersion keeps exactly the values
/// equal to the center.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SigmaClipConfig {
    pub center: CenterEstimator,
    pub dispersion: DispersionEstimator,
    /// Sigma threshold for low outliers (below center).
    pub sigma_low: f32,
    /// Sigma threshold for high outliers (above center).
    pub sigma_high: f32,
    /// Maximum number of clipping passes. Stops early once a pass rejects nothing.
    pub max_iterations: u32,
}

impl Default for SigmaClipConfig {
    fn default() -> Self {
        Self {
            center: CenterEstimator::Median,
            dispersion: DispersionEstimator::MadStd,
            sigma_low: 3.0,
            sigma_high: 3.0,
            max_iterations: 1,
        }
    }
}

impl SigmaClipConfig {
    /// Symmetric single-pass clipping around the median with MAD dispersion.
    pub fn new(sigma: f32) -> Self {
        assert!(sigma > 0.0, "Sigma must be positive");
        Self {
            sigma_low: sigma,
            sigma_high: sigma,
            ..Default::default()
        }
    }

    /// Asymmetric single-pass clipping around the median with MAD dispersion.
    pub fn new_asymmetric(sigma_low: f32, sigma_high: f32) -> Self {
        assert!(sigma_low > 0.0, "Sigma low must be positive");
        assert!(sigma_high > 0.0, "Sigma high must be positive");
        Self {
            sigma_low,
            sigma_high,
            ..Default::default()
        }
    }

    pub fn with_center(mut self, center: CenterEstimator) -> Self {
        self.center = center;
        self
    }

    pub fn with_dispersion(mut self, dispersion: DispersionEstimator) -> Self {
        self.dispersion = dispersion;
        self
    }

    pub fn with_max_iterations(mut self, max_iterations: u32) -> Self {
        assert!(max_iterations > 0, "Max iterations must be at least 1");
        self.max_iterations = max_iterations;
        self
    }

    pub fn validate(&self) {
        assert!(self.sigma_low > 0.0, "Sigma low must be positive");
        assert!(self.sigma_high > 0.0, "Sigma high must be positive");
        assert!(self.max_iterations > 0, "Max iterations must be at least 1");
    }

    /// Partition `values` so that survivors come first, keeping their order.
    pub(crate) fn reject(&self, values: &mut [f32], scratch: &mut ScratchBuffers) -> Clipped {
        debug_assert!(!values.is_empty());

        let mut len = values.len();

        for _ in 0..self.max_iterations {
            let active = &values[..len];
            let center = self.center.estimate(active, &mut scratch.floats);
            let dispersion = self.dispersion.estimate(active, &mut scratch.floats);

            let low = center - self.sigma_low * dispersion;
            let high = center + self.sigma_high * dispersion;

            let kept = retain_in_range(&mut values[..len], low, high);
            if kept == 0 {
                return Clipped::AllRejected { center };
            }
            if kept == len {
                break;
            }
            len = kept;
        }

        Clipped::Kept(len)
    }
}

/// Move values within `[low, high]` to the front, preserving order.
fn retain_in_range(values: &mut [f32], low: f32, high: f32) -> usize {
    let mut write_idx = 0;
    for read_idx in 0..values.len() {
        let v = values[read_idx];
        if v >= low && v <= high {
            values[write_idx] = v;
            write_idx += 1;
        }
    }
    write_idx
}

/// Pixel rejection algorithm applied before combining.
#[derive(Debug, Clone, Copy, PartialEq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum Rejection {
    /// No rejection.
    None,
    /// Sigma clipping around a central estimate.
    SigmaClip(SigmaClipConfig),
    /// Reject values outside fixed bounds. A missing bound is unbounded.
    MinMax { low: Option<f32>, high: Option<f32> },
    /// Drop the `n_low` lowest and `n_high` highest samples. When that would
    /// drop every sample, nothing is dropped.
    Extrema { n_low: usize, n_high: usize },
}

impl Default for Rejection {
    fn default() -> Self {
        Self::SigmaClip(SigmaClipConfig::default())
    }
}

impl Rejection {
    /// Symmetric sigma clipping with default estimators.
    pub fn sigma_clip(sigma: f32) -> Self {
        Self::SigmaClip(SigmaClipConfig::new(sigma))
    }

    /// Asymmetric sigma clipping with default estimators.
    pub fn sigma_clip_asymmetric(sigma_low: f32, sigma_high: f32) -> Self {
        Self::SigmaClip(SigmaClipConfig::new_asymmetric(sigma_low, sigma_high))
    }

    pub fn validate(&self) {
        match self {
            Rejection::None | Rejection::Extrema { .. } => {}
            Rejection::SigmaClip(config) => config.validate(),
            Rejection::MinMax { low, high } => {
                if let (Some(low), Some(high)) = (low, high) {
                    assert!(
                        low <= high,
                        "Min/max low bound {} must not exceed high bound {}",
                        low,
                        high
                    );
                }
            }
        }
    }

    /// Whether this rejection can leave a sample with no survivors.
    pub(crate) fn can_reject_all(&self) -> bool {
        matches!(self, Rejection::SigmaClip(_) | Rejection::MinMax { .. })
    }

    /// Partition `values` so that survivors come first.
    pub(crate) fn reject(&self, values: &mut [f32], scratch: &mut ScratchBuffers) -> Clipped {
        match self {
            Rejection::None => Clipped::Kept(values.len()),
            Rejection::SigmaClip(config) => config.reject(values, scratch),
            Rejection::MinMax { low, high } => {
                let low = low.unwrap_or(f32::NEG_INFINITY);
                let high = high.unwrap_or(f32::INFINITY);
                if !values.iter().any(|&v| v >= low && v <= high) {
                    let center = math::median_f32_mut(values);
                    return Clipped::AllRejected { center };
                }
                Clipped::Kept(retain_in_range(values, low, high))
            }
            Rejection::Extrema { n_low, n_high } => {
                let len = values.len();
                if n_low + n_high >= len {
                    return Clipped::Kept(len);
                }
                values.sort_unstable_by(f32::total_cmp);
                values.copy_within(*n_low..len - n_high, 0);
                Clipped::Kept(len - n_low - n_high)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reject(rejection: Rejection, values: &[f32]) -> (Clipped, Vec<f32>) {
        let mut values = values.to_vec();
        let mut scratch = ScratchBuffers::default();
        let clipped = rejection.reject(&mut values, &mut scratch);
        let kept = match clipped {
            Clipped::Kept(n) => values[..n].to_vec(),
            Clipped::AllRejected { .. } => Vec::new(),
        };
        (clipped, kept)
    }

    fn std_clip(sigma: f32) -> Rejection {
        Rejection::SigmaClip(SigmaClipConfig::new(sigma).with_dispersion(DispersionEstimator::Std))
    }

    #[test]
    fn test_sigma_clip_rejects_outlier() {
        let values = [10.0, 11.0, 9.0, 10.5, 9.5, 10.0, 100.0];
        let (clipped, kept) = reject(Rejection::sigma_clip(3.0), &values);
        assert_eq!(clipped, Clipped::Kept(6));
        assert!(!kept.contains(&100.0));
        // order of survivors is preserved
        assert_eq!(kept, vec![10.0, 11.0, 9.0, 10.5, 9.5, 10.0]);
    }

    #[test]
    fn test_sigma_clip_single_value_kept() {
        let (clipped, kept) = reject(Rejection::sigma_clip(0.1), &[42.0]);
        assert_eq!(clipped, Clipped::Kept(1));
        assert_eq!(kept, vec![42.0]);
    }

    #[test]
    fn test_sigma_clip_identical_values_kept() {
        let (clipped, _) = reject(Rejection::sigma_clip(0.1), &[3.5; 8]);
        assert_eq!(clipped, Clipped::Kept(8));
    }

    #[test]
    fn test_zero_mad_keeps_only_center() {
        // median 0, MAD 0: the window collapses to [0, 0]
        for sigma in [0.5, 5.0, 50.0] {
            let (_, kept) = reject(Rejection::sigma_clip(sigma), &[0.0, 0.0, 100.0]);
            assert_eq!(kept, vec![0.0, 0.0], "sigma = {}", sigma);
        }
    }

    #[test]
    fn test_std_dispersion_threshold_dependent() {
        // median 0, std ~47.14
        let (_, kept) = reject(std_clip(0.5), &[0.0, 0.0, 100.0]);
        assert_eq!(kept, vec![0.0, 0.0]);

        let (_, kept) = reject(std_clip(50.0), &[0.0, 0.0, 100.0]);
        assert_eq!(kept, vec![0.0, 0.0, 100.0]);
    }

    #[test]
    fn test_asymmetric_thresholds() {
        // median 10, MAD 1 -> sigma ~1.4826
        let values = [7.0, 9.0, 10.0, 10.0, 11.0, 13.0];
        let rejection = Rejection::sigma_clip_asymmetric(3.0, 1.0);
        let (_, kept) = reject(rejection, &values);
        assert!(kept.contains(&7.0));
        assert!(!kept.contains(&13.0));
    }

    #[test]
    fn test_all_rejected_reports_center() {
        // mean center 25, MAD 0: no value equals 25
        let config = SigmaClipConfig::new(3.0).with_center(CenterEstimator::Mean);
        let (clipped, kept) = reject(Rejection::SigmaClip(config), &[0.0, 0.0, 0.0, 100.0]);
        assert_eq!(clipped, Clipped::AllRejected { center: 25.0 });
        assert!(kept.is_empty());
    }

    #[test]
    fn test_iterations_stop_when_stable() {
        let values = [10.0, 10.2, 9.8, 10.1, 9.9, 15.0, 30.0];
        let single = SigmaClipConfig::new(2.0).with_dispersion(DispersionEstimator::Std);
        let multi = single.with_max_iterations(5);

        let (_, kept_single) = reject(Rejection::SigmaClip(single), &values);
        let (_, kept_multi) = reject(Rejection::SigmaClip(multi), &values);
        assert!(kept_multi.len() <= kept_single.len());
        assert!(!kept_multi.contains(&30.0));
        assert!(!kept_multi.contains(&15.0));
    }

    #[test]
    fn test_min_max_bounds() {
        let rejection = Rejection::MinMax {
            low: Some(0.0),
            high: Some(10.0),
        };
        let (_, kept) = reject(rejection, &[-1.0, 0.0, 5.0, 10.0, 11.0]);
        assert_eq!(kept, vec![0.0, 5.0, 10.0]);

        let open_high = Rejection::MinMax {
            low: Some(1.0),
            high: None,
        };
        let (_, kept) = reject(open_high, &[0.0, 1.0, 1e9]);
        assert_eq!(kept, vec![1.0, 1e9]);
    }

    #[test]
    fn test_min_max_all_rejected_uses_median() {
        let rejection = Rejection::MinMax {
            low: Some(100.0),
            high: None,
        };
        let (clipped, _) = reject(rejection, &[3.0, 1.0, 2.0]);
        assert_eq!(clipped, Clipped::AllRejected { center: 2.0 });
    }

    #[test]
    fn test_extrema_drops_lowest_and_highest() {
        let rejection = Rejection::Extrema {
            n_low: 1,
            n_high: 2,
        };
        let (clipped, kept) = reject(rejection, &[5.0, 1.0, 9.0, 3.0, 7.0]);
        assert_eq!(clipped, Clipped::Kept(2));
        assert_eq!(kept, vec![3.0, 5.0]);
    }

    #[test]
    fn test_extrema_too_few_values_keeps_all() {
        let rejection = Rejection::Extrema {
            n_low: 1,
            n_high: 1,
        };
        let (clipped, kept) = reject(rejection, &[4.0, 2.0]);
        assert_eq!(clipped, Clipped::Kept(2));
        assert_eq!(kept, vec![4.0, 2.0]);
    }

    #[test]
    fn test_none_keeps_everything() {
        let (clipped, _) = reject(Rejection::None, &[1.0, 1e6, -1e6]);
        assert_eq!(clipped, Clipped::Kept(3));
    }

    #[test]
    fn test_display_names() {
        assert_eq!(Rejection::default().to_string(), "sigma_clip");
        assert_eq!(Rejection::None.to_string(), "none");
        assert_eq!(DispersionEstimator::MadStd.to_string(), "mad_std");
        assert_eq!(CenterEstimator::Median.to_string(), "median");
    }

    #[test]
    #[should_panic(expected = "Sigma must be positive")]
    fn test_non_positive_sigma_panics() {
        SigmaClipConfig::new(0.0);
    }

    #[test]
    #[should_panic(expected = "Max iterations must be at least 1")]
    fn test_zero_iterations_panics() {
        SigmaClipConfig::default().with_max_iterations(0);
    }

    #[test]
    #[should_panic(expected = "must not exceed high bound")]
    fn test_inverted_min_max_panics() {
        Rejection::MinMax {
            low: Some(5.0),
            high: Some(1.0),
        }
        .validate();
    }
}
