//! Per-sample statistics used by rejection and combination.
//!
//! Sums accumulate in `f64` so that averaging `n` identical `f32` values
//! returns that value exactly.

/// MAD (Median Absolute Deviation) to standard deviation conversion factor.
///
/// For a normal distribution, σ ≈ 1.4826 × MAD.
/// This is the exact value: 1 / Φ⁻¹(3/4) where Φ⁻¹ is the inverse CDF.
pub const MAD_TO_SIGMA: f32 = 1.4826022;

/// Convert MAD to standard deviation (assuming normal distribution).
#[inline]
pub fn mad_to_sigma(mad: f32) -> f32 {
    mad * MAD_TO_SIGMA
}

/// Sum of values.
#[inline]
pub fn sum_f32(values: &[f32]) -> f32 {
    values.iter().map(|&v| v as f64).sum::<f64>() as f32
}

/// Arithmetic mean.
#[inline]
pub fn mean_f32(values: &[f32]) -> f32 {
    debug_assert!(!values.is_empty());
    mean_f64(values) as f32
}

#[inline]
fn mean_f64(values: &[f32]) -> f64 {
    values.iter().map(|&v| v as f64).sum::<f64>() / values.len() as f64
}

/// Population standard deviation (divides by `n`).
pub fn std_f32(values: &[f32]) -> f32 {
    debug_assert!(!values.is_empty());
    let mean = mean_f64(values);
    let variance = values
        .iter()
        .map(|&v| {
            let d = v as f64 - mean;
            d * d
        })
        .sum::<f64>()
        / values.len() as f64;
    variance.sqrt() as f32
}

/// Median of values in-place.
///
/// Mutates the input buffer (partial sort via quickselect). Even-length input
/// averages the two middle values.
#[inline]
pub fn median_f32_mut(data: &mut [f32]) -> f32 {
    debug_assert!(!data.is_empty());

    let len = data.len();
    let mid = len / 2;

    let (left_part, median, _) = data.select_nth_unstable_by(mid, f32::total_cmp);
    let upper = *median;
    if len & 1 == 1 {
        return upper;
    }
    let lower = left_part.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    ((lower as f64 + upper as f64) * 0.5) as f32
}

/// Median of values, copying into `scratch` first.
#[inline]
pub fn median_f32_with_scratch(values: &[f32], scratch: &mut Vec<f32>) -> f32 {
    scratch.clear();
    scratch.extend_from_slice(values);
    median_f32_mut(scratch)
}

/// MAD (Median Absolute Deviation) around `median`, using a scratch buffer.
///
/// MAD = median(|x_i - median(x)|)
#[inline]
pub fn mad_f32_with_scratch(values: &[f32], median: f32, scratch: &mut Vec<f32>) -> f32 {
    if values.is_empty() {
        return 0.0;
    }
    scratch.clear();
    scratch.extend(values.iter().map(|&v| (v - median).abs()));
    median_f32_mut(scratch)
}

/// MAD scaled to a standard-deviation equivalent.
pub fn mad_std_f32(values: &[f32], scratch: &mut Vec<f32>) -> f32 {
    let median = median_f32_with_scratch(values, scratch);
    mad_to_sigma(mad_f32_with_scratch(values, median, scratch))
}
