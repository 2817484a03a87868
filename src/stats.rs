//! Batch statistics shared by the rules and the detectors

/// Largest absolute value; 0.0 for an empty slice
fn max_abs(values: &[f64]) -> f64 {
    values.iter().fold(0.0, |acc: f64, x| acc.max(x.abs()))
}

/// Arithmetic mean; 0.0 for an empty slice.
///
/// Values are scaled into `[-1, 1]` first, so the sum cannot overflow even
/// for amounts near `f64::MAX`.
pub fn mean(values: &[f64]) -> f64 {
    let scale = max_abs(values);
    if values.is_empty() || scale == 0.0 {
        return 0.0;
    }
    scale * (values.iter().map(|x| x / scale).sum::<f64>() / values.len() as f64)
}

/// Sample (Bessel-corrected) standard deviation.
///
/// Fewer than two values have no spread to measure and yield 0.0. Computed on
/// scaled values like `mean`; the result is infinite only when the spread
/// itself exceeds `f64::MAX`.
pub fn sample_std(values: &[f64]) -> f64 {
    let scale = max_abs(values);
    if values.len() < 2 || scale == 0.0 {
        return 0.0;
    }
    let scaled: Vec<f64> = values.iter().map(|x| x / scale).collect();
    let m = scaled.iter().sum::<f64>() / scaled.len() as f64;
    let variance =
        scaled.iter().map(|&x| (x - m).powi(2)).sum::<f64>() / (scaled.len() - 1) as f64;
    scale * variance.sqrt()
}

/// Percentile with linear interpolation between closest ranks.
///
/// `q` is in percent (0-100). NaN for an empty slice.
pub fn percentile(values: &[f64], q: f64) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);

    let rank = (q / 100.0).clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    sorted[lo] + (sorted[hi] - sorted[lo]) * (rank - lo as f64)
}
