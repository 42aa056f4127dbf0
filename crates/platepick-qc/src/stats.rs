//! Descriptive statistics shared by well selection and the quality checks.
//!
//! NaN readings (empty plate-reader cells) are skipped, matching how the
//! upstream tabular tools treat missing values. Standard deviations use the
//! sample (n-1) convention throughout, which is what `statrs` computes.

use statrs::statistics::Statistics;

/// Values that take part in a statistic: everything except NaN.
fn present(values: &[f64]) -> Vec<f64> {
    values.iter().copied().filter(|v| !v.is_nan()).collect()
}

/// Arithmetic mean of the non-NaN values. NaN when there are none.
pub fn mean(values: &[f64]) -> f64 {
    let kept = present(values);
    if kept.is_empty() {
        return f64::NAN;
    }
    kept.iter().mean()
}

/// Sample standard deviation (n-1 denominator) of the non-NaN values.
///
/// Returns NaN with fewer than two values.
pub fn sample_std_dev(values: &[f64]) -> f64 {
    let kept = present(values);
    if kept.len() < 2 {
        return f64::NAN;
    }
    kept.iter().std_dev()
}

/// Mean plus one sample standard deviation.
///
/// A single value has no spread, so its deviation counts as zero here. This is
/// the threshold used for blanks and the statistic of the samples check.
pub fn mean_plus_std(values: &[f64]) -> f64 {
    let m = mean(values);
    let sd = sample_std_dev(values);
    if sd.is_nan() { m } else { m + sd }
}

/// Largest non-NaN value, or `None` when there is none.
pub fn max_present(values: &[f64]) -> Option<f64> {
    values
        .iter()
        .copied()
        .filter(|v| !v.is_nan())
        .fold(None, |acc, v| match acc {
            Some(a) if a >= v => Some(a),
            _ => Some(v),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mean_skips_nan() {
        let values = [1.0, f64::NAN, 3.0];
        assert!((mean(&values) - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_mean_empty_is_nan() {
        assert!(mean(&[]).is_nan());
        assert!(mean(&[f64::NAN]).is_nan());
    }

    #[test]
    fn test_std_dev_uses_n_minus_one() {
        // Population sd of [2,4,4,4,5,5,7,9] is 2.0; the sample sd is sqrt(32/7).
        let values = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        let expected = (32.0f64 / 7.0).sqrt();
        assert!((sample_std_dev(&values) - expected).abs() < 1e-12);
        assert!((sample_std_dev(&values) - 2.0).abs() > 0.1);
    }

    #[test]
    fn test_std_dev_single_value_is_nan() {
        assert!(sample_std_dev(&[4.0]).is_nan());
    }

    #[test]
    fn test_mean_plus_std_single_value() {
        assert!((mean_plus_std(&[0.9]) - 0.9).abs() < 1e-12);
    }

    #[test]
    fn test_mean_plus_std_pair() {
        // mean 1.0, sample sd sqrt(2)
        let v = mean_plus_std(&[0.0, 2.0]);
        assert!((v - (1.0 + 2.0f64.sqrt())).abs() < 1e-12);
    }

    #[test]
    fn test_max_present() {
        assert_eq!(max_present(&[1.0, f64::NAN, 7.5, 3.0]), Some(7.5));
        assert_eq!(max_present(&[f64::NAN]), None);
        assert_eq!(max_present(&[f64::INFINITY, 2.0]), Some(f64::INFINITY));
    }
}
