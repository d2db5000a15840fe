//! Statistical utility functions.

/// Calculate the mean of a slice.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Mean of absolute values, ignoring non-finite entries.
///
/// Returns `0.0` when no finite value is present.
pub fn mean_abs(values: &[f64]) -> f64 {
    let (sum, count) = values
        .iter()
        .filter(|v| v.is_finite())
        .fold((0.0, 0usize), |(s, c), v| (s + v.abs(), c + 1));
    if count == 0 {
        0.0
    } else {
        sum / count as f64
    }
}

/// Quantile with linear interpolation between order statistics.
///
/// Matches the default method of numpy's `quantile`: position `q * (n - 1)`.
///
/// # Example
/// ```
/// use tec_forecast::utils::quantile;
///
/// let q = quantile(&[4.0, 1.0, 3.0, 2.0], 0.5);
/// assert!((q - 2.5).abs() < 1e-12);
/// ```
pub fn quantile(values: &[f64], q: f64) -> f64 {
    if values.is_empty() || !(0.0..=1.0).contains(&q) {
        return f64::NAN;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    quantile_sorted(&sorted, q)
}

/// [`quantile`] for an already sorted slice.
pub fn quantile_sorted(sorted: &[f64], q: f64) -> f64 {
    if sorted.is_empty() {
        return f64::NAN;
    }
    let pos = q * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let frac = pos - lo as f64;
    sorted[lo] + (sorted[hi] - sorted[lo]) * frac
}

/// Calculate the median of a slice.
pub fn median(values: &[f64]) -> f64 {
    quantile(values, 0.5)
}

/// Numerically stable `ln(1 + e^x)`.
pub fn softplus(x: f64) -> f64 {
    if x > 20.0 {
        x
    } else {
        x.exp().ln_1p()
    }
}

/// Logistic sigmoid, the derivative of [`softplus`].
pub fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn mean_calculates_correctly() {
        assert_relative_eq!(mean(&[1.0, 2.0, 3.0, 4.0, 5.0]), 3.0, epsilon = 1e-10);
        assert!(mean(&[]).is_nan());
    }

    #[test]
    fn mean_abs_skips_non_finite() {
        assert_relative_eq!(mean_abs(&[-2.0, 4.0, f64::NAN]), 3.0, epsilon = 1e-10);
        assert_eq!(mean_abs(&[]), 0.0);
        assert_eq!(mean_abs(&[f64::INFINITY]), 0.0);
    }

    #[test]
    fn quantile_interpolates_linearly() {
        let values = [10.0, 20.0, 30.0, 40.0, 50.0];
        assert_relative_eq!(quantile(&values, 0.0), 10.0, epsilon = 1e-10);
        assert_relative_eq!(quantile(&values, 1.0), 50.0, epsilon = 1e-10);
        assert_relative_eq!(quantile(&values, 0.25), 20.0, epsilon = 1e-10);
        assert_relative_eq!(quantile(&values, 0.1), 14.0, epsilon = 1e-10);
        assert!(quantile(&values, 1.5).is_nan());
        assert!(quantile(&[], 0.5).is_nan());
    }

    #[test]
    fn median_calculates_correctly() {
        assert_relative_eq!(median(&[1.0, 2.0, 3.0, 4.0, 5.0]), 3.0, epsilon = 1e-10);
        assert_relative_eq!(median(&[1.0, 2.0, 3.0, 4.0]), 2.5, epsilon = 1e-10);
        assert_relative_eq!(median(&[5.0, 1.0, 3.0, 2.0, 4.0]), 3.0, epsilon = 1e-10);
    }

    #[test]
    fn softplus_and_sigmoid() {
        assert_relative_eq!(softplus(0.0), 2.0_f64.ln(), epsilon = 1e-12);
        assert_relative_eq!(softplus(50.0), 50.0, epsilon = 1e-12);
        assert!(softplus(-50.0) > 0.0);
        assert_relative_eq!(sigmoid(0.0), 0.5, epsilon = 1e-12);
    }
}
