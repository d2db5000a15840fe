//! Scaling transforms applied to model inputs.
//!
//! Neural estimators see each window divided by the mean absolute value of its
//! context, and map their outputs back with the same factor.

use crate::utils::mean_abs;

/// Smallest scale ever returned, so that scaled values stay finite.
pub const MIN_SCALE: f64 = 1e-10;

/// Result of a scaling transform, containing the factor for the inverse.
#[derive(Debug, Clone)]
pub struct ScaleResult {
    /// Transformed data
    pub data: Vec<f64>,
    /// Scale value divided out
    pub scale: f64,
}

impl ScaleResult {
    /// Inverse transform to recover original scale.
    pub fn inverse(&self) -> Vec<f64> {
        self.data
            .iter()
            .map(|&x| x * self.scale)
            .collect()
    }

    /// Map one scaled value back.
    pub fn restore(&self, x: f64) -> f64 {
        x * self.scale
    }
}

/// Mean-absolute scaling: `x / mean(|x|)`, no centering.
///
/// An all-zero (or empty) context falls back to a scale of `1.0`.
pub fn mean_abs_scale(series: &[f64]) -> ScaleResult {
    let m = mean_abs(series);
    let scale = if m > 0.0 { m.max(MIN_SCALE) } else { 1.0 };
    let data = series.iter().map(|&x| x / scale).collect();
    ScaleResult { data, scale }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn mean_abs_scale_divides_by_mean_magnitude() {
        let result = mean_abs_scale(&[2.0, -4.0, 6.0]);
        assert_relative_eq!(result.scale, 4.0, epsilon = 1e-12);
        assert_eq!(result.data, vec![0.5, -1.0, 1.5]);
    }

    #[test]
    fn mean_abs_scale_round_trips() {
        let series = vec![10.0, 12.5, 9.0, 30.0];
        let result = mean_abs_scale(&series);
        for (a, b) in result.inverse().iter().zip(series.iter()) {
            assert_relative_eq!(a, b, epsilon = 1e-10);
        }
        assert_relative_eq!(result.restore(result.data[3]), 30.0, epsilon = 1e-10);
    }

    #[test]
    fn zero_context_uses_unit_scale() {
        let result = mean_abs_scale(&[0.0, 0.0]);
        assert_eq!(result.scale, 1.0);
        assert_eq!(mean_abs_scale(&[]).scale, 1.0);
        assert_eq!(result.data, vec![0.0, 0.0]);
    }
}
