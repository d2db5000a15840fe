//! Forecast result structures: sampled paths and their summaries.

use crate::core::Frequency;
use crate::error::{ForecastError, Result};
use crate::utils::quantile_sorted;
use chrono::{DateTime, Utc};
use ndarray::{Array2, Axis};

/// A symmetric prediction interval around the median.
#[derive(Debug, Clone, PartialEq)]
pub struct PredictionInterval {
    /// Coverage in percent, e.g. `90.0`.
    pub level: f64,
    pub lower: Vec<f64>,
    pub upper: Vec<f64>,
}

/// A summarized forecast: point predictions plus any number of intervals.
#[derive(Debug, Clone, Default)]
pub struct Forecast {
    timestamps: Vec<DateTime<Utc>>,
    point: Vec<f64>,
    intervals: Vec<PredictionInterval>,
}

impl Forecast {
    /// Create a forecast from point predictions.
    pub fn from_values(timestamps: Vec<DateTime<Utc>>, point: Vec<f64>) -> Result<Self> {
        if timestamps.len() != point.len() {
            return Err(ForecastError::shape(
                "forecast index",
                point.len(),
                timestamps.len(),
            ));
        }
        Ok(Self {
            timestamps,
            point,
            intervals: Vec::new(),
        })
    }

    /// Add an interval; bounds must match the horizon.
    pub fn with_interval(mut self, interval: PredictionInterval) -> Result<Self> {
        if interval.lower.len() != self.horizon() || interval.upper.len() != self.horizon() {
            return Err(ForecastError::shape(
                format!("{}% interval", interval.level),
                self.horizon(),
                interval.lower.len().min(interval.upper.len()),
            ));
        }
        self.intervals.push(interval);
        Ok(self)
    }

    /// Get the forecast horizon (number of steps).
    pub fn horizon(&self) -> usize {
        self.point.len()
    }

    pub fn is_empty(&self) -> bool {
        self.point.is_empty()
    }

    pub fn timestamps(&self) -> &[DateTime<Utc>] {
        &self.timestamps
    }

    pub fn point(&self) -> &[f64] {
        &self.point
    }

    pub fn intervals(&self) -> &[PredictionInterval] {
        &self.intervals
    }

    /// Interval with the given coverage level, if present.
    pub fn interval(&self, level: f64) -> Option<&PredictionInterval> {
        self.intervals
            .iter()
            .find(|i| (i.level - level).abs() < 1e-9)
    }
}

/// Probabilistic forecast made of sample paths (`num_samples x horizon`).
#[derive(Debug, Clone)]
pub struct SampleForecast {
    samples: Array2<f64>,
    start: DateTime<Utc>,
    frequency: Frequency,
    item_id: Option<String>,
}

impl SampleForecast {
    pub fn new(samples: Array2<f64>, start: DateTime<Utc>, frequency: Frequency) -> Result<Self> {
        if samples.nrows() == 0 || samples.ncols() == 0 {
            return Err(ForecastError::EmptyData);
        }
        Ok(Self {
            samples,
            start,
            frequency,
            item_id: None,
        })
    }

    pub fn with_item_id(mut self, item_id: Option<String>) -> Self {
        self.item_id = item_id;
        self
    }

    pub fn samples(&self) -> &Array2<f64> {
        &self.samples
    }

    pub fn num_samples(&self) -> usize {
        self.samples.nrows()
    }

    pub fn horizon(&self) -> usize {
        self.samples.ncols()
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    pub fn frequency(&self) -> Frequency {
        self.frequency
    }

    pub fn item_id(&self) -> Option<&str> {
        self.item_id.as_deref()
    }

    /// Timestamps covered by the forecast.
    pub fn index(&self) -> Vec<DateTime<Utc>> {
        self.frequency.periods(self.start, self.horizon())
    }

    /// Per-step mean over sample paths.
    pub fn mean(&self) -> Vec<f64> {
        self.samples
            .mean_axis(Axis(0))
            .map(|m| m.to_vec())
            .unwrap_or_default()
    }

    /// Per-step quantile over sample paths.
    pub fn quantile(&self, q: f64) -> Vec<f64> {
        self.quantiles(&[q]).pop().unwrap_or_default()
    }

    /// Per-step quantiles for several levels, sorting each step once.
    pub fn quantiles(&self, qs: &[f64]) -> Vec<Vec<f64>> {
        let mut out = vec![Vec::with_capacity(self.horizon()); qs.len()];
        for column in self.samples.axis_iter(Axis(1)) {
            let mut sorted = column.to_vec();
            sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
            for (k, &q) in qs.iter().enumerate() {
                out[k].push(quantile_sorted(&sorted, q));
            }
        }
        out
    }

    pub fn median(&self) -> Vec<f64> {
        self.quantile(0.5)
    }

    /// Central interval with `level` percent coverage.
    pub fn prediction_interval(&self, level: f64) -> Result<PredictionInterval> {
        if !(0.0..100.0).contains(&level) {
            return Err(ForecastError::InvalidParameter(format!(
                "interval level must be in [0, 100), got {}",
                level
            )));
        }
        let half = level / 200.0;
        let mut bounds = self.quantiles(&[0.5 - half, 0.5 + half]);
        let upper = bounds.pop().unwrap_or_default();
        let lower = bounds.pop().unwrap_or_default();
        Ok(PredictionInterval {
            level,
            lower,
            upper,
        })
    }

    /// Median path plus the requested intervals.
    pub fn summarize(&self, levels: &[f64]) -> Result<Forecast> {
        let mut forecast = Forecast::from_values(self.index(), self.median())?;
        for &level in levels {
            forecast = forecast.with_interval(self.prediction_interval(level)?)?;
        }
        Ok(forecast)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use chrono::TimeZone;
    use ndarray::array;

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2018, 1, 26, 0, 0, 0).unwrap()
    }

    fn make_forecast() -> SampleForecast {
        // 5 samples, 2 steps
        let samples = array![
            [1.0, 10.0],
            [2.0, 20.0],
            [3.0, 30.0],
            [4.0, 40.0],
            [5.0, 50.0]
        ];
        SampleForecast::new(samples, start(), Frequency::hourly()).unwrap()
    }

    #[test]
    fn sample_forecast_reports_shape_and_index() {
        let f = make_forecast();
        assert_eq!(f.num_samples(), 5);
        assert_eq!(f.horizon(), 2);
        let index = f.index();
        assert_eq!(index[0], start());
        assert_eq!(index[1], start() + chrono::Duration::hours(1));
    }

    #[test]
    fn sample_forecast_rejects_empty_samples() {
        let empty = Array2::<f64>::zeros((0, 3));
        assert!(matches!(
            SampleForecast::new(empty, start(), Frequency::hourly()),
            Err(ForecastError::EmptyData)
        ));
    }

    #[test]
    fn sample_forecast_computes_mean_and_quantiles() {
        let f = make_forecast();
        assert_eq!(f.mean(), vec![3.0, 30.0]);
        assert_eq!(f.median(), vec![3.0, 30.0]);
        let q = f.quantile(0.25);
        assert_relative_eq!(q[0], 2.0, epsilon = 1e-12);
        assert_relative_eq!(q[1], 20.0, epsilon = 1e-12);
    }

    #[test]
    fn intervals_nest_by_level() {
        let f = make_forecast();
        let i50 = f.prediction_interval(50.0).unwrap();
        let i90 = f.prediction_interval(90.0).unwrap();
        for step in 0..f.horizon() {
            assert!(i90.lower[step] <= i50.lower[step]);
            assert!(i50.upper[step] <= i90.upper[step]);
        }
        assert_relative_eq!(i50.lower[0], 2.0, epsilon = 1e-12);
        assert_relative_eq!(i50.upper[0], 4.0, epsilon = 1e-12);
        assert!(f.prediction_interval(100.0).is_err());
    }

    #[test]
    fn summarize_collects_median_and_intervals() {
        let summary = make_forecast().summarize(&[50.0, 90.0]).unwrap();
        assert_eq!(summary.horizon(), 2);
        assert_eq!(summary.point(), &[3.0, 30.0]);
        assert_eq!(summary.intervals().len(), 2);
        assert!(summary.interval(90.0).is_some());
        assert!(summary.interval(80.0).is_none());
        assert_eq!(summary.timestamps().len(), 2);
    }

    #[test]
    fn forecast_validates_interval_length() {
        let forecast = Forecast::from_values(vec![start()], vec![1.0]).unwrap();
        let bad = PredictionInterval {
            level: 50.0,
            lower: vec![0.0, 0.0],
            upper: vec![2.0, 2.0],
        };
        assert!(forecast.with_interval(bad).is_err());
        assert!(Forecast::from_values(vec![], vec![1.0]).is_err());
    }
}
