//! TimeSeries data structure for representing time-indexed observations.

use crate::core::Frequency;
use crate::error::{ForecastError, Result};
use chrono::{DateTime, Utc};

/// A univariate series of `(timestamp, value)` pairs.
///
/// Timestamps are strictly increasing. When a frequency is attached the index
/// is also contiguous at that frequency.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeSeries {
    timestamps: Vec<DateTime<Utc>>,
    values: Vec<f64>,
    name: Option<String>,
    frequency: Option<Frequency>,
}

impl TimeSeries {
    /// Create a series from explicit timestamps.
    pub fn new(timestamps: Vec<DateTime<Utc>>, values: Vec<f64>) -> Result<Self> {
        if timestamps.len() != values.len() {
            return Err(ForecastError::shape(
                "time series values",
                timestamps.len(),
                values.len(),
            ));
        }
        for i in 1..timestamps.len() {
            if timestamps[i] <= timestamps[i - 1] {
                return Err(ForecastError::TimestampError(
                    "timestamps must be strictly increasing".to_string(),
                ));
            }
        }
        Ok(Self {
            timestamps,
            values,
            name: None,
            frequency: None,
        })
    }

    /// Create a contiguous series of `values.len()` points starting at `start`.
    pub fn regular(start: DateTime<Utc>, frequency: Frequency, values: Vec<f64>) -> Self {
        let timestamps = frequency.periods(start, values.len());
        Self {
            timestamps,
            values,
            name: None,
            frequency: Some(frequency),
        }
    }

    /// Attach a name (used as the column or legend key).
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Attach a frequency, validating that the index is contiguous at it.
    pub fn with_frequency(mut self, frequency: Frequency) -> Result<Self> {
        if !frequency.is_contiguous(&self.timestamps) {
            return Err(ForecastError::TimestampError(format!(
                "index is not contiguous at frequency {}",
                frequency
            )));
        }
        self.frequency = Some(frequency);
        Ok(self)
    }

    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    pub fn timestamps(&self) -> &[DateTime<Utc>] {
        &self.timestamps
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn frequency(&self) -> Option<Frequency> {
        self.frequency
    }

    /// First timestamp.
    pub fn start(&self) -> Option<DateTime<Utc>> {
        self.timestamps.first().copied()
    }

    /// Last timestamp.
    pub fn end(&self) -> Option<DateTime<Utc>> {
        self.timestamps.last().copied()
    }

    /// Iterate over `(timestamp, value)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (DateTime<Utc>, f64)> + '_ {
        self.timestamps.iter().copied().zip(self.values.iter().copied())
    }

    /// The first `n` points (or all when shorter).
    pub fn head(&self, n: usize) -> TimeSeries {
        let end = n.min(self.len());
        Self {
            timestamps: self.timestamps[..end].to_vec(),
            values: self.values[..end].to_vec(),
            name: self.name.clone(),
            frequency: self.frequency,
        }
    }

    /// The last `n` points (or all when shorter).
    pub fn tail(&self, n: usize) -> TimeSeries {
        let start = self.len().saturating_sub(n);
        Self {
            timestamps: self.timestamps[start..].to_vec(),
            values: self.values[start..].to_vec(),
            name: self.name.clone(),
            frequency: self.frequency,
        }
    }

}
