//! End-to-end pipelines behind the two binaries.
//!
//! Each pipeline takes a config struct whose `Default` reproduces the
//! published study (input paths, date range, hyperparameters, output files)
//! and returns the data it plotted so callers can inspect it.

pub mod comparison;
pub mod deepar;
pub mod feedforward;

pub use comparison::{run_comparison, ComparisonConfig, ForecastSource};
pub use deepar::{run_deepar, DeepArConfig, DeepArOutput};
pub use feedforward::{run_feedforward, FeedForwardConfig, FeedForwardOutput};

use crate::core::{Frequency, TimeSeries};
use crate::error::{ForecastError, Result};
use chrono::{DateTime, TimeZone, Utc};

/// First hour of the TEC study period.
pub fn study_start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2018, 1, 10, 0, 0, 0)
        .single()
        .unwrap_or_default()
}

/// End (exclusive) of the TEC study period.
pub fn study_end() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2018, 1, 27, 0, 0, 0)
        .single()
        .unwrap_or_default()
}

/// Attach the range `[start, end)` at `frequency` to `values`.
///
/// The generated range must have exactly one timestamp per value.
pub fn index_values(
    values: Vec<f64>,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    frequency: Frequency,
    name: &str,
) -> Result<TimeSeries> {
    let index = frequency.date_range(start, end);
    if index.len() != values.len() {
        return Err(ForecastError::shape(
            format!("{} rows for the {} range {} .. {}", name, frequency, start, end),
            index.len(),
            values.len(),
        ));
    }
    Ok(TimeSeries::new(index, values)?
        .with_frequency(frequency)?
        .with_name(name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn study_range_is_408_hours() {
        let series = index_values(
            vec![0.0; 408],
            study_start(),
            study_end(),
            Frequency::hourly(),
            "TEC",
        )
        .unwrap();
        assert_eq!(series.len(), 408);
        assert_eq!(series.name(), Some("TEC"));
    }

    #[test]
    fn row_count_must_match_range() {
        let err = index_values(
            vec![0.0; 400],
            study_start(),
            study_end(),
            Frequency::hourly(),
            "TEC",
        )
        .unwrap_err();
        assert!(matches!(
            err,
            ForecastError::ShapeMismatch {
                expected: 408,
                got: 400,
                ..
            }
        ));
    }
}
