//! Backtest-style predictions over a test split.

use crate::core::{SampleForecast, TimeSeries};
use crate::dataset::ListDataset;
use crate::error::Result;
use crate::models::Predictor;
use tracing::info;

/// Withhold the last `prediction_length` points of every entry, forecast them
/// and return the forecasts alongside the full series, paired by entry.
pub fn make_evaluation_predictions<P: Predictor + ?Sized>(
    dataset: &ListDataset,
    predictor: &P,
    num_samples: usize,
) -> Result<(Vec<SampleForecast>, Vec<TimeSeries>)> {
    let horizon = predictor.prediction_length();
    let truncated = dataset
        .iter()
        .map(|entry| entry.truncated(horizon))
        .collect::<Result<Vec<_>>>()?;
    let inputs = ListDataset::new(truncated, dataset.frequency())?;

    info!(
        model = predictor.name(),
        series = dataset.len(),
        num_samples,
        "making evaluation predictions"
    );
    let forecasts = predictor.predict(&inputs, num_samples)?;
    let series = dataset
        .iter()
        .map(|entry| entry.to_series(dataset.frequency()))
        .collect();
    Ok((forecasts, series))
}
