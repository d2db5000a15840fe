//! Feed-forward model on the hourly TEC series.

use super::{index_values, study_end, study_start};
use crate::core::{Frequency, SampleForecast, TimeSeries};
use crate::dataset::ListDataset;
use crate::error::{ForecastError, Result};
use crate::models::{Estimator, FeedForwardEstimator, Predictor, Trainer, DEFAULT_NUM_SAMPLES};
use crate::plot::{forecast_chart, LineChart};
use crate::table::Table;
use chrono::{DateTime, Utc};
use std::path::PathBuf;
use tracing::info;

/// Settings of the feed-forward run.
#[derive(Debug, Clone)]
pub struct FeedForwardConfig {
    /// Activity table with one row per hour, spreadsheet or CSV.
    pub data_path: PathBuf,
    pub target_column: String,
    pub start: DateTime<Utc>,
    /// Exclusive end of the hourly index.
    pub end: DateTime<Utc>,
    pub frequency: Frequency,
    pub prediction_length: usize,
    pub trainer: Trainer,
    pub num_samples: usize,
    /// Trailing points of the series drawn before the forecast.
    pub history_points: usize,
    pub interval_levels: Vec<f64>,
    pub output: PathBuf,
}

impl Default for FeedForwardConfig {
    fn default() -> Self {
        Self {
            data_path: PathBuf::from("TEC_Data.xls"),
            target_column: "TEC".to_string(),
            start: study_start(),
            end: study_end(),
            frequency: Frequency::hourly(),
            prediction_length: 24,
            trainer: Trainer::new().with_epochs(1).with_learning_rate(1e-3),
            num_samples: DEFAULT_NUM_SAMPLES,
            history_points: 100,
            interval_levels: vec![50.0, 90.0],
            output: PathBuf::from("ff-model.png"),
        }
    }
}

/// What the feed-forward run produced.
#[derive(Debug, Clone)]
pub struct FeedForwardOutput {
    /// Full indexed series, including the withheld horizon.
    pub series: TimeSeries,
    pub train_length: usize,
    pub forecast: SampleForecast,
}

impl FeedForwardOutput {
    /// The last `n` points the model was trained on, ending right before the
    /// forecast.
    pub fn training_tail(&self, n: usize) -> TimeSeries {
        self.series.head(self.train_length).tail(n)
    }
}

/// Load the TEC column and index it by the configured hourly range.
pub fn load_tec_series(config: &FeedForwardConfig) -> Result<TimeSeries> {
    let table = Table::read(&config.data_path)?;
    let values = table.numeric_column(&config.target_column)?;
    index_values(
        values,
        config.start,
        config.end,
        config.frequency,
        &config.target_column,
    )
}

/// Train on everything but the last `prediction_length` points and forecast
/// them, without rendering.
pub fn fit_and_forecast(config: &FeedForwardConfig, series: &TimeSeries) -> Result<FeedForwardOutput> {
    let full = ListDataset::from_series(series, config.frequency)?;
    let train_entry = full
        .get(0)
        .ok_or(ForecastError::EmptyData)?
        .truncated(config.prediction_length)?;
    let train_length = train_entry.len();
    let train = ListDataset::new(vec![train_entry], config.frequency)?;
    info!(
        rows = series.len(),
        train_length,
        prediction_length = config.prediction_length,
        "feed-forward dataset ready"
    );

    let estimator = FeedForwardEstimator::new(
        config.frequency,
        config.prediction_length,
        config.trainer.clone(),
    );
    let predictor = estimator.train(&train)?;
    let forecast = predictor
        .predict(&train, config.num_samples)?
        .into_iter()
        .next()
        .ok_or(ForecastError::EmptyData)?;

    Ok(FeedForwardOutput {
        series: series.clone(),
        train_length,
        forecast,
    })
}

/// Training history followed by the forecast.
pub fn model_chart(config: &FeedForwardConfig, output: &FeedForwardOutput) -> Result<LineChart> {
    forecast_chart(
        &output.training_tail(config.history_points),
        &output.forecast,
        &config.interval_levels,
    )
}

/// Run the whole feed-forward pipeline and write the chart.
pub fn run_feedforward(config: &FeedForwardConfig) -> Result<FeedForwardOutput> {
    info!(path = %config.data_path.display(), "loading TEC data");
    let series = load_tec_series(config)?;
    let output = fit_and_forecast(config, &series)?;

    model_chart(config, &output)?.render(&config.output)?;
    info!(path = %config.output.display(), "feed-forward chart written");
    Ok(output)
}
