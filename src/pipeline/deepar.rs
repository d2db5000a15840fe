//! DeepAR on a benchmark dataset from the repository.

use crate::core::{SampleForecast, TimeSeries};
use crate::dataset::repository::load_raw_dataset;
use crate::dataset::{get_dataset, DataEntry, DatasetInfo, MetaData, TrainTestDataset};
use crate::error::{ForecastError, Result};
use crate::evaluation::make_evaluation_predictions;
use crate::models::{DeepArEstimator, Estimator, Trainer};
use crate::plot::{forecast_chart, series_chart, LineChart};
use std::path::PathBuf;
use tracing::info;

/// Canvas size of both DeepAR charts, an 11 x 8 inch figure at 100 dpi.
pub const FIGURE_SIZE: (u32, u32) = (1100, 800);

/// Settings of the DeepAR run.
#[derive(Debug, Clone)]
pub struct DeepArConfig {
    pub dataset: String,
    pub cache_dir: PathBuf,
    /// Download and rebuild the cache even when it exists.
    pub regenerate: bool,
    /// Raw (optionally gzipped) file to split instead of downloading.
    pub raw_path: Option<PathBuf>,
    pub trainer: Trainer,
    pub num_samples: usize,
    pub history_points: usize,
    pub interval_levels: Vec<f64>,
    pub dataset_plot: PathBuf,
    pub forecast_plot: PathBuf,
}

impl Default for DeepArConfig {
    fn default() -> Self {
        Self {
            dataset: "exchange_rate".to_string(),
            cache_dir: PathBuf::from("datasets"),
            regenerate: true,
            raw_path: None,
            trainer: Trainer::new().with_epochs(1).with_learning_rate(1e-4),
            num_samples: 10,
            history_points: 150,
            interval_levels: vec![50.0, 90.0],
            dataset_plot: PathBuf::from("dataset.png"),
            forecast_plot: PathBuf::from("deepar-model.png"),
        }
    }
}

/// What the DeepAR run produced.
#[derive(Debug, Clone)]
pub struct DeepArOutput {
    pub metadata: MetaData,
    /// One forecast per test entry.
    pub forecasts: Vec<SampleForecast>,
    /// Full test series, paired with `forecasts`.
    pub series: Vec<TimeSeries>,
}

/// Fetch (or split locally) the configured dataset.
pub fn load_dataset(config: &DeepArConfig) -> Result<TrainTestDataset> {
    match &config.raw_path {
        Some(path) => {
            info!(path = %path.display(), "splitting local raw dataset");
            load_raw_dataset(DatasetInfo::lookup(&config.dataset)?, path)
        }
        None => get_dataset(&config.dataset, config.regenerate, &config.cache_dir),
    }
}

/// Train DeepAR on the train split and forecast the test split, without rendering.
pub fn fit_and_evaluate(config: &DeepArConfig, dataset: &TrainTestDataset) -> Result<DeepArOutput> {
    let metadata = dataset.metadata.clone();
    let estimator = DeepArEstimator::new(
        metadata.freq,
        metadata.prediction_length,
        config.trainer.clone(),
    );
    let predictor = estimator.train(&dataset.train)?;
    let (forecasts, series) =
        make_evaluation_predictions(&dataset.test, &predictor, config.num_samples)?;
    Ok(DeepArOutput {
        metadata,
        forecasts,
        series,
    })
}

/// Chart of one full training entry.
pub fn training_chart(entry: &DataEntry, metadata: &MetaData) -> LineChart {
    series_chart(&entry.to_series(metadata.freq), "train data")
        .with_size(FIGURE_SIZE.0, FIGURE_SIZE.1)
}

/// Chart of the first test series' tail against its forecast.
pub fn evaluation_chart(config: &DeepArConfig, output: &DeepArOutput) -> Result<LineChart> {
    let forecast = output.forecasts.first().ok_or(ForecastError::EmptyData)?;
    let actual = output.series.first().ok_or(ForecastError::EmptyData)?;
    Ok(
        forecast_chart(&actual.tail(config.history_points), forecast, &config.interval_levels)?
            .with_size(FIGURE_SIZE.0, FIGURE_SIZE.1),
    )
}

/// Run the whole DeepAR pipeline and write both charts.
pub fn run_deepar(config: &DeepArConfig) -> Result<DeepArOutput> {
    let dataset = load_dataset(config)?;
    let first = dataset.train.get(0).ok_or(ForecastError::EmptyData)?;
    info!(keys = ?first.keys(), "train entry keys");
    info!(
        freq = %dataset.metadata.freq,
        prediction_length = dataset.metadata.prediction_length,
        train = dataset.train.len(),
        test = dataset.test.len(),
        "dataset metadata"
    );

    training_chart(first, &dataset.metadata).render(&config.dataset_plot)?;
    info!(path = %config.dataset_plot.display(), "training series chart written");

    let output = fit_and_evaluate(config, &dataset)?;
    evaluation_chart(config, &output)?.render(&config.forecast_plot)?;
    info!(path = %config.forecast_plot.display(), "DeepAR chart written");
    Ok(output)
}
