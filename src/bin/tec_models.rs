//! Train the feed-forward model on hourly TEC data, then DeepAR on a
//! benchmark dataset, writing a chart for each.
//!
//! Usage:
//! ```
//! cargo run --bin tec-models -- --data TEC_Data.xls --seed 42
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tec_forecast::pipeline::{run_deepar, run_feedforward, DeepArConfig, FeedForwardConfig};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "Train TEC forecasting models and plot their forecasts")]
struct Args {
    /// TEC activity table with a TEC column, one row per hour (.xls/.xlsx or CSV)
    #[arg(long, default_value = "TEC_Data.xls")]
    data: PathBuf,

    /// Forecast horizon of the feed-forward model
    #[arg(long, default_value = "24")]
    prediction_length: usize,

    /// Training epochs for both models
    #[arg(long, default_value = "1")]
    epochs: usize,

    /// Feed-forward learning rate
    #[arg(long, default_value = "0.001")]
    ff_learning_rate: f64,

    /// DeepAR learning rate
    #[arg(long, default_value = "0.0001")]
    deepar_learning_rate: f64,

    /// Sample paths per feed-forward forecast
    #[arg(long, default_value = "100")]
    ff_num_samples: usize,

    /// Sample paths per DeepAR forecast
    #[arg(long, default_value = "10")]
    num_samples: usize,

    /// Seed for weight initialization, batching and sampling
    #[arg(long)]
    seed: Option<u64>,

    /// Feed-forward chart
    #[arg(long, default_value = "ff-model.png")]
    ff_output: PathBuf,

    /// Benchmark dataset name
    #[arg(long, default_value = "exchange_rate")]
    dataset: String,

    /// Dataset cache directory
    #[arg(long, default_value = "datasets")]
    cache_dir: PathBuf,

    /// Reuse the cached dataset instead of downloading it again
    #[arg(long)]
    use_cache: bool,

    /// Split this raw (optionally .gz) file instead of downloading
    #[arg(long)]
    raw_dataset: Option<PathBuf>,

    /// Chart of the first training series
    #[arg(long, default_value = "dataset.png")]
    dataset_output: PathBuf,

    /// DeepAR forecast chart
    #[arg(long, default_value = "deepar-model.png")]
    deepar_output: PathBuf,

    /// Skip the feed-forward half
    #[arg(long)]
    skip_feedforward: bool,

    /// Skip the DeepAR half
    #[arg(long)]
    skip_deepar: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    if !args.skip_feedforward {
        let defaults = FeedForwardConfig::default();
        let config = FeedForwardConfig {
            data_path: args.data.clone(),
            prediction_length: args.prediction_length,
            trainer: defaults
                .trainer
                .clone()
                .with_epochs(args.epochs)
                .with_learning_rate(args.ff_learning_rate)
                .with_seed(args.seed),
            num_samples: args.ff_num_samples,
            output: args.ff_output.clone(),
            ..defaults
        };
        let output = run_feedforward(&config).with_context(|| {
            format!("feed-forward pipeline failed on {}", args.data.display())
        })?;
        println!(
            "Feed-forward: trained on {} points, forecast {} steps from {} -> {}",
            output.train_length,
            output.forecast.horizon(),
            output.forecast.start(),
            config.output.display()
        );
    }

    if !args.skip_deepar {
        let defaults = DeepArConfig::default();
        let config = DeepArConfig {
            dataset: args.dataset.clone(),
            cache_dir: args.cache_dir.clone(),
            regenerate: !args.use_cache,
            raw_path: args.raw_dataset.clone(),
            trainer: defaults
                .trainer
                .clone()
                .with_epochs(args.epochs)
                .with_learning_rate(args.deepar_learning_rate)
                .with_seed(args.seed),
            num_samples: args.num_samples,
            dataset_plot: args.dataset_output.clone(),
            forecast_plot: args.deepar_output.clone(),
            ..defaults
        };
        let output = run_deepar(&config)
            .with_context(|| format!("DeepAR pipeline failed on dataset {}", args.dataset))?;
        println!(
            "DeepAR: {} forecasts of {} steps ({}) -> {}",
            output.forecasts.len(),
            output.metadata.prediction_length,
            output.metadata.freq,
            config.forecast_plot.display()
        );
    }

    Ok(())
}
