//! Plot GP, FFNN and DeepAR forecasts against observed TEC and IRI 2016.
//!
//! Usage:
//! ```
//! cargo run --bin tec-compare -- --table-out comparison.csv
//! ```

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use tec_forecast::align::ReshapeOrder;
use tec_forecast::pipeline::{run_comparison, ComparisonConfig, ForecastSource};
use tec_forecast::table::parse_timestamp;
use tracing_subscriber::EnvFilter;

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum Order {
    /// Column after column (transpose, then stack)
    Column,
    /// Row after row
    Row,
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Compare TEC forecasts with observations and IRI 2016")]
struct Args {
    /// GP forecast (headerless value,timestamp CSV)
    #[arg(long, default_value = "results_4_paper/metrics/forecast_gp.csv")]
    gp: PathBuf,

    /// FFNN forecast
    #[arg(long, default_value = "results_4_paper/metrics/forecast_ffnn.csv")]
    ffnn: PathBuf,

    /// DeepAR forecast
    #[arg(long, default_value = "results_4_paper/metrics/forecast_deepar.csv")]
    deepar: PathBuf,

    /// Observed activity table
    #[arg(long, default_value = "data/Data.csv")]
    data: PathBuf,

    /// IRI 2016 output table (wide)
    #[arg(long, default_value = "data/irt_data.csv")]
    irt: PathBuf,

    /// Flattening order of the IRI table
    #[arg(long, value_enum, default_value_t = Order::Column)]
    irt_order: Order,

    /// First timestamp of the IRI values (defaults to the forecast start)
    #[arg(long)]
    irt_start: Option<String>,

    /// Observed points to compare
    #[arg(long, default_value = "96")]
    actual_points: usize,

    /// Output chart
    #[arg(long, default_value = "results_4_paper/plots/forecast_comparison.png")]
    output: PathBuf,

    /// Also write the joined table as CSV
    #[arg(long)]
    table_out: Option<PathBuf>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let reference_start = args
        .irt_start
        .as_deref()
        .map(parse_timestamp)
        .transpose()
        .context("invalid --irt-start")?;

    let config = ComparisonConfig {
        forecasts: vec![
            ForecastSource::new("gp", "GP", &args.gp),
            ForecastSource::new("ffnn", "FFNN", &args.ffnn),
            ForecastSource::new("deepar", "DeepAR", &args.deepar),
        ],
        activity_path: args.data.clone(),
        actual_points: args.actual_points,
        reference_path: args.irt.clone(),
        reference_order: match args.irt_order {
            Order::Column => ReshapeOrder::ColumnMajor,
            Order::Row => ReshapeOrder::RowMajor,
        },
        reference_start,
        output: args.output.clone(),
        table_out: args.table_out.clone(),
        ..ComparisonConfig::default()
    };

    let table = run_comparison(&config).context("comparison pipeline failed")?;
    println!(
        "Compared {} series over {} hours -> {}",
        table.columns().len(),
        table.num_rows(),
        config.output.display()
    );
    if let Some(path) = &config.table_out {
        println!("Joined table -> {}", path.display());
    }
    Ok(())
}
