//! Comparison of precomputed forecasts against observed TEC and IRI 2016.

use super::{index_values, study_end, study_start};
use crate::align::{wide_to_long, ComparisonTable, ReshapeOrder};
use crate::core::{Frequency, TimeSeries};
use crate::error::{ForecastError, Result};
use crate::plot::comparison_chart;
use crate::table::{read_forecast_csv, Table};
use chrono::{DateTime, Utc};
use std::path::PathBuf;
use tracing::{debug, info};

/// A headerless `value,timestamp` forecast file and how to label it.
#[derive(Debug, Clone, PartialEq)]
pub struct ForecastSource {
    pub key: String,
    pub label: String,
    pub path: PathBuf,
}

impl ForecastSource {
    pub fn new(key: &str, label: &str, path: impl Into<PathBuf>) -> Self {
        Self {
            key: key.to_string(),
            label: label.to_string(),
            path: path.into(),
        }
    }
}

/// Settings of the comparison chart.
#[derive(Debug, Clone)]
pub struct ComparisonConfig {
    /// Forecast files; the first one defines the comparison index.
    pub forecasts: Vec<ForecastSource>,
    pub activity_path: PathBuf,
    /// Columns removed from the activity table before reading the target.
    pub activity_drop: Vec<String>,
    pub target_column: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub frequency: Frequency,
    /// Trailing observed points compared with the forecasts.
    pub actual_points: usize,
    pub reference_path: PathBuf,
    pub reference_drop: Vec<String>,
    pub reference_order: ReshapeOrder,
    /// First timestamp of the reshaped reference; the index start when unset.
    pub reference_start: Option<DateTime<Utc>>,
    pub output: PathBuf,
    pub table_out: Option<PathBuf>,
}

impl Default for ComparisonConfig {
    fn default() -> Self {
        let metrics = PathBuf::from("results_4_paper/metrics");
        Self {
            forecasts: vec![
                ForecastSource::new("gp", "GP", metrics.join("forecast_gp.csv")),
                ForecastSource::new("ffnn", "FFNN", metrics.join("forecast_ffnn.csv")),
                ForecastSource::new("deepar", "DeepAR", metrics.join("forecast_deepar.csv")),
            ],
            activity_path: PathBuf::from("data/Data.csv"),
            activity_drop: ["Date", "HR", "Kp", "SSN", "Ap", "F"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            target_column: "TEC".to_string(),
            start: study_start(),
            end: study_end(),
            frequency: Frequency::hourly(),
            actual_points: 96,
            reference_path: PathBuf::from("data/irt_data.csv"),
            reference_drop: vec!["Time".to_string()],
            reference_order: ReshapeOrder::ColumnMajor,
            reference_start: None,
            output: PathBuf::from("results_4_paper/plots/forecast_comparison.png"),
            table_out: None,
        }
    }
}

fn drop_list(names: &[String]) -> Vec<&str> {
    names.iter().map(String::as_str).collect()
}

/// The last `actual_points` observations, indexed by the study range.
pub fn load_actual(config: &ComparisonConfig) -> Result<TimeSeries> {
    let table = Table::read(&config.activity_path)?
        .drop_columns(&drop_list(&config.activity_drop))?;
    let values = table.numeric_column(&config.target_column)?;
    let series = index_values(
        values,
        config.start,
        config.end,
        config.frequency,
        &config.target_column,
    )?;
    if series.len() < config.actual_points {
        return Err(ForecastError::InsufficientData {
            needed: config.actual_points,
            got: series.len(),
        });
    }
    Ok(series.tail(config.actual_points))
}

/// Reshape the wide reference table into one series of `expected` points.
pub fn load_reference(
    config: &ComparisonConfig,
    start: DateTime<Utc>,
    expected: usize,
) -> Result<TimeSeries> {
    let table = Table::read_csv(&config.reference_path, true)?
        .drop_columns(&drop_list(&config.reference_drop))?;
    let values = wide_to_long(&table, config.reference_order)?;
    debug!(
        rows = table.num_rows(),
        columns = table.num_columns(),
        "reshaped reference table"
    );
    if values.len() != expected {
        return Err(ForecastError::shape(
            format!(
                "reference reshape ({} rows x {} columns)",
                table.num_rows(),
                table.num_columns()
            ),
            expected,
            values.len(),
        ));
    }
    let start = config.reference_start.unwrap_or(start);
    Ok(TimeSeries::regular(start, config.frequency, values))
}

/// Read every input and join it on the first forecast's timestamps.
pub fn build_comparison_table(config: &ComparisonConfig) -> Result<ComparisonTable> {
    let (first, rest) = config
        .forecasts
        .split_first()
        .ok_or_else(|| ForecastError::InvalidParameter("no forecast files given".to_string()))?;

    let series = read_forecast_csv(&first.path, &first.key)?;
    let start = series.start().ok_or(ForecastError::EmptyData)?;
    let rows = series.len();
    let mut table = ComparisonTable::from_series(&series, &first.key, &first.label)?;
    for source in rest {
        info!(path = %source.path.display(), "reading forecast");
        let series = read_forecast_csv(&source.path, &source.key)?;
        table = table.join(&series, &source.key, &source.label)?;
    }

    table = table.join(&load_actual(config)?, "actual", "Actual")?;
    table = table.join(&load_reference(config, start, rows)?, "iri2016", "IRI 2016")?;
    if table.has_missing_values() {
        return Err(ForecastError::MissingValues("comparison table".to_string()));
    }
    Ok(table)
}

/// Run the comparison pipeline: join, render and optionally export.
pub fn run_comparison(config: &ComparisonConfig) -> Result<ComparisonTable> {
    let table = build_comparison_table(config)?;
    info!(
        rows = table.num_rows(),
        columns = table.columns().len(),
        "comparison table joined"
    );

    comparison_chart(&table).render(&config.output)?;
    info!(path = %config.output.display(), "comparison chart written");

    if let Some(path) = &config.table_out {
        table.write_csv(path)?;
        info!(path = %path.display(), "comparison table written");
    }
    Ok(table)
}
