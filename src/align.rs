//! Timestamp-keyed alignment of several series onto one index.
//!
//! A [`ComparisonTable`] owns a timestamp index; every joined column must
//! carry exactly those timestamps, in order. Positional concatenation is never
//! used, so a forecast file covering a different window fails loudly with
//! [`ForecastError::IndexMismatch`].

use crate::core::TimeSeries;
use crate::error::{ForecastError, Result};
use crate::table::Table;
use chrono::{DateTime, Utc};
use std::fs::File;
use std::path::Path;

/// Flattening order for [`wide_to_long`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReshapeOrder {
    /// Every value of the first column, then the second, and so on.
    #[default]
    ColumnMajor,
    /// Every value of the first row, then the second, and so on.
    RowMajor,
}

/// Flatten a numeric table into one sequence of `rows x columns` values.
pub fn wide_to_long(table: &Table, order: ReshapeOrder) -> Result<Vec<f64>> {
    let columns = table.numeric_columns()?;
    let rows = table.num_rows();
    let mut out = Vec::with_capacity(rows * columns.len());
    match order {
        ReshapeOrder::ColumnMajor => {
            for column in &columns {
                out.extend_from_slice(column);
            }
        }
        ReshapeOrder::RowMajor => {
            for r in 0..rows {
                out.extend(columns.iter().map(|c| c[r]));
            }
        }
    }
    Ok(out)
}

/// One named column of a [`ComparisonTable`].
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    /// Join key, unique within a table.
    pub key: String,
    /// Legend label.
    pub label: String,
    pub values: Vec<f64>,
}

/// Several series sharing a timestamp index.
#[derive(Debug, Clone, PartialEq)]
pub struct ComparisonTable {
    index: Vec<DateTime<Utc>>,
    columns: Vec<Column>,
}

impl ComparisonTable {
    /// Start a table from an explicit index.
    pub fn new(index: Vec<DateTime<Utc>>) -> Result<Self> {
        if index.is_empty() {
            return Err(ForecastError::EmptyData);
        }
        if index.windows(2).any(|w| w[0] >= w[1]) {
            return Err(ForecastError::TimestampError(
                "comparison index must be strictly increasing".to_string(),
            ));
        }
        Ok(Self {
            index,
            columns: Vec::new(),
        })
    }

    /// Start a table whose index is the timestamps of `series`.
    pub fn from_series(series: &TimeSeries, key: &str, label: &str) -> Result<Self> {
        Self::new(series.timestamps().to_vec())?.join(series, key, label)
    }

    /// Add a column, requiring its timestamps to equal the index.
    pub fn join(mut self, series: &TimeSeries, key: &str, label: &str) -> Result<Self> {
        if self.columns.iter().any(|c| c.key == key) {
            return Err(ForecastError::InvalidParameter(format!(
                "duplicate column '{}'",
                key
            )));
        }
        if series.len() != self.index.len() {
            return Err(ForecastError::IndexMismatch {
                column: key.to_string(),
                reason: format!(
                    "{} values for an index of {}",
                    series.len(),
                    self.index.len()
                ),
            });
        }
        if let Some(pos) = series
            .timestamps()
            .iter()
            .zip(&self.index)
            .position(|(a, b)| a != b)
        {
            return Err(ForecastError::IndexMismatch {
                column: key.to_string(),
                reason: format!(
                    "row {} is {} but the index has {}",
                    pos,
                    series.timestamps()[pos],
                    self.index[pos]
                ),
            });
        }
        self.columns.push(Column {
            key: key.to_string(),
            label: label.to_string(),
            values: series.values().to_vec(),
        });
        Ok(self)
    }

    pub fn num_rows(&self) -> usize {
        self.index.len()
    }

    pub fn index(&self) -> &[DateTime<Utc>] {
        &self.index
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column(&self, key: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.key == key)
    }

    pub fn has_missing_values(&self) -> bool {
        self.columns
            .iter()
            .any(|c| c.values.iter().any(|v| !v.is_finite()))
    }

    /// Write as CSV: a `timestamp` column, then one column per key.
    pub fn write_csv(&self, path: &Path) -> Result<()> {
        let mut writer = csv::Writer::from_writer(File::create(path)?);
        let mut header = vec!["timestamp".to_string()];
        header.extend(self.columns.iter().map(|c| c.key.clone()));
        writer.write_record(&header)?;
        for (row, ts) in self.index.iter().enumerate() {
            let mut record = vec![ts.format("%Y-%m-%d %H:%M:%S").to_string()];
            record.extend(self.columns.iter().map(|c| c.values[row].to_string()));
            writer.write_record(&record)?;
        }
        writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Frequency;
    use crate::table::read_forecast_csv;
    use chrono::TimeZone;

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2018, 1, 23, 0, 0, 0).unwrap()
    }

    fn series(offset: usize, values: Vec<f64>) -> TimeSeries {
        let freq = Frequency::hourly();
        TimeSeries::regular(freq.advance(start(), offset), freq, values)
    }

    #[test]
    fn column_major_stacks_columns() {
        let table = Table::new(
            vec!["a".into(), "b".into()],
            vec![
                vec!["1".into(), "4".into()],
                vec!["2".into(), "5".into()],
                vec!["3".into(), "6".into()],
            ],
        )
        .unwrap();
        assert_eq!(
            wide_to_long(&table, ReshapeOrder::ColumnMajor).unwrap(),
            vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]
        );
        assert_eq!(
            wide_to_long(&table, ReshapeOrder::RowMajor).unwrap(),
            vec![1.0, 4.0, 2.0, 5.0, 3.0, 6.0]
        );
        assert_eq!(ReshapeOrder::default(), ReshapeOrder::ColumnMajor);
    }

    #[test]
    fn join_requires_identical_index() {
        let table = ComparisonTable::from_series(&series(0, vec![1.0, 2.0, 3.0]), "gp", "GP").unwrap();
        let table = table.join(&series(0, vec![4.0, 5.0, 6.0]), "ffnn", "FFNN").unwrap();
        assert_eq!(table.num_rows(), 3);
        assert_eq!(table.columns().len(), 2);
        assert_eq!(table.column("ffnn").unwrap().values, vec![4.0, 5.0, 6.0]);
        assert_eq!(table.column("ffnn").unwrap().label, "FFNN");
        assert!(!table.has_missing_values());

        let shifted = table.clone().join(&series(1, vec![7.0, 8.0, 9.0]), "deepar", "DeepAR");
        assert!(matches!(
            shifted,
            Err(ForecastError::IndexMismatch { ref column, .. }) if column == "deepar"
        ));

        let short = table.clone().join(&series(0, vec![7.0, 8.0]), "deepar", "DeepAR");
        assert!(matches!(short, Err(ForecastError::IndexMismatch { .. })));

        let dup = table.join(&series(0, vec![7.0, 8.0, 9.0]), "gp", "GP");
        assert!(matches!(dup, Err(ForecastError::InvalidParameter(_))));
    }

    #[test]
    fn index_must_increase() {
        assert!(matches!(ComparisonTable::new(vec![]), Err(ForecastError::EmptyData)));
        assert!(ComparisonTable::new(vec![start(), start()]).is_err());
    }

    #[test]
    fn csv_output_has_timestamp_column() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("joined.csv");
        ComparisonTable::from_series(&series(0, vec![1.5, 2.5]), "gp", "GP")
            .unwrap()
            .write_csv(&path)
            .unwrap();

        let table = Table::read_csv(&path, true).unwrap();
        assert_eq!(table.headers(), &["timestamp".to_string(), "gp".to_string()]);
        assert_eq!(table.column("timestamp").unwrap()[1], "2018-01-23 01:00:00");
        assert_eq!(table.numeric_column("gp").unwrap(), vec![1.5, 2.5]);

        // the two-column slice reads back through the forecast-file parser
        let raw = dir.path().join("gp.csv");
        std::fs::write(&raw, "1.5,2018-01-23 00:00:00\n2.5,2018-01-23 01:00:00\n").unwrap();
        let back = read_forecast_csv(&raw, "gp").unwrap();
        assert_eq!(back.timestamps(), series(0, vec![0.0, 0.0]).timestamps());
    }
}
