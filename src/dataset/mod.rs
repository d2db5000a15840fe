//! Dataset records consumed by estimators.
//!
//! A [`ListDataset`] is a list of [`DataEntry`] values sharing one frequency.
//! Entries serialize as JSON lines with the field names `start`, `target`,
//! `item_id` and `feat_static_cat`.

pub mod repository;

use crate::core::{Frequency, TimeSeries};
use crate::error::{ForecastError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

pub use repository::{get_dataset, CategoricalFeatureInfo, DatasetInfo, MetaData, TrainTestDataset};

/// One time series in dataset form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataEntry {
    pub start: DateTime<Utc>,
    pub target: Vec<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item_id: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub feat_static_cat: Vec<usize>,
}

impl DataEntry {
    pub fn new(start: DateTime<Utc>, target: Vec<f64>) -> Self {
        Self {
            start,
            target,
            item_id: None,
            feat_static_cat: Vec::new(),
        }
    }

    pub fn with_item_id(mut self, item_id: impl Into<String>) -> Self {
        self.item_id = Some(item_id.into());
        self
    }

    /// Names of the fields present on this entry.
    pub fn keys(&self) -> Vec<&'static str> {
        let mut keys = vec!["start", "target"];
        if self.item_id.is_some() {
            keys.push("item_id");
        }
        if !self.feat_static_cat.is_empty() {
            keys.push("feat_static_cat");
        }
        keys
    }

    pub fn len(&self) -> usize {
        self.target.len()
    }

    pub fn is_empty(&self) -> bool {
        self.target.is_empty()
    }

    /// Same entry without its last `n` target values.
    pub fn truncated(&self, n: usize) -> Result<DataEntry> {
        if n >= self.target.len() {
            return Err(ForecastError::InsufficientData {
                needed: n + 1,
                got: self.target.len(),
            });
        }
        Ok(DataEntry {
            target: self.target[..self.target.len() - n].to_vec(),
            ..self.clone()
        })
    }

    /// Timestamp of the first point after the target.
    pub fn forecast_start(&self, frequency: Frequency) -> DateTime<Utc> {
        frequency.advance(self.start, self.target.len())
    }

    /// The entry as a contiguous time series.
    pub fn to_series(&self, frequency: Frequency) -> TimeSeries {
        let series = TimeSeries::regular(self.start, frequency, self.target.clone());
        match &self.item_id {
            Some(id) => series.with_name(id.clone()),
            None => series,
        }
    }
}

/// A collection of entries at a shared frequency.
#[derive(Debug, Clone, PartialEq)]
pub struct ListDataset {
    entries: Vec<DataEntry>,
    frequency: Frequency,
}

impl ListDataset {
    /// Build a dataset, validating every entry.
    ///
    /// Targets must be non-empty and finite; starts are rolled onto the
    /// frequency grid (weekend starts move to Monday for business days).
    pub fn new(entries: Vec<DataEntry>, frequency: Frequency) -> Result<Self> {
        let mut entries = entries;
        for (i, entry) in entries.iter_mut().enumerate() {
            if entry.target.is_empty() {
                return Err(ForecastError::EmptyData);
            }
            if entry.target.iter().any(|v| !v.is_finite()) {
                return Err(ForecastError::MissingValues(format!("dataset entry {}", i)));
            }
            entry.start = frequency.align(entry.start);
        }
        Ok(Self { entries, frequency })
    }

    /// Single-entry dataset from a series.
    pub fn from_series(series: &TimeSeries, frequency: Frequency) -> Result<Self> {
        let start = series.start().ok_or(ForecastError::EmptyData)?;
        let mut entry = DataEntry::new(start, series.values().to_vec());
        entry.item_id = series.name().map(str::to_string);
        Self::new(vec![entry], frequency)
    }

    pub fn frequency(&self) -> Frequency {
        self.frequency
    }

    pub fn entries(&self) -> &[DataEntry] {
        &self.entries
    }

    pub fn get(&self, index: usize) -> Option<&DataEntry> {
        self.entries.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &DataEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Read a JSON-lines file.
    pub fn read_jsonl(path: &Path, frequency: Frequency) -> Result<Self> {
        let reader = BufReader::new(File::open(path)?);
        let mut entries = Vec::new();
        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            entries.push(serde_json::from_str(&line)?);
        }
        Self::new(entries, frequency)
    }

    /// Write as a JSON-lines file, replacing any previous content.
    pub fn write_jsonl(&self, path: &Path) -> Result<()> {
        let mut writer = BufWriter::new(File::create(path)?);
        for entry in &self.entries {
            serde_json::to_writer(&mut writer, entry)?;
            writer.write_all(b"\n")?;
        }
        writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2018, 1, 10, 0, 0, 0).unwrap()
    }

    #[test]
    fn entry_keys_follow_present_fields() {
        let entry = DataEntry::new(start(), vec![1.0]);
        assert_eq!(entry.keys(), vec!["start", "target"]);

        let mut entry = entry.with_item_id("0");
        entry.feat_static_cat = vec![0];
        assert_eq!(
            entry.keys(),
            vec!["start", "target", "item_id", "feat_static_cat"]
        );
    }

    #[test]
    fn truncation_withholds_horizon() {
        let entry = DataEntry::new(start(), (0..408).map(|i| i as f64).collect());
        let train = entry.truncated(24).unwrap();
        assert_eq!(train.len(), 384);
        assert_eq!(train.target[383], 383.0);
        assert_eq!(
            train.forecast_start(Frequency::hourly()),
            Utc.with_ymd_and_hms(2018, 1, 26, 0, 0, 0).unwrap()
        );
        assert!(entry.truncated(408).is_err());
    }

    #[test]
    fn dataset_rejects_bad_targets() {
        let empty = DataEntry::new(start(), vec![]);
        assert!(matches!(
            ListDataset::new(vec![empty], Frequency::hourly()),
            Err(ForecastError::EmptyData)
        ));

        let nan = DataEntry::new(start(), vec![1.0, f64::NAN]);
        assert!(matches!(
            ListDataset::new(vec![nan], Frequency::hourly()),
            Err(ForecastError::MissingValues(_))
        ));
    }

    #[test]
    fn dataset_aligns_business_day_starts() {
        // 1990-01-06 is a Saturday
        let saturday = Utc.with_ymd_and_hms(1990, 1, 6, 0, 0, 0).unwrap();
        let ds = ListDataset::new(
            vec![DataEntry::new(saturday, vec![1.0])],
            Frequency::business_daily(),
        )
        .unwrap();
        assert_eq!(
            ds.get(0).unwrap().start,
            Utc.with_ymd_and_hms(1990, 1, 8, 0, 0, 0).unwrap()
        );
    }

    #[test]
    fn jsonl_round_trip_preserves_entries() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.json");
        let ds = ListDataset::new(
            vec![
                DataEntry::new(start(), vec![1.0, 2.0]).with_item_id("a"),
                DataEntry::new(start(), vec![3.0]),
            ],
            Frequency::hourly(),
        )
        .unwrap();

        ds.write_jsonl(&path).unwrap();
        let loaded = ListDataset::read_jsonl(&path, Frequency::hourly()).unwrap();
        assert_eq!(loaded, ds);
    }

    #[test]
    fn from_series_keeps_name() {
        let series = TimeSeries::regular(start(), Frequency::hourly(), vec![1.0, 2.0]).with_name("TEC");
        let ds = ListDataset::from_series(&series, Frequency::hourly()).unwrap();
        assert_eq!(ds.len(), 1);
        assert_eq!(ds.get(0).unwrap().item_id.as_deref(), Some("TEC"));
        assert_eq!(ds.get(0).unwrap().to_series(Frequency::hourly()), series);
    }
}
