//! Benchmark dataset repository.
//!
//! Datasets are fetched from the public multivariate time-series collection
//! (gzip-compressed CSV text, one column per series), split into train and
//! rolling test sets, and cached on disk as JSON lines:
//!
//! ```text
//! <cache>/<name>/metadata.json
//! <cache>/<name>/train/data.json
//! <cache>/<name>/test/data.json
//! ```

use super::{DataEntry, ListDataset};
use crate::core::Frequency;
use crate::error::{ForecastError, Result};
use chrono::{TimeZone, Utc};
use flate2::read::GzDecoder;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufReader, Read};
use std::path::Path;
use tracing::{info, warn};

/// Share of time steps used for training.
const TRAIN_FRACTION: f64 = 0.8;

/// Static description of a benchmark dataset.
#[derive(Debug, Clone, PartialEq)]
pub struct DatasetInfo {
    pub name: &'static str,
    pub url: &'static str,
    pub num_series: usize,
    pub num_time_steps: usize,
    pub prediction_length: usize,
    pub rolling_evaluations: usize,
    /// `(year, month, day)` of the first observation.
    pub start: (i32, u32, u32),
    pub freq: &'static str,
}

const DATASETS: &[DatasetInfo] = &[
    DatasetInfo {
        name: "exchange_rate",
        url: "https://raw.githubusercontent.com/laiguokun/multivariate-time-series-data/master/exchange_rate/exchange_rate.txt.gz",
        num_series: 8,
        num_time_steps: 7588,
        prediction_length: 30,
        rolling_evaluations: 5,
        start: (1990, 1, 1),
        freq: "1B",
    },
    DatasetInfo {
        name: "electricity",
        url: "https://raw.githubusercontent.com/laiguokun/multivariate-time-series-data/master/electricity/electricity.txt.gz",
        num_series: 321,
        num_time_steps: 26304,
        prediction_length: 24,
        rolling_evaluations: 7,
        start: (2012, 1, 1),
        freq: "1H",
    },
    DatasetInfo {
        name: "traffic",
        url: "https://raw.githubusercontent.com/laiguokun/multivariate-time-series-data/master/traffic/traffic.txt.gz",
        num_series: 862,
        num_time_steps: 17544,
        prediction_length: 24,
        rolling_evaluations: 7,
        start: (2015, 1, 1),
        freq: "1H",
    },
];

impl DatasetInfo {
    /// Look up a dataset by name.
    pub fn lookup(name: &str) -> Result<&'static DatasetInfo> {
        DATASETS
            .iter()
            .find(|d| d.name == name)
            .ok_or_else(|| ForecastError::UnknownDataset(name.to_string()))
    }

    /// Names of every dataset the repository knows.
    pub fn names() -> Vec<&'static str> {
        DATASETS.iter().map(|d| d.name).collect()
    }

    pub fn frequency(&self) -> Result<Frequency> {
        self.freq.parse()
    }
}

/// A categorical static feature and its number of categories.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoricalFeatureInfo {
    pub name: String,
    pub cardinality: usize,
}

/// Dataset-level metadata stored next to the splits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetaData {
    pub freq: Frequency,
    pub prediction_length: usize,
    #[serde(default)]
    pub feat_static_cat: Vec<CategoricalFeatureInfo>,
}

/// Train and test splits of a benchmark dataset.
#[derive(Debug, Clone)]
pub struct TrainTestDataset {
    pub metadata: MetaData,
    pub train: ListDataset,
    pub test: ListDataset,
}

impl TrainTestDataset {
    /// Write the dataset into `dir`, replacing earlier files.
    pub fn save(&self, dir: &Path) -> Result<()> {
        fs::create_dir_all(dir.join("train"))?;
        fs::create_dir_all(dir.join("test"))?;
        let metadata = File::create(dir.join("metadata.json"))?;
        serde_json::to_writer_pretty(metadata, &self.metadata)?;
        self.train.write_jsonl(&dir.join("train").join("data.json"))?;
        self.test.write_jsonl(&dir.join("test").join("data.json"))?;
        Ok(())
    }

    /// Load a dataset previously written by [`TrainTestDataset::save`].
    pub fn load(dir: &Path) -> Result<Self> {
        let metadata: MetaData =
            serde_json::from_reader(BufReader::new(File::open(dir.join("metadata.json"))?))?;
        let train = ListDataset::read_jsonl(&dir.join("train").join("data.json"), metadata.freq)?;
        let test = ListDataset::read_jsonl(&dir.join("test").join("data.json"), metadata.freq)?;
        Ok(Self {
            metadata,
            train,
            test,
        })
    }
}

/// Fetch a benchmark dataset by name, using `cache_dir` for storage.
///
/// With `regenerate` set the dataset is always downloaded and rewritten;
/// otherwise an existing cache entry is reused.
pub fn get_dataset(name: &str, regenerate: bool, cache_dir: &Path) -> Result<TrainTestDataset> {
    let info = DatasetInfo::lookup(name)?;
    let dir = cache_dir.join(name);

    if !regenerate {
        if dir.join("metadata.json").exists() {
            info!(dataset = name, path = %dir.display(), "loading cached dataset");
            return TrainTestDataset::load(&dir);
        }
        warn!(dataset = name, "no cached copy, downloading");
    }

    info!(dataset = name, url = info.url, "downloading dataset");
    let bytes = reqwest::blocking::get(info.url)?
        .error_for_status()?
        .bytes()?;
    let dataset = generate_dataset(info, GzDecoder::new(&bytes[..]))?;
    dataset.save(&dir)?;
    info!(
        dataset = name,
        train = dataset.train.len(),
        test = dataset.test.len(),
        "dataset written"
    );
    Ok(dataset)
}

/// Build a dataset from a raw file already on disk.
///
/// Files ending in `.gz` are decompressed.
pub fn load_raw_dataset(info: &DatasetInfo, path: &Path) -> Result<TrainTestDataset> {
    let file = File::open(path)?;
    if path.extension().is_some_and(|ext| ext == "gz") {
        generate_dataset(info, GzDecoder::new(file))
    } else {
        generate_dataset(info, file)
    }
}

/// Split raw headerless CSV text (rows are time steps, columns are series).
pub fn generate_dataset<R: Read>(info: &DatasetInfo, raw: R) -> Result<TrainTestDataset> {
    let freq = info.frequency()?;
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .from_reader(raw);

    let mut columns: Vec<Vec<f64>> = vec![Vec::with_capacity(info.num_time_steps); info.num_series];
    for (row, record) in reader.records().enumerate() {
        let record = record?;
        if record.len() != info.num_series {
            return Err(ForecastError::shape(
                format!("{} row {}", info.name, row),
                info.num_series,
                record.len(),
            ));
        }
        for (column, cell) in columns.iter_mut().zip(record.iter()) {
            let value = cell.trim().parse::<f64>().map_err(|_| {
                ForecastError::Parse(format!("{} row {}: '{}'", info.name, row, cell))
            })?;
            column.push(value);
        }
    }

    let num_steps = columns.first().map(Vec::len).unwrap_or(0);
    if num_steps != info.num_time_steps {
        return Err(ForecastError::shape(
            format!("{} time steps", info.name),
            info.num_time_steps,
            num_steps,
        ));
    }

    let (y, m, d) = info.start;
    let start = Utc
        .with_ymd_and_hms(y, m, d, 0, 0, 0)
        .single()
        .ok_or_else(|| ForecastError::TimestampError(format!("{}-{}-{}", y, m, d)))?;
    let train_len = (num_steps as f64 * TRAIN_FRACTION) as usize;

    let mut train = Vec::with_capacity(info.num_series);
    let mut test = Vec::with_capacity(info.num_series * info.rolling_evaluations);
    for (cat, column) in columns.iter().enumerate() {
        train.push(entry(start, &column[..train_len], cat));
    }
    for window in 0..info.rolling_evaluations {
        let end = train_len + (window + 1) * info.prediction_length;
        if end > num_steps {
            break;
        }
        for (cat, column) in columns.iter().enumerate() {
            test.push(entry(start, &column[..end], cat));
        }
    }

    Ok(TrainTestDataset {
        metadata: MetaData {
            freq,
            prediction_length: info.prediction_length,
            feat_static_cat: vec![CategoricalFeatureInfo {
                name: "feat_static_cat".to_string(),
                cardinality: info.num_series,
            }],
        },
        train: ListDataset::new(train, freq)?,
        test: ListDataset::new(test, freq)?,
    })
}

fn entry(start: chrono::DateTime<Utc>, target: &[f64], cat: usize) -> DataEntry {
    DataEntry {
        start,
        target: target.to_vec(),
        item_id: Some(cat.to_string()),
        feat_static_cat: vec![cat],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tiny_info() -> DatasetInfo {
        DatasetInfo {
            name: "tiny",
            url: "",
            num_series: 2,
            num_time_steps: 20,
            prediction_length: 2,
            rolling_evaluations: 2,
            start: (1990, 1, 1),
            freq: "1B",
        }
    }

    fn tiny_raw() -> String {
        (0..20)
            .map(|i| format!("{},{}\n", i as f64 * 0.5, 100.0 - i as f64))
            .collect()
    }

    #[test]
    fn lookup_knows_exchange_rate() {
        let info = DatasetInfo::lookup("exchange_rate").unwrap();
        assert_eq!(info.num_series, 8);
        assert_eq!(info.prediction_length, 30);
        assert_eq!(info.frequency().unwrap(), Frequency::business_daily());
        assert!(DatasetInfo::names().contains(&"exchange_rate"));
        assert!(matches!(
            DatasetInfo::lookup("m4_hourly"),
            Err(ForecastError::UnknownDataset(_))
        ));
    }

    #[test]
    fn generate_splits_train_and_rolling_test() {
        let ds = generate_dataset(&tiny_info(), tiny_raw().as_bytes()).unwrap();

        assert_eq!(ds.train.len(), 2);
        assert_eq!(ds.train.get(0).unwrap().len(), 16);
        assert_eq!(ds.train.get(1).unwrap().target[0], 100.0);

        // 2 windows x 2 series
        assert_eq!(ds.test.len(), 4);
        assert_eq!(ds.test.get(0).unwrap().len(), 18);
        assert_eq!(ds.test.get(3).unwrap().len(), 20);
        assert_eq!(ds.test.get(3).unwrap().feat_static_cat, vec![1]);

        assert_eq!(ds.metadata.prediction_length, 2);
        assert_eq!(ds.metadata.feat_static_cat[0].cardinality, 2);
    }

    #[test]
    fn generate_rejects_wrong_shape() {
        let short: String = tiny_raw().lines().take(10).map(|l| format!("{}\n", l)).collect();
        assert!(matches!(
            generate_dataset(&tiny_info(), short.as_bytes()),
            Err(ForecastError::ShapeMismatch { .. })
        ));

        let ragged = "1.0,2.0\n3.0\n";
        assert!(generate_dataset(&tiny_info(), ragged.as_bytes()).is_err());
    }

    #[test]
    fn save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let ds = generate_dataset(&tiny_info(), tiny_raw().as_bytes()).unwrap();
        ds.save(dir.path()).unwrap();

        let loaded = TrainTestDataset::load(dir.path()).unwrap();
        assert_eq!(loaded.metadata, ds.metadata);
        assert_eq!(loaded.train, ds.train);
        assert_eq!(loaded.test, ds.test);
    }

    #[test]
    fn raw_files_may_be_gzipped() {
        use flate2::write::GzEncoder;
        use flate2::Compression;
        use std::io::Write;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tiny.txt.gz");
        let mut encoder = GzEncoder::new(File::create(&path).unwrap(), Compression::default());
        encoder.write_all(tiny_raw().as_bytes()).unwrap();
        encoder.finish().unwrap();

        let ds = load_raw_dataset(&tiny_info(), &path).unwrap();
        assert_eq!(ds.train.len(), 2);
    }
}
