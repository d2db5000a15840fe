//! Flat-file tables: CSV or spreadsheet in, named columns out.

use crate::core::TimeSeries;
use crate::error::{ForecastError, Result};
use calamine::{open_workbook_auto, Data, Reader};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use std::fs::File;
use std::path::Path;

const SPREADSHEET_EXTENSIONS: [&str; 4] = ["xls", "xlsx", "xlsm", "ods"];

/// A table held as strings, one vector per row.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl Table {
    /// Create a table, checking every row has one cell per header.
    pub fn new(headers: Vec<String>, rows: Vec<Vec<String>>) -> Result<Self> {
        for (i, row) in rows.iter().enumerate() {
            if row.len() != headers.len() {
                return Err(ForecastError::shape(
                    format!("table row {}", i),
                    headers.len(),
                    row.len(),
                ));
            }
        }
        Ok(Self { headers, rows })
    }

    /// Read a CSV file.
    ///
    /// Without a header row, columns are named by position (`"0"`, `"1"`, ...).
    pub fn read_csv(path: &Path, has_headers: bool) -> Result<Self> {
        let file = File::open(path)
            .map_err(|e| ForecastError::Io(format!("{}: {}", path.display(), e)))?;
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(has_headers)
            .trim(csv::Trim::All)
            .from_reader(file);

        let mut rows = Vec::new();
        for record in reader.records() {
            rows.push(record?.iter().map(str::to_string).collect::<Vec<_>>());
        }

        let headers = if has_headers {
            reader.headers()?.iter().map(str::to_string).collect()
        } else {
            let width = rows.first().map(Vec::len).unwrap_or(0);
            (0..width).map(|i| i.to_string()).collect()
        };
        Self::new(headers, rows)
    }

    /// Read a table with a header row, choosing the reader by extension.
    ///
    /// `.xls`, `.xlsx`, `.xlsm` and `.ods` files go through
    /// [`Table::read_spreadsheet`]; everything else is read as CSV.
    pub fn read(path: &Path) -> Result<Self> {
        if is_spreadsheet(path) {
            Self::read_spreadsheet(path)
        } else {
            Self::read_csv(path, true)
        }
    }

    /// Read the first sheet of a workbook; its first row holds the headers.
    pub fn read_spreadsheet(path: &Path) -> Result<Self> {
        let mut workbook = open_workbook_auto(path)
            .map_err(|e| ForecastError::Spreadsheet(format!("{}: {}", path.display(), e)))?;
        let range = workbook.worksheet_range_at(0).ok_or_else(|| {
            ForecastError::Spreadsheet(format!("{}: workbook has no sheets", path.display()))
        })??;
        Self::from_cells(range.rows())
    }

    fn from_cells<'a>(mut rows: impl Iterator<Item = &'a [Data]>) -> Result<Self> {
        let headers = rows
            .next()
            .ok_or(ForecastError::EmptyData)?
            .iter()
            .map(cell_text)
            .collect();
        let body = rows
            .map(|row| row.iter().map(cell_text).collect())
            .collect();
        Self::new(headers, body)
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn num_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn num_columns(&self) -> usize {
        self.headers.len()
    }

    fn position(&self, name: &str) -> Result<usize> {
        self.headers
            .iter()
            .position(|h| h == name)
            .ok_or_else(|| ForecastError::MissingColumn(name.to_string()))
    }

    /// A copy without the named columns. Every name must exist.
    pub fn drop_columns(&self, names: &[&str]) -> Result<Table> {
        let mut drop = Vec::with_capacity(names.len());
        for name in names {
            drop.push(self.position(name)?);
        }
        let keep: Vec<usize> = (0..self.headers.len()).filter(|i| !drop.contains(i)).collect();
        Ok(Table {
            headers: keep.iter().map(|&i| self.headers[i].clone()).collect(),
            rows: self
                .rows
                .iter()
                .map(|row| keep.iter().map(|&i| row[i].clone()).collect())
                .collect(),
        })
    }

    /// Raw cells of a column.
    pub fn column(&self, name: &str) -> Result<Vec<&str>> {
        let idx = self.position(name)?;
        Ok(self.rows.iter().map(|row| row[idx].as_str()).collect())
    }

    /// A column parsed as finite floats.
    pub fn numeric_column(&self, name: &str) -> Result<Vec<f64>> {
        self.column(name)?
            .into_iter()
            .enumerate()
            .map(|(row, cell)| parse_value(cell, name, row))
            .collect()
    }

    /// Every column parsed as floats, in header order.
    pub fn numeric_columns(&self) -> Result<Vec<Vec<f64>>> {
        self.headers
            .iter()
            .map(|name| self.numeric_column(name))
            .collect()
    }
}

fn is_spreadsheet(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| SPREADSHEET_EXTENSIONS.iter().any(|s| e.eq_ignore_ascii_case(s)))
        .unwrap_or(false)
}

fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.trim().to_string(),
        Data::Float(f) => f.to_string(),
        Data::Int(i) => i.to_string(),
        other => other.to_string(),
    }
}

fn parse_value(cell: &str, column: &str, row: usize) -> Result<f64> {
    if cell.is_empty() {
        return Err(ForecastError::MissingValues(format!(
            "column '{}' row {}",
            column, row
        )));
    }
    let value = cell.parse::<f64>().map_err(|_| {
        ForecastError::Parse(format!("column '{}' row {}: '{}'", column, row, cell))
    })?;
    if !value.is_finite() {
        return Err(ForecastError::MissingValues(format!(
            "column '{}' row {}",
            column, row
        )));
    }
    Ok(value)
}

/// Parse a timestamp in RFC 3339 or the common `YYYY-MM-DD HH:MM[:SS]` forms.
///
/// Naive timestamps are taken as UTC.
pub fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(s) {
        return Ok(ts.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Ok(naive.and_utc());
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        if let Some(naive) = date.and_hms_opt(0, 0, 0) {
            return Ok(naive.and_utc());
        }
    }
    Err(ForecastError::TimestampError(format!(
        "unrecognized timestamp '{}'",
        s
    )))
}

/// Read a headerless two-column `value,timestamp` forecast file.
pub fn read_forecast_csv(path: &Path, name: &str) -> Result<TimeSeries> {
    let table = Table::read_csv(path, false)?;
    if table.num_columns() != 2 {
        return Err(ForecastError::shape(
            format!("forecast file {}", path.display()),
            2,
            table.num_columns(),
        ));
    }
    let values = table.numeric_column("0")?;
    let timestamps = table
        .column("1")?
        .into_iter()
        .map(parse_timestamp)
        .collect::<Result<Vec<_>>>()?;
    Ok(TimeSeries::new(timestamps, values)?.with_name(name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::io::Write;

    fn write(dir: &tempfile::TempDir, name: &str, content: &str) -> std::path::PathBuf {
        let path = dir.path().join(name);
        let mut file = File::create(&path).unwrap();
        file.write_all(content.as_bytes()).unwrap();
        path
    }

    #[test]
    fn reads_headers_and_drops_columns() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            &dir,
            "Data.csv",
            "Date,HR,Kp,SSN,Ap,F,TEC\n2018-01-10,0,1,10,3,70.1,12.5\n2018-01-10,1,1,10,3,70.1,11.0\n",
        );
        let table = Table::read_csv(&path, true).unwrap();
        assert_eq!(table.num_rows(), 2);
        assert_eq!(table.num_columns(), 7);

        let tec = table
            .drop_columns(&["Date", "HR", "Kp", "SSN", "Ap", "F"])
            .unwrap();
        assert_eq!(tec.headers(), &["TEC".to_string()]);
        assert_eq!(tec.numeric_column("TEC").unwrap(), vec![12.5, 11.0]);

        assert!(matches!(
            table.drop_columns(&["Dst"]),
            Err(ForecastError::MissingColumn(_))
        ));
    }

    #[test]
    fn read_picks_the_reader_by_extension() {
        let dir = tempfile::tempdir().unwrap();
        let csv = write(&dir, "TEC_Data.csv", "HR,TEC\n0,12.5\n1,11.0\n");
        let table = Table::read(&csv).unwrap();
        assert_eq!(table.numeric_column("TEC").unwrap(), vec![12.5, 11.0]);

        // CSV text behind a workbook extension is not silently parsed as CSV
        let xls = write(&dir, "TEC_Data.xls", "HR,TEC\n0,12.5\n");
        assert!(matches!(Table::read(&xls), Err(ForecastError::Spreadsheet(_))));
        assert!(matches!(
            Table::read(&dir.path().join("missing.XLSX")),
            Err(ForecastError::Spreadsheet(_))
        ));
        assert!(is_spreadsheet(Path::new("TEC_Data.ods")));
        assert!(!is_spreadsheet(Path::new("TEC_Data")));
    }

    #[test]
    fn sheet_cells_become_a_table() {
        let rows = vec![
            vec![
                Data::String("Date".into()),
                Data::String(" TEC ".into()),
                Data::String("Kp".into()),
            ],
            vec![Data::String("2018-01-10".into()), Data::Float(12.5), Data::Int(2)],
            vec![Data::String("2018-01-10".into()), Data::Float(11.0), Data::Empty],
        ];
        let table = Table::from_cells(rows.iter().map(Vec::as_slice)).unwrap();
        assert_eq!(table.headers(), &["Date", "TEC", "Kp"]);
        assert_eq!(table.numeric_column("TEC").unwrap(), vec![12.5, 11.0]);
        assert!(matches!(
            table.numeric_column("Kp"),
            Err(ForecastError::MissingValues(_))
        ));

        let empty: Vec<Vec<Data>> = Vec::new();
        assert!(matches!(
            Table::from_cells(empty.iter().map(Vec::as_slice)),
            Err(ForecastError::EmptyData)
        ));
    }

    #[test]
    fn numeric_columns_reject_blank_and_text_cells() {
        let table = Table::new(
            vec!["a".into(), "b".into()],
            vec![vec!["1".into(), "".into()], vec!["x".into(), "2".into()]],
        )
        .unwrap();
        assert!(matches!(
            table.numeric_column("b"),
            Err(ForecastError::MissingValues(_))
        ));
        assert!(matches!(
            table.numeric_column("a"),
            Err(ForecastError::Parse(_))
        ));
        assert!(Table::new(vec!["a".into()], vec![vec![]]).is_err());
    }

    #[test]
    fn parses_common_timestamp_forms() {
        let expected = Utc.with_ymd_and_hms(2018, 1, 23, 5, 0, 0).unwrap();
        assert_eq!(parse_timestamp("2018-01-23 05:00:00").unwrap(), expected);
        assert_eq!(parse_timestamp("2018-01-23T05:00:00").unwrap(), expected);
        assert_eq!(parse_timestamp("2018-01-23 05:00").unwrap(), expected);
        assert_eq!(parse_timestamp("2018-01-23T05:00:00Z").unwrap(), expected);
        assert_eq!(
            parse_timestamp("2018-01-23").unwrap(),
            Utc.with_ymd_and_hms(2018, 1, 23, 0, 0, 0).unwrap()
        );
        assert!(parse_timestamp("23/01/2018").is_err());
    }

    #[test]
    fn reads_headerless_forecast_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            &dir,
            "forecast_gp.csv",
            "10.5,2018-01-23 00:00:00\n11.0,2018-01-23 01:00:00\n",
        );
        let series = read_forecast_csv(&path, "gp").unwrap();
        assert_eq!(series.len(), 2);
        assert_eq!(series.name(), Some("gp"));
        assert_eq!(series.values(), &[10.5, 11.0]);
        assert_eq!(
            series.start().unwrap(),
            Utc.with_ymd_and_hms(2018, 1, 23, 0, 0, 0).unwrap()
        );
    }

    #[test]
    fn forecast_file_needs_two_columns() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(&dir, "bad.csv", "10.5\n11.0\n");
        assert!(matches!(
            read_forecast_csv(&path, "gp"),
            Err(ForecastError::ShapeMismatch { .. })
        ));
    }
}
