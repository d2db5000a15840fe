//! Sampling frequency of a regular time index.

use crate::error::{ForecastError, Result};
use chrono::{DateTime, Datelike, Duration, Timelike, Utc, Weekday};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Base unit of a [`Frequency`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrequencyUnit {
    Minute,
    Hour,
    Day,
    /// Monday to Friday.
    BusinessDay,
    Week,
}

/// An offset-alias frequency such as `"1H"`, `"15min"` or `"1B"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Frequency {
    multiple: u32,
    unit: FrequencyUnit,
}

impl Frequency {
    pub fn new(multiple: u32, unit: FrequencyUnit) -> Result<Self> {
        if multiple == 0 {
            return Err(ForecastError::InvalidParameter(
                "frequency multiple must be positive".to_string(),
            ));
        }
        Ok(Self { multiple, unit })
    }

    pub fn hourly() -> Self {
        Self {
            multiple: 1,
            unit: FrequencyUnit::Hour,
        }
    }

    pub fn business_daily() -> Self {
        Self {
            multiple: 1,
            unit: FrequencyUnit::BusinessDay,
        }
    }

    pub fn multiple(&self) -> u32 {
        self.multiple
    }

    pub fn unit(&self) -> FrequencyUnit {
        self.unit
    }

    /// Roll a timestamp forward onto the first valid point of this frequency.
    ///
    /// Only business days have invalid points (weekends).
    pub fn align(&self, ts: DateTime<Utc>) -> DateTime<Utc> {
        match self.unit {
            FrequencyUnit::BusinessDay => {
                let mut ts = ts;
                while is_weekend(&ts) {
                    ts += Duration::days(1);
                }
                ts
            }
            _ => ts,
        }
    }

    /// Advance `ts` by `periods` steps of this frequency.
    pub fn advance(&self, ts: DateTime<Utc>, periods: usize) -> DateTime<Utc> {
        let steps = periods as i64 * self.multiple as i64;
        match self.unit {
            FrequencyUnit::Minute => ts + Duration::minutes(steps),
            FrequencyUnit::Hour => ts + Duration::hours(steps),
            FrequencyUnit::Day => ts + Duration::days(steps),
            FrequencyUnit::Week => ts + Duration::weeks(steps),
            FrequencyUnit::BusinessDay => {
                // five business days from a weekday is exactly one week
                let mut ts = self.align(ts) + Duration::weeks(steps / 5);
                for _ in 0..steps % 5 {
                    ts += Duration::days(1);
                    while is_weekend(&ts) {
                        ts += Duration::days(1);
                    }
                }
                ts
            }
        }
    }

    /// `periods` consecutive timestamps starting at `start`.
    pub fn periods(&self, start: DateTime<Utc>, periods: usize) -> Vec<DateTime<Utc>> {
        let mut out = Vec::with_capacity(periods);
        let mut ts = self.align(start);
        for _ in 0..periods {
            out.push(ts);
            ts = self.advance(ts, 1);
        }
        out
    }

    /// Half-open range `[start, end)` at this frequency.
    pub fn date_range(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Vec<DateTime<Utc>> {
        let mut out = Vec::new();
        let mut ts = self.align(start);
        while ts < end {
            out.push(ts);
            ts = self.advance(ts, 1);
        }
        out
    }

    /// Whether every consecutive pair of timestamps is exactly one step apart.
    pub fn is_contiguous(&self, timestamps: &[DateTime<Utc>]) -> bool {
        timestamps
            .windows(2)
            .all(|w| self.advance(w[0], 1) == w[1])
    }

    /// Calendar features of `ts`, each scaled to `[-0.5, 0.5]`.
    pub fn time_features(&self, ts: &DateTime<Utc>) -> Vec<f64> {
        let minute = ts.minute() as f64 / 59.0 - 0.5;
        let hour = ts.hour() as f64 / 23.0 - 0.5;
        let weekday = ts.weekday().num_days_from_monday() as f64 / 6.0 - 0.5;
        let day_of_month = (ts.day() as f64 - 1.0) / 30.0 - 0.5;
        let day_of_year = (ts.ordinal() as f64 - 1.0) / 365.0 - 0.5;
        let week_of_year = (ts.iso_week().week() as f64 - 1.0) / 52.0 - 0.5;

        match self.unit {
            FrequencyUnit::Minute => vec![minute, hour, weekday],
            FrequencyUnit::Hour => vec![hour, weekday],
            FrequencyUnit::Day | FrequencyUnit::BusinessDay => {
                vec![weekday, day_of_month, day_of_year]
            }
            FrequencyUnit::Week => vec![day_of_month, week_of_year],
        }
    }

    /// Number of calendar features produced by [`Frequency::time_features`].
    pub fn num_time_features(&self) -> usize {
        match self.unit {
            FrequencyUnit::Minute => 3,
            FrequencyUnit::Hour => 2,
            FrequencyUnit::Day | FrequencyUnit::BusinessDay => 3,
            FrequencyUnit::Week => 2,
        }
    }

    /// Lags fed to autoregressive models: the last few steps plus one season.
    pub fn lags(&self) -> Vec<usize> {
        let m = self.multiple as usize;
        let season = match self.unit {
            FrequencyUnit::Minute => 60 / m,
            FrequencyUnit::Hour => 24 / m,
            FrequencyUnit::Day => 7 / m,
            FrequencyUnit::BusinessDay => 5 / m,
            FrequencyUnit::Week => 52 / m,
        };
        let mut lags = vec![1, 2, 3];
        if season > 3 {
            lags.push(season);
        }
        lags
    }
}

fn is_weekend(ts: &DateTime<Utc>) -> bool {
    matches!(ts.weekday(), Weekday::Sat | Weekday::Sun)
}

impl FromStr for Frequency {
    type Err = ForecastError;

    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        let split = trimmed
            .find(|c: char| !c.is_ascii_digit())
            .ok_or_else(|| ForecastError::FrequencyParse(s.to_string()))?;
        let (digits, unit) = trimmed.split_at(split);
        let multiple = if digits.is_empty() {
            1
        } else {
            digits
                .parse::<u32>()
                .map_err(|_| ForecastError::FrequencyParse(s.to_string()))?
        };
        let unit = match unit {
            "min" | "T" => FrequencyUnit::Minute,
            "H" | "h" => FrequencyUnit::Hour,
            "D" | "d" => FrequencyUnit::Day,
            "B" => FrequencyUnit::BusinessDay,
            "W" | "w" => FrequencyUnit::Week,
            _ => return Err(ForecastError::FrequencyParse(s.to_string())),
        };
        Frequency::new(multiple, unit).map_err(|_| ForecastError::FrequencyParse(s.to_string()))
    }
}

impl TryFrom<String> for Frequency {
    type Error = ForecastError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<Frequency> for String {
    fn from(freq: Frequency) -> Self {
        freq.to_string()
    }
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let unit = match self.unit {
            FrequencyUnit::Minute => "min",
            FrequencyUnit::Hour => "H",
            FrequencyUnit::Day => "D",
            FrequencyUnit::BusinessDay => "B",
            FrequencyUnit::Week => "W",
        };
        write!(f, "{}{}", self.multiple, unit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn parses_offset_aliases() {
        assert_eq!("1H".parse::<Frequency>().unwrap(), Frequency::hourly());
        assert_eq!("H".parse::<Frequency>().unwrap(), Frequency::hourly());
        assert_eq!("1B".parse::<Frequency>().unwrap(), Frequency::business_daily());

        let freq: Frequency = "15min".parse().unwrap();
        assert_eq!(freq.multiple(), 15);
        assert_eq!(freq.unit(), FrequencyUnit::Minute);
        assert_eq!(freq.to_string(), "15min");

        assert!("".parse::<Frequency>().is_err());
        assert!("12".parse::<Frequency>().is_err());
        assert!("0H".parse::<Frequency>().is_err());
        assert!("1Q".parse::<Frequency>().is_err());
    }

    #[test]
    fn hourly_range_is_half_open() {
        let start = Utc.with_ymd_and_hms(2018, 1, 10, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2018, 1, 27, 0, 0, 0).unwrap();
        let range = Frequency::hourly().date_range(start, end);

        assert_eq!(range.len(), 17 * 24);
        assert_eq!(range[0], start);
        assert_eq!(
            *range.last().unwrap(),
            Utc.with_ymd_and_hms(2018, 1, 26, 23, 0, 0).unwrap()
        );
    }

    #[test]
    fn business_days_skip_weekends() {
        let freq = Frequency::business_daily();
        // 1990-01-05 is a Friday
        let friday = Utc.with_ymd_and_hms(1990, 1, 5, 0, 0, 0).unwrap();
        let monday = Utc.with_ymd_and_hms(1990, 1, 8, 0, 0, 0).unwrap();
        assert_eq!(freq.advance(friday, 1), monday);

        let saturday = Utc.with_ymd_and_hms(1990, 1, 6, 0, 0, 0).unwrap();
        assert_eq!(freq.align(saturday), monday);

        let week = freq.periods(monday, 6);
        assert_eq!(week[5], Utc.with_ymd_and_hms(1990, 1, 15, 0, 0, 0).unwrap());
        assert!(freq.is_contiguous(&week));
    }

    #[test]
    fn contiguity_detects_gaps() {
        let freq = Frequency::hourly();
        let start = Utc.with_ymd_and_hms(2018, 1, 10, 0, 0, 0).unwrap();
        let mut ts = freq.periods(start, 5);
        assert!(freq.is_contiguous(&ts));
        ts.remove(2);
        assert!(!freq.is_contiguous(&ts));
    }

    #[test]
    fn time_features_are_bounded() {
        let ts = Utc.with_ymd_and_hms(2018, 12, 31, 23, 59, 0).unwrap();
        for freq in ["1min", "1H", "1D", "1B", "1W"] {
            let freq: Frequency = freq.parse().unwrap();
            let features = freq.time_features(&ts);
            assert_eq!(features.len(), freq.num_time_features());
            assert!(features.iter().all(|f| (-0.5..=0.5).contains(f)));
        }
    }

    #[test]
    fn lags_include_one_season() {
        assert_eq!(Frequency::hourly().lags(), vec![1, 2, 3, 24]);
        assert_eq!(Frequency::business_daily().lags(), vec![1, 2, 3, 5]);
        let six_hourly: Frequency = "6H".parse().unwrap();
        assert_eq!(six_hourly.lags(), vec![1, 2, 3, 4]);
    }

    #[test]
    fn serde_uses_string_form() {
        let json = serde_json::to_string(&Frequency::business_daily()).unwrap();
        assert_eq!(json, "\"1B\"");
        let back: Frequency = serde_json::from_str("\"1H\"").unwrap();
        assert_eq!(back, Frequency::hourly());
    }
}
