//! Tabular data handling and preparation for forecasting
//!
//! Raw CSV input is decoded into a polars [`DataFrame`] whose columns are
//! kept as text. [`prepare_data`] then turns such a frame into the fixed
//! [`TimeSeriesData`] schema the models consume: a `ds` datetime column and
//! a `y` float column.

use crate::error::{ForecastError, Result};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Name of the timestamp column after preparation
pub const DATE_COLUMN: &str = "ds";
/// Name of the target column after preparation
pub const TARGET_COLUMN: &str = "y";

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M:%S",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d"];

/// Which input columns hold the dates and the target values.
///
/// Set once from configuration and validated on construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnMapping {
    date_column: String,
    target_column: String,
}

impl ColumnMapping {
    /// Create a validated mapping
    pub fn new(date_column: impl Into<String>, target_column: impl Into<String>) -> Result<Self> {
        let date_column = date_column.into().trim().to_string();
        let target_column = target_column.into().trim().to_string();

        if date_column.is_empty() || target_column.is_empty() {
            return Err(ForecastError::ConfigurationError(
                "Date and target column names must not be empty".to_string(),
            ));
        }
        if date_column == target_column {
            return Err(ForecastError::ConfigurationError(format!(
                "Date and target columns must differ, both are '{}'",
                date_column
            )));
        }

        Ok(Self {
            date_column,
            target_column,
        })
    }

    /// Mapping for data that already uses the internal names
    pub fn identity() -> Self {
        Self {
            date_column: DATE_COLUMN.to_string(),
            target_column: TARGET_COLUMN.to_string(),
        }
    }

    pub fn date_column(&self) -> &str {
        &self.date_column
    }

    pub fn target_column(&self) -> &str {
        &self.target_column
    }
}

impl Default for ColumnMapping {
    fn default() -> Self {
        Self {
            date_column: "date".to_string(),
            target_column: "sales".to_string(),
        }
    }
}

/// Data loader for raw tabular data
#[derive(Debug)]
pub struct DataLoader;

impl DataLoader {
    /// Load a CSV file into a text-typed DataFrame
    pub fn from_csv<P: AsRef<Path>>(path: P) -> Result<DataFrame> {
        let file = File::open(path)?;
        Self::from_reader(file)
    }

    /// Decode raw CSV bytes, e.g. an uploaded file
    pub fn from_bytes(bytes: &[u8]) -> Result<DataFrame> {
        Self::from_reader(bytes)
    }

    /// Decode CSV with a header row from any reader.
    ///
    /// A header-only input yields a frame with zero rows.
    pub fn from_reader<R: Read>(reader: R) -> Result<DataFrame> {
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let headers: Vec<String> = rdr.headers()?.iter().map(str::to_string).collect();
        if headers.is_empty() || headers.iter().all(String::is_empty) {
            return Err(ForecastError::ParseError(
                "CSV input has no header row".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for name in &headers {
            if !seen.insert(name.as_str()) {
                return Err(ForecastError::ParseError(format!(
                    "Duplicate column '{}' in CSV header",
                    name
                )));
            }
        }

        let mut columns: Vec<Vec<String>> = vec![Vec::new(); headers.len()];
        for record in rdr.records() {
            let record = record?;
            for (column, field) in columns.iter_mut().zip(record.iter()) {
                column.push(field.to_string());
            }
        }

        let series: Vec<Series> = headers
            .iter()
            .zip(columns)
            .map(|(name, values)| Series::new(name, values))
            .collect();

        Ok(DataFrame::new(series)?)
    }
}

/// Normalize a raw frame into the fixed `ds`/`y` schema.
///
/// The date column must parse as timestamps. Target cells may be empty (the
/// upload for a forecast request usually has no actuals yet) but must be
/// numeric when present. Only `ds` and `y` survive; other columns are dropped.
pub fn prepare_data(df: &DataFrame, mapping: &ColumnMapping) -> Result<TimeSeriesData> {
    let date = df.column(mapping.date_column()).map_err(|_| {
        ForecastError::ParseError(format!(
            "Missing date column '{}'",
            mapping.date_column()
        ))
    })?;
    let target = df.column(mapping.target_column()).map_err(|_| {
        ForecastError::ParseError(format!(
            "Missing target column '{}'",
            mapping.target_column()
        ))
    })?;

    let timestamps = parse_timestamp_column(date)?;
    let values = parse_target_column(target)?;

    TimeSeriesData::new(timestamps, values)
}

/// Parse one timestamp in any of the accepted layouts
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();

    for format in DATETIME_FORMATS {
        if let Ok(ts) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(ts);
        }
    }
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.naive_utc());
    }
    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(raw, format) {
            return date.and_hms_opt(0, 0, 0);
        }
    }

    None
}

fn parse_timestamp_column(series: &Series) -> Result<Vec<NaiveDateTime>> {
    match series.dtype() {
        DataType::Utf8 => series
            .utf8()?
            .into_iter()
            .enumerate()
            .map(|(row, value)| {
                let raw = value.ok_or_else(|| {
                    ForecastError::ParseError(format!(
                        "Missing date in column '{}' at row {}",
                        series.name(),
                        row + 1
                    ))
                })?;
                parse_timestamp(raw).ok_or_else(|| {
                    ForecastError::ParseError(format!(
                        "Unparseable date '{}' in column '{}' at row {}",
                        raw,
                        series.name(),
                        row + 1
                    ))
                })
            })
            .collect(),
        DataType::Datetime(_, _) | DataType::Date => {
            let millis = series
                .cast(&DataType::Datetime(TimeUnit::Milliseconds, None))?
                .cast(&DataType::Int64)?;
            millis
                .i64()?
                .into_iter()
                .enumerate()
                .map(|(row, value)| {
                    value.and_then(millis_to_datetime).ok_or_else(|| {
                        ForecastError::ParseError(format!(
                            "Missing date in column '{}' at row {}",
                            series.name(),
                            row + 1
                        ))
                    })
                })
                .collect()
        }
        other => Err(ForecastError::ParseError(format!(
            "Column '{}' of type {} cannot hold dates",
            series.name(),
            other
        ))),
    }
}

fn parse_target_column(series: &Series) -> Result<Vec<Option<f64>>> {
    match series.dtype() {
        DataType::Utf8 => series
            .utf8()?
            .into_iter()
            .enumerate()
            .map(|(row, value)| match value.map(str::trim) {
                None | Some("") => Ok(None),
                Some(raw) => match raw.parse::<f64>() {
                    Ok(v) if v.is_finite() => Ok(Some(v)),
                    _ => Err(ForecastError::ParseError(format!(
                        "Non-numeric value '{}' in column '{}' at row {}",
                        raw,
                        series.name(),
                        row + 1
                    ))),
                },
            })
            .collect(),
        dtype if dtype.is_numeric() => {
            let floats = series.cast(&DataType::Float64)?;
            let values = floats.f64()?.into_iter().collect();
            Ok(values)
        }
        other => Err(ForecastError::ParseError(format!(
            "Column '{}' of type {} is not numeric",
            series.name(),
            other
        ))),
    }
}

fn millis_to_datetime(millis: i64) -> Option<NaiveDateTime> {
    DateTime::<Utc>::from_timestamp_millis(millis).map(|dt| dt.naive_utc())
}

fn datetime_to_millis(ts: &NaiveDateTime) -> i64 {
    ts.and_utc().timestamp_millis()
}

/// Time series in the fixed model schema: `ds` (datetime) and `y` (f64)
#[derive(Debug, Clone)]
pub struct TimeSeriesData {
    /// Data frame containing exactly the `ds` and `y` columns
    df: DataFrame,
}

impl TimeSeriesData {
    /// Create a series from timestamps and possibly-missing target values
    pub fn new(timestamps: Vec<NaiveDateTime>, values: Vec<Option<f64>>) -> Result<Self> {
        if timestamps.len() != values.len() {
            return Err(ForecastError::DataError(format!(
                "Timestamps length ({}) doesn't match values length ({})",
                timestamps.len(),
                values.len()
            )));
        }

        let millis: Vec<i64> = timestamps.iter().map(datetime_to_millis).collect();
        let date_series = Series::new(DATE_COLUMN, millis)
            .cast(&DataType::Datetime(TimeUnit::Milliseconds, None))?;
        let value_series = Series::new(TARGET_COLUMN, values);

        let df = DataFrame::new(vec![date_series, value_series])?;
        Ok(Self { df })
    }

    /// Create a series where every target value is observed
    pub fn from_observations(timestamps: Vec<NaiveDateTime>, values: Vec<f64>) -> Result<Self> {
        Self::new(timestamps, values.into_iter().map(Some).collect())
    }

    /// Get the DataFrame
    pub fn dataframe(&self) -> &DataFrame {
        &self.df
    }

    /// Get the timestamps as a vector
    pub fn timestamps(&self) -> Result<Vec<NaiveDateTime>> {
        parse_timestamp_column(self.df.column(DATE_COLUMN)?)
    }

    /// Target values, `None` where the cell was empty
    pub fn targets(&self) -> Result<Vec<Option<f64>>> {
        Ok(self.df.column(TARGET_COLUMN)?.f64()?.into_iter().collect())
    }

    /// Target values, failing if any are missing
    pub fn values(&self) -> Result<Vec<f64>> {
        self.targets()?
            .into_iter()
            .enumerate()
            .map(|(row, value)| {
                value.ok_or_else(|| {
                    ForecastError::DataError(format!(
                        "Missing target value at row {}",
                        row + 1
                    ))
                })
            })
            .collect()
    }

    /// Get a slice of the data from start to end index
    pub fn slice(&self, start: usize, end: Option<usize>) -> Result<Self> {
        let end = end.unwrap_or(self.df.height()).min(self.df.height());
        if start > end {
            return Err(ForecastError::DataError(format!(
                "Slice start ({}) is past its end ({})",
                start, end
            )));
        }

        Ok(Self {
            df: self.df.slice(start as i64, end - start),
        })
    }

    /// Chronological split: the first `train_ratio` share of rows and the rest
    pub fn split(&self, train_ratio: f64) -> Result<(Self, Self)> {
        if train_ratio <= 0.0 || train_ratio >= 1.0 {
            return Err(ForecastError::InvalidParameter(format!(
                "Train ratio must be between 0 and 1, got {}",
                train_ratio
            )));
        }

        let train_size = (self.len() as f64 * train_ratio) as usize;
        Ok((self.slice(0, Some(train_size))?, self.slice(train_size, None)?))
    }

    /// Check if the time series is empty
    pub fn is_empty(&self) -> bool {
        self.df.height() == 0
    }

    /// Get the length of the time series
    pub fn len(&self) -> usize {
        self.df.height()
    }
}

impl PartialEq for TimeSeriesData {
    fn eq(&self, other: &Self) -> bool {
        self.df.frame_equal_missing(&other.df)
    }
}
