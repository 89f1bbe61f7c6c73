//! Forecasting models for demand time series
//!
//! A [`ForecastModel`] is an untrained configuration. Training it produces a
//! [`TrainedForecastModel`], which can extend its own timeline into the
//! future and forecast over any timeline. [`TrainedModel`] is the
//! serializable form stored as a run artifact.

use crate::data::TimeSeriesData;
use crate::error::{ForecastError, Result};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF, Normal};
use std::fmt::{self, Debug};
use std::str::FromStr;

pub mod additive;
pub mod holt;

pub use additive::{AdditiveModel, TrainedAdditive};
pub use holt::{HoltModel, TrainedHolt};

/// Default coverage of the uncertainty band
pub const DEFAULT_INTERVAL_WIDTH: f64 = 0.8;

/// One forecast row as returned to clients
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ForecastRow {
    pub ds: NaiveDateTime,
    pub yhat: f64,
    pub yhat_lower: f64,
    pub yhat_upper: f64,
}

/// Full model output over a timeline, one entry per timestamp
#[derive(Debug, Clone, PartialEq)]
pub struct ForecastFrame {
    ds: Vec<NaiveDateTime>,
    trend: Vec<f64>,
    yhat: Vec<f64>,
    yhat_lower: Vec<f64>,
    yhat_upper: Vec<f64>,
}

impl ForecastFrame {
    /// Create a new frame; all columns must have the same length
    pub fn new(
        ds: Vec<NaiveDateTime>,
        trend: Vec<f64>,
        yhat: Vec<f64>,
        yhat_lower: Vec<f64>,
        yhat_upper: Vec<f64>,
    ) -> Result<Self> {
        let n = ds.len();
        if [trend.len(), yhat.len(), yhat_lower.len(), yhat_upper.len()]
            .iter()
            .any(|&len| len != n)
        {
            return Err(ForecastError::InternalError(format!(
                "Forecast columns have mismatched lengths for {} timestamps",
                n
            )));
        }

        Ok(Self {
            ds,
            trend,
            yhat,
            yhat_lower,
            yhat_upper,
        })
    }

    pub fn len(&self) -> usize {
        self.ds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ds.is_empty()
    }

    pub fn timestamps(&self) -> &[NaiveDateTime] {
        &self.ds
    }

    /// Trend component without seasonality
    pub fn trend(&self) -> &[f64] {
        &self.trend
    }

    /// Point forecasts
    pub fn yhat(&self) -> &[f64] {
        &self.yhat
    }

    /// The last `n` rows (all rows if there are fewer)
    pub fn tail(&self, n: usize) -> Self {
        let start = self.len().saturating_sub(n);
        Self {
            ds: self.ds[start..].to_vec(),
            trend: self.trend[start..].to_vec(),
            yhat: self.yhat[start..].to_vec(),
            yhat_lower: self.yhat_lower[start..].to_vec(),
            yhat_upper: self.yhat_upper[start..].to_vec(),
        }
    }

    /// Project to the four client-facing fields
    pub fn rows(&self) -> Vec<ForecastRow> {
        (0..self.len())
            .map(|i| ForecastRow {
                ds: self.ds[i],
                yhat: self.yhat[i],
                yhat_lower: self.yhat_lower[i],
                yhat_upper: self.yhat_upper[i],
            })
            .collect()
    }
}

/// Trained forecast model
pub trait TrainedForecastModel: Debug + Send + Sync {
    /// Training history followed by `periods` future timestamps
    fn make_future_timeline(&self, periods: usize) -> Result<Vec<NaiveDateTime>>;

    /// Forecast every timestamp of the timeline
    fn predict(&self, timeline: &[NaiveDateTime]) -> Result<ForecastFrame>;

    /// Name of the model
    fn name(&self) -> &str;
}

/// Forecast model that can be trained on time series data
pub trait ForecastModel: Debug + Clone {
    /// The type of trained model produced
    type Trained: TrainedForecastModel;

    /// Train the model on time series data
    fn train(&self, data: &TimeSeriesData) -> Result<Self::Trained>;

    /// Get the name of the model
    fn name(&self) -> &str;
}

/// Model families the training program can fit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    /// Linear trend plus weekly seasonality
    Additive,
    /// Holt's double exponential smoothing
    Holt,
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelKind::Additive => write!(f, "additive"),
            ModelKind::Holt => write!(f, "holt"),
        }
    }
}

impl FromStr for ModelKind {
    type Err = ForecastError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "additive" => Ok(ModelKind::Additive),
            "holt" => Ok(ModelKind::Holt),
            other => Err(ForecastError::InvalidParameter(format!(
                "Unknown model kind '{}'",
                other
            ))),
        }
    }
}

impl ModelKind {
    /// Train a model of this kind with default smoothing parameters
    pub fn train(&self, data: &TimeSeriesData, interval_width: f64) -> Result<TrainedModel> {
        let trained: TrainedModel = match self {
            ModelKind::Additive => AdditiveModel::new(interval_width)?.train(data)?.into(),
            ModelKind::Holt => HoltModel::new(0.5, 0.3, interval_width)?.train(data)?.into(),
        };
        Ok(trained)
    }
}

/// Serializable artifact form of any trained model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TrainedModel {
    Additive(TrainedAdditive),
    Holt(TrainedHolt),
}

impl TrainedModel {
    pub fn kind(&self) -> ModelKind {
        match self {
            TrainedModel::Additive(_) => ModelKind::Additive,
            TrainedModel::Holt(_) => ModelKind::Holt,
        }
    }

    /// Fitted quantities worth recording next to the run's settings
    pub fn fitted_params(&self) -> Vec<(&'static str, String)> {
        match self {
            TrainedModel::Additive(m) => vec![
                ("trend_r_squared", m.trend().r_squared().to_string()),
                ("weekly_seasonality", m.weekly().is_some().to_string()),
            ],
            TrainedModel::Holt(m) => vec![
                ("alpha", m.alpha().to_string()),
                ("beta", m.beta().to_string()),
            ],
        }
    }

    fn inner(&self) -> &dyn TrainedForecastModel {
        match self {
            TrainedModel::Additive(m) => m,
            TrainedModel::Holt(m) => m,
        }
    }
}

impl TrainedForecastModel for TrainedModel {
    fn make_future_timeline(&self, periods: usize) -> Result<Vec<NaiveDateTime>> {
        self.inner().make_future_timeline(periods)
    }

    fn predict(&self, timeline: &[NaiveDateTime]) -> Result<ForecastFrame> {
        self.inner().predict(timeline)
    }

    fn name(&self) -> &str {
        self.inner().name()
    }
}

impl From<TrainedAdditive> for TrainedModel {
    fn from(model: TrainedAdditive) -> Self {
        TrainedModel::Additive(model)
    }
}

impl From<TrainedHolt> for TrainedModel {
    fn from(model: TrainedHolt) -> Self {
        TrainedModel::Holt(model)
    }
}

/// Validate an interval width and return the matching two-sided normal quantile
pub(crate) fn interval_z(interval_width: f64) -> Result<f64> {
    if !(interval_width > 0.0 && interval_width < 1.0) {
        return Err(ForecastError::InvalidParameter(format!(
            "Interval width must be between 0 and 1, got {}",
            interval_width
        )));
    }
    let normal = Normal::new(0.0, 1.0)
        .map_err(|e| ForecastError::InternalError(e.to_string()))?;
    Ok(normal.inverse_cdf(0.5 + interval_width / 2.0))
}

/// Ensure a timeline can be forecast
pub(crate) fn check_timeline(timeline: &[NaiveDateTime]) -> Result<()> {
    if timeline.windows(2).any(|w| w[1] < w[0]) {
        return Err(ForecastError::InvalidParameter(
            "Timeline must be sorted in ascending order".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::parse_timestamp;
    use approx::assert_relative_eq;

    fn frame(n: usize) -> ForecastFrame {
        let ds = (1..=n)
            .map(|d| parse_timestamp(&format!("2023-01-{:02}", d)).unwrap())
            .collect();
        let values: Vec<f64> = (0..n).map(|i| i as f64).collect();
        ForecastFrame::new(
            ds,
            values.clone(),
            values.clone(),
            values.iter().map(|v| v - 1.0).collect(),
            values.iter().map(|v| v + 1.0).collect(),
        )
        .unwrap()
    }

    #[test]
    fn test_tail_keeps_last_rows() {
        let f = frame(5);
        let tail = f.tail(2);
        assert_eq!(tail.len(), 2);
        assert_eq!(tail.yhat(), &[3.0, 4.0]);
        assert_eq!(f.tail(0).len(), 0);
        assert_eq!(f.tail(10).len(), 5);
    }

    #[test]
    fn test_rows_projection() {
        let rows = frame(2).rows();
        assert_eq!(rows[1].yhat, 1.0);
        assert_eq!(rows[1].yhat_lower, 0.0);
        assert_eq!(rows[1].yhat_upper, 2.0);
    }

    #[test]
    fn test_mismatched_columns() {
        let ds = vec![parse_timestamp("2023-01-01").unwrap()];
        assert!(ForecastFrame::new(ds, vec![], vec![1.0], vec![1.0], vec![1.0]).is_err());
    }

    #[test]
    fn test_interval_z() {
        assert_relative_eq!(interval_z(0.95).unwrap(), 1.959964, epsilon = 1e-5);
        assert_relative_eq!(interval_z(0.8).unwrap(), 1.281552, epsilon = 1e-5);
        assert!(interval_z(1.0).is_err());
        assert!(interval_z(0.0).is_err());
    }

    #[test]
    fn test_model_kind_parsing() {
        assert_eq!("Holt".parse::<ModelKind>().unwrap(), ModelKind::Holt);
        assert_eq!(ModelKind::Additive.to_string(), "additive");
        assert!("prophet".parse::<ModelKind>().is_err());
    }

    #[test]
    fn test_row_serializes_with_iso_timestamp() {
        let row = frame(1).rows()[0];
        let json = serde_json::to_value(row).unwrap();
        assert_eq!(json["ds"], "2023-01-01T00:00:00");
        assert_eq!(json["yhat"], 0.0);
    }
}
