//! Additive trend + weekly seasonality model
//!
//! `y(t) = trend(t) + weekly(t) + noise`, where the trend is a least-squares
//! line over fractional days and the weekly term is the mean de-trended
//! residual for each weekday. The uncertainty band is Gaussian around the
//! point forecast and widens with the distance past the last observation.

use crate::data::TimeSeriesData;
use crate::error::{ForecastError, Result};
use crate::models::{
    check_timeline, interval_z, ForecastFrame, ForecastModel, TrainedForecastModel,
    DEFAULT_INTERVAL_WIDTH,
};
use crate::utils::{days_between, future_timestamps, infer_frequency};
use chrono::{Datelike, Duration, NaiveDateTime};
use forecast_math::stats::sample_std_dev;
use forecast_math::LinearRegression;
use serde::{Deserialize, Serialize};

/// Additive trend/seasonality model configuration
#[derive(Debug, Clone)]
pub struct AdditiveModel {
    /// Name of the model
    name: String,
    /// Coverage of the uncertainty band
    interval_width: f64,
    /// Whether to fit a day-of-week component
    weekly_seasonality: bool,
}

/// Trained additive model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainedAdditive {
    name: String,
    /// Training timestamps, ascending
    history: Vec<NaiveDateTime>,
    /// Inferred sampling step in milliseconds
    frequency_ms: i64,
    trend: LinearRegression,
    /// Offset per weekday, Monday first
    weekly: Option<[f64; 7]>,
    residual_std: f64,
    interval_width: f64,
    z: f64,
}

impl AdditiveModel {
    /// Create a new additive model with the given interval width
    pub fn new(interval_width: f64) -> Result<Self> {
        interval_z(interval_width)?;

        Ok(Self {
            name: format!("Additive Trend (interval_width={})", interval_width),
            interval_width,
            weekly_seasonality: true,
        })
    }

    /// Enable or disable the weekly component
    pub fn with_weekly_seasonality(mut self, enabled: bool) -> Self {
        self.weekly_seasonality = enabled;
        self
    }
}

impl Default for AdditiveModel {
    fn default() -> Self {
        Self {
            name: format!("Additive Trend (interval_width={})", DEFAULT_INTERVAL_WIDTH),
            interval_width: DEFAULT_INTERVAL_WIDTH,
            weekly_seasonality: true,
        }
    }
}

impl ForecastModel for AdditiveModel {
    type Trained = TrainedAdditive;

    fn train(&self, data: &TimeSeriesData) -> Result<Self::Trained> {
        let mut observations: Vec<(NaiveDateTime, f64)> = data
            .timestamps()?
            .into_iter()
            .zip(data.values()?)
            .collect();
        if observations.len() < 2 {
            return Err(ForecastError::DataError(format!(
                "Need at least 2 observations to train, got {}",
                observations.len()
            )));
        }
        observations.sort_by_key(|(ts, _)| *ts);

        let history: Vec<NaiveDateTime> = observations.iter().map(|(ts, _)| *ts).collect();
        let values: Vec<f64> = observations.iter().map(|(_, v)| *v).collect();
        let frequency = infer_frequency(&history)?;

        let origin = history[0];
        let xs: Vec<f64> = history.iter().map(|ts| days_between(origin, *ts)).collect();
        let trend = LinearRegression::fit(&xs, &values)?;

        let mut residuals: Vec<f64> = xs
            .iter()
            .zip(&values)
            .map(|(&x, &y)| y - trend.predict(x))
            .collect();

        let span = history[history.len() - 1] - origin;
        let weekly = if self.weekly_seasonality
            && frequency < Duration::days(7)
            && span >= Duration::days(14)
        {
            let offsets = weekday_offsets(&history, &residuals);
            for (residual, ts) in residuals.iter_mut().zip(&history) {
                *residual -= offsets[weekday_index(ts)];
            }
            Some(offsets)
        } else {
            None
        };

        Ok(TrainedAdditive {
            name: self.name.clone(),
            history,
            frequency_ms: frequency.num_milliseconds(),
            trend,
            weekly,
            residual_std: sample_std_dev(&residuals)?,
            interval_width: self.interval_width,
            z: interval_z(self.interval_width)?,
        })
    }

    fn name(&self) -> &str {
        &self.name
    }
}

fn weekday_index(ts: &NaiveDateTime) -> usize {
    ts.weekday().num_days_from_monday() as usize
}

/// Mean residual per weekday, centred so the offsets sum to zero
fn weekday_offsets(history: &[NaiveDateTime], residuals: &[f64]) -> [f64; 7] {
    let mut sums = [0.0; 7];
    let mut counts = [0usize; 7];
    for (ts, residual) in history.iter().zip(residuals) {
        let day = weekday_index(ts);
        sums[day] += residual;
        counts[day] += 1;
    }

    let mut offsets = [0.0; 7];
    for day in 0..7 {
        if counts[day] > 0 {
            offsets[day] = sums[day] / counts[day] as f64;
        }
    }
    let centre = offsets.iter().sum::<f64>() / 7.0;
    for offset in offsets.iter_mut() {
        *offset -= centre;
    }
    offsets
}

impl TrainedAdditive {
    /// Sampling step inferred from the training history
    pub fn frequency(&self) -> Duration {
        Duration::milliseconds(self.frequency_ms)
    }

    pub fn trend(&self) -> &LinearRegression {
        &self.trend
    }

    pub fn weekly(&self) -> Option<&[f64; 7]> {
        self.weekly.as_ref()
    }

    pub fn residual_std(&self) -> f64 {
        self.residual_std
    }

    pub fn interval_width(&self) -> f64 {
        self.interval_width
    }

    fn last_observed(&self) -> Result<NaiveDateTime> {
        self.history.last().copied().ok_or_else(|| {
            ForecastError::InternalError("Model has an empty training history".to_string())
        })
    }
}

impl TrainedForecastModel for TrainedAdditive {
    fn make_future_timeline(&self, periods: usize) -> Result<Vec<NaiveDateTime>> {
        let mut timeline = self.history.clone();
        timeline.extend(future_timestamps(
            self.last_observed()?,
            periods,
            self.frequency(),
        )?);
        Ok(timeline)
    }

    fn predict(&self, timeline: &[NaiveDateTime]) -> Result<ForecastFrame> {
        check_timeline(timeline)?;
        let last = self.last_observed()?;
        let origin = self.history.first().copied().unwrap_or(last);
        let n = self.history.len() as f64;

        let mut trend = Vec::with_capacity(timeline.len());
        let mut yhat = Vec::with_capacity(timeline.len());
        let mut lower = Vec::with_capacity(timeline.len());
        let mut upper = Vec::with_capacity(timeline.len());

        for ts in timeline {
            let t = self.trend.predict(days_between(origin, *ts));
            let seasonal = self.weekly.map_or(0.0, |w| w[weekday_index(ts)]);
            let point = t + seasonal;

            let steps_ahead = if *ts > last {
                (*ts - last).num_milliseconds() as f64 / self.frequency_ms as f64
            } else {
                0.0
            };
            let margin = self.z * self.residual_std * (1.0 + steps_ahead / n).sqrt();

            trend.push(t);
            yhat.push(point);
            lower.push(point - margin);
            upper.push(point + margin);
        }

        ForecastFrame::new(timeline.to_vec(), trend, yhat, lower, upper)
    }

    fn name(&self) -> &str {
        &self.name
    }
}
