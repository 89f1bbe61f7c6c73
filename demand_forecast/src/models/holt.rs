//! Holt's linear trend model

use crate::data::TimeSeriesData;
use crate::error::{ForecastError, Result};
use crate::models::{
    check_timeline, interval_z, ForecastFrame, ForecastModel, TrainedForecastModel,
};
use crate::utils::{future_timestamps, infer_frequency};
use chrono::{Duration, NaiveDateTime};
use forecast_math::stats::sample_std_dev;
use forecast_math::DoubleExponentialSmoothing;
use serde::{Deserialize, Serialize};

/// Holt's double exponential smoothing model
#[derive(Debug, Clone)]
pub struct HoltModel {
    /// Name of the model
    name: String,
    /// Level smoothing parameter (0 < alpha < 1)
    alpha: f64,
    /// Trend smoothing parameter (0 < beta < 1)
    beta: f64,
    interval_width: f64,
}

/// Trained Holt model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainedHolt {
    name: String,
    alpha: f64,
    beta: f64,
    history: Vec<NaiveDateTime>,
    frequency_ms: i64,
    /// One-step-ahead fitted values over the history
    fitted: Vec<f64>,
    /// Final smoothed level
    level: f64,
    /// Final smoothed trend per step
    trend: f64,
    residual_std: f64,
    interval_width: f64,
    z: f64,
}

impl HoltModel {
    /// Create a new Holt model
    pub fn new(alpha: f64, beta: f64, interval_width: f64) -> Result<Self> {
        // Validates alpha and beta.
        DoubleExponentialSmoothing::new(alpha, beta)?;
        interval_z(interval_width)?;

        Ok(Self {
            name: format!("Holt (alpha={}, beta={})", alpha, beta),
            alpha,
            beta,
            interval_width,
        })
    }
}

impl ForecastModel for HoltModel {
    type Trained = TrainedHolt;

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

        let mut smoother = DoubleExponentialSmoothing::new(self.alpha, self.beta)?;
        let fitted = smoother.fit(&values)?;

        // The first fitted value is the observation itself.
        let residuals: Vec<f64> = values
            .iter()
            .zip(&fitted)
            .skip(1)
            .map(|(actual, prediction)| actual - prediction)
            .collect();

        Ok(TrainedHolt {
            name: self.name.clone(),
            alpha: self.alpha,
            beta: self.beta,
            history,
            frequency_ms: frequency.num_milliseconds(),
            fitted,
            level: smoother.level()?,
            trend: smoother.trend()?,
            residual_std: sample_std_dev(&residuals)?,
            interval_width: self.interval_width,
            z: interval_z(self.interval_width)?,
        })
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl TrainedHolt {
    pub fn frequency(&self) -> Duration {
        Duration::milliseconds(self.frequency_ms)
    }

    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    pub fn beta(&self) -> f64 {
        self.beta
    }

    pub fn level(&self) -> f64 {
        self.level
    }

    pub fn trend(&self) -> f64 {
        self.trend
    }

    pub fn fitted(&self) -> &[f64] {
        &self.fitted
    }

    pub fn residual_std(&self) -> f64 {
        self.residual_std
    }

    fn last_observed(&self) -> Result<NaiveDateTime> {
        self.history.last().copied().ok_or_else(|| {
            ForecastError::InternalError("Model has an empty training history".to_string())
        })
    }

    /// Fitted value at or immediately before `ts`
    fn in_sample(&self, ts: &NaiveDateTime) -> f64 {
        let idx = self.history.partition_point(|h| h <= ts);
        if idx == 0 {
            self.fitted.first().copied().unwrap_or(self.level)
        } else {
            self.fitted.get(idx - 1).copied().unwrap_or(self.level)
        }
    }
}

impl TrainedForecastModel for TrainedHolt {
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
        let base_margin = self.z * self.residual_std;

        let mut trend = Vec::with_capacity(timeline.len());
        let mut yhat = Vec::with_capacity(timeline.len());
        let mut lower = Vec::with_capacity(timeline.len());
        let mut upper = Vec::with_capacity(timeline.len());

        for ts in timeline {
            let (point, margin) = if *ts > last {
                let h = (*ts - last).num_milliseconds() as f64 / self.frequency_ms as f64;
                (self.level + h * self.trend, base_margin * h.max(1.0).sqrt())
            } else {
                (self.in_sample(ts), base_margin)
            };

            trend.push(point);
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
