//! Metrics for evaluating forecast performance

use crate::data::TimeSeriesData;
use crate::error::{ForecastError, Result};
use crate::models::{ForecastFrame, TrainedForecastModel};
use forecast_math::forecast_accuracy;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Evaluate forecast accuracy against actual values
pub fn evaluate_forecast(forecast: &[f64], actual: &[f64]) -> Result<ForecastMetrics> {
    if forecast.len() != actual.len() || forecast.is_empty() {
        return Err(ForecastError::DataError(format!(
            "Forecast ({}) and actual ({}) values must have the same non-zero length",
            forecast.len(),
            actual.len()
        )));
    }

    let accuracy = forecast_accuracy(forecast, actual)?;

    // Share of steps where forecast and actual move the same way
    let moves: Vec<bool> = forecast
        .windows(2)
        .zip(actual.windows(2))
        .filter(|(f, a)| (f[1] - f[0]).abs() > 1e-10 && (a[1] - a[0]).abs() > 1e-10)
        .map(|(f, a)| (f[1] > f[0]) == (a[1] > a[0]))
        .collect();
    let direction_accuracy = if moves.is_empty() {
        0.0
    } else {
        moves.iter().filter(|&&same| same).count() as f64 / moves.len() as f64 * 100.0
    };

    Ok(ForecastMetrics {
        mae: accuracy.mae,
        mse: accuracy.mse,
        rmse: accuracy.rmse,
        mape: accuracy.mape,
        smape: accuracy.smape,
        direction_accuracy,
    })
}

/// Hold-out evaluation of a trained model
#[derive(Debug, Clone)]
pub struct Evaluation {
    /// Forecast over the training history plus the test horizon
    pub forecast: ForecastFrame,
    pub metrics: ForecastMetrics,
}

/// Extend the model timeline by the test length and score the tail against the test targets
pub fn evaluate_model(model: &dyn TrainedForecastModel, test: &TimeSeriesData) -> Result<Evaluation> {
    let actual = test.values()?;
    let timeline = model.make_future_timeline(actual.len())?;
    let forecast = model.predict(&timeline)?;
    let metrics = evaluate_forecast(forecast.tail(actual.len()).yhat(), &actual)?;

    Ok(Evaluation { forecast, metrics })
}

/// Forecast performance metrics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastMetrics {
    /// Mean Absolute Error
    pub mae: f64,
    /// Mean Squared Error
    pub mse: f64,
    /// Root Mean Squared Error
    pub rmse: f64,
    /// Mean Absolute Percentage Error
    pub mape: f64,
    /// Symmetric Mean Absolute Percentage Error
    pub smape: f64,
    /// Direction Accuracy (percentage of correctly predicted moves)
    pub direction_accuracy: f64,
}

impl ForecastMetrics {
    /// Metrics recorded on a tracked run
    pub fn logged(&self) -> BTreeMap<&'static str, f64> {
        BTreeMap::from([("mae", self.mae), ("rmse", self.rmse)])
    }
}
