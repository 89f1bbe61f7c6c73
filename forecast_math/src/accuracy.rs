//! Forecast accuracy measures

use crate::{MathError, Result};
use serde::{Deserialize, Serialize};

/// Forecast accuracy metrics
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ForecastAccuracy {
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
}

/// Calculate accuracy metrics for a forecast vs actual values
pub fn forecast_accuracy(forecast: &[f64], actual: &[f64]) -> Result<ForecastAccuracy> {
    if forecast.len() != actual.len() || forecast.is_empty() {
        return Err(MathError::InvalidInput(
            "Forecast and actual values must have the same non-zero length".to_string(),
        ));
    }

    let n = forecast.len() as f64;

    let errors: Vec<f64> = forecast
        .iter()
        .zip(actual.iter())
        .map(|(&f, &a)| a - f)
        .collect();

    let mae = errors.iter().map(|e| e.abs()).sum::<f64>() / n;
    let mse = errors.iter().map(|e| e.powi(2)).sum::<f64>() / n;
    let rmse = mse.sqrt();

    // Zero actuals have no defined percentage error; average over the rest.
    let nonzero: Vec<(f64, f64)> = actual
        .iter()
        .zip(errors.iter())
        .filter(|(a, _)| **a != 0.0)
        .map(|(&a, &e)| (a, e))
        .collect();
    let mape = if nonzero.is_empty() {
        0.0
    } else {
        nonzero
            .iter()
            .map(|(a, e)| (e.abs() / a.abs()) * 100.0)
            .sum::<f64>()
            / nonzero.len() as f64
    };

    let smape = actual
        .iter()
        .zip(forecast.iter())
        .map(|(&a, &f)| {
            let denominator = a.abs() + f.abs();
            if denominator == 0.0 {
                0.0
            } else {
                200.0 * (a - f).abs() / denominator
            }
        })
        .sum::<f64>()
        / n;

    Ok(ForecastAccuracy {
        mae,
        mse,
        rmse,
        mape,
        smape,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_known_errors() {
        let acc = forecast_accuracy(&[105.0, 106.0, 107.0], &[106.0, 107.0, 108.0]).unwrap();
        assert_relative_eq!(acc.mae, 1.0);
        assert_relative_eq!(acc.mse, 1.0);
        assert_relative_eq!(acc.rmse, 1.0);
        assert!(acc.mape > 0.9 && acc.mape < 1.0);
    }

    #[test]
    fn test_rmse_penalises_large_errors() {
        let acc = forecast_accuracy(&[0.0, 0.0], &[1.0, 3.0]).unwrap();
        assert_relative_eq!(acc.mae, 2.0);
        assert_relative_eq!(acc.rmse, 5.0_f64.sqrt());
    }

    #[test]
    fn test_zero_actuals_skipped_in_mape() {
        let acc = forecast_accuracy(&[1.0, 110.0], &[0.0, 100.0]).unwrap();
        assert_relative_eq!(acc.mape, 10.0, epsilon = 1e-9);
    }

    #[test]
    fn test_length_mismatch() {
        assert!(forecast_accuracy(&[1.0], &[1.0, 2.0]).is_err());
        assert!(forecast_accuracy(&[], &[]).is_err());
    }
}
