//! Double Exponential Smoothing (Holt's Method)

use crate::{MathError, Result};
use serde::{Deserialize, Serialize};

/// Holt's linear trend method.
///
/// The state is updated one observation at a time; `fitted` records the
/// one-step-ahead prediction that was made *before* each observation was
/// seen, which is what residual-based uncertainty needs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DoubleExponentialSmoothing {
    alpha: f64,
    beta: f64,
    level: Option<f64>,
    trend: Option<f64>,
    values_seen: usize,
}

impl DoubleExponentialSmoothing {
    /// Create a new Double Exponential Smoothing with the specified parameters
    pub fn new(alpha: f64, beta: f64) -> Result<Self> {
        if alpha <= 0.0 || alpha >= 1.0 {
            return Err(MathError::InvalidInput(
                "Alpha must be between 0 and 1 (exclusive)".to_string(),
            ));
        }
        if beta <= 0.0 || beta >= 1.0 {
            return Err(MathError::InvalidInput(
                "Beta must be between 0 and 1 (exclusive)".to_string(),
            ));
        }

        Ok(Self {
            alpha,
            beta,
            level: None,
            trend: None,
            values_seen: 0,
        })
    }

    /// Update the smoother with a new value
    pub fn update(&mut self, value: f64) -> Result<()> {
        if !value.is_finite() {
            return Err(MathError::InvalidInput(format!(
                "Cannot smooth non-finite value {}",
                value
            )));
        }
        self.values_seen += 1;

        match (self.level, self.trend) {
            (None, None) => {
                self.level = Some(value);
                self.trend = Some(0.0);
            }
            (Some(prev_level), Some(prev_trend)) => {
                // Seed the trend from the first difference instead of zero.
                let prev_trend = if self.values_seen == 2 {
                    value - prev_level
                } else {
                    prev_trend
                };
                let new_level = self.alpha * value + (1.0 - self.alpha) * (prev_level + prev_trend);
                let new_trend =
                    self.beta * (new_level - prev_level) + (1.0 - self.beta) * prev_trend;

                self.level = Some(new_level);
                self.trend = Some(new_trend);
            }
            _ => {
                return Err(MathError::CalculationError(
                    "Inconsistent state: level and trend should both be Some or None".to_string(),
                ));
            }
        }

        Ok(())
    }

    /// Feed a whole series and return the one-step-ahead fitted values.
    ///
    /// The first fitted value is the first observation itself.
    pub fn fit(&mut self, values: &[f64]) -> Result<Vec<f64>> {
        let mut fitted = Vec::with_capacity(values.len());
        for &value in values {
            let prediction = match self.forecast(1) {
                Ok(p) => p,
                Err(_) => value,
            };
            fitted.push(prediction);
            self.update(value)?;
        }
        Ok(fitted)
    }

    /// Forecast h steps ahead
    pub fn forecast(&self, h: usize) -> Result<f64> {
        match (self.level, self.trend) {
            (Some(level), Some(trend)) => Ok(level + (h as f64) * trend),
            _ => Err(MathError::InsufficientData(
                "Not enough data to make a forecast".to_string(),
            )),
        }
    }

    /// Get the current level
    pub fn level(&self) -> Result<f64> {
        self.level.ok_or_else(|| {
            MathError::InsufficientData("Level not calculated yet".to_string())
        })
    }

    /// Get the current trend
    pub fn trend(&self) -> Result<f64> {
        self.trend.ok_or_else(|| {
            MathError::InsufficientData("Trend not calculated yet".to_string())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_parameter_validation() {
        assert!(DoubleExponentialSmoothing::new(0.0, 0.5).is_err());
        assert!(DoubleExponentialSmoothing::new(0.5, 1.0).is_err());
        assert!(DoubleExponentialSmoothing::new(0.5, 0.5).is_ok());
    }

    #[test]
    fn test_linear_series_is_tracked_exactly() {
        let mut des = DoubleExponentialSmoothing::new(0.4, 0.3).unwrap();
        let fitted = des.fit(&[10.0, 20.0, 30.0, 40.0]).unwrap();

        assert_eq!(fitted.len(), 4);
        assert_relative_eq!(fitted[0], 10.0);
        assert_relative_eq!(des.level().unwrap(), 40.0, epsilon = 1e-9);
        assert_relative_eq!(des.trend().unwrap(), 10.0, epsilon = 1e-9);
        assert_relative_eq!(des.forecast(2).unwrap(), 60.0, epsilon = 1e-9);
    }

    #[test]
    fn test_forecast_before_data() {
        let des = DoubleExponentialSmoothing::new(0.4, 0.3).unwrap();
        assert!(matches!(des.forecast(1), Err(MathError::InsufficientData(_))));
        assert!(des.level().is_err());
    }

    #[test]
    fn test_rejects_nan() {
        let mut des = DoubleExponentialSmoothing::new(0.4, 0.3).unwrap();
        assert!(des.update(f64::NAN).is_err());
        assert!(des.level().is_err());
    }
}
