//! Ordinary least squares trend fitting
//!
//! Unlike a rolling-window regression, the fit here works on explicit
//! `(x, y)` pairs so that irregularly spaced observations keep their real
//! position on the time axis.

use crate::{MathError, Result};
use serde::{Deserialize, Serialize};

/// Fitted straight line `y = slope * x + intercept`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LinearRegression {
    slope: f64,
    intercept: f64,
    r_squared: f64,
}

impl LinearRegression {
    /// Fit a line through the given points
    pub fn fit(xs: &[f64], ys: &[f64]) -> Result<Self> {
        if xs.len() != ys.len() {
            return Err(MathError::InvalidInput(format!(
                "x length ({}) doesn't match y length ({})",
                xs.len(),
                ys.len()
            )));
        }
        if xs.len() < 2 {
            return Err(MathError::InsufficientData(
                "Need at least 2 points for linear regression".to_string(),
            ));
        }
        if xs.iter().chain(ys.iter()).any(|v| !v.is_finite()) {
            return Err(MathError::InvalidInput(
                "Regression input contains non-finite values".to_string(),
            ));
        }

        let n = xs.len() as f64;
        let x_mean = xs.iter().sum::<f64>() / n;
        let y_mean = ys.iter().sum::<f64>() / n;

        let mut numerator = 0.0;
        let mut denominator = 0.0;
        for (&x, &y) in xs.iter().zip(ys) {
            numerator += (x - x_mean) * (y - y_mean);
            denominator += (x - x_mean) * (x - x_mean);
        }

        if denominator.abs() < 1e-10 {
            return Err(MathError::CalculationError(
                "Cannot calculate slope: x values are too similar".to_string(),
            ));
        }

        let slope = numerator / denominator;
        let intercept = y_mean - slope * x_mean;

        let mut ss_total = 0.0;
        let mut ss_residual = 0.0;
        for (&x, &y) in xs.iter().zip(ys) {
            ss_total += (y - y_mean).powi(2);
            ss_residual += (y - (slope * x + intercept)).powi(2);
        }
        // A flat series is explained perfectly by a flat line.
        let r_squared = if ss_total.abs() < 1e-10 {
            1.0
        } else {
            1.0 - ss_residual / ss_total
        };

        Ok(Self {
            slope,
            intercept,
            r_squared,
        })
    }

    /// Value of the fitted line at `x`
    pub fn predict(&self, x: f64) -> f64 {
        self.slope * x + self.intercept
    }

    pub fn slope(&self) -> f64 {
        self.slope
    }

    pub fn intercept(&self) -> f64 {
        self.intercept
    }

    /// Coefficient of determination of the fit
    pub fn r_squared(&self) -> f64 {
        self.r_squared
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_perfect_line() {
        let lr = LinearRegression::fit(&[0.0, 1.0, 2.0], &[10.0, 20.0, 30.0]).unwrap();

        assert_relative_eq!(lr.slope(), 10.0, epsilon = 1e-9);
        assert_relative_eq!(lr.intercept(), 10.0, epsilon = 1e-9);
        assert_relative_eq!(lr.predict(3.0), 40.0, epsilon = 1e-9);
        assert!(lr.r_squared() > 0.999);
    }

    #[test]
    fn test_irregular_spacing() {
        let lr = LinearRegression::fit(&[0.0, 1.0, 5.0], &[1.0, 3.0, 11.0]).unwrap();
        assert_relative_eq!(lr.slope(), 2.0, epsilon = 1e-9);
        assert_relative_eq!(lr.intercept(), 1.0, epsilon = 1e-9);
    }

    #[test]
    fn test_flat_series() {
        let lr = LinearRegression::fit(&[0.0, 1.0, 2.0, 3.0], &[5.0; 4]).unwrap();
        assert_relative_eq!(lr.slope(), 0.0);
        assert_relative_eq!(lr.r_squared(), 1.0);
    }

    #[test]
    fn test_rejects_bad_input() {
        assert!(matches!(
            LinearRegression::fit(&[1.0], &[1.0]),
            Err(MathError::InsufficientData(_))
        ));
        assert!(matches!(
            LinearRegression::fit(&[1.0, 2.0], &[1.0]),
            Err(MathError::InvalidInput(_))
        ));
        assert!(matches!(
            LinearRegression::fit(&[3.0, 3.0], &[1.0, 2.0]),
            Err(MathError::CalculationError(_))
        ));
        assert!(matches!(
            LinearRegression::fit(&[0.0, 1.0], &[1.0, f64::NAN]),
            Err(MathError::InvalidInput(_))
        ));
    }
}
