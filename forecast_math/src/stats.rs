//! Descriptive statistics over plain slices

use crate::{MathError, Result};

/// Arithmetic mean
pub fn mean(values: &[f64]) -> Result<f64> {
    if values.is_empty() {
        return Err(MathError::InsufficientData(
            "Cannot take the mean of an empty series".to_string(),
        ));
    }
    Ok(values.iter().sum::<f64>() / values.len() as f64)
}

/// Sample standard deviation (n - 1 denominator).
///
/// A single observation has no spread, so it yields zero rather than an error.
pub fn sample_std_dev(values: &[f64]) -> Result<f64> {
    let m = mean(values)?;
    if values.len() < 2 {
        return Ok(0.0);
    }
    let variance = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    Ok(variance.sqrt())
}

/// Median of the values; the mean of the two middle values for even lengths
pub fn median(values: &[f64]) -> Result<f64> {
    if values.is_empty() {
        return Err(MathError::InsufficientData(
            "Cannot take the median of an empty series".to_string(),
        ));
    }
    if values.iter().any(|v| v.is_nan()) {
        return Err(MathError::InvalidInput("Median input contains NaN".to_string()));
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Ok((sorted[mid - 1] + sorted[mid]) / 2.0)
    } else {
        Ok(sorted[mid])
    }
}
