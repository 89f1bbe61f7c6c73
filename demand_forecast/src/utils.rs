//! Utility functions for the demand_forecast crate

use crate::data::TimeSeriesData;
use crate::error::{ForecastError, Result};
use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime};
use forecast_math::stats::median;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};

/// Sampling frequency of a history: the median positive gap between
/// consecutive timestamps.
pub fn infer_frequency(timestamps: &[NaiveDateTime]) -> Result<Duration> {
    let gaps: Vec<f64> = timestamps
        .windows(2)
        .map(|w| (w[1] - w[0]).num_milliseconds())
        .filter(|&gap| gap > 0)
        .map(|gap| gap as f64)
        .collect();

    if gaps.is_empty() {
        return Err(ForecastError::DataError(
            "Cannot infer a frequency without two distinct timestamps".to_string(),
        ));
    }

    let gap = median(&gaps)?.round() as i64;
    Ok(Duration::milliseconds(gap))
}

/// Create future timestamps stepping from `last` by `step`
pub fn future_timestamps(
    last: NaiveDateTime,
    horizon: usize,
    step: Duration,
) -> Result<Vec<NaiveDateTime>> {
    if step <= Duration::zero() {
        return Err(ForecastError::InvalidParameter(format!(
            "Timeline step must be positive, got {}",
            step
        )));
    }

    let mut timestamps = Vec::with_capacity(horizon);
    let mut current = last;
    for _ in 0..horizon {
        current = current.checked_add_signed(step).ok_or_else(|| {
            ForecastError::DataError(format!(
                "Timeline overflows after {} steps from {}",
                timestamps.len(),
                last
            ))
        })?;
        timestamps.push(current);
    }

    Ok(timestamps)
}

/// Fractional days between two timestamps
pub fn days_between(origin: NaiveDateTime, ts: NaiveDateTime) -> f64 {
    (ts - origin).num_milliseconds() as f64 / 86_400_000.0
}

/// Generate a reproducible daily sales series: linear growth, a weekend
/// bump and Gaussian noise.
pub fn synthetic_daily_sales(start: NaiveDate, days: usize, seed: u64) -> Result<TimeSeriesData> {
    const WEEKLY: [f64; 7] = [-6.0, -4.0, -2.0, 0.0, 3.0, 12.0, 9.0];

    let mut rng = StdRng::seed_from_u64(seed);
    let noise =
        Normal::new(0.0, 4.0).map_err(|e| ForecastError::InvalidParameter(e.to_string()))?;

    let mut timestamps = Vec::with_capacity(days);
    let mut values = Vec::with_capacity(days);
    for day in 0..days {
        let date = start
            .checked_add_signed(Duration::days(day as i64))
            .ok_or_else(|| ForecastError::DataError("Date range overflows".to_string()))?;
        let weekday = date.weekday().num_days_from_monday() as usize;
        let value = 200.0 + 0.5 * day as f64 + WEEKLY[weekday] + noise.sample(&mut rng);

        timestamps.push(date.and_time(chrono::NaiveTime::MIN));
        values.push(value.max(0.0));
    }

    TimeSeriesData::from_observations(timestamps, values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::parse_timestamp;

    fn ts(raw: &str) -> NaiveDateTime {
        parse_timestamp(raw).unwrap()
    }

    #[test]
    fn test_infer_daily_frequency_with_gap() {
        let stamps = vec![
            ts("2023-01-01"),
            ts("2023-01-02"),
            ts("2023-01-03"),
            ts("2023-01-06"),
            ts("2023-01-07"),
        ];
        assert_eq!(infer_frequency(&stamps).unwrap(), Duration::days(1));
    }

    #[test]
    fn test_infer_frequency_needs_distinct_stamps() {
        assert!(infer_frequency(&[ts("2023-01-01")]).is_err());
        assert!(infer_frequency(&[ts("2023-01-01"), ts("2023-01-01")]).is_err());
    }

    #[test]
    fn test_future_timestamps() {
        let future = future_timestamps(ts("2023-01-31"), 2, Duration::hours(12)).unwrap();
        assert_eq!(future, vec![ts("2023-01-31 12:00:00"), ts("2023-02-01")]);
        assert!(future_timestamps(ts("2023-01-31"), 2, Duration::zero()).is_err());
        assert!(future_timestamps(ts("2023-01-31"), 0, Duration::days(1))
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_synthetic_series_is_reproducible() {
        let start = NaiveDate::from_ymd_opt(2023, 1, 1).unwrap();
        let a = synthetic_daily_sales(start, 30, 7).unwrap();
        let b = synthetic_daily_sales(start, 30, 7).unwrap();
        assert_eq!(a.len(), 30);
        assert_eq!(a.values().unwrap(), b.values().unwrap());
    }
}
