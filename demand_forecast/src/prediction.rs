//! Forecasts for uploaded datasets

use crate::data::{prepare_data, ColumnMapping, DataLoader};
use crate::error::{ForecastError, Result};
use crate::models::{ForecastRow, TrainedForecastModel};
use std::sync::Arc;
use tracing::debug;

/// Turns raw CSV uploads into forecast rows using one shared model.
///
/// The upload is assumed to cover the periods that immediately follow the
/// model's training history: for `N` uploaded rows the model timeline is
/// extended by `N` steps and the last `N` forecast rows are returned. Upload
/// dates are validated but not matched against the forecast dates.
#[derive(Debug, Clone)]
pub struct PredictionService {
    model: Arc<dyn TrainedForecastModel>,
    mapping: ColumnMapping,
}

impl PredictionService {
    pub fn new(model: Arc<dyn TrainedForecastModel>, mapping: ColumnMapping) -> Self {
        Self { model, mapping }
    }

    pub fn model(&self) -> &Arc<dyn TrainedForecastModel> {
        &self.model
    }

    pub fn mapping(&self) -> &ColumnMapping {
        &self.mapping
    }

    /// Forecast the periods covered by a CSV upload
    pub fn predict(&self, csv_bytes: &[u8]) -> Result<Vec<ForecastRow>> {
        let df = DataLoader::from_bytes(csv_bytes)?;
        let data = prepare_data(&df, &self.mapping)?;
        let periods = data.len();
        if periods == 0 {
            return Ok(Vec::new());
        }

        let timeline = self
            .model
            .make_future_timeline(periods)
            .map_err(into_internal)?;
        let forecast = self.model.predict(&timeline).map_err(into_internal)?;
        let rows = forecast.tail(periods).rows();

        if rows.len() != periods {
            return Err(ForecastError::InternalError(format!(
                "Model returned {} rows for {} requested periods",
                rows.len(),
                periods
            )));
        }

        debug!(periods, model = self.model.name(), "Forecast complete");
        Ok(rows)
    }
}

/// Failures inside the model are the service's fault, not the caller's
fn into_internal(err: ForecastError) -> ForecastError {
    match err {
        ForecastError::InternalError(_) => err,
        other => ForecastError::InternalError(format!("Model failed: {}", other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::parse_timestamp;
    use crate::models::ForecastFrame;
    use chrono::{Duration, NaiveDateTime};
    use std::sync::Mutex;

    /// Daily model with 5 history points that records the requested periods
    #[derive(Debug, Default)]
    struct StubModel {
        requested: Mutex<Vec<usize>>,
        fail: bool,
    }

    impl TrainedForecastModel for StubModel {
        fn make_future_timeline(&self, periods: usize) -> Result<Vec<NaiveDateTime>> {
            self.requested.lock().unwrap().push(periods);
            let start = parse_timestamp("2022-12-27").unwrap();
            Ok((0..5 + periods as i64)
                .map(|d| start + Duration::days(d))
                .collect())
        }

        fn predict(&self, timeline: &[NaiveDateTime]) -> Result<ForecastFrame> {
            if self.fail {
                return Err(ForecastError::DataError("singular fit".to_string()));
            }
            let yhat: Vec<f64> = (0..timeline.len()).map(|i| i as f64).collect();
            ForecastFrame::new(
                timeline.to_vec(),
                yhat.clone(),
                yhat.clone(),
                yhat.iter().map(|v| v - 1.0).collect(),
                yhat.iter().map(|v| v + 1.0).collect(),
            )
        }

        fn name(&self) -> &str {
            "stub"
        }
    }

    fn service(model: Arc<StubModel>) -> PredictionService {
        PredictionService::new(model, ColumnMapping::new("date", "sales").unwrap())
    }

    #[test]
    fn test_ten_rows_return_last_ten_of_extended_timeline() {
        let mut csv = String::from("date,sales\n");
        for day in 1..=10 {
            csv.push_str(&format!("2023-01-{:02},{}\n", day, 100 + day));
        }
        let model = Arc::new(StubModel::default());
        let rows = service(model.clone()).predict(csv.as_bytes()).unwrap();

        assert_eq!(*model.requested.lock().unwrap(), vec![10]);
        assert_eq!(rows.len(), 10);

        let timeline = model.make_future_timeline(10).unwrap();
        let expected: Vec<NaiveDateTime> = timeline[timeline.len() - 10..].to_vec();
        let got: Vec<NaiveDateTime> = rows.iter().map(|r| r.ds).collect();
        assert_eq!(got, expected);
        assert_eq!(rows[0].yhat, 5.0);
        for row in &rows {
            assert!(row.yhat.is_finite() && row.yhat_lower.is_finite() && row.yhat_upper.is_finite());
        }
    }

    #[test]
    fn test_header_only_upload_is_empty() {
        let model = Arc::new(StubModel::default());
        let rows = service(model.clone()).predict(b"date,sales\n").unwrap();
        assert!(rows.is_empty());
        assert!(model.requested.lock().unwrap().is_empty());
    }

    #[test]
    fn test_bad_uploads_are_client_errors() {
        let svc = service(Arc::new(StubModel::default()));
        for body in [
            &b"day,sales\n2023-01-01,1\n"[..],
            &b"date,sales\nnot-a-date,1\n"[..],
            &b"date,sales\n2023-01-01,lots\n"[..],
            &b""[..],
        ] {
            let err = svc.predict(body).unwrap_err();
            assert!(err.is_client_error(), "unexpected {:?}", err);
        }
    }

    #[test]
    fn test_model_failure_is_internal() {
        let svc = service(Arc::new(StubModel {
            fail: true,
            ..Default::default()
        }));
        let err = svc.predict(b"date,sales\n2023-01-01,1\n").unwrap_err();
        assert!(matches!(err, ForecastError::InternalError(_)));
        assert!(!err.is_client_error());
    }
}
