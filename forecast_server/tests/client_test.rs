use demand_forecast::data::{parse_timestamp, ColumnMapping};
use demand_forecast::{ForecastFrame, Result as ForecastResult, TrainedForecastModel};
use forecast_server::client::{ClientError, ForecastClient};
use forecast_server::{build_router, AppState, ModelInfo};
use chrono::{Duration, NaiveDateTime};
use std::sync::Arc;
use tokio::net::TcpListener;

/// Seven daily history points ending 2023-01-07; forecasts equal the step index
#[derive(Debug)]
struct StepModel;

impl TrainedForecastModel for StepModel {
    fn make_future_timeline(&self, periods: usize) -> ForecastResult<Vec<NaiveDateTime>> {
        let start = parse_timestamp("2023-01-01").unwrap();
        Ok((0..7 + periods as i64)
            .map(|d| start + Duration::days(d))
            .collect())
    }

    fn predict(&self, timeline: &[NaiveDateTime]) -> ForecastResult<ForecastFrame> {
        let yhat: Vec<f64> = (0..timeline.len()).map(|i| i as f64).collect();
        ForecastFrame::new(
            timeline.to_vec(),
            yhat.clone(),
            yhat.clone(),
            yhat.iter().map(|v| v - 0.5).collect(),
            yhat.iter().map(|v| v + 0.5).collect(),
        )
    }

    fn name(&self) -> &str {
        "step"
    }
}

async fn spawn_server() -> String {
    let state = AppState::new(
        Arc::new(StepModel),
        ColumnMapping::new("date", "sales").unwrap(),
        ModelInfo {
            run_id: "run".to_string(),
            experiment_id: "0".to_string(),
            metric: "rmse".to_string(),
            value: 0.0,
            model: "step".to_string(),
        },
    );
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, build_router(state, 1024 * 1024))
            .await
            .unwrap();
    });
    format!("http://{}", addr)
}

#[tokio::test]
async fn client_receives_forecast_rows() {
    let base_url = spawn_server().await;
    let client = ForecastClient::new(base_url).unwrap();

    let csv = b"date,sales\n2023-01-08,\n2023-01-09,\n2023-01-10,\n".to_vec();
    let rows = client.predict(csv).await.unwrap();

    assert_eq!(rows.len(), 3);
    assert_eq!(rows[0].ds, parse_timestamp("2023-01-08").unwrap());
    assert_eq!(rows[2].yhat, 9.0);
    assert_eq!(rows[2].yhat_lower, 8.5);
}

#[tokio::test]
async fn client_surfaces_server_error_message() {
    let base_url = spawn_server().await;
    let client = ForecastClient::new(base_url).unwrap();

    let err = client
        .predict(b"date,sales\nyesterday,1\n".to_vec())
        .await
        .unwrap_err();
    match err {
        ClientError::Status { status, message } => {
            assert_eq!(status, 400);
            assert!(message.contains("yesterday"), "{}", message);
        }
        other => panic!("unexpected error {:?}", other),
    }
}

#[tokio::test]
async fn client_reports_unreachable_server() {
    // Bind and drop to get a port nothing listens on.
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let client = ForecastClient::with_timeout(
        format!("http://{}", addr),
        std::time::Duration::from_secs(2),
    )
    .unwrap();
    let err = client.predict(b"date,sales\n2023-01-08,1\n".to_vec()).await;
    assert!(matches!(err, Err(ClientError::Transport(_))));
}

#[tokio::test]
async fn client_refuses_header_only_dataset() {
    let base_url = spawn_server().await;
    let client = ForecastClient::new(base_url).unwrap();

    // The service would answer 200 with an empty array, so an error here
    // means the upload never left the client.
    let err = client.predict(b"date,sales\n".to_vec()).await;
    assert!(matches!(err, Err(ClientError::EmptyDataset)));

    let rows = client
        .predict(b"date,sales\n2023-01-08,\n".to_vec())
        .await
        .unwrap();
    assert_eq!(rows.len(), 1);
}

#[tokio::test]
async fn client_checks_dataset_before_connecting() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let client = ForecastClient::new(format!("http://{}", addr)).unwrap();
    let err = client.predict(b"date,sales\n".to_vec()).await;
    assert!(matches!(err, Err(ClientError::EmptyDataset)));
}
