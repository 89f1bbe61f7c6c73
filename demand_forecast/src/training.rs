//! Training runs recorded in the tracking store

use crate::data::{prepare_data, ColumnMapping, DataLoader, TimeSeriesData};
use crate::error::{ForecastError, Result};
use crate::metrics::{evaluate_model, ForecastMetrics};
use crate::models::{ForecastFrame, ModelKind, TrainedForecastModel, DEFAULT_INTERVAL_WIDTH};
use crate::tracking::{log_model, set_experiment, RunStatus, TrackingStore, MODEL_ARTIFACT_DIR};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Default experiment name
pub const DEFAULT_EXPERIMENT: &str = "automl-demand-forecasting";
/// File name of the full forecast logged next to the model
pub const FORECAST_FILE: &str = "forecast.csv";

/// Settings of one training run
#[derive(Debug, Clone)]
pub struct TrainingConfig {
    pub experiment_name: String,
    pub mapping: ColumnMapping,
    pub model: ModelKind,
    /// Share of rows used for fitting; the rest is the hold-out
    pub train_ratio: f64,
    pub interval_width: f64,
}

impl TrainingConfig {
    pub fn new(mapping: ColumnMapping) -> Self {
        Self {
            experiment_name: DEFAULT_EXPERIMENT.to_string(),
            mapping,
            model: ModelKind::Additive,
            train_ratio: 0.8,
            interval_width: DEFAULT_INTERVAL_WIDTH,
        }
    }
}

/// What a successful run recorded
#[derive(Debug, Clone)]
pub struct TrainingOutcome {
    pub experiment_id: String,
    pub run_id: String,
    pub metrics: ForecastMetrics,
    pub model_path: PathBuf,
    pub forecast_path: PathBuf,
}

/// Read a CSV and prepare it with the configured mapping
pub fn load_training_data<P: AsRef<Path>>(path: P, mapping: &ColumnMapping) -> Result<TimeSeriesData> {
    let df = DataLoader::from_csv(path.as_ref()).map_err(|e| match e {
        ForecastError::IoError(io) => ForecastError::DataError(format!(
            "Cannot read training data {}: {}",
            path.as_ref().display(),
            io
        )),
        other => other,
    })?;
    prepare_data(&df, mapping)
}

/// Fit, evaluate and record one model.
///
/// The run is marked failed when any step after its creation fails.
pub fn run_training(
    store: &dyn TrackingStore,
    data: &TimeSeriesData,
    config: &TrainingConfig,
) -> Result<TrainingOutcome> {
    let experiment = set_experiment(store, &config.experiment_name)?;
    info!(
        name = %experiment.name,
        experiment_id = %experiment.experiment_id,
        artifact_location = %experiment.artifact_location.display(),
        "Using experiment"
    );

    let (train, test) = data.split(config.train_ratio)?;
    if train.len() < 2 || test.is_empty() {
        return Err(ForecastError::DataError(format!(
            "Split of {} rows at ratio {} leaves {} train and {} test rows",
            data.len(),
            config.train_ratio,
            train.len(),
            test.len()
        )));
    }

    let run = store.create_run(&experiment.experiment_id)?;
    let run_id = run.run_id().to_string();

    match record_run(store, &run_id, &train, &test, config) {
        Ok((metrics, model_path, forecast_path)) => {
            store.end_run(&run_id, RunStatus::Finished)?;
            info!(run_id = %run_id, mae = metrics.mae, rmse = metrics.rmse, "Training run finished");
            Ok(TrainingOutcome {
                experiment_id: experiment.experiment_id,
                run_id,
                metrics,
                model_path,
                forecast_path,
            })
        }
        Err(e) => {
            warn!(run_id = %run_id, error = %e, "Training run failed");
            if let Err(end_err) = store.end_run(&run_id, RunStatus::Failed) {
                warn!(run_id = %run_id, error = %end_err, "Could not mark run as failed");
            }
            Err(e)
        }
    }
}

fn record_run(
    store: &dyn TrackingStore,
    run_id: &str,
    train: &TimeSeriesData,
    test: &TimeSeriesData,
    config: &TrainingConfig,
) -> Result<(ForecastMetrics, PathBuf, PathBuf)> {
    let params = [
        ("model", config.model.to_string()),
        ("date_col", config.mapping.date_column().to_string()),
        ("target", config.mapping.target_column().to_string()),
        ("train_rows", train.len().to_string()),
        ("test_rows", test.len().to_string()),
        ("interval_width", config.interval_width.to_string()),
    ];
    for (key, value) in &params {
        store.log_param(run_id, key, value)?;
    }

    let model = config.model.train(train, config.interval_width)?;
    info!(model = model.name(), rows = train.len(), "Model fitted");
    for (key, value) in model.fitted_params() {
        store.log_param(run_id, key, &value)?;
    }

    let evaluation = evaluate_model(&model, test)?;
    for (key, value) in evaluation.metrics.logged() {
        store.log_metric(run_id, key, value)?;
    }

    let model_path = log_model(store, run_id, &model)?;
    let forecast_path = store.log_artifact(
        run_id,
        &format!("{}/{}", MODEL_ARTIFACT_DIR, FORECAST_FILE),
        &forecast_csv(&evaluation.forecast)?,
    )?;

    Ok((evaluation.metrics, model_path, forecast_path))
}

/// Render a forecast frame as CSV
pub fn forecast_csv(forecast: &ForecastFrame) -> Result<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(["ds", "trend", "yhat", "yhat_lower", "yhat_upper"])?;
    for (row, trend) in forecast.rows().iter().zip(forecast.trend()) {
        writer.write_record(&[
            row.ds.format("%Y-%m-%d %H:%M:%S").to_string(),
            trend.to_string(),
            row.yhat.to_string(),
            row.yhat_lower.to_string(),
            row.yhat_upper.to_string(),
        ])?;
    }
    writer
        .into_inner()
        .map_err(|e| ForecastError::InternalError(format!("Cannot finish forecast CSV: {}", e)))
}
