//! Experiment tracking
//!
//! Runs are grouped into named experiments. Each run records metrics,
//! parameters and an artifact tree; the serving side only ever queries runs
//! and fetches a model artifact through [`TrackingStore`].

use crate::error::{ForecastError, Result};
use crate::models::TrainedModel;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

pub mod file_store;

pub use file_store::FileTrackingStore;

/// Artifact sub-directory holding the model files of a run
pub const MODEL_ARTIFACT_DIR: &str = "model";
/// File name of the serialized model inside [`MODEL_ARTIFACT_DIR`]
pub const MODEL_FILE: &str = "model.json";

/// Lifecycle of an experiment or run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleStage {
    Active,
    Deleted,
}

/// Which lifecycle stages a query returns
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewType {
    ActiveOnly,
    All,
}

impl ViewType {
    pub fn includes(&self, stage: LifecycleStage) -> bool {
        match self {
            ViewType::ActiveOnly => stage == LifecycleStage::Active,
            ViewType::All => true,
        }
    }
}

/// Run status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Running,
    Finished,
    Failed,
}

impl RunStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, RunStatus::Running)
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunStatus::Running => write!(f, "running"),
            RunStatus::Finished => write!(f, "finished"),
            RunStatus::Failed => write!(f, "failed"),
        }
    }
}

/// A named grouping of runs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Experiment {
    pub experiment_id: String,
    pub name: String,
    pub artifact_location: PathBuf,
    pub lifecycle_stage: LifecycleStage,
    /// Milliseconds since the Unix epoch
    pub creation_time: i64,
}

/// Run metadata as persisted by the store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunInfo {
    pub run_id: String,
    pub experiment_id: String,
    pub status: RunStatus,
    pub lifecycle_stage: LifecycleStage,
    /// Milliseconds since the Unix epoch
    pub start_time: i64,
    pub end_time: Option<i64>,
    /// Root of the run's artifact tree where it was last read from
    pub artifact_uri: PathBuf,
}

/// A run together with its latest metric values and parameters
#[derive(Debug, Clone, PartialEq)]
pub struct Run {
    pub info: RunInfo,
    pub metrics: BTreeMap<String, f64>,
    pub params: BTreeMap<String, String>,
}

impl Run {
    pub fn run_id(&self) -> &str {
        &self.info.run_id
    }

    pub fn experiment_id(&self) -> &str {
        &self.info.experiment_id
    }

    pub fn metric(&self, key: &str) -> Option<f64> {
        self.metrics.get(key).copied()
    }

    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }
}

/// Persisted run registry
pub trait TrackingStore: Send + Sync {
    /// Create a new experiment; names must be unique
    fn create_experiment(&self, name: &str) -> Result<Experiment>;

    fn get_experiment(&self, experiment_id: &str) -> Result<Experiment>;

    /// Find an experiment by name in any lifecycle stage
    fn get_experiment_by_name(&self, name: &str) -> Result<Option<Experiment>>;

    /// Experiments ordered by id
    fn list_experiments(&self, view: ViewType) -> Result<Vec<Experiment>>;

    /// Flip an experiment to `deleted`, keeping its files
    fn delete_experiment(&self, experiment_id: &str) -> Result<()>;

    /// Start a new run in `running` status
    fn create_run(&self, experiment_id: &str) -> Result<Run>;

    fn get_run(&self, run_id: &str) -> Result<Run>;

    /// Runs of the given experiments ordered by experiment id, start time, run id
    fn search_runs(&self, experiment_ids: &[String], view: ViewType) -> Result<Vec<Run>>;

    fn log_metric(&self, run_id: &str, key: &str, value: f64) -> Result<()>;

    fn log_param(&self, run_id: &str, key: &str, value: &str) -> Result<()>;

    /// Artifact tree of a run, resolved from its ids against the store location
    fn artifact_root(&self, experiment_id: &str, run_id: &str) -> Result<PathBuf>;

    /// Write `contents` under the run's artifact tree and return the full path
    fn log_artifact(&self, run_id: &str, relative_path: &str, contents: &[u8]) -> Result<PathBuf>;

    /// Move a running run to a terminal status
    fn end_run(&self, run_id: &str, status: RunStatus) -> Result<()>;

    /// Flip a run to `deleted`, keeping its files
    fn delete_run(&self, run_id: &str) -> Result<()>;
}

/// Return the experiment called `name`, creating it if needed
pub fn set_experiment(store: &dyn TrackingStore, name: &str) -> Result<Experiment> {
    match store.get_experiment_by_name(name)? {
        Some(experiment) => Ok(experiment),
        None => store.create_experiment(name),
    }
}

/// Every run across every experiment, both active and deleted
pub fn search_all_runs(store: &dyn TrackingStore) -> Result<Vec<Run>> {
    let ids: Vec<String> = store
        .list_experiments(ViewType::All)?
        .into_iter()
        .map(|e| e.experiment_id)
        .collect();
    store.search_runs(&ids, ViewType::All)
}

/// Store a trained model as the run's model artifact
pub fn log_model(store: &dyn TrackingStore, run_id: &str, model: &TrainedModel) -> Result<PathBuf> {
    let json = serde_json::to_vec_pretty(model)?;
    store.log_artifact(
        run_id,
        &format!("{}/{}", MODEL_ARTIFACT_DIR, MODEL_FILE),
        &json,
    )
}

/// Deserialize the model artifact of a run
pub fn load_model(store: &dyn TrackingStore, run: &Run) -> Result<TrainedModel> {
    let path = store
        .artifact_root(run.experiment_id(), run.run_id())?
        .join(MODEL_ARTIFACT_DIR)
        .join(MODEL_FILE);
    let bytes = std::fs::read(&path).map_err(|e| {
        ForecastError::ConfigurationError(format!(
            "Cannot read model artifact {}: {}",
            path.display(),
            e
        ))
    })?;
    serde_json::from_slice(&bytes).map_err(|e| {
        ForecastError::ConfigurationError(format!(
            "Cannot deserialize model artifact {}: {}",
            path.display(),
            e
        ))
    })
}

/// Key names become file names, so they must be a single plain path segment
pub(crate) fn validate_key(kind: &str, key: &str) -> Result<()> {
    let valid = !key.is_empty()
        && key != "."
        && key != ".."
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.' | ' '));
    if !valid {
        return Err(ForecastError::InvalidParameter(format!(
            "Invalid {} key '{}'",
            kind, key
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_view_type_includes() {
        assert!(ViewType::All.includes(LifecycleStage::Deleted));
        assert!(ViewType::ActiveOnly.includes(LifecycleStage::Active));
        assert!(!ViewType::ActiveOnly.includes(LifecycleStage::Deleted));
    }

    #[test]
    fn test_validate_key() {
        assert!(validate_key("metric", "rmse").is_ok());
        assert!(validate_key("param", "train_rows").is_ok());
        assert!(validate_key("metric", "").is_err());
        assert!(validate_key("metric", "..").is_err());
        assert!(validate_key("metric", "a/b").is_err());
    }

    #[test]
    fn test_status_serialization() {
        assert_eq!(
            serde_json::to_string(&RunStatus::Finished).unwrap(),
            "\"finished\""
        );
        assert!(RunStatus::Failed.is_terminal());
        assert!(!RunStatus::Running.is_terminal());
    }

    #[test]
    fn test_load_model_missing_artifact() {
        let dir = tempfile::TempDir::new().unwrap();
        let store = FileTrackingStore::new(dir.path()).unwrap();
        let experiment = store.create_experiment("demand").unwrap();
        let run = store.create_run(&experiment.experiment_id).unwrap();
        store.end_run(run.run_id(), RunStatus::Finished).unwrap();

        assert!(matches!(
            load_model(&store, &run),
            Err(ForecastError::ConfigurationError(_))
        ));
    }

    #[test]
    fn test_load_model_ignores_recorded_artifact_uri() {
        let dir = tempfile::TempDir::new().unwrap();
        let store = FileTrackingStore::new(dir.path()).unwrap();
        let experiment = store.create_experiment("demand").unwrap();
        let mut run = store.create_run(&experiment.experiment_id).unwrap();
        let model = crate::models::ModelKind::Holt
            .train(
                &crate::utils::synthetic_daily_sales(
                    chrono::NaiveDate::from_ymd_opt(2023, 1, 1).unwrap(),
                    21,
                    5,
                )
                .unwrap(),
                0.8,
            )
            .unwrap();
        log_model(&store, run.run_id(), &model).unwrap();

        run.info.artifact_uri = PathBuf::from("/nonexistent/artifacts");
        let loaded = load_model(&store, &run).unwrap();
        assert_eq!(loaded.kind(), model.kind());
    }
}
