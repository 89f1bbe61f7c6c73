//! Tracking store on the local filesystem
//!
//! Layout under the root directory:
//!
//! ```text
//! <root>/<experiment_id>/meta.json
//! <root>/<experiment_id>/<run_id>/meta.json
//! <root>/<experiment_id>/<run_id>/metrics/<key>   "<timestamp_ms> <value> <step>" per line
//! <root>/<experiment_id>/<run_id>/params/<key>
//! <root>/<experiment_id>/<run_id>/artifacts/...
//! ```

use super::{
    validate_key, Experiment, LifecycleStage, Run, RunInfo, RunStatus, TrackingStore, ViewType,
};
use crate::error::{ForecastError, Result};
use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, info, warn};

const META_FILE: &str = "meta.json";
const METRICS_DIR: &str = "metrics";
const PARAMS_DIR: &str = "params";
const ARTIFACTS_DIR: &str = "artifacts";

/// Filesystem-backed [`TrackingStore`]
#[derive(Debug, Clone)]
pub struct FileTrackingStore {
    root: PathBuf,
}

impl FileTrackingStore {
    /// Open a store, creating the root directory if needed
    pub fn new<P: Into<PathBuf>>(root: P) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(|e| {
            ForecastError::TrackingError(format!(
                "Cannot create tracking directory {}: {}",
                root.display(),
                e
            ))
        })?;
        Ok(Self { root })
    }

    /// Open a store that must already exist
    pub fn open<P: Into<PathBuf>>(root: P) -> Result<Self> {
        let root = root.into();
        if !root.is_dir() {
            return Err(ForecastError::ConfigurationError(format!(
                "Tracking directory {} does not exist",
                root.display()
            )));
        }
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn now_millis() -> i64 {
        Utc::now().timestamp_millis()
    }

    /// Experiment directories that carry a readable meta.json
    fn experiments(&self) -> Result<Vec<(PathBuf, Experiment)>> {
        let mut experiments = Vec::new();
        for dir in subdirectories(&self.root)? {
            match read_json::<Experiment>(&dir.join(META_FILE)) {
                Ok(mut experiment) => {
                    experiment.artifact_location = dir.clone();
                    experiments.push((dir, experiment))
                }
                Err(e) => warn!("Skipping experiment directory {}: {}", dir.display(), e),
            }
        }
        experiments.sort_by(|(_, a), (_, b)| id_order(&a.experiment_id, &b.experiment_id));
        Ok(experiments)
    }

    fn experiment_dir(&self, experiment_id: &str) -> Result<PathBuf> {
        validate_key("experiment", experiment_id)?;
        let dir = self.root.join(experiment_id);
        if !dir.join(META_FILE).is_file() {
            return Err(ForecastError::TrackingError(format!(
                "Experiment '{}' not found",
                experiment_id
            )));
        }
        Ok(dir)
    }

    fn next_experiment_id(&self) -> Result<String> {
        let next = subdirectories(&self.root)?
            .iter()
            .filter_map(|dir| dir.file_name()?.to_str()?.parse::<u64>().ok())
            .max()
            .map_or(0, |max| max + 1);
        Ok(next.to_string())
    }

    fn run_dir(&self, run_id: &str) -> Result<PathBuf> {
        validate_key("run", run_id)?;
        for dir in subdirectories(&self.root)? {
            let candidate = dir.join(run_id);
            if candidate.join(META_FILE).is_file() {
                return Ok(candidate);
            }
        }
        Err(ForecastError::TrackingError(format!(
            "Run '{}' not found",
            run_id
        )))
    }

    /// Run directory of a run that still accepts writes
    fn running_run_dir(&self, run_id: &str) -> Result<(PathBuf, RunInfo)> {
        let dir = self.run_dir(run_id)?;
        let info: RunInfo = read_json(&dir.join(META_FILE))?;
        if info.status.is_terminal() {
            return Err(ForecastError::TrackingError(format!(
                "Run '{}' is {} and can no longer be modified",
                run_id, info.status
            )));
        }
        Ok((dir, info))
    }

    fn read_run(dir: &Path) -> Result<Run> {
        let mut info: RunInfo = read_json(&dir.join(META_FILE))?;
        // The store may have moved since the run was recorded.
        info.artifact_uri = dir.join(ARTIFACTS_DIR);

        let mut metrics = BTreeMap::new();
        for (key, path) in files_in(&dir.join(METRICS_DIR))? {
            match latest_metric(&path) {
                Ok(Some(value)) => {
                    metrics.insert(key, value);
                }
                Ok(None) => {}
                Err(e) => warn!("Ignoring metric {} of run {}: {}", key, info.run_id, e),
            }
        }

        let mut params = BTreeMap::new();
        for (key, path) in files_in(&dir.join(PARAMS_DIR))? {
            params.insert(key, fs::read_to_string(&path)?);
        }

        Ok(Run {
            info,
            metrics,
            params,
        })
    }
}

impl TrackingStore for FileTrackingStore {
    fn create_experiment(&self, name: &str) -> Result<Experiment> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ForecastError::InvalidParameter(
                "Experiment name cannot be empty".to_string(),
            ));
        }
        if self.get_experiment_by_name(name)?.is_some() {
            return Err(ForecastError::TrackingError(format!(
                "Experiment '{}' already exists",
                name
            )));
        }

        let experiment_id = self.next_experiment_id()?;
        let dir = self.root.join(&experiment_id);
        fs::create_dir_all(&dir)?;

        let experiment = Experiment {
            experiment_id,
            name: name.to_string(),
            artifact_location: dir.clone(),
            lifecycle_stage: LifecycleStage::Active,
            creation_time: Self::now_millis(),
        };
        write_json(&dir.join(META_FILE), &experiment)?;

        info!(
            experiment_id = %experiment.experiment_id,
            name = %experiment.name,
            "Created experiment"
        );
        Ok(experiment)
    }

    fn get_experiment(&self, experiment_id: &str) -> Result<Experiment> {
        let dir = self.experiment_dir(experiment_id)?;
        let mut experiment: Experiment = read_json(&dir.join(META_FILE))?;
        experiment.artifact_location = dir;
        Ok(experiment)
    }

    fn get_experiment_by_name(&self, name: &str) -> Result<Option<Experiment>> {
        Ok(self
            .experiments()?
            .into_iter()
            .map(|(_, experiment)| experiment)
            .find(|experiment| experiment.name == name))
    }

    fn list_experiments(&self, view: ViewType) -> Result<Vec<Experiment>> {
        Ok(self
            .experiments()?
            .into_iter()
            .map(|(_, experiment)| experiment)
            .filter(|experiment| view.includes(experiment.lifecycle_stage))
            .collect())
    }

    fn delete_experiment(&self, experiment_id: &str) -> Result<()> {
        let mut experiment = self.get_experiment(experiment_id)?;
        experiment.lifecycle_stage = LifecycleStage::Deleted;
        write_json(&self.root.join(experiment_id).join(META_FILE), &experiment)
    }

    fn create_run(&self, experiment_id: &str) -> Result<Run> {
        let experiment = self.get_experiment(experiment_id)?;
        if experiment.lifecycle_stage == LifecycleStage::Deleted {
            return Err(ForecastError::TrackingError(format!(
                "Cannot start a run in deleted experiment '{}'",
                experiment_id
            )));
        }

        let run_id = uuid::Uuid::new_v4().simple().to_string();
        let dir = self.root.join(experiment_id).join(&run_id);
        let artifact_uri = dir.join(ARTIFACTS_DIR);
        fs::create_dir_all(dir.join(METRICS_DIR))?;
        fs::create_dir_all(dir.join(PARAMS_DIR))?;
        fs::create_dir_all(&artifact_uri)?;

        let info = RunInfo {
            run_id,
            experiment_id: experiment_id.to_string(),
            status: RunStatus::Running,
            lifecycle_stage: LifecycleStage::Active,
            start_time: Self::now_millis(),
            end_time: None,
            artifact_uri,
        };
        write_json(&dir.join(META_FILE), &info)?;

        debug!(run_id = %info.run_id, experiment_id, "Started run");
        Ok(Run {
            info,
            metrics: BTreeMap::new(),
            params: BTreeMap::new(),
        })
    }

    fn get_run(&self, run_id: &str) -> Result<Run> {
        Self::read_run(&self.run_dir(run_id)?)
    }

    fn search_runs(&self, experiment_ids: &[String], view: ViewType) -> Result<Vec<Run>> {
        let mut runs = Vec::new();
        for experiment_id in experiment_ids {
            let experiment_dir = self.experiment_dir(experiment_id)?;
            for dir in subdirectories(&experiment_dir)? {
                match Self::read_run(&dir) {
                    Ok(run) if view.includes(run.info.lifecycle_stage) => runs.push(run),
                    Ok(_) => {}
                    Err(e) => warn!("Skipping run directory {}: {}", dir.display(), e),
                }
            }
        }

        runs.sort_by(|a, b| {
            id_order(&a.info.experiment_id, &b.info.experiment_id)
                .then(a.info.start_time.cmp(&b.info.start_time))
                .then_with(|| a.info.run_id.cmp(&b.info.run_id))
        });
        Ok(runs)
    }

    fn log_metric(&self, run_id: &str, key: &str, value: f64) -> Result<()> {
        validate_key("metric", key)?;
        let (dir, _) = self.running_run_dir(run_id)?;
        let path = dir.join(METRICS_DIR).join(key);
        let step = match fs::read_to_string(&path) {
            Ok(existing) => existing.lines().filter(|l| !l.trim().is_empty()).count(),
            Err(_) => 0,
        };

        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)?;
        writeln!(file, "{} {} {}", Self::now_millis(), value, step)?;
        Ok(())
    }

    fn log_param(&self, run_id: &str, key: &str, value: &str) -> Result<()> {
        validate_key("param", key)?;
        let (dir, _) = self.running_run_dir(run_id)?;
        let path = dir.join(PARAMS_DIR).join(key);
        if let Ok(existing) = fs::read_to_string(&path) {
            if existing != value {
                return Err(ForecastError::TrackingError(format!(
                    "Param '{}' of run '{}' is already set to '{}'",
                    key, run_id, existing
                )));
            }
            return Ok(());
        }
        fs::write(path, value)?;
        Ok(())
    }

    fn artifact_root(&self, experiment_id: &str, run_id: &str) -> Result<PathBuf> {
        validate_key("experiment", experiment_id)?;
        validate_key("run", run_id)?;
        Ok(self
            .root
            .join(experiment_id)
            .join(run_id)
            .join(ARTIFACTS_DIR))
    }

    fn log_artifact(&self, run_id: &str, relative_path: &str, contents: &[u8]) -> Result<PathBuf> {
        let relative = Path::new(relative_path);
        let plain = relative.components().count() > 0
            && relative
                .components()
                .all(|c| matches!(c, Component::Normal(_)));
        if !plain {
            return Err(ForecastError::InvalidParameter(format!(
                "Artifact path '{}' must be relative and stay inside the run",
                relative_path
            )));
        }

        let (dir, _) = self.running_run_dir(run_id)?;
        let path = dir.join(ARTIFACTS_DIR).join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, contents)?;

        debug!(run_id, path = %path.display(), "Logged artifact");
        Ok(path)
    }

    fn end_run(&self, run_id: &str, status: RunStatus) -> Result<()> {
        if !status.is_terminal() {
            return Err(ForecastError::InvalidParameter(format!(
                "Cannot end run '{}' with status {}",
                run_id, status
            )));
        }
        let (dir, mut info) = self.running_run_dir(run_id)?;
        info.status = status;
        info.end_time = Some(Self::now_millis());
        write_json(&dir.join(META_FILE), &info)?;

        info!(run_id, %status, "Ended run");
        Ok(())
    }

    fn delete_run(&self, run_id: &str) -> Result<()> {
        let dir = self.run_dir(run_id)?;
        let mut info: RunInfo = read_json(&dir.join(META_FILE))?;
        info.lifecycle_stage = LifecycleStage::Deleted;
        write_json(&dir.join(META_FILE), &info)
    }
}

/// Numeric ids sort numerically, anything else after them lexically
fn id_order(a: &str, b: &str) -> std::cmp::Ordering {
    match (a.parse::<u64>(), b.parse::<u64>()) {
        (Ok(x), Ok(y)) => x.cmp(&y),
        (Ok(_), Err(_)) => std::cmp::Ordering::Less,
        (Err(_), Ok(_)) => std::cmp::Ordering::Greater,
        (Err(_), Err(_)) => a.cmp(b),
    }
}

fn subdirectories(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut dirs = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            dirs.push(path);
        }
    }
    dirs.sort();
    Ok(dirs)
}

/// Regular files of a directory keyed by file name; a missing directory is empty
fn files_in(dir: &Path) -> Result<Vec<(String, PathBuf)>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }
        if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
            files.push((name.to_string(), path.clone()));
        }
    }
    files.sort();
    Ok(files)
}

/// Value on the last non-empty line of a metric file
fn latest_metric(path: &Path) -> Result<Option<f64>> {
    let contents = fs::read_to_string(path)?;
    let Some(line) = contents.lines().rev().find(|l| !l.trim().is_empty()) else {
        return Ok(None);
    };

    let value = line.split_whitespace().nth(1).ok_or_else(|| {
        ForecastError::TrackingError(format!("Malformed metric line '{}'", line))
    })?;
    value
        .parse::<f64>()
        .map(Some)
        .map_err(|e| ForecastError::TrackingError(format!("Bad metric value '{}': {}", value, e)))
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let bytes = fs::read(path)?;
    Ok(serde_json::from_slice(&bytes)?)
}

/// Write via a temporary file so readers never see a partial document
fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, serde_json::to_vec_pretty(value)?)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn store() -> (TempDir, FileTrackingStore) {
        let dir = TempDir::new().unwrap();
        let store = FileTrackingStore::new(dir.path().join("mlruns")).unwrap();
        (dir, store)
    }

    #[test]
    fn test_experiment_ids_increase() {
        let (_dir, store) = store();
        let a = store.create_experiment("first").unwrap();
        let b = store.create_experiment("second").unwrap();
        assert_eq!(a.experiment_id, "0");
        assert_eq!(b.experiment_id, "1");
        assert!(store.create_experiment("first").is_err());

        let found = store.get_experiment_by_name("second").unwrap().unwrap();
        assert_eq!(found, b);
        assert!(store.get_experiment_by_name("third").unwrap().is_none());
    }

    #[test]
    fn test_run_lifecycle() {
        let (_dir, store) = store();
        let experiment = store.create_experiment("demand").unwrap();
        let run = store.create_run(&experiment.experiment_id).unwrap();
        assert_eq!(run.run_id().len(), 32);

        store.log_metric(run.run_id(), "rmse", 4.0).unwrap();
        store.log_metric(run.run_id(), "rmse", 3.5).unwrap();
        store.log_param(run.run_id(), "model", "holt").unwrap();
        store.end_run(run.run_id(), RunStatus::Finished).unwrap();

        let loaded = store.get_run(run.run_id()).unwrap();
        assert_eq!(loaded.metric("rmse"), Some(3.5));
        assert_eq!(loaded.param("model"), Some("holt"));
        assert_eq!(loaded.info.status, RunStatus::Finished);
        assert!(loaded.info.end_time.is_some());

        // Finished runs are immutable.
        assert!(store.log_metric(run.run_id(), "mae", 1.0).is_err());
        assert!(store.end_run(run.run_id(), RunStatus::Failed).is_err());
    }

    #[test]
    fn test_param_cannot_change() {
        let (_dir, store) = store();
        let experiment = store.create_experiment("demand").unwrap();
        let run = store.create_run(&experiment.experiment_id).unwrap();
        store.log_param(run.run_id(), "target", "sales").unwrap();
        store.log_param(run.run_id(), "target", "sales").unwrap();
        assert!(store.log_param(run.run_id(), "target", "units").is_err());
    }

    #[test]
    fn test_artifact_paths_stay_inside_run() {
        let (_dir, store) = store();
        let experiment = store.create_experiment("demand").unwrap();
        let run = store.create_run(&experiment.experiment_id).unwrap();

        let path = store
            .log_artifact(run.run_id(), "model/forecast.csv", b"ds,yhat\n")
            .unwrap();
        assert!(path.starts_with(&run.info.artifact_uri));
        assert_eq!(fs::read(path).unwrap(), b"ds,yhat\n");

        assert!(store.log_artifact(run.run_id(), "../escape", b"x").is_err());
        assert!(store.log_artifact(run.run_id(), "/abs", b"x").is_err());
    }

    #[test]
    fn test_delete_keeps_files_and_filters_views() {
        let (_dir, store) = store();
        let experiment = store.create_experiment("demand").unwrap();
        let kept = store.create_run(&experiment.experiment_id).unwrap();
        let deleted = store.create_run(&experiment.experiment_id).unwrap();
        store.delete_run(deleted.run_id()).unwrap();

        let ids = vec![experiment.experiment_id.clone()];
        let active = store.search_runs(&ids, ViewType::ActiveOnly).unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].run_id(), kept.run_id());
        assert_eq!(store.search_runs(&ids, ViewType::All).unwrap().len(), 2);

        store.delete_experiment(&experiment.experiment_id).unwrap();
        assert!(store.list_experiments(ViewType::ActiveOnly).unwrap().is_empty());
        assert_eq!(store.list_experiments(ViewType::All).unwrap().len(), 1);
        assert!(store.create_run(&experiment.experiment_id).is_err());
    }

    #[test]
    fn test_unreadable_directories_are_skipped() {
        let (_dir, store) = store();
        let experiment = store.create_experiment("demand").unwrap();
        fs::create_dir_all(store.root().join("stray")).unwrap();
        fs::create_dir_all(store.root().join("0").join("half-written-run")).unwrap();

        let experiments = store.list_experiments(ViewType::All).unwrap();
        assert_eq!(experiments, vec![experiment.clone()]);
        let runs = store
            .search_runs(&[experiment.experiment_id], ViewType::All)
            .unwrap();
        assert!(runs.is_empty());
    }

    #[test]
    fn test_runs_resolve_against_current_root() {
        let dir = TempDir::new().unwrap();
        let host = dir.path().join("host_mlruns");
        let store = FileTrackingStore::new(&host).unwrap();
        let experiment = store.create_experiment("demand").unwrap();
        let run = store.create_run(&experiment.experiment_id).unwrap();
        store
            .log_artifact(run.run_id(), "model/model.json", b"{}")
            .unwrap();
        store.end_run(run.run_id(), RunStatus::Finished).unwrap();

        let mounted = dir.path().join("container_mlruns");
        fs::rename(&host, &mounted).unwrap();
        let store = FileTrackingStore::open(&mounted).unwrap();

        let moved = store.get_run(run.run_id()).unwrap();
        let expected = mounted
            .join(&experiment.experiment_id)
            .join(run.run_id())
            .join(ARTIFACTS_DIR);
        assert_eq!(moved.info.artifact_uri, expected);
        assert_eq!(
            store
                .artifact_root(&experiment.experiment_id, run.run_id())
                .unwrap(),
            expected
        );
        assert_eq!(
            store.get_experiment(&experiment.experiment_id).unwrap().artifact_location,
            mounted.join(&experiment.experiment_id)
        );
        assert!(store.artifact_root("0", "../escape").is_err());
    }

    #[test]
    fn test_id_order() {
        use std::cmp::Ordering;
        assert_eq!(id_order("2", "10"), Ordering::Less);
        assert_eq!(id_order("10", "abc"), Ordering::Less);
        assert_eq!(id_order("b", "a"), Ordering::Greater);
    }

    #[test]
    fn test_open_requires_existing_root() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(
            FileTrackingStore::open(dir.path().join("missing")),
            Err(ForecastError::ConfigurationError(_))
        ));
        assert!(FileTrackingStore::open(dir.path()).is_ok());
    }
}
