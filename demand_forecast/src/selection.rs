//! Best-run selection
//!
//! The serving side loads exactly one model: the one from the finished run
//! with the lowest recorded selection metric across every experiment.

use crate::error::{ForecastError, Result};
use crate::models::TrainedModel;
use crate::tracking::{load_model, search_all_runs, Run, RunStatus, TrackingStore};
use tracing::{debug, info};

/// Metric minimized by default
pub const DEFAULT_SELECTION_METRIC: &str = "rmse";

/// Pick the run with the lowest `metric`.
///
/// Only finished runs carrying a finite value are candidates. On ties the
/// first candidate in `runs` order wins.
pub fn select_best_run<'a>(runs: &'a [Run], metric: &str) -> Option<&'a Run> {
    let mut best: Option<(&Run, f64)> = None;
    for run in runs {
        if run.info.status != RunStatus::Finished {
            continue;
        }
        let Some(value) = run.metric(metric).filter(|v| v.is_finite()) else {
            continue;
        };
        match best {
            Some((_, best_value)) if value >= best_value => {}
            _ => best = Some((run, value)),
        }
    }
    best.map(|(run, _)| run)
}

/// A model loaded from the winning run
#[derive(Debug, Clone)]
pub struct LoadedModel {
    pub run: Run,
    pub metric: String,
    pub value: f64,
    pub model: TrainedModel,
}

/// Chooses and loads the best tracked model
#[derive(Debug, Clone)]
pub struct ModelSelector {
    metric: String,
}

impl ModelSelector {
    pub fn new(metric: impl Into<String>) -> Self {
        Self {
            metric: metric.into(),
        }
    }

    pub fn metric(&self) -> &str {
        &self.metric
    }

    /// Query every run in the store, select the best and deserialize its model
    pub fn load_best(&self, store: &dyn TrackingStore) -> Result<LoadedModel> {
        let runs = search_all_runs(store)?;
        debug!(runs = runs.len(), metric = %self.metric, "Searching for best run");

        let run = select_best_run(&runs, &self.metric).ok_or_else(|| {
            ForecastError::ConfigurationError(format!(
                "No finished run with a '{}' metric found among {} runs",
                self.metric,
                runs.len()
            ))
        })?;
        let value = run.metric(&self.metric).unwrap_or(f64::NAN);
        let model = load_model(store, run)?;

        info!(
            run_id = %run.run_id(),
            experiment_id = %run.experiment_id(),
            metric = %self.metric,
            value,
            model = %model.kind(),
            "Loaded best model"
        );

        Ok(LoadedModel {
            run: run.clone(),
            metric: self.metric.clone(),
            value,
            model,
        })
    }
}

impl Default for ModelSelector {
    fn default() -> Self {
        Self::new(DEFAULT_SELECTION_METRIC)
    }
}
