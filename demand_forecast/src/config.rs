//! Service configuration
//!
//! Sources are layered: built-in defaults, then an optional file named by
//! `FORECAST_CONFIG_FILE`, then `FORECAST__*` environment variables
//! (`FORECAST__PORT=9000`, `FORECAST__COLUMNS__DATE_COLUMN=day`).

use crate::data::ColumnMapping;
use crate::error::{ForecastError, Result};
use crate::selection::DEFAULT_SELECTION_METRIC;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable naming an optional configuration file
pub const CONFIG_FILE_ENV: &str = "FORECAST_CONFIG_FILE";
/// Prefix of configuration environment variables
pub const ENV_PREFIX: &str = "FORECAST";

const DEFAULT_MAX_UPLOAD_BYTES: u64 = 10 * 1024 * 1024;

/// Upload column names
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnsConfig {
    pub date_column: String,
    pub target_column: String,
}

/// Settings of the prediction service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub host: String,
    pub port: u16,
    /// Root directory of the tracking store
    pub tracking_uri: PathBuf,
    /// Metric minimized when choosing the model to serve
    pub selection_metric: String,
    pub columns: ColumnsConfig,
    pub max_upload_bytes: u64,
}

impl ServiceConfig {
    /// Load from defaults, `FORECAST_CONFIG_FILE` and the environment
    pub fn load() -> Result<Self> {
        let file = std::env::var(CONFIG_FILE_ENV).ok().map(PathBuf::from);
        Self::load_from(file.as_deref())
    }

    /// Load with an explicit optional file layered over the defaults
    pub fn load_from(file: Option<&Path>) -> Result<Self> {
        Self::load_layered(file, Self::environment())
    }

    /// `FORECAST__*` variables, nested keys joined by `__`
    fn environment() -> config::Environment {
        config::Environment::with_prefix(ENV_PREFIX)
            .separator("__")
            .try_parsing(true)
    }

    fn load_layered(file: Option<&Path>, environment: config::Environment) -> Result<Self> {
        let mut builder = config::Config::builder()
            .set_default("host", "0.0.0.0")?
            .set_default("port", 8000)?
            .set_default("tracking_uri", "mlruns")?
            .set_default("selection_metric", DEFAULT_SELECTION_METRIC)?
            .set_default("columns.date_column", "date")?
            .set_default("columns.target_column", "sales")?
            .set_default("max_upload_bytes", DEFAULT_MAX_UPLOAD_BYTES)?;

        if let Some(path) = file {
            if !path.is_file() {
                return Err(ForecastError::ConfigurationError(format!(
                    "Configuration file {} does not exist",
                    path.display()
                )));
            }
            builder = builder.add_source(config::File::from(path));
        }
        builder = builder.add_source(environment);

        let cfg: ServiceConfig = builder.build()?.try_deserialize()?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Check the settings that cannot be caught by deserialization
    pub fn validate(&self) -> Result<()> {
        if self.host.trim().is_empty() {
            return Err(ForecastError::ConfigurationError(
                "host must not be empty".to_string(),
            ));
        }
        if self.selection_metric.trim().is_empty() {
            return Err(ForecastError::ConfigurationError(
                "selection_metric must not be empty".to_string(),
            ));
        }
        if self.max_upload_bytes == 0 {
            return Err(ForecastError::ConfigurationError(
                "max_upload_bytes must be positive".to_string(),
            ));
        }
        self.column_mapping()?;
        Ok(())
    }

    pub fn column_mapping(&self) -> Result<ColumnMapping> {
        ColumnMapping::new(&self.columns.date_column, &self.columns.target_column)
    }

    /// `host:port` to bind the listener to
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            tracking_uri: PathBuf::from("mlruns"),
            selection_metric: DEFAULT_SELECTION_METRIC.to_string(),
            columns: ColumnsConfig {
                date_column: "date".to_string(),
                target_column: "sales".to_string(),
            },
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }
}
