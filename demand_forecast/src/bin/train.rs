//! Train a demand model and record it in the tracking store.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::Parser;
use demand_forecast::data::ColumnMapping;
use demand_forecast::logging::init_tracing;
use demand_forecast::models::ModelKind;
use demand_forecast::tracking::FileTrackingStore;
use demand_forecast::training::{load_training_data, run_training, TrainingConfig, DEFAULT_EXPERIMENT};
use demand_forecast::utils::synthetic_daily_sales;
use std::path::PathBuf;
use tracing::info;

#[derive(Parser)]
#[command(name = "forecast-train")]
#[command(about = "Fit a demand forecasting model and log it as a tracked run", long_about = None)]
struct Cli {
    /// Target column of the training CSV
    #[arg(long, required_unless_present = "synthetic_days")]
    target: Option<String>,

    /// Date column of the training CSV
    #[arg(long = "date-col", required_unless_present = "synthetic_days")]
    date_col: Option<String>,

    /// Experiment name
    #[arg(long, default_value = DEFAULT_EXPERIMENT)]
    name: String,

    /// Training CSV
    #[arg(long, default_value = "data/processed/train.csv")]
    data: PathBuf,

    /// Tracking store directory
    #[arg(long = "tracking-uri", default_value = "./mlruns")]
    tracking_uri: PathBuf,

    /// Model family
    #[arg(long, value_enum, default_value_t = ModelKind::Additive)]
    model: ModelKind,

    /// Share of rows used for fitting
    #[arg(long = "train-ratio", default_value_t = 0.8)]
    train_ratio: f64,

    /// Coverage of the uncertainty interval
    #[arg(long = "interval-width", default_value_t = 0.8)]
    interval_width: f64,

    /// Train on this many days of generated sales instead of reading --data
    #[arg(long, conflicts_with_all = ["target", "date_col"])]
    synthetic_days: Option<usize>,
}

fn main() -> Result<()> {
    init_tracing("forecast_train=info,demand_forecast=info")?;
    let cli = Cli::parse();

    // Generated sales already use the prepared column names.
    let (mapping, data) = match (cli.synthetic_days, cli.date_col, cli.target) {
        (Some(days), _, _) => {
            let start = NaiveDate::from_ymd_opt(2023, 1, 1).context("invalid start date")?;
            (ColumnMapping::identity(), synthetic_daily_sales(start, days, 42)?)
        }
        (None, Some(date_col), Some(target)) => {
            let mapping = ColumnMapping::new(&date_col, &target)?;
            let data = load_training_data(&cli.data, &mapping)
                .with_context(|| format!("loading {}", cli.data.display()))?;
            (mapping, data)
        }
        _ => anyhow::bail!("--target and --date-col are required unless --synthetic-days is given"),
    };
    info!(rows = data.len(), "Loaded training data");

    let store = FileTrackingStore::new(&cli.tracking_uri)?;
    let config = TrainingConfig {
        experiment_name: cli.name,
        mapping,
        model: cli.model,
        train_ratio: cli.train_ratio,
        interval_width: cli.interval_width,
    };

    let outcome = run_training(&store, &data, &config)?;
    println!("Run ID: {}", outcome.run_id);
    println!("Experiment ID: {}", outcome.experiment_id);
    println!("MAE: {:.4}", outcome.metrics.mae);
    println!("RMSE: {:.4}", outcome.metrics.rmse);
    println!("Model artifact: {}", outcome.model_path.display());
    Ok(())
}
