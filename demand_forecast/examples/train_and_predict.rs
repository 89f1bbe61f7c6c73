use chrono::NaiveDate;
use demand_forecast::data::ColumnMapping;
use demand_forecast::models::ModelKind;
use demand_forecast::training::{run_training, TrainingConfig};
use demand_forecast::utils::synthetic_daily_sales;
use demand_forecast::{FileTrackingStore, ModelSelector, PredictionService};
use std::sync::Arc;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let tracking_dir = std::env::temp_dir().join("demand_forecast_example_mlruns");
    let store = FileTrackingStore::new(&tracking_dir)?;
    println!("Tracking runs in: {}", tracking_dir.display());

    // 120 days of generated sales
    let start = NaiveDate::from_ymd_opt(2023, 1, 1).ok_or("invalid start date")?;
    let data = synthetic_daily_sales(start, 120, 42)?;

    // Train one run per model family
    let mut config = TrainingConfig::new(ColumnMapping::identity());
    for kind in [ModelKind::Additive, ModelKind::Holt] {
        config.model = kind;
        let outcome = run_training(&store, &data, &config)?;
        println!(
            "{:<8} run {}  MAE {:.2}  RMSE {:.2}",
            kind.to_string(),
            outcome.run_id,
            outcome.metrics.mae,
            outcome.metrics.rmse
        );
    }

    // Serve the best run
    let loaded = ModelSelector::default().load_best(&store)?;
    println!("Best run: {} (rmse {:.2})", loaded.run.run_id(), loaded.value);

    let service = PredictionService::new(Arc::new(loaded.model), ColumnMapping::default());
    let upload = "date,sales\n2023-05-01,\n2023-05-02,\n2023-05-03,\n";
    for row in service.predict(upload.as_bytes())? {
        println!(
            "{}  {:.1}  [{:.1}, {:.1}]",
            row.ds, row.yhat, row.yhat_lower, row.yhat_upper
        );
    }

    Ok(())
}
