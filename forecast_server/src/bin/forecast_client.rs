//! Upload a CSV to the prediction service, show the forecast and save it.

use anyhow::{Context, Result};
use clap::Parser;
use forecast_server::client::{preview_csv, save_predictions, ClientError, ForecastClient};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "forecast-client")]
#[command(about = "Send a dataset to the demand forecasting service", long_about = None)]
struct Cli {
    /// CSV dataset to upload
    file: PathBuf,

    /// Base URL of the prediction service
    #[arg(long, default_value = "http://localhost:8000")]
    url: String,

    /// Where to save the predictions
    #[arg(short, long, default_value = "predictions.json")]
    output: PathBuf,

    /// Print the predictions without saving them
    #[arg(long)]
    no_save: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {:#}", err);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let bytes = std::fs::read(&cli.file)
        .with_context(|| format!("cannot read {}", cli.file.display()))?;

    let preview = preview_csv(&bytes, 5).context("cannot preview the dataset")?;
    println!("Preview of uploaded data ({} rows):", preview.total_rows);
    println!("{}", preview.headers.join("\t"));
    for row in &preview.rows {
        println!("{}", row.join("\t"));
    }

    let client = ForecastClient::new(&cli.url).context("cannot build the HTTP client")?;
    let rows = match client.predict(bytes).await {
        Ok(rows) => rows,
        Err(ClientError::EmptyDataset) => {
            println!("Warning: the uploaded file is empty. Please upload a valid dataset.");
            return Ok(());
        }
        Err(err) => return Err(err).with_context(|| format!("prediction request to {} failed", cli.url)),
    };

    println!();
    println!("Predictions:");
    println!("ds\tyhat\tyhat_lower\tyhat_upper");
    for row in &rows {
        println!(
            "{}\t{:.3}\t{:.3}\t{:.3}",
            row.ds, row.yhat, row.yhat_lower, row.yhat_upper
        );
    }

    if !cli.no_save {
        save_predictions(&cli.output, &rows)
            .with_context(|| format!("cannot save predictions to {}", cli.output.display()))?;
        println!("Saved {} predictions to {}", rows.len(), cli.output.display());
    }
    Ok(())
}
