use dotenv::dotenv;
use late_payments_report::live::{ServiceAccountAuthenticator, SheetsClient, StripeClient};
use late_payments_report::{run_report, ReportConfig, Result, RunSummary};
use log::{error, info};
use std::path::PathBuf;
use std::process::ExitCode;

const CONFIG_PATH_ENV_VAR: &str = "LATE_PAYMENTS_CONFIG";
const DEFAULT_CONFIG_FILE: &str = "config.json";

fn init_logger() {
    let log_env = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_env))
        .format_timestamp_secs()
        .init();
}

fn config_path() -> PathBuf {
    std::env::var(CONFIG_PATH_ENV_VAR)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_FILE))
}

async fn run() -> Result<RunSummary> {
    let config = ReportConfig::load(&config_path())?;

    let stripe = StripeClient::new(config.processor_api_key.clone());
    let auth = ServiceAccountAuthenticator::from_file(&config.credentials_path)?;
    let sheets = SheetsClient::new(auth);

    run_report(&config, &stripe, &sheets).await
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenv().ok();
    init_logger();

    match run().await {
        Ok(summary) => {
            info!(
                "{} of {} subscriptions are late; {} cells written to '{}'.",
                summary.late_subscriptions,
                summary.subscriptions_processed,
                summary.update.updated_cells,
                summary.update.tab_name
            );
            info!("Process completed successfully!");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("An error occurred: {}", e);
            ExitCode::FAILURE
        }
    }
}
