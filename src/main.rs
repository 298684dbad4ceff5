mod analysis;
mod diagnostics;
mod errors;
mod fetcher;
mod histohour;
mod indicators;
mod price_series;
mod report_table;
mod storage_utils;
mod strategy;
mod yearly;

use chrono::{Duration, Utc};
use fetcher::RetryPolicy;
use histohour::CryptoCompareClient;
use storage_utils::AsyncStorageManager;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Step 1: Configuration
    println!("\n--- Step 1: Loading Configuration ---");
    let storage = AsyncStorageManager::new_relative("storage").await?;
    let config = storage_utils::load_config(&storage).await?;
    let api_key = storage_utils::api_key_from_env()?;

    // Step 2: Download hourly history, newest page first
    println!("\n--- Step 2: Fetching Hourly History ---");
    let end = Utc::now();
    let start = end - Duration::days(config.fetch.lookback_days);
    let client = CryptoCompareClient::new(&config.fetch, api_key)?;
    let outcome =
        fetcher::fetch_history(&client, start, end, &RetryPolicy::from_config(&config.fetch)).await;

    if let Some(e) = &outcome.halted_by {
        eprintln!("Error fetching data: {}", e);
        warn!(points = outcome.series.len(), "continuing with partial history");
    }
    if outcome.series.is_empty() {
        warn!("no price history was retrieved");
    }
    info!(pages = outcome.pages, points = outcome.series.len(), "history assembled");

    // Step 3: Analyze
    println!("\n--- Step 3: Analyzing Strategy ---");
    let report = analysis::analyze(&outcome.series, &config.strategy, end);

    // Step 4: Display
    println!("\n--- Step 4: Displaying Report ---");
    report_table::run(&report);

    Ok(())
}
