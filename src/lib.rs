pub mod api;
pub mod config;
pub mod error;
pub mod models;
pub mod utils;

pub use api::*;
pub use error::{EngineError, EngineResult};
pub use models::*;
pub use utils::*;

use anyhow::{Context, Result};
use config::AppConfig;
use std::path::Path;
use tracing::info;
use utils::data::{
    load_snapshot_from_cache, save_model_to_csv, save_picks_to_csv, save_snapshot_to_cache,
};
use utils::pipeline::RunReport;

pub const SNAPSHOT_CACHE_FILE: &str = "cache/snapshot.json";
pub const PICKS_CSV_FILE: &str = "cache/value_picks.csv";
pub const MODEL_CSV_FILE: &str = "cache/model_probs.csv";

/// Load fixtures and quotes from the cache or The Odds API
pub async fn fetch_snapshot(config: &AppConfig) -> Result<MarketSnapshot> {
    if config.use_cache && Path::new(SNAPSHOT_CACHE_FILE).exists() {
        info!("Loading snapshot from cache file: {}", SNAPSHOT_CACHE_FILE);
        return load_snapshot_from_cache(SNAPSHOT_CACHE_FILE);
    }

    let client = OddsApiClient::new(config.require_api_key()?.to_string(), config.regions.clone());
    let snapshot = client
        .fetch_snapshot(&config.leagues, config.hours_ahead)
        .await
        .context("Failed to fetch odds")?;
    save_snapshot_to_cache(&snapshot, SNAPSHOT_CACHE_FILE)?;
    info!("Saved snapshot to cache file: {}", SNAPSHOT_CACHE_FILE);
    Ok(snapshot)
}

/// Price a snapshot and stake the picks, saving them to CSV when asked
pub fn run_snapshot(snapshot: &MarketSnapshot, config: &AppConfig) -> Result<RunReport> {
    let engine = &config.engine;
    let report = utils::pipeline::run(
        &snapshot.fixtures,
        &snapshot.quotes,
        &engine.predictor,
        engine,
    )?;

    if config.save_csv {
        save_picks_to_csv(&report.picks, PICKS_CSV_FILE)?;
        info!("Saved {} picks to {}", report.picks.len(), PICKS_CSV_FILE);
        save_model_to_csv(&report.model, MODEL_CSV_FILE)?;
        info!("Saved {} model rows to {}", report.model.len(), MODEL_CSV_FILE);
    }

    Ok(report)
}

/// Fetch the current market and run the engine over it
pub async fn fetch_and_run(config: &AppConfig) -> Result<RunReport> {
    let snapshot = fetch_snapshot(config).await?;
    run_snapshot(&snapshot, config)
}
