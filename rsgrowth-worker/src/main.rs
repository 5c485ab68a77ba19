use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use rsgrowth::collect::earth_engine::EarthEngine;
use rsgrowth::GrowthAnalyzer;
use rsgrowth_worker::registry::SupabasePlots;
use rsgrowth_worker::store::SupabaseResults;
use rsgrowth_worker::supabase::SupabaseClient;
use rsgrowth_worker::{run_once, WorkerConfig};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Variables from .env fill in anything not already set
    if let Err(e) = dotenvy::dotenv() {
        if !e.not_found() {
            return Err(e).context("Failed to read .env file");
        }
    }

    let config = WorkerConfig::parse();
    let window = config.window(Utc::now().date_naive())?;

    let earth_engine =
        EarthEngine::with_api_url(&config.ee_project, &config.ee_access_token, &config.ee_api_url)?;
    info!(project = earth_engine.project(), "Earth Engine initialized");
    let analyzer = GrowthAnalyzer::new(&earth_engine);

    let supabase = SupabaseClient::new(&config.supabase_url, &config.supabase_service_role_key)?;
    let registry = SupabasePlots::new(&supabase, &config.plots_table);
    let mut store = SupabaseResults::new(&supabase, &config.results_table);

    let report = run_once(&registry, &mut store, &analyzer, window, config.dry_run)?;
    info!(
        processed = report.processed,
        stored = report.stored,
        duplicates = report.duplicates,
        no_imagery = report.no_imagery,
        missing_geometry = report.missing_geometry,
        failed = report.failed,
        "done"
    );
    Ok(())
}
