//! CLI entry point.
//!
//! A single run invocation: no subcommands, no flags beyond
//! `--help`/`--version`. Configuration comes from the environment.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing::{info, warn};

use crate::config::Config;
use crate::repository::RestStore;

#[derive(Parser)]
#[command(name = "notamsync")]
#[command(about = "KOCA NOTAM portal scraper and map-store synchronizer")]
#[command(version)]
struct Cli {}

pub async fn run() -> Result<()> {
    let _cli = Cli::parse();

    let config = Config::from_env()?;
    std::fs::create_dir_all(&config.capture.download_dir)?;

    let cancel = Arc::new(AtomicBool::new(false));
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("interrupt received; stopping after the current page");
                cancel.store(true, Ordering::Relaxed);
            }
        });
    }

    let store = RestStore::new(&config.store)?;
    info!(policy = %config.store.policy, "starting NOTAM sync");

    run_with_browser(config, &store, &cancel).await
}

#[cfg(feature = "browser")]
async fn run_with_browser(config: Config, store: &RestStore, cancel: &AtomicBool) -> Result<()> {
    use crate::scrapers::browser::BrowserSession;
    use crate::services::SyncService;

    let (session, surface) =
        BrowserSession::launch(&config.browser, &config.capture.download_dir).await?;

    let service = SyncService::new(config);
    let result = service.run(&surface, store, cancel).await;
    session.close().await;

    let report = result?;
    let elapsed = (chrono::Utc::now() - report.started_at).num_seconds();
    info!(
        pages = report.pages_visited,
        artifacts = report.artifacts_captured,
        records = report.records_merged,
        duplicates = report.duplicates_dropped,
        batches = report.batches_written,
        elapsed_secs = elapsed,
        "sync finished"
    );
    Ok(())
}

#[cfg(not(feature = "browser"))]
async fn run_with_browser(_config: Config, _store: &RestStore, _cancel: &AtomicBool) -> Result<()> {
    Err(anyhow::anyhow!(
        "Browser support not compiled. Rebuild with: cargo build --features browser"
    ))
}
