//! End-to-end synchronization run.
//!
//! One run: load the portal, submit the search so the grid populates,
//! capture page 1's export, then alternate confirmed page transitions with
//! exports until pagination is exhausted. Whatever was captured is merged
//! and reconciled into the store; partial page failures never stop the run
//! short of the merge stage.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use tracing::{info, warn};

use crate::config::Config;
use crate::repository::{NotamStore, Reconciler};
use crate::scrapers::surface::{Locator, RenderSurface};
use crate::scrapers::{
    CaptureOutcome, ExportCapturer, FingerprintDetector, NavOutcome, PageNavigator,
};
use crate::services::merge::merge_artifacts;

/// Summary of one run, logged at exit.
#[derive(Debug)]
pub struct SyncReport {
    pub started_at: DateTime<Utc>,
    pub pages_visited: u32,
    pub artifacts_captured: usize,
    pub records_merged: usize,
    pub duplicates_dropped: usize,
    pub batches_written: usize,
}

impl SyncReport {
    fn empty(started_at: DateTime<Utc>) -> Self {
        Self {
            started_at,
            pages_visited: 0,
            artifacts_captured: 0,
            records_merged: 0,
            duplicates_dropped: 0,
            batches_written: 0,
        }
    }
}

pub struct SyncService {
    config: Config,
}

impl SyncService {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// Run the full pipeline against the given surface and store.
    ///
    /// `cancel` is checked between pages: once set, the current page's
    /// operations complete and the run proceeds straight to merge and
    /// reconcile with whatever was captured.
    pub async fn run(
        &self,
        surface: &dyn RenderSurface,
        store: &dyn NotamStore,
        cancel: &AtomicBool,
    ) -> Result<SyncReport> {
        let started_at = Utc::now();
        let portal = &self.config.portal;

        surface.goto(&portal.url).await?;
        self.trigger_search(surface).await?;

        let mut navigator = PageNavigator::new(
            FingerprintDetector::new(&portal.grid_cell),
            portal.confirm_timeout(),
            portal.poll_interval(),
        );

        let Some(first) = navigator.settle_first_page(surface).await else {
            info!("grid never rendered a first page; nothing to synchronize");
            return Ok(SyncReport::empty(started_at));
        };
        info!(fingerprint = %first, "first page settled");

        let capturer = ExportCapturer::new(
            self.config.capture.download_dir.clone(),
            self.config.capture.file_timeout(),
            portal.poll_interval(),
            self.config.capture.settle(),
        );

        let mut artifacts: Vec<PathBuf> = Vec::new();
        let mut pages_visited = 1u32;
        self.capture_page(surface, &capturer, 1, &mut artifacts).await;

        for target in 2..=portal.max_pages {
            if cancel.load(Ordering::Relaxed) {
                info!("cancellation requested; continuing to merge with captured pages");
                break;
            }
            match navigator.advance(surface, target).await? {
                NavOutcome::Advanced(fingerprint) => {
                    info!(page = target, fingerprint = %fingerprint, "page transition confirmed");
                    pages_visited = target;
                    self.capture_page(surface, &capturer, target, &mut artifacts)
                        .await;
                }
                NavOutcome::NoChange => {
                    info!(page = target, "fingerprint unchanged after retry; treating as last page");
                    break;
                }
                NavOutcome::ControlNotFound => {
                    info!(page = target, "no control for page; pagination exhausted");
                    break;
                }
            }
        }

        let merged = merge_artifacts(&artifacts);
        if merged.records.is_empty() {
            info!("no valid artifacts; skipping store reconciliation");
            return Ok(SyncReport {
                started_at,
                pages_visited,
                artifacts_captured: artifacts.len(),
                records_merged: 0,
                duplicates_dropped: merged.duplicates_dropped,
                batches_written: 0,
            });
        }

        let reconciler = Reconciler::new(self.config.store.policy, self.config.store.batch_size);
        let batches_written = reconciler
            .reconcile(store, &merged.records)
            .await
            .context("store reconciliation failed")?;

        Ok(SyncReport {
            started_at,
            pages_visited,
            artifacts_captured: artifacts.len(),
            records_merged: merged.records.len(),
            duplicates_dropped: merged.duplicates_dropped,
            batches_written,
        })
    }

    /// The grid stays empty until the portal's search form is submitted.
    async fn trigger_search(&self, surface: &dyn RenderSurface) -> Result<()> {
        let controls = [Locator::css("#btnSearch"), Locator::text("button", "조회")];
        for control in &controls {
            if surface.exists(control).await? {
                if !surface.click(control).await.unwrap_or(false) {
                    let _ = surface.invoke(control).await?;
                }
                return Ok(());
            }
        }
        warn!("search control not found; assuming the grid loads on its own");
        Ok(())
    }

    /// Capture one page's export; every failure shape leaves the page
    /// without an artifact and the run moving on.
    async fn capture_page(
        &self,
        surface: &dyn RenderSurface,
        capturer: &ExportCapturer,
        page: u32,
        artifacts: &mut Vec<PathBuf>,
    ) {
        match capturer.capture(surface, page).await {
            Ok(CaptureOutcome::Captured(path)) => artifacts.push(path),
            Ok(CaptureOutcome::NoControl) => {
                warn!(page, "export control missing; page has no artifact");
            }
            Ok(CaptureOutcome::TimedOut) => {
                warn!(page, "export never arrived; page has no artifact");
            }
            Err(e) => {
                warn!(page, "export capture failed: {e:#}");
            }
        }
    }
}
