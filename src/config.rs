//! Runtime configuration.
//!
//! Everything is sourced from the environment (`.env` is loaded in `main`
//! before anything else). Only the store URL and key are required; the rest
//! default to the production portal values.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::repository::ReconcilePolicy;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub portal: PortalConfig,
    pub capture: CaptureSettings,
    pub browser: BrowserSettings,
    pub store: StoreSettings,
}

/// Portal layout and pacing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortalConfig {
    #[serde(default = "default_portal_url")]
    pub url: String,

    /// First grid row's key cell, read for the page fingerprint.
    #[serde(default = "default_grid_cell")]
    pub grid_cell: String,

    /// Safety ceiling on pages per run. The portal's own page-count signal
    /// is unreliable, so this is a bound, not a target.
    #[serde(default = "default_max_pages")]
    pub max_pages: u32,

    #[serde(default = "default_confirm_timeout")]
    pub confirm_timeout_secs: u64,

    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,
}

impl PortalConfig {
    pub fn confirm_timeout(&self) -> Duration {
        Duration::from_secs(self.confirm_timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// Export download capture.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureSettings {
    #[serde(default = "default_download_dir")]
    pub download_dir: PathBuf,

    #[serde(default = "default_file_timeout")]
    pub file_timeout_secs: u64,

    /// Grace period after a download appears before it is renamed.
    #[serde(default = "default_settle")]
    pub settle_ms: u64,
}

impl CaptureSettings {
    pub fn file_timeout(&self) -> Duration {
        Duration::from_secs(self.file_timeout_secs)
    }

    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }
}

/// Browser bootstrap.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowserSettings {
    /// Run in headless mode (default: true).
    #[serde(default = "default_headless")]
    pub headless: bool,

    /// Additional Chrome arguments.
    #[serde(default)]
    pub chrome_args: Vec<String>,

    #[serde(default = "default_load_timeout")]
    pub load_timeout_secs: u64,
}

impl BrowserSettings {
    pub fn load_timeout(&self) -> Duration {
        Duration::from_secs(self.load_timeout_secs)
    }
}

/// Remote store endpoint and write discipline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreSettings {
    pub url: String,
    pub api_key: String,

    #[serde(default = "default_table")]
    pub table: String,

    #[serde(default = "default_store_timeout")]
    pub timeout_secs: u64,

    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    #[serde(default)]
    pub policy: ReconcilePolicy,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            portal: PortalConfig {
                url: env_or("NOTAM_PORTAL_URL", default_portal_url),
                grid_cell: env_or("NOTAM_GRID_CELL", default_grid_cell),
                max_pages: env_parsed("NOTAM_MAX_PAGES", default_max_pages)?,
                confirm_timeout_secs: env_parsed(
                    "NOTAM_CONFIRM_TIMEOUT_SECS",
                    default_confirm_timeout,
                )?,
                poll_interval_ms: env_parsed("NOTAM_POLL_INTERVAL_MS", default_poll_interval)?,
            },
            capture: CaptureSettings {
                download_dir: std::env::var("NOTAM_DOWNLOAD_DIR")
                    .map(PathBuf::from)
                    .unwrap_or_else(|_| default_download_dir()),
                file_timeout_secs: env_parsed("NOTAM_FILE_TIMEOUT_SECS", default_file_timeout)?,
                settle_ms: env_parsed("NOTAM_SETTLE_MS", default_settle)?,
            },
            browser: BrowserSettings {
                headless: env_parsed("NOTAM_HEADLESS", default_headless)?,
                chrome_args: Vec::new(),
                load_timeout_secs: env_parsed("NOTAM_LOAD_TIMEOUT_SECS", default_load_timeout)?,
            },
            store: StoreSettings {
                url: std::env::var("NOTAM_STORE_URL").context("NOTAM_STORE_URL is not set")?,
                api_key: std::env::var("NOTAM_STORE_KEY").context("NOTAM_STORE_KEY is not set")?,
                table: env_or("NOTAM_STORE_TABLE", default_table),
                timeout_secs: env_parsed("NOTAM_STORE_TIMEOUT_SECS", default_store_timeout)?,
                batch_size: env_parsed("NOTAM_STORE_BATCH_SIZE", default_batch_size)?,
                policy: env_parsed("NOTAM_SYNC_POLICY", ReconcilePolicy::default)?,
            },
        })
    }
}

fn env_or(key: &str, default: fn() -> String) -> String {
    std::env::var(key).unwrap_or_else(|_| default())
}

fn env_parsed<T>(key: &str, default: fn() -> T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .parse()
            .map_err(|e| anyhow::anyhow!("invalid {key}={raw}: {e}")),
        Err(_) => Ok(default()),
    }
}

fn default_portal_url() -> String {
    "https://aim.koca.go.kr/xNotam/index.do?type=search2&language=ko_KR".to_string()
}

fn default_grid_cell() -> String {
    "#notamGrid tbody tr:first-child td:nth-child(2)".to_string()
}

fn default_max_pages() -> u32 {
    15
}

fn default_confirm_timeout() -> u64 {
    20
}

fn default_poll_interval() -> u64 {
    500
}

fn default_download_dir() -> PathBuf {
    PathBuf::from("downloads")
}

fn default_file_timeout() -> u64 {
    30
}

fn default_settle() -> u64 {
    1000
}

fn default_headless() -> bool {
    true
}

fn default_load_timeout() -> u64 {
    30
}

fn default_table() -> String {
    "notams".to_string()
}

fn default_store_timeout() -> u64 {
    30
}

fn default_batch_size() -> usize {
    100
}
