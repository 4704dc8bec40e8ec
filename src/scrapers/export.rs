//! Per-page export capture.
//!
//! The portal produces exports as browser downloads with a fixed filename,
//! so two pages' exports would land on top of each other. The capturer
//! snapshots the watched directory before triggering the export, polls for a
//! completed newcomer, lets the write settle, and immediately renames the
//! file to a page-scoped name. The rename is the collision-avoidance
//! mechanism: once it has happened, the next page's download cannot touch
//! this page's artifact.

use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::scrapers::poll::poll_until;
use crate::scrapers::surface::{Locator, RenderSurface};

/// Suffixes Chrome and friends use for in-progress downloads.
const PARTIAL_SUFFIXES: &[&str] = &[".crdownload", ".part", ".tmp", ".download"];

/// Outcome of one page's export attempt. Both failure shapes are non-fatal:
/// the page is simply recorded as having no artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureOutcome {
    Captured(PathBuf),
    NoControl,
    TimedOut,
}

/// Triggers the export control and captures the resulting download.
pub struct ExportCapturer {
    download_dir: PathBuf,
    controls: Vec<Locator>,
    file_timeout: Duration,
    poll_interval: Duration,
    settle: Duration,
}

impl ExportCapturer {
    pub fn new(
        download_dir: PathBuf,
        file_timeout: Duration,
        poll_interval: Duration,
        settle: Duration,
    ) -> Self {
        Self {
            download_dir,
            controls: default_export_controls(),
            file_timeout,
            poll_interval,
            settle,
        }
    }

    /// Trigger the export for page `page` and capture the download under a
    /// page-scoped name.
    pub async fn capture(
        &self,
        surface: &dyn RenderSurface,
        page: u32,
    ) -> Result<CaptureOutcome> {
        let before = self.snapshot()?;

        let Some(control) = self.find_control(surface).await? else {
            warn!(page, "no export control found");
            return Ok(CaptureOutcome::NoControl);
        };

        let clicked = match surface.click(&control).await {
            Ok(clicked) => clicked,
            Err(e) => {
                warn!(page, "direct click on {control} failed: {e}");
                false
            }
        };
        if !clicked {
            let _ = surface.invoke(&control).await?;
        }

        let before_ref = &before;
        let Some(path) = poll_until(self.file_timeout, self.poll_interval, move || async move {
            self.new_complete_file(before_ref)
        })
        .await
        else {
            warn!(page, "no export file appeared within the timeout");
            return Ok(CaptureOutcome::TimedOut);
        };

        // Grace period for the tail of the write before we touch the file.
        sleep(self.settle).await;

        let original = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("export.xls");
        let target = self.download_dir.join(format!("page_{page}_{original}"));
        std::fs::rename(&path, &target)
            .with_context(|| format!("renaming export {} -> {}", path.display(), target.display()))?;

        info!(page, artifact = %target.display(), "export captured");
        Ok(CaptureOutcome::Captured(target))
    }

    async fn find_control(&self, surface: &dyn RenderSurface) -> Result<Option<Locator>> {
        for control in &self.controls {
            if surface.exists(control).await? {
                debug!(%control, "export control located");
                return Ok(Some(control.clone()));
            }
        }
        Ok(None)
    }

    fn snapshot(&self) -> Result<HashSet<String>> {
        let mut names = HashSet::new();
        for entry in std::fs::read_dir(&self.download_dir)
            .with_context(|| format!("reading download dir {}", self.download_dir.display()))?
        {
            names.insert(entry?.file_name().to_string_lossy().into_owned());
        }
        Ok(names)
    }

    /// A file that was not in the pre-trigger snapshot and is not an
    /// in-progress marker. Directory read errors count as "nothing yet".
    fn new_complete_file(&self, before: &HashSet<String>) -> Option<PathBuf> {
        let entries = std::fs::read_dir(&self.download_dir).ok()?;
        for entry in entries.flatten() {
            let name = entry.file_name().to_string_lossy().into_owned();
            if before.contains(&name) || is_partial(&name) {
                continue;
            }
            if entry.file_type().map(|t| t.is_file()).unwrap_or(false) {
                return Some(entry.path());
            }
        }
        None
    }
}

fn default_export_controls() -> Vec<Locator> {
    vec![
        Locator::css("#btnExcel".to_string()),
        Locator::css("a.btn_excel".to_string()),
        Locator::text("a", "EXCEL"),
    ]
}

fn is_partial(name: &str) -> bool {
    name.starts_with('.')
        || PARTIAL_SUFFIXES
            .iter()
            .any(|suffix| name.to_ascii_lowercase().ends_with(suffix))
}

#[cfg(test)]
mod tests {
    use std::path::Path;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use tempfile::TempDir;

    use super::*;

    /// Surface whose export control drops a file into the watched directory,
    /// the way the real portal's download does.
    struct DownloadingSurface {
        dir: PathBuf,
        filename: String,
        payloads: Mutex<Vec<String>>,
    }

    impl DownloadingSurface {
        fn new(dir: &Path, filename: &str, payloads: &[&str]) -> Self {
            Self {
                dir: dir.to_path_buf(),
                filename: filename.to_string(),
                payloads: Mutex::new(payloads.iter().rev().map(|s| s.to_string()).collect()),
            }
        }
    }

    #[async_trait]
    impl RenderSurface for DownloadingSurface {
        async fn goto(&self, _url: &str) -> Result<()> {
            Ok(())
        }

        async fn exists(&self, locator: &Locator) -> Result<bool> {
            Ok(matches!(locator, Locator::Css(s) if s == "#btnExcel"))
        }

        async fn read_text(&self, _locator: &Locator) -> Result<Option<String>> {
            Ok(None)
        }

        async fn full_text(&self) -> Result<String> {
            Ok(String::new())
        }

        async fn click(&self, _locator: &Locator) -> Result<bool> {
            if let Some(payload) = self.payloads.lock().unwrap().pop() {
                std::fs::write(self.dir.join(&self.filename), payload)?;
            }
            Ok(true)
        }

        async fn invoke(&self, locator: &Locator) -> Result<bool> {
            self.click(locator).await
        }

        async fn eval(&self, _js: &str) -> Result<serde_json::Value> {
            Ok(serde_json::Value::Null)
        }
    }

    fn capturer(dir: &Path) -> ExportCapturer {
        ExportCapturer::new(
            dir.to_path_buf(),
            Duration::from_millis(100),
            Duration::from_millis(1),
            Duration::from_millis(1),
        )
    }

    #[tokio::test]
    async fn sequential_captures_get_distinct_names() {
        let dir = TempDir::new().unwrap();
        let surface = DownloadingSurface::new(dir.path(), "notam_list.xls", &["one", "two"]);
        let capturer = capturer(dir.path());

        let first = capturer.capture(&surface, 1).await.unwrap();
        let second = capturer.capture(&surface, 2).await.unwrap();

        let CaptureOutcome::Captured(first) = first else {
            panic!("page 1 not captured: {first:?}");
        };
        let CaptureOutcome::Captured(second) = second else {
            panic!("page 2 not captured: {second:?}");
        };

        assert_ne!(first, second);
        assert_eq!(
            first.file_name().unwrap().to_str().unwrap(),
            "page_1_notam_list.xls"
        );
        assert_eq!(std::fs::read_to_string(&first).unwrap(), "one");
        assert_eq!(std::fs::read_to_string(&second).unwrap(), "two");
    }

    #[tokio::test]
    async fn times_out_when_nothing_downloads() {
        let dir = TempDir::new().unwrap();
        let surface = DownloadingSurface::new(dir.path(), "notam_list.xls", &[]);
        let capturer = capturer(dir.path());

        let outcome = capturer.capture(&surface, 1).await.unwrap();
        assert_eq!(outcome, CaptureOutcome::TimedOut);
    }

    #[tokio::test]
    async fn partial_downloads_are_not_captured() {
        let dir = TempDir::new().unwrap();
        let surface =
            DownloadingSurface::new(dir.path(), "notam_list.xls.crdownload", &["partial"]);
        let capturer = capturer(dir.path());

        let outcome = capturer.capture(&surface, 1).await.unwrap();
        assert_eq!(outcome, CaptureOutcome::TimedOut);
    }

    #[tokio::test]
    async fn missing_control_is_nonfatal() {
        struct NoControls;

        #[async_trait]
        impl RenderSurface for NoControls {
            async fn goto(&self, _url: &str) -> Result<()> {
                Ok(())
            }
            async fn exists(&self, _locator: &Locator) -> Result<bool> {
                Ok(false)
            }
            async fn read_text(&self, _locator: &Locator) -> Result<Option<String>> {
                Ok(None)
            }
            async fn full_text(&self) -> Result<String> {
                Ok(String::new())
            }
            async fn click(&self, _locator: &Locator) -> Result<bool> {
                Ok(false)
            }
            async fn invoke(&self, _locator: &Locator) -> Result<bool> {
                Ok(false)
            }
            async fn eval(&self, _js: &str) -> Result<serde_json::Value> {
                Ok(serde_json::Value::Null)
            }
        }

        let dir = TempDir::new().unwrap();
        let capturer = capturer(dir.path());
        let outcome = capturer.capture(&NoControls, 1).await.unwrap();
        assert_eq!(outcome, CaptureOutcome::NoControl);
    }

    #[test]
    fn partial_marker_detection() {
        assert!(is_partial("export.xls.crdownload"));
        assert!(is_partial("export.xls.PART"));
        assert!(is_partial(".hidden"));
        assert!(!is_partial("notam_list.xls"));
        assert!(!is_partial("page_1_notam_list.xls"));
    }
}
