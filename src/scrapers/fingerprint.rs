//! Page-identity detection.
//!
//! A pagination click "succeeding" says nothing about whether the grid
//! actually changed; the only reliable signal is content-level. The
//! detector derives a fingerprint from the visible dataset: the natural key
//! of the first grid row when the grid structure is readable, otherwise the
//! first natural-key-shaped token anywhere in the rendered text.

use anyhow::Result;

use crate::models::NOTAM_ID_RE;
use crate::scrapers::surface::{Locator, RenderSurface};

/// Detects a per-page fingerprint from rendered content.
pub struct FingerprintDetector {
    grid_cell: Locator,
}

impl FingerprintDetector {
    /// `grid_cell_css` addresses the first visible row's key cell.
    pub fn new(grid_cell_css: &str) -> Self {
        Self {
            grid_cell: Locator::css(grid_cell_css),
        }
    }

    /// Return a content-derived token for the currently visible page, or
    /// `None` when the grid has not rendered yet. This is a polling
    /// primitive: absence means "ask again", never an error.
    pub async fn detect(&self, surface: &dyn RenderSurface) -> Result<Option<String>> {
        if let Some(text) = surface.read_text(&self.grid_cell).await? {
            let trimmed = text.trim();
            if !trimmed.is_empty() {
                let token = NOTAM_ID_RE
                    .find(trimmed)
                    .map(|m| m.as_str().to_string())
                    .unwrap_or_else(|| trimmed.to_string());
                return Ok(Some(token));
            }
        }

        let body = surface.full_text().await?;
        Ok(NOTAM_ID_RE.find(&body).map(|m| m.as_str().to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scrapers::surface::testing::FakeSurface;

    const CELL: &str = "#notamGrid tbody tr:first-child td:nth-child(2)";

    #[tokio::test]
    async fn prefers_grid_cell_when_present() {
        let surface = FakeSurface::new();
        surface.set_cell(CELL, " A1234/26 ");
        surface.set_body("B9999/26 elsewhere in the page");

        let detector = FingerprintDetector::new(CELL);
        let fp = detector.detect(&surface).await.unwrap();
        assert_eq!(fp.as_deref(), Some("A1234/26"));
    }

    #[tokio::test]
    async fn grid_cell_without_key_shape_is_used_verbatim() {
        let surface = FakeSurface::new();
        surface.set_cell(CELL, "row-17");

        let detector = FingerprintDetector::new(CELL);
        let fp = detector.detect(&surface).await.unwrap();
        assert_eq!(fp.as_deref(), Some("row-17"));
    }

    #[tokio::test]
    async fn falls_back_to_body_scan() {
        let surface = FakeSurface::new();
        surface.set_body("header junk C0042/25 more junk");

        let detector = FingerprintDetector::new(CELL);
        let fp = detector.detect(&surface).await.unwrap();
        assert_eq!(fp.as_deref(), Some("C0042/25"));
    }

    #[tokio::test]
    async fn absent_when_nothing_rendered() {
        let surface = FakeSurface::new();

        let detector = FingerprintDetector::new(CELL);
        assert_eq!(detector.detect(&surface).await.unwrap(), None);
    }

    #[tokio::test]
    async fn empty_cell_falls_through_to_body() {
        let surface = FakeSurface::new();
        surface.set_cell(CELL, "   ");
        surface.set_body("D0001/26");

        let detector = FingerprintDetector::new(CELL);
        let fp = detector.detect(&surface).await.unwrap();
        assert_eq!(fp.as_deref(), Some("D0001/26"));
    }
}
