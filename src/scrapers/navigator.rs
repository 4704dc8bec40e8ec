//! Pagination driver.
//!
//! The portal's pager is drawn by client-side script with nothing observable
//! in the URL, so advancing is a two-step protocol: locate-and-activate the
//! control for the target page, then prove the transition by watching the
//! page fingerprint change. Which selector shape the pager answers to has
//! churned across portal revisions; lookups are therefore an ordered list of
//! strategies and the first one whose element exists wins.

use std::time::Duration;

use anyhow::Result;
use tracing::{debug, warn};

use crate::scrapers::fingerprint::FingerprintDetector;
use crate::scrapers::poll::poll_until;
use crate::scrapers::surface::{Locator, RenderSurface};

/// Outcome of one attempted page transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavOutcome {
    /// The grid now shows a different dataset; carries the new fingerprint.
    Advanced(String),
    /// Control was activated but the fingerprint never changed, including
    /// after the scripted retry. Treated by the caller as end of pagination.
    NoChange,
    /// No lookup strategy found a control for the target page.
    ControlNotFound,
}

/// One way of addressing the pager control for a given page number.
pub trait PageLookup: Send + Sync {
    fn name(&self) -> &'static str;
    fn locator(&self, page: u32) -> Locator;
}

/// Structural path into the pager: the Nth anchor of the paging strip.
struct StructuralPath;

impl PageLookup for StructuralPath {
    fn name(&self) -> &'static str {
        "structural-path"
    }

    fn locator(&self, page: u32) -> Locator {
        Locator::css(format!("#paging a:nth-child({page})"))
    }
}

/// Anchor whose inline handler names the target page.
struct HandlerAttribute;

impl PageLookup for HandlerAttribute {
    fn name(&self) -> &'static str {
        "handler-attribute"
    }

    fn locator(&self, page: u32) -> Locator {
        Locator::css(format!("a[onclick*=\"fn_paging('{page}')\"]"))
    }
}

/// Anchor labeled with the page number itself.
struct LabelText;

impl PageLookup for LabelText {
    fn name(&self) -> &'static str {
        "label-text"
    }

    fn locator(&self, page: u32) -> Locator {
        Locator::text("a", page.to_string())
    }
}

/// Lookup strategies in preference order.
pub fn default_lookups() -> Vec<Box<dyn PageLookup>> {
    vec![
        Box::new(StructuralPath),
        Box::new(HandlerAttribute),
        Box::new(LabelText),
    ]
}

/// Drives the pager one confirmed page at a time.
pub struct PageNavigator {
    lookups: Vec<Box<dyn PageLookup>>,
    detector: FingerprintDetector,
    confirm_timeout: Duration,
    poll_interval: Duration,
    last_fingerprint: Option<String>,
}

impl PageNavigator {
    pub fn new(
        detector: FingerprintDetector,
        confirm_timeout: Duration,
        poll_interval: Duration,
    ) -> Self {
        Self {
            lookups: default_lookups(),
            detector,
            confirm_timeout,
            poll_interval,
            last_fingerprint: None,
        }
    }

    pub fn last_fingerprint(&self) -> Option<&str> {
        self.last_fingerprint.as_deref()
    }

    /// Wait for the first page to render and record its fingerprint.
    /// `None` means the grid never produced content within the timeout.
    pub async fn settle_first_page(&mut self, surface: &dyn RenderSurface) -> Option<String> {
        let fingerprint = self.await_change(surface).await?;
        self.last_fingerprint = Some(fingerprint.clone());
        Some(fingerprint)
    }

    /// Attempt the transition to `target`, confirming via fingerprint
    /// change. Direct click first; one scripted retry before giving up.
    pub async fn advance(&mut self, surface: &dyn RenderSurface, target: u32) -> Result<NavOutcome> {
        let Some(locator) = self.find_control(surface, target).await? else {
            return Ok(NavOutcome::ControlNotFound);
        };

        let clicked = match surface.click(&locator).await {
            Ok(clicked) => clicked,
            Err(e) => {
                warn!("direct click on {locator} failed: {e}");
                false
            }
        };
        if !clicked {
            let _ = surface.invoke(&locator).await?;
        }

        if let Some(fingerprint) = self.await_change(surface).await {
            self.last_fingerprint = Some(fingerprint.clone());
            return Ok(NavOutcome::Advanced(fingerprint));
        }

        debug!(page = target, "fingerprint unchanged, retrying via scripted invocation");
        let _ = surface.invoke(&locator).await?;

        if let Some(fingerprint) = self.await_change(surface).await {
            self.last_fingerprint = Some(fingerprint.clone());
            return Ok(NavOutcome::Advanced(fingerprint));
        }

        Ok(NavOutcome::NoChange)
    }

    async fn find_control(
        &self,
        surface: &dyn RenderSurface,
        target: u32,
    ) -> Result<Option<Locator>> {
        for lookup in &self.lookups {
            let locator = lookup.locator(target);
            if surface.exists(&locator).await? {
                debug!(strategy = lookup.name(), %locator, "pagination control located");
                return Ok(Some(locator));
            }
        }
        Ok(None)
    }

    /// Poll until the detector reports a fingerprint different from the last
    /// committed one. Detector errors count as "not yet".
    async fn await_change(&self, surface: &dyn RenderSurface) -> Option<String> {
        let detector = &self.detector;
        let previous = self.last_fingerprint.clone();
        poll_until(self.confirm_timeout, self.poll_interval, move || {
            let previous = previous.clone();
            async move {
                match detector.detect(surface).await {
                    Ok(Some(fingerprint)) if previous.as_deref() != Some(fingerprint.as_str()) => {
                        Some(fingerprint)
                    }
                    Ok(_) => None,
                    Err(e) => {
                        debug!("fingerprint probe failed: {e}");
                        None
                    }
                }
            }
        })
        .await
    }
}
