//! Portal-facing scraping components.

#[cfg(feature = "browser")]
pub mod browser;
pub mod export;
pub mod fingerprint;
pub mod navigator;
pub mod poll;
pub mod surface;

pub use export::{CaptureOutcome, ExportCapturer};
pub use fingerprint::FingerprintDetector;
pub use navigator::{NavOutcome, PageNavigator};
pub use surface::{Locator, RenderSurface};
