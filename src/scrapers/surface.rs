//! Rendering-surface abstraction.
//!
//! The portal renders its grid behind client-side script, so every component
//! that touches it (navigator, export capturer, fingerprint detector) takes
//! an explicit surface handle rather than reaching for ambient browser
//! state. The production implementation wraps a Chromium page (see
//! `scrapers::browser`); tests script an in-memory fake.

use anyhow::Result;
use async_trait::async_trait;

/// How to address an element on the rendered page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Locator {
    /// CSS selector path.
    Css(String),
    /// Element of `tag` whose trimmed text equals `label`.
    Text { tag: String, label: String },
}

impl Locator {
    pub fn css(selector: impl Into<String>) -> Self {
        Locator::Css(selector.into())
    }

    pub fn text(tag: impl Into<String>, label: impl Into<String>) -> Self {
        Locator::Text {
            tag: tag.into(),
            label: label.into(),
        }
    }
}

impl std::fmt::Display for Locator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Locator::Css(selector) => write!(f, "css({selector})"),
            Locator::Text { tag, label } => write!(f, "text({tag}={label:?})"),
        }
    }
}

/// A controllable rendering surface.
///
/// Lookup methods answer "not there" with `Ok(false)` / `Ok(None)` rather
/// than an error: callers poll, and an element that has not rendered yet is
/// an expected state, not a failure.
#[async_trait]
pub trait RenderSurface: Send + Sync {
    /// Navigate to a URL and wait for the initial load to settle.
    async fn goto(&self, url: &str) -> Result<()>;

    /// Whether the element addressed by `locator` currently exists.
    async fn exists(&self, locator: &Locator) -> Result<bool>;

    /// Text content of the element, or `None` if it does not exist (yet).
    async fn read_text(&self, locator: &Locator) -> Result<Option<String>>;

    /// Full rendered text of the page, including content that the
    /// simplified element view does not expose.
    async fn full_text(&self) -> Result<String>;

    /// Click via a trusted input event. `Ok(false)` when the element is
    /// missing or not interactable.
    async fn click(&self, locator: &Locator) -> Result<bool>;

    /// Invoke the element's action from script. Fallback for when the
    /// direct click does not take.
    async fn invoke(&self, locator: &Locator) -> Result<bool>;

    /// Evaluate a script expression in the page context.
    async fn eval(&self, js: &str) -> Result<serde_json::Value>;
}
