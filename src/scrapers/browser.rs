//! Chromium-backed rendering surface.
//!
//! The portal draws its grid entirely from client-side script, so the
//! production surface is a headless Chromium page driven over CDP. Downloads
//! are routed into the watched export directory at session start.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::browser::{
    SetDownloadBehaviorBehavior, SetDownloadBehaviorParams,
};
use chromiumoxide::{Browser, BrowserConfig, Page};
use futures::StreamExt;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::config::BrowserSettings;
use crate::scrapers::surface::{Locator, RenderSurface};

/// Common Chrome executable paths to check.
const CHROME_PATHS: &[&str] = &[
    // Linux
    "/usr/bin/google-chrome",
    "/usr/bin/google-chrome-stable",
    "/usr/bin/chromium",
    "/usr/bin/chromium-browser",
    "/snap/bin/chromium",
    // macOS
    "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
    "/Applications/Chromium.app/Contents/MacOS/Chromium",
    // Common install locations
    "/opt/google/chrome/google-chrome",
];

/// Resolves document.readyState once the DOM is usable, with its own
/// fallback so the promise cannot hang forever.
const WAIT_FOR_READY_SCRIPT: &str = r#"
    new Promise((resolve) => {
        if (document.readyState === 'complete' || document.readyState === 'interactive') {
            resolve(document.readyState);
        } else {
            document.addEventListener('DOMContentLoaded', () => resolve(document.readyState));
            setTimeout(() => resolve('timeout'), 10000);
        }
    })
"#;

/// An owned browser process plus its CDP event loop.
pub struct BrowserSession {
    browser: Browser,
    handler_task: JoinHandle<()>,
}

impl BrowserSession {
    /// Launch Chromium and open the single page the run drives, with
    /// downloads redirected into `download_dir`.
    pub async fn launch(
        settings: &BrowserSettings,
        download_dir: &Path,
    ) -> Result<(Self, CdpSurface)> {
        let chrome_path = find_chrome()?;
        info!("launching browser (headless={})", settings.headless);

        let mut builder = BrowserConfig::builder().chrome_executable(chrome_path);

        // with_head means NOT headless, confusingly
        if !settings.headless {
            builder = builder.with_head();
        }

        builder = builder
            .arg("--disable-blink-features=AutomationControlled")
            .arg("--disable-dev-shm-usage")
            .arg("--no-first-run")
            .arg("--no-default-browser-check")
            .arg("--no-sandbox") // Often needed for headless in containers/restricted environments
            .arg("--disable-gpu");

        for arg in &settings.chrome_args {
            builder = builder.arg(arg);
        }

        let config = builder
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to build browser config: {}", e))?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .context("Failed to launch browser")?;

        // Spawn handler task
        let handler_task = tokio::spawn(async move {
            while let Some(h) = handler.next().await {
                if h.is_err() {
                    break;
                }
            }
        });

        let page = browser.new_page("about:blank").await?;

        let params = SetDownloadBehaviorParams::builder()
            .behavior(SetDownloadBehaviorBehavior::Allow)
            .download_path(download_dir.to_string_lossy().into_owned())
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to build download behavior: {}", e))?;
        page.execute(params)
            .await
            .context("Failed to route downloads into the export directory")?;

        let surface = CdpSurface {
            page,
            load_timeout: settings.load_timeout(),
        };

        Ok((
            Self {
                browser,
                handler_task,
            },
            surface,
        ))
    }

    /// Shut the browser down and stop the event loop.
    pub async fn close(mut self) {
        let _ = self.browser.close().await;
        let _ = self.browser.wait().await;
        self.handler_task.abort();
    }
}

/// Find Chrome executable.
fn find_chrome() -> Result<PathBuf> {
    for path in CHROME_PATHS {
        let p = Path::new(path);
        if p.exists() {
            info!("Found Chrome at: {}", path);
            return Ok(p.to_path_buf());
        }
    }

    for cmd in &[
        "google-chrome",
        "google-chrome-stable",
        "chromium",
        "chromium-browser",
    ] {
        if let Ok(output) = std::process::Command::new("which").arg(cmd).output() {
            if output.status.success() {
                let path = String::from_utf8_lossy(&output.stdout).trim().to_string();
                if !path.is_empty() {
                    info!("Found Chrome in PATH: {}", path);
                    return Ok(PathBuf::from(path));
                }
            }
        }
    }

    Err(anyhow::anyhow!(
        "Chrome/Chromium not found. Please install it:\n\
         - Arch/Manjaro: sudo pacman -S chromium\n\
         - Ubuntu/Debian: sudo apt install chromium-browser\n\
         - Fedora: sudo dnf install chromium\n\
         - Or download from: https://www.google.com/chrome/"
    ))
}

/// [`RenderSurface`] over a live CDP page.
pub struct CdpSurface {
    page: Page,
    load_timeout: Duration,
}

impl CdpSurface {
    async fn eval_value(&self, js: String) -> Result<serde_json::Value> {
        let result = self.page.evaluate(js).await?;
        Ok(result
            .into_value::<serde_json::Value>()
            .unwrap_or(serde_json::Value::Null))
    }
}

#[async_trait]
impl RenderSurface for CdpSurface {
    async fn goto(&self, url: &str) -> Result<()> {
        info!("Navigating to {}", url);
        self.page.goto(url).await.context("navigation failed")?;

        // Wait for the DOM instead of a fixed timeout; the grid itself is
        // confirmed later by fingerprint polling.
        match tokio::time::timeout(
            self.load_timeout,
            self.page.evaluate(WAIT_FOR_READY_SCRIPT.to_string()),
        )
        .await
        {
            Ok(Ok(result)) => {
                let state: String = result
                    .into_value()
                    .unwrap_or_else(|_| "unknown".to_string());
                debug!("Page ready state: {}", state);
            }
            Ok(Err(e)) => {
                debug!("Could not check ready state: {}", e);
            }
            Err(_) => {
                warn!("Timeout waiting for page ready state");
            }
        }

        // Small additional delay for any late-loading scripts
        sleep(Duration::from_millis(500)).await;

        Ok(())
    }

    async fn exists(&self, locator: &Locator) -> Result<bool> {
        match locator {
            Locator::Css(selector) => Ok(self.page.find_element(selector.as_str()).await.is_ok()),
            Locator::Text { tag, label } => {
                let value = self.eval_value(text_probe_js(tag, label)).await?;
                Ok(value.as_bool().unwrap_or(false))
            }
        }
    }

    async fn read_text(&self, locator: &Locator) -> Result<Option<String>> {
        match locator {
            Locator::Css(selector) => {
                let Ok(element) = self.page.find_element(selector.as_str()).await else {
                    return Ok(None);
                };
                Ok(element.inner_text().await?)
            }
            Locator::Text { tag, label } => {
                let value = self.eval_value(text_read_js(tag, label)).await?;
                Ok(value.as_str().map(|s| s.to_string()))
            }
        }
    }

    async fn full_text(&self) -> Result<String> {
        let value = self
            .eval_value("document.body ? document.body.innerText : ''".to_string())
            .await?;
        if let Some(text) = value.as_str() {
            return Ok(text.to_string());
        }
        Ok(self.page.content().await?)
    }

    async fn click(&self, locator: &Locator) -> Result<bool> {
        match locator {
            Locator::Css(selector) => {
                let Ok(element) = self.page.find_element(selector.as_str()).await else {
                    return Ok(false);
                };
                match element.click().await {
                    Ok(_) => Ok(true),
                    Err(e) => {
                        debug!("click on {} did not take: {}", selector, e);
                        Ok(false)
                    }
                }
            }
            // No element handle for a text match; the scripted click is the
            // only interaction path.
            Locator::Text { .. } => self.invoke(locator).await,
        }
    }

    async fn invoke(&self, locator: &Locator) -> Result<bool> {
        let js = match locator {
            Locator::Css(selector) => css_click_js(selector),
            Locator::Text { tag, label } => text_click_js(tag, label),
        };
        let value = self.eval_value(js).await?;
        Ok(value.as_bool().unwrap_or(false))
    }

    async fn eval(&self, js: &str) -> Result<serde_json::Value> {
        self.eval_value(js.to_string()).await
    }
}

fn quoted(s: &str) -> String {
    serde_json::to_string(s).unwrap_or_else(|_| "\"\"".to_string())
}

fn css_click_js(selector: &str) -> String {
    let sel = quoted(selector);
    format!(
        "(function() {{ const el = document.querySelector({sel}); \
         if (!el) return false; el.click(); return true; }})()"
    )
}

fn text_find_js(tag: &str, label: &str, body: &str) -> String {
    let tag = quoted(tag);
    let label = quoted(label);
    format!(
        "(function() {{ const want = {label}; \
         for (const el of document.getElementsByTagName({tag})) {{ \
         if ((el.textContent || '').trim() === want) {{ {body} }} }} \
         return null; }})()"
    )
}

fn text_probe_js(tag: &str, label: &str) -> String {
    text_find_js(tag, label, "return true;")
}

fn text_read_js(tag: &str, label: &str) -> String {
    text_find_js(tag, label, "return (el.textContent || '').trim();")
}

fn text_click_js(tag: &str, label: &str) -> String {
    text_find_js(tag, label, "el.click(); return true;")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_click_snippet_quotes_label() {
        let js = text_click_js("a", "2");
        assert!(js.contains("\"a\""));
        assert!(js.contains("const want = \"2\""));
        assert!(js.contains("el.click()"));
    }

    #[test]
    fn css_click_snippet_escapes_selector() {
        let js = css_click_js("a[onclick*=\"fn_paging('2')\"]");
        assert!(js.contains("querySelector(\"a[onclick*=\\\"fn_paging('2')\\\"]\")"));
    }
}
