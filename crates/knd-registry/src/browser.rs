//! Chromium-backed registry scraper.
//!
//! Every fetch launches its own headless browser with a throwaway profile
//! directory and tears it down before returning, whatever the outcome.

use std::path::Path;

use chromiumoxide::Page;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::page::{
    AddScriptToEvaluateOnNewDocumentParams, EventLifecycleEvent, SetLifecycleEventsEnabledParams,
};
use chromiumoxide::cdp::js_protocol::runtime::EvaluateParams;
use chromiumoxide::error::CdpError;
use chromiumoxide::handler::viewport::Viewport;
use futures::StreamExt;
use knd_core::FieldMap;
use tracing::{debug, info, warn};

use crate::{FieldLocator, Registry, ScrapeError, ScraperConfig, extract_fields};

const LAUNCH_ARGS: [&str; 3] = [
    "--disable-blink-features=AutomationControlled",
    "--disable-dev-shm-usage",
    "--no-sandbox",
];

/// Lifecycle event Chrome emits once a document has had no network activity for 500 ms.
const NETWORK_IDLE: &str = "networkIdle";

/// Runs before any page script: hide the automation flag the portal checks for.
const STEALTH_SCRIPT: &str = "delete Object.getPrototypeOf(navigator).webdriver;\n\
     window.navigator.chrome = { runtime: {} };";

pub struct BrowserRegistry {
    config: ScraperConfig,
}

impl BrowserRegistry {
    pub fn new(config: ScraperConfig) -> Self {
        Self { config }
    }

    fn browser_config(&self, profile: &Path) -> Result<BrowserConfig, ScrapeError> {
        let (width, height) = self.config.viewport;
        let mut builder = BrowserConfig::builder()
            .user_data_dir(profile)
            .window_size(width, height)
            .viewport(Viewport {
                width,
                height,
                ..Viewport::default()
            })
            .args(LAUNCH_ARGS)
            .request_timeout(self.config.nav_timeout);
        if let Some(exe) = &self.config.chrome_executable {
            builder = builder.chrome_executable(exe);
        }
        builder.build().map_err(ScrapeError::Fatal)
    }

    async fn scrape(&self, browser: &Browser, url: &str) -> Result<FieldMap, ScrapeError> {
        let page = browser.new_page("about:blank").await.map_err(cdp_error)?;
        page.set_user_agent(self.config.user_agent.as_str())
            .await
            .map_err(cdp_error)?;
        page.evaluate_on_new_document(AddScriptToEvaluateOnNewDocumentParams::new(STEALTH_SCRIPT))
            .await
            .map_err(cdp_error)?;

        page.execute(SetLifecycleEventsEnabledParams::new(true))
            .await
            .map_err(cdp_error)?;
        let main_frame = page.mainframe().await.map_err(cdp_error)?;
        let mut lifecycle = page
            .event_listener::<EventLifecycleEvent>()
            .await
            .map_err(cdp_error)?;

        debug!(url, "loading registry page");
        let navigation = async {
            page.goto(url).await.map_err(cdp_error)?;
            let mut watch = IdleWatch::new(main_frame.as_ref().map(|f| f.inner().clone()));
            while let Some(event) = lifecycle.next().await {
                if watch.observe(event.frame_id.inner(), event.loader_id.inner(), &event.name) {
                    return Ok(());
                }
            }
            Err(ScrapeError::Fatal("page closed before the network settled".into()))
        };
        match tokio::time::timeout(self.config.nav_timeout, navigation).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(e),
            Err(_) => {
                warn!(url, timeout_secs = self.config.nav_timeout.as_secs(), "registry page load timed out");
                return Err(ScrapeError::Timeout);
            }
        }

        let fields = extract_fields(&PageLocator { page: &page }, self.config.field_timeout).await;
        debug!(url, missing = fields.missing().len(), "registry fields read");

        if let Err(e) = page.close().await {
            debug!(error = %e, "failed to close page");
        }
        Ok(fields)
    }
}

#[async_trait::async_trait]
impl Registry for BrowserRegistry {
    async fn fetch(&self, url: &str) -> Result<FieldMap, ScrapeError> {
        let profile = tempfile::Builder::new()
            .prefix("knd-chrome-")
            .tempdir()
            .map_err(|e| ScrapeError::Fatal(format!("creating browser profile: {e}")))?;

        let (mut browser, mut handler) = Browser::launch(self.browser_config(profile.path())?)
            .await
            .map_err(cdp_error)?;
        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });
        info!(url, "browser launched");

        let result = self.scrape(&browser, url).await;

        if let Err(e) = browser.close().await {
            warn!(error = %e, "failed to close browser");
        }
        if let Err(e) = browser.wait().await {
            debug!(error = %e, "browser process wait failed");
        }
        handler_task.abort();
        let _ = handler_task.await;
        if let Err(e) = profile.close() {
            warn!(error = %e, "failed to remove browser profile");
        }

        match &result {
            Ok(fields) => info!(url, fields = fields.len(), "registry scrape finished"),
            Err(e) => warn!(url, error = %e, "registry scrape failed"),
        }
        result
    }
}

/// Tracks lifecycle events of the main frame until the document loaded by
/// the navigation reports network idle.
///
/// Events from the previous document are ignored: a loader only counts once
/// its `init` event has been seen.
struct IdleWatch {
    frame: Option<String>,
    loader: Option<String>,
}

impl IdleWatch {
    fn new(frame: Option<String>) -> Self {
        Self { frame, loader: None }
    }

    fn observe(&mut self, frame: &str, loader: &str, name: &str) -> bool {
        if self.frame.as_deref().is_some_and(|f| f != frame) {
            return false;
        }
        match name {
            "init" => {
                self.loader = Some(loader.to_string());
                false
            }
            NETWORK_IDLE => self.loader.as_deref() == Some(loader),
            _ => false,
        }
    }
}

struct PageLocator<'a> {
    page: &'a Page,
}

#[async_trait::async_trait]
impl FieldLocator for PageLocator<'_> {
    async fn locate(&self, caption: &str) -> Result<Option<String>, ScrapeError> {
        let caption = serde_json::to_string(caption)
            .map_err(|e| ScrapeError::Fatal(format!("encoding caption: {e}")))?;
        let params = EvaluateParams::builder()
            .expression(locate_script(&caption))
            .return_by_value(true)
            .build()
            .map_err(ScrapeError::Fatal)?;
        let encoded: String = self
            .page
            .evaluate_expression(params)
            .await
            .map_err(cdp_error)?
            .into_value()
            .map_err(|e| ScrapeError::Fatal(format!("reading field value: {e}")))?;
        serde_json::from_str(&encoded)
            .map_err(|e| ScrapeError::Fatal(format!("reading field value: {e}")))
    }
}

/// Expression yielding the JSON-encoded value text for a caption, or `"null"`.
///
/// `caption_json` must already be a JSON string literal.
fn locate_script(caption_json: &str) -> String {
    format!(
        r#"(() => {{
    const caption = {caption_json};
    for (const row of document.querySelectorAll('div[class*="_Row_"]')) {{
        const label = row.querySelector('div[class*="_ColText_"]');
        if (!label || !label.textContent.includes(caption)) continue;
        const value = row.querySelector('div[class*="_ColValue_"]');
        if (value) return JSON.stringify(value.textContent);
    }}
    return JSON.stringify(null);
}})()"#
    )
}

fn cdp_error(e: CdpError) -> ScrapeError {
    match e {
        CdpError::Timeout => ScrapeError::Timeout,
        other => ScrapeError::Fatal(other.to_string()),
    }
}
