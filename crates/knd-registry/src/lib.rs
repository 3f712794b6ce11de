//! Registry scraping: turns an ERKNM public page into a label → raw text field map.
//!
//! The per-field lookup is written against [`FieldLocator`] so that the
//! soft-failure rules can be exercised without a browser. The Chromium-backed
//! [`BrowserRegistry`] lives behind the `browser` feature.

mod config;
mod locate;

#[cfg(feature = "browser")]
mod browser;

pub use config::ScraperConfig;
pub use locate::{FieldLocator, extract_fields};

#[cfg(feature = "browser")]
pub use browser::BrowserRegistry;

use knd_core::FieldMap;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScrapeError {
    #[error("timed out loading the registry page")]
    Timeout,
    #[error("registry scrape failed: {0}")]
    Fatal(String),
}

/// Source of raw registry fields for one inspection page.
#[async_trait::async_trait]
pub trait Registry: Send + Sync {
    /// Fetch the six registry fields for `url`.
    ///
    /// Fields that could not be located are present with the `"Не найдено"`
    /// sentinel; only page-level failures are errors.
    async fn fetch(&self, url: &str) -> Result<FieldMap, ScrapeError>;
}

#[async_trait::async_trait]
impl<R: Registry + ?Sized> Registry for std::sync::Arc<R> {
    async fn fetch(&self, url: &str) -> Result<FieldMap, ScrapeError> {
        (**self).fetch(url).await
    }
}
