use std::path::PathBuf;
use std::time::Duration;

/// Desktop Chrome on Windows, as the registry portal expects.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

/// Settings for a registry scrape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScraperConfig {
    /// Upper bound on page navigation, including waiting for the page to settle.
    pub nav_timeout: Duration,
    /// Upper bound on locating a single field's value.
    pub field_timeout: Duration,
    pub user_agent: String,
    /// Viewport width and height in CSS pixels.
    pub viewport: (u32, u32),
    /// Chrome/Chromium binary; `None` lets the launcher search the usual locations.
    pub chrome_executable: Option<PathBuf>,
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            nav_timeout: Duration::from_secs(30),
            field_timeout: Duration::from_secs(3),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            viewport: (1280, 1024),
            chrome_executable: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_registry_expectations() {
        let cfg = ScraperConfig::default();
        assert_eq!(cfg.nav_timeout, Duration::from_secs(30));
        assert_eq!(cfg.field_timeout, Duration::from_secs(3));
        assert_eq!(cfg.viewport, (1280, 1024));
        assert!(cfg.user_agent.contains("Chrome/91.0.4472.124"));
        assert!(cfg.chrome_executable.is_none());
    }
}
