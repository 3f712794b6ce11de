use std::time::Duration;

use knd_core::{FieldMap, NOT_FOUND, REGISTRY_FIELDS};
use tracing::debug;

use crate::ScrapeError;

/// Delay between lookups while a field has not rendered yet.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Finds the value cell of a page row by its caption text.
#[async_trait::async_trait]
pub trait FieldLocator: Send + Sync {
    /// Text of the value in the first row whose caption contains `caption`,
    /// or `None` if no such row is rendered yet.
    async fn locate(&self, caption: &str) -> Result<Option<String>, ScrapeError>;
}

/// Read all registry fields from a loaded page.
///
/// Each field gets `field_timeout` to appear. A field that does not appear in
/// time, or whose lookup fails, is recorded as `"Не найдено"`; the other fields
/// are unaffected.
pub async fn extract_fields<L>(locator: &L, field_timeout: Duration) -> FieldMap
where
    L: FieldLocator + ?Sized,
{
    let mut fields = FieldMap::new();
    for field in &REGISTRY_FIELDS {
        let value = match tokio::time::timeout(field_timeout, poll(locator, field.caption)).await {
            Ok(Ok(text)) => {
                debug!(field = field.label, "field located");
                text
            }
            Ok(Err(e)) => {
                debug!(field = field.label, error = %e, "field lookup failed");
                NOT_FOUND.to_string()
            }
            Err(_) => {
                debug!(field = field.label, timeout_ms = field_timeout.as_millis() as u64, "field not found");
                NOT_FOUND.to_string()
            }
        };
        fields.insert(field.label, value);
    }
    fields
}

async fn poll<L>(locator: &L, caption: &str) -> Result<String, ScrapeError>
where
    L: FieldLocator + ?Sized,
{
    loop {
        if let Some(text) = locator.locate(caption).await? {
            return Ok(text.trim().to_string());
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use tokio::time::Instant;

    enum Cell {
        /// Rendered after this many empty lookups.
        After(usize, &'static str),
        Never,
        Broken,
    }

    struct FakePage {
        cells: HashMap<&'static str, Cell>,
        lookups: Mutex<HashMap<String, usize>>,
    }

    impl FakePage {
        fn new(cells: Vec<(&'static str, Cell)>) -> Self {
            Self {
                cells: cells.into_iter().collect(),
                lookups: Mutex::new(HashMap::new()),
            }
        }

        fn lookups(&self, caption: &str) -> usize {
            self.lookups.lock().unwrap().get(caption).copied().unwrap_or(0)
        }
    }

    #[async_trait::async_trait]
    impl FieldLocator for FakePage {
        async fn locate(&self, caption: &str) -> Result<Option<String>, ScrapeError> {
            let seen = {
                let mut lookups = self.lookups.lock().unwrap();
                let n = lookups.entry(caption.to_string()).or_insert(0);
                *n += 1;
                *n - 1
            };
            match self.cells.get(caption) {
                Some(Cell::After(n, text)) if seen >= *n => Ok(Some(text.to_string())),
                Some(Cell::Broken) => Err(ScrapeError::Fatal("detached node".into())),
                _ => Ok(None),
            }
        }
    }

    fn full_page() -> Vec<(&'static str, Cell)> {
        vec![
            ("Учетный номер КНМ в соответствии", Cell::After(0, " 77240061000107500000 ")),
            ("Статус КНМ", Cell::After(0, "В процессе")),
            ("Дата регистрации в ФГИС ЕРКНМ", Cell::After(0, "05.09.2024 13:30")),
            ("Дата начала КНМ", Cell::After(0, "05.09.2024")),
            ("Дата окончания КНМ", Cell::After(0, "18.09.2024")),
            ("Адрес", Cell::After(0, "г. Казань, ул. Баумана, д. 1")),
        ]
    }

    #[tokio::test(start_paused = true)]
    async fn all_fields_present_are_trimmed() {
        let page = FakePage::new(full_page());
        let fields = extract_fields(&page, Duration::from_secs(3)).await;

        assert_eq!(fields.len(), 6);
        assert_eq!(fields.get("Номер КНМ"), Some("77240061000107500000"));
        assert_eq!(fields.get("Статус КНМ"), Some("В процессе"));
        assert_eq!(fields.get("Адрес"), Some("г. Казань, ул. Баумана, д. 1"));
        assert!(fields.missing().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn late_rendering_field_is_polled_until_found() {
        let mut cells = full_page();
        cells[1] = ("Статус КНМ", Cell::After(5, "Завершено"));
        let page = FakePage::new(cells);

        let fields = extract_fields(&page, Duration::from_secs(3)).await;
        assert_eq!(fields.get("Статус КНМ"), Some("Завершено"));
        assert_eq!(page.lookups("Статус КНМ"), 6);
    }

    #[tokio::test(start_paused = true)]
    async fn timed_out_fields_get_sentinel_and_others_survive() {
        let mut cells = full_page();
        cells[2] = ("Дата регистрации в ФГИС ЕРКНМ", Cell::Never);
        cells[5] = ("Адрес", Cell::Never);
        let page = FakePage::new(cells);

        let start = Instant::now();
        let fields = extract_fields(&page, Duration::from_secs(3)).await;
        let elapsed = start.elapsed();

        assert_eq!(fields.len(), 6);
        assert_eq!(fields.get("Дата регистрации"), Some(NOT_FOUND));
        assert_eq!(fields.get("Адрес"), Some(NOT_FOUND));
        assert_eq!(fields.get("Номер КНМ"), Some("77240061000107500000"));
        assert_eq!(fields.get("Дата окончания"), Some("18.09.2024"));
        assert_eq!(fields.missing(), vec!["Адрес", "Дата регистрации"]);

        // Each missing field costs one timeout, no more.
        assert!(elapsed >= Duration::from_secs(6));
        assert!(elapsed < Duration::from_secs(7));
    }

    #[tokio::test(start_paused = true)]
    async fn failing_lookup_degrades_to_sentinel() {
        let mut cells = full_page();
        cells[0] = ("Учетный номер КНМ в соответствии", Cell::Broken);
        let page = FakePage::new(cells);

        let fields = extract_fields(&page, Duration::from_secs(3)).await;
        assert_eq!(fields.get("Номер КНМ"), Some(NOT_FOUND));
        assert_eq!(fields.get("Статус КНМ"), Some("В процессе"));
        assert_eq!(page.lookups("Учетный номер КНМ в соответствии"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn empty_page_yields_all_sentinels() {
        let page = FakePage::new(Vec::new());
        let fields = extract_fields(&page, Duration::from_millis(250)).await;
        assert_eq!(fields.len(), 6);
        assert!(fields.iter().all(|(_, v)| v == NOT_FOUND));
    }
}
