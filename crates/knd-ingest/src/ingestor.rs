use std::any::Any;
use std::future::Future;
use std::path::{Path, PathBuf};

use knd_core::{InspectionRecord, InspectorRef, RegistryStatus, ScrapedInspection, check_upload};
use knd_qr::ImageGuard;
use knd_registry::Registry;
use knd_store::RecordStore;
use tracing::{debug, info, warn};

use crate::{Conflict, IngestError};

/// Result of re-checking a stored inspection against the registry.
#[derive(Debug, Clone, PartialEq)]
pub enum UpdateOutcome {
    /// The registry status matches the stored one; nothing was written.
    Unchanged(InspectionRecord),
    Updated {
        previous: Option<RegistryStatus>,
        record: InspectionRecord,
    },
}

impl UpdateOutcome {
    pub fn record(&self) -> &InspectionRecord {
        match self {
            Self::Unchanged(record) | Self::Updated { record, .. } => record,
        }
    }

    pub fn is_updated(&self) -> bool {
        matches!(self, Self::Updated { .. })
    }
}

/// Create and update inspection records from registry pages.
pub struct Ingestor<S, R> {
    store: S,
    registry: R,
}

impl<S: RecordStore, R: Registry> Ingestor<S, R> {
    pub fn new(store: S, registry: R) -> Self {
        Self { store, registry }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Fetch and normalise the registry page at `url`.
    pub async fn scrape(&self, url: &str) -> Result<ScrapedInspection, IngestError> {
        let fields = self.registry.fetch(url).await?;
        let missing = fields.missing();
        if !missing.is_empty() {
            debug!(url, ?missing, "registry fields not found");
        }
        let scraped = ScrapedInspection::from_fields(&fields);
        for key in &scraped.malformed {
            warn!(url, field = key.as_str(), "unparsable registry value stored as empty");
        }
        Ok(scraped)
    }

    /// Record a new inspection from its registry page.
    ///
    /// Completed inspections and numbers already on file are refused before
    /// anything is written.
    pub async fn create(
        &self,
        url: &str,
        inspector: Option<&InspectorRef>,
    ) -> Result<InspectionRecord, IngestError> {
        info!(url, "ingesting inspection");
        let scraped = self.scrape(url).await?;

        if scraped.is_completed() {
            warn!(url, "inspection already completed, not recording");
            return Err(IngestError::Conflict(Conflict::Completed));
        }
        if let Some(number) = &scraped.inspection_number
            && self.store.find_by_number(number).await?.is_some()
        {
            warn!(url, number = %number, "inspection number already on file");
            return Err(IngestError::Conflict(Conflict::DuplicateNumber));
        }

        let record = self
            .store
            .insert(scraped.into_new(url.to_string(), inspector.cloned()))
            .await?;
        info!(
            id = record.id,
            number = record.inspection_number.as_deref().unwrap_or("-"),
            "inspection recorded"
        );
        Ok(record)
    }

    /// Re-scrape a stored inspection and record a status change, if any.
    ///
    /// Only `status` and `inspector_ref` are ever written. A page whose status
    /// cannot be read leaves the record as it is.
    pub async fn update(
        &self,
        id: i64,
        inspector: Option<&InspectorRef>,
    ) -> Result<UpdateOutcome, IngestError> {
        let current = self.store.get(id).await?.ok_or(IngestError::NotFound(id))?;
        let scraped = self.scrape(&current.registry_url).await?;

        let Some(fresh) = scraped.status else {
            info!(id, "status not found on registry page, no changes detected");
            return Ok(UpdateOutcome::Unchanged(current));
        };
        if current.status.as_ref() == Some(&fresh) {
            info!(id, status = %fresh, "no changes detected");
            return Ok(UpdateOutcome::Unchanged(current));
        }

        let record = self.store.update_status(id, &fresh, inspector).await?;
        info!(
            id,
            from = current.status.as_ref().map_or("-", RegistryStatus::as_str),
            to = %fresh,
            "status updated"
        );
        Ok(UpdateOutcome::Updated {
            previous: current.status,
            record,
        })
    }

    /// Decode the QR photo at `path` and record the inspection it links to.
    ///
    /// The file at `path` is consumed: it is deleted on every outcome.
    pub async fn ingest_image(
        &self,
        path: &Path,
        inspector: Option<&InspectorRef>,
    ) -> Result<InspectionRecord, IngestError> {
        if let Err(e) = check_upload(path) {
            drop(ImageGuard::new(path));
            warn!(path = %path.display(), error = %e, "upload rejected");
            return Err(e.into());
        }

        let owned: PathBuf = path.to_path_buf();
        let url = tokio::task::spawn_blocking(move || knd_qr::extract(&owned))
            .await
            .map_err(|e| IngestError::Processing(format!("QR decode task failed: {e}")))??;

        self.create(&url, inspector).await
    }
}

/// Run one ingestion on its own task so that a panic inside it is reported
/// as [`IngestError::Processing`] instead of unwinding into the caller.
pub async fn run_isolated<F, T>(run: F) -> Result<T, IngestError>
where
    F: Future<Output = Result<T, IngestError>> + Send + 'static,
    T: Send + 'static,
{
    match tokio::spawn(run).await {
        Ok(result) => result,
        Err(e) if e.is_panic() => {
            let msg = panic_message(e.into_panic());
            warn!(panic = %msg, "ingestion panicked");
            Err(IngestError::Processing(format!("ingestion panicked: {msg}")))
        }
        Err(e) => Err(IngestError::Processing(format!("ingestion task failed: {e}"))),
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
