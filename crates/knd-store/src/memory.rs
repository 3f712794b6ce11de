//! In-process record store, used when no database path is configured and in tests.

use std::sync::{Mutex, MutexGuard};

use chrono::{SubsecRound, Utc};
use knd_core::{InspectionRecord, InspectorRef, NewInspection, RegistryStatus};
use tracing::debug;

use crate::{RecordStore, StoreError, UniqueField};

#[derive(Default)]
struct Inner {
    next_id: i64,
    records: Vec<InspectionRecord>,
}

/// Vector-backed store with the same uniqueness rules as the DuckDB store.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>, StoreError> {
        self.inner
            .lock()
            .map_err(|e| StoreError::Other(format!("mutex poisoned: {e}")))
    }
}

#[async_trait::async_trait]
impl RecordStore for MemoryStore {
    async fn insert(&self, new: NewInspection) -> Result<InspectionRecord, StoreError> {
        let mut inner = self.lock()?;
        if inner.records.iter().any(|r| r.registry_url == new.registry_url) {
            return Err(StoreError::Duplicate(UniqueField::RegistryUrl));
        }
        if let Some(number) = &new.inspection_number
            && inner
                .records
                .iter()
                .any(|r| r.inspection_number.as_ref() == Some(number))
        {
            return Err(StoreError::Duplicate(UniqueField::InspectionNumber));
        }

        inner.next_id += 1;
        let record = new.into_record(inner.next_id, Utc::now().trunc_subsecs(6));
        debug!(id = record.id, url = %record.registry_url, "inserted record");
        inner.records.push(record.clone());
        Ok(record)
    }

    async fn get(&self, id: i64) -> Result<Option<InspectionRecord>, StoreError> {
        let inner = self.lock()?;
        Ok(inner.records.iter().find(|r| r.id == id).cloned())
    }

    async fn find_by_number(
        &self,
        number: &str,
    ) -> Result<Option<InspectionRecord>, StoreError> {
        let inner = self.lock()?;
        Ok(inner
            .records
            .iter()
            .find(|r| r.inspection_number.as_deref() == Some(number))
            .cloned())
    }

    async fn find_by_url(&self, url: &str) -> Result<Option<InspectionRecord>, StoreError> {
        let inner = self.lock()?;
        Ok(inner.records.iter().find(|r| r.registry_url == url).cloned())
    }

    async fn update_status(
        &self,
        id: i64,
        status: &RegistryStatus,
        inspector: Option<&InspectorRef>,
    ) -> Result<InspectionRecord, StoreError> {
        let mut inner = self.lock()?;
        let record = inner
            .records
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or(StoreError::NotFound(id))?;
        record.status = Some(status.clone());
        record.inspector_ref = inspector.cloned();
        Ok(record.clone())
    }

    async fn list(&self) -> Result<Vec<InspectionRecord>, StoreError> {
        let inner = self.lock()?;
        let mut records = inner.records.clone();
        records.sort_by(|a, b| {
            a.created
                .cmp(&b.created)
                .then_with(|| a.inspection_number.cmp(&b.inspection_number))
        });
        Ok(records)
    }
}
