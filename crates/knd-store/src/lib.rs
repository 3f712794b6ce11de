//! Storage layer for inspection records: DuckDB (persistent or in-memory) and a plain in-memory store.
//!
//! Both stores enforce uniqueness of `registry_url` and `inspection_number`
//! themselves; callers may pre-check, but the store's answer is final.

mod error;
mod memory;

pub use error::{StoreError, UniqueField};
pub use memory::MemoryStore;

#[cfg(feature = "duckdb")]
mod duck;
#[cfg(feature = "duckdb")]
pub use duck::DuckStore;

use std::sync::Arc;

use knd_core::{InspectionRecord, InspectorRef, NewInspection, RegistryStatus};

/// Operations the ingestion pipeline needs from record storage.
#[async_trait::async_trait]
pub trait RecordStore: Send + Sync {
    /// Insert a new record, assigning `id` and `created`.
    ///
    /// Fails with [`StoreError::Duplicate`] when `registry_url` or a present
    /// `inspection_number` is already on file.
    async fn insert(&self, new: NewInspection) -> Result<InspectionRecord, StoreError>;

    async fn get(&self, id: i64) -> Result<Option<InspectionRecord>, StoreError>;

    async fn find_by_number(&self, number: &str)
    -> Result<Option<InspectionRecord>, StoreError>;

    async fn find_by_url(&self, url: &str) -> Result<Option<InspectionRecord>, StoreError>;

    /// Overwrite `status` and `inspector_ref` only; every other column is left as is.
    async fn update_status(
        &self,
        id: i64,
        status: &RegistryStatus,
        inspector: Option<&InspectorRef>,
    ) -> Result<InspectionRecord, StoreError>;

    /// All records ordered by `created`, then `inspection_number`.
    async fn list(&self) -> Result<Vec<InspectionRecord>, StoreError>;
}

#[async_trait::async_trait]
impl<S: RecordStore + ?Sized> RecordStore for Arc<S> {
    async fn insert(&self, new: NewInspection) -> Result<InspectionRecord, StoreError> {
        (**self).insert(new).await
    }

    async fn get(&self, id: i64) -> Result<Option<InspectionRecord>, StoreError> {
        (**self).get(id).await
    }

    async fn find_by_number(
        &self,
        number: &str,
    ) -> Result<Option<InspectionRecord>, StoreError> {
        (**self).find_by_number(number).await
    }

    async fn find_by_url(&self, url: &str) -> Result<Option<InspectionRecord>, StoreError> {
        (**self).find_by_url(url).await
    }

    async fn update_status(
        &self,
        id: i64,
        status: &RegistryStatus,
        inspector: Option<&InspectorRef>,
    ) -> Result<InspectionRecord, StoreError> {
        (**self).update_status(id, status, inspector).await
    }

    async fn list(&self) -> Result<Vec<InspectionRecord>, StoreError> {
        (**self).list().await
    }
}
