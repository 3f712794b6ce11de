//! DuckDB storage for inspection records.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{NaiveDate, NaiveDateTime, SubsecRound, Utc};
use duckdb::{Connection, Params, Row, params};
use knd_core::{InspectionRecord, InspectorRef, NewInspection, RegistryStatus};
use tracing::{debug, info};

use crate::{RecordStore, StoreError, UniqueField};

const SCHEMA: &str = "
CREATE SEQUENCE IF NOT EXISTS inspections_id_seq START 1;
CREATE TABLE IF NOT EXISTS inspections (
    id                BIGINT PRIMARY KEY DEFAULT nextval('inspections_id_seq'),
    created           TIMESTAMP NOT NULL,
    registry_url      VARCHAR NOT NULL UNIQUE,
    inspection_number VARCHAR UNIQUE,
    status            VARCHAR,
    registered_at     TIMESTAMP,
    start_date        DATE,
    end_date          DATE,
    address           VARCHAR,
    departure_time    TIMESTAMP,
    inspector_ref     VARCHAR
);
";

const COLUMNS: &str = "id, created, registry_url, inspection_number, status, registered_at, \
                       start_date, end_date, address, departure_time, inspector_ref";

/// DuckDB store for inspection records.
///
/// One `inspections` table; `registry_url` and `inspection_number` carry
/// `UNIQUE` constraints, which are the authoritative duplicate guard when two
/// ingestions race past the orchestrator's pre-check.
///
/// Supports both in-memory (ephemeral) and persistent (file-backed) modes.
/// Use [`open`](Self::open) for in-memory and [`open_persistent`](Self::open_persistent)
/// for file-backed storage that survives across process restarts.
pub struct DuckStore {
    conn: Mutex<Connection>,
}

impl DuckStore {
    /// Open an in-memory DuckDB database.
    pub fn open() -> Result<Self, StoreError> {
        Self::init(Connection::open_in_memory()?)
    }

    /// Open or create a persistent DuckDB database at the given path.
    pub fn open_persistent(path: &Path) -> Result<Self, StoreError> {
        let store = Self::init(Connection::open(path)?)?;
        info!(path = %path.display(), "opened inspection store");
        Ok(store)
    }

    fn init(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn
            .lock()
            .map_err(|e| StoreError::Other(format!("mutex poisoned: {e}")))
    }

    fn select_one<P: Params>(
        &self,
        where_clause: &str,
        params: P,
    ) -> Result<Option<InspectionRecord>, StoreError> {
        let conn = self.conn()?;
        let sql = format!("SELECT {COLUMNS} FROM inspections WHERE {where_clause}");
        match conn.query_row(&sql, params, row_to_record) {
            Ok(record) => Ok(Some(record)),
            Err(duckdb::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait::async_trait]
impl RecordStore for DuckStore {
    async fn insert(&self, new: NewInspection) -> Result<InspectionRecord, StoreError> {
        let created = Utc::now().trunc_subsecs(6);
        let id: i64 = {
            let conn = self.conn()?;
            conn.query_row(
                "INSERT INTO inspections (created, registry_url, inspection_number, status, \
                 registered_at, start_date, end_date, address, inspector_ref) \
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?) RETURNING id",
                params![
                    created.naive_utc(),
                    new.registry_url,
                    new.inspection_number,
                    new.status.as_ref().map(RegistryStatus::as_str),
                    new.registered_at,
                    new.start_date,
                    new.end_date,
                    new.address,
                    new.inspector_ref.as_ref().map(InspectorRef::as_str),
                ],
                |row| row.get(0),
            )
            .map_err(map_constraint)?
        };
        debug!(id, url = %new.registry_url, "inserted record");
        Ok(new.into_record(id, created))
    }

    async fn get(&self, id: i64) -> Result<Option<InspectionRecord>, StoreError> {
        self.select_one("id = ?", params![id])
    }

    async fn find_by_number(
        &self,
        number: &str,
    ) -> Result<Option<InspectionRecord>, StoreError> {
        self.select_one("inspection_number = ?", params![number])
    }

    async fn find_by_url(&self, url: &str) -> Result<Option<InspectionRecord>, StoreError> {
        self.select_one("registry_url = ?", params![url])
    }

    async fn update_status(
        &self,
        id: i64,
        status: &RegistryStatus,
        inspector: Option<&InspectorRef>,
    ) -> Result<InspectionRecord, StoreError> {
        let changed = {
            let conn = self.conn()?;
            conn.execute(
                "UPDATE inspections SET status = ?, inspector_ref = ? WHERE id = ?",
                params![status.as_str(), inspector.map(InspectorRef::as_str), id],
            )?
        };
        if changed == 0 {
            return Err(StoreError::NotFound(id));
        }
        self.get(id).await?.ok_or(StoreError::NotFound(id))
    }

    async fn list(&self) -> Result<Vec<InspectionRecord>, StoreError> {
        let conn = self.conn()?;
        let sql = format!("SELECT {COLUMNS} FROM inspections ORDER BY created, inspection_number");
        let mut stmt = conn.prepare(&sql)?;
        let records = stmt
            .query_map([], row_to_record)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(records)
    }
}

fn row_to_record(row: &Row<'_>) -> duckdb::Result<InspectionRecord> {
    let created: NaiveDateTime = row.get(1)?;
    let status: Option<String> = row.get(4)?;
    let inspector: Option<String> = row.get(10)?;
    Ok(InspectionRecord {
        id: row.get(0)?,
        created: created.and_utc(),
        registry_url: row.get(2)?,
        inspection_number: row.get(3)?,
        status: status.map(RegistryStatus::new),
        registered_at: row.get::<_, Option<NaiveDateTime>>(5)?,
        start_date: row.get::<_, Option<NaiveDate>>(6)?,
        end_date: row.get::<_, Option<NaiveDate>>(7)?,
        address: row.get(8)?,
        departure_time: row.get::<_, Option<NaiveDateTime>>(9)?,
        inspector_ref: inspector.map(InspectorRef::new),
    })
}

/// Translate DuckDB's unique-constraint failure into [`StoreError::Duplicate`].
///
/// DuckDB reports these as `Duplicate key "<column>: <value>" violates unique constraint`.
fn map_constraint(err: duckdb::Error) -> StoreError {
    let msg = err.to_string();
    if !msg.contains("violates unique constraint") && !msg.contains("Duplicate key") {
        return StoreError::DuckDb(err);
    }
    if msg.contains("\"inspection_number:") {
        StoreError::Duplicate(UniqueField::InspectionNumber)
    } else if msg.contains("\"registry_url:") {
        StoreError::Duplicate(UniqueField::RegistryUrl)
    } else {
        StoreError::Other(msg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    impl DuckStore {
        fn count(&self) -> Result<usize, StoreError> {
            let conn = self.conn()?;
            let n: i64 = conn.query_row("SELECT count(*) FROM inspections", [], |row| row.get(0))?;
            Ok(n as usize)
        }
    }

    fn new_inspection(url: &str, number: Option<&str>) -> NewInspection {
        NewInspection {
            registry_url: url.into(),
            inspection_number: number.map(Into::into),
            status: Some(RegistryStatus::new(RegistryStatus::IN_PROGRESS)),
            registered_at: NaiveDate::from_ymd_opt(2024, 9, 1)
                .and_then(|d| d.and_hms_opt(10, 15, 0)),
            start_date: NaiveDate::from_ymd_opt(2024, 9, 5),
            end_date: NaiveDate::from_ymd_opt(2024, 9, 18),
            address: Some("г. Москва, ул. Тверская, д. 1".into()),
            inspector_ref: Some(InspectorRef::new("inspector-1")),
        }
    }

    #[tokio::test]
    async fn open_in_memory_has_empty_table() {
        let store = DuckStore::open().unwrap();
        assert_eq!(store.count().unwrap(), 0);
    }

    #[tokio::test]
    async fn insert_then_get_round_trips_all_columns() {
        let store = DuckStore::open().unwrap();
        let inserted = store
            .insert(new_inspection("https://proverki.gov.ru/k/1", Some("77001")))
            .await
            .unwrap();
        let loaded = store.get(inserted.id).await.unwrap().unwrap();
        assert_eq!(loaded, inserted);
        assert!(loaded.departure_time.is_none());
    }

    #[tokio::test]
    async fn duplicate_url_maps_to_duplicate() {
        let store = DuckStore::open().unwrap();
        store
            .insert(new_inspection("https://proverki.gov.ru/k/1", Some("77001")))
            .await
            .unwrap();
        let err = store
            .insert(new_inspection("https://proverki.gov.ru/k/1", Some("77002")))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Duplicate(UniqueField::RegistryUrl)), "{err}");
    }

    #[tokio::test]
    async fn duplicate_number_maps_to_duplicate() {
        let store = DuckStore::open().unwrap();
        store
            .insert(new_inspection("https://proverki.gov.ru/k/1", Some("77001")))
            .await
            .unwrap();
        let err = store
            .insert(new_inspection("https://proverki.gov.ru/k/2", Some("77001")))
            .await
            .unwrap_err();
        assert!(
            matches!(err, StoreError::Duplicate(UniqueField::InspectionNumber)),
            "{err}"
        );
        assert_eq!(store.count().unwrap(), 1);
    }

    #[tokio::test]
    async fn null_numbers_do_not_collide() {
        let store = DuckStore::open().unwrap();
        store
            .insert(new_inspection("https://proverki.gov.ru/k/1", None))
            .await
            .unwrap();
        store
            .insert(new_inspection("https://proverki.gov.ru/k/2", None))
            .await
            .unwrap();
        assert_eq!(store.count().unwrap(), 2);
    }

    #[tokio::test]
    async fn lookups() {
        let store = DuckStore::open().unwrap();
        store
            .insert(new_inspection("https://proverki.gov.ru/k/1", Some("77001")))
            .await
            .unwrap();
        assert!(store.find_by_number("77001").await.unwrap().is_some());
        assert!(store.find_by_number("77999").await.unwrap().is_none());
        assert!(
            store
                .find_by_url("https://proverki.gov.ru/k/1")
                .await
                .unwrap()
                .is_some()
        );
    }

    #[tokio::test]
    async fn update_status_leaves_other_columns() {
        let store = DuckStore::open().unwrap();
        let before = store
            .insert(new_inspection("https://proverki.gov.ru/k/1", Some("77001")))
            .await
            .unwrap();
        let after = store
            .update_status(
                before.id,
                &RegistryStatus::completed(),
                Some(&InspectorRef::new("inspector-2")),
            )
            .await
            .unwrap();
        assert!(after.status.as_ref().unwrap().is_completed());
        assert_eq!(after.inspector_ref, Some(InspectorRef::new("inspector-2")));

        let mut expected = before.clone();
        expected.status = after.status.clone();
        expected.inspector_ref = after.inspector_ref.clone();
        assert_eq!(after, expected);
    }

    #[tokio::test]
    async fn update_unknown_id_is_not_found() {
        let store = DuckStore::open().unwrap();
        let err = store
            .update_status(42, &RegistryStatus::completed(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound(42)));
    }

    #[tokio::test]
    async fn list_orders_by_creation() {
        let store = DuckStore::open().unwrap();
        for i in 1..=3 {
            store
                .insert(new_inspection(
                    &format!("https://proverki.gov.ru/k/{i}"),
                    Some(&format!("7700{i}")),
                ))
                .await
                .unwrap();
        }
        let ids: Vec<i64> = store.list().await.unwrap().iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    // ── Persistent storage tests ──

    #[tokio::test]
    async fn persistent_reopen_keeps_records() {
        let tmp = tempfile::TempDir::new().unwrap();
        let db_path = tmp.path().join("knd.duckdb");

        let store = DuckStore::open_persistent(&db_path).unwrap();
        assert!(db_path.exists());
        let inserted = store
            .insert(new_inspection("https://proverki.gov.ru/k/1", Some("77001")))
            .await
            .unwrap();
        drop(store);

        // Second open: schema creation is idempotent and rows survive.
        let store = DuckStore::open_persistent(&db_path).unwrap();
        assert_eq!(store.count().unwrap(), 1);
        assert_eq!(store.get(inserted.id).await.unwrap(), Some(inserted));
    }
}
