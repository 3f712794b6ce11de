//! Inspection record types shared by the store, the orchestrator and the CLI.

use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

/// Status string reported by the ERKNM registry for an inspection.
///
/// The registry owns this vocabulary and adds states without notice, so the
/// value is kept as an opaque string. Only the states the pipeline reasons
/// about are named.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RegistryStatus(String);

impl RegistryStatus {
    /// Terminal state: the inspection is closed.
    pub const COMPLETED: &'static str = "Завершено";
    pub const IN_PROGRESS: &'static str = "В процессе";

    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn completed() -> Self {
        Self::new(Self::COMPLETED)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the registry reports the inspection as closed.
    pub fn is_completed(&self) -> bool {
        self.0 == Self::COMPLETED
    }
}

impl fmt::Display for RegistryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Opaque reference to the authenticated user who performed an upload.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InspectorRef(String);

impl InspectorRef {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for InspectorRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A persisted inspection record.
///
/// `registry_url` and `inspection_number` are each unique across all records.
/// This is also the serialized projection returned to callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InspectionRecord {
    pub id: i64,
    pub created: DateTime<Utc>,
    pub registry_url: String,
    pub inspection_number: Option<String>,
    pub status: Option<RegistryStatus>,
    /// Registry registration moment, in registry local time.
    pub registered_at: Option<NaiveDateTime>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub address: Option<String>,
    /// Set by the departure workflow, never by ingestion.
    pub departure_time: Option<NaiveDateTime>,
    pub inspector_ref: Option<InspectorRef>,
}

/// Everything needed to insert a record; the store assigns `id` and `created`.
#[derive(Debug, Clone, PartialEq)]
pub struct NewInspection {
    pub registry_url: String,
    pub inspection_number: Option<String>,
    pub status: Option<RegistryStatus>,
    pub registered_at: Option<NaiveDateTime>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub address: Option<String>,
    pub inspector_ref: Option<InspectorRef>,
}

impl NewInspection {
    /// Materialise the record the store will hold once `id` and `created` are known.
    pub fn into_record(self, id: i64, created: DateTime<Utc>) -> InspectionRecord {
        InspectionRecord {
            id,
            created,
            registry_url: self.registry_url,
            inspection_number: self.inspection_number,
            status: self.status,
            registered_at: self.registered_at,
            start_date: self.start_date,
            end_date: self.end_date,
            address: self.address,
            departure_time: None,
            inspector_ref: self.inspector_ref,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample() -> NewInspection {
        NewInspection {
            registry_url: "https://proverki.gov.ru/portal/public-knm/link-only/77c98f91".into(),
            inspection_number: Some("77250926600018079904".into()),
            status: Some(RegistryStatus::new(RegistryStatus::IN_PROGRESS)),
            registered_at: NaiveDate::from_ymd_opt(2024, 9, 1)
                .and_then(|d| d.and_hms_opt(10, 15, 0)),
            start_date: NaiveDate::from_ymd_opt(2024, 9, 5),
            end_date: None,
            address: Some("г. Москва, ул. Тверская, д. 1".into()),
            inspector_ref: Some(InspectorRef::new("inspector-42")),
        }
    }

    #[test]
    fn completed_status_detected() {
        assert!(RegistryStatus::completed().is_completed());
        assert!(!RegistryStatus::new(RegistryStatus::IN_PROGRESS).is_completed());
        assert!(!RegistryStatus::new("завершено").is_completed());
    }

    #[test]
    fn into_record_keeps_fields_and_leaves_departure_unset() {
        let created = Utc.with_ymd_and_hms(2024, 9, 6, 8, 0, 0).unwrap();
        let record = sample().into_record(7, created);
        assert_eq!(record.id, 7);
        assert_eq!(record.created, created);
        assert_eq!(record.inspection_number.as_deref(), Some("77250926600018079904"));
        assert!(record.departure_time.is_none());
        assert_eq!(record.inspector_ref.unwrap().as_str(), "inspector-42");
    }

    #[test]
    fn record_serializes_flat_projection() {
        let created = Utc.with_ymd_and_hms(2024, 9, 6, 8, 0, 0).unwrap();
        let record = sample().into_record(1, created);
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["id"], 1);
        assert_eq!(json["status"], "В процессе");
        assert_eq!(json["start_date"], "2024-09-05");
        assert_eq!(json["registered_at"], "2024-09-01T10:15:00");
        assert!(json["end_date"].is_null());
        assert_eq!(json["inspector_ref"], "inspector-42");
    }
}
