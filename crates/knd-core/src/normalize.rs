//! Normalisation of raw registry text into typed record fields.
//!
//! The registry renders values in Russian locale conventions:
//!
//! - Dates: `DD.MM.YYYY` (e.g. "05.09.2024")
//! - Timestamps: `DD.MM.YYYY HH:MM` (e.g. "05.09.2024 13:30"), registry local time
//! - Absent values: the scraper's "Не найдено" marker, or an empty cell
//!
//! Parsing is strict: a value that does not match the expected format exactly
//! (including impossible calendar dates such as 31 February) is dropped. The
//! public parse functions never fail; [`FieldValue`] keeps the difference
//! between "absent" and "malformed" for diagnostics.

use chrono::{NaiveDate, NaiveDateTime};

use crate::fields::{FieldKey, FieldMap, NOT_FOUND};
use crate::record::{InspectorRef, NewInspection, RegistryStatus};

const DATE_FORMAT: &str = "%d.%m.%Y";
const DATETIME_FORMAT: &str = "%d.%m.%Y %H:%M";

/// Outcome of normalising one raw field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue<T> {
    Present(T),
    /// The marker or a blank cell.
    Missing,
    /// Text was present but did not match the expected format.
    Malformed(String),
}

impl<T> FieldValue<T> {
    pub fn into_option(self) -> Option<T> {
        match self {
            Self::Present(v) => Some(v),
            Self::Missing | Self::Malformed(_) => None,
        }
    }

    pub fn is_malformed(&self) -> bool {
        matches!(self, Self::Malformed(_))
    }
}

/// Parse a `DD.MM.YYYY HH:MM` timestamp; anything else is `None`.
pub fn parse_datetime(s: &str) -> Option<NaiveDateTime> {
    classify_datetime(s).into_option()
}

/// Parse a `DD.MM.YYYY` date; anything else is `None`.
pub fn parse_date(s: &str) -> Option<NaiveDate> {
    classify_date(s).into_option()
}

pub fn classify_datetime(s: &str) -> FieldValue<NaiveDateTime> {
    let Some(text) = present(s) else {
        return FieldValue::Missing;
    };
    let date_part = text.split(char::is_whitespace).next().unwrap_or_default();
    match NaiveDateTime::parse_from_str(text, DATETIME_FORMAT) {
        Ok(dt) if has_full_year(date_part) => FieldValue::Present(dt),
        _ => FieldValue::Malformed(text.to_string()),
    }
}

pub fn classify_date(s: &str) -> FieldValue<NaiveDate> {
    let Some(text) = present(s) else {
        return FieldValue::Missing;
    };
    match NaiveDate::parse_from_str(text, DATE_FORMAT) {
        Ok(d) if has_full_year(text) => FieldValue::Present(d),
        _ => FieldValue::Malformed(text.to_string()),
    }
}

/// Free text: present unless it is the marker or blank.
pub fn classify_text(s: &str) -> FieldValue<String> {
    match present(s) {
        Some(text) => FieldValue::Present(text.to_string()),
        None => FieldValue::Missing,
    }
}

/// Trimmed text, or `None` for the marker and blank input.
fn present(s: &str) -> Option<&str> {
    let text = s.trim();
    if text.is_empty() || text == NOT_FOUND {
        None
    } else {
        Some(text)
    }
}

/// chrono's `%Y` accepts short years ("24"); the registry always prints four digits.
fn has_full_year(date: &str) -> bool {
    date.rsplit('.')
        .next()
        .is_some_and(|y| y.len() == 4 && y.bytes().all(|b| b.is_ascii_digit()))
}

/// Typed view of one scraped inspection page.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ScrapedInspection {
    pub inspection_number: Option<String>,
    pub status: Option<RegistryStatus>,
    pub registered_at: Option<NaiveDateTime>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub address: Option<String>,
    /// Fields whose text was present but unparsable (stored as absent).
    pub malformed: Vec<FieldKey>,
}

impl ScrapedInspection {
    /// Normalise a scraper field map.
    pub fn from_fields(fields: &FieldMap) -> Self {
        let mut malformed = Vec::new();
        let registered_at = keep(
            &mut malformed,
            FieldKey::RegisteredAt,
            classify_datetime(fields.value(FieldKey::RegisteredAt)),
        );
        let start_date = keep(
            &mut malformed,
            FieldKey::StartDate,
            classify_date(fields.value(FieldKey::StartDate)),
        );
        let end_date = keep(
            &mut malformed,
            FieldKey::EndDate,
            classify_date(fields.value(FieldKey::EndDate)),
        );

        Self {
            inspection_number: classify_text(fields.value(FieldKey::InspectionNumber))
                .into_option(),
            status: classify_text(fields.value(FieldKey::Status))
                .into_option()
                .map(RegistryStatus::new),
            registered_at,
            start_date,
            end_date,
            address: classify_text(fields.value(FieldKey::Address)).into_option(),
            malformed,
        }
    }

    /// Whether the registry reports the inspection as closed.
    pub fn is_completed(&self) -> bool {
        self.status.as_ref().is_some_and(RegistryStatus::is_completed)
    }

    /// Build the insert payload for `registry_url`.
    pub fn into_new(self, registry_url: String, inspector: Option<InspectorRef>) -> NewInspection {
        NewInspection {
            registry_url,
            inspection_number: self.inspection_number,
            status: self.status,
            registered_at: self.registered_at,
            start_date: self.start_date,
            end_date: self.end_date,
            address: self.address,
            inspector_ref: inspector,
        }
    }
}

fn keep<T>(malformed: &mut Vec<FieldKey>, key: FieldKey, v: FieldValue<T>) -> Option<T> {
    if v.is_malformed() {
        malformed.push(key);
    }
    v.into_option()
}
