//! Labels and page captions for the fields read from an ERKNM inspection page.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Value recorded for a field the page did not yield ("Not found").
pub const NOT_FOUND: &str = "Не найдено";

/// Canonical attribute a registry field is stored under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FieldKey {
    InspectionNumber,
    Status,
    RegisteredAt,
    StartDate,
    EndDate,
    Address,
}

impl FieldKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InspectionNumber => "inspection_number",
            Self::Status => "status",
            Self::RegisteredAt => "registered_at",
            Self::StartDate => "start_date",
            Self::EndDate => "end_date",
            Self::Address => "address",
        }
    }
}

/// One field of the inspection page.
#[derive(Debug, Clone, Copy)]
pub struct RegistryField {
    pub key: FieldKey,
    /// Label the scraper reports the value under.
    pub label: &'static str,
    /// Text shown in the page row caption next to the value.
    pub caption: &'static str,
}

/// The six fields read from every inspection page, in page order.
pub static REGISTRY_FIELDS: [RegistryField; 6] = [
    RegistryField {
        key: FieldKey::InspectionNumber,
        label: "Номер КНМ",
        caption: "Учетный номер КНМ в соответствии",
    },
    RegistryField {
        key: FieldKey::Status,
        label: "Статус КНМ",
        caption: "Статус КНМ",
    },
    RegistryField {
        key: FieldKey::RegisteredAt,
        label: "Дата регистрации",
        caption: "Дата регистрации в ФГИС ЕРКНМ",
    },
    RegistryField {
        key: FieldKey::StartDate,
        label: "Дата начала",
        caption: "Дата начала КНМ",
    },
    RegistryField {
        key: FieldKey::EndDate,
        label: "Дата окончания",
        caption: "Дата окончания КНМ",
    },
    RegistryField {
        key: FieldKey::Address,
        label: "Адрес",
        caption: "Адрес",
    },
];

/// Scraper label → canonical attribute name.
pub const FIELD_MAPPING: [(&str, &str); 6] = [
    ("Номер КНМ", "inspection_number"),
    ("Статус КНМ", "status"),
    ("Дата регистрации", "registered_at"),
    ("Дата начала", "start_date"),
    ("Дата окончания", "end_date"),
    ("Адрес", "address"),
];

/// Look up the field stored under `key`.
pub fn field_for_key(key: FieldKey) -> &'static RegistryField {
    // Every FieldKey variant has exactly one entry in REGISTRY_FIELDS.
    match key {
        FieldKey::InspectionNumber => &REGISTRY_FIELDS[0],
        FieldKey::Status => &REGISTRY_FIELDS[1],
        FieldKey::RegisteredAt => &REGISTRY_FIELDS[2],
        FieldKey::StartDate => &REGISTRY_FIELDS[3],
        FieldKey::EndDate => &REGISTRY_FIELDS[4],
        FieldKey::Address => &REGISTRY_FIELDS[5],
    }
}

/// Raw scraper output: field label → text as shown on the page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldMap(BTreeMap<String, String>);

impl FieldMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, label: impl Into<String>, value: impl Into<String>) {
        self.0.insert(label.into(), value.into());
    }

    /// Raw text under `label`, or `None` if the label was never recorded.
    pub fn get(&self, label: &str) -> Option<&str> {
        self.0.get(label).map(String::as_str)
    }

    /// Raw text for `key`; a missing entry reads as [`NOT_FOUND`].
    pub fn value(&self, key: FieldKey) -> &str {
        self.get(field_for_key(key).label).unwrap_or(NOT_FOUND)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Labels whose value is the not-found marker.
    pub fn missing(&self) -> Vec<&str> {
        self.iter()
            .filter(|(_, v)| *v == NOT_FOUND)
            .map(|(k, _)| k)
            .collect()
    }
}

impl FromIterator<(String, String)> for FieldMap {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}
