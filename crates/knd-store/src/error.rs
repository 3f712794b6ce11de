use std::fmt;

use thiserror::Error;

/// Column carrying a uniqueness constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UniqueField {
    RegistryUrl,
    InspectionNumber,
}

impl fmt::Display for UniqueField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RegistryUrl => f.write_str("registry_url"),
            Self::InspectionNumber => f.write_str("inspection_number"),
        }
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("a record with the same {0} already exists")]
    Duplicate(UniqueField),

    #[error("record {0} not found")]
    NotFound(i64),

    #[cfg(feature = "duckdb")]
    #[error("duckdb error: {0}")]
    DuckDb(#[from] ::duckdb::Error),

    #[error("{0}")]
    Other(String),
}
