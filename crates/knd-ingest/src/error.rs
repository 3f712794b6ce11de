use std::fmt;

use knd_core::UploadError;
use knd_qr::DecodeError;
use knd_registry::ScrapeError;
use knd_store::{StoreError, UniqueField};
use thiserror::Error;

/// Why an ingestion was refused although every step ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Conflict {
    /// The registry already lists the inspection as completed.
    Completed,
    DuplicateNumber,
    DuplicateUrl,
}

impl fmt::Display for Conflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Completed => f.write_str("inspection is already completed in the registry"),
            Self::DuplicateNumber => f.write_str("an inspection with this number is already on file"),
            Self::DuplicateUrl => f.write_str("this registry link is already on file"),
        }
    }
}

/// Coarse failure category, for callers deciding whether to resubmit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    /// Bad input; resubmitting a different file may help.
    Client,
    Conflict,
    NotFound,
    /// The registry failed or was too slow; retrying later may help.
    Upstream,
    Internal,
}

#[derive(Error, Debug)]
pub enum IngestError {
    #[error("upload rejected: {0}")]
    InputRejected(#[from] UploadError),

    #[error("QR code could not be read: {0}")]
    DecodeFailed(#[from] DecodeError),

    #[error("registry page did not load in time")]
    ScrapeTimeout,

    #[error("registry scrape failed: {0}")]
    ScrapeFatal(String),

    #[error("{0}")]
    Conflict(Conflict),

    #[error("inspection record {0} not found")]
    NotFound(i64),

    #[error("processing error: {0}")]
    Processing(String),
}

impl IngestError {
    pub fn class(&self) -> FailureClass {
        match self {
            Self::InputRejected(_) | Self::DecodeFailed(_) => FailureClass::Client,
            Self::ScrapeTimeout | Self::ScrapeFatal(_) => FailureClass::Upstream,
            Self::Conflict(_) => FailureClass::Conflict,
            Self::NotFound(_) => FailureClass::NotFound,
            Self::Processing(_) => FailureClass::Internal,
        }
    }

    /// HTTP status a web front end would answer with.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::InputRejected(_) | Self::DecodeFailed(_) => 400,
            Self::ScrapeTimeout => 504,
            Self::ScrapeFatal(_) => 502,
            Self::Conflict(_) => 409,
            Self::NotFound(_) => 404,
            Self::Processing(_) => 500,
        }
    }
}

impl From<ScrapeError> for IngestError {
    fn from(e: ScrapeError) -> Self {
        match e {
            ScrapeError::Timeout => Self::ScrapeTimeout,
            ScrapeError::Fatal(msg) => Self::ScrapeFatal(msg),
        }
    }
}

impl From<StoreError> for IngestError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Duplicate(UniqueField::RegistryUrl) => Self::Conflict(Conflict::DuplicateUrl),
            StoreError::Duplicate(UniqueField::InspectionNumber) => {
                Self::Conflict(Conflict::DuplicateNumber)
            }
            StoreError::NotFound(id) => Self::NotFound(id),
            other => Self::Processing(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn classes_and_codes() {
        let cases = [
            (
                IngestError::InputRejected(UploadError::DisallowedExtension(".pdf".into())),
                FailureClass::Client,
                400,
            ),
            (IngestError::DecodeFailed(DecodeError::NotDecodable), FailureClass::Client, 400),
            (IngestError::ScrapeTimeout, FailureClass::Upstream, 504),
            (IngestError::ScrapeFatal("boom".into()), FailureClass::Upstream, 502),
            (IngestError::Conflict(Conflict::Completed), FailureClass::Conflict, 409),
            (IngestError::NotFound(4), FailureClass::NotFound, 404),
            (IngestError::Processing("x".into()), FailureClass::Internal, 500),
        ];
        for (err, class, code) in cases {
            assert_eq!(err.class(), class, "{err}");
            assert_eq!(err.status_code(), code, "{err}");
        }
    }

    #[test]
    fn store_errors_map_to_conflicts() {
        assert!(matches!(
            IngestError::from(StoreError::Duplicate(UniqueField::RegistryUrl)),
            IngestError::Conflict(Conflict::DuplicateUrl)
        ));
        assert!(matches!(
            IngestError::from(StoreError::Duplicate(UniqueField::InspectionNumber)),
            IngestError::Conflict(Conflict::DuplicateNumber)
        ));
        assert!(matches!(
            IngestError::from(StoreError::NotFound(3)),
            IngestError::NotFound(3)
        ));
        assert!(matches!(
            IngestError::from(StoreError::Other("disk full".into())),
            IngestError::Processing(msg) if msg == "disk full"
        ));
    }

    #[test]
    fn scrape_errors_map_to_upstream() {
        assert!(matches!(IngestError::from(ScrapeError::Timeout), IngestError::ScrapeTimeout));
        assert!(matches!(
            IngestError::from(ScrapeError::Fatal("crashed".into())),
            IngestError::ScrapeFatal(msg) if msg == "crashed"
        ));
    }

    #[test]
    fn messages_are_readable() {
        let err = IngestError::DecodeFailed(DecodeError::NotFound {
            path: PathBuf::from("/tmp/qr.png"),
            reason: "No such file".into(),
        });
        assert_eq!(
            err.to_string(),
            "QR code could not be read: image not found or unreadable: /tmp/qr.png: No such file"
        );
        assert_eq!(
            IngestError::Conflict(Conflict::DuplicateNumber).to_string(),
            "an inspection with this number is already on file"
        );
    }
}
