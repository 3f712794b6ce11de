//! Ingestion pipeline: uploaded QR photo → registry URL → scraped page → stored record.
//!
//! [`Ingestor`] owns the create and update paths; the store's uniqueness
//! constraints decide races between concurrent ingestions of the same page.

mod error;
mod ingestor;
mod stage;

pub use error::{Conflict, FailureClass, IngestError};
pub use ingestor::{Ingestor, UpdateOutcome, run_isolated};
pub use stage::stage_upload;
