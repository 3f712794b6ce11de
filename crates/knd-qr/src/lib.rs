//! QR extraction: photo of a registry QR code in, registry URL out.

mod extract;
mod guard;

pub use extract::{DecodeError, extract};
pub use guard::ImageGuard;
