//! QR decoding for inspection photos.
//!
//! The photo is converted to 8-bit greyscale and handed to `rqrr`, which
//! locates finder patterns and decodes every grid it finds. The first grid that
//! decodes wins; the registry prints one code per inspection card.

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info};

use crate::guard::ImageGuard;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("image not found or unreadable: {}: {reason}", path.display())]
    NotFound { path: PathBuf, reason: String },
    #[error("no QR code recognised in the image")]
    NotDecodable,
    #[error("recognised QR code is empty")]
    Empty,
}

/// Decode the QR code in the image at `path`, then delete the image.
///
/// The file is removed on every outcome, after the decode attempt finishes.
pub fn extract(path: &Path) -> Result<String, DecodeError> {
    let guard = ImageGuard::new(path);
    let result = decode_file(guard.path());
    match &result {
        Ok(url) => info!(path = %path.display(), url = %url, "decoded QR code"),
        Err(e) => info!(path = %path.display(), error = %e, "QR decode failed"),
    }
    result
}

fn decode_file(path: &Path) -> Result<String, DecodeError> {
    let img = image::open(path).map_err(|e| DecodeError::NotFound {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    let gray = img.to_luma8();
    let (width, height) = gray.dimensions();

    let mut prepared =
        rqrr::PreparedImage::prepare_from_greyscale(width as usize, height as usize, |x, y| {
            gray.get_pixel(x as u32, y as u32).0[0]
        });
    let grids = prepared.detect_grids();
    debug!(grids = grids.len(), width, height, "QR grids detected");

    let content = grids
        .iter()
        .find_map(|grid| grid.decode().ok().map(|(_, content)| content))
        .ok_or(DecodeError::NotDecodable)?;

    if content.is_empty() {
        return Err(DecodeError::Empty);
    }
    Ok(content)
}
