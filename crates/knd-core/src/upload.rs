//! Upload boundary checks applied before an image reaches the QR extractor.

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Image extensions accepted for QR uploads (lowercase, with dot).
pub const ALLOWED_EXTENSIONS: [&str; 4] = [".jpg", ".jpeg", ".png", ".gif"];

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UploadError {
    #[error("no file provided: {0}")]
    Missing(PathBuf),
    #[error("file type not allowed: {0:?} (expected one of .jpg, .jpeg, .png, .gif)")]
    DisallowedExtension(String),
}

/// Accept `path` if it names an existing file with an allowed image extension.
pub fn check_upload(path: &Path) -> Result<(), UploadError> {
    if !path.is_file() {
        return Err(UploadError::Missing(path.to_path_buf()));
    }
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| format!(".{}", e.to_ascii_lowercase()))
        .unwrap_or_default();
    if !ALLOWED_EXTENSIONS.contains(&ext.as_str()) {
        return Err(UploadError::DisallowedExtension(ext));
    }
    Ok(())
}
