use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

use knd_core::check_upload;
use tracing::debug;

use crate::IngestError;

/// Copy an accepted upload into `staging_dir` and return the copy's path.
///
/// The copy keeps the source extension; the source itself is left untouched.
/// The staged file is what the pipeline consumes and deletes.
pub fn stage_upload(src: &Path, staging_dir: &Path) -> Result<PathBuf, IngestError> {
    check_upload(src)?;

    let ext = src
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| format!(".{}", e.to_ascii_lowercase()))
        .unwrap_or_default();

    let staged = copy_into(src, staging_dir, &ext).map_err(|e| {
        IngestError::Processing(format!("staging {}: {e}", src.display()))
    })?;
    debug!(src = %src.display(), staged = %staged.display(), "upload staged");
    Ok(staged)
}

fn copy_into(src: &Path, dir: &Path, ext: &str) -> io::Result<PathBuf> {
    fs::create_dir_all(dir)?;
    let mut staged = tempfile::Builder::new()
        .prefix("knd-upload-")
        .suffix(ext)
        .tempfile_in(dir)?;
    io::copy(&mut File::open(src)?, staged.as_file_mut())?;
    let (_, path) = staged.keep().map_err(|e| e.error)?;
    Ok(path)
}
