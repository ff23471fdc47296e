use crate::error::{Error, Result};
use std::{
    fs,
    io::Write,
    path::{Path, PathBuf},
};
use tracing::debug;

/// Writes `content` to `path` as UTF-8, replacing any existing file.
///
/// # Process
///
/// 1. Writes content to a temporary file next to the target
/// 2. Syncs the temporary file to disk
/// 3. Renames the temporary file over the target
///
/// A failed write never leaves a half-written target behind.
///
/// # Errors
///
/// Returns an IO error if any step fails. The temporary file is removed
/// whenever a step after its creation fails.
pub(crate) fn write_file_atomic(path: &Path, content: &str) -> Result<()> {
    let temp_path = temp_path_for(path);

    let result = write_temp(&temp_path, content)
        .and_then(|()| fs::rename(&temp_path, path).map_err(|e| Error::io(path, e)));

    if result.is_err() {
        let _ = fs::remove_file(&temp_path);
        return result;
    }

    debug!("Wrote {} bytes to {}", content.len(), path.display());
    Ok(())
}

fn write_temp(temp_path: &Path, content: &str) -> Result<()> {
    let mut temp_file = fs::File::create(temp_path).map_err(|e| Error::io(temp_path, e))?;

    temp_file
        .write_all(content.as_bytes())
        .map_err(|e| Error::io(temp_path, e))?;

    temp_file
        .sync_all()
        .map_err(|e| Error::io(temp_path, e))
}

/// `notes.summary.txt` → `.notes.summary.txt.tmp` in the same directory.
fn temp_path_for(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!(".{name}.tmp"))
}
