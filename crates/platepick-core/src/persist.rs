//! Atomic file output.
//!
//! Every file the pipeline produces goes through [`write_atomic`]: the bytes
//! land in a temporary file next to the destination, which is then renamed
//! over it. A crash mid-write leaves the previous file (or nothing) behind.

use std::io::Write;
use std::path::Path;

use tempfile::NamedTempFile;

use crate::error::{PickError, Result};

/// Write `bytes` to `path`, creating parent directories as needed.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir)?;

    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| PickError::Persist {
        path: path.to_path_buf(),
        source: e.error,
    })?;
    log::trace!("wrote {} ({} bytes)", path.display(), bytes.len());
    Ok(())
}

/// Serialize `value` as pretty JSON and write it atomically.
pub fn write_json<T: serde::Serialize>(path: &Path, value: &T) -> Result<()> {
    let mut bytes = serde_json::to_vec_pretty(value)?;
    bytes.push(b'\n');
    write_atomic(path, &bytes)
}

/// Remove a file if it exists.
pub fn remove_if_exists(path: &Path) -> Result<bool> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e.into()),
    }
}

/// Lowercase hex encoding.
pub(crate) fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}
