//! Cache file persistence.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::debug;

use pulse_core::models::SubmissionCache;

use crate::error::CacheError;

/// Load the cache at `path`. `Ok(None)` when the file does not exist yet.
pub fn load(path: &Path) -> Result<Option<SubmissionCache>, CacheError> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            debug!(?path, "no submission cache yet");
            return Ok(None);
        }
        Err(source) => {
            return Err(CacheError::Read {
                path: path.to_path_buf(),
                source,
            });
        }
    };
    let cache: SubmissionCache =
        serde_json::from_str(&content).map_err(|source| CacheError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
    debug!(
        ?path,
        emails = cache.by_email.len(),
        entries = cache.entry_count(),
        "submission cache loaded"
    );
    Ok(Some(cache))
}

/// Write `cache` to `path`, creating the directory if needed.
///
/// The document goes to a sibling temp file first and is renamed into place,
/// so a crash mid-write leaves the previous cache intact.
pub fn save(path: &Path, cache: &SubmissionCache) -> Result<(), CacheError> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir).map_err(|source| CacheError::Write {
            path: dir.to_path_buf(),
            source,
        })?;
    }
    let json = serde_json::to_vec_pretty(cache).map_err(|e| CacheError::Write {
        path: path.to_path_buf(),
        source: std::io::Error::other(e),
    })?;

    let tmp = temp_path(path);
    std::fs::write(&tmp, json).map_err(|source| CacheError::Write {
        path: tmp.clone(),
        source,
    })?;
    std::fs::rename(&tmp, path).map_err(|source| CacheError::Write {
        path: path.to_path_buf(),
        source,
    })?;
    debug!(?path, entries = cache.entry_count(), "submission cache saved");
    Ok(())
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}
