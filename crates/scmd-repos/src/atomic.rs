//! Atomic file replacement.

use std::io::Write;
use std::path::Path;

use crate::error::{RepoError, RepoResult};

/// Write `contents` to `path` through a temp file in the same directory, so
/// readers see either the old file or the new one.
pub(crate) fn write_atomic(path: &Path, contents: &[u8]) -> RepoResult<()> {
    let parent = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    std::fs::create_dir_all(parent).map_err(|e| RepoError::io(parent, e))?;

    let mut tmp = tempfile::NamedTempFile::new_in(parent).map_err(|e| RepoError::io(parent, e))?;
    tmp.write_all(contents).map_err(|e| RepoError::io(path, e))?;
    tmp.as_file().sync_all().map_err(|e| RepoError::io(path, e))?;
    tmp.persist(path).map_err(|e| RepoError::io(path, e.error))?;
    Ok(())
}
