//! Lockfile: a version-pinned snapshot of installed commands.
//!
//! Stored as JSON at a caller-supplied path:
//!
//! ```json
//! {
//!   "version": "1.0",
//!   "generated": "2026-01-01T00:00:00Z",
//!   "commands": [
//!     { "name": "explain", "repo": "official", "version": "1.0.0",
//!       "hash": "…", "url": "https://…" }
//!   ]
//! }
//! ```
//!
//! Reinstalling from a lockfile is strict: a command whose repository now
//! serves a different version is rejected rather than installed.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::atomic::write_atomic;
use crate::error::{RepoError, RepoResult};
use crate::manager::Manager;

/// Current lockfile format version.
pub const LOCKFILE_VERSION: &str = "1.0";

/// A reproducible snapshot of installed commands.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lockfile {
    /// Format version.
    pub version: String,
    /// Generation time.
    pub generated: DateTime<Utc>,
    /// Locked commands.
    #[serde(default)]
    pub commands: Vec<LockedCmd>,
}

/// One locked command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockedCmd {
    /// Command name.
    pub name: String,
    /// Source repository name.
    pub repo: String,
    /// Exact version installed.
    pub version: String,
    /// Content hash of the installed spec.
    #[serde(default)]
    pub hash: String,
    /// Repository URL, used to re-add a missing repository.
    #[serde(default)]
    pub url: String,
}

impl Lockfile {
    /// A lockfile generated now.
    #[must_use]
    pub fn new(commands: Vec<LockedCmd>) -> Self {
        Self {
            version: LOCKFILE_VERSION.to_string(),
            generated: Utc::now(),
            commands,
        }
    }

    /// Find a locked command by name.
    #[must_use]
    pub fn find(&self, name: &str) -> Option<&LockedCmd> {
        self.commands.iter().find(|c| c.name == name)
    }

    /// Write the lockfile atomically.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the write fails.
    pub fn save(&self, path: &Path) -> RepoResult<()> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| RepoError::malformed(path.display().to_string(), e))?;
        write_atomic(path, json.as_bytes())?;
        info!(path = %path.display(), commands = self.commands.len(), "Saved lockfile");
        Ok(())
    }

    /// Read a lockfile.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> RepoResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| RepoError::io(path, e))?;
        let lockfile: Self = serde_json::from_str(&content)
            .map_err(|e| RepoError::malformed(path.display().to_string(), e))?;

        if lockfile.version != LOCKFILE_VERSION {
            warn!(
                path = %path.display(),
                found = %lockfile.version,
                expected = LOCKFILE_VERSION,
                "Lockfile format version mismatch, attempting best-effort load"
            );
        }
        Ok(lockfile)
    }
}

impl Manager {
    /// Reinstall every command in `lockfile` into `dir`.
    ///
    /// Missing repositories are re-added from the locked URL. Entries are
    /// processed in order and the first failure aborts the rest; entries
    /// already installed stay installed. Returns the installed paths.
    ///
    /// # Errors
    ///
    /// Returns [`RepoError::VersionMismatch`] if a repository serves a
    /// version other than the locked one (nothing is written for that
    /// entry), [`RepoError::RepositoryNotFound`] if a repository is missing
    /// and has no locked URL, or any fetch or install error.
    pub async fn install_from_lockfile(
        &self,
        lockfile: &Lockfile,
        dir: &Path,
    ) -> RepoResult<Vec<PathBuf>> {
        let mut installed = Vec::with_capacity(lockfile.commands.len());

        for locked in &lockfile.commands {
            if self.get(&locked.repo).is_none() {
                if locked.url.is_empty() {
                    return Err(RepoError::RepositoryNotFound(locked.repo.clone()));
                }
                self.add(&locked.repo, &locked.url)?;
            }

            let (repo, spec) = self.find_command(&locked.repo, &locked.name).await?;
            if !locked.version.is_empty() && spec.version != locked.version {
                return Err(RepoError::VersionMismatch {
                    command: locked.name.clone(),
                    locked: locked.version.clone(),
                    found: spec.version,
                });
            }

            let path = self.install_command(&spec, dir)?;
            if let Some(hash) = self.record_install(&repo, &spec)?
                && !locked.hash.is_empty()
                && hash != locked.hash
            {
                warn!(
                    command = %locked.name,
                    locked = %locked.hash,
                    found = %hash,
                    "Installed spec content differs from lockfile hash"
                );
            }
            installed.push(path);
        }

        info!(count = installed.len(), "Installed from lockfile");
        Ok(installed)
    }
}
