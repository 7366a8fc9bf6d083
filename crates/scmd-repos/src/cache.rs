//! On-disk cache of manifests and command specs, plus install tracking.
//!
//! Layout under `{data_dir}/cache`:
//!
//! ```text
//! manifest.json              index (this module's CacheManifest)
//! manifests/{key}.yaml       cached repository manifests, key = blake3(url)
//! commands/{hash}.yaml       cached command specs, content addressed
//! ```
//!
//! The index is the source of truth for lockfile generation and update
//! checks. Blobs without an index entry are ignored.

use std::collections::BTreeMap;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::atomic::write_atomic;
use crate::error::{RepoError, RepoResult};
use crate::lockfile::{LockedCmd, Lockfile};
use crate::spec::{CommandSpec, Manifest};

/// Directory under the data dir holding the cache.
pub const CACHE_DIR: &str = "cache";

/// Index file name inside the cache directory.
pub const INDEX_FILE: &str = "manifest.json";

const INDEX_VERSION: &str = "1.0";

/// Cache index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheManifest {
    /// Index format version.
    pub version: String,
    /// Last time the index was written.
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    /// Repository URLs by name.
    #[serde(default)]
    pub repos: BTreeMap<String, CachedRepo>,
    /// Cached command specs keyed by `repo/name`.
    #[serde(default)]
    pub commands: BTreeMap<String, CachedCmd>,
    /// Cached manifests keyed by URL hash.
    #[serde(default)]
    pub manifests: BTreeMap<String, CachedItem>,
}

impl Default for CacheManifest {
    fn default() -> Self {
        Self {
            version: INDEX_VERSION.to_string(),
            updated_at: None,
            repos: BTreeMap::new(),
            commands: BTreeMap::new(),
            manifests: BTreeMap::new(),
        }
    }
}

/// A repository seen by the cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedRepo {
    /// Base URL.
    pub url: String,
    /// When the entry was recorded.
    pub cached_at: DateTime<Utc>,
}

/// A cached command spec.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedCmd {
    /// Source repository.
    pub repo: String,
    /// Spec version at caching time.
    pub version: String,
    /// blake3 of the serialized spec.
    pub hash: String,
    /// When the spec was cached.
    pub cached_at: DateTime<Utc>,
    /// Set while the command is installed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub installed_at: Option<DateTime<Utc>>,
    /// Set by the last update check.
    #[serde(default)]
    pub update_available: bool,
    /// Newest version seen by the last update check.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latest_version: Option<String>,
}

/// A cached blob with its content hash and expiry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedItem {
    /// Source URL.
    pub url: String,
    /// blake3 of the blob contents. A blob that no longer matches is ignored.
    #[serde(default)]
    pub hash: String,
    /// When the blob was written.
    pub cached_at: DateTime<Utc>,
    /// After this instant the blob is stale.
    pub expires_at: DateTime<Utc>,
}

/// An installed command whose repository serves another version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UpdateInfo {
    /// Source repository.
    pub repo: String,
    /// Command name.
    pub command: String,
    /// Installed version.
    pub current: String,
    /// Version the repository serves.
    pub latest: String,
    /// When the installed version was installed.
    pub installed_at: Option<DateTime<Utc>>,
}

/// An installed command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstalledCmd {
    /// Source repository.
    pub repo: String,
    /// Command name.
    pub name: String,
    /// Installed version.
    pub version: String,
    /// Content hash of the installed spec.
    pub hash: String,
    /// Install time.
    pub installed_at: DateTime<Utc>,
}

/// Entry counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    /// Known repositories.
    pub repos: usize,
    /// Cached command specs.
    pub commands: usize,
    /// Installed commands.
    pub installed: usize,
    /// Cached manifests.
    pub manifests: usize,
    /// Cached manifests past their expiry.
    pub expired_manifests: usize,
    /// Installed commands flagged as outdated.
    pub updates_available: usize,
}

/// The manifest and command cache.
#[derive(Debug)]
pub struct Cache {
    root: PathBuf,
    index: RwLock<CacheManifest>,
}

impl Cache {
    /// Create an empty cache rooted at `{data_dir}/cache`. Nothing is read
    /// until [`Cache::load`].
    #[must_use]
    pub fn new(data_dir: &Path) -> Self {
        Self {
            root: data_dir.join(CACHE_DIR),
            index: RwLock::new(CacheManifest::default()),
        }
    }

    /// The cache directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn index_path(&self) -> PathBuf {
        self.root.join(INDEX_FILE)
    }

    fn manifest_blob(&self, key: &str) -> PathBuf {
        self.root.join("manifests").join(format!("{key}.yaml"))
    }

    fn command_blob(&self, hash: &str) -> PathBuf {
        self.root.join("commands").join(format!("{hash}.yaml"))
    }

    /// Read the index. A missing index leaves the cache empty.
    ///
    /// # Errors
    ///
    /// Returns an error if the index exists but cannot be read or parsed.
    pub fn load(&self) -> RepoResult<()> {
        let path = self.index_path();
        let loaded = match std::fs::read_to_string(&path) {
            Ok(content) => serde_json::from_str(&content)
                .map_err(|e| RepoError::malformed(path.display().to_string(), e))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => CacheManifest::default(),
            Err(e) => return Err(RepoError::io(&path, e)),
        };
        *self.index.write().unwrap_or_else(PoisonError::into_inner) = loaded;
        Ok(())
    }

    /// Write the index.
    ///
    /// # Errors
    ///
    /// Returns an error if the index cannot be written.
    pub fn save(&self) -> RepoResult<()> {
        let json = {
            let mut index = self.index.write().unwrap_or_else(PoisonError::into_inner);
            index.updated_at = Some(Utc::now());
            serde_json::to_string_pretty(&*index)
                .map_err(|e| RepoError::malformed("cache index", e))?
        };
        write_atomic(&self.index_path(), json.as_bytes())?;
        debug!(path = %self.index_path().display(), "Saved cache index");
        Ok(())
    }

    /// A snapshot of the index.
    #[must_use]
    pub fn snapshot(&self) -> CacheManifest {
        self.index
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// The cached manifest for `url`, if present and not expired.
    #[must_use]
    pub fn get_manifest(&self, url: &str) -> Option<Manifest> {
        let key = url_key(url);
        let (hash, expires_at) = {
            let index = self.index.read().unwrap_or_else(PoisonError::into_inner);
            let item = index.manifests.get(&key)?;
            (item.hash.clone(), item.expires_at)
        };
        if Utc::now() > expires_at {
            debug!(url, "Cached manifest expired");
            return None;
        }

        let path = self.manifest_blob(&key);
        let source = std::fs::read_to_string(&path)
            .inspect_err(|e| debug!(path = %path.display(), error = %e, "Manifest blob unreadable"))
            .ok()?;
        if content_hash(&source) != hash {
            warn!(path = %path.display(), "Manifest blob does not match its recorded hash");
            return None;
        }
        serde_yaml::from_str(&source)
            .inspect_err(|e| warn!(path = %path.display(), error = %e, "Corrupt manifest blob"))
            .ok()
    }

    /// Cache `manifest` for `url`, fresh for `ttl`.
    ///
    /// # Errors
    ///
    /// Returns an error if the blob cannot be written.
    pub fn set_manifest(&self, url: &str, manifest: &Manifest, ttl: Duration) -> RepoResult<()> {
        let key = url_key(url);
        let yaml = serde_yaml::to_string(manifest).map_err(|e| RepoError::malformed(url, e))?;
        write_atomic(&self.manifest_blob(&key), yaml.as_bytes())?;

        let now = Utc::now();
        let expires_at = TimeDelta::from_std(ttl)
            .ok()
            .and_then(|ttl| now.checked_add_signed(ttl))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        self.index
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .manifests
            .insert(
                key,
                CachedItem {
                    url: url.to_string(),
                    hash: content_hash(&yaml),
                    cached_at: now,
                    expires_at,
                },
            );
        Ok(())
    }

    /// The cached spec for `repo/name`.
    #[must_use]
    pub fn get_command(&self, repo: &str, name: &str) -> Option<CommandSpec> {
        let hash = self
            .index
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .commands
            .get(&command_key(repo, name))?
            .hash
            .clone();
        let path = self.command_blob(&hash);
        let source = std::fs::read_to_string(&path).ok()?;
        CommandSpec::from_yaml(&source, &path.display().to_string())
            .inspect_err(|e| warn!(error = %e, "Corrupt command blob"))
            .ok()
    }

    /// Cache a spec and return its content hash.
    ///
    /// An installed entry keeps describing the installed spec; only the blob
    /// is stored.
    ///
    /// # Errors
    ///
    /// Returns an error if the spec cannot be serialized or written.
    pub fn set_command(&self, repo: &str, name: &str, spec: &CommandSpec) -> RepoResult<String> {
        let hash = self.store_blob(spec)?;

        let mut index = self.index.write().unwrap_or_else(PoisonError::into_inner);
        let key = command_key(repo, name);
        if index
            .commands
            .get(&key)
            .is_some_and(|cmd| cmd.installed_at.is_some())
        {
            return Ok(hash);
        }
        index.commands.insert(
            key,
            CachedCmd {
                repo: repo.to_string(),
                version: spec.version.clone(),
                hash: hash.clone(),
                cached_at: Utc::now(),
                installed_at: None,
                update_available: false,
                latest_version: None,
            },
        );
        Ok(hash)
    }

    fn store_blob(&self, spec: &CommandSpec) -> RepoResult<String> {
        let yaml = spec.to_yaml()?;
        let hash = content_hash(&yaml);
        let blob = self.command_blob(&hash);
        if !blob.exists() {
            write_atomic(&blob, yaml.as_bytes())?;
        }
        Ok(hash)
    }

    /// Remember a repository's URL for lockfile generation.
    pub fn set_repo(&self, name: &str, url: &str) {
        self.index
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .repos
            .insert(
                name.to_string(),
                CachedRepo {
                    url: url.to_string(),
                    cached_at: Utc::now(),
                },
            );
    }

    /// Record `spec` as installed from `repo` and return its content hash.
    ///
    /// # Errors
    ///
    /// Returns an error if the spec cannot be serialized or written.
    pub fn mark_installed(&self, repo: &str, spec: &CommandSpec) -> RepoResult<String> {
        let hash = self.store_blob(spec)?;
        let now = Utc::now();
        self.index
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .commands
            .insert(
                command_key(repo, &spec.name),
                CachedCmd {
                    repo: repo.to_string(),
                    version: spec.version.clone(),
                    hash: hash.clone(),
                    cached_at: now,
                    installed_at: Some(now),
                    update_available: false,
                    latest_version: None,
                },
            );
        info!(repo, command = %spec.name, version = %spec.version, "Recorded install");
        Ok(hash)
    }

    /// Clear the install marker of every `*/name` entry. Returns how many
    /// entries were cleared.
    pub fn mark_uninstalled(&self, name: &str) -> usize {
        let suffix = format!("/{name}");
        let mut index = self.index.write().unwrap_or_else(PoisonError::into_inner);
        let mut cleared = 0usize;
        for (key, cmd) in &mut index.commands {
            if key.ends_with(&suffix) && cmd.installed_at.take().is_some() {
                cmd.update_available = false;
                cmd.latest_version = None;
                cleared = cleared.saturating_add(1);
            }
        }
        cleared
    }

    /// Installed commands, sorted by `repo/name`.
    #[must_use]
    pub fn installed(&self) -> Vec<InstalledCmd> {
        self.index
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .commands
            .iter()
            .filter_map(|(key, cmd)| {
                let installed_at = cmd.installed_at?;
                let name = key.split_once('/').map_or(key.as_str(), |(_, n)| n);
                Some(InstalledCmd {
                    repo: cmd.repo.clone(),
                    name: name.to_string(),
                    version: cmd.version.clone(),
                    hash: cmd.hash.clone(),
                    installed_at,
                })
            })
            .collect()
    }

    /// Ask `resolver(repo, name)` for the latest version of every installed
    /// command and flag those whose repository serves a different version
    /// string.
    ///
    /// Resolver errors are logged and skip the command. Commands whose
    /// version matches have their flag cleared.
    pub async fn check_updates<F, Fut, E>(&self, resolver: F) -> Vec<UpdateInfo>
    where
        F: Fn(String, String) -> Fut,
        Fut: Future<Output = Result<String, E>>,
        E: std::fmt::Display,
    {
        // Resolve outside the lock.
        let installed = self.installed();

        let mut checked = Vec::with_capacity(installed.len());
        for cmd in installed {
            match resolver(cmd.repo.clone(), cmd.name.clone()).await {
                Ok(latest) => checked.push((cmd, latest)),
                Err(e) => {
                    warn!(repo = %cmd.repo, command = %cmd.name, error = %e, "Update check failed");
                },
            }
        }

        let mut updates = Vec::new();
        let mut index = self.index.write().unwrap_or_else(PoisonError::into_inner);
        for (cmd, latest) in checked {
            let changed = latest != cmd.version;
            if let Some(entry) = index.commands.get_mut(&command_key(&cmd.repo, &cmd.name)) {
                entry.update_available = changed;
                entry.latest_version = Some(latest.clone());
            }
            if changed {
                updates.push(UpdateInfo {
                    repo: cmd.repo,
                    command: cmd.name,
                    current: cmd.version,
                    latest,
                    installed_at: Some(cmd.installed_at),
                });
            }
        }
        updates
    }

    /// A lockfile describing every installed command.
    #[must_use]
    pub fn generate_lockfile(&self) -> Lockfile {
        let repos = self
            .index
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .repos
            .clone();
        let commands = self
            .installed()
            .into_iter()
            .map(|cmd| LockedCmd {
                url: repos
                    .get(&cmd.repo)
                    .map(|r| r.url.clone())
                    .unwrap_or_default(),
                name: cmd.name,
                repo: cmd.repo,
                version: cmd.version,
                hash: cmd.hash,
            })
            .collect();
        Lockfile::new(commands)
    }

    /// Delete every blob and reset the index.
    ///
    /// # Errors
    ///
    /// Returns an error if the cache directory cannot be removed.
    pub fn clear(&self) -> RepoResult<()> {
        match std::fs::remove_dir_all(&self.root) {
            Ok(()) => {},
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {},
            Err(e) => return Err(RepoError::io(&self.root, e)),
        }
        *self.index.write().unwrap_or_else(PoisonError::into_inner) = CacheManifest::default();
        info!(path = %self.root.display(), "Cleared cache");
        Ok(())
    }

    /// Entry counts.
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        let index = self.index.read().unwrap_or_else(PoisonError::into_inner);
        let now = Utc::now();
        CacheStats {
            repos: index.repos.len(),
            commands: index.commands.len(),
            installed: index
                .commands
                .values()
                .filter(|c| c.installed_at.is_some())
                .count(),
            manifests: index.manifests.len(),
            expired_manifests: index
                .manifests
                .values()
                .filter(|m| now > m.expires_at)
                .count(),
            updates_available: index
                .commands
                .values()
                .filter(|c| c.update_available)
                .count(),
        }
    }
}

fn command_key(repo: &str, name: &str) -> String {
    format!("{repo}/{name}")
}

fn content_hash(content: &str) -> String {
    blake3::hash(content.as_bytes()).to_hex().to_string()
}

/// First 16 hex characters of the URL's blake3 hash.
fn url_key(url: &str) -> String {
    let mut hex = blake3::hash(url.as_bytes()).to_hex().to_string();
    hex.truncate(16);
    hex
}
