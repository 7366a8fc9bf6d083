//! Repository manager.
//!
//! Owns the configured repositories (`repos.json`), fetches manifests and
//! command specs over HTTP, and installs specs as `{dir}/{name}.yaml`.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use chrono::Utc;
use futures::StreamExt;
use futures::future::join_all;
use serde::Serialize;
use tracing::{debug, info, warn};

use scmd_config::ReposConfig;

use crate::atomic::write_atomic;
use crate::cache::Cache;
use crate::error::{RepoError, RepoResult};
use crate::spec::{CommandSpec, Manifest, ManifestCommand, Repository};

/// File holding the repository list, relative to the data directory.
pub const REPOS_FILE: &str = "repos.json";

/// Name of the repository seeded on first run.
pub const DEFAULT_REPO_NAME: &str = "official";

/// URL of the repository seeded on first run.
pub const DEFAULT_REPO_URL: &str = "https://raw.githubusercontent.com/scmd/commands/main";

/// Largest manifest or spec document accepted.
const MAX_DOCUMENT_SIZE: u64 = 1024 * 1024;

/// Manager tuning.
#[derive(Debug, Clone)]
pub struct ManagerOptions {
    /// Timeout applied to every request.
    pub http_timeout: Duration,
    /// User agent sent with requests.
    pub user_agent: String,
    /// Freshness of cached manifests.
    pub manifest_ttl: Duration,
    /// Repositories seeded when `repos.json` does not exist.
    pub default_repos: Vec<Repository>,
}

impl Default for ManagerOptions {
    fn default() -> Self {
        Self {
            http_timeout: Duration::from_secs(30),
            user_agent: "scmd".to_string(),
            manifest_ttl: Duration::from_secs(3600),
            default_repos: vec![
                Repository::new(DEFAULT_REPO_NAME, DEFAULT_REPO_URL)
                    .with_description("Official scmd commands"),
            ],
        }
    }
}

impl From<&ReposConfig> for ManagerOptions {
    fn from(config: &ReposConfig) -> Self {
        Self {
            http_timeout: config.http_timeout(),
            user_agent: config.user_agent.clone(),
            manifest_ttl: config.manifest_ttl(),
            default_repos: config
                .default_repos
                .iter()
                .map(|r| Repository::new(&r.name, &r.url).with_description(&r.description))
                .collect(),
        }
    }
}

/// A command found by [`Manager::search_commands`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchResult {
    /// Repository the command lives in.
    pub repo: String,
    /// The manifest listing.
    pub command: ManifestCommand,
}

/// Manages repositories and fetches command specs from them.
pub struct Manager {
    data_dir: PathBuf,
    repos: RwLock<BTreeMap<String, Repository>>,
    http: reqwest::Client,
    cache: Option<Arc<Cache>>,
    options: ManagerOptions,
}

impl Manager {
    /// Create a manager with default options.
    ///
    /// # Errors
    ///
    /// Returns [`RepoError::Http`] if the HTTP client cannot be built.
    pub fn new(data_dir: impl Into<PathBuf>) -> RepoResult<Self> {
        Self::with_options(data_dir, ManagerOptions::default())
    }

    /// Create a manager with explicit options.
    ///
    /// # Errors
    ///
    /// Returns [`RepoError::Http`] if the HTTP client cannot be built.
    pub fn with_options(data_dir: impl Into<PathBuf>, options: ManagerOptions) -> RepoResult<Self> {
        let http = reqwest::Client::builder()
            .user_agent(options.user_agent.clone())
            .timeout(options.http_timeout)
            .build()
            .map_err(|source| RepoError::Http {
                url: "<client>".to_string(),
                source,
            })?;

        Ok(Self {
            data_dir: data_dir.into(),
            repos: RwLock::new(BTreeMap::new()),
            http,
            cache: None,
            options,
        })
    }

    /// Attach a cache for manifests, specs and install tracking.
    #[must_use]
    pub fn with_cache(mut self, cache: Arc<Cache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// The attached cache.
    #[must_use]
    pub fn cache(&self) -> Option<&Arc<Cache>> {
        self.cache.as_ref()
    }

    /// The data directory.
    #[must_use]
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    fn repos_file(&self) -> PathBuf {
        self.data_dir.join(REPOS_FILE)
    }

    /// Load the repository list. A missing file seeds the default repositories.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load(&self) -> RepoResult<()> {
        let path = self.repos_file();
        let loaded: Vec<Repository> = match std::fs::read_to_string(&path) {
            Ok(content) => serde_json::from_str(&content)
                .map_err(|e| RepoError::malformed(path.display().to_string(), e))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "no repository list, seeding defaults");
                self.options.default_repos.clone()
            },
            Err(e) => return Err(RepoError::io(&path, e)),
        };

        let mut repos = self.repos.write().unwrap_or_else(PoisonError::into_inner);
        *repos = loaded.into_iter().map(|r| (r.name.clone(), r)).collect();
        debug!(count = repos.len(), "Loaded repositories");
        Ok(())
    }

    /// Persist the repository list as a JSON array sorted by name.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn save(&self) -> RepoResult<()> {
        let repos = self.list();
        let path = self.repos_file();
        let json = serde_json::to_string_pretty(&repos)
            .map_err(|e| RepoError::malformed(path.display().to_string(), e))?;
        write_atomic(&path, json.as_bytes())?;
        debug!(path = %path.display(), count = repos.len(), "Saved repositories");
        Ok(())
    }

    /// Add a repository.
    ///
    /// # Errors
    ///
    /// Returns [`RepoError::RepositoryExists`] if the name is taken.
    pub fn add(&self, name: &str, url: &str) -> RepoResult<Repository> {
        let mut repos = self.repos.write().unwrap_or_else(PoisonError::into_inner);
        if repos.contains_key(name) {
            return Err(RepoError::RepositoryExists(name.to_string()));
        }
        let repo = Repository::new(name, url);
        repos.insert(name.to_string(), repo.clone());
        info!(repo = name, url, "Added repository");
        Ok(repo)
    }

    /// Remove a repository.
    ///
    /// # Errors
    ///
    /// Returns [`RepoError::RepositoryNotFound`] if no such repository exists.
    pub fn remove(&self, name: &str) -> RepoResult<Repository> {
        let removed = self
            .repos
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(name)
            .ok_or_else(|| RepoError::RepositoryNotFound(name.to_string()))?;
        info!(repo = name, "Removed repository");
        Ok(removed)
    }

    /// Get a repository by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Repository> {
        self.repos
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }

    /// All repositories, sorted by name.
    #[must_use]
    pub fn list(&self) -> Vec<Repository> {
        self.repos
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect()
    }

    /// Enable or disable a repository.
    ///
    /// # Errors
    ///
    /// Returns [`RepoError::RepositoryNotFound`] if no such repository exists.
    pub fn set_enabled(&self, name: &str, enabled: bool) -> RepoResult<()> {
        let mut repos = self.repos.write().unwrap_or_else(PoisonError::into_inner);
        let repo = repos
            .get_mut(name)
            .ok_or_else(|| RepoError::RepositoryNotFound(name.to_string()))?;
        repo.enabled = enabled;
        Ok(())
    }

    /// Fetch and parse a repository's manifest.
    ///
    /// # Errors
    ///
    /// Returns a NotFound-kind error for non-200 responses, a network error
    /// if the request fails, and [`RepoError::Malformed`] for invalid YAML.
    pub async fn fetch_manifest(&self, repo: &Repository) -> RepoResult<Manifest> {
        let url = repo.manifest_url();
        let body = self.get_text(&url).await?;
        let manifest: Manifest =
            serde_yaml::from_str(&body).map_err(|e| RepoError::malformed(&url, e))?;

        if let Some(stored) = self
            .repos
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .get_mut(&repo.name)
        {
            stored.last_updated = Some(Utc::now());
        }
        debug!(repo = %repo.name, commands = manifest.commands.len(), "Fetched manifest");
        Ok(manifest)
    }

    /// Fetch and parse a command spec at `file` relative to the repository URL.
    ///
    /// # Errors
    ///
    /// Same failure modes as [`Manager::fetch_manifest`].
    pub async fn fetch_command(&self, repo: &Repository, file: &str) -> RepoResult<CommandSpec> {
        let url = repo.file_url(file);
        let body = self.get_text(&url).await?;
        CommandSpec::from_yaml(&body, &url)
    }

    /// A repository's manifest, served from the cache while fresh.
    ///
    /// # Errors
    ///
    /// Same failure modes as [`Manager::fetch_manifest`].
    pub async fn resolve_manifest(&self, repo: &Repository) -> RepoResult<Manifest> {
        let url = repo.manifest_url();
        if let Some(cache) = &self.cache
            && let Some(manifest) = cache.get_manifest(&url)
        {
            debug!(repo = %repo.name, "Manifest cache hit");
            return Ok(manifest);
        }

        let manifest = self.fetch_manifest(repo).await?;
        if let Some(cache) = &self.cache
            && let Err(e) = cache.set_manifest(&url, &manifest, self.options.manifest_ttl)
        {
            warn!(repo = %repo.name, error = %e, "Failed to cache manifest");
        }
        Ok(manifest)
    }

    /// Locate `command` in the named repository and fetch its spec.
    ///
    /// # Errors
    ///
    /// Returns [`RepoError::RepositoryNotFound`], [`RepoError::CommandNotFound`]
    /// or any fetch error.
    pub async fn find_command(
        &self,
        repo_name: &str,
        command: &str,
    ) -> RepoResult<(Repository, CommandSpec)> {
        let repo = self
            .get(repo_name)
            .ok_or_else(|| RepoError::RepositoryNotFound(repo_name.to_string()))?;
        let manifest = self.resolve_manifest(&repo).await?;
        let listing = manifest
            .find(command)
            .ok_or_else(|| RepoError::CommandNotFound {
                repo: repo_name.to_string(),
                command: command.to_string(),
            })?;
        let spec = self.fetch_command(&repo, &listing.file).await?;

        if let Some(cache) = &self.cache
            && let Err(e) = cache.set_command(&repo.name, command, &spec)
        {
            warn!(repo = %repo.name, command, error = %e, "Failed to cache command spec");
        }
        Ok((repo, spec))
    }

    /// The version a repository currently serves for `command`.
    ///
    /// # Errors
    ///
    /// Same failure modes as [`Manager::find_command`].
    pub async fn latest_version(&self, repo_name: &str, command: &str) -> RepoResult<String> {
        let (_, spec) = self.find_command(repo_name, command).await?;
        Ok(spec.version)
    }

    /// Search every enabled repository concurrently.
    ///
    /// Repositories that fail to answer contribute no results.
    pub async fn search_commands(&self, query: &str) -> Vec<SearchResult> {
        let repos: Vec<Repository> = self.list().into_iter().filter(|r| r.enabled).collect();

        let searches = repos.iter().map(|repo| async move {
            match self.resolve_manifest(repo).await {
                Ok(manifest) => manifest
                    .commands
                    .into_iter()
                    .filter(|c| c.matches(query))
                    .map(|command| SearchResult {
                        repo: repo.name.clone(),
                        command,
                    })
                    .collect(),
                Err(e) => {
                    warn!(repo = %repo.name, error = %e, "Skipping repository in search");
                    Vec::new()
                },
            }
        });

        join_all(searches).await.into_iter().flatten().collect()
    }

    /// Write `spec` to `{dir}/{name}.yaml`, creating `dir` if needed.
    ///
    /// # Errors
    ///
    /// Returns [`RepoError::Malformed`] for unsafe names and an I/O error if
    /// the file cannot be written.
    #[allow(clippy::unused_self)]
    pub fn install_command(&self, spec: &CommandSpec, dir: &Path) -> RepoResult<PathBuf> {
        let path = spec_path(dir, &spec.name)?;
        let yaml = spec.to_yaml()?;
        write_atomic(&path, yaml.as_bytes())?;
        info!(command = %spec.name, path = %path.display(), "Installed command");
        Ok(path)
    }

    /// Delete `{dir}/{name}.yaml` and clear the cache's install markers.
    ///
    /// # Errors
    ///
    /// Returns [`RepoError::NotInstalled`] if the file does not exist.
    pub fn uninstall_command(&self, name: &str, dir: &Path) -> RepoResult<()> {
        let path = spec_path(dir, name)?;
        match std::fs::remove_file(&path) {
            Ok(()) => {},
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(RepoError::NotInstalled(name.to_string()));
            },
            Err(e) => return Err(RepoError::io(&path, e)),
        }

        if let Some(cache) = &self.cache {
            let cleared = cache.mark_uninstalled(name);
            debug!(command = name, cleared, "Cleared install markers");
        }
        info!(command = name, "Uninstalled command");
        Ok(())
    }

    /// Parse every `*.yaml` spec in `dir`, in file name order.
    ///
    /// Unreadable or malformed files are skipped with a warning; a missing
    /// directory yields an empty list.
    ///
    /// # Errors
    ///
    /// Returns an I/O error only if an existing directory cannot be listed.
    #[allow(clippy::unused_self)]
    pub fn load_installed_commands(&self, dir: &Path) -> RepoResult<Vec<CommandSpec>> {
        let entries = match std::fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(RepoError::io(dir, e)),
        };

        let mut paths: Vec<PathBuf> = entries
            .filter_map(Result::ok)
            .map(|entry| entry.path())
            .filter(|path| path.is_file() && path.extension().is_some_and(|ext| ext == "yaml"))
            .collect();
        paths.sort();

        let mut specs = Vec::with_capacity(paths.len());
        for path in paths {
            let source = match std::fs::read_to_string(&path) {
                Ok(source) => source,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Skipping unreadable command spec");
                    continue;
                },
            };
            match CommandSpec::from_yaml(&source, &path.display().to_string()) {
                Ok(spec) => specs.push(spec),
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Skipping malformed command spec");
                },
            }
        }
        Ok(specs)
    }

    /// Record in the cache that `spec` was installed from `repo`. Returns
    /// the spec's content hash, or `None` without a cache.
    ///
    /// # Errors
    ///
    /// Returns an error if the cache blob cannot be written.
    pub fn record_install(
        &self,
        repo: &Repository,
        spec: &CommandSpec,
    ) -> RepoResult<Option<String>> {
        let Some(cache) = &self.cache else {
            return Ok(None);
        };
        cache.set_repo(&repo.name, &repo.url);
        cache.mark_installed(&repo.name, spec).map(Some)
    }

    async fn get_text(&self, url: &str) -> RepoResult<String> {
        fetch_text(&self.http, url).await
    }

    /// The HTTP client shared by every request this manager makes.
    pub(crate) fn http(&self) -> &reqwest::Client {
        &self.http
    }
}

/// GET `url` as UTF-8 text. Anything but `200 OK`, or a body larger than
/// the document limit, is an error.
pub(crate) async fn fetch_text(http: &reqwest::Client, url: &str) -> RepoResult<String> {
    debug!(url, "Fetching");
    let http_err = |source| RepoError::Http {
        url: url.to_string(),
        source,
    };

    let response = http.get(url).send().await.map_err(http_err)?;
    let status = response.status();
    if status != reqwest::StatusCode::OK {
        return Err(RepoError::HttpStatus {
            url: url.to_string(),
            status: status.as_u16(),
        });
    }

    if let Some(len) = response.content_length()
        && len > MAX_DOCUMENT_SIZE
    {
        return Err(too_large(url, len));
    }

    let mut body = Vec::new();
    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        body.extend_from_slice(&chunk.map_err(http_err)?);
        let size = u64::try_from(body.len()).unwrap_or(u64::MAX);
        if size > MAX_DOCUMENT_SIZE {
            return Err(too_large(url, size));
        }
    }

    String::from_utf8(body).map_err(|e| RepoError::malformed(url, e))
}

impl std::fmt::Debug for Manager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Manager")
            .field("data_dir", &self.data_dir)
            .field(
                "repos",
                &self.list().into_iter().map(|r| r.name).collect::<Vec<_>>(),
            )
            .field("cache", &self.cache.is_some())
            .finish_non_exhaustive()
    }
}

fn too_large(url: &str, size: u64) -> RepoError {
    RepoError::malformed(
        url,
        format!("document is {size} bytes, exceeding the {MAX_DOCUMENT_SIZE} byte limit"),
    )
}

/// Path of an installed spec. Names that could escape `dir` are rejected.
fn spec_path(dir: &Path, name: &str) -> RepoResult<PathBuf> {
    let unsafe_name = name.is_empty()
        || name.starts_with('.')
        || name.contains(['/', '\\'])
        || name.contains("..");
    if unsafe_name {
        return Err(RepoError::malformed(
            "command name",
            format!("'{name}' is not a valid file name"),
        ));
    }
    Ok(dir.join(format!("{name}.yaml")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager(dir: &Path) -> Manager {
        Manager::new(dir).unwrap()
    }

    fn spec(name: &str) -> CommandSpec {
        CommandSpec {
            name: name.to_string(),
            version: "1.0.0".to_string(),
            description: format!("The {name} command"),
            ..Default::default()
        }
    }

    #[test]
    fn test_load_seeds_official_repo() {
        let dir = tempfile::tempdir().unwrap();
        let manager = manager(dir.path());
        manager.load().unwrap();

        let repos = manager.list();
        assert_eq!(repos.len(), 1);
        assert_eq!(repos[0].name, DEFAULT_REPO_NAME);
        assert_eq!(repos[0].url, DEFAULT_REPO_URL);
        assert!(repos[0].enabled);
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let manager = manager(dir.path());
        manager.load().unwrap();
        manager.add("extras", "https://example.com/extras").unwrap();
        manager.set_enabled("official", false).unwrap();
        manager.save().unwrap();

        let reloaded = Manager::new(dir.path()).unwrap();
        reloaded.load().unwrap();
        let names: Vec<_> = reloaded.list().into_iter().map(|r| r.name).collect();
        assert_eq!(names, vec!["extras", "official"]);
        assert!(!reloaded.get("official").unwrap().enabled);

        let raw = std::fs::read_to_string(dir.path().join(REPOS_FILE)).unwrap();
        assert!(raw.trim_start().starts_with('['));
    }

    #[test]
    fn test_corrupt_repo_list_is_malformed() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(REPOS_FILE), "{not json").unwrap();
        let err = manager(dir.path()).load().unwrap_err();
        assert!(matches!(err, RepoError::Malformed { .. }));
    }

    #[test]
    fn test_add_and_remove_errors() {
        let dir = tempfile::tempdir().unwrap();
        let manager = manager(dir.path());

        manager.add("extras", "https://example.com").unwrap();
        assert!(matches!(
            manager.add("extras", "https://other.example.com"),
            Err(RepoError::RepositoryExists(_))
        ));

        manager.remove("extras").unwrap();
        assert!(matches!(
            manager.remove("extras"),
            Err(RepoError::RepositoryNotFound(_))
        ));
        assert!(manager.get("extras").is_none());
    }

    #[test]
    fn test_install_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let install_dir = dir.path().join("commands");
        let manager = manager(dir.path());

        let mut original = spec("explain");
        original.aliases = vec!["e".to_string()];
        original.category = "code".to_string();
        original.args.push(crate::spec::ArgSpec {
            name: "file".to_string(),
            description: "File".to_string(),
            required: true,
            default: String::new(),
        });
        original.prompt.system = "You are terse.".to_string();
        original.prompt.template = "Explain {{ .file }}".to_string();
        original.model.temperature = 0.3;
        original.model.max_tokens = 512;
        original
            .metadata
            .insert("license".to_string(), "MIT".to_string());

        let path = manager.install_command(&original, &install_dir).unwrap();
        assert_eq!(path, install_dir.join("explain.yaml"));

        let loaded = manager.load_installed_commands(&install_dir).unwrap();
        assert_eq!(loaded, vec![original]);
    }

    #[test]
    fn test_load_installed_skips_junk() {
        let dir = tempfile::tempdir().unwrap();
        let install_dir = dir.path().join("commands");
        let manager = manager(dir.path());

        manager.install_command(&spec("alpha"), &install_dir).unwrap();
        manager.install_command(&spec("beta"), &install_dir).unwrap();
        std::fs::write(install_dir.join("broken.yaml"), ":\n  - [").unwrap();
        std::fs::write(install_dir.join("notes.txt"), "name: txt").unwrap();
        std::fs::create_dir(install_dir.join("sub.yaml")).unwrap();

        let names: Vec<_> = manager
            .load_installed_commands(&install_dir)
            .unwrap()
            .into_iter()
            .map(|s| s.name)
            .collect();
        assert_eq!(names, vec!["alpha", "beta"]);
    }

    #[test]
    fn test_load_installed_missing_dir_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let loaded = manager(dir.path())
            .load_installed_commands(&dir.path().join("absent"))
            .unwrap();
        assert!(loaded.is_empty());
    }

    #[test]
    fn test_uninstall() {
        let dir = tempfile::tempdir().unwrap();
        let install_dir = dir.path().join("commands");
        let manager = manager(dir.path());

        manager.install_command(&spec("explain"), &install_dir).unwrap();
        manager.uninstall_command("explain", &install_dir).unwrap();
        assert!(!install_dir.join("explain.yaml").exists());

        let err = manager.uninstall_command("explain", &install_dir).unwrap_err();
        assert!(matches!(err, RepoError::NotInstalled(ref n) if n == "explain"));
        assert_eq!(err.to_string(), "command 'explain' is not installed");
    }

    #[test]
    fn test_uninstall_clears_cache_marker() {
        let dir = tempfile::tempdir().unwrap();
        let install_dir = dir.path().join("commands");
        let cache = Arc::new(Cache::new(dir.path()));
        let manager = manager(dir.path()).with_cache(Arc::clone(&cache));
        let repo = Repository::new("official", "https://example.com");

        let spec = spec("explain");
        manager.install_command(&spec, &install_dir).unwrap();
        manager.record_install(&repo, &spec).unwrap();
        assert_eq!(cache.installed().len(), 1);

        manager.uninstall_command("explain", &install_dir).unwrap();
        assert!(cache.installed().is_empty());
        assert!(cache.generate_lockfile().commands.is_empty());
    }

    #[test]
    fn test_unsafe_names_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let manager = manager(dir.path());
        for name in ["../evil", "a/b", "..", ".hidden", ""] {
            let err = manager.install_command(&spec(name), dir.path()).unwrap_err();
            assert!(matches!(err, RepoError::Malformed { .. }), "{name}");
        }
    }

    #[test]
    fn test_options_from_config() {
        let config = ReposConfig {
            http_timeout_secs: 5,
            ..Default::default()
        };
        let options = ManagerOptions::from(&config);
        assert_eq!(options.http_timeout, Duration::from_secs(5));
        assert_eq!(options.default_repos[0].name, "official");
        assert_eq!(options.default_repos[0].description, "Official scmd commands");
    }
}
