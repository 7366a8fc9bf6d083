//! Central registry client.
//!
//! The registry is a JSON API indexing public repositories and their
//! commands:
//!
//! - `GET {url}/repos` and `GET {url}/commands`, filtered by the query
//!   parameters `q`, `category`, `verified`, `sort`, `limit` and `offset`;
//!   commands also accept repeated `tag` and `featured`
//! - `GET {url}/categories`
//!
//! Search results are remembered in memory. When the registry is
//! unreachable or answers with an error status, searches are served from
//! those results with the same filters applied locally.
//!
//! Independently of the registry, [`Registry::discover`] finds a repository
//! manifest from a bare base URL via `/.well-known/scmd.json`.

use std::cmp::Ordering;
use std::sync::{PoisonError, RwLock};

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{RepoError, RepoResult};
use crate::manager::{Manager, fetch_text};
use crate::spec::{Manifest, Repository};

/// Registry used when none is configured.
pub const DEFAULT_REGISTRY_URL: &str = "https://registry.scmd.dev/api/v1";

/// Discovery document path, relative to a repository base URL.
pub const WELL_KNOWN_PATH: &str = ".well-known/scmd.json";

/// A repository listed in the registry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryRepo {
    /// Repository name.
    pub name: String,
    /// Base URL.
    pub url: String,
    /// Description.
    pub description: String,
    /// Author.
    pub author: String,
    /// Reviewed by the registry maintainers.
    pub verified: bool,
    /// Maintained by the scmd project.
    pub official: bool,
    /// Stars.
    pub stars: u64,
    /// Downloads.
    pub downloads: u64,
    /// Categories the repository's commands fall into.
    pub categories: Vec<String>,
    /// Free-form tags.
    pub tags: Vec<String>,
    /// Last update, RFC 3339.
    pub updated_at: String,
}

impl RegistryRepo {
    /// A [`Repository`] that can be added to a [`Manager`].
    #[must_use]
    pub fn to_repository(&self) -> Repository {
        Repository::new(&self.name, &self.url).with_description(&self.description)
    }
}

/// A command listed in the registry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryCommand {
    /// Command name.
    pub name: String,
    /// Repository publishing it.
    pub repo: String,
    /// Published version.
    pub version: String,
    /// Description.
    pub description: String,
    /// Author.
    pub author: String,
    /// Category.
    pub category: String,
    /// Free-form tags.
    pub tags: Vec<String>,
    /// Downloads.
    pub downloads: u64,
    /// Average rating.
    pub rating: f64,
    /// Number of ratings.
    pub rating_count: u64,
    /// Reviewed by the registry maintainers.
    pub verified: bool,
    /// Highlighted by the registry.
    pub featured: bool,
    /// Creation time, RFC 3339.
    pub created_at: String,
    /// Last update, RFC 3339.
    pub updated_at: String,
}

/// A command category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryInfo {
    /// Display name.
    pub name: String,
    /// Identifier used in searches.
    pub slug: String,
    /// Description.
    #[serde(default)]
    pub description: String,
    /// Display icon.
    #[serde(default)]
    pub icon: String,
    /// Number of commands in the category.
    #[serde(default)]
    pub count: u64,
}

/// Result ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortBy {
    /// Most downloaded first.
    Downloads,
    /// Highest rated first.
    Rating,
    /// Most recently updated first.
    Updated,
    /// Alphabetical.
    Name,
}

impl SortBy {
    /// Query parameter value.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Downloads => "downloads",
            Self::Rating => "rating",
            Self::Updated => "updated",
            Self::Name => "name",
        }
    }
}

/// Search filters. The default matches everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchOptions {
    /// Case-insensitive substring of name or description.
    pub query: String,
    /// Exact category (case-insensitive).
    pub category: Option<String>,
    /// Tags that must all be present. Ignored for repositories.
    pub tags: Vec<String>,
    /// Only verified entries.
    pub verified: bool,
    /// Only featured commands. Ignored for repositories.
    pub featured: bool,
    /// Ordering.
    pub sort: Option<SortBy>,
    /// Maximum number of results; 0 means unlimited.
    pub limit: usize,
    /// Results to skip before `limit` applies.
    pub offset: usize,
}

impl SearchOptions {
    /// Search for `query`.
    #[must_use]
    pub fn matching(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Self::default()
        }
    }

    fn params(&self, for_commands: bool) -> Vec<(&'static str, String)> {
        let mut params = vec![("q", self.query.clone())];
        if let Some(category) = &self.category {
            params.push(("category", category.clone()));
        }
        if for_commands {
            params.extend(self.tags.iter().map(|tag| ("tag", tag.clone())));
        }
        if self.verified {
            params.push(("verified", "true".to_string()));
        }
        if for_commands && self.featured {
            params.push(("featured", "true".to_string()));
        }
        if let Some(sort) = self.sort {
            params.push(("sort", sort.as_str().to_string()));
        }
        if self.limit > 0 {
            params.push(("limit", self.limit.to_string()));
        }
        if self.offset > 0 {
            params.push(("offset", self.offset.to_string()));
        }
        params
    }

    fn matches_text(&self, name: &str, description: &str) -> bool {
        let query = self.query.to_lowercase();
        query.is_empty()
            || name.to_lowercase().contains(&query)
            || description.to_lowercase().contains(&query)
    }

    fn matches_repo(&self, repo: &RegistryRepo) -> bool {
        self.matches_text(&repo.name, &repo.description)
            && self
                .category
                .as_ref()
                .is_none_or(|c| repo.categories.iter().any(|rc| rc.eq_ignore_ascii_case(c)))
            && (!self.verified || repo.verified)
    }

    fn matches_command(&self, cmd: &RegistryCommand) -> bool {
        self.matches_text(&cmd.name, &cmd.description)
            && self
                .category
                .as_ref()
                .is_none_or(|c| cmd.category.eq_ignore_ascii_case(c))
            && self
                .tags
                .iter()
                .all(|tag| cmd.tags.iter().any(|t| t.eq_ignore_ascii_case(tag)))
            && (!self.verified || cmd.verified)
            && (!self.featured || cmd.featured)
    }

    fn page<T>(&self, items: Vec<T>) -> Vec<T> {
        let limit = if self.limit == 0 { usize::MAX } else { self.limit };
        items.into_iter().skip(self.offset).take(limit).collect()
    }
}

/// Last successful registry answers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RegistryCache {
    /// Repositories from the last repository search.
    pub repos: Vec<RegistryRepo>,
    /// Commands from the last command search.
    pub commands: Vec<RegistryCommand>,
    /// When either list was last refreshed.
    pub last_updated: Option<DateTime<Utc>>,
}

/// Client for the central registry.
#[derive(Debug)]
pub struct Registry {
    url: String,
    http: reqwest::Client,
    cache: RwLock<RegistryCache>,
}

impl Registry {
    /// A client for the registry at `url` (or [`DEFAULT_REGISTRY_URL`] when
    /// empty) using `http` for requests.
    #[must_use]
    pub fn with_client(url: &str, http: reqwest::Client) -> Self {
        let url = url.trim().trim_end_matches('/');
        let url = if url.is_empty() { DEFAULT_REGISTRY_URL } else { url };
        Self {
            url: url.to_string(),
            http,
            cache: RwLock::default(),
        }
    }

    /// Registry base URL.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// A copy of the remembered search results.
    #[must_use]
    pub fn cached(&self) -> RegistryCache {
        self.cache
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Search repositories.
    ///
    /// # Errors
    ///
    /// Returns [`RepoError::Malformed`] if the registry answers with
    /// something other than a JSON list. Network failures and error
    /// statuses fall back to the remembered results instead.
    pub async fn search_repos(&self, opts: &SearchOptions) -> RepoResult<Vec<RegistryRepo>> {
        match self.get_json::<Vec<RegistryRepo>>("repos", &opts.params(false)).await {
            Ok(repos) => {
                let mut cache = self.cache.write().unwrap_or_else(PoisonError::into_inner);
                cache.repos.clone_from(&repos);
                cache.last_updated = Some(Utc::now());
                Ok(repos)
            },
            Err(e) if is_unreachable(&e) => {
                warn!(
                    registry = %self.url,
                    error = %e,
                    "Registry unavailable, using cached repositories"
                );
                let mut repos: Vec<_> = self
                    .cached()
                    .repos
                    .into_iter()
                    .filter(|r| opts.matches_repo(r))
                    .collect();
                if let Some(sort) = opts.sort {
                    repos.sort_by(|a, b| compare_repos(sort, a, b));
                }
                Ok(opts.page(repos))
            },
            Err(e) => Err(e),
        }
    }

    /// Search commands.
    ///
    /// # Errors
    ///
    /// Same as [`Registry::search_repos`].
    pub async fn search_commands(&self, opts: &SearchOptions) -> RepoResult<Vec<RegistryCommand>> {
        match self
            .get_json::<Vec<RegistryCommand>>("commands", &opts.params(true))
            .await
        {
            Ok(commands) => {
                let mut cache = self.cache.write().unwrap_or_else(PoisonError::into_inner);
                cache.commands.clone_from(&commands);
                cache.last_updated = Some(Utc::now());
                Ok(commands)
            },
            Err(e) if is_unreachable(&e) => {
                warn!(
                    registry = %self.url,
                    error = %e,
                    "Registry unavailable, using cached commands"
                );
                let mut commands: Vec<_> = self
                    .cached()
                    .commands
                    .into_iter()
                    .filter(|c| opts.matches_command(c))
                    .collect();
                if let Some(sort) = opts.sort {
                    commands.sort_by(|a, b| compare_commands(sort, a, b));
                }
                Ok(opts.page(commands))
            },
            Err(e) => Err(e),
        }
    }

    /// The ten most downloaded featured commands.
    ///
    /// # Errors
    ///
    /// Same as [`Registry::search_commands`].
    pub async fn featured(&self) -> RepoResult<Vec<RegistryCommand>> {
        self.search_commands(&SearchOptions {
            featured: true,
            sort: Some(SortBy::Downloads),
            limit: 10,
            ..SearchOptions::default()
        })
        .await
    }

    /// Command categories, or a built-in list when the registry cannot
    /// provide them.
    pub async fn categories(&self) -> Vec<CategoryInfo> {
        match self.get_json::<Vec<CategoryInfo>>("categories", &[]).await {
            Ok(categories) => categories,
            Err(e) => {
                debug!(registry = %self.url, error = %e, "Using built-in categories");
                default_categories()
            },
        }
    }

    /// Split `[registry/]repo/command` into `(repo, command)`.
    ///
    /// A bare command name is looked up in the registry and resolves to the
    /// first match. Empty segments are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`RepoError::UnknownCommand`] if a bare name has no registry
    /// match, or [`RepoError::Malformed`] for an empty reference or one
    /// with more than three segments.
    pub async fn resolve_shorthand(&self, shorthand: &str) -> RepoResult<(String, String)> {
        let parts: Vec<&str> = shorthand.split('/').filter(|p| !p.is_empty()).collect();
        match parts.as_slice() {
            [name] => {
                let opts = SearchOptions {
                    limit: 1,
                    ..SearchOptions::matching(*name)
                };
                let found = self
                    .search_commands(&opts)
                    .await
                    .ok()
                    .and_then(|hits| hits.into_iter().next());
                found
                    .map(|cmd| (cmd.repo, cmd.name))
                    .ok_or_else(|| RepoError::UnknownCommand((*name).to_string()))
            },
            [repo, command] | [_, repo, command] => {
                Ok(((*repo).to_string(), (*command).to_string()))
            },
            _ => Err(RepoError::malformed(
                "command reference",
                format!("'{shorthand}' is not [registry/]repo/command"),
            )),
        }
    }

    /// Find the manifest of the repository at `base_url`.
    ///
    /// Tries `{base_url}/.well-known/scmd.json` (JSON), then
    /// `{base_url}/scmd-repo.yaml`.
    ///
    /// # Errors
    ///
    /// Returns the error from the `scmd-repo.yaml` attempt when neither
    /// document can be fetched and parsed.
    pub async fn discover(&self, base_url: &str) -> RepoResult<Manifest> {
        let base = base_url.trim_end_matches('/');
        let well_known = format!("{base}/{WELL_KNOWN_PATH}");

        let discovered = fetch_text(&self.http, &well_known).await.and_then(|body| {
            serde_json::from_str::<Manifest>(&body)
                .map_err(|e| RepoError::malformed(&well_known, e))
        });
        match discovered {
            Ok(manifest) => {
                debug!(url = %well_known, "Discovered repository manifest");
                return Ok(manifest);
            },
            Err(e) => debug!(url = %well_known, error = %e, "No discovery document"),
        }

        let repo = Repository::new("discovered", base);
        let url = repo.manifest_url();
        let body = fetch_text(&self.http, &url).await?;
        serde_yaml::from_str(&body).map_err(|e| RepoError::malformed(&url, e))
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        params: &[(&'static str, String)],
    ) -> RepoResult<T> {
        let base = format!("{}/{endpoint}", self.url);
        let url = reqwest::Url::parse_with_params(&base, params)
            .map_err(|e| RepoError::malformed(&base, e))?;
        let body = fetch_text(&self.http, url.as_str()).await?;
        serde_json::from_str(&body).map_err(|e| RepoError::malformed(url.as_str(), e))
    }
}

impl Manager {
    /// A registry client sharing this manager's HTTP client.
    #[must_use]
    pub fn registry(&self, url: &str) -> Registry {
        Registry::with_client(url, self.http().clone())
    }
}

fn is_unreachable(e: &RepoError) -> bool {
    matches!(e, RepoError::Http { .. } | RepoError::HttpStatus { .. })
}

fn compare_repos(sort: SortBy, a: &RegistryRepo, b: &RegistryRepo) -> Ordering {
    match sort {
        SortBy::Downloads => b.downloads.cmp(&a.downloads),
        SortBy::Rating => b.stars.cmp(&a.stars),
        SortBy::Updated => b.updated_at.cmp(&a.updated_at),
        SortBy::Name => a.name.cmp(&b.name),
    }
}

fn compare_commands(sort: SortBy, a: &RegistryCommand, b: &RegistryCommand) -> Ordering {
    match sort {
        SortBy::Downloads => b.downloads.cmp(&a.downloads),
        SortBy::Rating => b.rating.total_cmp(&a.rating),
        SortBy::Updated => b.updated_at.cmp(&a.updated_at),
        SortBy::Name => a.name.cmp(&b.name),
    }
}

fn default_categories() -> Vec<CategoryInfo> {
    [
        ("Git", "git", "Git workflow commands"),
        ("Code", "code", "Code analysis and generation"),
        ("DevOps", "devops", "DevOps and infrastructure"),
        ("Data", "data", "Data processing and analysis"),
        ("Docs", "docs", "Documentation generation"),
        ("Debug", "debug", "Debugging and troubleshooting"),
        ("Text", "text", "Text processing"),
        ("Shell", "shell", "Shell and terminal utilities"),
    ]
    .into_iter()
    .map(|(name, slug, description)| CategoryInfo {
        name: name.to_string(),
        slug: slug.to_string(),
        description: description.to_string(),
        icon: String::new(),
        count: 0,
    })
    .collect()
}
