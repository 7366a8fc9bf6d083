//! Configuration types.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ConfigResult};

/// Name of the data directory created under the user's home.
const DATA_DIR_NAME: &str = ".scmd";

/// Root configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Repository, cache and install settings.
    pub repos: ReposConfig,
    /// Defaults applied to completion requests.
    pub backend: BackendConfig,
    /// Logging settings.
    pub logging: LoggingConfig,
}

/// A repository seeded when no repository list exists yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoEntry {
    /// Repository name.
    pub name: String,
    /// Base URL.
    pub url: String,
    /// Description.
    #[serde(default)]
    pub description: String,
}

/// Repository, cache and install settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReposConfig {
    /// Data directory. Defaults to `~/.scmd`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<PathBuf>,
    /// Directory holding installed command specs. Defaults to `{data_dir}/commands`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub install_dir: Option<PathBuf>,
    /// Timeout applied to every repository request.
    pub http_timeout_secs: u64,
    /// How long a fetched manifest stays fresh in the cache.
    pub manifest_ttl_secs: u64,
    /// User agent sent with repository requests.
    pub user_agent: String,
    /// Repositories seeded on first run.
    pub default_repos: Vec<RepoEntry>,
    /// Central registry API used for discovery and shorthand resolution.
    pub registry_url: String,
}

impl Default for ReposConfig {
    fn default() -> Self {
        Self {
            data_dir: None,
            install_dir: None,
            http_timeout_secs: 30,
            manifest_ttl_secs: 3600,
            user_agent: "scmd".to_string(),
            default_repos: vec![RepoEntry {
                name: "official".to_string(),
                url: "https://raw.githubusercontent.com/scmd/commands/main".to_string(),
                description: "Official scmd commands".to_string(),
            }],
            registry_url: "https://registry.scmd.dev/api/v1".to_string(),
        }
    }
}

impl ReposConfig {
    /// Resolve the data directory.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::NoHomeDir`] if no data directory is configured
    /// and the home directory cannot be determined.
    pub fn data_dir(&self) -> ConfigResult<PathBuf> {
        if let Some(dir) = &self.data_dir {
            return Ok(dir.clone());
        }
        directories::BaseDirs::new()
            .map(|d| d.home_dir().join(DATA_DIR_NAME))
            .ok_or(ConfigError::NoHomeDir)
    }

    /// Resolve the install directory.
    ///
    /// # Errors
    ///
    /// Same as [`ReposConfig::data_dir`].
    pub fn install_dir(&self) -> ConfigResult<PathBuf> {
        match &self.install_dir {
            Some(dir) => Ok(dir.clone()),
            None => Ok(self.data_dir()?.join("commands")),
        }
    }

    /// HTTP timeout as a [`Duration`].
    #[must_use]
    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    /// Manifest TTL as a [`Duration`].
    #[must_use]
    pub fn manifest_ttl(&self) -> Duration {
        Duration::from_secs(self.manifest_ttl_secs)
    }
}

/// Defaults applied to completion requests.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Token budget when a command does not set one.
    pub max_tokens: usize,
    /// Temperature when a command does not set one.
    pub temperature: f64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            max_tokens: 2048,
            temperature: 0.7,
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Base level filter.
    pub level: String,
    /// One of `pretty`, `compact`, `json`, `full`.
    pub format: String,
    /// Extra `target=level` directives.
    pub directives: Vec<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "compact".to_string(),
            directives: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_install_dir_defaults_under_data_dir() {
        let repos = ReposConfig {
            data_dir: Some(PathBuf::from("/srv/scmd")),
            ..Default::default()
        };
        assert_eq!(
            repos.install_dir().unwrap(),
            PathBuf::from("/srv/scmd/commands")
        );
    }

    #[test]
    fn test_explicit_install_dir_wins() {
        let repos = ReposConfig {
            data_dir: Some(PathBuf::from("/srv/scmd")),
            install_dir: Some(PathBuf::from("/opt/cmds")),
            ..Default::default()
        };
        assert_eq!(repos.install_dir().unwrap(), PathBuf::from("/opt/cmds"));
    }

    #[test]
    fn test_durations() {
        let repos = ReposConfig::default();
        assert_eq!(repos.http_timeout(), Duration::from_secs(30));
        assert_eq!(repos.manifest_ttl(), Duration::from_secs(3600));
    }
}
