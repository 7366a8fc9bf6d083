//! Config file discovery and layered loading.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::{ConfigError, ConfigResult};
use crate::types::Config;

/// Embedded default configuration.
const DEFAULTS_TOML: &str = include_str!("defaults.toml");

/// Overrides `repos.data_dir`.
pub const ENV_DATA_DIR: &str = "SCMD_DATA_DIR";
/// Overrides `repos.install_dir`.
pub const ENV_INSTALL_DIR: &str = "SCMD_INSTALL_DIR";
/// Overrides `logging.level`.
pub const ENV_LOG_LEVEL: &str = "SCMD_LOG_LEVEL";
/// Overrides `repos.http_timeout_secs`.
pub const ENV_HTTP_TIMEOUT: &str = "SCMD_HTTP_TIMEOUT_SECS";

/// Upper bound on config file size.
const MAX_CONFIG_FILE_SIZE: u64 = 1024 * 1024;

impl Config {
    /// Load configuration from defaults, `path` (or `~/.scmd/config.toml`
    /// when `None`) and the process environment.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the file is unreadable or malformed, or
    /// the merged configuration fails validation.
    pub fn load(path: Option<&Path>) -> ConfigResult<Self> {
        let env: HashMap<String, String> = std::env::vars()
            .filter(|(key, _)| key.starts_with("SCMD_"))
            .collect();
        let path = path.map(Path::to_path_buf).or_else(default_config_path);
        Self::load_with_env(path.as_deref(), &env)
    }

    /// Load configuration from defaults, an optional file and an explicit
    /// environment map.
    ///
    /// # Errors
    ///
    /// Same as [`Config::load`].
    pub fn load_with_env(path: Option<&Path>, env: &HashMap<String, String>) -> ConfigResult<Self> {
        let mut merged: toml::Value =
            toml::from_str(DEFAULTS_TOML).map_err(|e| ConfigError::ParseError {
                path: "<embedded defaults>".to_owned(),
                source: e,
            })?;

        if let Some(path) = path
            && let Some(overlay) = try_load_file(path)?
        {
            deep_merge(&mut merged, &overlay);
            info!(path = %path.display(), "loaded user config");
        }

        apply_env_overrides(&mut merged, env)?;

        let config = merged
            .try_into::<Self>()
            .map_err(|e| ConfigError::SchemaError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Check field values.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ValidationError`] naming the first bad field.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.repos.http_timeout_secs == 0 {
            return Err(invalid("repos.http_timeout_secs", "must be greater than zero"));
        }
        if self.repos.manifest_ttl_secs == 0 {
            return Err(invalid("repos.manifest_ttl_secs", "must be greater than zero"));
        }
        if self.repos.registry_url.trim().is_empty() {
            return Err(invalid("repos.registry_url", "must not be empty"));
        }
        if !(0.0..=2.0).contains(&self.backend.temperature) {
            return Err(invalid("backend.temperature", "must be between 0.0 and 2.0"));
        }
        for (i, repo) in self.repos.default_repos.iter().enumerate() {
            if repo.name.trim().is_empty() {
                return Err(invalid(
                    &format!("repos.default_repos[{i}].name"),
                    "must not be empty",
                ));
            }
            if repo.url.trim().is_empty() {
                return Err(invalid(
                    &format!("repos.default_repos[{i}].url"),
                    "must not be empty",
                ));
            }
        }
        Ok(())
    }
}

fn invalid(field: &str, message: &str) -> ConfigError {
    ConfigError::ValidationError {
        field: field.to_owned(),
        message: message.to_owned(),
    }
}

/// Recursively deep-merge `overlay` into `base`.
///
/// - Tables merge recursively per-field.
/// - Scalars and arrays from the overlay **replace** the base value.
pub fn deep_merge(base: &mut toml::Value, overlay: &toml::Value) {
    match (base, overlay) {
        (toml::Value::Table(base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                if let Some(base_val) = base_table.get_mut(key) {
                    deep_merge(base_val, overlay_val);
                } else {
                    base_table.insert(key.clone(), overlay_val.clone());
                }
            }
        },
        (base, overlay) => {
            *base = overlay.clone();
        },
    }
}

fn default_config_path() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| d.home_dir().join(".scmd").join("config.toml"))
}

fn try_load_file(path: &Path) -> ConfigResult<Option<toml::Value>> {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "config file not found, skipping");
            return Ok(None);
        },
        Err(e) => {
            return Err(ConfigError::ReadError {
                path: path.display().to_string(),
                source: e,
            });
        },
    };

    if content.len() as u64 > MAX_CONFIG_FILE_SIZE {
        return Err(ConfigError::ValidationError {
            field: path.display().to_string(),
            message: format!(
                "config file is {} bytes, exceeding the {} byte limit",
                content.len(),
                MAX_CONFIG_FILE_SIZE
            ),
        });
    }

    let value = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
        path: path.display().to_string(),
        source: e,
    })?;
    Ok(Some(value))
}

fn apply_env_overrides(
    merged: &mut toml::Value,
    env: &HashMap<String, String>,
) -> ConfigResult<()> {
    if let Some(dir) = env.get(ENV_DATA_DIR) {
        set_path(merged, "repos", "data_dir", toml::Value::String(dir.clone()));
    }
    if let Some(dir) = env.get(ENV_INSTALL_DIR) {
        set_path(merged, "repos", "install_dir", toml::Value::String(dir.clone()));
    }
    if let Some(level) = env.get(ENV_LOG_LEVEL) {
        set_path(merged, "logging", "level", toml::Value::String(level.clone()));
    }
    if let Some(raw) = env.get(ENV_HTTP_TIMEOUT) {
        let secs: i64 = raw.trim().parse().map_err(|_| ConfigError::ValidationError {
            field: ENV_HTTP_TIMEOUT.to_owned(),
            message: format!("expected a whole number of seconds, got '{raw}'"),
        })?;
        set_path(merged, "repos", "http_timeout_secs", toml::Value::Integer(secs));
    }
    Ok(())
}

fn set_path(merged: &mut toml::Value, section: &str, key: &str, value: toml::Value) {
    if let toml::Value::Table(root) = merged {
        let table = root
            .entry(section.to_owned())
            .or_insert(toml::Value::Table(toml::map::Map::new()));
        if let toml::Value::Table(table) = table {
            debug!(section, key, "applying environment override");
            table.insert(key.to_owned(), value);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    fn no_env() -> HashMap<String, String> {
        HashMap::new()
    }

    #[test]
    fn test_embedded_defaults_parse() {
        let config = Config::load_with_env(None, &no_env()).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.repos.default_repos[0].name, "official");
    }

    #[test]
    fn test_missing_file_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let config =
            Config::load_with_env(Some(&dir.path().join("nope.toml")), &no_env()).unwrap();
        assert_eq!(config.repos.http_timeout_secs, 30);
    }

    #[test]
    fn test_file_overlay_deep_merges() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "[repos]\nmanifest_ttl_secs = 60\n\n[logging]\nlevel = \"debug\"\n",
        )
        .unwrap();

        let config = Config::load_with_env(Some(&path), &no_env()).unwrap();
        assert_eq!(config.repos.manifest_ttl_secs, 60);
        // Untouched siblings keep their defaults.
        assert_eq!(config.repos.http_timeout_secs, 30);
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.logging.format, "compact");
    }

    #[test]
    fn test_env_overrides_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[logging]\nlevel = \"debug\"\n").unwrap();

        let env = HashMap::from([
            (ENV_LOG_LEVEL.to_string(), "trace".to_string()),
            (ENV_DATA_DIR.to_string(), "/data/scmd".to_string()),
            (ENV_HTTP_TIMEOUT.to_string(), "5".to_string()),
        ]);
        let config = Config::load_with_env(Some(&path), &env).unwrap();
        assert_eq!(config.logging.level, "trace");
        assert_eq!(config.repos.data_dir, Some(PathBuf::from("/data/scmd")));
        assert_eq!(config.repos.http_timeout_secs, 5);
    }

    #[test]
    fn test_bad_timeout_env_rejected() {
        let env = HashMap::from([(ENV_HTTP_TIMEOUT.to_string(), "soon".to_string())]);
        let err = Config::load_with_env(None, &env).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError { .. }));
    }

    #[test]
    fn test_malformed_file_is_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[repos\n").unwrap();

        let err = Config::load_with_env(Some(&path), &no_env()).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { .. }));
    }

    #[test]
    fn test_validation_rejects_zero_ttl() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[repos]\nmanifest_ttl_secs = 0\n").unwrap();

        let err = Config::load_with_env(Some(&path), &no_env()).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::ValidationError { ref field, .. } if field == "repos.manifest_ttl_secs"
        ));
    }

    #[test]
    fn test_validation_rejects_blank_registry_url() {
        let mut config = Config::default();
        config.repos.registry_url = "  ".to_string();
        assert!(matches!(
            config.validate().unwrap_err(),
            ConfigError::ValidationError { ref field, .. } if field == "repos.registry_url"
        ));
    }

    #[test]
    fn test_validation_rejects_hot_temperature() {
        let mut config = Config::default();
        config.backend.temperature = 3.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_deep_merge_replaces_arrays() {
        let mut base: toml::Value = toml::from_str("a = [1, 2]\n[t]\nx = 1\ny = 2").unwrap();
        let overlay: toml::Value = toml::from_str("a = [3]\n[t]\ny = 9").unwrap();
        deep_merge(&mut base, &overlay);

        assert_eq!(base["a"].as_array().unwrap().len(), 1);
        assert_eq!(base["t"]["x"].as_integer(), Some(1));
        assert_eq!(base["t"]["y"].as_integer(), Some(9));
    }
}
