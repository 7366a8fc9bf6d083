//! scmd Config - Layered configuration for scmd.
//!
//! Configuration is resolved in order, later layers winning:
//! 1. Embedded `defaults.toml`
//! 2. An optional user `config.toml` (deep-merged)
//! 3. `SCMD_*` environment overrides
//!
//! The merged tree is deserialized into [`Config`] and validated.
//!
//! # Example
//!
//! ```rust,no_run
//! # fn main() -> Result<(), scmd_config::ConfigError> {
//! let config = scmd_config::Config::load(None)?;
//! println!("data dir: {}", config.repos.data_dir()?.display());
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]

mod error;
mod loader;
mod types;

pub use error::{ConfigError, ConfigResult};
pub use loader::{ENV_DATA_DIR, ENV_HTTP_TIMEOUT, ENV_INSTALL_DIR, ENV_LOG_LEVEL, deep_merge};
pub use types::{BackendConfig, Config, LoggingConfig, RepoEntry, ReposConfig};
