//! Command repositories, caching and composition for scmd.
//!
//! Commands are declarative YAML specs published in remote repositories.
//! This crate fetches, caches, installs and runs them:
//!
//! - [`Manager`]: repository list, manifest and spec fetching, search, install
//! - [`Cache`]: TTL manifest cache, content-addressed spec cache, install tracking
//! - [`Lockfile`]: version-pinned snapshot of installed commands
//! - [`PluginCommand`]: a [`CommandSpec`] rendered into a prompt and sent to the backend
//! - [`Loader`]: registers installed specs with a [`CommandRegistry`](scmd_core::CommandRegistry)
//! - [`Registry`]: central registry search, shorthand resolution, `.well-known` discovery
//! - [`Composer`]: pipeline, parallel and fallback execution plus dependency resolution
//! - [`PluginSystem`]: all of the above built from [`scmd_config::Config`]
//!
//! # Repository layout
//!
//! A repository is any HTTP base URL serving `scmd-repo.yaml` (the
//! [`Manifest`]) and the spec files it lists, relative to the base URL.
//!
//! # Local layout
//!
//! Under the data directory: `repos.json`, `cache/manifest.json`,
//! `cache/manifests/*.yaml` and `cache/commands/*.yaml`. Installed specs
//! live in the install directory as `{name}.yaml`.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]

mod atomic;
pub mod cache;
pub mod composer;
pub mod error;
pub mod loader;
pub mod lockfile;
pub mod manager;
pub mod plugin_command;
pub mod registry;
pub mod spec;
pub mod system;
pub mod template;
pub mod transform;
pub mod version;

pub use cache::{Cache, CacheManifest, CacheStats, CachedCmd, InstalledCmd, UpdateInfo};
pub use composer::{ChainBuilder, Composer};
pub use error::{ErrorKind, RepoError, RepoResult};
pub use loader::Loader;
pub use lockfile::{LockedCmd, Lockfile};
pub use manager::{Manager, ManagerOptions, SearchResult};
pub use plugin_command::PluginCommand;
pub use registry::{
    CategoryInfo, Registry, RegistryCache, RegistryCommand, RegistryRepo, SearchOptions, SortBy,
};
pub use spec::{
    ArgSpec, CommandSpec, ComposeSpec, Dependency, FlagSpec, Manifest, ManifestCommand, ModelSpec,
    OnError, PipelineStep, PromptSpec, Repository, Topology,
};
pub use system::PluginSystem;
pub use template::TemplateError;
pub use transform::apply_transform;
pub use version::{Constraint, Version, check_version_constraint};
