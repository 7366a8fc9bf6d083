//! Wiring of the plugin subsystem from configuration.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::info;

use scmd_config::Config;
use scmd_core::CommandRegistry;

use crate::cache::Cache;
use crate::composer::Composer;
use crate::error::RepoResult;
use crate::loader::Loader;
use crate::manager::{Manager, ManagerOptions};
use crate::registry::Registry;

/// The manager, cache, loader and composer sharing one command registry,
/// plus a client for the central command registry.
#[derive(Debug, Clone)]
pub struct PluginSystem {
    manager: Arc<Manager>,
    cache: Arc<Cache>,
    registry: Arc<Registry>,
    loader: Arc<Loader>,
    composer: Composer,
    install_dir: PathBuf,
}

impl PluginSystem {
    /// Build the subsystem from configuration and load persisted state.
    ///
    /// # Errors
    ///
    /// Returns an error if the data directory cannot be resolved, or if
    /// `repos.json` or the cache index exist but cannot be read.
    pub fn from_config(config: &Config, registry: Arc<CommandRegistry>) -> RepoResult<Self> {
        let data_dir = config.repos.data_dir()?;
        let install_dir = config.repos.install_dir()?;

        let cache = Arc::new(Cache::new(&data_dir));
        cache.load()?;

        let manager = Manager::with_options(&data_dir, ManagerOptions::from(&config.repos))?
            .with_cache(Arc::clone(&cache));
        manager.load()?;
        let central_registry = Arc::new(manager.registry(&config.repos.registry_url));
        let manager = Arc::new(manager);

        let loader = Arc::new(
            Loader::new(Arc::clone(&manager), &install_dir)
                .with_request_defaults(config.backend.max_tokens, config.backend.temperature),
        );
        let composer = Composer::new(registry).with_loader(Arc::clone(&loader));

        info!(
            data_dir = %data_dir.display(),
            install_dir = %install_dir.display(),
            repos = manager.list().len(),
            "Plugin system ready"
        );
        Ok(Self {
            manager,
            cache,
            registry: central_registry,
            loader,
            composer,
            install_dir,
        })
    }

    /// Register installed plugins with the composer's registry.
    ///
    /// # Errors
    ///
    /// Returns an error if the install directory cannot be listed.
    pub fn register_installed(&self) -> RepoResult<usize> {
        self.loader.register_all(self.composer.registry())
    }

    /// Persist the repository list and cache index.
    ///
    /// # Errors
    ///
    /// Returns an error if either file cannot be written.
    pub fn save(&self) -> RepoResult<()> {
        self.manager.save()?;
        self.cache.save()
    }

    /// The repository manager.
    #[must_use]
    pub fn manager(&self) -> &Arc<Manager> {
        &self.manager
    }

    /// The cache.
    #[must_use]
    pub fn cache(&self) -> &Arc<Cache> {
        &self.cache
    }

    /// The central registry client.
    #[must_use]
    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// The loader.
    #[must_use]
    pub fn loader(&self) -> &Arc<Loader> {
        &self.loader
    }

    /// The composer.
    #[must_use]
    pub fn composer(&self) -> &Composer {
        &self.composer
    }

    /// Directory holding installed specs.
    #[must_use]
    pub fn install_dir(&self) -> &Path {
        &self.install_dir
    }
}
