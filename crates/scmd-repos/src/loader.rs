//! Bridges installed specs on disk into the command registry.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info};

use scmd_core::CommandRegistry;

use crate::error::RepoResult;
use crate::manager::Manager;
use crate::plugin_command::PluginCommand;
use crate::spec::CommandSpec;

/// Loads installed command specs as [`PluginCommand`]s.
#[derive(Debug, Clone)]
pub struct Loader {
    manager: Arc<Manager>,
    install_dir: PathBuf,
    defaults: Option<(usize, f64)>,
}

impl Loader {
    /// Create a loader reading specs from `install_dir`.
    #[must_use]
    pub fn new(manager: Arc<Manager>, install_dir: impl Into<PathBuf>) -> Self {
        Self {
            manager,
            install_dir: install_dir.into(),
            defaults: None,
        }
    }

    /// Request defaults applied to every loaded command.
    #[must_use]
    pub fn with_request_defaults(mut self, max_tokens: usize, temperature: f64) -> Self {
        self.defaults = Some((max_tokens, temperature));
        self
    }

    /// The install directory.
    #[must_use]
    pub fn install_dir(&self) -> &Path {
        &self.install_dir
    }

    /// Wrap a spec the way loaded commands are wrapped.
    #[must_use]
    pub fn command(&self, spec: CommandSpec) -> PluginCommand {
        let command = PluginCommand::new(spec);
        match self.defaults {
            Some((max_tokens, temperature)) => command.with_defaults(max_tokens, temperature),
            None => command,
        }
    }

    /// Parse every installed spec. Malformed files are skipped.
    ///
    /// # Errors
    ///
    /// Returns an error only if the install directory cannot be listed.
    pub fn load_all(&self) -> RepoResult<Vec<PluginCommand>> {
        let specs = self.manager.load_installed_commands(&self.install_dir)?;
        Ok(specs.into_iter().map(|spec| self.command(spec)).collect())
    }

    /// Register every installed command that is not already registered.
    ///
    /// Name and alias collisions are skipped, so commands registered earlier
    /// win. Returns the number of commands registered.
    ///
    /// # Errors
    ///
    /// Returns an error only if the install directory cannot be listed.
    pub fn register_all(&self, registry: &CommandRegistry) -> RepoResult<usize> {
        let mut registered = 0usize;
        for command in self.load_all()? {
            let name = command.spec().name.clone();
            match registry.register(Arc::new(command)) {
                Ok(()) => registered = registered.saturating_add(1),
                Err(e) => debug!(command = %name, error = %e, "Skipping plugin registration"),
            }
        }
        info!(count = registered, dir = %self.install_dir.display(), "Registered plugin commands");
        Ok(registered)
    }
}

#[cfg(test)]
mod tests {
    use scmd_core::Command;
    use scmd_test::FnCommand;

    use super::*;

    fn setup() -> (tempfile::TempDir, Loader) {
        let dir = tempfile::tempdir().unwrap();
        let manager = Arc::new(Manager::new(dir.path()).unwrap());
        let loader = Loader::new(Arc::clone(&manager), dir.path().join("commands"));
        (dir, loader)
    }

    fn install(loader: &Loader, name: &str, aliases: &[&str]) {
        let spec = CommandSpec {
            name: name.to_string(),
            aliases: aliases.iter().map(ToString::to_string).collect(),
            ..Default::default()
        };
        loader
            .manager
            .install_command(&spec, loader.install_dir())
            .unwrap();
    }

    #[test]
    fn test_load_all() {
        let (_dir, loader) = setup();
        assert!(loader.load_all().unwrap().is_empty());

        install(&loader, "explain", &[]);
        install(&loader, "review", &["r"]);
        let names: Vec<_> = loader
            .load_all()
            .unwrap()
            .iter()
            .map(|c| c.name().to_string())
            .collect();
        assert_eq!(names, vec!["explain", "review"]);
    }

    #[test]
    fn test_register_all_skips_collisions() {
        let (_dir, loader) = setup();
        install(&loader, "explain", &[]);
        install(&loader, "help", &[]);
        install(&loader, "review", &["h"]);

        let registry = CommandRegistry::new();
        let builtin = FnCommand::constant("help", "builtin help").with_alias("h");
        registry.register(Arc::new(builtin)).unwrap();

        assert_eq!(loader.register_all(&registry).unwrap(), 1);
        assert!(registry.contains("explain"));
        assert!(!registry.contains("review"));
        assert!(!registry.get("help").unwrap().requires_backend());
        assert!(registry.get("explain").unwrap().requires_backend());
    }
}
