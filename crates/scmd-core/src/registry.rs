//! Command registry.
//!
//! Commands are looked up by primary name or alias. Registration is
//! all-or-nothing: a command whose name or any alias collides is rejected
//! without touching the registry.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use tracing::debug;

use crate::command::{Category, Command};
use crate::error::{CommandError, CommandResult};

#[derive(Default)]
struct Inner {
    commands: HashMap<String, Arc<dyn Command>>,
    /// alias -> primary name
    aliases: HashMap<String, String>,
}

/// Registry of commands available to the CLI.
///
/// Shared behind an `Arc`; registration takes `&self` so plugins can be
/// loaded into a registry that is already in use.
#[derive(Default)]
pub struct CommandRegistry {
    inner: RwLock<Inner>,
}

impl CommandRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a command.
    ///
    /// # Errors
    ///
    /// Returns [`CommandError::AlreadyRegistered`] if the name is taken, or
    /// [`CommandError::AliasConflict`] if any alias is already a name or alias.
    pub fn register(&self, command: Arc<dyn Command>) -> CommandResult<()> {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        let name = command.name().to_string();

        if inner.commands.contains_key(&name) || inner.aliases.contains_key(&name) {
            return Err(CommandError::AlreadyRegistered(name));
        }

        for alias in command.aliases() {
            let existing = if inner.commands.contains_key(alias) || *alias == name {
                Some(alias.clone())
            } else {
                inner.aliases.get(alias).cloned()
            };
            if let Some(existing) = existing {
                return Err(CommandError::AliasConflict {
                    alias: alias.clone(),
                    existing,
                });
            }
        }

        for alias in command.aliases() {
            inner.aliases.insert(alias.clone(), name.clone());
        }
        debug!(command = %name, aliases = command.aliases().len(), "Registered command");
        inner.commands.insert(name, command);
        Ok(())
    }

    /// Remove a command and its aliases. Returns the removed command.
    pub fn unregister(&self, name: &str) -> Option<Arc<dyn Command>> {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        let removed = inner.commands.remove(name)?;
        inner.aliases.retain(|_, target| target != name);
        Some(removed)
    }

    /// Get a command by name or alias.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<dyn Command>> {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        if let Some(command) = inner.commands.get(name) {
            return Some(Arc::clone(command));
        }
        inner
            .aliases
            .get(name)
            .and_then(|primary| inner.commands.get(primary))
            .map(Arc::clone)
    }

    /// Whether a name or alias resolves to a command.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// All commands, sorted by name.
    #[must_use]
    pub fn list(&self) -> Vec<Arc<dyn Command>> {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        let mut commands: Vec<_> = inner.commands.values().map(Arc::clone).collect();
        commands.sort_by(|a, b| a.name().cmp(b.name()));
        commands
    }

    /// Commands in `category`, sorted by name.
    #[must_use]
    pub fn list_by_category(&self, category: &Category) -> Vec<Arc<dyn Command>> {
        self.list()
            .into_iter()
            .filter(|c| c.category() == *category)
            .collect()
    }

    /// Sorted primary names.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        let mut names: Vec<_> = inner.commands.keys().cloned().collect();
        names.sort();
        names
    }

    /// Number of registered commands.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .commands
            .len()
    }

    /// Whether the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for CommandRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandRegistry")
            .field("commands", &self.names())
            .finish()
    }
}
