//! Command composition: pipelines, parallel fan-out and fallbacks.
//!
//! Steps are resolved by name or alias from the shared
//! [`CommandRegistry`]. When a name is missing and a [`Loader`] is attached,
//! installed plugins are registered and the lookup is retried once.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use futures::future::join_all;
use tracing::{debug, info, warn};

use scmd_core::{Args, Command, CommandOutput, CommandRegistry, ExecContext};

use crate::error::{RepoError, RepoResult};
use crate::loader::Loader;
use crate::manager::Manager;
use crate::plugin_command::PluginCommand;
use crate::spec::{CommandSpec, ComposeSpec, Dependency, OnError, PipelineStep, Topology};
use crate::transform::apply_transform;
use crate::version::check_version_constraint;

/// Executes composed commands against a registry.
#[derive(Debug, Clone)]
pub struct Composer {
    registry: Arc<CommandRegistry>,
    loader: Option<Arc<Loader>>,
}

impl Composer {
    /// Create a composer over `registry`.
    #[must_use]
    pub fn new(registry: Arc<CommandRegistry>) -> Self {
        Self {
            registry,
            loader: None,
        }
    }

    /// Attach a loader used to refresh the registry on lookup misses.
    #[must_use]
    pub fn with_loader(mut self, loader: Arc<Loader>) -> Self {
        self.loader = Some(loader);
        self
    }

    /// The registry commands are resolved from.
    #[must_use]
    pub fn registry(&self) -> &Arc<CommandRegistry> {
        &self.registry
    }

    /// Run `spec`: its composition when it has one, otherwise the spec itself
    /// as a plugin command.
    ///
    /// # Errors
    ///
    /// See [`Composer::execute_composed`]; a plain spec only errors if the
    /// command itself does.
    pub async fn execute(
        &self,
        spec: &CommandSpec,
        args: &Args,
        ctx: &ExecContext,
    ) -> RepoResult<CommandOutput> {
        if spec.is_composed() {
            return self.execute_composed(spec, args, ctx).await;
        }
        let command = match &self.loader {
            Some(loader) => loader.command(spec.clone()),
            None => PluginCommand::new(spec.clone()),
        };
        Ok(command.execute(args, ctx).await?)
    }

    /// Run the composition declared by `spec`.
    ///
    /// # Errors
    ///
    /// Returns [`RepoError::Composition`] if `spec` has no composition or an
    /// empty or ambiguous one, [`RepoError::StepFailed`] when an aborting
    /// pipeline step is missing or errors, and
    /// [`RepoError::FallbackExhausted`] when no fallback succeeds.
    pub async fn execute_composed(
        &self,
        spec: &CommandSpec,
        args: &Args,
        ctx: &ExecContext,
    ) -> RepoResult<CommandOutput> {
        let compose = spec
            .compose
            .as_ref()
            .ok_or_else(|| RepoError::Composition("command has no composition defined".into()))?;
        self.run(compose, args, ctx).await
    }

    /// Run a composition directly.
    ///
    /// # Errors
    ///
    /// Same as [`Composer::execute_composed`].
    pub async fn run(
        &self,
        compose: &ComposeSpec,
        args: &Args,
        ctx: &ExecContext,
    ) -> RepoResult<CommandOutput> {
        match compose.topology()? {
            Topology::Pipeline(steps) => self.pipeline(steps, args, ctx).await,
            Topology::Parallel(names) => Ok(self.parallel(names, args, ctx).await),
            Topology::Fallback(names) => self.fallback(names, args, ctx).await,
        }
    }

    fn resolve(&self, name: &str) -> Option<Arc<dyn Command>> {
        if let Some(command) = self.registry.get(name) {
            return Some(command);
        }
        let loader = self.loader.as_ref()?;
        if let Err(e) = loader.register_all(&self.registry) {
            debug!(command = name, error = %e, "Plugin refresh failed");
            return None;
        }
        self.registry.get(name)
    }

    async fn pipeline(
        &self,
        steps: &[PipelineStep],
        args: &Args,
        ctx: &ExecContext,
    ) -> RepoResult<CommandOutput> {
        let mut last_output = args.stdin().to_string();

        for (index, step) in steps.iter().enumerate() {
            let skip = step.on_error == OnError::Continue;
            let step_failed = |source: RepoError| RepoError::StepFailed {
                index,
                command: step.command.clone(),
                source: Box::new(source),
            };

            let Some(command) = self.resolve(&step.command) else {
                if skip {
                    debug!(index, command = %step.command, "Skipping missing pipeline step");
                    continue;
                }
                return Err(step_failed(RepoError::UnknownCommand(step.command.clone())));
            };

            let mut step_args = Args::new().with_stdin(last_output.as_str());
            for (key, value) in &step.args {
                step_args.options.insert(key.clone(), value.clone());
            }

            let result = match command.execute(&step_args, ctx).await {
                Ok(result) => result,
                Err(e) if skip => {
                    debug!(
                        index,
                        command = %step.command,
                        error = %e,
                        "Skipping failed pipeline step"
                    );
                    continue;
                },
                Err(e) => return Err(step_failed(e.into())),
            };

            if !result.success {
                if skip {
                    debug!(
                        index,
                        command = %step.command,
                        error = %result.error,
                        "Skipping unsuccessful pipeline step"
                    );
                    continue;
                }
                return Ok(result);
            }

            last_output = match &step.transform {
                Some(transform) => apply_transform(&result.output, transform),
                None => result.output,
            };
        }

        Ok(CommandOutput::ok(last_output))
    }

    async fn parallel(&self, names: &[String], args: &Args, ctx: &ExecContext) -> CommandOutput {
        let branches = names.iter().map(|name| async move {
            let Some(command) = self.resolve(name) else {
                return Err(RepoError::UnknownCommand(name.clone()));
            };
            command.execute(args, ctx).await.map_err(RepoError::from)
        });
        let results = join_all(branches).await;

        let mut success = true;
        let mut blocks = Vec::with_capacity(names.len());
        for (name, result) in names.iter().zip(results) {
            match result {
                Ok(output) => {
                    success &= output.success;
                    blocks.push(format!("## {name}\n{}", output.output));
                },
                Err(e) => {
                    success = false;
                    blocks.push(format!("## {name}\n[{name}] Error: {e}"));
                },
            }
        }

        CommandOutput {
            success,
            output: blocks.join("\n\n"),
            exit_code: i32::from(!success),
            ..Default::default()
        }
    }

    async fn fallback(
        &self,
        names: &[String],
        args: &Args,
        ctx: &ExecContext,
    ) -> RepoResult<CommandOutput> {
        let mut last = String::from("no commands to try");

        for name in names {
            let Some(command) = self.resolve(name) else {
                last = RepoError::UnknownCommand(name.clone()).to_string();
                continue;
            };
            match command.execute(args, ctx).await {
                Ok(result) if result.success => return Ok(result),
                Ok(result) => last = format!("{name}: {}", result.error),
                Err(e) => last = e.to_string(),
            }
            debug!(command = %name, reason = %last, "Fallback alternative failed");
        }

        Err(RepoError::FallbackExhausted { last })
    }

    /// Install and register every dependency of `spec` that is not already
    /// registered. Returns the names of the commands installed.
    ///
    /// # Errors
    ///
    /// The first failing non-optional dependency aborts resolution with its
    /// error; optional ones are skipped.
    pub async fn resolve_dependencies(
        &self,
        spec: &CommandSpec,
        manager: &Manager,
        install_dir: &Path,
    ) -> RepoResult<Vec<String>> {
        let mut installed = Vec::new();

        for dep in &spec.dependencies {
            if self.is_satisfied(dep, install_dir) {
                debug!(dependency = %dep.command, "Dependency already available");
                continue;
            }
            match self.install_dependency(dep, manager, install_dir).await {
                Ok(name) => installed.push(name),
                Err(e) if dep.optional => {
                    debug!(dependency = %dep.command, error = %e, "Skipping optional dependency");
                },
                Err(e) => {
                    warn!(
                        command = %spec.name,
                        dependency = %dep.command,
                        error = %e,
                        "Dependency resolution failed"
                    );
                    return Err(e);
                },
            }
        }

        if !installed.is_empty() {
            info!(command = %spec.name, installed = ?installed, "Resolved dependencies");
        }
        Ok(installed)
    }

    /// A dependency is satisfied by a command registered under the full
    /// `repo/command` reference, or under the bare command name when that
    /// command is also installed as a plugin in `install_dir`. A built-in
    /// that merely shares the name does not count.
    fn is_satisfied(&self, dep: &Dependency, install_dir: &Path) -> bool {
        if self.registry.contains(&dep.command) {
            return true;
        }
        dep.parts().is_ok_and(|(_, command)| {
            self.registry.contains(command) && install_dir.join(format!("{command}.yaml")).is_file()
        })
    }

    async fn install_dependency(
        &self,
        dep: &Dependency,
        manager: &Manager,
        install_dir: &Path,
    ) -> RepoResult<String> {
        let (repo_name, command) = dep.parts()?;
        let (repo, dep_spec) = manager.find_command(repo_name, command).await?;

        if !check_version_constraint(&dep_spec.version, &dep.version)? {
            return Err(RepoError::DependencyUnsatisfied {
                command: dep.command.clone(),
                version: dep_spec.version,
                constraint: dep.version.clone(),
            });
        }

        manager.install_command(&dep_spec, install_dir)?;
        manager.record_install(&repo, &dep_spec)?;

        let name = dep_spec.name.clone();
        let plugin = match &self.loader {
            Some(loader) => loader.command(dep_spec),
            None => PluginCommand::new(dep_spec),
        };
        if let Err(e) = self.registry.register(Arc::new(plugin)) {
            debug!(command = %name, error = %e, "Dependency installed but not registered");
        }
        Ok(name)
    }
}

/// Builds a pipeline [`ComposeSpec`] step by step.
///
/// ```rust
/// use scmd_repos::{ChainBuilder, OnError};
///
/// let compose = ChainBuilder::new()
///     .add("explain")
///     .transform("trim")
///     .add_with_args("summarize", [("style", "bullets")])
///     .on_error(OnError::Continue)
///     .build();
/// assert_eq!(compose.pipeline.len(), 2);
/// ```
#[derive(Debug, Clone, Default)]
pub struct ChainBuilder {
    steps: Vec<PipelineStep>,
}

impl ChainBuilder {
    /// An empty chain.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a step.
    #[must_use]
    pub fn add(mut self, command: impl Into<String>) -> Self {
        self.steps.push(PipelineStep::new(command));
        self
    }

    /// Append a step with options.
    #[must_use]
    pub fn add_with_args<K, V>(
        mut self,
        command: impl Into<String>,
        args: impl IntoIterator<Item = (K, V)>,
    ) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        let mut step = PipelineStep::new(command);
        step.args = args
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect::<BTreeMap<_, _>>();
        self.steps.push(step);
        self
    }

    /// Set the transform of the last step. No-op on an empty chain.
    #[must_use]
    pub fn transform(mut self, transform: impl Into<String>) -> Self {
        if let Some(step) = self.steps.last_mut() {
            step.transform = Some(transform.into());
        }
        self
    }

    /// Set the failure policy of the last step. No-op on an empty chain.
    #[must_use]
    pub fn on_error(mut self, policy: OnError) -> Self {
        if let Some(step) = self.steps.last_mut() {
            step.on_error = policy;
        }
        self
    }

    /// Finish the chain.
    #[must_use]
    pub fn build(self) -> ComposeSpec {
        ComposeSpec {
            pipeline: self.steps,
            ..Default::default()
        }
    }
}
