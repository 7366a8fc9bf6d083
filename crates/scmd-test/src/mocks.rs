//! Closure-backed commands for registry and composition tests.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use scmd_core::{Args, Category, Command, CommandError, CommandOutput, CommandResult, ExecContext};

type Handler = dyn Fn(&Args) -> CommandResult<CommandOutput> + Send + Sync;

/// A [`Command`] whose behavior is a closure over its arguments.
pub struct FnCommand {
    name: String,
    aliases: Vec<String>,
    category: Category,
    handler: Arc<Handler>,
    calls: AtomicUsize,
}

impl FnCommand {
    /// Create a command running `handler`.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        handler: impl Fn(&Args) -> CommandResult<CommandOutput> + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            aliases: Vec::new(),
            category: Category::Core,
            handler: Arc::new(handler),
            calls: AtomicUsize::new(0),
        }
    }

    /// Uppercases its stdin.
    #[must_use]
    pub fn upper(name: impl Into<String>) -> Self {
        Self::new(name, |args| Ok(CommandOutput::ok(args.stdin().to_uppercase())))
    }

    /// Returns its stdin unchanged.
    #[must_use]
    pub fn echo(name: impl Into<String>) -> Self {
        Self::new(name, |args| Ok(CommandOutput::ok(args.stdin())))
    }

    /// Always returns `output`.
    #[must_use]
    pub fn constant(name: impl Into<String>, output: impl Into<String>) -> Self {
        let output = output.into();
        Self::new(name, move |_| Ok(CommandOutput::ok(output.clone())))
    }

    /// Runs but reports `success = false` with `error`.
    #[must_use]
    pub fn failing(name: impl Into<String>, error: impl Into<String>) -> Self {
        let error = error.into();
        Self::new(name, move |_| Ok(CommandOutput::failure(error.clone())))
    }

    /// Fails with an execution error.
    #[must_use]
    pub fn erroring(name: impl Into<String>, message: impl Into<String>) -> Self {
        let message = message.into();
        Self::new(name, move |_| Err(CommandError::Execution(message.clone())))
    }

    /// Add an alias.
    #[must_use]
    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.aliases.push(alias.into());
        self
    }

    /// Set the category.
    #[must_use]
    pub fn with_category(mut self, category: Category) -> Self {
        self.category = category;
        self
    }

    /// How many times the command has executed.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl std::fmt::Debug for FnCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnCommand")
            .field("name", &self.name)
            .field("aliases", &self.aliases)
            .field("calls", &self.call_count())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Command for FnCommand {
    fn name(&self) -> &str {
        &self.name
    }

    fn aliases(&self) -> &[String] {
        &self.aliases
    }

    fn description(&self) -> &str {
        "test command"
    }

    fn category(&self) -> Category {
        self.category.clone()
    }

    async fn execute(&self, args: &Args, _ctx: &ExecContext) -> CommandResult<CommandOutput> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        (self.handler)(args)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fn_command_variants() {
        let ctx = ExecContext::new();
        let args = Args::new().with_stdin("hello");

        let upper = FnCommand::upper("upper");
        assert_eq!(upper.execute(&args, &ctx).await.unwrap().output, "HELLO");
        assert_eq!(upper.call_count(), 1);

        let failing = FnCommand::failing("f", "nope");
        let output = failing.execute(&args, &ctx).await.unwrap();
        assert!(!output.success);
        assert_eq!(output.error, "nope");

        let erroring = FnCommand::erroring("e", "boom");
        assert!(erroring.execute(&args, &ctx).await.is_err());
    }
}
