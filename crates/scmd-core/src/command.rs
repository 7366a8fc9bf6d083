//! The command capability and its execution shapes.

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use scmd_llm::Backend;

use crate::error::CommandResult;
use crate::registry::CommandRegistry;

/// Option key carrying piped input into a command.
pub const STDIN_OPTION: &str = "stdin";

/// Command category used for grouping in help output.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Category {
    /// Core CLI commands.
    Core,
    /// Code analysis commands.
    Code,
    /// Git helpers.
    Git,
    /// Configuration commands.
    Config,
    /// Commands installed from a repository.
    #[default]
    Plugin,
    /// Any other category a repository declares.
    Other(String),
}

impl Category {
    /// The category name.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Core => "core",
            Self::Code => "code",
            Self::Git => "git",
            Self::Config => "config",
            Self::Plugin => "plugin",
            Self::Other(name) => name,
        }
    }
}

impl From<&str> for Category {
    fn from(value: &str) -> Self {
        match value {
            "core" => Self::Core,
            "code" => Self::Code,
            "git" => Self::Git,
            "config" => Self::Config,
            "plugin" | "" => Self::Plugin,
            other => Self::Other(other.to_string()),
        }
    }
}

impl From<String> for Category {
    fn from(value: String) -> Self {
        Self::from(value.as_str())
    }
}

impl From<Category> for String {
    fn from(value: Category) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parsed command-line arguments.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Args {
    /// Positional arguments in order.
    #[serde(default)]
    pub positional: Vec<String>,
    /// Boolean flags by name.
    #[serde(default)]
    pub flags: HashMap<String, bool>,
    /// Named string options. Piped input lives under [`STDIN_OPTION`].
    #[serde(default)]
    pub options: HashMap<String, String>,
    /// The raw, unparsed argument string.
    #[serde(default)]
    pub raw: String,
}

impl Args {
    /// Create empty arguments.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a positional argument.
    #[must_use]
    pub fn with_positional(mut self, value: impl Into<String>) -> Self {
        self.positional.push(value.into());
        self
    }

    /// Set a boolean flag.
    #[must_use]
    pub fn with_flag(mut self, name: impl Into<String>, value: bool) -> Self {
        self.flags.insert(name.into(), value);
        self
    }

    /// Set a named option.
    #[must_use]
    pub fn with_option(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.options.insert(name.into(), value.into());
        self
    }

    /// Set the piped input.
    #[must_use]
    pub fn with_stdin(self, input: impl Into<String>) -> Self {
        self.with_option(STDIN_OPTION, input)
    }

    /// The piped input, or `""` when none was supplied.
    #[must_use]
    pub fn stdin(&self) -> &str {
        self.option(STDIN_OPTION).unwrap_or_default()
    }

    /// Look up a named option.
    #[must_use]
    pub fn option(&self, name: &str) -> Option<&str> {
        self.options.get(name).map(String::as_str)
    }

    /// Whether a flag was set to `true`.
    #[must_use]
    pub fn flag(&self, name: &str) -> bool {
        self.flags.get(name).copied().unwrap_or(false)
    }
}

/// The CLI-wide result of running a command.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandOutput {
    /// Whether the command succeeded.
    pub success: bool,
    /// Text produced by the command.
    #[serde(default)]
    pub output: String,
    /// Human-readable failure description.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub error: String,
    /// Follow-up hints shown to the user.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub suggestions: Vec<String>,
    /// Process exit code.
    #[serde(default)]
    pub exit_code: i32,
}

impl CommandOutput {
    /// A successful result carrying `output`.
    #[must_use]
    pub fn ok(output: impl Into<String>) -> Self {
        Self {
            success: true,
            output: output.into(),
            ..Default::default()
        }
    }

    /// A failed result carrying `error`, with exit code 1.
    #[must_use]
    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: error.into(),
            exit_code: 1,
            ..Default::default()
        }
    }

    /// Attach a suggestion.
    #[must_use]
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestions.push(suggestion.into());
        self
    }
}

/// Shared context handed to every command execution.
#[derive(Clone, Default)]
pub struct ExecContext {
    /// Inference backend, when one is configured.
    pub backend: Option<Arc<dyn Backend>>,
    /// The registry the command was resolved from.
    pub registry: Option<Arc<CommandRegistry>>,
    /// scmd data directory.
    pub data_dir: Option<PathBuf>,
}

impl ExecContext {
    /// Create an empty context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a backend.
    #[must_use]
    pub fn with_backend(mut self, backend: Arc<dyn Backend>) -> Self {
        self.backend = Some(backend);
        self
    }

    /// Attach the command registry.
    #[must_use]
    pub fn with_registry(mut self, registry: Arc<CommandRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Set the data directory.
    #[must_use]
    pub fn with_data_dir(mut self, data_dir: impl Into<PathBuf>) -> Self {
        self.data_dir = Some(data_dir.into());
        self
    }
}

impl fmt::Debug for ExecContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecContext")
            .field("backend", &self.backend.as_ref().map(|b| b.name()))
            .field("registry", &self.registry.as_ref().map(|r| r.len()))
            .field("data_dir", &self.data_dir)
            .finish()
    }
}

/// A command that can be invoked from the CLI.
///
/// Built-in commands and repository plugins both implement this trait and
/// are registered in a [`CommandRegistry`].
#[async_trait]
pub trait Command: Send + Sync {
    /// Primary command name.
    fn name(&self) -> &str;

    /// Alternative names.
    fn aliases(&self) -> &[String] {
        &[]
    }

    /// One-line description.
    fn description(&self) -> &str;

    /// Usage string.
    fn usage(&self) -> &str {
        ""
    }

    /// Example invocations.
    fn examples(&self) -> &[String] {
        &[]
    }

    /// Help category.
    fn category(&self) -> Category;

    /// Whether the command needs an inference backend.
    fn requires_backend(&self) -> bool {
        false
    }

    /// Check the arguments before execution.
    ///
    /// # Errors
    ///
    /// Returns [`CommandError::Validation`](crate::CommandError::Validation)
    /// when the arguments are unusable.
    fn validate(&self, _args: &Args) -> CommandResult<()> {
        Ok(())
    }

    /// Run the command.
    ///
    /// A command that ran but did not succeed reports it through
    /// [`CommandOutput::success`]; `Err` is reserved for failures that
    /// prevented a result altogether.
    async fn execute(&self, args: &Args, ctx: &ExecContext) -> CommandResult<CommandOutput>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_parsing() {
        assert_eq!(Category::from("git"), Category::Git);
        assert_eq!(Category::from(""), Category::Plugin);
        assert_eq!(
            Category::from("docs"),
            Category::Other("docs".to_string())
        );
        assert_eq!(Category::Other("docs".to_string()).as_str(), "docs");
        assert_eq!(Category::default().to_string(), "plugin");
    }

    #[test]
    fn test_category_serde() {
        let json = serde_json::to_string(&Category::Code).unwrap();
        assert_eq!(json, "\"code\"");
        let parsed: Category = serde_json::from_str("\"review\"").unwrap();
        assert_eq!(parsed, Category::Other("review".to_string()));
    }

    #[test]
    fn test_args_helpers() {
        let args = Args::new()
            .with_positional("main.rs")
            .with_flag("verbose", true)
            .with_stdin("piped");

        assert_eq!(args.positional, vec!["main.rs".to_string()]);
        assert!(args.flag("verbose"));
        assert!(!args.flag("quiet"));
        assert_eq!(args.stdin(), "piped");
        assert_eq!(args.option("missing"), None);
        assert_eq!(Args::new().stdin(), "");
    }

    #[test]
    fn test_command_output_constructors() {
        let ok = CommandOutput::ok("done");
        assert!(ok.success);
        assert_eq!(ok.output, "done");
        assert_eq!(ok.exit_code, 0);

        let failed = CommandOutput::failure("boom").with_suggestion("try --help");
        assert!(!failed.success);
        assert_eq!(failed.error, "boom");
        assert_eq!(failed.exit_code, 1);
        assert_eq!(failed.suggestions, vec!["try --help".to_string()]);
    }

    #[test]
    fn test_exec_context_debug_omits_backend_internals() {
        let ctx = ExecContext::new().with_data_dir("/tmp/scmd");
        let debug = format!("{ctx:?}");
        assert!(debug.contains("ExecContext"));
        assert!(debug.contains("/tmp/scmd"));
    }
}
