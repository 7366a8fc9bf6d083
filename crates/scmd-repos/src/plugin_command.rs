//! A [`CommandSpec`] exposed as a [`Command`].
//!
//! Execution renders the spec's prompt templates against the invocation's
//! arguments and sends a single completion request to the backend. Every
//! failure along the way is reported as an unsuccessful [`CommandOutput`]
//! rather than an error.

use std::collections::HashMap;

use async_trait::async_trait;
use tracing::{debug, warn};

use scmd_core::{Args, Category, Command, CommandError, CommandOutput, CommandResult, ExecContext};
use scmd_llm::{CompletionRequest, DEFAULT_MAX_TOKENS, DEFAULT_TEMPERATURE};

use crate::spec::CommandSpec;
use crate::template::render;

/// A command backed by a repository spec.
#[derive(Debug, Clone)]
pub struct PluginCommand {
    spec: CommandSpec,
    category: Category,
    max_tokens: usize,
    temperature: f64,
}

impl PluginCommand {
    /// Wrap a spec.
    #[must_use]
    pub fn new(spec: CommandSpec) -> Self {
        let category = Category::from(spec.category.as_str());
        Self {
            spec,
            category,
            max_tokens: DEFAULT_MAX_TOKENS,
            temperature: DEFAULT_TEMPERATURE,
        }
    }

    /// Request defaults used when the spec's model section leaves them unset.
    #[must_use]
    pub fn with_defaults(mut self, max_tokens: usize, temperature: f64) -> Self {
        self.max_tokens = max_tokens;
        self.temperature = temperature;
        self
    }

    /// The wrapped spec.
    #[must_use]
    pub fn spec(&self) -> &CommandSpec {
        &self.spec
    }

    /// Template variables for an invocation.
    fn template_vars(&self, args: &Args) -> HashMap<String, String> {
        let mut vars = HashMap::new();

        for (index, arg) in self.spec.args.iter().enumerate() {
            let value = args
                .positional
                .get(index)
                .cloned()
                .unwrap_or_else(|| arg.default.clone());
            vars.insert(arg.name.clone(), value);
        }
        for flag in &self.spec.flags {
            let value = args
                .option(&flag.name)
                .map_or_else(|| flag.default.clone(), str::to_string);
            vars.insert(flag.name.clone(), value);
        }

        let stdin = args.stdin().to_string();
        vars.insert("input".to_string(), stdin.clone());
        vars.insert("stdin".to_string(), stdin);
        vars.insert(
            "args".to_string(),
            serde_json::to_string(&args.positional).unwrap_or_default(),
        );
        vars.insert("all_args".to_string(), args.positional.join(" "));
        vars
    }

    fn request(&self, prompt: String, system: String) -> CompletionRequest {
        let model = &self.spec.model;
        let mut request = CompletionRequest::new(prompt)
            .with_system_prompt(system)
            .with_max_tokens(self.max_tokens)
            .with_temperature(self.temperature);
        if model.max_tokens > 0 {
            request = request.with_max_tokens(model.max_tokens);
        }
        if model.temperature > 0.0 {
            request = request.with_temperature(model.temperature);
        }
        if !model.preferred.is_empty() {
            request = request.with_model(model.preferred.clone());
        }
        request
    }
}

#[async_trait]
impl Command for PluginCommand {
    fn name(&self) -> &str {
        &self.spec.name
    }

    fn aliases(&self) -> &[String] {
        &self.spec.aliases
    }

    fn description(&self) -> &str {
        &self.spec.description
    }

    fn usage(&self) -> &str {
        &self.spec.usage
    }

    fn examples(&self) -> &[String] {
        &self.spec.examples
    }

    fn category(&self) -> Category {
        self.category.clone()
    }

    fn requires_backend(&self) -> bool {
        true
    }

    fn validate(&self, args: &Args) -> CommandResult<()> {
        for (index, arg) in self.spec.args.iter().enumerate() {
            if arg.required && index >= args.positional.len() && arg.default.is_empty() {
                return Err(CommandError::Validation(format!(
                    "missing required argument: {}",
                    arg.name
                )));
            }
        }
        Ok(())
    }

    async fn execute(&self, args: &Args, ctx: &ExecContext) -> CommandResult<CommandOutput> {
        if let Err(e) = self.validate(args) {
            return Ok(CommandOutput::failure(e.to_string())
                .with_suggestion(format!("usage: {}", self.spec.usage)));
        }

        let Some(backend) = &ctx.backend else {
            return Ok(CommandOutput::failure("no backend available"));
        };

        let vars = self.template_vars(args);
        let prompt = match render(&self.spec.prompt.template, &vars) {
            Ok(prompt) => prompt,
            Err(e) => return Ok(CommandOutput::failure(format!("template error: {e}"))),
        };
        let system = match render(&self.spec.prompt.system, &vars) {
            Ok(system) => system,
            Err(e) => {
                return Ok(CommandOutput::failure(format!("system template error: {e}")));
            },
        };

        let request = self.request(prompt, system);
        debug!(
            command = %self.spec.name,
            backend = backend.name(),
            max_tokens = request.max_tokens,
            "Executing plugin command"
        );

        match backend.complete(&request).await {
            Ok(response) => Ok(CommandOutput::ok(response.content)),
            Err(e) => {
                warn!(command = %self.spec.name, error = %e, "Completion failed");
                Ok(CommandOutput::failure(format!("completion failed: {e}")))
            },
        }
    }
}
