//! Repository, manifest and command specification types.
//!
//! These mirror the on-disk and on-the-wire formats: `repos.json` holds
//! [`Repository`] entries, every repository serves a `scmd-repo.yaml`
//! [`Manifest`], and each listed command points at a [`CommandSpec`] YAML file.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{RepoError, RepoResult};

/// File name of a repository's manifest.
pub const MANIFEST_FILE: &str = "scmd-repo.yaml";

fn default_true() -> bool {
    true
}

/// A remote source of command specs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Repository {
    /// Unique repository name.
    pub name: String,
    /// Base URL; files are fetched relative to it.
    pub url: String,
    /// Human-readable description.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    /// Disabled repositories are skipped by search.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// When the manifest was last fetched successfully.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<DateTime<Utc>>,
}

impl Repository {
    /// Create an enabled repository.
    #[must_use]
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            description: String::new(),
            enabled: true,
            last_updated: None,
        }
    }

    /// Set the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// URL of a file inside the repository.
    #[must_use]
    pub fn file_url(&self, file: &str) -> String {
        format!(
            "{}/{}",
            self.url.trim_end_matches('/'),
            file.trim_start_matches('/')
        )
    }

    /// URL of the repository manifest.
    #[must_use]
    pub fn manifest_url(&self) -> String {
        self.file_url(MANIFEST_FILE)
    }
}

/// A repository's top-level index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    /// Repository name as published.
    pub name: String,
    /// Manifest version.
    #[serde(default)]
    pub version: String,
    /// Description.
    #[serde(default)]
    pub description: String,
    /// Author.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    /// Homepage.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub homepage: Option<String>,
    /// Commands the repository offers.
    #[serde(default)]
    pub commands: Vec<ManifestCommand>,
}

impl Manifest {
    /// Find a listed command by name.
    #[must_use]
    pub fn find(&self, name: &str) -> Option<&ManifestCommand> {
        self.commands.iter().find(|c| c.name == name)
    }
}

/// A command as listed in a manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestCommand {
    /// Command name.
    pub name: String,
    /// Description.
    #[serde(default)]
    pub description: String,
    /// Usage string.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub usage: String,
    /// Aliases.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub aliases: Vec<String>,
    /// Category.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub category: String,
    /// Spec file path relative to the repository URL.
    pub file: String,
}

impl ManifestCommand {
    /// Case-insensitive substring match on name, description or category.
    /// An empty query matches everything.
    #[must_use]
    pub fn matches(&self, query: &str) -> bool {
        if query.is_empty() {
            return true;
        }
        let query = query.to_lowercase();
        [&self.name, &self.description, &self.category]
            .iter()
            .any(|field| field.to_lowercase().contains(&query))
    }
}

/// Full declarative definition of one command.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CommandSpec {
    /// Command name.
    pub name: String,
    /// Spec version.
    #[serde(default)]
    pub version: String,
    /// Description.
    #[serde(default)]
    pub description: String,
    /// Usage string.
    #[serde(default)]
    pub usage: String,
    /// Aliases.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub aliases: Vec<String>,
    /// Category; empty means `plugin`.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub category: String,
    /// Author.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub author: String,
    /// Positional arguments, in order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<ArgSpec>,
    /// Named flags.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub flags: Vec<FlagSpec>,
    /// Prompt templates.
    #[serde(default)]
    pub prompt: PromptSpec,
    /// Model preferences.
    #[serde(default, skip_serializing_if = "ModelSpec::is_empty")]
    pub model: ModelSpec,
    /// Example invocations.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub examples: Vec<String>,
    /// Free-form metadata.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,
    /// Composition over other commands.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compose: Option<ComposeSpec>,
    /// Commands that must be installed first.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<Dependency>,
}

impl CommandSpec {
    /// Parse a spec from YAML.
    ///
    /// # Errors
    ///
    /// Returns [`RepoError::Malformed`] if the YAML is invalid or has no name.
    pub fn from_yaml(source: &str, what: &str) -> RepoResult<Self> {
        let spec: Self = serde_yaml::from_str(source).map_err(|e| RepoError::malformed(what, e))?;
        if spec.name.trim().is_empty() {
            return Err(RepoError::malformed(what, "command spec has no name"));
        }
        Ok(spec)
    }

    /// Serialize to YAML.
    ///
    /// # Errors
    ///
    /// Returns [`RepoError::Malformed`] if serialization fails.
    pub fn to_yaml(&self) -> RepoResult<String> {
        serde_yaml::to_string(self).map_err(|e| RepoError::malformed(&self.name, e))
    }

    /// Whether the spec composes other commands.
    #[must_use]
    pub fn is_composed(&self) -> bool {
        self.compose.is_some()
    }
}

/// A positional argument.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArgSpec {
    /// Name used in templates.
    pub name: String,
    /// Description.
    #[serde(default)]
    pub description: String,
    /// Whether the argument must be supplied.
    #[serde(default)]
    pub required: bool,
    /// Value used when the argument is absent.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub default: String,
}

/// A named flag.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlagSpec {
    /// Name used in templates.
    pub name: String,
    /// Short form.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub short: String,
    /// Description.
    #[serde(default)]
    pub description: String,
    /// Value used when the flag is absent.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub default: String,
}

/// Prompt templates.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptSpec {
    /// System prompt template.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub system: String,
    /// User prompt template.
    #[serde(default)]
    pub template: String,
}

/// Model preferences. Zero values mean "use the default".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelSpec {
    /// Preferred model name.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub preferred: String,
    /// Minimum context window required.
    #[serde(default, skip_serializing_if = "is_zero")]
    pub min_context: usize,
    /// Sampling temperature.
    #[serde(default, skip_serializing_if = "is_zero_f64")]
    pub temperature: f64,
    /// Token budget.
    #[serde(default, skip_serializing_if = "is_zero")]
    pub max_tokens: usize,
}

impl ModelSpec {
    /// Whether every field is unset.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

#[allow(clippy::trivially_copy_pass_by_ref)]
fn is_zero(value: &usize) -> bool {
    *value == 0
}

#[allow(clippy::trivially_copy_pass_by_ref, clippy::float_cmp)]
fn is_zero_f64(value: &f64) -> bool {
    *value == 0.0
}

/// Composition over other commands. Exactly one list may be non-empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComposeSpec {
    /// Sequential steps, each fed the previous output.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub pipeline: Vec<PipelineStep>,
    /// Commands run concurrently on the same input.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parallel: Vec<String>,
    /// Commands tried in order until one succeeds.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fallback: Vec<String>,
}

/// The execution shape of a [`ComposeSpec`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Topology<'a> {
    /// Sequential steps.
    Pipeline(&'a [PipelineStep]),
    /// Concurrent branches.
    Parallel(&'a [String]),
    /// Ordered alternatives.
    Fallback(&'a [String]),
}

impl ComposeSpec {
    /// Determine the topology.
    ///
    /// # Errors
    ///
    /// Returns [`RepoError::Composition`] when no list, or more than one
    /// list, is non-empty.
    pub fn topology(&self) -> RepoResult<Topology<'_>> {
        let declared = [
            !self.pipeline.is_empty(),
            !self.parallel.is_empty(),
            !self.fallback.is_empty(),
        ]
        .into_iter()
        .filter(|set| *set)
        .count();

        match declared {
            0 => Err(RepoError::Composition("empty composition".to_string())),
            1 if !self.pipeline.is_empty() => Ok(Topology::Pipeline(&self.pipeline)),
            1 if !self.parallel.is_empty() => Ok(Topology::Parallel(&self.parallel)),
            1 => Ok(Topology::Fallback(&self.fallback)),
            _ => Err(RepoError::Composition(
                "ambiguous composition: only one of pipeline, parallel or fallback may be set"
                    .to_string(),
            )),
        }
    }
}

/// What a pipeline does when a step fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum OnError {
    /// Stop the pipeline.
    #[default]
    Abort,
    /// Skip the step and keep the previous output.
    Continue,
}

impl OnError {
    #[allow(clippy::trivially_copy_pass_by_ref)]
    fn is_abort(&self) -> bool {
        *self == Self::Abort
    }
}

impl TryFrom<String> for OnError {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.trim() {
            "" | "abort" => Ok(Self::Abort),
            "continue" => Ok(Self::Continue),
            other => Err(format!(
                "unknown on_error policy '{other}' (expected \"continue\" or empty)"
            )),
        }
    }
}

impl From<OnError> for String {
    fn from(value: OnError) -> Self {
        match value {
            OnError::Abort => String::new(),
            OnError::Continue => "continue".to_string(),
        }
    }
}

/// One pipeline step.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineStep {
    /// Command name or alias.
    pub command: String,
    /// Options merged into the step's arguments.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub args: BTreeMap<String, String>,
    /// Transform applied to the step's output.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transform: Option<String>,
    /// Failure policy.
    #[serde(default, skip_serializing_if = "OnError::is_abort")]
    pub on_error: OnError,
}

impl PipelineStep {
    /// A step running `command` with default settings.
    #[must_use]
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            ..Default::default()
        }
    }
}

/// A command that must be available before another runs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dependency {
    /// Reference in `repo/command` form.
    pub command: String,
    /// Version constraint; empty or `*` accepts anything.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub version: String,
    /// Optional dependencies are skipped when they cannot be satisfied.
    #[serde(default)]
    pub optional: bool,
}

impl Dependency {
    /// Split the reference into `(repo, command)`.
    ///
    /// # Errors
    ///
    /// Returns [`RepoError::InvalidDependency`] unless the reference is two
    /// non-empty parts separated by `/`.
    pub fn parts(&self) -> RepoResult<(&str, &str)> {
        match self.command.split_once('/') {
            Some((repo, command)) if !repo.is_empty() && !command.is_empty() => {
                Ok((repo, command))
            },
            _ => Err(RepoError::InvalidDependency(self.command.clone())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const COMPOSED: &str = r#"
name: review-pipeline
version: 1.0.0
description: Explain then summarize
compose:
  pipeline:
    - command: explain
      args:
        depth: deep
      transform: trim
    - command: summarize
      on_error: continue
dependencies:
  - command: official/explain
    version: ">=1.0.0"
  - command: extras/summarize
    optional: true
"#;

    #[test]
    fn test_parse_composed_spec() {
        let spec = CommandSpec::from_yaml(COMPOSED, "review-pipeline.yaml").unwrap();
        let compose = spec.compose.as_ref().unwrap();

        assert_eq!(compose.pipeline.len(), 2);
        assert_eq!(compose.pipeline[0].args["depth"], "deep");
        assert_eq!(compose.pipeline[0].transform.as_deref(), Some("trim"));
        assert_eq!(compose.pipeline[0].on_error, OnError::Abort);
        assert_eq!(compose.pipeline[1].on_error, OnError::Continue);
        assert!(matches!(compose.topology().unwrap(), Topology::Pipeline(s) if s.len() == 2));

        assert_eq!(spec.dependencies.len(), 2);
        assert_eq!(spec.dependencies[0].version, ">=1.0.0");
        assert!(spec.dependencies[1].optional);
    }

    #[test]
    fn test_unknown_on_error_is_malformed() {
        let yaml = "name: x\ncompose:\n  pipeline:\n    - command: a\n      on_error: retry\n";
        let err = CommandSpec::from_yaml(yaml, "x.yaml").unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Malformed);
    }

    #[test]
    fn test_nameless_spec_is_malformed() {
        let err = CommandSpec::from_yaml("description: nothing\n", "anon.yaml").unwrap_err();
        assert!(matches!(err, RepoError::Malformed { .. }));
    }

    #[test]
    fn test_topology_empty_and_ambiguous() {
        let empty = ComposeSpec::default();
        assert!(matches!(empty.topology(), Err(RepoError::Composition(_))));

        let ambiguous = ComposeSpec {
            parallel: vec!["a".into()],
            fallback: vec!["b".into()],
            ..Default::default()
        };
        let err = ambiguous.topology().unwrap_err();
        assert!(err.to_string().contains("ambiguous"));

        let fallback = ComposeSpec {
            fallback: vec!["b".into()],
            ..Default::default()
        };
        assert!(matches!(fallback.topology().unwrap(), Topology::Fallback(_)));
    }

    #[test]
    fn test_dependency_parts() {
        let dep = Dependency {
            command: "official/explain".into(),
            ..Default::default()
        };
        assert_eq!(dep.parts().unwrap(), ("official", "explain"));

        for bad in ["explain", "/explain", "official/"] {
            let dep = Dependency {
                command: bad.into(),
                ..Default::default()
            };
            assert!(matches!(dep.parts(), Err(RepoError::InvalidDependency(_))));
        }
    }

    #[test]
    fn test_repository_urls() {
        let repo = Repository::new("official", "https://example.com/cmds/");
        assert_eq!(
            repo.manifest_url(),
            "https://example.com/cmds/scmd-repo.yaml"
        );
        assert_eq!(
            repo.file_url("/commands/explain.yaml"),
            "https://example.com/cmds/commands/explain.yaml"
        );
        assert!(repo.enabled);
    }

    #[test]
    fn test_repository_json_defaults_enabled() {
        let repo: Repository =
            serde_json::from_str(r#"{"name":"x","url":"https://x.dev"}"#).unwrap();
        assert!(repo.enabled);
        assert!(repo.last_updated.is_none());
    }

    #[test]
    fn test_manifest_command_matching() {
        let listing = ManifestCommand {
            name: "explain".into(),
            description: "Explain code in plain words".into(),
            usage: String::new(),
            aliases: vec![],
            category: "code".into(),
            file: "commands/explain.yaml".into(),
        };
        assert!(listing.matches(""));
        assert!(listing.matches("EXPL"));
        assert!(listing.matches("plain"));
        assert!(listing.matches("Code"));
        assert!(!listing.matches("git"));
    }

    #[test]
    fn test_model_spec_omitted_when_empty() {
        let spec = CommandSpec {
            name: "bare".into(),
            ..Default::default()
        };
        let yaml = spec.to_yaml().unwrap();
        assert!(!yaml.contains("model"));
        assert!(!yaml.contains("compose"));
    }
}
