//! Error types for repository, cache and composition operations.

use std::fmt;

use thiserror::Error;

use scmd_config::ConfigError;
use scmd_core::CommandError;

/// Errors that can occur while fetching, caching, installing or composing commands.
#[derive(Debug, Error)]
pub enum RepoError {
    /// No repository with this name is configured.
    #[error("repository '{0}' not found")]
    RepositoryNotFound(String),

    /// A repository with this name is already configured.
    #[error("repository '{0}' already exists")]
    RepositoryExists(String),

    /// The repository manifest does not list the command.
    #[error("command '{command}' not found in repository '{repo}'")]
    CommandNotFound {
        /// Repository name.
        repo: String,
        /// Command name.
        command: String,
    },

    /// A composition step names a command that is not registered.
    #[error("command '{0}' not found")]
    UnknownCommand(String),

    /// No spec file exists for the command in the install directory.
    #[error("command '{0}' is not installed")]
    NotInstalled(String),

    /// The server answered with a non-200 status.
    #[error("GET {url} returned HTTP {status}")]
    HttpStatus {
        /// Requested URL.
        url: String,
        /// Response status code.
        status: u16,
    },

    /// The request could not be completed.
    #[error("request to {url} failed: {source}")]
    Http {
        /// Requested URL.
        url: String,
        /// Underlying client error.
        source: reqwest::Error,
    },

    /// A document could not be parsed or serialized.
    #[error("malformed {what}: {message}")]
    Malformed {
        /// What was being parsed (e.g. "manifest", a file path).
        what: String,
        /// Parser message.
        message: String,
    },

    /// A version constraint could not be parsed.
    #[error("invalid version constraint '{0}'")]
    InvalidConstraint(String),

    /// A dependency is not in `repo/command` form.
    #[error("invalid dependency format: {0} (expected repo/command)")]
    InvalidDependency(String),

    /// A fetched command does not match its locked version.
    #[error("version mismatch for {command}: locked {locked}, repository has {found}")]
    VersionMismatch {
        /// Command name.
        command: String,
        /// Version recorded in the lockfile.
        locked: String,
        /// Version the repository serves.
        found: String,
    },

    /// A dependency's version does not satisfy its constraint.
    #[error("dependency {command} version {version} does not satisfy {constraint}")]
    DependencyUnsatisfied {
        /// Dependency reference (`repo/command`).
        command: String,
        /// Version found.
        version: String,
        /// Constraint declared.
        constraint: String,
    },

    /// A composition is empty or ambiguous.
    #[error("invalid composition: {0}")]
    Composition(String),

    /// A composition step failed.
    #[error("step {index} ({command}) failed: {source}")]
    StepFailed {
        /// Zero-based step index.
        index: usize,
        /// Step command name.
        command: String,
        /// What went wrong.
        source: Box<RepoError>,
    },

    /// Every fallback alternative failed.
    #[error("all fallback commands failed: {last}")]
    FallbackExhausted {
        /// The last alternative's failure.
        last: String,
    },

    /// A command raised an error.
    #[error(transparent)]
    Command(#[from] CommandError),

    /// Configuration could not be resolved.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Filesystem error.
    #[error("I/O error at {path}: {source}")]
    Io {
        /// Path involved.
        path: String,
        /// Underlying error.
        source: std::io::Error,
    },
}

/// Broad classification of a [`RepoError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// A repository, command, file or resource is missing.
    NotFound,
    /// Unparsable YAML/JSON, constraint or dependency reference.
    Malformed,
    /// Lockfile version pin violated.
    VersionMismatch,
    /// Composition could not run to completion.
    Composition,
    /// The inference backend failed.
    Backend,
    /// Transport failure.
    Network,
    /// Local filesystem failure.
    Io,
    /// The name is already taken.
    Conflict,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::NotFound => "not found",
            Self::Malformed => "malformed",
            Self::VersionMismatch => "version mismatch",
            Self::Composition => "composition",
            Self::Backend => "backend",
            Self::Network => "network",
            Self::Io => "io",
            Self::Conflict => "conflict",
        };
        f.write_str(name)
    }
}

impl RepoError {
    /// Classify the error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::RepositoryNotFound(_)
            | Self::CommandNotFound { .. }
            | Self::UnknownCommand(_)
            | Self::NotInstalled(_)
            | Self::HttpStatus { .. } => ErrorKind::NotFound,
            Self::RepositoryExists(_) => ErrorKind::Conflict,
            Self::Composition(_)
            | Self::FallbackExhausted { .. }
            | Self::DependencyUnsatisfied { .. } => ErrorKind::Composition,
            Self::Malformed { .. }
            | Self::InvalidConstraint(_)
            | Self::InvalidDependency(_)
            | Self::Config(_) => ErrorKind::Malformed,
            Self::VersionMismatch { .. } => ErrorKind::VersionMismatch,
            Self::StepFailed { source, .. } => source.kind(),
            Self::Command(CommandError::Backend(_)) => ErrorKind::Backend,
            Self::Command(_) => ErrorKind::Composition,
            Self::Http { .. } => ErrorKind::Network,
            Self::Io { .. } => ErrorKind::Io,
        }
    }

    pub(crate) fn io(path: impl AsRef<std::path::Path>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().display().to_string(),
            source,
        }
    }

    pub(crate) fn malformed(what: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Malformed {
            what: what.into(),
            message: message.to_string(),
        }
    }
}

/// Result type for repository operations.
pub type RepoResult<T> = Result<T, RepoError>;
