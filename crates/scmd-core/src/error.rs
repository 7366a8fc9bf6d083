//! Command error types.

use thiserror::Error;

use scmd_llm::BackendError;

/// Errors raised by command registration and execution.
#[derive(Debug, Error)]
pub enum CommandError {
    /// A command with this name is already registered.
    #[error("command already registered: {0}")]
    AlreadyRegistered(String),

    /// An alias collides with an existing name or alias.
    #[error("alias '{alias}' already used by command '{existing}'")]
    AliasConflict {
        /// The conflicting alias.
        alias: String,
        /// The command that already owns it.
        existing: String,
    },

    /// Arguments failed validation.
    #[error("{0}")]
    Validation(String),

    /// Execution failed before a result could be produced.
    #[error("execution failed: {0}")]
    Execution(String),

    /// The inference backend failed.
    #[error(transparent)]
    Backend(#[from] BackendError),
}

/// Result type for command operations.
pub type CommandResult<T> = Result<T, CommandError>;
