//! scmd LLM - Inference backend abstraction.
//!
//! This crate provides:
//! - The [`Backend`] capability every inference engine implements
//! - Completion request/response types shared by command executors
//! - Backend error types
//!
//! # Example
//!
//! ```rust,no_run
//! use scmd_llm::{Backend, CompletionRequest};
//!
//! # async fn example(backend: &dyn Backend) -> Result<(), scmd_llm::BackendError> {
//! let request = CompletionRequest::new("Explain this diff")
//!     .with_system_prompt("You are a code reviewer.")
//!     .with_max_tokens(512);
//!
//! let response = backend.complete(&request).await?;
//! println!("{}", response.content);
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]

mod backend;
mod error;
mod types;

pub use backend::Backend;
pub use error::{BackendError, BackendResult};
pub use types::{
    CompletionRequest, CompletionResponse, DEFAULT_MAX_TOKENS, DEFAULT_TEMPERATURE, FinishReason,
};
