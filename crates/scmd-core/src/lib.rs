//! scmd Core - The command capability shared by every scmd command.
//!
//! This crate provides:
//! - The [`Command`] trait implemented by built-in and plugin commands
//! - [`Args`], [`CommandOutput`] and [`ExecContext`], the CLI-wide execution shapes
//! - [`CommandRegistry`], name and alias lookup for registered commands
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use scmd_core::{Args, CommandRegistry, ExecContext};
//!
//! # async fn example(registry: Arc<CommandRegistry>) -> Result<(), scmd_core::CommandError> {
//! let ctx = ExecContext::new().with_registry(Arc::clone(&registry));
//! if let Some(command) = registry.get("explain") {
//!     let output = command.execute(&Args::new().with_stdin("fn main() {}"), &ctx).await?;
//!     println!("{}", output.output);
//! }
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]

mod command;
mod error;
mod registry;

pub use command::{Args, Category, Command, CommandOutput, ExecContext, STDIN_OPTION};
pub use error::{CommandError, CommandResult};
pub use registry::CommandRegistry;
