//! scmd Test - Shared test utilities for scmd crates.
//!
//! This crate provides mock implementations and helpers used across the
//! workspace as a dev-dependency:
//! - [`MockBackend`], a scripted inference backend that records requests
//! - [`FnCommand`], a closure-backed command for composition tests
//! - [`StaticRepoServer`], an in-process HTTP server serving canned repository files
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use scmd_test::{FnCommand, MockBackend};
//!
//! #[tokio::test]
//! async fn test_pipeline() {
//!     let backend = Arc::new(MockBackend::new().with_reply("summary"));
//!     let upper = Arc::new(FnCommand::upper("upper"));
//!     // ...
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]

pub mod fixtures;
pub mod harness;
pub mod mock_backend;
pub mod mocks;
pub mod server;

pub use fixtures::*;
pub use harness::*;
pub use mock_backend::*;
pub use mocks::*;
pub use server::*;
