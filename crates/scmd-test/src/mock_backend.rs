//! Mock inference backend for testing.
//!
//! [`MockBackend`] replays scripted replies in order and records every
//! request it receives. Once the script runs out it echoes the prompt back,
//! which keeps template tests readable.

use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;

use scmd_llm::{Backend, BackendError, BackendResult, CompletionRequest, CompletionResponse};

/// A single scripted reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockReply {
    /// Return this text.
    Text(String),
    /// Fail with this message.
    Error(String),
}

/// A deterministic, queue-based [`Backend`] for tests.
#[derive(Debug, Default)]
pub struct MockBackend {
    replies: Mutex<VecDeque<MockReply>>,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl MockBackend {
    /// Create a backend with no scripted replies (echo mode).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a text reply.
    #[must_use]
    pub fn with_reply(self, text: impl Into<String>) -> Self {
        self.push(MockReply::Text(text.into()));
        self
    }

    /// Queue a failure.
    #[must_use]
    pub fn with_error(self, message: impl Into<String>) -> Self {
        self.push(MockReply::Error(message.into()));
        self
    }

    /// Requests received so far, oldest first.
    #[must_use]
    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// The most recent request.
    #[must_use]
    pub fn last_request(&self) -> Option<CompletionRequest> {
        self.requests().pop()
    }

    /// Number of completions served.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    fn push(&self, reply: MockReply) {
        self.replies
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(reply);
    }
}

#[async_trait]
#[allow(clippy::unnecessary_literal_bound)]
impl Backend for MockBackend {
    fn name(&self) -> &str {
        "mock"
    }

    async fn complete(&self, request: &CompletionRequest) -> BackendResult<CompletionResponse> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(request.clone());

        let reply = self
            .replies
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front();

        match reply {
            Some(MockReply::Text(text)) => Ok(CompletionResponse::text(text)),
            Some(MockReply::Error(message)) => Err(BackendError::RequestFailed(message)),
            None => Ok(CompletionResponse::text(request.prompt.clone())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_scripted_then_echo() {
        let backend = MockBackend::new().with_reply("first").with_error("down");

        let first = backend.complete(&CompletionRequest::new("a")).await.unwrap();
        assert_eq!(first.content, "first");

        let second = backend.complete(&CompletionRequest::new("b")).await;
        assert!(matches!(second, Err(BackendError::RequestFailed(m)) if m == "down"));

        let third = backend.complete(&CompletionRequest::new("echo me")).await.unwrap();
        assert_eq!(third.content, "echo me");

        assert_eq!(backend.call_count(), 3);
        assert_eq!(backend.last_request().unwrap().prompt, "echo me");
    }
}
