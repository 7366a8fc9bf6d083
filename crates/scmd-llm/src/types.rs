//! Completion request and response types.

use serde::{Deserialize, Serialize};

/// Default generation budget for a completion.
pub const DEFAULT_MAX_TOKENS: usize = 2048;

/// Default sampling temperature for a completion.
pub const DEFAULT_TEMPERATURE: f64 = 0.7;

/// A single completion request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionRequest {
    /// User prompt.
    pub prompt: String,
    /// System prompt (empty when none).
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub system_prompt: String,
    /// Preferred model, if the command asked for one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Maximum tokens to generate.
    pub max_tokens: usize,
    /// Sampling temperature.
    pub temperature: f64,
    /// Sequences that stop generation.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub stop_sequences: Vec<String>,
}

impl Default for CompletionRequest {
    fn default() -> Self {
        Self {
            prompt: String::new(),
            system_prompt: String::new(),
            model: None,
            max_tokens: DEFAULT_MAX_TOKENS,
            temperature: DEFAULT_TEMPERATURE,
            stop_sequences: Vec::new(),
        }
    }
}

impl CompletionRequest {
    /// Create a request for the given prompt with default sampling settings.
    #[must_use]
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            ..Default::default()
        }
    }

    /// Set the system prompt.
    #[must_use]
    pub fn with_system_prompt(mut self, system_prompt: impl Into<String>) -> Self {
        self.system_prompt = system_prompt.into();
        self
    }

    /// Set the preferred model.
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Set max tokens.
    #[must_use]
    pub fn with_max_tokens(mut self, max_tokens: usize) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Set temperature.
    #[must_use]
    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = temperature;
        self
    }

    /// Add a stop sequence.
    #[must_use]
    pub fn with_stop_sequence(mut self, stop: impl Into<String>) -> Self {
        self.stop_sequences.push(stop.into());
        self
    }
}

/// Why generation ended.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FinishReason {
    /// The model finished naturally.
    #[default]
    Complete,
    /// The token budget ran out.
    Length,
    /// A stop sequence was hit.
    Stop,
    /// Generation failed part-way.
    Error,
}

/// The result of a completion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionResponse {
    /// Generated text.
    pub content: String,
    /// Tokens consumed, when the backend reports it.
    #[serde(default)]
    pub tokens_used: usize,
    /// Why generation ended.
    #[serde(default)]
    pub finish_reason: FinishReason,
}

impl CompletionResponse {
    /// Create a completed response with the given text.
    #[must_use]
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            tokens_used: 0,
            finish_reason: FinishReason::Complete,
        }
    }

    /// Set the token count.
    #[must_use]
    pub fn with_tokens_used(mut self, tokens_used: usize) -> Self {
        self.tokens_used = tokens_used;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_defaults() {
        let request = CompletionRequest::new("hi");
        assert_eq!(request.prompt, "hi");
        assert_eq!(request.max_tokens, 2048);
        assert!((request.temperature - 0.7).abs() < f64::EPSILON);
        assert!(request.system_prompt.is_empty());
        assert!(request.model.is_none());
    }

    #[test]
    fn test_request_builder() {
        let request = CompletionRequest::new("hi")
            .with_system_prompt("sys")
            .with_model("qwen")
            .with_max_tokens(100)
            .with_temperature(0.2)
            .with_stop_sequence("###");

        assert_eq!(request.system_prompt, "sys");
        assert_eq!(request.model.as_deref(), Some("qwen"));
        assert_eq!(request.max_tokens, 100);
        assert_eq!(request.stop_sequences, vec!["###".to_string()]);
    }

    #[test]
    fn test_response_text() {
        let response = CompletionResponse::text("done").with_tokens_used(12);
        assert_eq!(response.content, "done");
        assert_eq!(response.tokens_used, 12);
        assert_eq!(response.finish_reason, FinishReason::Complete);
    }

    #[test]
    fn test_finish_reason_serializes_lowercase() {
        let json = serde_json::to_string(&FinishReason::Length).unwrap();
        assert_eq!(json, "\"length\"");

        let parsed: CompletionResponse =
            serde_json::from_str(r#"{"content":"x","max":1}"#).unwrap();
        assert_eq!(parsed.finish_reason, FinishReason::Complete);
        assert_eq!(parsed.tokens_used, 0);
    }
}
