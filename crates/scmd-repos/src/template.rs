//! Prompt template rendering.
//!
//! Templates substitute variables only: `{{ .name }}` or `{{ name }}`.
//! Unknown variables render as the empty string. Any other action, or an
//! unterminated `{{`, is an error.

use std::collections::HashMap;

use thiserror::Error;

/// Template rendering errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateError {
    /// `{{` without a matching `}}`.
    #[error("unclosed action starting at byte {0}")]
    Unclosed(usize),

    /// The action is not a plain variable reference.
    #[error("unsupported action \"{0}\"")]
    Unsupported(String),
}

/// Render `template` against `vars`.
///
/// # Errors
///
/// Returns a [`TemplateError`] for unterminated or non-variable actions.
pub fn render(template: &str, vars: &HashMap<String, String>) -> Result<String, TemplateError> {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    let mut offset = 0usize;

    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let body_start = start.saturating_add(2);
        let after = &rest[body_start..];
        let Some(end) = after.find("}}") else {
            return Err(TemplateError::Unclosed(offset.saturating_add(start)));
        };

        let action = after[..end].trim();
        let name = action.strip_prefix('.').unwrap_or(action);
        if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(TemplateError::Unsupported(action.to_string()));
        }
        out.push_str(vars.get(name).map_or("", String::as_str));

        let consumed = body_start.saturating_add(end).saturating_add(2);
        offset = offset.saturating_add(consumed);
        rest = &rest[consumed..];
    }

    out.push_str(rest);
    Ok(out)
}
