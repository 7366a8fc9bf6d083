//! Output transforms applied between pipeline steps.

use tracing::debug;

/// Apply a named transform to a step's output.
///
/// Supported: `trim`, `upper`, `lower`, `lines` (line count), `first`,
/// `last` (last non-blank line) and `json.<field>` (top-level field of a
/// JSON object). Unknown names, and `json.<field>` on input without that
/// field, return the input unchanged.
#[must_use]
pub fn apply_transform(input: &str, transform: &str) -> String {
    match transform.trim() {
        "" => input.to_string(),
        "trim" => input.trim().to_string(),
        "upper" => input.to_uppercase(),
        "lower" => input.to_lowercase(),
        "lines" => input.matches('\n').count().saturating_add(1).to_string(),
        "first" => input.split('\n').next().unwrap_or(input).to_string(),
        "last" => input
            .split('\n')
            .rev()
            .find(|line| !line.trim().is_empty())
            .unwrap_or(input)
            .to_string(),
        other => match other.strip_prefix("json.") {
            Some(field) => json_field(input, field).unwrap_or_else(|| input.to_string()),
            None => {
                debug!(transform = other, "unknown transform, passing output through");
                input.to_string()
            },
        },
    }
}

fn json_field(input: &str, field: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(input.trim()).ok()?;
    match value.as_object()?.get(field)? {
        serde_json::Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}
