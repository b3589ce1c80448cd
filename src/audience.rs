//! Audience normalization.
//!
//! Audience values arrive in several shapes: a single string, a
//! comma-separated string (with or without a space after each comma), or a
//! list. They are all reduced to one ordered list of trimmed, non-empty
//! strings. An empty list means "no audience constraint".

use serde::{Deserialize, Deserializer, Serialize};

/// An audience value as supplied by configuration or a caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AudienceInput {
    /// A single audience, or several separated by `,` or `, `.
    Single(String),
    /// An already-split list of audiences.
    List(Vec<String>),
}

impl Default for AudienceInput {
    fn default() -> Self {
        Self::List(Vec::new())
    }
}

impl From<&str> for AudienceInput {
    fn from(value: &str) -> Self {
        Self::Single(value.to_string())
    }
}

impl From<String> for AudienceInput {
    fn from(value: String) -> Self {
        Self::Single(value)
    }
}

impl From<Vec<String>> for AudienceInput {
    fn from(value: Vec<String>) -> Self {
        Self::List(value)
    }
}

impl From<Vec<&str>> for AudienceInput {
    fn from(value: Vec<&str>) -> Self {
        Self::List(value.into_iter().map(str::to_string).collect())
    }
}

impl From<&[&str]> for AudienceInput {
    fn from(value: &[&str]) -> Self {
        Self::List(value.iter().map(|s| s.to_string()).collect())
    }
}

impl<T: Into<AudienceInput>> From<Option<T>> for AudienceInput {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or_default()
    }
}

/// Normalizes an audience value into an ordered list of trimmed, non-empty strings.
///
/// `"a,b"`, `"a, b"` and `["a", "b"]` all normalize to `["a", "b"]`, and the
/// function is idempotent.
///
/// # Arguments
///
/// * `input` - Any supported audience shape
pub fn normalize_audience(input: impl Into<AudienceInput>) -> Vec<String> {
    match input.into() {
        AudienceInput::Single(value) => value
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect(),
        AudienceInput::List(values) => values
            .iter()
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect(),
    }
}

/// Serde adapter that accepts any [`AudienceInput`] shape (or `null`).
pub(crate) fn deserialize_audience<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let input = Option::<AudienceInput>::deserialize(deserializer)?;
    Ok(normalize_audience(input))
}
