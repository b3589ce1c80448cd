//! # Token Decoding
//!
//! Splits a compact JWS into its segments and decodes the header and payload
//! without trusting either. Nothing here checks a signature; the result only
//! tells the verifier which key to resolve.

use crate::error::AuthError;
use base64::{engine::general_purpose, Engine as _};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// The fields of a JWT header the verifier relies on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenHeader {
    /// Algorithm
    pub alg: String,
    /// Key ID
    pub kid: Option<String>,
    /// Token type
    pub typ: Option<String>,
}

/// A token decoded but not yet verified.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedToken {
    pub header: TokenHeader,
    pub claims: Map<String, Value>,
}

impl DecodedToken {
    /// Decodes a compact JWS.
    ///
    /// # Arguments
    ///
    /// * `token` - The raw bearer token
    ///
    /// # Errors
    ///
    /// [`AuthError::MalformedToken`] if the token is not three base64url
    /// segments whose first two decode to a JSON header and a JSON object.
    pub fn decode(token: &str) -> Result<Self, AuthError> {
        let parts: Vec<&str> = token.split('.').collect();
        if parts.len() != 3 || parts.iter().any(|part| part.is_empty()) {
            return Err(AuthError::MalformedToken(
                "expected three non-empty dot-separated segments".to_string(),
            ));
        }

        tracing::debug!(
            "JWT parts lengths - header: {}, payload: {}, signature: {}",
            parts[0].len(),
            parts[1].len(),
            parts[2].len()
        );

        // base64url only; some issuers still pad with '='.
        for (i, part) in parts.iter().enumerate() {
            if part
                .chars()
                .any(|c| !c.is_ascii_alphanumeric() && c != '-' && c != '_' && c != '=')
            {
                tracing::warn!("JWT part {} contains invalid characters", i);
                return Err(AuthError::MalformedToken(format!(
                    "segment {i} is not base64url"
                )));
            }
        }

        let header: TokenHeader = decode_segment(parts[0], "header")?;
        let claims: Map<String, Value> = decode_segment(parts[1], "payload")?;

        Ok(Self { header, claims })
    }
}

fn decode_segment<T: serde::de::DeserializeOwned>(segment: &str, name: &str) -> Result<T, AuthError> {
    let bytes = general_purpose::URL_SAFE_NO_PAD
        .decode(segment.trim_end_matches('='))
        .map_err(|e| AuthError::MalformedToken(format!("failed to decode {name}: {e}")))?;
    serde_json::from_slice(&bytes)
        .map_err(|e| AuthError::MalformedToken(format!("{name} is not valid JSON: {e}")))
}
