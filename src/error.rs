//! Defines the error types that can occur while verifying bearer tokens.
//!
//! Every failure the verifier can produce is a variant of [`AuthError`].
//! Configuration errors surface once, when a verifier is constructed; all
//! other variants are per-request and are meant to be turned into a `401`
//! by the HTTP adapter. Structured data (the failed check, the list of
//! violated claim expressions) travels in typed fields, never inside the
//! message string.

use std::fmt;
use thiserror::Error;

/// The specific standard check a token failed during verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenInvalidReason {
    /// The signature did not verify against the resolved key.
    Signature,
    /// The `exp` claim is in the past.
    Expired,
    /// The `nbf` claim is in the future.
    NotYetValid,
    /// The `aud` claim does not intersect the configured audience.
    Audience,
    /// The `iss` claim does not match the configured issuer.
    Issuer,
    /// The `cid`/`azp` claim does not match the configured client ID.
    ClientId,
    /// The `nonce` claim does not match the expected nonce.
    Nonce,
    /// The `sub` claim does not match the expected subject.
    Subject,
    /// The header algorithm is not on the allow-list or does not fit the key.
    Algorithm(String),
    /// Any other rejection reported by the JWT library.
    Other(String),
}

impl TokenInvalidReason {
    /// Short, stable name of the failed check.
    pub fn check(&self) -> &'static str {
        match self {
            Self::Signature => "signature",
            Self::Expired => "expired",
            Self::NotYetValid => "not_before",
            Self::Audience => "audience",
            Self::Issuer => "issuer",
            Self::ClientId => "client_id",
            Self::Nonce => "nonce",
            Self::Subject => "subject",
            Self::Algorithm(_) => "algorithm",
            Self::Other(_) => "other",
        }
    }
}

impl fmt::Display for TokenInvalidReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Signature => f.write_str("signature verification failed"),
            Self::Expired => f.write_str("token has expired"),
            Self::NotYetValid => f.write_str("token is not yet valid"),
            Self::Audience => f.write_str("audience does not match"),
            Self::Issuer => f.write_str("issuer does not match"),
            Self::ClientId => f.write_str("client ID does not match"),
            Self::Nonce => f.write_str("nonce does not match"),
            Self::Subject => f.write_str("subject does not match"),
            Self::Algorithm(alg) => write!(f, "algorithm '{alg}' is not allowed"),
            Self::Other(detail) => f.write_str(detail),
        }
    }
}

/// Represents errors that can occur during bearer token verification.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum AuthError {
    /// The verifier configuration is invalid. Fatal at construction time.
    #[error("invalid configuration: {0}")]
    Configuration(String),

    /// The token is not a well-formed three-segment signed token.
    #[error("malformed token: {0}")]
    MalformedToken(String),

    /// The key set could not be retrieved (network failure, non-2xx, bad body).
    #[error("failed to fetch key set: {0}")]
    KeySetFetch(String),

    /// The key set endpoint returned no keys at all.
    #[error("the key set endpoint did not contain any keys")]
    KeySetEmpty,

    /// The key set contained keys, but none usable for signature verification.
    #[error("the key set endpoint did not contain any signing keys")]
    NoSigningKeys,

    /// The token carries no key ID and the key set has more than one key.
    #[error("no key ID specified and the key set contains more than one key")]
    AmbiguousKey,

    /// No signing key matches the token's key ID.
    #[error("unable to find a signing key that matches '{0}'")]
    KeyNotFound(String),

    /// Too many key set fetches for this URI in the current window.
    #[error("key set fetch rate limit of {limit} per minute exceeded for {uri}")]
    RateLimited { uri: String, limit: u32 },

    /// The token failed a signature or standard-claim check.
    #[error("invalid token: {0}")]
    TokenInvalid(TokenInvalidReason),

    /// One or more custom claim assertions were violated.
    #[error("{}", .0.join(", "))]
    ClaimsAssertion(Vec<String>),

    /// A claim expression uses an operator the engine does not support.
    #[error("operator: '{0}' invalid. Supported operators: 'includes'.")]
    InvalidOperator(String),
}

impl AuthError {
    /// Stable, machine-readable code for this error.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "configuration_error",
            Self::MalformedToken(_) => "malformed_token",
            Self::KeySetFetch(_) => "key_set_fetch_failed",
            Self::KeySetEmpty => "key_set_empty",
            Self::NoSigningKeys => "no_signing_keys",
            Self::AmbiguousKey => "ambiguous_key",
            Self::KeyNotFound(_) => "key_not_found",
            Self::RateLimited { .. } => "rate_limited",
            Self::TokenInvalid(_) => "token_invalid",
            Self::ClaimsAssertion(_) => "claims_assertion_failed",
            Self::InvalidOperator(_) => "invalid_operator",
        }
    }

    /// Structured detail list, where the error has one.
    ///
    /// Claims assertion failures yield every violation in declaration order;
    /// token failures yield the name of the failed check.
    pub fn details(&self) -> Option<Vec<String>> {
        match self {
            Self::ClaimsAssertion(violations) => Some(violations.clone()),
            Self::TokenInvalid(reason) => Some(vec![reason.check().to_string()]),
            _ => None,
        }
    }

    /// Whether a caller may reasonably retry (with backoff) later.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::KeySetFetch(_) | Self::RateLimited { .. })
    }
}
