//! # jwt-guard
//!
//! Bearer access token verification for protected API routes, with JWKS caching,
//! fetch rate limiting and a declarative claim policy.
//!
//! ## Features
//! - **Fail-fast configuration**: malformed issuers and client IDs are rejected before any I/O.
//! - **JWKS-based**: signing keys are fetched from the issuer's key set and cached per URI.
//! - **Single-flight fetching**: concurrent cache misses share one request.
//! - **Claim policy**: equality and `includes` assertions with every violation reported.
//! - **axum middleware**: extracts the bearer token and answers `401` with a JSON body.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use jwt_guard::{TokenVerifier, VerifierConfig};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // 1. Configure the verifier once, at startup
//!     let config = VerifierConfig::new("https://auth.example.com/oauth2/default")
//!         .with_audience("api://default")
//!         .with_claim_assertion("permissions.includes", json!(["orders:read"]));
//!     let verifier = TokenVerifier::new(config)?;
//!
//!     // 2. Verify the token taken from the request's Authorization header
//!     let token = "eyJhbGciOiJSUzI1NiIsImtpZCI6Ii4uLiJ9...";
//!     match verifier.verify_token(token).await {
//!         Ok(claims) => println!("Authenticated subject: {:?}", claims.get("sub")),
//!         Err(e) => eprintln!("Authentication failed: {e}"),
//!     }
//!
//!     Ok(())
//! }
//! ```

/// Audience value normalization.
mod audience;
/// Declarative claim assertions.
mod claims;
/// Verifier configuration and validation.
mod config;
/// Error types for the library.
mod error;
/// Key set fetching and caching.
mod jwks;
/// axum verification middleware.
mod middleware;
/// Untrusted token decoding.
mod parser;
/// Rolling-window fetch limiter.
mod rate_limit;
/// The verification pipeline.
mod verifier;

#[cfg(test)]
mod tests;

pub use audience::{normalize_audience, AudienceInput};
pub use claims::{assert_claims, ClaimExpression, ClaimOperator, Claims};
pub use config::{validate, validate_client_id, validate_issuer, TestingOptions, VerifierConfig};
pub use error::{AuthError, TokenInvalidReason};
pub use jwks::{
    signing_keys_from_document, HttpKeySetFetcher, JwkSetDocument, KeyCache, KeySetClient,
    KeySetClientOptions, KeySetFetcher, SigningKey,
};
pub use middleware::{
    extract_bearer_token, require_bearer, AuthRejection, BearerAuth, VerifiedClaims,
    UNPARSEABLE_HEADER_MESSAGE,
};
pub use parser::{DecodedToken, TokenHeader};
pub use verifier::{TokenVerifier, VerifyOptions};
