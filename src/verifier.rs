//! # Token Verifier
//!
//! Runs one verification as a fixed sequence of stages:
//!
//! 1. **Decode**: structural checks only, no trust in the contents.
//! 2. **Resolve key**: ask the [`KeySetClient`] for the header's `kid`.
//! 3. **Verify**: signature against the algorithm allow-list, `exp`/`nbf`,
//!    audience, issuer, subject, client ID and nonce.
//! 4. **Assert claims**: the configured claim policy.
//!
//! Malformed tokens never reach the network, and unverified tokens never
//! reach the policy stage. The verifier holds no per-call state.

use crate::claims::{assert_claims, Claims};
use crate::config::VerifierConfig;
use crate::error::{AuthError, TokenInvalidReason};
use crate::jwks::{KeySetClient, KeySetClientOptions, KeySetFetcher, SigningKey};
use crate::parser::DecodedToken;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, Validation};
use serde_json::{Map, Value};
use std::str::FromStr;
use std::sync::Arc;

/// Per-call overrides of the verifier's configured expectations.
///
/// Any field left `None` falls back to the [`VerifierConfig`] value.
/// `audience: Some(vec![])` lifts the audience constraint for this call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VerifyOptions {
    pub issuer: Option<String>,
    pub audience: Option<Vec<String>>,
    pub subject: Option<String>,
    pub client_id: Option<String>,
    pub nonce: Option<String>,
    pub claims_to_assert: Option<Map<String, Value>>,
}

impl VerifyOptions {
    /// Options that override nothing.
    pub fn new() -> Self {
        Self::default()
    }

    /// Expects this issuer instead of the configured one.
    pub fn with_issuer(mut self, issuer: impl Into<String>) -> Self {
        self.issuer = Some(issuer.into());
        self
    }

    /// Accepts these audiences; an empty value lifts the audience check.
    pub fn with_audience(mut self, audience: impl Into<crate::AudienceInput>) -> Self {
        self.audience = Some(crate::normalize_audience(audience));
        self
    }

    /// Expects this `sub` claim.
    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    /// Expects this client ID in `cid` (or `azp`).
    pub fn with_client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = Some(client_id.into());
        self
    }

    /// Expects this `nonce` claim.
    pub fn with_nonce(mut self, nonce: impl Into<String>) -> Self {
        self.nonce = Some(nonce.into());
        self
    }

    /// Replaces the configured claim policy for this call.
    pub fn with_claims_to_assert(mut self, claims: Map<String, Value>) -> Self {
        self.claims_to_assert = Some(claims);
        self
    }
}

/// Expectations for one call, after overrides are applied.
struct Expectations<'a> {
    issuer: &'a str,
    audience: &'a [String],
    subject: Option<&'a str>,
    client_id: Option<&'a str>,
    nonce: Option<&'a str>,
    claims_to_assert: &'a Map<String, Value>,
}

/// Verifies bearer access tokens against a remote key set.
#[derive(Debug, Clone)]
pub struct TokenVerifier {
    config: VerifierConfig,
    algorithms: Vec<Algorithm>,
    jwks_uri: String,
    keys: KeySetClient,
}

impl TokenVerifier {
    /// Builds a verifier that fetches keys over HTTP.
    ///
    /// # Errors
    ///
    /// [`AuthError::Configuration`] if the configuration is invalid.
    pub fn new(config: VerifierConfig) -> Result<Self, AuthError> {
        config.validate()?;
        let keys = KeySetClient::http(client_options(&config))?;
        Self::build(config, keys)
    }

    /// Builds a verifier over a custom key set source.
    pub fn with_fetcher(config: VerifierConfig, fetcher: Arc<dyn KeySetFetcher>) -> Result<Self, AuthError> {
        config.validate()?;
        let keys = KeySetClient::new(fetcher, client_options(&config));
        Self::build(config, keys)
    }

    /// Builds a verifier that shares an existing key set client (and its cache).
    pub fn with_key_set_client(config: VerifierConfig, keys: KeySetClient) -> Result<Self, AuthError> {
        config.validate()?;
        Self::build(config, keys)
    }

    fn build(config: VerifierConfig, keys: KeySetClient) -> Result<Self, AuthError> {
        let algorithms = config.parsed_algorithms()?;
        let jwks_uri = config.jwks_uri();
        tracing::info!(issuer = %config.issuer, jwks_uri = %jwks_uri, "Token verifier configured");
        Ok(Self {
            config,
            algorithms,
            jwks_uri,
            keys,
        })
    }

    /// The validated configuration.
    pub fn config(&self) -> &VerifierConfig {
        &self.config
    }

    /// The key set URI in use.
    pub fn jwks_uri(&self) -> &str {
        &self.jwks_uri
    }

    /// The client holding this verifier's key cache.
    pub fn key_set_client(&self) -> &KeySetClient {
        &self.keys
    }

    /// Verifies a token with the configured expectations.
    pub async fn verify_token(&self, token: &str) -> Result<Claims, AuthError> {
        self.verify_token_with(token, &VerifyOptions::default()).await
    }

    /// Verifies a token, applying per-call overrides.
    ///
    /// # Arguments
    ///
    /// * `token` - The raw bearer token (without the `Bearer ` prefix)
    /// * `options` - Overrides for this call only
    ///
    /// # Errors
    ///
    /// The first failing stage's error: [`AuthError::MalformedToken`], any
    /// key set error, [`AuthError::TokenInvalid`], [`AuthError::InvalidOperator`]
    /// or [`AuthError::ClaimsAssertion`].
    pub async fn verify_token_with(&self, token: &str, options: &VerifyOptions) -> Result<Claims, AuthError> {
        let expected = self.expectations(options);

        let decoded = DecodedToken::decode(token)?;
        let key = self
            .keys
            .get_signing_key(&self.jwks_uri, decoded.header.kid.as_deref())
            .await?;
        let claims = self.verify_signed(token, &decoded, &key, &expected)?;
        assert_claims(expected.claims_to_assert, &claims)?;

        let sub = claims.get("sub").and_then(Value::as_str);
        tracing::debug!(sub, "Token accepted");
        Ok(claims)
    }

    fn expectations<'a>(&'a self, options: &'a VerifyOptions) -> Expectations<'a> {
        let config = &self.config;
        Expectations {
            issuer: options.issuer.as_deref().unwrap_or(config.issuer.as_str()),
            audience: options.audience.as_deref().unwrap_or(config.audience.as_slice()),
            subject: options.subject.as_deref().or(config.subject.as_deref()),
            client_id: options.client_id.as_deref().or(config.client_id.as_deref()),
            nonce: options.nonce.as_deref().or(config.nonce.as_deref()),
            claims_to_assert: options
                .claims_to_assert
                .as_ref()
                .unwrap_or(&config.claims_to_assert),
        }
    }

    fn verify_signed(
        &self,
        token: &str,
        decoded: &DecodedToken,
        key: &SigningKey,
        expected: &Expectations<'_>,
    ) -> Result<Claims, AuthError> {
        let alg = &decoded.header.alg;
        let algorithm = Algorithm::from_str(alg)
            .ok()
            .filter(|algorithm| self.algorithms.contains(algorithm))
            .ok_or_else(|| reject(TokenInvalidReason::Algorithm(alg.clone())))?;
        if key.algorithm().is_some_and(|key_alg| key_alg != alg) {
            return Err(reject(TokenInvalidReason::Algorithm(alg.clone())));
        }

        // Only the header algorithm: jsonwebtoken rejects a key whose family
        // differs from any listed algorithm.
        let mut validation = Validation::new(algorithm);
        validation.leeway = self.config.leeway_secs;
        validation.validate_nbf = true;
        validation.set_issuer(&[expected.issuer]);
        if expected.audience.is_empty() {
            validation.validate_aud = false;
        } else {
            validation.set_audience(expected.audience);
        }
        validation.sub = expected.subject.map(str::to_string);

        let data = jsonwebtoken::decode::<Claims>(token, key.decoding_key(), &validation)
            .map_err(|e| reject(reason_for(e.kind(), alg)))?;
        let claims = data.claims;

        if let Some(client_id) = expected.client_id {
            let actual = claims
                .get("cid")
                .or_else(|| claims.get("azp"))
                .and_then(Value::as_str);
            if actual != Some(client_id) {
                return Err(reject(TokenInvalidReason::ClientId));
            }
        }
        if let Some(nonce) = expected.nonce {
            if claims.get("nonce").and_then(Value::as_str) != Some(nonce) {
                return Err(reject(TokenInvalidReason::Nonce));
            }
        }

        Ok(claims)
    }
}

fn client_options(config: &VerifierConfig) -> KeySetClientOptions {
    KeySetClientOptions {
        cache_max_age: config.cache_max_age(),
        cache_max_entries: config.cache_max_entries,
        requests_per_minute: config.requests_per_minute,
    }
}

fn reject(reason: TokenInvalidReason) -> AuthError {
    tracing::warn!(check = reason.check(), "Token rejected: {}", reason);
    AuthError::TokenInvalid(reason)
}

fn reason_for(kind: &ErrorKind, alg: &str) -> TokenInvalidReason {
    match kind {
        ErrorKind::InvalidSignature => TokenInvalidReason::Signature,
        ErrorKind::ExpiredSignature => TokenInvalidReason::Expired,
        ErrorKind::ImmatureSignature => TokenInvalidReason::NotYetValid,
        ErrorKind::InvalidAudience => TokenInvalidReason::Audience,
        ErrorKind::InvalidIssuer => TokenInvalidReason::Issuer,
        ErrorKind::InvalidSubject => TokenInvalidReason::Subject,
        ErrorKind::InvalidAlgorithm | ErrorKind::InvalidAlgorithmName => {
            TokenInvalidReason::Algorithm(alg.to_string())
        }
        ErrorKind::MissingRequiredClaim(claim) => match claim.as_str() {
            "aud" => TokenInvalidReason::Audience,
            "iss" => TokenInvalidReason::Issuer,
            "sub" => TokenInvalidReason::Subject,
            _ => TokenInvalidReason::Other(format!("missing required claim '{claim}'")),
        },
        other => TokenInvalidReason::Other(format!("{other:?}")),
    }
}
