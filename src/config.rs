//! Verifier configuration and its fail-fast validation.
//!
//! A [`VerifierConfig`] is checked once, when a verifier is built, and is
//! immutable afterwards. Validation never touches the network: it only
//! rejects identifiers that are obviously wrong (missing, not HTTPS, still a
//! template placeholder, or pointing at an administrative console).

use crate::audience::{deserialize_audience, normalize_audience, AudienceInput};
use crate::error::AuthError;
use jsonwebtoken::Algorithm;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::str::FromStr;
use std::time::Duration;
use url::Url;

/// Default algorithm allow-list.
const DEFAULT_ALGORITHM: &str = "RS256";
/// One hour.
const DEFAULT_CACHE_MAX_AGE_MS: u64 = 60 * 60 * 1000;
const DEFAULT_CACHE_MAX_ENTRIES: usize = 3;
const DEFAULT_REQUESTS_PER_MINUTE: u32 = 10;

/// Domains whose `-admin.` console hosts must never be used as issuers.
const ADMIN_DOMAINS: [&str; 3] = ["okta.com", "oktapreview.com", "okta-emea.com"];

/// Sentinels left behind when a build step did not substitute real values.
const PLACEHOLDER_SENTINELS: [&str; 2] = ["_DOMAIN_", "_CLIENTID_"];

/// Options that relax validation for local testing only.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestingOptions {
    /// Allow non-HTTPS issuers. Always logged as a warning.
    #[serde(default)]
    pub disable_https_check: bool,
}

/// Configuration for a [`TokenVerifier`](crate::TokenVerifier).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifierConfig {
    /// Expected token issuer; also the base of the default key set URI.
    pub issuer: String,
    /// Expected client ID (`cid`, falling back to `azp`).
    #[serde(default)]
    pub client_id: Option<String>,
    /// Accepted audiences. Empty means no audience constraint.
    #[serde(default, deserialize_with = "deserialize_audience")]
    pub audience: Vec<String>,
    /// Algorithm allow-list.
    #[serde(default = "default_algorithms")]
    pub algorithms: Vec<String>,
    /// Custom claim assertions, evaluated in insertion order.
    #[serde(default)]
    pub claims_to_assert: Map<String, Value>,
    /// Explicit key set URI, overriding the issuer-derived default.
    #[serde(default)]
    pub jwks_uri: Option<String>,
    /// Expected `sub` claim.
    #[serde(default)]
    pub subject: Option<String>,
    /// Expected `nonce` claim.
    #[serde(default)]
    pub nonce: Option<String>,
    #[serde(default = "default_cache_max_age_ms")]
    pub cache_max_age_ms: u64,
    #[serde(default = "default_cache_max_entries")]
    pub cache_max_entries: usize,
    #[serde(default = "default_requests_per_minute")]
    pub requests_per_minute: u32,
    /// Clock-skew tolerance for `exp`/`nbf`, in seconds.
    #[serde(default)]
    pub leeway_secs: u64,
    #[serde(default)]
    pub testing: TestingOptions,
}

fn default_algorithms() -> Vec<String> {
    vec![DEFAULT_ALGORITHM.to_string()]
}

fn default_cache_max_age_ms() -> u64 {
    DEFAULT_CACHE_MAX_AGE_MS
}

fn default_cache_max_entries() -> usize {
    DEFAULT_CACHE_MAX_ENTRIES
}

fn default_requests_per_minute() -> u32 {
    DEFAULT_REQUESTS_PER_MINUTE
}

impl VerifierConfig {
    /// Creates a configuration with defaults for everything but the issuer.
    ///
    /// # Arguments
    ///
    /// * `issuer` - The issuer URL, e.g. `https://auth.example.com/oauth2/default`
    pub fn new(issuer: impl Into<String>) -> Self {
        Self {
            issuer: issuer.into(),
            client_id: None,
            audience: Vec::new(),
            algorithms: default_algorithms(),
            claims_to_assert: Map::new(),
            jwks_uri: None,
            subject: None,
            nonce: None,
            cache_max_age_ms: DEFAULT_CACHE_MAX_AGE_MS,
            cache_max_entries: DEFAULT_CACHE_MAX_ENTRIES,
            requests_per_minute: DEFAULT_REQUESTS_PER_MINUTE,
            leeway_secs: 0,
            testing: TestingOptions::default(),
        }
    }

    /// Expects this client ID in `cid` (or `azp`).
    pub fn with_client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = Some(client_id.into());
        self
    }

    /// Sets the accepted audiences from any supported shape.
    pub fn with_audience(mut self, audience: impl Into<AudienceInput>) -> Self {
        self.audience = normalize_audience(audience);
        self
    }

    /// Replaces the algorithm allow-list.
    pub fn with_algorithms<I, S>(mut self, algorithms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.algorithms = algorithms.into_iter().map(Into::into).collect();
        self
    }

    /// Replaces the whole claim policy.
    pub fn with_claims_to_assert(mut self, claims: Map<String, Value>) -> Self {
        self.claims_to_assert = claims;
        self
    }

    /// Appends one claim assertion, keeping declaration order.
    pub fn with_claim_assertion(mut self, expression: impl Into<String>, expected: Value) -> Self {
        self.claims_to_assert.insert(expression.into(), expected);
        self
    }

    /// Uses an explicit key set URI instead of the issuer-derived one.
    pub fn with_jwks_uri(mut self, uri: impl Into<String>) -> Self {
        self.jwks_uri = Some(uri.into());
        self
    }

    /// Expects this `sub` claim on every token.
    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    /// Expects this `nonce` claim on every token.
    pub fn with_nonce(mut self, nonce: impl Into<String>) -> Self {
        self.nonce = Some(nonce.into());
        self
    }

    /// How long fetched keys are served from cache.
    pub fn with_cache_max_age(mut self, max_age: Duration) -> Self {
        self.cache_max_age_ms = u64::try_from(max_age.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// How many key set URIs the cache holds.
    pub fn with_cache_max_entries(mut self, max_entries: usize) -> Self {
        self.cache_max_entries = max_entries;
        self
    }

    /// Key set fetches allowed per URI per minute.
    pub fn with_requests_per_minute(mut self, requests_per_minute: u32) -> Self {
        self.requests_per_minute = requests_per_minute;
        self
    }

    /// Clock-skew tolerance for `exp` and `nbf`, in whole seconds.
    pub fn with_leeway(mut self, leeway: Duration) -> Self {
        self.leeway_secs = leeway.as_secs();
        self
    }

    /// Relaxations for local testing.
    pub fn with_testing(mut self, testing: TestingOptions) -> Self {
        self.testing = testing;
        self
    }

    /// The cache max age as a `Duration`.
    pub fn cache_max_age(&self) -> Duration {
        Duration::from_millis(self.cache_max_age_ms)
    }

    /// The key set URI: the explicit one if configured, else
    /// `<issuer>/.well-known/jwks.json`.
    pub fn jwks_uri(&self) -> String {
        match &self.jwks_uri {
            Some(uri) => uri.clone(),
            None => format!("{}/.well-known/jwks.json", self.issuer.trim_end_matches('/')),
        }
    }

    /// Checks the whole configuration. Performs no I/O.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Configuration`] for a malformed issuer or client ID,
    /// an unknown or empty algorithm list, a zero cache bound or rate limit,
    /// or an unparseable explicit key set URI.
    pub fn validate(&self) -> Result<(), AuthError> {
        validate(Some(&self.issuer), self.client_id.as_deref(), &self.testing)?;
        self.parsed_algorithms()?;

        if self.cache_max_entries == 0 {
            return Err(AuthError::Configuration(
                "cache_max_entries must be at least 1".to_string(),
            ));
        }
        if self.requests_per_minute == 0 {
            return Err(AuthError::Configuration(
                "requests_per_minute must be at least 1".to_string(),
            ));
        }
        if let Some(uri) = &self.jwks_uri {
            Url::parse(uri).map_err(|e| {
                AuthError::Configuration(format!("jwks_uri '{uri}' is not a valid URL: {e}"))
            })?;
        }
        Ok(())
    }

    /// Parses the algorithm allow-list.
    pub(crate) fn parsed_algorithms(&self) -> Result<Vec<Algorithm>, AuthError> {
        if self.algorithms.is_empty() {
            return Err(AuthError::Configuration(
                "at least one algorithm must be allowed".to_string(),
            ));
        }
        self.algorithms
            .iter()
            .map(|alg| {
                Algorithm::from_str(alg).map_err(|_| {
                    AuthError::Configuration(format!("unsupported algorithm '{alg}'"))
                })
            })
            .collect()
    }
}

/// Validates an issuer and optional client ID before any network use.
///
/// # Arguments
///
/// * `issuer` - The configured issuer, if any
/// * `client_id` - The configured client ID, if any
/// * `testing` - Testing relaxations
pub fn validate(
    issuer: Option<&str>,
    client_id: Option<&str>,
    testing: &TestingOptions,
) -> Result<(), AuthError> {
    validate_issuer(issuer, testing)?;
    if let Some(client_id) = client_id {
        validate_client_id(client_id)?;
    }
    Ok(())
}

/// Validates the issuer URL.
pub fn validate_issuer(issuer: Option<&str>, testing: &TestingOptions) -> Result<(), AuthError> {
    if testing.disable_https_check {
        tracing::warn!(
            "HTTPS check is disabled. This allows for insecure configurations and is NOT recommended for production use."
        );
    }

    let issuer = match issuer {
        Some(issuer) if !issuer.trim().is_empty() => issuer,
        _ => {
            return Err(AuthError::Configuration("the issuer URL is missing".to_string()));
        }
    };

    if !testing.disable_https_check && !issuer.starts_with("https://") {
        return Err(AuthError::Configuration(format!(
            "the issuer URL must start with https. Current value: {issuer}"
        )));
    }

    if contains_placeholder(issuer) {
        return Err(AuthError::Configuration(format!(
            "the issuer URL still contains a template placeholder. Current value: {issuer}"
        )));
    }

    if is_admin_domain(issuer) {
        return Err(AuthError::Configuration(format!(
            "the issuer domain should not contain -admin. Current value: {issuer}"
        )));
    }

    Ok(())
}

/// Validates a configured client ID.
pub fn validate_client_id(client_id: &str) -> Result<(), AuthError> {
    if client_id.trim().is_empty() {
        return Err(AuthError::Configuration("the client ID is missing".to_string()));
    }
    if contains_placeholder(client_id) {
        return Err(AuthError::Configuration(format!(
            "the client ID still contains a template placeholder. Current value: {client_id}"
        )));
    }
    Ok(())
}

/// Detects `{...}` template tokens and known build-time sentinels.
fn contains_placeholder(value: &str) -> bool {
    if PLACEHOLDER_SENTINELS.iter().any(|s| value.contains(s)) {
        return true;
    }
    value
        .find('{')
        .is_some_and(|open| value[open + 1..].find('}').is_some_and(|close| close > 0))
}

fn is_admin_domain(issuer: &str) -> bool {
    let Ok(url) = Url::parse(issuer) else {
        return false;
    };
    let Some(host) = url.host_str() else {
        return false;
    };
    ADMIN_DOMAINS
        .iter()
        .any(|domain| host.contains(&format!("-admin.{domain}")))
}
