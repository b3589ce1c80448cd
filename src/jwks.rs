//! # JWKS (JSON Web Key Set) Client
//!
//! Resolves signing keys for a key set URI, with caching, rate limiting and
//! single-flight fetching.
//!
//! ## Caching Strategy
//! 1. A fresh cache entry (younger than the configured max age) is served directly.
//! 2. On a miss or expiry, the first caller starts a fetch and every caller
//!    for that URI, including later arrivals, awaits its one result. Failures
//!    are shared the same way as successes.
//! 3. The fetch runs on its own task, so a caller that gives up waiting does
//!    not cancel it and the result still lands in the cache.
//! 4. Once `max_entries` URIs are cached, the oldest fetch is evicted first.
//!
//! Fetches per URI are capped at `requests_per_minute` in a rolling window;
//! beyond that a lookup fails with [`AuthError::RateLimited`] instead of waiting.

use crate::error::AuthError;
use crate::rate_limit::{FetchWindow, FETCH_WINDOW};
use async_trait::async_trait;
use jsonwebtoken::jwk::Jwk;
use jsonwebtoken::DecodingKey;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{watch, Mutex, RwLock};

const HTTP_TIMEOUT: Duration = Duration::from_secs(5);

/// The raw body of a key set endpoint.
///
/// Keys stay as loose JSON until conversion so that one unsupported entry
/// does not make the whole set unreadable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwkSetDocument {
    pub keys: Vec<Value>,
}

/// Source of raw key sets. The HTTP implementation is [`HttpKeySetFetcher`].
#[async_trait]
pub trait KeySetFetcher: Send + Sync {
    /// Retrieves the key set document published at `uri`.
    async fn fetch(&self, uri: &str) -> Result<JwkSetDocument, AuthError>;
}

/// Fetches key sets over HTTP GET.
#[derive(Debug, Clone)]
pub struct HttpKeySetFetcher {
    client: reqwest::Client,
}

impl HttpKeySetFetcher {
    /// Creates a fetcher with a pooled client and a 5-second timeout.
    pub fn new() -> Result<Self, AuthError> {
        let client = reqwest::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .pool_max_idle_per_host(10)
            .pool_idle_timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| AuthError::Configuration(format!("failed to create HTTP client: {e}")))?;
        Ok(Self { client })
    }

    /// Uses a caller-supplied client (proxies, custom TLS, timeouts).
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl KeySetFetcher for HttpKeySetFetcher {
    async fn fetch(&self, uri: &str) -> Result<JwkSetDocument, AuthError> {
        let response = self.client.get(uri).send().await.map_err(|e| {
            tracing::error!(jwks_uri = %uri, error = %e, "Failed to fetch key set");
            AuthError::KeySetFetch(format!("request to {uri} failed: {e}"))
        })?;

        let status = response.status();
        if !status.is_success() {
            tracing::error!(jwks_uri = %uri, %status, "Key set endpoint returned error status");
            return Err(AuthError::KeySetFetch(format!(
                "{uri} returned status {status}"
            )));
        }

        response.json::<JwkSetDocument>().await.map_err(|e| {
            tracing::error!(jwks_uri = %uri, error = %e, "Failed to parse key set response");
            AuthError::KeySetFetch(format!("invalid key set body from {uri}: {e}"))
        })
    }
}

/// A public key usable for signature verification. Immutable.
#[derive(Clone)]
pub struct SigningKey {
    key_id: Option<String>,
    algorithm: Option<String>,
    key_type: String,
    decoding_key: DecodingKey,
}

impl SigningKey {
    /// Converts a raw JWK entry into a signing key.
    ///
    /// # Arguments
    ///
    /// * `raw` - One entry of the key set's `keys` array
    pub fn from_jwk_value(raw: &Value) -> Result<Self, AuthError> {
        let jwk: Jwk = serde_json::from_value(raw.clone())
            .map_err(|e| AuthError::KeySetFetch(format!("unsupported key: {e}")))?;
        let decoding_key = DecodingKey::from_jwk(&jwk)
            .map_err(|e| AuthError::KeySetFetch(format!("unusable key material: {e}")))?;

        Ok(Self {
            key_id: string_field(raw, "kid"),
            algorithm: string_field(raw, "alg"),
            key_type: string_field(raw, "kty").unwrap_or_default(),
            decoding_key,
        })
    }

    pub fn key_id(&self) -> Option<&str> {
        self.key_id.as_deref()
    }

    pub fn algorithm(&self) -> Option<&str> {
        self.algorithm.as_deref()
    }

    pub fn key_type(&self) -> &str {
        &self.key_type
    }

    pub(crate) fn decoding_key(&self) -> &DecodingKey {
        &self.decoding_key
    }
}

impl fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningKey")
            .field("key_id", &self.key_id)
            .field("algorithm", &self.algorithm)
            .field("key_type", &self.key_type)
            .finish_non_exhaustive()
    }
}

fn string_field(raw: &Value, name: &str) -> Option<String> {
    raw.get(name).and_then(Value::as_str).map(str::to_string)
}

/// Keeps signature-use keys (or keys with no declared use) and converts them.
///
/// # Errors
///
/// [`AuthError::KeySetEmpty`] when the document has no keys,
/// [`AuthError::NoSigningKeys`] when none survive filtering and conversion.
pub fn signing_keys_from_document(document: &JwkSetDocument) -> Result<Vec<SigningKey>, AuthError> {
    if document.keys.is_empty() {
        tracing::error!("Key set response contains no keys");
        return Err(AuthError::KeySetEmpty);
    }

    let keys: Vec<SigningKey> = document
        .keys
        .iter()
        .filter(|raw| matches!(raw.get("use").and_then(Value::as_str), None | Some("sig")))
        .filter_map(|raw| match SigningKey::from_jwk_value(raw) {
            Ok(key) => Some(key),
            Err(e) => {
                let kid = string_field(raw, "kid");
                tracing::warn!(
                    kid = kid.as_deref().unwrap_or("<none>"),
                    error = %e,
                    "Skipping key set entry"
                );
                None
            }
        })
        .collect();

    if keys.is_empty() {
        tracing::error!("Key set response contains no signing keys");
        return Err(AuthError::NoSigningKeys);
    }
    Ok(keys)
}

#[derive(Debug)]
struct CachedKeys {
    keys: Arc<[SigningKey]>,
    fetched_at: Instant,
}

/// Bounded, URI-keyed cache of signing keys.
///
/// Reads and writes go through one lock, so a reader sees either the old
/// key list or the new one, never a partial update.
#[derive(Debug)]
pub struct KeyCache {
    entries: RwLock<HashMap<String, CachedKeys>>,
    max_age: Duration,
    max_entries: usize,
}

impl KeyCache {
    pub fn new(max_age: Duration, max_entries: usize) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            max_age,
            max_entries: max_entries.max(1),
        }
    }

    /// Returns the cached keys for `uri` if they are younger than the max age.
    pub async fn get_fresh(&self, uri: &str) -> Option<Arc<[SigningKey]>> {
        let entries = self.entries.read().await;
        entries
            .get(uri)
            .filter(|cached| cached.fetched_at.elapsed() < self.max_age)
            .map(|cached| Arc::clone(&cached.keys))
    }

    /// Stores keys for `uri`, evicting the oldest fetches beyond the bound.
    pub async fn insert(&self, uri: &str, keys: Arc<[SigningKey]>) {
        let mut entries = self.entries.write().await;
        entries.insert(
            uri.to_string(),
            CachedKeys {
                keys,
                fetched_at: Instant::now(),
            },
        );

        while entries.len() > self.max_entries {
            let Some(oldest) = entries
                .iter()
                .min_by_key(|(_, cached)| cached.fetched_at)
                .map(|(uri, _)| uri.clone())
            else {
                break;
            };
            tracing::debug!(jwks_uri = %oldest, "Evicting oldest key set from cache");
            entries.remove(&oldest);
        }
    }

    pub async fn remove(&self, uri: &str) -> bool {
        self.entries.write().await.remove(uri).is_some()
    }

    pub async fn contains(&self, uri: &str) -> bool {
        self.entries.read().await.contains_key(uri)
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

/// Cache and rate limits for a [`KeySetClient`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeySetClientOptions {
    pub cache_max_age: Duration,
    pub cache_max_entries: usize,
    pub requests_per_minute: u32,
}

impl Default for KeySetClientOptions {
    fn default() -> Self {
        Self {
            cache_max_age: Duration::from_secs(60 * 60),
            cache_max_entries: 3,
            requests_per_minute: 10,
        }
    }
}

type FetchResult = Result<Arc<[SigningKey]>, AuthError>;

/// Where a lookup gets its keys from once the cache has missed.
enum Flight {
    Cached(Arc<[SigningKey]>),
    Waiting(watch::Receiver<Option<FetchResult>>),
}

struct ClientInner {
    fetcher: Arc<dyn KeySetFetcher>,
    cache: KeyCache,
    requests_per_minute: u32,
    fetch_window: Duration,
    /// One entry per URI with a fetch in progress. Lock order: `in_flight`, then `windows`.
    in_flight: Mutex<HashMap<String, watch::Receiver<Option<FetchResult>>>>,
    /// Rate windows with recent fetches. Idle windows are dropped.
    windows: Mutex<HashMap<String, FetchWindow>>,
}

/// Resolves signing keys by key ID for a key set URI.
///
/// Cheap to clone; clones share the cache, rate windows and fetcher.
#[derive(Clone)]
pub struct KeySetClient {
    inner: Arc<ClientInner>,
}

impl fmt::Debug for KeySetClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeySetClient")
            .field("cache", &self.inner.cache)
            .field("requests_per_minute", &self.inner.requests_per_minute)
            .finish_non_exhaustive()
    }
}

impl KeySetClient {
    /// Creates a client over the given fetcher.
    ///
    /// # Arguments
    ///
    /// * `fetcher` - Where raw key sets come from
    /// * `options` - Cache age, cache bound and fetch rate limit
    pub fn new(fetcher: Arc<dyn KeySetFetcher>, options: KeySetClientOptions) -> Self {
        Self::with_fetch_window(fetcher, options, FETCH_WINDOW)
    }

    pub(crate) fn with_fetch_window(
        fetcher: Arc<dyn KeySetFetcher>,
        options: KeySetClientOptions,
        fetch_window: Duration,
    ) -> Self {
        Self {
            inner: Arc::new(ClientInner {
                fetcher,
                cache: KeyCache::new(options.cache_max_age, options.cache_max_entries),
                requests_per_minute: options.requests_per_minute.max(1),
                fetch_window,
                in_flight: Mutex::new(HashMap::new()),
                windows: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Creates a client that fetches over HTTP.
    pub fn http(options: KeySetClientOptions) -> Result<Self, AuthError> {
        Ok(Self::new(Arc::new(HttpKeySetFetcher::new()?), options))
    }

    /// Returns all signing keys for `uri`, fetching them if the cache is cold or stale.
    ///
    /// # Errors
    ///
    /// [`AuthError::KeySetFetch`], [`AuthError::KeySetEmpty`],
    /// [`AuthError::NoSigningKeys`] or [`AuthError::RateLimited`].
    pub async fn get_signing_keys(&self, uri: &str) -> Result<Arc<[SigningKey]>, AuthError> {
        if let Some(keys) = self.inner.cache.get_fresh(uri).await {
            tracing::debug!(jwks_uri = %uri, "Using cached key set");
            return Ok(keys);
        }

        let mut receiver = match self.inner.join_or_start(uri).await? {
            Flight::Cached(keys) => return Ok(keys),
            Flight::Waiting(receiver) => receiver,
        };

        let lost = || AuthError::KeySetFetch("key set fetch task ended without a result".to_string());
        let outcome = receiver
            .wait_for(Option::is_some)
            .await
            .map_err(|_| lost())?
            .clone();
        outcome.unwrap_or_else(|| Err(lost()))
    }

    /// Resolves exactly one signing key.
    ///
    /// # Arguments
    ///
    /// * `uri` - The key set URI
    /// * `kid` - The token's key ID, if it carries one
    ///
    /// # Errors
    ///
    /// Everything [`get_signing_keys`](Self::get_signing_keys) can return, plus
    /// [`AuthError::AmbiguousKey`] when `kid` is absent and several keys exist,
    /// and [`AuthError::KeyNotFound`] when no key carries `kid`.
    pub async fn get_signing_key(&self, uri: &str, kid: Option<&str>) -> Result<SigningKey, AuthError> {
        let keys = self.get_signing_keys(uri).await?;

        match kid {
            None if keys.len() > 1 => {
                tracing::warn!(jwks_uri = %uri, key_count = keys.len(), "Token has no kid and key set is ambiguous");
                Err(AuthError::AmbiguousKey)
            }
            None => keys.first().cloned().ok_or(AuthError::NoSigningKeys),
            Some(kid) => keys
                .iter()
                .find(|key| key.key_id() == Some(kid))
                .cloned()
                .ok_or_else(|| {
                    tracing::warn!(jwks_uri = %uri, kid, "Key not found in key set");
                    AuthError::KeyNotFound(kid.to_string())
                }),
        }
    }

    /// Drops the cached keys for `uri`, forcing the next lookup to fetch.
    pub async fn invalidate(&self, uri: &str) -> bool {
        self.inner.cache.remove(uri).await
    }

    pub async fn is_cached(&self, uri: &str) -> bool {
        self.inner.cache.contains(uri).await
    }

    pub async fn cached_uri_count(&self) -> usize {
        self.inner.cache.len().await
    }

    /// Number of URIs with fetches inside the current rate window.
    #[cfg(test)]
    pub(crate) async fn tracked_window_count(&self) -> usize {
        self.inner.windows.lock().await.len()
    }
}

impl ClientInner {
    /// Joins the fetch in progress for `uri`, or starts one.
    async fn join_or_start(self: &Arc<Self>, uri: &str) -> Result<Flight, AuthError> {
        let mut in_flight = self.in_flight.lock().await;

        // A closed channel means the fetch task died; replace it.
        if let Some(receiver) = in_flight.get(uri).filter(|rx| rx.has_changed().is_ok()) {
            tracing::debug!(jwks_uri = %uri, "Joining in-flight key set fetch");
            return Ok(Flight::Waiting(receiver.clone()));
        }

        // Another caller may have completed the fetch while we waited.
        if let Some(keys) = self.cache.get_fresh(uri).await {
            tracing::debug!(jwks_uri = %uri, "Key set cache was updated while waiting for lock");
            return Ok(Flight::Cached(keys));
        }

        self.acquire_fetch_slot(uri).await?;

        let (sender, receiver) = watch::channel(None);
        in_flight.insert(uri.to_string(), receiver.clone());
        drop(in_flight);

        let inner = Arc::clone(self);
        let owned_uri = uri.to_string();
        tokio::spawn(async move {
            let result = inner.fetch_keys(&owned_uri).await;
            let mut in_flight = inner.in_flight.lock().await;
            in_flight.remove(&owned_uri);
            sender.send_replace(Some(result));
        });

        Ok(Flight::Waiting(receiver))
    }

    async fn acquire_fetch_slot(&self, uri: &str) -> Result<(), AuthError> {
        let now = Instant::now();
        let mut windows = self.windows.lock().await;
        windows.retain(|_, window| !window.is_idle(now));

        let window = windows
            .entry(uri.to_string())
            .or_insert_with(|| FetchWindow::with_window(self.requests_per_minute, self.fetch_window));
        if !window.try_acquire(now) {
            tracing::warn!(jwks_uri = %uri, limit = window.limit(), "Key set fetch rate limited");
            return Err(AuthError::RateLimited {
                uri: uri.to_string(),
                limit: window.limit(),
            });
        }

        tracing::info!(
            jwks_uri = %uri,
            remaining = window.remaining(now),
            "Fetching fresh key set"
        );
        Ok(())
    }

    async fn fetch_keys(&self, uri: &str) -> FetchResult {
        let document = self.fetcher.fetch(uri).await?;
        let keys: Arc<[SigningKey]> = signing_keys_from_document(&document)?.into();

        self.cache.insert(uri, Arc::clone(&keys)).await;
        tracing::info!(jwks_uri = %uri, key_count = keys.len(), "Key set cache updated");
        Ok(keys)
    }
}
