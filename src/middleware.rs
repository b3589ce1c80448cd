//! axum middleware that guards routes with bearer token verification.
//!
//! ```rust,no_run
//! use axum::{middleware, routing::get, Router};
//! use jwt_guard::{BearerAuth, TokenVerifier, VerifierConfig, VerifyOptions};
//! use std::sync::Arc;
//!
//! # fn build() -> Result<Router, jwt_guard::AuthError> {
//! let verifier = Arc::new(TokenVerifier::new(
//!     VerifierConfig::new("https://auth.example.com/oauth2/default"),
//! )?);
//!
//! let private = BearerAuth::new(Arc::clone(&verifier))
//!     .with_options(VerifyOptions::new().with_audience("api://default"));
//!
//! let router = Router::new()
//!     .route("/api/private", get(|| async { "ok" }))
//!     .route_layer(middleware::from_fn_with_state(private, jwt_guard::require_bearer));
//! # Ok(router)
//! # }
//! ```

use crate::claims::Claims;
use crate::error::AuthError;
use crate::verifier::{TokenVerifier, VerifyOptions};
use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, Method, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::sync::Arc;

/// Message returned when the `Authorization` header is missing or not a bearer token.
pub const UNPARSEABLE_HEADER_MESSAGE: &str = "Unable to parse `Authorization` header";

/// Shared state for [`require_bearer`]: the verifier and this route's overrides.
#[derive(Debug, Clone)]
pub struct BearerAuth {
    verifier: Arc<TokenVerifier>,
    options: Arc<VerifyOptions>,
}

impl BearerAuth {
    pub fn new(verifier: Arc<TokenVerifier>) -> Self {
        Self {
            verifier,
            options: Arc::new(VerifyOptions::default()),
        }
    }

    /// Applies per-route overrides (audience, claim policy, ...).
    pub fn with_options(mut self, options: VerifyOptions) -> Self {
        self.options = Arc::new(options);
        self
    }
}

/// Verified claims, placed in request extensions for downstream handlers.
#[derive(Debug, Clone, PartialEq)]
pub struct VerifiedClaims(pub Claims);

/// Verifies the request's bearer token and forwards it, or answers `401`.
///
/// CORS pre-flight requests that announce an `authorization` header pass
/// through untouched.
pub async fn require_bearer(
    State(auth): State<BearerAuth>,
    mut req: Request,
    next: Next,
) -> Result<Response, AuthRejection> {
    if is_authorization_preflight(req.method(), req.headers()) {
        tracing::debug!("Passing CORS pre-flight request through");
        return Ok(next.run(req).await);
    }

    let token = extract_bearer_token(req.headers())
        .map(str::to_owned)
        .ok_or_else(AuthRejection::unparseable_header)?;

    let claims = auth
        .verifier
        .verify_token_with(&token, &auth.options)
        .await
        .map_err(AuthRejection::from)?;

    req.extensions_mut().insert(VerifiedClaims(claims));
    Ok(next.run(req).await)
}

fn is_authorization_preflight(method: &Method, headers: &HeaderMap) -> bool {
    if *method != Method::OPTIONS {
        return false;
    }
    headers
        .get(header::ACCESS_CONTROL_REQUEST_HEADERS)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|requested| {
            requested
                .split(',')
                .any(|name| name.trim().eq_ignore_ascii_case("authorization"))
        })
}

/// Returns the token from `Authorization: Bearer <token>`.
pub fn extract_bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let token = value.strip_prefix("Bearer ")?.trim();
    (!token.is_empty()).then_some(token)
}

/// A `401` with body `{ "success": false, "message": ..., "errorDetails": [...] }`.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthRejection {
    error: Option<&'static str>,
    message: String,
    details: Option<Vec<String>>,
}

impl AuthRejection {
    fn unparseable_header() -> Self {
        tracing::debug!("Rejecting request without a parseable bearer token");
        Self {
            error: None,
            message: UNPARSEABLE_HEADER_MESSAGE.to_string(),
            details: None,
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn details(&self) -> Option<&[String]> {
        self.details.as_deref()
    }
}

impl From<AuthError> for AuthRejection {
    fn from(err: AuthError) -> Self {
        tracing::info!(kind = err.kind(), error = %err, "Bearer token rejected");
        Self {
            error: Some(err.kind()),
            message: err.to_string(),
            details: err.details(),
        }
    }
}

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        let mut body = json!({
            "success": false,
            "message": self.message,
        });
        if let Some(error) = self.error {
            body["error"] = json!(error);
        }
        if let Some(details) = self.details {
            body["errorDetails"] = json!(details);
        }
        (StatusCode::UNAUTHORIZED, Json(body)).into_response()
    }
}
