//! # Test suite
//!
//! - `test_helpers`: shared keys, token builders and mock key set servers.
//! - `audience_tests`: audience normalization.
//! - `claims_tests`: the claim assertion engine.
//! - `config_tests`: configuration validation, defaults and deserialization.
//! - `jwks_tests`: key conversion, lookup, caching, single-flight and rate limiting.
//! - `middleware_tests`: the axum bearer middleware.
//! - `parser_tests`: untrusted token decoding.
//! - `rate_limit_tests`: the rolling fetch window.
//! - `verifier_tests`: end-to-end verification.


pub mod audience_tests;
pub mod claims_tests;
pub mod parser_tests;
pub mod rate_limit_tests;
