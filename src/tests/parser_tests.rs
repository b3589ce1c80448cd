//! Token decoding tests.
//!
//! Decoding never checks signatures, so these tests build tokens by hand
//! from arbitrary segments.

use super::test_helpers::*;
use crate::{AuthError, DecodedToken};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};

fn segment(value: &Value) -> String {
    URL_SAFE_NO_PAD.encode(value.to_string())
}

fn compact(header: &Value, payload: &Value) -> String {
    format!("{}.{}.c2lnbmF0dXJl", segment(header), segment(payload))
}

fn assert_malformed(token: &str) {
    match DecodedToken::decode(token) {
        Err(AuthError::MalformedToken(_)) => {}
        other => panic!("expected a malformed token error for {token:?}, got {other:?}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_valid_token() {
        let token = compact(
            &json!({ "alg": "RS256", "kid": TEST_KID, "typ": "JWT" }),
            &json!({ "sub": TEST_SUBJECT, "scp": ["openid"] }),
        );

        let decoded = DecodedToken::decode(&token).unwrap();
        assert_eq!(decoded.header.alg, "RS256");
        assert_eq!(decoded.header.kid.as_deref(), Some(TEST_KID));
        assert_eq!(decoded.header.typ.as_deref(), Some("JWT"));
        assert_eq!(decoded.claims["sub"], TEST_SUBJECT);
        assert_eq!(decoded.claims["scp"], json!(["openid"]));
    }

    #[test]
    fn test_decode_signed_token() {
        let token = sign(&primary_key(), &standard_claims());

        let decoded = DecodedToken::decode(&token).unwrap();
        assert_eq!(decoded.header.alg, "RS256");
        assert_eq!(decoded.header.kid.as_deref(), Some(TEST_KID));
        assert_eq!(decoded.claims["iss"], TEST_ISSUER);
    }

    #[test]
    fn test_header_without_kid() {
        let token = compact(&json!({ "alg": "ES256" }), &json!({}));

        let decoded = DecodedToken::decode(&token).unwrap();
        assert_eq!(decoded.header.kid, None);
        assert_eq!(decoded.header.typ, None);
        assert!(decoded.claims.is_empty());
    }

    #[test]
    fn test_padded_segments_are_accepted() {
        let header = format!("{}==", segment(&json!({ "alg": "RS256" })));
        let token = format!("{header}.{}.c2ln", segment(&json!({ "a": 1 })));

        assert!(DecodedToken::decode(&token).is_ok());
    }

    #[test]
    fn test_wrong_segment_count() {
        assert_malformed("");
        assert_malformed("abc");
        assert_malformed("abc.def");
        assert_malformed("abc.def.ghi.jkl");
        assert_malformed("..");
        assert_malformed("abc..ghi");
    }

    #[test]
    fn test_invalid_characters() {
        let header = segment(&json!({ "alg": "RS256" }));
        let payload = segment(&json!({}));

        assert_malformed(&format!("{header}.{payload}.sig+nature"));
        assert_malformed(&format!("{header}.pay/load.sig"));
        assert_malformed(&format!("{header} .{payload}.sig"));
    }

    #[test]
    fn test_segments_that_are_not_json() {
        let payload = segment(&json!({}));
        let not_json = URL_SAFE_NO_PAD.encode("not json");

        assert_malformed(&format!("{not_json}.{payload}.sig"));
        assert_malformed(&format!("{}.{not_json}.sig", segment(&json!({ "alg": "RS256" }))));
    }

    #[test]
    fn test_header_without_alg_is_malformed() {
        assert_malformed(&compact(&json!({ "kid": TEST_KID }), &json!({})));
    }

    #[test]
    fn test_payload_must_be_an_object() {
        assert_malformed(&compact(&json!({ "alg": "RS256" }), &json!(["a", "b"])));
        assert_malformed(&compact(&json!({ "alg": "RS256" }), &json!("claims")));
    }
}
