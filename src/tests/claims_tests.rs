//! Claim assertion tests.

use super::test_helpers::*;
use crate::{assert_claims, AuthError, ClaimExpression, ClaimOperator, Claims};

/// Builds an ordered map from a JSON object literal.
fn policy(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        other => panic!("policy must be an object, got {other}"),
    }
}

fn claims(value: Value) -> Claims {
    policy(value)
}

fn violations(result: Result<(), AuthError>) -> Vec<String> {
    match result {
        Err(AuthError::ClaimsAssertion(violations)) => violations,
        other => panic!("expected a claims assertion error, got {other:?}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expression_parsing() {
        assert_eq!(
            ClaimExpression::parse("roles").unwrap(),
            ClaimExpression {
                claim: "roles",
                operator: ClaimOperator::Equals
            }
        );
        assert_eq!(
            ClaimExpression::parse("roles.includes").unwrap(),
            ClaimExpression {
                claim: "roles",
                operator: ClaimOperator::Includes
            }
        );
        assert_eq!(ClaimExpression::parse("roles.").unwrap().claim, "roles");
        assert_eq!(
            ClaimExpression::parse("roles.matches"),
            Err(AuthError::InvalidOperator("matches".to_string()))
        );
    }

    #[test]
    fn test_empty_policy_always_passes() {
        assert!(assert_claims(&Map::new(), &Claims::new()).is_ok());
        assert!(assert_claims(&Map::new(), &claims(standard_claims())).is_ok());
    }

    #[test]
    fn test_includes_subset_passes() {
        let policy = policy(json!({ "roles.includes": ["admin"] }));
        let actual = claims(json!({ "roles": ["admin", "user"] }));

        assert!(assert_claims(&policy, &actual).is_ok());
    }

    #[test]
    fn test_includes_missing_element_fails() {
        let policy = policy(json!({ "roles.includes": ["admin"] }));
        let actual = claims(json!({ "roles": ["user"] }));

        let violations = violations(assert_claims(&policy, &actual));
        assert_eq!(violations.len(), 1);
        assert!(violations[0].contains("roles"));
        assert!(violations[0].contains("admin"));
    }

    #[test]
    fn test_includes_reports_each_missing_element() {
        let policy = policy(json!({ "permissions.includes": ["a", "b", "c"] }));
        let actual = claims(json!({ "permissions": ["b"] }));

        let violations = violations(assert_claims(&policy, &actual));
        assert_eq!(violations.len(), 2);
        assert!(violations[0].ends_with("'a'"));
        assert!(violations[1].ends_with("'c'"));
    }

    #[test]
    fn test_includes_scalar_on_array_and_string() {
        let policy = policy(json!({ "scp.includes": "openid" }));

        assert!(assert_claims(&policy, &claims(json!({ "scp": ["openid", "email"] }))).is_ok());
        assert!(assert_claims(&policy, &claims(json!({ "scp": "openid email" }))).is_ok());
        assert_eq!(
            violations(assert_claims(&policy, &claims(json!({ "scp": "email" })))).len(),
            1
        );
    }

    #[test]
    fn test_includes_on_absent_or_scalar_claim_fails() {
        let policy = policy(json!({ "level.includes": 1 }));

        assert_eq!(violations(assert_claims(&policy, &Claims::new())).len(), 1);
        assert_eq!(violations(assert_claims(&policy, &claims(json!({ "level": 1 })))).len(), 1);
        assert_eq!(violations(assert_claims(&policy, &claims(json!({ "level": "1" })))).len(), 1);
        assert!(assert_claims(&policy, &claims(json!({ "level": [1, 2] }))).is_ok());
    }

    #[test]
    fn test_equality_is_strict() {
        let policy = policy(json!({ "ver": 1, "tier": "gold" }));

        assert!(assert_claims(&policy, &claims(json!({ "ver": 1, "tier": "gold" }))).is_ok());
        assert!(assert_claims(&policy, &claims(json!({ "ver": 1.0, "tier": "gold" }))).is_ok());
        // No string/number coercion.
        assert_eq!(
            violations(assert_claims(&policy, &claims(json!({ "ver": "1", "tier": "gold" })))).len(),
            1
        );
        assert_eq!(violations(assert_claims(&policy, &Claims::new())).len(), 2);
    }

    #[test]
    fn test_violations_accumulate_in_declaration_order() {
        let policy = policy(json!({
            "tier": "gold",
            "ok": true,
            "permissions.includes": ["orders:delete"],
        }));
        let actual = claims(json!({
            "tier": "silver",
            "ok": true,
            "permissions": ["orders:read"],
        }));

        let violations = violations(assert_claims(&policy, &actual));
        assert_eq!(violations.len(), 2);
        assert_eq!(
            violations[0],
            "claim 'tier' value 'silver' does not match expected value 'gold'"
        );
        assert_eq!(
            violations[1],
            "claim 'permissions' value 'orders:read' does not include expected value 'orders:delete'"
        );
    }

    #[test]
    fn test_unknown_operator_aborts_without_accumulating() {
        let policy = policy(json!({
            "tier": "gold",
            "roles.startsWith": "adm",
            "ok": true,
        }));

        let result = assert_claims(&policy, &Claims::new());
        assert_eq!(result, Err(AuthError::InvalidOperator("startsWith".to_string())));
    }

    #[test]
    fn test_error_message_joins_violations() {
        let policy = policy(json!({ "a": 1, "b": 2 }));
        let err = assert_claims(&policy, &claims(json!({ "a": 0, "b": 0 }))).unwrap_err();

        let message = err.to_string();
        assert!(message.contains("claim 'a'"));
        assert!(message.contains(", claim 'b'"));
        assert_eq!(err.details().map(|d| d.len()), Some(2));
    }
}
