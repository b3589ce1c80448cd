//! Custom claim assertions.
//!
//! A policy is an ordered map from claim expression to expected value:
//!
//! ```text
//! { "scp": "api:read", "permissions.includes": ["orders:read", "orders:write"] }
//! ```
//!
//! An expression is a claim name, optionally followed by `.` and an
//! operator. Without an operator the claim must equal the expected value.
//! With `includes` the claim (an array or a string) must contain the
//! expected value, or every element of an expected array.
//!
//! All value mismatches are collected and reported together. An unknown
//! operator stops evaluation at once.

use crate::error::AuthError;
use serde_json::{Map, Value};
use std::fmt;

/// A verified (or to-be-verified) claim set.
pub type Claims = Map<String, Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimOperator {
    Equals,
    Includes,
}

/// A parsed claim expression such as `permissions.includes`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClaimExpression<'a> {
    pub claim: &'a str,
    pub operator: ClaimOperator,
}

impl<'a> ClaimExpression<'a> {
    /// Splits on the first `.`; the remainder names the operator.
    ///
    /// # Errors
    ///
    /// [`AuthError::InvalidOperator`] for anything other than `includes`.
    pub fn parse(expression: &'a str) -> Result<Self, AuthError> {
        let (claim, operator) = match expression.split_once('.') {
            None | Some((_, "")) => (expression.trim_end_matches('.'), ClaimOperator::Equals),
            Some((claim, "includes")) => (claim, ClaimOperator::Includes),
            Some((_, other)) => return Err(AuthError::InvalidOperator(other.to_string())),
        };
        Ok(Self { claim, operator })
    }
}

/// Checks `actual` against every expectation in `claims_to_assert`.
///
/// # Arguments
///
/// * `claims_to_assert` - Expression → expected value, in declaration order
/// * `actual` - The token's claims
///
/// # Errors
///
/// [`AuthError::InvalidOperator`] on the first unsupported operator, otherwise
/// [`AuthError::ClaimsAssertion`] with one entry per violation.
pub fn assert_claims(claims_to_assert: &Map<String, Value>, actual: &Claims) -> Result<(), AuthError> {
    let mut violations = Vec::new();

    for (expression, expected) in claims_to_assert {
        let expression = ClaimExpression::parse(expression)?;
        let actual_value = actual.get(expression.claim);
        check(&expression, expected, actual_value, &mut violations);
    }

    if violations.is_empty() {
        Ok(())
    } else {
        tracing::warn!(violations = ?violations, "Claim assertions failed");
        Err(AuthError::ClaimsAssertion(violations))
    }
}

fn check(
    expression: &ClaimExpression<'_>,
    expected: &Value,
    actual: Option<&Value>,
    violations: &mut Vec<String>,
) {
    let claim = expression.claim;
    match expression.operator {
        ClaimOperator::Equals => {
            if !actual.is_some_and(|actual| strict_eq(actual, expected)) {
                violations.push(format!(
                    "claim '{claim}' value '{}' does not match expected value '{}'",
                    Shown(actual),
                    Shown(Some(expected))
                ));
            }
        }
        ClaimOperator::Includes => {
            let wanted: &[Value] = match expected {
                Value::Array(values) => values,
                single => std::slice::from_ref(single),
            };
            for value in wanted {
                if !actual.is_some_and(|actual| contains(actual, value)) {
                    violations.push(format!(
                        "claim '{claim}' value '{}' does not include expected value '{}'",
                        Shown(actual),
                        Shown(Some(value))
                    ));
                }
            }
        }
    }
}

/// Equality without coercion. Numbers compare by value, so `1` equals `1.0`.
fn strict_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (x.as_f64(), y.as_f64()) {
            (Some(x), Some(y)) => x == y,
            _ => x == y,
        },
        _ => a == b,
    }
}

/// Containment: array membership, or substring for string claims.
/// Scalars that are not strings never contain anything.
fn contains(actual: &Value, wanted: &Value) -> bool {
    match actual {
        Value::Array(items) => items.iter().any(|item| strict_eq(item, wanted)),
        Value::String(text) => wanted.as_str().is_some_and(|needle| text.contains(needle)),
        _ => false,
    }
}

/// Renders claim values the way they read in a policy message.
struct Shown<'a>(Option<&'a Value>);

impl fmt::Display for Shown<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            None => f.write_str("<missing>"),
            Some(Value::String(s)) => f.write_str(s),
            Some(Value::Array(items)) => {
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{}", Shown(Some(item)))?;
                }
                Ok(())
            }
            Some(other) => write!(f, "{other}"),
        }
    }
}
