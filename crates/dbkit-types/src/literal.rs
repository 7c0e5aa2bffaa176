//! SQL literal encoding.
//!
//! Renders scalar values as MySQL literal tokens for text-protocol
//! statements such as `SET NAMES='utf8mb4'`. Strings are single-quoted with
//! backslash escapes, numbers and booleans are bare tokens.

use crate::error::TypeError;
use crate::value::Value;

/// Render a value as a SQL literal.
///
/// # Errors
///
/// Returns [`TypeError::NonFinite`] for NaN or infinite floats.
///
/// # Example
///
/// ```
/// use dbkit_types::{Value, literal::to_literal};
///
/// assert_eq!(to_literal(&Value::Int(3306)).unwrap(), "3306");
/// assert_eq!(to_literal(&Value::Bool(true)).unwrap(), "true");
/// assert_eq!(to_literal(&Value::from("utf8")).unwrap(), "'utf8'");
/// ```
pub fn to_literal(value: &Value) -> Result<String, TypeError> {
    match value {
        Value::Null => Ok("NULL".to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        Value::Int(i) => Ok(i.to_string()),
        Value::UInt(u) => Ok(u.to_string()),
        Value::Float(f) if !f.is_finite() => Err(TypeError::NonFinite(*f)),
        Value::Float(f) => Ok(format!("{f:?}")),
        Value::Text(s) => Ok(quote_string(s)),
    }
}

/// Quote a string, escaping characters that are special inside MySQL
/// single-quoted literals.
#[must_use]
pub fn quote_string(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('\'');
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            '\0' => out.push_str("\\0"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\u{1a}' => out.push_str("\\Z"),
            other => out.push(other),
        }
    }
    out.push('\'');
    out
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_scalar_tokens() {
        assert_eq!(to_literal(&Value::Null).unwrap(), "NULL");
        assert_eq!(to_literal(&Value::Bool(false)).unwrap(), "false");
        assert_eq!(to_literal(&Value::Int(-12)).unwrap(), "-12");
        assert_eq!(
            to_literal(&Value::UInt(u64::MAX)).unwrap(),
            "18446744073709551615"
        );
        assert_eq!(to_literal(&Value::Float(1.0)).unwrap(), "1.0");
        assert_eq!(to_literal(&Value::Float(0.25)).unwrap(), "0.25");
    }

    #[test]
    fn test_empty_string_is_quoted() {
        assert_eq!(to_literal(&Value::from("")).unwrap(), "''");
    }

    #[test]
    fn test_escapes() {
        assert_eq!(quote_string(r"a'b\c"), r"'a\'b\\c'");
        assert_eq!(quote_string("line\nbreak"), r"'line\nbreak'");
        assert_eq!(quote_string("nul\0"), r"'nul\0'");
    }

    #[test]
    fn test_non_finite_rejected() {
        assert!(matches!(
            to_literal(&Value::Float(f64::NAN)),
            Err(TypeError::NonFinite(_))
        ));
        assert!(to_literal(&Value::Float(f64::INFINITY)).is_err());
    }

    /// Scan a quoted literal and report whether an unescaped quote ends it early.
    fn terminates_early(literal: &str) -> bool {
        let inner = &literal[1..literal.len() - 1];
        let mut chars = inner.chars();
        while let Some(c) = chars.next() {
            match c {
                '\\' => {
                    chars.next();
                }
                '\'' => return true,
                _ => {}
            }
        }
        false
    }

    proptest! {
        #[test]
        fn quoted_literal_never_terminates_early(s in ".*") {
            let literal = quote_string(&s);
            prop_assert!(literal.starts_with('\''));
            prop_assert!(literal.ends_with('\''));
            prop_assert!(!terminates_early(&literal));
        }
    }
}
