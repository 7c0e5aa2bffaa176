//! Typed extraction from [`Value`].

use crate::error::TypeError;
use crate::value::Value;

/// Conversion from a database [`Value`] into a Rust type.
pub trait FromValue: Sized {
    /// Convert a non-null value.
    fn from_value(value: &Value) -> Result<Self, TypeError>;

    /// Convert a value that may be NULL, returning `None` for NULL.
    fn from_value_nullable(value: &Value) -> Result<Option<Self>, TypeError> {
        if value.is_null() {
            Ok(None)
        } else {
            Self::from_value(value).map(Some)
        }
    }
}

fn mismatch(expected: &'static str, value: &Value) -> TypeError {
    if value.is_null() {
        TypeError::UnexpectedNull
    } else {
        TypeError::TypeMismatch {
            expected,
            actual: value.type_name().to_string(),
        }
    }
}

impl FromValue for bool {
    fn from_value(value: &Value) -> Result<Self, TypeError> {
        match value {
            Value::Bool(b) => Ok(*b),
            // MySQL reports BOOLEAN columns as TINYINT(1)
            Value::Int(0) | Value::UInt(0) => Ok(false),
            Value::Int(1) | Value::UInt(1) => Ok(true),
            other => Err(mismatch("bool", other)),
        }
    }
}

impl FromValue for i64 {
    fn from_value(value: &Value) -> Result<Self, TypeError> {
        match value {
            Value::Int(i) => Ok(*i),
            Value::UInt(u) => Self::try_from(*u).map_err(|_| TypeError::TypeMismatch {
                expected: "i64",
                actual: format!("unsigned int {u}"),
            }),
            Value::Text(s) => s.trim().parse().map_err(|_| TypeError::TypeMismatch {
                expected: "i64",
                actual: format!("text {s:?}"),
            }),
            other => Err(mismatch("i64", other)),
        }
    }
}

impl FromValue for u64 {
    fn from_value(value: &Value) -> Result<Self, TypeError> {
        match value {
            Value::UInt(u) => Ok(*u),
            Value::Int(i) => Self::try_from(*i).map_err(|_| TypeError::TypeMismatch {
                expected: "u64",
                actual: format!("int {i}"),
            }),
            Value::Text(s) => s.trim().parse().map_err(|_| TypeError::TypeMismatch {
                expected: "u64",
                actual: format!("text {s:?}"),
            }),
            other => Err(mismatch("u64", other)),
        }
    }
}

impl FromValue for f64 {
    fn from_value(value: &Value) -> Result<Self, TypeError> {
        match value {
            Value::Float(f) => Ok(*f),
            #[allow(clippy::cast_precision_loss)]
            Value::Int(i) => Ok(*i as f64),
            #[allow(clippy::cast_precision_loss)]
            Value::UInt(u) => Ok(*u as f64),
            Value::Text(s) => s.trim().parse().map_err(|_| TypeError::TypeMismatch {
                expected: "f64",
                actual: format!("text {s:?}"),
            }),
            other => Err(mismatch("f64", other)),
        }
    }
}

impl FromValue for String {
    fn from_value(value: &Value) -> Result<Self, TypeError> {
        match value {
            Value::Null => Err(TypeError::UnexpectedNull),
            Value::Text(s) => Ok(s.clone()),
            other => Ok(other.to_string()),
        }
    }
}

impl FromValue for Value {
    fn from_value(value: &Value) -> Result<Self, TypeError> {
        Ok(value.clone())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_integer_from_text_column() {
        // text protocol result sets deliver numbers as strings
        assert_eq!(i64::from_value(&Value::Text(" 17".into())).unwrap(), 17);
        assert!(i64::from_value(&Value::Text("x".into())).is_err());
    }

    #[test]
    fn test_unsigned_conversions() {
        assert_eq!(u64::from_value(&Value::UInt(u64::MAX)).unwrap(), u64::MAX);
        assert_eq!(u64::from_value(&Value::Int(7)).unwrap(), 7);
        assert!(u64::from_value(&Value::Int(-1)).is_err());
        assert!(i64::from_value(&Value::UInt(u64::MAX)).is_err());
        assert_eq!(i64::from_value(&Value::UInt(9)).unwrap(), 9);
    }

    #[test]
    fn test_bool_from_tinyint() {
        assert!(bool::from_value(&Value::Int(1)).unwrap());
        assert!(!bool::from_value(&Value::Int(0)).unwrap());
        assert!(bool::from_value(&Value::Int(2)).is_err());
    }

    #[test]
    fn test_null_handling() {
        assert_eq!(
            String::from_value(&Value::Null).unwrap_err(),
            TypeError::UnexpectedNull
        );
        assert_eq!(i64::from_value_nullable(&Value::Null).unwrap(), None);
        assert_eq!(
            i64::from_value_nullable(&Value::Int(3)).unwrap(),
            Some(3)
        );
    }

    #[test]
    fn test_string_renders_scalars() {
        assert_eq!(String::from_value(&Value::Int(5)).unwrap(), "5");
        assert_eq!(String::from_value(&Value::Bool(true)).unwrap(), "true");
    }
}
