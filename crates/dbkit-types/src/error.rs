//! Type conversion error types.

use thiserror::Error;

/// Errors that can occur when converting or encoding values.
#[derive(Debug, Clone, PartialEq, Error)]
#[non_exhaustive]
pub enum TypeError {
    /// A value that must be scalar was a list, mapping, or null.
    #[error("value {value} is not scalar")]
    NotScalar {
        /// Rendering of the offending value.
        value: String,
    },

    /// The value has a different type than requested.
    #[error("type mismatch: expected {expected}, got {actual}")]
    TypeMismatch {
        /// Expected type.
        expected: &'static str,
        /// Actual type or description.
        actual: String,
    },

    /// The value was NULL where a non-null value was required.
    #[error("unexpected NULL value")]
    UnexpectedNull,

    /// A float that cannot be written as a SQL literal.
    #[error("non-finite float {0} has no SQL literal")]
    NonFinite(f64),
}
