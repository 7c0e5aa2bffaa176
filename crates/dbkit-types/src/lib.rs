//! # dbkit-types
//!
//! Scalar values exchanged with the database and their SQL literal encoding.
//!
//! ## Overview
//!
//! - [`Value`]: a single scalar cell (`NULL`, boolean, signed or unsigned integer, float, text)
//! - [`FromValue`]: typed extraction from a [`Value`]
//! - [`literal`]: rendering a [`Value`] as a MySQL literal token
//!
//! ## Example
//!
//! ```
//! use dbkit_types::{Value, literal::to_literal};
//!
//! let value = Value::from("it's");
//! assert_eq!(to_literal(&value).unwrap(), r"'it\'s'");
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod error;
pub mod from_value;
pub mod literal;
pub mod value;

pub use error::TypeError;
pub use from_value::FromValue;
pub use value::Value;
