//! Session settings applied right after a connection authenticates.
//!
//! The configured mapping is turned into a list of [`SessionSetting`]s
//! before any statement is sent. Every entry is checked up front, so a bad
//! entry anywhere in the mapping rejects the whole plan.

use dbkit_types::{Value, literal};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value as JsonValue;

use crate::config::default_session_settings;
use crate::error::{Error, Result};

/// One session variable assignment.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSetting {
    /// Upper-cased variable name.
    pub key: String,
    /// Scalar value.
    pub value: Value,
}

impl SessionSetting {
    /// The statement that applies this setting: `SET KEY=literal`.
    pub fn statement(&self) -> Result<String> {
        Ok(format!("SET {}={}", self.key, literal::to_literal(&self.value)?))
    }
}

/// Validate a session-settings mapping and turn it into settings, in the
/// order they were written.
///
/// # Errors
///
/// [`Error::InvalidSettings`] if `settings` is not a mapping, if a value is
/// not scalar (string, number, boolean), or if a key is not a valid
/// variable name.
pub fn plan(settings: &JsonValue) -> Result<Vec<SessionSetting>> {
    let JsonValue::Object(entries) = settings else {
        return Err(Error::InvalidSettings(format!(
            "session settings {settings} are not a valid format; \
             expected a mapping such as {}",
            default_session_settings()
        )));
    };

    entries
        .iter()
        .map(|(key, value)| {
            let key = key.to_uppercase();
            validate_key(&key)?;
            let value = Value::scalar_from_json(value).map_err(|e| {
                Error::InvalidSettings(format!("session setting {key}: {e}"))
            })?;
            Ok(SessionSetting { key, value })
        })
        .collect()
}

/// Validate a variable name before it is spliced into a `SET` statement.
///
/// Accepts plain names (`SQL_MODE`), scoped system variables
/// (`@@SESSION.SQL_MODE`), user variables (`@TENANT`) and component
/// variables (`VALIDATE_PASSWORD.LENGTH`).
fn validate_key(key: &str) -> Result<()> {
    #[allow(clippy::unwrap_used)]
    static KEY_RE: Lazy<Regex> = Lazy::new(|| {
        Regex::new(r"^(@@?)?([A-Z_][A-Z0-9_]{0,63}\.){0,2}[A-Z_][A-Z0-9_]{0,63}$").unwrap()
    });

    if key.is_empty() {
        return Err(Error::InvalidSettings(
            "session setting name cannot be empty".into(),
        ));
    }

    if !KEY_RE.is_match(key) {
        return Err(Error::InvalidSettings(format!(
            "invalid session setting name '{key}': expected a variable name such as \
             sql_mode, @@session.sql_mode or validate_password.length"
        )));
    }

    Ok(())
}
