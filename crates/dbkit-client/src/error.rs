//! Client error types.

use std::time::Duration;

use dbkit_types::TypeError;
use thiserror::Error;

use crate::driver::DriverError;

/// Result type for client operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by the connection lifecycle and data-access operations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// The driver could not open a connection.
    ///
    /// `target` is redacted: it names the user, host, port, and database
    /// and says whether a password was supplied, never the password itself.
    #[error("failed connection to {target}: {message}")]
    Connection {
        /// Redacted connection target.
        target: String,
        /// Driver error code.
        code: u32,
        /// Driver error message.
        message: String,
    },

    /// The connection attempt did not complete in time.
    #[error("connection to {target} timed out after {timeout:?}")]
    ConnectTimeout {
        /// Redacted connection target.
        target: String,
        /// Configured timeout.
        timeout: Duration,
    },

    /// Session settings are malformed (not a mapping, non-scalar value,
    /// invalid key) or the profile is unusable.
    #[error("invalid settings: {0}")]
    InvalidSettings(String),

    /// A session configuration statement was rejected by the server.
    #[error("session setting {key} failed: {source}")]
    SessionSetup {
        /// Upper-cased setting name.
        key: String,
        /// Driver error.
        #[source]
        source: DriverError,
    },

    /// Configuration could not be loaded or resolved.
    #[error("configuration error: {0}")]
    Config(String),

    /// A statement failed.
    #[error("query failed: {0}")]
    Query(#[source] DriverError),

    /// The driver failed while closing a connection.
    #[error("driver error: {0}")]
    Driver(#[source] DriverError),

    /// Transaction bracket misuse.
    #[error("transaction error: {0}")]
    Transaction(String),

    /// An operation needed an open connection and none was available.
    #[error("not connected")]
    NotConnected,

    /// Value conversion failed.
    #[error(transparent)]
    Type(#[from] TypeError),
}

impl Error {
    /// Driver error code, when the error came from the driver.
    #[must_use]
    pub fn code(&self) -> Option<u32> {
        match self {
            Self::Connection { code, .. } => Some(*code),
            Self::SessionSetup { source, .. } | Self::Query(source) | Self::Driver(source) => {
                Some(source.code)
            }
            _ => None,
        }
    }

    /// Whether retrying the same operation later might succeed.
    ///
    /// Connection failures and timeouts are transient; settings and
    /// configuration errors are not.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Connection { .. } | Self::ConnectTimeout { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_error_message() {
        let err = Error::Connection {
            target: "mysql://app@db1:3306/app_db (without password)".into(),
            code: 2002,
            message: "Connection refused".into(),
        };
        assert_eq!(
            err.to_string(),
            "failed connection to mysql://app@db1:3306/app_db (without password): Connection refused"
        );
        assert_eq!(err.code(), Some(2002));
        assert!(err.is_transient());
    }

    #[test]
    fn test_settings_error_not_transient() {
        let err = Error::InvalidSettings("bad".into());
        assert!(!err.is_transient());
        assert_eq!(err.code(), None);
    }

    #[test]
    fn test_session_setup_exposes_driver_code() {
        let err = Error::SessionSetup {
            key: "SQL_MODE".into(),
            source: DriverError::new(1231, "Variable 'sql_mode' can't be set"),
        };
        assert_eq!(err.code(), Some(1231));
        assert!(err.to_string().starts_with("session setting SQL_MODE failed"));
    }
}
