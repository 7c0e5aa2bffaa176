//! Driver seam.
//!
//! [`Db`](crate::Db) never speaks a wire protocol itself. It asks a
//! [`Connector`] for a [`DriverConnection`] and sends text statements through
//! it. A MySQL driver, a proxy, or the in-memory mock from `dbkit-testing`
//! can sit behind these traits.

use std::fmt;

use async_trait::async_trait;
use thiserror::Error;

use crate::row::QueryResult;

/// Error reported by a driver.
///
/// `code` follows the server's numbering where one exists (for MySQL,
/// 2002 is "can't connect", 1045 is "access denied").
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("[{code}] {message}")]
pub struct DriverError {
    /// Numeric error code.
    pub code: u32,
    /// Human-readable message.
    pub message: String,
}

impl DriverError {
    /// Create a new driver error.
    pub fn new(code: u32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

/// Parameters a connector needs to open a connection.
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectOptions {
    /// Server hostname or IP address.
    pub host: String,
    /// Server port.
    pub port: u16,
    /// User name.
    pub username: String,
    /// Password; empty means none.
    pub password: String,
    /// Initial schema.
    pub database: String,
}

impl fmt::Debug for ConnectOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectOptions")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &redacted(&self.password))
            .field("database", &self.database)
            .finish()
    }
}

pub(crate) fn redacted(password: &str) -> &'static str {
    if password.is_empty() { "" } else { "<redacted>" }
}

/// Opens driver connections.
#[async_trait]
pub trait Connector: Send + Sync {
    /// URL scheme used when naming connection targets, e.g. `mysql`.
    fn scheme(&self) -> &str;

    /// Open and authenticate a connection.
    async fn open(
        &self,
        options: &ConnectOptions,
    ) -> Result<Box<dyn DriverConnection>, DriverError>;
}

/// A live, authenticated connection.
#[async_trait]
pub trait DriverConnection: Send {
    /// Run a text statement and return its result.
    async fn execute(&mut self, sql: &str) -> Result<QueryResult, DriverError>;

    /// Close the connection.
    async fn close(self: Box<Self>) -> Result<(), DriverError>;
}
