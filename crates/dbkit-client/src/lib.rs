//! # dbkit-client
//!
//! Connection lifecycle for a MySQL-family database: lazy, idempotent
//! connection establishment with settings-driven session configuration.
//!
//! ## Features
//!
//! - **Per-field settings resolution**: partial configuration is merged
//!   over built-in defaults
//! - **Lazy connect**: the first operation opens the connection, later
//!   `connect()` calls are no-ops
//! - **Session settings**: `SET KEY=value` statements run right after
//!   authentication, validated before any is sent
//! - **Redacted errors**: connection failures name the target but never the
//!   password
//! - **Pluggable drivers**: the wire protocol lives behind [`Connector`]
//!
//! ## Example
//!
//! ```rust,ignore
//! use dbkit_client::{Db, JsonConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = JsonConfig::from_json_str(r#"{
//!         "db": {
//!             "host": "db1",
//!             "username": "app",
//!             "database": "app_db",
//!             "db_settings": {"names": "utf8mb4"}
//!         }
//!     }"#)?;
//!
//!     let mut db = Db::from_source(connector, &config)?;
//!     db.connect().await?; // runs SET NAMES='utf8mb4'
//!
//!     db.begin().await?;
//!     db.execute("UPDATE accounts SET balance = balance - 10 WHERE id = 1").await?;
//!     db.commit().await?;
//!
//!     db.disconnect().await?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod client;
pub mod config;
pub mod driver;
pub mod error;
pub mod instrumentation;
pub mod row;
pub mod session;
pub mod state;

// Re-export commonly used types
pub use client::{Db, SharedDb};
pub use config::{ConfigSource, ConnectionProfile, JsonConfig};
pub use dbkit_types::{FromValue, TypeError, Value};
pub use driver::{ConnectOptions, Connector, DriverConnection, DriverError};
pub use error::{Error, Result};
pub use instrumentation::SanitizationConfig;
pub use row::{Column, QueryResult, Row};
pub use state::ConnectionState;
