//! # dbkit-testing
//!
//! Test infrastructure for dbkit.
//!
//! - [`MockConnector`]: an in-memory driver that records every statement,
//!   counts opens and closes, and can be scripted to refuse connections,
//!   stall, or fail specific statements
//! - [`init_tracing`]: route `tracing` output to the test harness
//!
//! ## Example
//!
//! ```rust,ignore
//! use dbkit_client::Db;
//! use dbkit_testing::MockConnector;
//!
//! let mock = MockConnector::new();
//! let mut db = Db::new(mock.clone());
//! db.connect().await?;
//! assert_eq!(mock.opens(), 1);
//! assert_eq!(mock.statements(), ["SET NAMES='utf8'", "SET SQL_MODE=''"]);
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod mock;

pub use mock::MockConnector;

/// Install a `tracing` subscriber that writes through the test harness.
///
/// Safe to call from every test; only the first call installs.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}
