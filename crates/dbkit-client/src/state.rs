//! Connection lifecycle states.
//!
//! ```text
//! Closed --connect--> Open --begin--> InTransaction
//!   ^                  |  <--commit/rollback--'
//!   '---disconnect-----'
//! ```
//!
//! The state is tracked at run time rather than in the type because
//! connections are opened lazily by whichever operation runs first.

use std::fmt;

/// Lifecycle state of a [`Db`](crate::Db).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    /// No handle is held.
    #[default]
    Closed,
    /// A handle is open and session settings have been applied.
    Open,
    /// A handle is open inside a `START TRANSACTION` bracket.
    InTransaction,
}

impl ConnectionState {
    /// Whether a handle is held.
    #[must_use]
    pub fn is_open(self) -> bool {
        !matches!(self, Self::Closed)
    }

    /// Whether a transaction bracket is active.
    #[must_use]
    pub fn in_transaction(self) -> bool {
        matches!(self, Self::InTransaction)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Closed => "closed",
            Self::Open => "open",
            Self::InTransaction => "in transaction",
        })
    }
}
