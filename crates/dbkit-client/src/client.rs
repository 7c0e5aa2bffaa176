//! Database facade with lazy connection management.

use std::sync::Arc;

use serde_json::Value as JsonValue;
use tokio::sync::Mutex;
use tracing::Instrument;

use crate::config::{ConfigSource, ConnectionProfile};
use crate::driver::{Connector, DriverConnection};
use crate::error::{Error, Result};
use crate::instrumentation::{SanitizationConfig, connect_span, query_span};
use crate::row::QueryResult;
use crate::session;
use crate::state::ConnectionState;

/// A [`Db`] shared between tasks. The mutex serialises every operation on
/// the single underlying connection.
pub type SharedDb = Arc<Mutex<Db>>;

/// Owner of one database connection.
///
/// The connection is opened by the first operation that needs it and kept
/// until [`disconnect`](Self::disconnect). Right after opening, the
/// profile's session settings are applied as `SET KEY=value` statements.
///
/// All operations take `&mut self`; wrap the value with
/// [`into_shared`](Self::into_shared) to use it from several tasks.
///
/// # Example
///
/// ```rust,ignore
/// use dbkit_client::{Db, JsonConfig};
///
/// let config = JsonConfig::from_json_str(r#"{"db": {"host": "db1", "username": "app"}}"#)?;
/// let mut db = Db::from_source(connector, &config)?;
///
/// // Connects on first use
/// let result = db.query("SELECT id, name FROM users").await?;
/// for row in &result.rows {
///     let name: String = row.get_by_name("name")?;
/// }
/// ```
pub struct Db {
    connector: Arc<dyn Connector>,
    profile: ConnectionProfile,
    handle: Option<Box<dyn DriverConnection>>,
    state: ConnectionState,
    sanitization: SanitizationConfig,
}

impl Db {
    /// Consumer name used when asking a [`ConfigSource`] for settings.
    pub const CONFIG_KEY: &'static str = "db";

    /// Create a facade using the default profile.
    pub fn new(connector: impl Connector + 'static) -> Self {
        Self::with_profile(connector, ConnectionProfile::default())
    }

    /// Create a facade for an explicit profile.
    pub fn with_profile(connector: impl Connector + 'static, profile: ConnectionProfile) -> Self {
        Self {
            connector: Arc::new(connector),
            profile,
            handle: None,
            state: ConnectionState::Closed,
            sanitization: SanitizationConfig::default(),
        }
    }

    /// Create a facade whose profile is resolved from `source`.
    ///
    /// Nothing is opened here; the first operation connects.
    pub fn from_source(
        connector: impl Connector + 'static,
        source: &dyn ConfigSource,
    ) -> Result<Self> {
        let profile = ConnectionProfile::from_source(source, Self::CONFIG_KEY)?;
        Ok(Self::with_profile(connector, profile))
    }

    /// Set how statements are rendered in logs.
    #[must_use]
    pub fn with_sanitization(mut self, sanitization: SanitizationConfig) -> Self {
        self.sanitization = sanitization;
        self
    }

    /// The resolved connection profile.
    #[must_use]
    pub fn profile(&self) -> &ConnectionProfile {
        &self.profile
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Whether a connection is currently held.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.handle.is_some()
    }

    /// Redacted name of the connection target.
    #[must_use]
    pub fn target(&self) -> String {
        self.profile.target(self.connector.scheme())
    }

    /// Open the connection unless one is already held.
    ///
    /// On success the session settings have been applied. On any failure
    /// no connection is kept: a handle opened before the failure is closed
    /// again.
    ///
    /// # Cancellation
    ///
    /// Not cancellation safe. If the future is dropped after the driver has
    /// opened a connection but before the session settings are applied, that
    /// connection is dropped without [`DriverConnection::close`] and a
    /// warning is logged. The facade stays `Closed` and the next call
    /// connects again.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidSettings`] for a configured value that could not be
    ///   coerced, a zero port, session settings that are not a mapping, or a
    ///   non-scalar setting value
    /// - [`Error::Connection`] when the driver refuses the connection
    /// - [`Error::ConnectTimeout`] when opening exceeds the profile's timeout
    /// - [`Error::SessionSetup`] when a `SET` statement fails
    pub async fn connect(&mut self) -> Result<()> {
        if self.handle.is_some() {
            return Ok(());
        }

        let span = connect_span(self.connector.scheme(), &self.profile);
        self.open_handle().instrument(span).await
    }

    async fn open_handle(&mut self) -> Result<()> {
        let target = self.target();
        self.profile.validate()?;

        tracing::info!(dsn = %target, "connecting");

        let options = self.profile.connect_options();
        let timeout = self.profile.connect_timeout;
        let handle = match tokio::time::timeout(timeout, self.connector.open(&options)).await {
            Err(_) => return Err(Error::ConnectTimeout { target, timeout }),
            Ok(Err(e)) => {
                return Err(Error::Connection {
                    target,
                    code: e.code,
                    message: e.message,
                });
            }
            Ok(Ok(handle)) => handle,
        };

        let mut pending = PendingConnection::new(handle, &target);
        let applied = apply_session_settings(
            pending.handle()?,
            &self.profile.session_settings,
            &self.sanitization,
        )
        .await;
        let handle = pending.into_inner().ok_or(Error::NotConnected)?;
        if let Err(e) = applied {
            tracing::warn!(dsn = %target, error = %e, "session setup failed, closing connection");
            close_quietly(handle).await;
            return Err(e);
        }

        self.handle = Some(handle);
        self.state = ConnectionState::Open;
        tracing::info!(dsn = %target, "connected");
        Ok(())
    }

    /// Close the connection if one is held.
    ///
    /// The state is `Closed` afterwards even when the driver reports an
    /// error while closing.
    pub async fn disconnect(&mut self) -> Result<()> {
        let Some(handle) = self.handle.take() else {
            return Ok(());
        };

        if self.state.in_transaction() {
            tracing::warn!("disconnecting inside a transaction; uncommitted work is discarded");
        }
        self.state = ConnectionState::Closed;

        tracing::info!(dsn = %self.target(), "disconnecting");
        handle.close().await.map_err(Error::Driver)
    }

    /// Close any held connection, then connect again.
    ///
    /// A failure while closing is logged and does not stop the new
    /// connection attempt.
    pub async fn reconnect(&mut self) -> Result<()> {
        if let Err(e) = self.disconnect().await {
            tracing::warn!(error = %e, "error closing connection before reconnect");
        }
        self.connect().await
    }

    /// Run a statement and return its raw result, connecting first if
    /// needed.
    pub async fn query(&mut self, sql: &str) -> Result<QueryResult> {
        self.connect().await?;

        let span = query_span(self.connector.scheme(), sql);
        let logged = self.sanitization.sanitize(sql);
        let handle = self.handle.as_deref_mut().ok_or(Error::NotConnected)?;

        async move {
            tracing::debug!(sql = %logged, "executing statement");
            handle.execute(sql).await.map_err(Error::Query)
        }
        .instrument(span)
        .await
    }

    /// Run a statement that returns no rows.
    ///
    /// Returns the number of affected rows.
    pub async fn execute(&mut self, sql: &str) -> Result<u64> {
        Ok(self.query(sql).await?.rows_affected)
    }

    /// Start a transaction, connecting first if needed.
    pub async fn begin(&mut self) -> Result<()> {
        if self.state.in_transaction() {
            return Err(Error::Transaction(
                "a transaction is already active".into(),
            ));
        }

        self.query("START TRANSACTION").await?;
        self.state = ConnectionState::InTransaction;
        Ok(())
    }

    /// Commit the active transaction.
    pub async fn commit(&mut self) -> Result<()> {
        self.finish_transaction("COMMIT").await
    }

    /// Roll back the active transaction.
    pub async fn rollback(&mut self) -> Result<()> {
        self.finish_transaction("ROLLBACK").await
    }

    async fn finish_transaction(&mut self, statement: &'static str) -> Result<()> {
        if !self.state.in_transaction() {
            return Err(Error::Transaction(format!(
                "{statement} without an active transaction"
            )));
        }

        // A failed COMMIT leaves the bracket open so the caller can roll back
        self.query(statement).await?;
        self.state = ConnectionState::Open;
        Ok(())
    }

    /// Wrap the facade for use from several tasks.
    #[must_use]
    pub fn into_shared(self) -> SharedDb {
        Arc::new(Mutex::new(self))
    }
}

/// Apply session settings in order. All entries are validated before the
/// first statement is sent.
async fn apply_session_settings(
    handle: &mut dyn DriverConnection,
    settings: &JsonValue,
    sanitization: &SanitizationConfig,
) -> Result<()> {
    let settings = session::plan(settings)?;

    for setting in &settings {
        let statement = setting.statement()?;
        tracing::debug!(sql = %sanitization.sanitize(&statement), "applying session setting");
        handle
            .execute(&statement)
            .await
            .map_err(|source| Error::SessionSetup {
                key: setting.key.clone(),
                source,
            })?;
    }

    Ok(())
}

/// A freshly opened connection that has not been handed to the facade yet.
///
/// Dropping it while it still holds the connection means the connect future
/// was cancelled mid-setup.
struct PendingConnection {
    handle: Option<Box<dyn DriverConnection>>,
    target: String,
}

impl PendingConnection {
    fn new(handle: Box<dyn DriverConnection>, target: &str) -> Self {
        Self {
            handle: Some(handle),
            target: target.to_string(),
        }
    }

    fn handle(&mut self) -> Result<&mut (dyn DriverConnection + 'static)> {
        self.handle.as_deref_mut().ok_or(Error::NotConnected)
    }

    fn into_inner(mut self) -> Option<Box<dyn DriverConnection>> {
        self.handle.take()
    }
}

impl Drop for PendingConnection {
    fn drop(&mut self) {
        if self.handle.is_some() {
            tracing::warn!(
                dsn = %self.target,
                "connect cancelled during session setup; connection dropped without close"
            );
        }
    }
}

async fn close_quietly(handle: Box<dyn DriverConnection>) {
    if let Err(e) = handle.close().await {
        tracing::warn!(error = %e, "failed to close connection");
    }
}

impl std::fmt::Debug for Db {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Db")
            .field("host", &self.profile.host)
            .field("port", &self.profile.port)
            .field("database", &self.profile.database)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}
