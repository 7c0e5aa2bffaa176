//! In-memory mock driver.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dbkit_client::{ConnectOptions, Connector, DriverConnection, DriverError, QueryResult};
use parking_lot::Mutex;

/// MySQL client error code for "can't connect to server".
pub const CR_CONNECTION_ERROR: u32 = 2002;

/// A scriptable [`Connector`] that keeps everything in memory.
///
/// Clones share state, so a test can hand one clone to a
/// [`Db`](dbkit_client::Db) and inspect the other.
#[derive(Clone, Default)]
pub struct MockConnector {
    inner: Arc<Mutex<MockState>>,
}

#[derive(Default)]
struct MockState {
    refuse: Option<DriverError>,
    connect_delay: Option<Duration>,
    statement_delay: Option<Duration>,
    failing_statements: Vec<(String, DriverError)>,
    results: HashMap<String, QueryResult>,
    fail_close: Option<DriverError>,
    attempts: u32,
    opens: u32,
    closes: u32,
    live: u32,
    statements: Vec<String>,
    last_options: Option<ConnectOptions>,
}

impl MockConnector {
    /// Create a mock that accepts every connection and statement.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Refuse every connection attempt with `error`.
    #[must_use]
    pub fn refuse_connections(self, error: DriverError) -> Self {
        self.set_refuse(Some(error));
        self
    }

    /// Refuse connections with the MySQL "connection refused" error.
    #[must_use]
    pub fn connection_refused(self) -> Self {
        self.refuse_connections(DriverError::new(
            CR_CONNECTION_ERROR,
            "Can't connect to MySQL server (111 \"Connection refused\")",
        ))
    }

    /// Change whether connections are refused.
    pub fn set_refuse(&self, error: Option<DriverError>) {
        self.inner.lock().refuse = error;
    }

    /// Delay every connection attempt.
    #[must_use]
    pub fn with_connect_delay(self, delay: Duration) -> Self {
        self.inner.lock().connect_delay = Some(delay);
        self
    }

    /// Delay every statement before it is recorded and answered.
    #[must_use]
    pub fn with_statement_delay(self, delay: Duration) -> Self {
        self.inner.lock().statement_delay = Some(delay);
        self
    }

    /// Fail every statement starting with `prefix`.
    #[must_use]
    pub fn fail_statement(self, prefix: impl Into<String>, error: DriverError) -> Self {
        self.inner
            .lock()
            .failing_statements
            .push((prefix.into(), error));
        self
    }

    /// Return `result` for the exact statement `sql`.
    #[must_use]
    pub fn with_result(self, sql: impl Into<String>, result: QueryResult) -> Self {
        self.inner.lock().results.insert(sql.into(), result);
        self
    }

    /// Make every close report `error` (the connection still counts as
    /// closed).
    #[must_use]
    pub fn fail_close(self, error: DriverError) -> Self {
        self.inner.lock().fail_close = Some(error);
        self
    }

    /// Number of connection attempts, successful or not.
    #[must_use]
    pub fn attempts(&self) -> u32 {
        self.inner.lock().attempts
    }

    /// Number of connections opened.
    #[must_use]
    pub fn opens(&self) -> u32 {
        self.inner.lock().opens
    }

    /// Number of connections closed.
    #[must_use]
    pub fn closes(&self) -> u32 {
        self.inner.lock().closes
    }

    /// Connections opened and not yet closed.
    #[must_use]
    pub fn live_connections(&self) -> u32 {
        self.inner.lock().live
    }

    /// Every statement received, in order, across all connections.
    #[must_use]
    pub fn statements(&self) -> Vec<String> {
        self.inner.lock().statements.clone()
    }

    /// Forget recorded statements.
    pub fn clear_statements(&self) {
        self.inner.lock().statements.clear();
    }

    /// Options passed to the most recent connection attempt.
    #[must_use]
    pub fn last_options(&self) -> Option<ConnectOptions> {
        self.inner.lock().last_options.clone()
    }
}

impl std::fmt::Debug for MockConnector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.inner.lock();
        f.debug_struct("MockConnector")
            .field("opens", &state.opens)
            .field("closes", &state.closes)
            .field("live", &state.live)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Connector for MockConnector {
    fn scheme(&self) -> &str {
        "mysql"
    }

    async fn open(
        &self,
        options: &ConnectOptions,
    ) -> Result<Box<dyn DriverConnection>, DriverError> {
        let delay = {
            let mut state = self.inner.lock();
            state.attempts += 1;
            state.last_options = Some(options.clone());
            state.connect_delay
        };

        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.inner.lock();
        if let Some(error) = &state.refuse {
            return Err(error.clone());
        }
        state.opens += 1;
        state.live += 1;
        tracing::trace!(host = %options.host, port = options.port, "mock connection opened");

        Ok(Box::new(MockConnection {
            state: Arc::clone(&self.inner),
        }))
    }
}

struct MockConnection {
    state: Arc<Mutex<MockState>>,
}

#[async_trait]
impl DriverConnection for MockConnection {
    async fn execute(&mut self, sql: &str) -> Result<QueryResult, DriverError> {
        let delay = self.state.lock().statement_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.state.lock();
        state.statements.push(sql.to_string());

        if let Some((_, error)) = state
            .failing_statements
            .iter()
            .find(|(prefix, _)| sql.starts_with(prefix.as_str()))
        {
            return Err(error.clone());
        }

        Ok(state.results.get(sql).cloned().unwrap_or_default())
    }

    async fn close(self: Box<Self>) -> Result<(), DriverError> {
        let mut state = self.state.lock();
        state.closes += 1;
        state.live = state.live.saturating_sub(1);

        match &state.fail_close {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }
}
