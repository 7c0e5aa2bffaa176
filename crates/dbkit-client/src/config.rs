//! Connection profile and settings resolution.
//!
//! A [`ConnectionProfile`] is always fully populated. Callers supply a
//! partial mapping through a [`ConfigSource`]; every key they leave out (or
//! set to `null`) falls back to the built-in default.
//!
//! Resolution never fails. Scalars are coerced leniently (`"3306"` is a
//! port, `5` is a host name), and a value that cannot be coerced is kept on
//! the profile and reported by [`ConnectionProfile::validate`] when
//! connecting.
//!
//! Recognised keys:
//!
//! | key               | field              | default                               |
//! |-------------------|--------------------|---------------------------------------|
//! | `host`            | `host`             | `127.0.0.1`                           |
//! | `username`        | `username`         | `root`                                |
//! | `passwd`          | `password`         | empty                                 |
//! | `port`            | `port`             | `3306`                                |
//! | `database`        | `database`         | `test`                                |
//! | `db_settings`     | `session_settings` | `{"names": "utf8", "sql_mode": ""}`   |
//! | `connect_timeout` | `connect_timeout`  | 30 seconds                            |

use std::fmt;
use std::time::Duration;

use serde_json::{Map, Value as JsonValue, json};

use crate::driver::{ConnectOptions, redacted};
use crate::error::{Error, Result};

/// Produces a settings mapping for a named consumer.
///
/// This is the seam to whatever configuration loader the surrounding
/// application uses.
pub trait ConfigSource {
    /// Settings for `consumer`. An empty map means "use the defaults".
    fn settings_for(&self, consumer: &str) -> Result<Map<String, JsonValue>>;
}

/// A flat mapping is handed to every consumer unchanged.
impl ConfigSource for Map<String, JsonValue> {
    fn settings_for(&self, _consumer: &str) -> Result<Map<String, JsonValue>> {
        Ok(self.clone())
    }
}

/// A JSON document with one section per consumer.
///
/// ```text
/// { "db": { "host": "db1", "username": "app" }, "cache": { ... } }
/// ```
#[derive(Debug, Clone, Default)]
pub struct JsonConfig {
    document: Map<String, JsonValue>,
}

impl JsonConfig {
    /// Wrap a parsed document. The document must be a JSON object.
    pub fn new(document: JsonValue) -> Result<Self> {
        match document {
            JsonValue::Object(document) => Ok(Self { document }),
            other => Err(Error::Config(format!(
                "configuration document must be an object, got {other}"
            ))),
        }
    }

    /// Parse a document from JSON text.
    pub fn from_json_str(text: &str) -> Result<Self> {
        let document = serde_json::from_str(text)
            .map_err(|e| Error::Config(format!("invalid configuration JSON: {e}")))?;
        Self::new(document)
    }
}

impl ConfigSource for JsonConfig {
    fn settings_for(&self, consumer: &str) -> Result<Map<String, JsonValue>> {
        match self.document.get(consumer) {
            None | Some(JsonValue::Null) => Ok(Map::new()),
            Some(JsonValue::Object(section)) => Ok(section.clone()),
            Some(other) => Err(Error::Config(format!(
                "configuration section '{consumer}' must be an object, got {other}"
            ))),
        }
    }
}

/// Fully resolved connection parameters.
#[derive(Clone, PartialEq)]
pub struct ConnectionProfile {
    /// Server hostname or IP address.
    pub host: String,
    /// User name.
    pub username: String,
    /// Password; empty means none.
    pub password: String,
    /// Server port.
    pub port: u16,
    /// Database (schema) name.
    pub database: String,
    /// Session variables applied after connecting, as written in the
    /// configuration. Validated at connect time.
    pub session_settings: JsonValue,
    /// Upper bound on a single connection attempt.
    pub connect_timeout: Duration,
    rejected: Vec<RejectedSetting>,
}

/// A configured value that could not be coerced to its field's type.
#[derive(Clone, PartialEq)]
struct RejectedSetting {
    key: String,
    value: JsonValue,
}

impl RejectedSetting {
    fn describe(&self) -> String {
        let expected = match self.key.as_str() {
            "port" => "a port number",
            "connect_timeout" => "a number of seconds",
            _ => "a string",
        };
        // never echo a password, even a malformed one
        if self.key == "passwd" {
            format!("connection setting passwd is not usable; expected {expected}")
        } else {
            format!(
                "connection setting {} = {} is not usable; expected {expected}",
                self.key, self.value
            )
        }
    }
}

impl Default for ConnectionProfile {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            username: "root".to_string(),
            password: String::new(),
            port: 3306,
            database: "test".to_string(),
            session_settings: default_session_settings(),
            connect_timeout: Duration::from_secs(30),
            rejected: Vec::new(),
        }
    }
}

/// The session settings used when the configuration names none.
#[must_use]
pub fn default_session_settings() -> JsonValue {
    json!({
        "names": "utf8",
        "sql_mode": "",
    })
}

fn coerce_text(value: &JsonValue) -> Option<String> {
    match value {
        JsonValue::String(s) => Some(s.clone()),
        JsonValue::Number(n) => Some(n.to_string()),
        JsonValue::Bool(true) => Some("1".to_string()),
        JsonValue::Bool(false) => Some(String::new()),
        _ => None,
    }
}

fn coerce_port(value: &JsonValue) -> Option<u16> {
    match value {
        JsonValue::Number(n) => n.as_u64().and_then(|port| u16::try_from(port).ok()),
        JsonValue::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn coerce_seconds(value: &JsonValue) -> Option<Duration> {
    let secs: f64 = match value {
        JsonValue::Number(n) => n.as_f64()?,
        JsonValue::String(s) => s.trim().parse().ok()?,
        _ => return None,
    };
    Duration::try_from_secs_f64(secs).ok()
}

fn assign<T>(field: &mut T, value: Option<T>) -> bool {
    match value {
        Some(value) => {
            *field = value;
            true
        }
        None => false,
    }
}

impl ConnectionProfile {
    /// Create a profile with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge `settings` over the defaults, field by field.
    ///
    /// Present values win even when falsy (an empty password, an empty
    /// session-settings map). Nothing is validated here: `db_settings` is
    /// kept as written, and scalars that cannot be coerced are remembered
    /// for [`validate`](Self::validate).
    #[must_use]
    pub fn resolve(settings: &Map<String, JsonValue>) -> Self {
        let mut profile = Self::default();

        for (key, value) in settings {
            if value.is_null() {
                continue;
            }

            let accepted = match key.as_str() {
                "host" => assign(&mut profile.host, coerce_text(value)),
                "username" => assign(&mut profile.username, coerce_text(value)),
                "passwd" => assign(&mut profile.password, coerce_text(value)),
                "port" => assign(&mut profile.port, coerce_port(value)),
                "database" => assign(&mut profile.database, coerce_text(value)),
                "db_settings" => assign(&mut profile.session_settings, Some(value.clone())),
                "connect_timeout" => assign(&mut profile.connect_timeout, coerce_seconds(value)),
                _ => {
                    tracing::debug!(key = %key, "ignoring unknown connection setting");
                    true
                }
            };

            if !accepted {
                tracing::debug!(key = %key, "connection setting kept for validation at connect");
                profile.rejected.push(RejectedSetting {
                    key: key.clone(),
                    value: value.clone(),
                });
            }
        }

        profile
    }

    /// Resolve the settings `source` holds for `consumer`.
    ///
    /// Fails only when the source itself cannot produce settings.
    pub fn from_source(source: &dyn ConfigSource, consumer: &str) -> Result<Self> {
        let settings = source.settings_for(consumer)?;
        Ok(Self::resolve(&settings))
    }

    /// Check that the profile can be used to connect.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidSettings`] for a configured value that could not be
    /// coerced during resolution, or for a zero port.
    pub fn validate(&self) -> Result<()> {
        if let Some(rejected) = self.rejected.first() {
            return Err(Error::InvalidSettings(rejected.describe()));
        }
        if self.port == 0 {
            return Err(Error::InvalidSettings(
                "port must be greater than zero".into(),
            ));
        }
        Ok(())
    }

    fn accept(&mut self, key: &str) {
        self.rejected.retain(|rejected| rejected.key != key);
    }

    /// Set the server host.
    #[must_use]
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self.accept("host");
        self
    }

    /// Set the server port.
    #[must_use]
    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self.accept("port");
        self
    }

    /// Set the user name.
    #[must_use]
    pub fn username(mut self, username: impl Into<String>) -> Self {
        self.username = username.into();
        self.accept("username");
        self
    }

    /// Set the password.
    #[must_use]
    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = password.into();
        self.accept("passwd");
        self
    }

    /// Set the database name.
    #[must_use]
    pub fn database(mut self, database: impl Into<String>) -> Self {
        self.database = database.into();
        self.accept("database");
        self
    }

    /// Set the session settings.
    #[must_use]
    pub fn session_settings(mut self, settings: JsonValue) -> Self {
        self.session_settings = settings;
        self
    }

    /// Set the connect timeout.
    #[must_use]
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self.accept("connect_timeout");
        self
    }

    /// Name of the connection target for messages and logs.
    ///
    /// Shows whether a password is set, never the password:
    /// `mysql://app@db1:3306/app_db (with password)`.
    #[must_use]
    pub fn target(&self, scheme: &str) -> String {
        format!(
            "{scheme}://{}@{}:{}/{} ({} password)",
            self.username,
            self.host,
            self.port,
            self.database,
            if self.password.is_empty() {
                "without"
            } else {
                "with"
            }
        )
    }

    /// Parameters handed to the connector.
    #[must_use]
    pub fn connect_options(&self) -> ConnectOptions {
        ConnectOptions {
            host: self.host.clone(),
            port: self.port,
            username: self.username.clone(),
            password: self.password.clone(),
            database: self.database.clone(),
        }
    }
}

impl fmt::Debug for ConnectionProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionProfile")
            .field("host", &self.host)
            .field("username", &self.username)
            .field("password", &redacted(&self.password))
            .field("port", &self.port)
            .field("database", &self.database)
            .field("session_settings", &self.session_settings)
            .field("connect_timeout", &self.connect_timeout)
            .field(
                "rejected",
                &self.rejected.iter().map(|r| r.key.as_str()).collect::<Vec<_>>(),
            )
            .finish()
    }
}
