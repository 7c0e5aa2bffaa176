//! Tracing instrumentation for database operations.
//!
//! Spans follow the OpenTelemetry database semantic conventions so a
//! `tracing-opentelemetry` layer can export them unchanged:
//!
//! - `db.system`: driver scheme (e.g. "mysql")
//! - `db.name`: database name
//! - `db.operation`: statement kind (SELECT, SET, ...)
//! - `server.address` / `server.port`
//!
//! Statements are logged through [`SanitizationConfig`]. By default quoted
//! strings and numbers are masked, since session settings and ad-hoc
//! queries can carry secrets.

use tracing::Span;

use crate::config::ConnectionProfile;

/// Span name for connection establishment.
pub const CONNECT_SPAN: &str = "dbkit.connect";
/// Span name for statement execution.
pub const QUERY_SPAN: &str = "dbkit.query";

/// How statement text is rendered in logs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SanitizationConfig {
    /// Replace quoted strings and numbers with [`placeholder`](Self::placeholder).
    pub mask_literals: bool,
    /// Logged text is cut to this many bytes, ending in `...`.
    pub max_length: usize,
    /// Stand-in for each masked literal.
    pub placeholder: String,
}

impl Default for SanitizationConfig {
    fn default() -> Self {
        Self {
            mask_literals: true,
            max_length: 2048,
            placeholder: "?".to_string(),
        }
    }
}

impl SanitizationConfig {
    /// Log statements exactly as sent, session-setting values included.
    #[must_use]
    pub fn verbatim() -> Self {
        Self {
            mask_literals: false,
            max_length: usize::MAX,
            ..Self::default()
        }
    }

    /// Cut logged statements to `max_length` bytes.
    #[must_use]
    pub fn with_max_length(mut self, max_length: usize) -> Self {
        self.max_length = max_length;
        self
    }

    /// Render `sql` for a log line.
    #[must_use]
    pub fn sanitize(&self, sql: &str) -> String {
        if self.mask_literals {
            shorten(&mask_sql_literals(sql, &self.placeholder), self.max_length)
        } else {
            shorten(sql, self.max_length)
        }
    }
}

#[derive(Clone, Copy)]
enum Scan {
    Code,
    Quoted(char),
}

/// Replace quoted strings and bare numbers with `placeholder`.
///
/// Quotes may be escaped MySQL-style with a backslash or by doubling.
fn mask_sql_literals(sql: &str, placeholder: &str) -> String {
    let mut out = String::with_capacity(sql.len());
    let mut chars = sql.chars().peekable();
    let mut scan = Scan::Code;

    while let Some(c) = chars.next() {
        match scan {
            Scan::Quoted(quote) => {
                if c == '\\' {
                    chars.next();
                } else if c == quote && chars.next_if_eq(&quote).is_none() {
                    out.push_str(placeholder);
                    scan = Scan::Code;
                }
            }
            Scan::Code if c == '\'' || c == '"' => scan = Scan::Quoted(c),
            Scan::Code if c.is_ascii_digit() && !ends_identifier(&out) => {
                while chars
                    .next_if(|d| d.is_ascii_digit() || *d == '.')
                    .is_some()
                {}
                out.push_str(placeholder);
            }
            Scan::Code => out.push(c),
        }
    }

    // unterminated literal
    if let Scan::Quoted(_) = scan {
        out.push_str(placeholder);
    }

    out
}

/// Whether the next digit would continue an identifier such as `col1`.
fn ends_identifier(text: &str) -> bool {
    text.chars()
        .next_back()
        .is_some_and(|c| c.is_alphanumeric() || c == '_')
}

/// Cut `s` to at most `max_len` bytes (marker included), on a char boundary.
fn shorten(s: &str, max_len: usize) -> String {
    if s.len() <= max_len {
        return s.to_string();
    }

    let cut = (0..=max_len.saturating_sub(3))
        .rev()
        .find(|&i| s.is_char_boundary(i))
        .unwrap_or(0);
    format!("{}...", &s[..cut])
}

/// Extract the operation type from a SQL statement.
#[must_use]
pub fn extract_operation(sql: &str) -> &'static str {
    const OPERATIONS: &[(&str, &str)] = &[
        ("SELECT", "SELECT"),
        ("INSERT", "INSERT"),
        ("UPDATE", "UPDATE"),
        ("DELETE", "DELETE"),
        ("REPLACE", "REPLACE"),
        ("START TRANSACTION", "BEGIN"),
        ("BEGIN", "BEGIN"),
        ("COMMIT", "COMMIT"),
        ("ROLLBACK", "ROLLBACK"),
        ("SET", "SET"),
        ("SHOW", "SHOW"),
        ("CREATE", "CREATE"),
        ("ALTER", "ALTER"),
        ("DROP", "DROP"),
        ("CALL", "CALL"),
    ];

    let sql_upper = sql.trim_start().to_uppercase();
    OPERATIONS
        .iter()
        .find(|(prefix, _)| sql_upper.starts_with(*prefix))
        .map_or("OTHER", |(_, op)| *op)
}

/// Span covering one connection attempt.
pub(crate) fn connect_span(scheme: &str, profile: &ConnectionProfile) -> Span {
    tracing::info_span!(
        CONNECT_SPAN,
        db.system = %scheme,
        db.name = %profile.database,
        server.address = %profile.host,
        server.port = profile.port,
    )
}

/// Span covering one statement.
pub(crate) fn query_span(scheme: &str, statement: &str) -> Span {
    tracing::debug_span!(
        QUERY_SPAN,
        db.system = %scheme,
        db.operation = extract_operation(statement),
    )
}
