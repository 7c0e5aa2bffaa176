//! Connection lifecycle tests against the in-memory mock driver.
//!
//! These cover lazy and idempotent connect, session settings, error
//! redaction, teardown, and transaction bracketing.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use std::time::Duration;

use dbkit_client::{
    Column, ConnectionProfile, ConnectionState, Db, DriverError, Error, JsonConfig, QueryResult,
    Value,
};
use dbkit_testing::{MockConnector, init_tracing};
use serde_json::json;
use tokio_test::{assert_err, assert_ok};

fn app_profile() -> ConnectionProfile {
    ConnectionProfile::new()
        .host("db1")
        .username("app")
        .password("")
        .port(3306)
        .database("app_db")
        .session_settings(json!({"names": "utf8mb4"}))
}

// =============================================================================
// Connect
// =============================================================================

#[tokio::test]
async fn test_connect_applies_session_settings() {
    init_tracing();
    let mock = MockConnector::new();
    let mut db = Db::with_profile(mock.clone(), app_profile());

    assert_ok!(db.connect().await);

    assert_eq!(mock.opens(), 1);
    assert_eq!(mock.statements(), ["SET NAMES='utf8mb4'"]);
    assert_eq!(db.state(), ConnectionState::Open);
    assert!(db.is_connected());

    let options = mock.last_options().unwrap();
    assert_eq!(options.host, "db1");
    assert_eq!(options.port, 3306);
    assert_eq!(options.username, "app");
    assert_eq!(options.password, "");
    assert_eq!(options.database, "app_db");
}

#[tokio::test]
async fn test_connect_is_idempotent() {
    init_tracing();
    let mock = MockConnector::new();
    let mut db = Db::with_profile(mock.clone(), app_profile());

    db.connect().await.unwrap();
    db.connect().await.unwrap();

    assert_eq!(mock.attempts(), 1);
    assert_eq!(mock.opens(), 1);
    assert_eq!(mock.statements().len(), 1);
}

#[tokio::test]
async fn test_default_profile_session_settings() {
    init_tracing();
    let mock = MockConnector::new();
    let mut db = Db::new(mock.clone());

    db.connect().await.unwrap();

    assert_eq!(mock.statements(), ["SET NAMES='utf8'", "SET SQL_MODE=''"]);
    let options = mock.last_options().unwrap();
    assert_eq!(options.host, "127.0.0.1");
    assert_eq!(options.username, "root");
    assert_eq!(options.port, 3306);
}

#[tokio::test]
async fn test_profile_from_config_source() {
    init_tracing();
    let config = JsonConfig::new(json!({
        "db": {
            "host": "db2",
            "passwd": "",
            "db_settings": {"sql_mode": "STRICT_TRANS_TABLES", "wait_timeout": 600},
        }
    }))
    .unwrap();
    let mock = MockConnector::new();
    let mut db = Db::from_source(mock.clone(), &config).unwrap();

    assert_eq!(db.profile().host, "db2");
    assert_eq!(db.profile().username, "root");
    assert_eq!(mock.attempts(), 0, "construction must not connect");

    db.connect().await.unwrap();
    assert_eq!(
        mock.statements(),
        ["SET SQL_MODE='STRICT_TRANS_TABLES'", "SET WAIT_TIMEOUT=600"]
    );
}

#[tokio::test]
async fn test_string_port_from_config_connects() {
    init_tracing();
    let config = JsonConfig::new(json!({
        "db": {"host": "db1", "port": "3307", "connect_timeout": "5"}
    }))
    .unwrap();
    let mock = MockConnector::new();
    let mut db = Db::from_source(mock.clone(), &config).unwrap();

    assert_eq!(db.profile().port, 3307);
    assert_eq!(db.profile().connect_timeout, Duration::from_secs(5));

    db.connect().await.unwrap();
    assert_eq!(mock.last_options().unwrap().port, 3307);
    assert_eq!(db.state(), ConnectionState::Open);
}

#[tokio::test]
async fn test_unusable_config_value_fails_at_connect() {
    init_tracing();
    let config = JsonConfig::new(json!({"db": {"port": "abc"}})).unwrap();
    let mock = MockConnector::new();

    // resolution accepts anything; the value is checked when connecting
    let mut db = Db::from_source(mock.clone(), &config).unwrap();
    let err = assert_err!(db.connect().await);

    match err {
        Error::InvalidSettings(message) => assert!(message.contains("port"), "{message}"),
        other => panic!("expected InvalidSettings, got {other:?}"),
    }
    assert_eq!(mock.attempts(), 0);
    assert_eq!(db.state(), ConnectionState::Closed);
}

// =============================================================================
// Session settings validation
// =============================================================================

#[tokio::test]
async fn test_settings_not_a_mapping() {
    init_tracing();
    let mock = MockConnector::new();
    let profile = app_profile().session_settings(json!("not-a-map"));
    let mut db = Db::with_profile(mock.clone(), profile);

    let err = assert_err!(db.connect().await);

    assert!(matches!(err, Error::InvalidSettings(_)), "{err}");
    assert!(mock.statements().is_empty(), "no SET may be issued");
    assert_eq!(mock.opens(), 1);
    assert_eq!(mock.closes(), 1);
    assert_eq!(mock.live_connections(), 0);
    assert_eq!(db.state(), ConnectionState::Closed);
    assert!(!db.is_connected());
}

#[tokio::test]
async fn test_non_scalar_setting_value() {
    init_tracing();
    let mock = MockConnector::new();
    let profile = app_profile().session_settings(json!({
        "names": "utf8mb4",
        "sql_mode": ["STRICT_TRANS_TABLES"],
    }));
    let mut db = Db::with_profile(mock.clone(), profile);

    let err = assert_err!(db.connect().await);

    match err {
        Error::InvalidSettings(message) => {
            assert!(message.contains("SQL_MODE"), "{message}");
            assert!(message.contains("not scalar"), "{message}");
        }
        other => panic!("expected InvalidSettings, got {other:?}"),
    }
    // The plan is validated as a whole, so the valid entry was not sent
    assert!(mock.statements().is_empty());
    assert_eq!(mock.live_connections(), 0);
    assert_eq!(db.state(), ConnectionState::Closed);
}

#[tokio::test]
async fn test_null_setting_value_rejected() {
    init_tracing();
    let mock = MockConnector::new();
    let profile = app_profile().session_settings(json!({"time_zone": null}));
    let mut db = Db::with_profile(mock.clone(), profile);

    assert!(matches!(
        db.connect().await,
        Err(Error::InvalidSettings(_))
    ));
    assert_eq!(mock.live_connections(), 0);
}

#[tokio::test]
async fn test_keys_are_upper_cased() {
    init_tracing();
    let mock = MockConnector::new();
    let profile = app_profile().session_settings(json!({"sql_mode": ""}));
    let mut db = Db::with_profile(mock.clone(), profile);

    db.connect().await.unwrap();

    assert_eq!(mock.statements(), ["SET SQL_MODE=''"]);
}

#[tokio::test]
async fn test_unsigned_setting_rendered_exactly() {
    init_tracing();
    let mock = MockConnector::new();
    let profile = app_profile().session_settings(json!({
        "max_join_size": 18_446_744_073_709_551_615_u64,
    }));
    let mut db = Db::with_profile(mock.clone(), profile);

    db.connect().await.unwrap();

    assert_eq!(mock.statements(), ["SET MAX_JOIN_SIZE=18446744073709551615"]);
}

#[tokio::test]
async fn test_scoped_setting_name() {
    init_tracing();
    let mock = MockConnector::new();
    let profile = app_profile().session_settings(json!({"@@session.time_zone": "+00:00"}));
    let mut db = Db::with_profile(mock.clone(), profile);

    db.connect().await.unwrap();

    assert_eq!(mock.statements(), ["SET @@SESSION.TIME_ZONE='+00:00'"]);
}

#[tokio::test]
async fn test_failed_set_closes_connection() {
    init_tracing();
    let mock = MockConnector::new().fail_statement(
        "SET SQL_MODE",
        DriverError::new(1231, "Variable 'sql_mode' can't be set to the value of 'BOGUS'"),
    );
    let profile = app_profile().session_settings(json!({
        "names": "utf8mb4",
        "sql_mode": "BOGUS",
    }));
    let mut db = Db::with_profile(mock.clone(), profile);

    let err = assert_err!(db.connect().await);

    match &err {
        Error::SessionSetup { key, source } => {
            assert_eq!(key, "SQL_MODE");
            assert_eq!(source.code, 1231);
        }
        other => panic!("expected SessionSetup, got {other:?}"),
    }
    assert_eq!(err.code(), Some(1231));
    assert_eq!(
        mock.statements(),
        ["SET NAMES='utf8mb4'", "SET SQL_MODE='BOGUS'"]
    );
    assert_eq!(mock.live_connections(), 0);
    assert_eq!(db.state(), ConnectionState::Closed);
}

#[tokio::test]
async fn test_zero_port_rejected_before_connecting() {
    init_tracing();
    let mock = MockConnector::new();
    let mut db = Db::with_profile(mock.clone(), app_profile().port(0));

    assert!(matches!(
        db.connect().await,
        Err(Error::InvalidSettings(_))
    ));
    assert_eq!(mock.attempts(), 0);
}

// =============================================================================
// Connection errors
// =============================================================================

#[tokio::test]
async fn test_connection_refused_without_password() {
    init_tracing();
    let mock = MockConnector::new().connection_refused();
    let mut db = Db::with_profile(mock.clone(), app_profile());

    let err = assert_err!(db.connect().await);

    assert!(matches!(err, Error::Connection { .. }), "{err:?}");
    assert_eq!(err.code(), Some(2002));
    let message = err.to_string();
    assert!(message.contains("without password"), "{message}");
    assert!(
        message.contains("mysql://app@db1:3306/app_db"),
        "{message}"
    );
    assert!(message.contains("Connection refused"), "{message}");
    assert_eq!(db.state(), ConnectionState::Closed);
}

#[tokio::test]
async fn test_connection_error_never_shows_password() {
    init_tracing();
    let mock = MockConnector::new().refuse_connections(DriverError::new(
        1045,
        "Access denied for user 'app'@'10.0.0.7' (using password: YES)",
    ));
    let mut db = Db::with_profile(mock, app_profile().password("hunter2"));

    let err = assert_err!(db.connect().await);

    let message = err.to_string();
    assert!(message.contains("(with password)"), "{message}");
    assert!(!message.contains("hunter2"), "{message}");
    assert!(!format!("{err:?}").contains("hunter2"));
    assert_eq!(err.code(), Some(1045));
}

#[tokio::test]
async fn test_connect_timeout() {
    init_tracing();
    let mock = MockConnector::new().with_connect_delay(Duration::from_millis(500));
    let profile = app_profile().connect_timeout(Duration::from_millis(20));
    let mut db = Db::with_profile(mock.clone(), profile);

    let err = assert_err!(db.connect().await);

    match &err {
        Error::ConnectTimeout { target, timeout } => {
            assert_eq!(*timeout, Duration::from_millis(20));
            assert!(target.contains("db1"));
        }
        other => panic!("expected ConnectTimeout, got {other:?}"),
    }
    assert!(err.is_transient());
    assert_eq!(mock.opens(), 0);
    assert!(!db.is_connected());
}

#[tokio::test]
async fn test_failed_connect_can_be_retried() {
    init_tracing();
    let mock = MockConnector::new().connection_refused();
    let mut db = Db::with_profile(mock.clone(), app_profile());

    assert!(db.connect().await.is_err());
    mock.set_refuse(None);
    db.connect().await.unwrap();

    assert_eq!(mock.attempts(), 2);
    assert_eq!(mock.opens(), 1);
    assert_eq!(db.state(), ConnectionState::Open);
}

#[tokio::test]
async fn test_cancelled_connect_leaves_facade_closed() {
    init_tracing();
    let mock = MockConnector::new().with_statement_delay(Duration::from_millis(200));
    let mut db = Db::with_profile(mock.clone(), app_profile());

    // cancel while SET NAMES is still in flight
    let cancelled = tokio::time::timeout(Duration::from_millis(20), db.connect()).await;
    assert!(cancelled.is_err());

    assert_eq!(mock.opens(), 1);
    assert_eq!(mock.closes(), 0);
    assert_eq!(db.state(), ConnectionState::Closed);
    assert!(!db.is_connected());

    // the next call starts over with a fresh connection
    db.connect().await.unwrap();
    assert_eq!(mock.opens(), 2);
    assert_eq!(db.state(), ConnectionState::Open);
}

// =============================================================================
// Disconnect / reconnect
// =============================================================================

#[tokio::test]
async fn test_disconnect_closes_handle() {
    init_tracing();
    let mock = MockConnector::new();
    let mut db = Db::with_profile(mock.clone(), app_profile());

    db.connect().await.unwrap();
    db.disconnect().await.unwrap();

    assert_eq!(mock.closes(), 1);
    assert_eq!(mock.live_connections(), 0);
    assert_eq!(db.state(), ConnectionState::Closed);
}

#[tokio::test]
async fn test_disconnect_when_closed_is_noop() {
    init_tracing();
    let mock = MockConnector::new();
    let mut db = Db::with_profile(mock.clone(), app_profile());

    assert_ok!(db.disconnect().await);
    assert_ok!(db.disconnect().await);

    assert_eq!(mock.closes(), 0);
}

#[tokio::test]
async fn test_disconnect_close_error_still_closes() {
    init_tracing();
    let mock = MockConnector::new().fail_close(DriverError::new(2013, "Lost connection"));
    let mut db = Db::with_profile(mock.clone(), app_profile());

    db.connect().await.unwrap();
    let err = assert_err!(db.disconnect().await);

    assert!(matches!(err, Error::Driver(_)));
    assert_eq!(db.state(), ConnectionState::Closed);
    assert!(!db.is_connected());
}

#[tokio::test]
async fn test_reconnect_opens_fresh_handle() {
    init_tracing();
    let mock = MockConnector::new();
    let mut db = Db::with_profile(mock.clone(), app_profile());

    db.connect().await.unwrap();
    db.reconnect().await.unwrap();

    assert_eq!(mock.opens(), 2);
    assert_eq!(mock.closes(), 1);
    assert_eq!(mock.live_connections(), 1);
    assert_eq!(
        mock.statements(),
        ["SET NAMES='utf8mb4'", "SET NAMES='utf8mb4'"]
    );
}

#[tokio::test]
async fn test_reconnect_from_closed_connects() {
    init_tracing();
    let mock = MockConnector::new();
    let mut db = Db::with_profile(mock.clone(), app_profile());

    db.reconnect().await.unwrap();

    assert_eq!(mock.opens(), 1);
    assert_eq!(mock.closes(), 0);
    assert!(db.is_connected());
}

#[tokio::test]
async fn test_reconnect_ignores_close_error() {
    init_tracing();
    let mock = MockConnector::new().fail_close(DriverError::new(2013, "Lost connection"));
    let mut db = Db::with_profile(mock.clone(), app_profile());

    db.connect().await.unwrap();
    assert_ok!(db.reconnect().await);

    assert_eq!(mock.opens(), 2);
    assert_eq!(db.state(), ConnectionState::Open);
}

// =============================================================================
// Data access
// =============================================================================

#[tokio::test]
async fn test_query_connects_lazily() {
    init_tracing();
    let result = QueryResult::with_rows(
        vec![Column::new("id", 0, "BIGINT"), Column::new("name", 1, "VARCHAR")],
        vec![vec![Value::Int(7), Value::from("alice")]],
    );
    let mock = MockConnector::new().with_result("SELECT id, name FROM users", result);
    let mut db = Db::with_profile(mock.clone(), app_profile());

    let result = db.query("SELECT id, name FROM users").await.unwrap();

    assert_eq!(mock.opens(), 1);
    assert_eq!(
        mock.statements(),
        ["SET NAMES='utf8mb4'", "SELECT id, name FROM users"]
    );
    assert_eq!(result.rows.len(), 1);
    assert_eq!(result.rows[0].get::<i64>(0).unwrap(), 7);
    assert_eq!(result.rows[0].get_by_name::<String>("name").unwrap(), "alice");
}

#[tokio::test]
async fn test_execute_returns_rows_affected() {
    init_tracing();
    let mock = MockConnector::new()
        .with_result("DELETE FROM sessions", QueryResult::affected(4));
    let mut db = Db::with_profile(mock, app_profile());

    assert_eq!(db.execute("DELETE FROM sessions").await.unwrap(), 4);
}

#[tokio::test]
async fn test_query_error_keeps_connection() {
    init_tracing();
    let mock = MockConnector::new().fail_statement(
        "SELECT * FROM missing",
        DriverError::new(1146, "Table 'app_db.missing' doesn't exist"),
    );
    let mut db = Db::with_profile(mock.clone(), app_profile());

    let err = assert_err!(db.query("SELECT * FROM missing").await);

    assert!(matches!(err, Error::Query(_)));
    assert_eq!(err.code(), Some(1146));
    assert_eq!(db.state(), ConnectionState::Open);
    assert_eq!(mock.live_connections(), 1);
}

#[tokio::test]
async fn test_query_propagates_connect_failure() {
    init_tracing();
    let mock = MockConnector::new().connection_refused();
    let mut db = Db::with_profile(mock.clone(), app_profile());

    let err = assert_err!(db.query("SELECT 1").await);

    assert!(matches!(err, Error::Connection { .. }));
    assert!(mock.statements().is_empty());
}

// =============================================================================
// Transactions
// =============================================================================

#[tokio::test]
async fn test_transaction_commit() {
    init_tracing();
    let mock = MockConnector::new();
    let mut db = Db::with_profile(mock.clone(), app_profile());

    db.begin().await.unwrap();
    assert_eq!(db.state(), ConnectionState::InTransaction);
    db.execute("UPDATE accounts SET balance = 0").await.unwrap();
    db.commit().await.unwrap();

    assert_eq!(db.state(), ConnectionState::Open);
    assert_eq!(
        mock.statements(),
        [
            "SET NAMES='utf8mb4'",
            "START TRANSACTION",
            "UPDATE accounts SET balance = 0",
            "COMMIT"
        ]
    );
}

#[tokio::test]
async fn test_transaction_rollback() {
    init_tracing();
    let mock = MockConnector::new();
    let mut db = Db::with_profile(mock.clone(), app_profile());

    db.begin().await.unwrap();
    db.rollback().await.unwrap();

    assert_eq!(db.state(), ConnectionState::Open);
    assert_eq!(mock.statements().last().map(String::as_str), Some("ROLLBACK"));
}

#[tokio::test]
async fn test_transaction_misuse() {
    init_tracing();
    let mock = MockConnector::new();
    let mut db = Db::with_profile(mock.clone(), app_profile());

    assert!(matches!(db.commit().await, Err(Error::Transaction(_))));
    assert!(matches!(db.rollback().await, Err(Error::Transaction(_))));
    assert_eq!(mock.attempts(), 0);

    db.begin().await.unwrap();
    assert!(matches!(db.begin().await, Err(Error::Transaction(_))));
}

#[tokio::test]
async fn test_failed_commit_keeps_transaction_open() {
    init_tracing();
    let mock = MockConnector::new()
        .fail_statement("COMMIT", DriverError::new(1213, "Deadlock found"));
    let mut db = Db::with_profile(mock.clone(), app_profile());

    db.begin().await.unwrap();
    assert!(db.commit().await.is_err());
    assert_eq!(db.state(), ConnectionState::InTransaction);

    db.rollback().await.unwrap();
    assert_eq!(db.state(), ConnectionState::Open);
}

#[tokio::test]
async fn test_disconnect_inside_transaction() {
    init_tracing();
    let mock = MockConnector::new();
    let mut db = Db::with_profile(mock.clone(), app_profile());

    db.begin().await.unwrap();
    db.disconnect().await.unwrap();

    assert_eq!(db.state(), ConnectionState::Closed);
    assert_eq!(mock.live_connections(), 0);
}

// =============================================================================
// Isolation and sharing
// =============================================================================

#[tokio::test]
async fn test_instances_are_isolated() {
    init_tracing();
    let first = MockConnector::new();
    let second = MockConnector::new();
    let mut a = Db::with_profile(first.clone(), app_profile());
    let mut b = Db::with_profile(second.clone(), app_profile().host("db2"));

    a.connect().await.unwrap();
    assert!(!b.is_connected());
    b.connect().await.unwrap();
    a.disconnect().await.unwrap();

    assert!(b.is_connected());
    assert_eq!(first.live_connections(), 0);
    assert_eq!(second.live_connections(), 1);
}

#[tokio::test]
async fn test_shared_db_opens_once() {
    init_tracing();
    let mock = MockConnector::new().with_connect_delay(Duration::from_millis(10));
    let db = Db::with_profile(mock.clone(), app_profile()).into_shared();

    let mut tasks = Vec::new();
    for i in 0..8 {
        let db = db.clone();
        tasks.push(tokio::spawn(async move {
            let mut db = db.lock().await;
            db.execute(&format!("INSERT INTO log VALUES ({i})")).await
        }));
    }
    for task in tasks {
        task.await.unwrap().unwrap();
    }

    assert_eq!(mock.opens(), 1);
    // one SET plus eight inserts
    assert_eq!(mock.statements().len(), 9);
}
