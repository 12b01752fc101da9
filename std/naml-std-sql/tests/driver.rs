///
/// # Integration Tests for naml-std-sql
///
/// End-to-end tests of the driver against database files: connection
/// lifecycle, cursor exhaustion, transactions, value round-trips, and
/// configuration loaded from disk.
///

use std::fs;
use std::path::Path;
use std::time::Duration;

use tempfile::TempDir;

use naml_std_sql::{
    open, open_with_config, Connection, Cursor, DriverConfig, Environment, Execution, FetchMode,
    Record, SqlError, SqlValue, Sqlite3Connection,
};

fn db_path(dir: &TempDir) -> String {
    dir.path().join("test.db").display().to_string()
}

fn connect(path: &str) -> Sqlite3Connection {
    let env = open("sqlite3").expect("Failed to open environment");
    env.connect(path, None).expect("Failed to connect")
}

fn select_all(conn: &Sqlite3Connection, sql: &str) -> Vec<Vec<SqlValue>> {
    let cursor = conn
        .execute(sql)
        .expect("Query failed")
        .into_cursor()
        .expect("Query should produce a cursor");
    let mut rows = Vec::new();
    while let Some(row) = cursor.fetch().expect("Fetch failed") {
        rows.push(row);
    }
    rows
}

#[test]
fn test_connect_yields_open_autocommit_connection() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let path = db_path(&temp_dir);

    let conn = connect(&path);
    assert!(!conn.is_closed());
    assert!(conn.autocommit().unwrap());
    assert!(Path::new(&path).exists(), "Database file should be created");
}

#[test]
fn test_connect_failure_is_recoverable() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let missing = temp_dir.path().join("no/such/dir/test.db");

    let env = open("sqlite3").unwrap();
    let err = env.connect(&missing.display().to_string(), None).unwrap_err();
    assert!(!err.is_fatal());
    assert!(err.to_string().contains("unable to open"));
}

#[test]
fn test_closed_environment_refuses_connect() {
    let env = open("sqlite3").unwrap();
    assert!(env.close());
    assert!(!env.close());
    let err = env.connect(":memory:", None).unwrap_err();
    assert!(matches!(err, SqlError::EnvironmentClosed));
}

#[test]
fn test_connection_outlives_environment_handle() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let conn = {
        let env = open("sqlite3").unwrap();
        env.connect(&db_path(&temp_dir), None).unwrap()
    };
    conn.execute("CREATE TABLE t (v INTEGER)").unwrap();
    assert!(conn.environment().is_some());
    assert!(conn.close().unwrap());
}

#[test]
fn test_cannot_close_with_open_cursors() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let conn = connect(&db_path(&temp_dir));
    conn.execute("CREATE TABLE t (v INTEGER)").unwrap();
    conn.execute("INSERT INTO t VALUES (1), (2)").unwrap();

    let first = conn.execute("SELECT v FROM t").unwrap().into_cursor().unwrap();
    let second = conn.execute("SELECT v FROM t").unwrap().into_cursor().unwrap();
    assert_eq!(conn.open_cursors(), 2);

    assert!(matches!(conn.close().unwrap_err(), SqlError::OpenCursors));
    first.close();
    assert!(conn.close().unwrap_err().is_fatal());

    // exhaustion closes a cursor just like close()
    while second.fetch().unwrap().is_some() {}
    assert_eq!(conn.open_cursors(), 0);
    assert!(conn.close().unwrap());
}

#[test]
fn test_execute_reports_affected_rows_and_columns() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let conn = connect(&db_path(&temp_dir));

    assert_eq!(
        conn.execute("CREATE TABLE items (id INTEGER PRIMARY KEY, name TEXT, qty INTEGER)")
            .unwrap()
            .row_count(),
        Some(0)
    );
    let inserted = conn
        .execute("INSERT INTO items (name, qty) VALUES ('bolt', 10), ('nut', 5), ('gear', 0)")
        .unwrap();
    assert_eq!(inserted.row_count(), Some(3));
    assert_eq!(conn.last_auto_id().unwrap(), 3);

    let deleted = conn.execute("DELETE FROM items WHERE qty < 6").unwrap();
    assert_eq!(deleted.row_count(), Some(2));

    match conn.execute("SELECT id, name, qty FROM items").unwrap() {
        Execution::Cursor(cursor) => assert_eq!(cursor.column_names().unwrap().len(), 3),
        Execution::RowCount(_) => panic!("Expected a cursor"),
    }
}

#[test]
fn test_fetch_after_exhaustion_is_misuse() {
    let conn = connect(":memory:");
    let cursor = conn.execute("SELECT 1 UNION ALL SELECT 2").unwrap().into_cursor().unwrap();
    assert!(cursor.fetch().unwrap().is_some());
    assert!(cursor.fetch().unwrap().is_some());
    assert!(cursor.fetch().unwrap().is_none());
    assert!(cursor.is_closed());

    let err = cursor.fetch().unwrap_err();
    assert!(err.is_fatal());
    assert!(matches!(err, SqlError::CursorClosed));
}

#[test]
fn test_value_round_trip() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let conn = connect(&db_path(&temp_dir));
    conn.execute("CREATE TABLE vals (i INTEGER, f REAL, t TEXT, b BLOB, n TEXT)").unwrap();
    let text = conn.escape("it's \"quoted\"");
    conn.execute(&format!(
        "INSERT INTO vals VALUES (-9007199254740993, 0.125, '{}', x'00FF10', NULL)",
        text
    ))
    .unwrap();

    let rows = select_all(&conn, "SELECT i, f, t, b, n FROM vals");
    assert_eq!(
        rows,
        vec![vec![
            SqlValue::Integer(-9007199254740993),
            SqlValue::Float(0.125),
            SqlValue::Text("it's \"quoted\"".to_string()),
            SqlValue::Blob(vec![0x00, 0xff, 0x10]),
            SqlValue::Null,
        ]]
    );
}

#[test]
fn test_fetch_into_record_both_modes() {
    let conn = connect(":memory:");
    let cursor = conn
        .execute("SELECT 7 AS id, 'x' AS tag")
        .unwrap()
        .into_cursor()
        .unwrap();

    let mut record = Record::new();
    assert!(cursor.fetch_into(&mut record, FetchMode::parse("na")).unwrap());
    assert_eq!(record.values(), &[SqlValue::Integer(7), SqlValue::Text("x".to_string())]);
    assert_eq!(record.field("tag"), Some(&SqlValue::Text("x".to_string())));
    assert_eq!(record.fields().keys().collect::<Vec<_>>(), vec!["id", "tag"]);
}

#[test]
fn test_manual_commit_and_autocommit_restore() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let path = db_path(&temp_dir);
    let conn = connect(&path);
    conn.execute("CREATE TABLE ledger (amount INTEGER)").unwrap();

    conn.set_autocommit(false).unwrap();
    conn.execute("INSERT INTO ledger VALUES (100)").unwrap();
    conn.rollback().unwrap();
    // rollback reopened a transaction
    conn.execute("INSERT INTO ledger VALUES (200)").unwrap();
    conn.commit().unwrap();

    let other = connect(&path);
    assert_eq!(select_all(&other, "SELECT amount FROM ledger"), vec![vec![SqlValue::Integer(200)]]);

    // enabling autocommit discards the pending write
    conn.execute("INSERT INTO ledger VALUES (300)").unwrap();
    conn.set_autocommit(true).unwrap();
    assert_eq!(select_all(&conn, "SELECT COUNT(*) FROM ledger"), vec![vec![SqlValue::Integer(1)]]);
}

#[test]
fn test_locked_database_is_recoverable() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let path = db_path(&temp_dir);
    let env = open("sqlite3").unwrap();

    let writer = env.connect(&path, None).unwrap();
    writer.execute("CREATE TABLE t (v INTEGER)").unwrap();
    writer.set_autocommit(false).unwrap();
    writer.execute("INSERT INTO t VALUES (1)").unwrap();

    let blocked = env.connect(&path, Some(Duration::from_millis(10))).unwrap();
    let err = blocked.execute("INSERT INTO t VALUES (2)").err().unwrap();
    assert!(!err.is_fatal());
    assert!(err.to_string().contains("locked"));

    writer.commit().unwrap();
}

#[test]
fn test_config_file_read_only() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let path = db_path(&temp_dir);
    connect(&path).execute("CREATE TABLE t (v INTEGER)").unwrap();

    let config_path = temp_dir.path().join("driver.toml");
    fs::write(&config_path, "read_only = true\nbusy_timeout_ms = 50\n").unwrap();
    let config = DriverConfig::load(&config_path).expect("Failed to load config");
    assert_eq!(config.busy_timeout(), Some(Duration::from_millis(50)));

    let env = open_with_config("sqlite3", config).unwrap();
    let conn = env.connect(&path, None).unwrap();
    let err = conn.execute("INSERT INTO t VALUES (1)").err().unwrap();
    assert!(!err.is_fatal());
    assert!(err.to_string().contains("readonly"));
    assert_eq!(select_all(&conn, "SELECT COUNT(*) FROM t"), vec![vec![SqlValue::Integer(0)]]);
}
