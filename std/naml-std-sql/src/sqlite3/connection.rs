use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use rusqlite::ffi;
use tracing::{debug, warn};

use crate::driver::{Connection, Execution};
use crate::error::{Result, SqlError};
use crate::sqlite3::statement::RawStatement;
use crate::sqlite3::{escape, Sqlite3Cursor, Sqlite3Environment};

struct ConnState {
    /// `None` once closed.
    db: RefCell<Option<rusqlite::Connection>>,
    /// Keeps the environment alive until close.
    env: RefCell<Option<Sqlite3Environment>>,
    auto_commit: Cell<bool>,
    cursors: Cell<usize>,
}

/// SQLite3 connection. Cloning shares the same database handle.
#[derive(Clone)]
pub struct Sqlite3Connection {
    state: Rc<ConnState>,
}

impl Sqlite3Connection {
    pub(crate) fn new(env: Sqlite3Environment, db: rusqlite::Connection) -> Self {
        Self {
            state: Rc::new(ConnState {
                db: RefCell::new(Some(db)),
                env: RefCell::new(Some(env)),
                auto_commit: Cell::new(true),
                cursors: Cell::new(0),
            }),
        }
    }

    fn with_db<T>(&self, f: impl FnOnce(&rusqlite::Connection) -> Result<T>) -> Result<T> {
        let db = self.state.db.borrow();
        let db = db.as_ref().ok_or(SqlError::ConnectionClosed)?;
        f(db)
    }

    /// Runs `COMMIT` or `ROLLBACK`, reopening a transaction in manual mode.
    fn end_transaction(&self, verb: &str) -> Result<()> {
        let sql = if self.state.auto_commit.get() {
            verb.to_string()
        } else {
            format!("{};BEGIN", verb)
        };
        self.with_db(|db| Ok(db.execute_batch(&sql)?))
    }

    pub(crate) fn cursor_opened(&self) {
        self.state.cursors.set(self.state.cursors.get() + 1);
    }

    pub(crate) fn cursor_closed(&self) {
        self.state.cursors.set(self.state.cursors.get().saturating_sub(1));
    }

    /// The environment this connection came from, until it is closed.
    pub fn environment(&self) -> Option<Sqlite3Environment> {
        self.state.env.borrow().clone()
    }
}

impl fmt::Debug for Sqlite3Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sqlite3Connection")
            .field("closed", &self.is_closed())
            .field("auto_commit", &self.state.auto_commit.get())
            .field("cursors", &self.state.cursors.get())
            .finish()
    }
}

impl Connection for Sqlite3Connection {
    type Cursor = Sqlite3Cursor;

    fn execute(&self, sql: &str) -> Result<Execution<Sqlite3Cursor>> {
        self.with_db(|db| {
            let handle = unsafe { db.handle() };
            let Some(mut stmt) = RawStatement::prepare(handle, sql)? else {
                return Err(SqlError::Sqlite {
                    message: "statement contains no SQL".to_string(),
                    code: ffi::SQLITE_MISUSE as i64,
                });
            };

            // One step tells queries apart from other statements.
            let rc = stmt.step();
            let columns = stmt.column_count();

            if rc == ffi::SQLITE_ROW || (rc == ffi::SQLITE_DONE && columns > 0) {
                stmt.reset();
                debug!(columns, "sqlite3 cursor opened");
                return Ok(Execution::Cursor(Sqlite3Cursor::new(self.clone(), stmt)));
            }

            if rc == ffi::SQLITE_DONE {
                drop(stmt);
                let changes = db.changes() as i64;
                debug!(changes, "sqlite3 statement executed");
                return Ok(Execution::RowCount(changes));
            }

            let err = stmt.error(rc);
            drop(stmt);
            Err(err)
        })
    }

    fn commit(&self) -> Result<()> {
        self.end_transaction("COMMIT")
    }

    fn rollback(&self) -> Result<()> {
        self.end_transaction("ROLLBACK")
    }

    fn set_autocommit(&self, enabled: bool) -> Result<()> {
        self.with_db(|db| {
            self.state.auto_commit.set(enabled);
            if enabled {
                if let Err(e) = db.execute_batch("ROLLBACK") {
                    debug!(error = %e, "rollback on enabling autocommit ignored");
                }
                Ok(())
            } else {
                db.execute_batch("BEGIN")
                    .map_err(|e| SqlError::BeginTransaction(e.to_string()))
            }
        })
    }

    fn autocommit(&self) -> Result<bool> {
        self.with_db(|_| Ok(self.state.auto_commit.get()))
    }

    fn escape(&self, value: &str) -> String {
        escape(value)
    }

    fn last_auto_id(&self) -> Result<i64> {
        self.with_db(|db| Ok(db.last_insert_rowid()))
    }

    fn open_cursors(&self) -> usize {
        self.state.cursors.get()
    }

    fn close(&self) -> Result<bool> {
        if self.is_closed() {
            return Ok(false);
        }
        if self.state.cursors.get() > 0 {
            return Err(SqlError::OpenCursors);
        }

        let db = self.state.db.borrow_mut().take();
        if let Some(db) = db {
            if let Err((_, e)) = db.close() {
                warn!(error = %e, "sqlite3 close reported an error");
            }
        }
        self.state.env.borrow_mut().take();
        debug!("sqlite3 connection closed");
        Ok(true)
    }

    fn is_closed(&self) -> bool {
        self.state.db.borrow().is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::{Cursor, Environment};
    use crate::value::SqlValue;

    fn connect() -> Sqlite3Connection {
        Sqlite3Environment::new().connect(":memory:", None).unwrap()
    }

    fn count(conn: &Sqlite3Connection, table: &str) -> i64 {
        let cursor = conn
            .execute(&format!("SELECT COUNT(*) FROM {}", table))
            .unwrap()
            .into_cursor()
            .unwrap();
        let row = cursor.fetch().unwrap().unwrap();
        cursor.close();
        row[0].as_i64().unwrap()
    }

    #[test]
    fn test_execute_returns_affected_rows() {
        let conn = connect();
        conn.execute("CREATE TABLE t (id INTEGER PRIMARY KEY, v TEXT)").unwrap();
        let inserted = conn
            .execute("INSERT INTO t (v) VALUES ('a'), ('b'), ('c')")
            .unwrap();
        assert_eq!(inserted.row_count(), Some(3));
        let updated = conn.execute("UPDATE t SET v = 'z' WHERE id > 1").unwrap();
        assert_eq!(updated.row_count(), Some(2));
        assert_eq!(conn.last_auto_id().unwrap(), 3);
    }

    #[test]
    fn test_execute_empty_query_still_yields_cursor() {
        let conn = connect();
        conn.execute("CREATE TABLE t (id INTEGER)").unwrap();
        let cursor = conn.execute("SELECT id FROM t").unwrap().into_cursor().unwrap();
        assert_eq!(conn.open_cursors(), 1);
        assert_eq!(cursor.column_names().unwrap().len(), 1);
        assert!(cursor.fetch().unwrap().is_none());
        assert_eq!(conn.open_cursors(), 0);
    }

    #[test]
    fn test_execute_errors_are_recoverable() {
        let conn = connect();
        let err = conn.execute("SELEC nonsense").err().unwrap();
        assert!(!err.is_fatal());
        assert!(err.to_string().contains("syntax error"));

        conn.execute("CREATE TABLE t (id INTEGER UNIQUE)").unwrap();
        conn.execute("INSERT INTO t VALUES (1)").unwrap();
        let err = conn.execute("INSERT INTO t VALUES (1)").err().unwrap();
        assert!(!err.is_fatal());
        assert!(err.to_string().contains("UNIQUE"));

        let err = conn.execute("   ").err().unwrap();
        assert!(!err.is_fatal());
    }

    #[test]
    fn test_debug_reports_state() {
        let conn = connect();
        let cursor = conn.execute("SELECT 1 AS one").unwrap().into_cursor().unwrap();
        assert_eq!(
            format!("{:?}", conn),
            "Sqlite3Connection { closed: false, auto_commit: true, cursors: 1 }"
        );
        assert_eq!(format!("{:?}", cursor), r#"Sqlite3Cursor { closed: false, columns: ["one"] }"#);

        cursor.close();
        conn.close().unwrap();
        assert!(format!("{:?}", conn).contains("closed: true"));
    }

    #[test]
    fn test_close_with_open_cursor_fails() {
        let conn = connect();
        let cursor = conn.execute("SELECT 1").unwrap().into_cursor().unwrap();
        let err = conn.close().unwrap_err();
        assert!(matches!(err, SqlError::OpenCursors));
        assert!(!conn.is_closed());

        assert!(cursor.close());
        assert!(conn.close().unwrap());
        assert!(!conn.close().unwrap());
        assert!(conn.environment().is_none());
    }

    #[test]
    fn test_operations_on_closed_connection_are_misuse() {
        let conn = connect();
        conn.close().unwrap();
        assert!(matches!(conn.execute("SELECT 1").err().unwrap(), SqlError::ConnectionClosed));
        assert!(conn.commit().unwrap_err().is_fatal());
        assert!(conn.last_auto_id().unwrap_err().is_fatal());
        assert!(conn.set_autocommit(false).unwrap_err().is_fatal());
        assert_eq!(conn.escape("o'k"), "o''k");
    }

    #[test]
    fn test_manual_commit_mode() {
        let conn = connect();
        conn.execute("CREATE TABLE t (v INTEGER)").unwrap();
        conn.set_autocommit(false).unwrap();
        assert!(!conn.autocommit().unwrap());

        conn.execute("INSERT INTO t VALUES (1)").unwrap();
        conn.rollback().unwrap();
        assert_eq!(count(&conn, "t"), 0);

        // rollback reopened a transaction, so this write is still pending
        conn.execute("INSERT INTO t VALUES (2)").unwrap();
        conn.commit().unwrap();
        conn.execute("INSERT INTO t VALUES (3)").unwrap();
        conn.set_autocommit(true).unwrap();
        assert!(conn.autocommit().unwrap());

        let cursor = conn.execute("SELECT v FROM t").unwrap().into_cursor().unwrap();
        assert_eq!(cursor.fetch().unwrap(), Some(vec![SqlValue::Integer(2)]));
        assert_eq!(cursor.fetch().unwrap(), None);
    }

    #[test]
    fn test_commit_without_transaction_is_recoverable() {
        let conn = connect();
        let err = conn.commit().unwrap_err();
        assert!(!err.is_fatal());
        assert!(err.to_string().contains("no transaction"));
    }

    #[test]
    fn test_nested_begin_is_fatal() {
        let conn = connect();
        conn.set_autocommit(false).unwrap();
        let err = conn.set_autocommit(false).unwrap_err();
        assert!(matches!(err, SqlError::BeginTransaction(_)));
        assert!(err.is_fatal());
    }
}
