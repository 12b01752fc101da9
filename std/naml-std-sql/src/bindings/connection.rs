use std::rc::Rc;

use naml_std_core::{naml_string_from, string_from_naml, NamlString};

use super::{
    lookup, raise, raise_lookup, register, release, report, write_out, CONNECTIONS, CURSORS,
    OUT_CURSOR, OUT_OK, OUT_RAISED,
};
use crate::driver::{Connection, Execution};
use crate::error::Result;
use crate::sqlite3::Sqlite3Connection;

/// Resolves a connection handle, raising when it is unknown.
fn connection(conn: i64) -> Option<(Sqlite3Connection, Rc<str>)> {
    match lookup(&CONNECTIONS, conn) {
        Ok(found) => Some(found),
        Err(e) => {
            raise_lookup(&e);
            None
        }
    }
}

/// Runs `op` and writes the outcome to the out-params (`out_value` 1 on success).
unsafe fn complete(
    conn: i64,
    out_tag: *mut i32,
    out_value: *mut i64,
    op: impl FnOnce(&Sqlite3Connection) -> Result<()>,
) {
    let Some((conn, prefix)) = connection(conn) else {
        unsafe { write_out(out_tag, out_value, OUT_RAISED, 0) };
        return;
    };
    match op(&conn) {
        Ok(()) => unsafe { write_out(out_tag, out_value, OUT_OK, 1) },
        Err(e) => unsafe { report(e, &prefix, out_tag, out_value) },
    }
}

/// Execute one SQL statement.
///
/// Statements without result columns give `OUT_OK` with the affected-row
/// count; queries give `OUT_CURSOR` with a new cursor handle.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn naml_sql_conn_execute(
    conn: i64,
    sql: *const NamlString,
    out_tag: *mut i32,
    out_value: *mut i64,
) {
    let Some((conn, prefix)) = connection(conn) else {
        unsafe { write_out(out_tag, out_value, OUT_RAISED, 0) };
        return;
    };
    let sql = unsafe { string_from_naml(sql) };
    match conn.execute(&sql) {
        Ok(Execution::RowCount(n)) => unsafe { write_out(out_tag, out_value, OUT_OK, n) },
        Ok(Execution::Cursor(cursor)) => {
            let handle = register(&CURSORS, cursor, prefix);
            unsafe { write_out(out_tag, out_value, OUT_CURSOR, handle) };
        }
        Err(e) => unsafe { report(e, &prefix, out_tag, out_value) },
    }
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn naml_sql_conn_commit(conn: i64, out_tag: *mut i32, out_value: *mut i64) {
    unsafe { complete(conn, out_tag, out_value, |c| c.commit()) }
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn naml_sql_conn_rollback(conn: i64, out_tag: *mut i32, out_value: *mut i64) {
    unsafe { complete(conn, out_tag, out_value, |c| c.rollback()) }
}

/// Switch autocommit on (non-zero) or off. Returns 1, or 0 after raising.
#[unsafe(no_mangle)]
pub extern "C" fn naml_sql_conn_set_autocommit(conn: i64, enabled: i64) -> i64 {
    let Some((conn, prefix)) = connection(conn) else {
        return 0;
    };
    match conn.set_autocommit(enabled != 0) {
        Ok(()) => 1,
        Err(e) => {
            raise(&e, &prefix);
            0
        }
    }
}

/// Quote `value` for use inside a single-quoted SQL literal. Works on
/// closed connections too.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn naml_sql_conn_escape(conn: i64, value: *const NamlString) -> *mut NamlString {
    let Some((conn, _)) = connection(conn) else {
        return std::ptr::null_mut();
    };
    let value = unsafe { string_from_naml(value) };
    naml_string_from(&conn.escape(&value))
}

/// Rowid of the most recent successful insert
#[unsafe(no_mangle)]
pub extern "C" fn naml_sql_conn_last_auto_id(conn: i64) -> i64 {
    let Some((conn, prefix)) = connection(conn) else {
        return 0;
    };
    match conn.last_auto_id() {
        Ok(id) => id,
        Err(e) => {
            raise(&e, &prefix);
            0
        }
    }
}

/// Close a connection. Returns 1, or 0 when it was already closed. Raises
/// while cursors are open.
#[unsafe(no_mangle)]
pub extern "C" fn naml_sql_conn_close(conn: i64) -> i64 {
    let Some((conn, prefix)) = connection(conn) else {
        return 0;
    };
    match conn.close() {
        Ok(closed) => closed as i64,
        Err(e) => {
            raise(&e, &prefix);
            0
        }
    }
}

/// Drop the handle. The connection closes once its cursors are gone too.
#[unsafe(no_mangle)]
pub extern "C" fn naml_sql_conn_release(conn: i64) -> i64 {
    release(&CONNECTIONS, conn) as i64
}
