///
/// naml C ABI for the SQL driver
///
/// Environments, connections and cursors live in thread-local registries
/// (the driver objects are single-threaded) and naml code holds i64 handles
/// to them. Release functions drop the registry entry; the object itself goes
/// away once nothing that depends on it remains.
///
/// Fallible operations report through two out-params, as `naml_json_decode`
/// does:
/// - `OUT_OK` (0): success, `out_value` holds the payload
/// - `OUT_ERROR` (1): recoverable failure, `out_value` holds a NamlString
///   message the caller owns
/// - `OUT_CURSOR` (2): `execute` produced a cursor, `out_value` is its handle
/// - `OUT_DONE` (3): fetch found no more rows
/// - `OUT_RAISED` (-1): misuse; a DBError exception has been set
///
/// Functions without out-params raise for misuse and return a sentinel.
///

mod connection;
mod cursor;
mod environment;
mod registry;
mod values;

pub use connection::*;
pub use cursor::*;
pub use environment::*;
pub use values::*;

use std::cell::RefCell;
use std::rc::Rc;
use std::thread::LocalKey;

use naml_std_core::{naml_string_from, throw_db_error};

use crate::config::DEFAULT_ERROR_PREFIX;
use crate::error::{Result, SqlError};
use crate::sqlite3::{Sqlite3Connection, Sqlite3Cursor, Sqlite3Environment};
use registry::HandleRegistry;

pub const OUT_OK: i32 = 0;
pub const OUT_ERROR: i32 = 1;
pub const OUT_CURSOR: i32 = 2;
pub const OUT_DONE: i32 = 3;
pub const OUT_RAISED: i32 = -1;

type Registry<T> = LocalKey<RefCell<HandleRegistry<T>>>;

thread_local! {
    static ENVIRONMENTS: RefCell<HandleRegistry<Sqlite3Environment>> =
        RefCell::new(HandleRegistry::new("environment"));
    static CONNECTIONS: RefCell<HandleRegistry<Sqlite3Connection>> =
        RefCell::new(HandleRegistry::new("connection"));
    static CURSORS: RefCell<HandleRegistry<Sqlite3Cursor>> =
        RefCell::new(HandleRegistry::new("cursor"));
}

/// Clones the object out so the registry is not borrowed during the call.
fn lookup<T: Clone + 'static>(registry: &'static Registry<T>, handle: i64) -> Result<(T, Rc<str>)> {
    registry.with(|reg| reg.borrow().get(handle))
}

fn register<T: Clone + 'static>(registry: &'static Registry<T>, object: T, prefix: Rc<str>) -> i64 {
    registry.with(|reg| reg.borrow_mut().insert(object, prefix))
}

/// Removes the entry; the object is dropped after the borrow ends.
fn release<T: Clone + 'static>(registry: &'static Registry<T>, handle: i64) -> bool {
    let object = registry.with(|reg| reg.borrow_mut().remove(handle));
    object.is_some()
}

/// Open handles of each kind: environments, connections, cursors.
pub fn live_handles() -> (usize, usize, usize) {
    (
        ENVIRONMENTS.with(|reg| reg.borrow().len()),
        CONNECTIONS.with(|reg| reg.borrow().len()),
        CURSORS.with(|reg| reg.borrow().len()),
    )
}

fn raise(err: &SqlError, prefix: &str) {
    tracing::debug!(error = %err, "raising DBError");
    throw_db_error(&format!("{}{}", prefix, err), err.code());
}

/// Raises for a handle lookup that failed before any prefix was known.
fn raise_lookup(err: &SqlError) {
    raise(err, DEFAULT_ERROR_PREFIX);
}

unsafe fn write_out(out_tag: *mut i32, out_value: *mut i64, tag: i32, value: i64) {
    unsafe {
        if !out_tag.is_null() {
            *out_tag = tag;
        }
        if !out_value.is_null() {
            *out_value = value;
        }
    }
}

/// Routes an error to its channel: fatal ones raise, the rest become a
/// message in `out_value`.
unsafe fn report(err: SqlError, prefix: &str, out_tag: *mut i32, out_value: *mut i64) {
    if err.is_fatal() {
        raise(&err, prefix);
        unsafe { write_out(out_tag, out_value, OUT_RAISED, 0) };
    } else {
        tracing::debug!(error = %err, "returning recoverable error");
        let message = naml_string_from(&format!("{}{}", prefix, err));
        unsafe { write_out(out_tag, out_value, OUT_ERROR, message as i64) };
    }
}

#[cfg(test)]
mod tests {
    use naml_std_core::{
        db_error_message, naml_exception_check, naml_exception_clear, naml_exception_get,
        naml_string_decref, string_from_naml, NamlString,
    };

    use super::*;

    #[test]
    fn test_report_recoverable() {
        let mut tag = -5;
        let mut value = 0;
        let err = SqlError::Sqlite { message: "no such table: t".to_string(), code: 1 };
        unsafe {
            report(err, "p: ", &mut tag, &mut value);
            assert_eq!(tag, OUT_ERROR);
            let message = value as *mut NamlString;
            assert_eq!(string_from_naml(message), "p: no such table: t");
            naml_string_decref(message);
        }
        assert_eq!(naml_exception_check(), 0);
    }

    #[test]
    fn test_report_fatal_raises() {
        let mut tag = 0;
        let mut value = 7;
        unsafe {
            report(SqlError::CursorClosed, "p: ", &mut tag, &mut value);
            assert_eq!(tag, OUT_RAISED);
            assert_eq!(value, 0);
            assert_eq!(naml_exception_check(), 1);
            assert_eq!(db_error_message(naml_exception_get()), "p: cursor is closed");
        }
        naml_exception_clear();
    }
}
