///
/// SQLite3 backend.
///
/// Environment, connection and cursor over a bundled SQLite. Connections
/// own a `rusqlite::Connection`; cursors own a raw prepared statement so
/// rows can be stepped one at a time across calls.
///

mod connection;
mod cursor;
mod environment;
pub(crate) mod statement;

pub use connection::Sqlite3Connection;
pub use cursor::Sqlite3Cursor;
pub use environment::Sqlite3Environment;

use std::ffi::{c_void, CStr, CString};

use rusqlite::ffi;

use crate::config::DriverConfig;
use crate::driver::DriverInfo;

pub const INFO: DriverInfo = DriverInfo {
    name: "sqlite3",
    description: "naml SQL driver for SQLite3",
    version: env!("CARGO_PKG_VERSION"),
    copyright: "Copyright (C) naml contributors, MIT licensed",
};

pub fn open() -> Sqlite3Environment {
    Sqlite3Environment::new()
}

pub fn open_with_config(config: DriverConfig) -> Sqlite3Environment {
    Sqlite3Environment::with_config(config)
}

/// Version of the linked SQLite library.
pub fn native_version() -> &'static str {
    rusqlite::version()
}

/// `%q` quoting through `sqlite3_mprintf`: doubles every single quote.
/// Input ends at the first NUL, as it would for a C string.
pub fn escape(value: &str) -> String {
    let value = c_string(value);
    unsafe {
        let quoted = ffi::sqlite3_mprintf(c"%q".as_ptr(), value.as_ptr());
        if quoted.is_null() {
            panic!("sqlite3_mprintf failed to allocate");
        }
        let escaped = CStr::from_ptr(quoted).to_string_lossy().into_owned();
        ffi::sqlite3_free(quoted as *mut c_void);
        escaped
    }
}

/// Whether `sql` ends with a complete statement, per `sqlite3_complete`.
/// Semicolons inside literals, comments and trigger bodies do not count.
pub fn is_complete(sql: &str) -> bool {
    let sql = c_string(sql);
    unsafe { ffi::sqlite3_complete(sql.as_ptr()) != 0 }
}

fn c_string(value: &str) -> CString {
    let value = value.split('\0').next().unwrap_or_default();
    CString::new(value).unwrap_or_default()
}
