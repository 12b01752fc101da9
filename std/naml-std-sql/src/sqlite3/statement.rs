///
/// Owned `sqlite3_stmt` handle.
///
/// rusqlite's `Statement` borrows its connection, which a cursor stored in a
/// handle registry cannot express, so cursors keep the raw handle instead.
/// The statement is finalized exactly once: through `finalize` or on drop.
/// The database handle it points into must outlive it; the owning
/// connection's open-cursor count guarantees that.
///

use std::ffi::CStr;
use std::mem::ManuallyDrop;
use std::os::raw::{c_char, c_int};
use std::ptr::{self, NonNull};

use rusqlite::ffi;

use crate::error::{Result, SqlError};
use crate::value::{ColumnType, SqlValue};

pub(crate) struct RawStatement {
    ptr: NonNull<ffi::sqlite3_stmt>,
    db: *mut ffi::sqlite3,
}

/// Error for result code `rc` with the connection's current message.
pub(crate) fn last_error(db: *mut ffi::sqlite3, rc: c_int) -> SqlError {
    let message = unsafe {
        let msg = ffi::sqlite3_errmsg(db);
        if msg.is_null() {
            format!("sqlite error {}", rc)
        } else {
            CStr::from_ptr(msg).to_string_lossy().into_owned()
        }
    };
    SqlError::Sqlite { message, code: rc as i64 }
}

unsafe fn owned_cstr(s: *const c_char) -> Option<String> {
    if s.is_null() {
        None
    } else {
        Some(unsafe { CStr::from_ptr(s) }.to_string_lossy().into_owned())
    }
}

impl RawStatement {
    /// Compiles the first statement in `sql`. `Ok(None)` means `sql` held
    /// only whitespace or comments.
    pub(crate) fn prepare(db: *mut ffi::sqlite3, sql: &str) -> Result<Option<Self>> {
        let len = c_int::try_from(sql.len()).map_err(|_| SqlError::Sqlite {
            message: "statement too long".to_string(),
            code: ffi::SQLITE_TOOBIG as i64,
        })?;
        let mut stmt: *mut ffi::sqlite3_stmt = ptr::null_mut();
        let rc = unsafe {
            ffi::sqlite3_prepare_v2(
                db,
                sql.as_ptr() as *const c_char,
                len,
                &mut stmt,
                ptr::null_mut(),
            )
        };
        if rc != ffi::SQLITE_OK {
            if !stmt.is_null() {
                unsafe { ffi::sqlite3_finalize(stmt) };
            }
            return Err(last_error(db, rc));
        }
        Ok(NonNull::new(stmt).map(|ptr| RawStatement { ptr, db }))
    }

    pub(crate) fn step(&mut self) -> c_int {
        unsafe { ffi::sqlite3_step(self.ptr.as_ptr()) }
    }

    pub(crate) fn reset(&mut self) {
        unsafe { ffi::sqlite3_reset(self.ptr.as_ptr()) };
    }

    pub(crate) fn error(&self, rc: c_int) -> SqlError {
        last_error(self.db, rc)
    }

    pub(crate) fn column_count(&self) -> usize {
        unsafe { ffi::sqlite3_column_count(self.ptr.as_ptr()) as usize }
    }

    pub(crate) fn column_name(&self, col: usize) -> String {
        unsafe { owned_cstr(ffi::sqlite3_column_name(self.ptr.as_ptr(), col as c_int)) }
            .unwrap_or_default()
    }

    pub(crate) fn column_decltype(&self, col: usize) -> Option<String> {
        unsafe { owned_cstr(ffi::sqlite3_column_decltype(self.ptr.as_ptr(), col as c_int)) }
    }

    /// Reads column `col` of the current row by its storage class.
    pub(crate) fn column_value(&self, col: usize) -> Result<SqlValue> {
        let stmt = self.ptr.as_ptr();
        let col = col as c_int;
        let column_type = ColumnType::from_code(unsafe { ffi::sqlite3_column_type(stmt, col) })?;
        let value = unsafe {
            match column_type {
                ColumnType::Integer => SqlValue::Integer(ffi::sqlite3_column_int64(stmt, col)),
                ColumnType::Float => SqlValue::Float(ffi::sqlite3_column_double(stmt, col)),
                ColumnType::Text => {
                    let text = ffi::sqlite3_column_text(stmt, col);
                    let len = ffi::sqlite3_column_bytes(stmt, col) as usize;
                    if text.is_null() || len == 0 {
                        SqlValue::Text(String::new())
                    } else {
                        let bytes = std::slice::from_raw_parts(text, len);
                        SqlValue::Text(String::from_utf8_lossy(bytes).into_owned())
                    }
                }
                ColumnType::Blob => {
                    let blob = ffi::sqlite3_column_blob(stmt, col) as *const u8;
                    let len = ffi::sqlite3_column_bytes(stmt, col) as usize;
                    if blob.is_null() || len == 0 {
                        SqlValue::Blob(Vec::new())
                    } else {
                        SqlValue::Blob(std::slice::from_raw_parts(blob, len).to_vec())
                    }
                }
                ColumnType::Null => SqlValue::Null,
            }
        };
        Ok(value)
    }

    /// Finalizes the statement. An error here reports the failure of the
    /// most recent step.
    pub(crate) fn finalize(self) -> Result<()> {
        let this = ManuallyDrop::new(self);
        let rc = unsafe { ffi::sqlite3_finalize(this.ptr.as_ptr()) };
        if rc == ffi::SQLITE_OK {
            Ok(())
        } else {
            Err(last_error(this.db, rc))
        }
    }
}

impl Drop for RawStatement {
    fn drop(&mut self) {
        unsafe { ffi::sqlite3_finalize(self.ptr.as_ptr()) };
    }
}
