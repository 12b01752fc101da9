use std::rc::Rc;

use naml_std_core::{
    naml_array_new, naml_array_of_strings, naml_array_push, naml_string_from, NamlArray, NamlString,
};

use super::values::{values_to_array, NamlSqlRecord};
use super::{
    lookup, raise, raise_lookup, release, report, write_out, CURSORS, OUT_DONE, OUT_OK,
    OUT_RAISED,
};
use crate::driver::{Cursor, FetchMode};
use crate::error::SqlError;
use crate::sqlite3::Sqlite3Cursor;

fn cursor(cur: i64) -> Option<(Sqlite3Cursor, Rc<str>)> {
    match lookup(&CURSORS, cur) {
        Ok(found) => Some(found),
        Err(e) => {
            raise_lookup(&e);
            None
        }
    }
}

/// Fetch the next row as an array of `NamlSqlValue` (release it with
/// `naml_array_decref_sql_values`).
///
/// `OUT_OK` carries the row, `OUT_DONE` means the result is exhausted and the
/// cursor has closed itself.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn naml_sql_cursor_fetch(cur: i64, out_tag: *mut i32, out_value: *mut i64) {
    let Some((cur, prefix)) = cursor(cur) else {
        unsafe { write_out(out_tag, out_value, OUT_RAISED, 0) };
        return;
    };
    match cur.fetch() {
        Ok(Some(row)) => {
            let arr = values_to_array(row);
            unsafe { write_out(out_tag, out_value, OUT_OK, arr as i64) };
        }
        Ok(None) => unsafe { write_out(out_tag, out_value, OUT_DONE, 0) },
        Err(e) => unsafe { report(e, &prefix, out_tag, out_value) },
    }
}

/// Fetch the next row into a caller-supplied record. `mode` holds `n`
/// (positional slots) and/or `a` (slots by column name); null or empty
/// means `n`.
/// Slots not written by this row keep their old contents.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn naml_sql_cursor_fetch_into(
    cur: i64,
    record: *mut NamlSqlRecord,
    mode: *const NamlString,
    out_tag: *mut i32,
    out_value: *mut i64,
) {
    let Some((cur, prefix)) = cursor(cur) else {
        unsafe { write_out(out_tag, out_value, OUT_RAISED, 0) };
        return;
    };
    if record.is_null() {
        raise(&SqlError::InvalidHandle { kind: "record", handle: 0 }, &prefix);
        unsafe { write_out(out_tag, out_value, OUT_RAISED, 0) };
        return;
    }
    let mode = match unsafe { mode.as_ref() } {
        Some(mode) if !mode.as_str().is_empty() => FetchMode::parse(mode.as_str()),
        _ => FetchMode::default(),
    };

    let target = unsafe { (*record).record_mut() };
    match cur.fetch_into(target, mode) {
        Ok(true) => unsafe { write_out(out_tag, out_value, OUT_OK, 1) },
        Ok(false) => unsafe { write_out(out_tag, out_value, OUT_DONE, 0) },
        Err(e) => unsafe { report(e, &prefix, out_tag, out_value) },
    }
}

/// Column names in result order, as an array of strings
#[unsafe(no_mangle)]
pub extern "C" fn naml_sql_cursor_column_names(cur: i64) -> *mut NamlArray {
    let Some((cur, prefix)) = cursor(cur) else {
        return std::ptr::null_mut();
    };
    match cur.column_names() {
        Ok(names) => naml_array_of_strings(&names[..]),
        Err(e) => {
            raise(&e, &prefix);
            std::ptr::null_mut()
        }
    }
}

/// Declared column types, as an array of strings. A column without a
/// declared type (an expression) has a null element.
#[unsafe(no_mangle)]
pub extern "C" fn naml_sql_cursor_column_types(cur: i64) -> *mut NamlArray {
    let Some((cur, prefix)) = cursor(cur) else {
        return std::ptr::null_mut();
    };
    match cur.column_types() {
        Ok(types) => unsafe {
            let arr = naml_array_new(types.len());
            for decltype in types.iter() {
                let elem = decltype.as_deref().map_or(std::ptr::null_mut(), naml_string_from);
                naml_array_push(arr, elem as i64);
            }
            arr
        },
        Err(e) => {
            raise(&e, &prefix);
            std::ptr::null_mut()
        }
    }
}

/// Close a cursor. Returns 1, or 0 when it was already closed or exhausted.
#[unsafe(no_mangle)]
pub extern "C" fn naml_sql_cursor_close(cur: i64) -> i64 {
    match cursor(cur) {
        Some((cur, _)) => cur.close() as i64,
        None => 0,
    }
}

/// Drop the handle, finalizing the statement if it is still open.
#[unsafe(no_mangle)]
pub extern "C" fn naml_sql_cursor_release(cur: i64) -> i64 {
    release(&CURSORS, cur) as i64
}
