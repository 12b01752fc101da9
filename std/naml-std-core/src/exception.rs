//!
//! Exception Handling Primitives
//!
//! Thread-local exception slot for try/catch support in naml. A native
//! function raises by storing an exception object and its type id, then
//! returning a sentinel; generated code checks the slot after the call.
//!
//! Exception Type IDs:
//! - 0: Unknown/User-defined exception
//! - 7: DBError
//!

use std::alloc::{alloc, Layout};
use std::cell::Cell;

use crate::value::{naml_string_from, NamlString};

thread_local! {
    static CURRENT_EXCEPTION: Cell<*mut u8> = const { Cell::new(std::ptr::null_mut()) };
    static CURRENT_EXCEPTION_TYPE_ID: Cell<i64> = const { Cell::new(0) };
}

pub const EXCEPTION_TYPE_UNKNOWN: i64 = 0;
pub const EXCEPTION_TYPE_DB_ERROR: i64 = 7;

/// Set the current exception with type ID
#[unsafe(no_mangle)]
pub extern "C" fn naml_exception_set_typed(exception_ptr: *mut u8, type_id: i64) {
    CURRENT_EXCEPTION.with(|ex| ex.set(exception_ptr));
    CURRENT_EXCEPTION_TYPE_ID.with(|id| id.set(type_id));
}

/// Get the current exception type ID
#[unsafe(no_mangle)]
pub extern "C" fn naml_exception_get_type_id() -> i64 {
    CURRENT_EXCEPTION_TYPE_ID.with(|id| id.get())
}

/// Get the current exception pointer (null if none)
#[unsafe(no_mangle)]
pub extern "C" fn naml_exception_get() -> *mut u8 {
    CURRENT_EXCEPTION.with(|ex| ex.get())
}

/// Clear the current exception (called after catch handles it)
#[unsafe(no_mangle)]
pub extern "C" fn naml_exception_clear() {
    CURRENT_EXCEPTION.with(|ex| ex.set(std::ptr::null_mut()));
    CURRENT_EXCEPTION_TYPE_ID.with(|id| id.set(0));
}

/// Check if there's a pending exception
#[unsafe(no_mangle)]
pub extern "C" fn naml_exception_check() -> i64 {
    CURRENT_EXCEPTION.with(|ex| if ex.get().is_null() { 0 } else { 1 })
}

/// Allocate a DBError exception object
///
/// Exception layout:
/// - Offset 0: message pointer (8 bytes)
/// - Offset 8: stack pointer (8 bytes), unused by native throws
/// - Offset 16: code (8 bytes)
#[unsafe(no_mangle)]
pub extern "C" fn naml_db_error_new(message: *const NamlString, code: i64) -> *mut u8 {
    unsafe {
        let layout = Layout::from_size_align(24, 8).expect("DBError layout");
        let ptr = alloc(layout);
        if ptr.is_null() {
            panic!("Failed to allocate DBError");
        }
        *(ptr as *mut i64) = message as i64;
        *(ptr.add(8) as *mut i64) = 0;
        *(ptr.add(16) as *mut i64) = code;
        ptr
    }
}

/// Raise a DBError with the given message and code
pub fn throw_db_error(message: &str, code: i64) {
    let exception = naml_db_error_new(naml_string_from(message), code);
    naml_exception_set_typed(exception, EXCEPTION_TYPE_DB_ERROR);
}

/// Read the message of a DBError object
///
/// # Safety
/// `exception` must come from `naml_db_error_new`.
pub unsafe fn db_error_message(exception: *const u8) -> String {
    unsafe { crate::value::string_from_naml(*(exception as *const i64) as *const NamlString) }
}
