//!
//! Runtime Value Representation
//!
//! naml values cross the native boundary as 64-bit words that are either
//! inline primitives (int, float, bool) or pointers to reference-counted heap
//! objects. Every heap object starts with a `HeapHeader` so the runtime can
//! tell objects apart and release them without knowing their payload.
//!

use std::alloc::{alloc, dealloc, Layout};
use std::sync::atomic::{AtomicUsize, Ordering};

/// Type tags for heap objects
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeapTag {
    String = 0,
    Array = 1,
    Bytes = 2,
    SqlValue = 3,
    SqlRecord = 4,
}

/// Header for all heap-allocated objects
#[repr(C)]
pub struct HeapHeader {
    pub refcount: AtomicUsize,
    pub tag: HeapTag,
    pub _pad: [u8; 7],
}

impl HeapHeader {
    pub fn new(tag: HeapTag) -> Self {
        Self {
            refcount: AtomicUsize::new(1),
            tag,
            _pad: [0; 7],
        }
    }

    pub fn incref(&self) {
        self.refcount.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns true when the last reference was dropped.
    pub fn decref(&self) -> bool {
        if self.refcount.fetch_sub(1, Ordering::Release) == 1 {
            std::sync::atomic::fence(Ordering::Acquire);
            true
        } else {
            false
        }
    }

    pub fn refcount(&self) -> usize {
        self.refcount.load(Ordering::Relaxed)
    }
}

/// A heap-allocated string
#[repr(C)]
pub struct NamlString {
    pub header: HeapHeader,
    pub len: usize,
    pub data: [u8; 0],
}

impl NamlString {
    pub fn as_bytes(&self) -> &[u8] {
        unsafe { std::slice::from_raw_parts(self.data.as_ptr(), self.len) }
    }

    pub fn as_str(&self) -> &str {
        unsafe { std::str::from_utf8_unchecked(self.as_bytes()) }
    }
}

fn string_layout(len: usize) -> Layout {
    Layout::from_size_align(
        std::mem::size_of::<NamlString>() + len,
        std::mem::align_of::<NamlString>(),
    )
    .expect("string layout overflow")
}

/// Allocate a new string on the heap
#[unsafe(no_mangle)]
pub unsafe extern "C" fn naml_string_new(data: *const u8, len: usize) -> *mut NamlString {
    unsafe {
        let ptr = alloc(string_layout(len)) as *mut NamlString;
        if ptr.is_null() {
            panic!("Failed to allocate string");
        }

        std::ptr::write(&mut (*ptr).header, HeapHeader::new(HeapTag::String));
        (*ptr).len = len;

        if !data.is_null() && len > 0 {
            std::ptr::copy_nonoverlapping(data, (*ptr).data.as_mut_ptr(), len);
        }

        ptr
    }
}

/// Increment reference count of a string
#[unsafe(no_mangle)]
pub unsafe extern "C" fn naml_string_incref(s: *mut NamlString) {
    if !s.is_null() {
        unsafe { (*s).header.incref(); }
    }
}

/// Decrement reference count and free if zero
#[unsafe(no_mangle)]
pub unsafe extern "C" fn naml_string_decref(s: *mut NamlString) {
    if !s.is_null() {
        unsafe {
            if (*s).header.decref() {
                dealloc(s as *mut u8, string_layout((*s).len));
            }
        }
    }
}

/// Get string length in bytes
#[unsafe(no_mangle)]
pub unsafe extern "C" fn naml_string_len(s: *const NamlString) -> i64 {
    if s.is_null() {
        0
    } else {
        unsafe { (*s).len as i64 }
    }
}

/// Compare two strings for equality
#[unsafe(no_mangle)]
pub unsafe extern "C" fn naml_string_eq(a: *const NamlString, b: *const NamlString) -> i64 {
    unsafe {
        match (a.is_null(), b.is_null()) {
            (true, true) => 1,
            (false, false) if (*a).as_bytes() == (*b).as_bytes() => 1,
            _ => 0,
        }
    }
}

/// Copy a Rust string into a fresh naml string
pub fn naml_string_from(s: &str) -> *mut NamlString {
    unsafe { naml_string_new(s.as_ptr(), s.len()) }
}

/// Read a naml string into an owned Rust string (null reads as empty)
///
/// # Safety
/// `s` must be null or point to a live `NamlString`.
pub unsafe fn string_from_naml(s: *const NamlString) -> String {
    if s.is_null() {
        return String::new();
    }
    unsafe { String::from_utf8_lossy((*s).as_bytes()).into_owned() }
}
