///
/// NamlBytes - Core Bytes Type
///
/// Heap-allocated byte arrays for binary payloads (SQLite BLOB columns).
/// Same layout idea as strings, with no UTF-8 guarantee.
///

use std::alloc::{alloc, dealloc, Layout};

use crate::{HeapHeader, HeapTag};

/// A heap-allocated byte array
#[repr(C)]
pub struct NamlBytes {
    pub header: HeapHeader,
    pub len: usize,
    pub capacity: usize,
    pub data: [u8; 0],
}

impl NamlBytes {
    pub fn as_slice(&self) -> &[u8] {
        unsafe { std::slice::from_raw_parts(self.data.as_ptr(), self.len) }
    }
}

fn bytes_layout(capacity: usize) -> Layout {
    Layout::from_size_align(
        std::mem::size_of::<NamlBytes>() + capacity,
        std::mem::align_of::<NamlBytes>(),
    )
    .expect("bytes layout overflow")
}

/// Create bytes from raw data
#[unsafe(no_mangle)]
pub unsafe extern "C" fn naml_bytes_from(data: *const u8, len: usize) -> *mut NamlBytes {
    unsafe {
        let cap = if len == 0 { 8 } else { len };
        let ptr = alloc(bytes_layout(cap)) as *mut NamlBytes;
        if ptr.is_null() {
            panic!("Failed to allocate bytes");
        }

        std::ptr::write(&mut (*ptr).header, HeapHeader::new(HeapTag::Bytes));
        (*ptr).len = len;
        (*ptr).capacity = cap;

        if !data.is_null() && len > 0 {
            std::ptr::copy_nonoverlapping(data, (*ptr).data.as_mut_ptr(), len);
        }

        ptr
    }
}

/// Get bytes length
#[unsafe(no_mangle)]
pub unsafe extern "C" fn naml_bytes_len(b: *const NamlBytes) -> i64 {
    if b.is_null() {
        0
    } else {
        unsafe { (*b).len as i64 }
    }
}

/// Decrement reference count and free if zero
#[unsafe(no_mangle)]
pub unsafe extern "C" fn naml_bytes_decref(b: *mut NamlBytes) {
    if !b.is_null() {
        unsafe {
            if (*b).header.decref() {
                dealloc(b as *mut u8, bytes_layout((*b).capacity));
            }
        }
    }
}
