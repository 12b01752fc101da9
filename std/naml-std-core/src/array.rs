//!
//! Runtime Array Type
//!
//! Heap-allocated, reference-counted arrays of 64-bit values. Native
//! libraries use them to hand back lists: a fetched row, the column names of
//! a cursor. Elements are either primitives or pointers to heap objects; the
//! element kind decides which decref variant releases the array.
//!

use std::alloc::{alloc, dealloc, realloc, Layout};
use crate::value::{HeapHeader, HeapTag, NamlString, naml_string_decref};

/// A heap-allocated array of i64 values
#[repr(C)]
pub struct NamlArray {
    pub header: HeapHeader,
    pub len: usize,
    pub capacity: usize,
    pub data: *mut i64,
}

impl NamlArray {
    pub fn as_slice(&self) -> &[i64] {
        unsafe { std::slice::from_raw_parts(self.data, self.len) }
    }
}

fn data_layout(capacity: usize) -> Layout {
    Layout::array::<i64>(capacity).expect("array layout overflow")
}

/// Create a new empty array with given initial capacity
#[unsafe(no_mangle)]
pub unsafe extern "C" fn naml_array_new(capacity: usize) -> *mut NamlArray {
    unsafe {
        let layout = Layout::new::<NamlArray>();
        let ptr = alloc(layout) as *mut NamlArray;
        if ptr.is_null() {
            panic!("Failed to allocate array");
        }

        let cap = if capacity == 0 { 4 } else { capacity };
        let data = alloc(data_layout(cap)) as *mut i64;
        if data.is_null() {
            dealloc(ptr as *mut u8, layout);
            panic!("Failed to allocate array data");
        }

        std::ptr::write(&mut (*ptr).header, HeapHeader::new(HeapTag::Array));
        (*ptr).len = 0;
        (*ptr).capacity = cap;
        (*ptr).data = data;

        ptr
    }
}

/// Increment reference count
#[unsafe(no_mangle)]
pub unsafe extern "C" fn naml_array_incref(arr: *mut NamlArray) {
    if !arr.is_null() {
        unsafe { (*arr).header.incref(); }
    }
}

unsafe fn array_free(arr: *mut NamlArray) {
    unsafe {
        dealloc((*arr).data as *mut u8, data_layout((*arr).capacity));
        dealloc(arr as *mut u8, Layout::new::<NamlArray>());
    }
}

/// Decrement reference count and free if zero (for arrays of primitives)
#[unsafe(no_mangle)]
pub unsafe extern "C" fn naml_array_decref(arr: *mut NamlArray) {
    if !arr.is_null() {
        unsafe {
            if (*arr).header.decref() {
                array_free(arr);
            }
        }
    }
}

/// Decrement reference count and free if zero, also decref string elements
#[unsafe(no_mangle)]
pub unsafe extern "C" fn naml_array_decref_strings(arr: *mut NamlArray) {
    if !arr.is_null() {
        unsafe {
            if (*arr).header.decref() {
                for &elem in (*arr).as_slice() {
                    if elem != 0 {
                        naml_string_decref(elem as *mut NamlString);
                    }
                }
                array_free(arr);
            }
        }
    }
}

/// Get array length
#[unsafe(no_mangle)]
pub unsafe extern "C" fn naml_array_len(arr: *const NamlArray) -> i64 {
    if arr.is_null() {
        0
    } else {
        unsafe { (*arr).len as i64 }
    }
}

/// Get element at index (returns 0 if out of bounds)
#[unsafe(no_mangle)]
pub unsafe extern "C" fn naml_array_get(arr: *const NamlArray, index: i64) -> i64 {
    if arr.is_null() || index < 0 {
        return 0;
    }
    unsafe { (*arr).as_slice().get(index as usize).copied().unwrap_or(0) }
}

/// Push element to end of array
#[unsafe(no_mangle)]
pub unsafe extern "C" fn naml_array_push(arr: *mut NamlArray, value: i64) {
    if arr.is_null() {
        return;
    }

    unsafe {
        if (*arr).len >= (*arr).capacity {
            let new_capacity = (*arr).capacity * 2;
            let new_data = realloc(
                (*arr).data as *mut u8,
                data_layout((*arr).capacity),
                data_layout(new_capacity).size(),
            ) as *mut i64;
            if new_data.is_null() {
                panic!("Failed to grow array");
            }

            (*arr).data = new_data;
            (*arr).capacity = new_capacity;
        }

        *(*arr).data.add((*arr).len) = value;
        (*arr).len += 1;
    }
}

/// Build an array of fresh naml strings
pub fn naml_array_of_strings<S: AsRef<str>>(items: &[S]) -> *mut NamlArray {
    unsafe {
        let arr = naml_array_new(items.len());
        for item in items {
            naml_array_push(arr, crate::value::naml_string_from(item.as_ref()) as i64);
        }
        arr
    }
}
