///
/// Dynamic SQL values and row records as naml heap objects.
///
/// naml is statically typed, so a column value whose storage class is only
/// known at fetch time travels as a boxed `NamlSqlValue`. naml code asks for
/// its kind and reads it with the matching accessor.
///
/// Value kind discriminants:
/// - 0: null
/// - 1: integer
/// - 2: float
/// - 3: text
/// - 4: blob
///

use naml_std_core::{
    naml_array_new, naml_array_push, naml_bytes_from, naml_string_from, HeapHeader, HeapTag,
    NamlArray, NamlBytes, NamlString,
};

use crate::driver::Record;
use crate::value::SqlValue;

/// Runtime representation of one column value
#[repr(C)]
pub struct NamlSqlValue {
    pub header: HeapHeader,
    value: SqlValue,
}

impl NamlSqlValue {
    pub fn value(&self) -> &SqlValue {
        &self.value
    }
}

/// Runtime representation of a fetch target record
#[repr(C)]
pub struct NamlSqlRecord {
    pub header: HeapHeader,
    record: Record,
}

impl NamlSqlRecord {
    pub fn record(&self) -> &Record {
        &self.record
    }

    pub(crate) fn record_mut(&mut self) -> &mut Record {
        &mut self.record
    }
}

pub(crate) fn create_value(value: SqlValue) -> *mut NamlSqlValue {
    Box::into_raw(Box::new(NamlSqlValue {
        header: HeapHeader::new(HeapTag::SqlValue),
        value,
    }))
}

/// Builds an array of freshly boxed values
pub(crate) fn values_to_array(values: Vec<SqlValue>) -> *mut NamlArray {
    unsafe {
        let arr = naml_array_new(values.len());
        for value in values {
            naml_array_push(arr, create_value(value) as i64);
        }
        arr
    }
}

unsafe fn value_ref<'a>(v: *const NamlSqlValue) -> Option<&'a SqlValue> {
    if v.is_null() {
        None
    } else {
        Some(unsafe { &(*v).value })
    }
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn naml_sql_value_kind(v: *const NamlSqlValue) -> i64 {
    unsafe { value_ref(v) }.map_or(0, |value| value.column_type().kind())
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn naml_sql_value_is_null(v: *const NamlSqlValue) -> i64 {
    unsafe { value_ref(v) }.map_or(1, |value| value.is_null() as i64)
}

/// Integer view (floats truncate, numeric text parses, anything else is 0)
#[unsafe(no_mangle)]
pub unsafe extern "C" fn naml_sql_value_as_int(v: *const NamlSqlValue) -> i64 {
    unsafe { value_ref(v) }.and_then(SqlValue::as_i64).unwrap_or(0)
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn naml_sql_value_as_float(v: *const NamlSqlValue) -> f64 {
    unsafe { value_ref(v) }.and_then(SqlValue::as_f64).unwrap_or(0.0)
}

/// Text view: null reads as the empty string, blobs as lossy UTF-8
#[unsafe(no_mangle)]
pub unsafe extern "C" fn naml_sql_value_as_string(v: *const NamlSqlValue) -> *mut NamlString {
    let text = match unsafe { value_ref(v) } {
        None | Some(SqlValue::Null) => String::new(),
        Some(SqlValue::Blob(b)) => String::from_utf8_lossy(b).into_owned(),
        Some(other) => other.to_string(),
    };
    naml_string_from(&text)
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn naml_sql_value_as_bytes(v: *const NamlSqlValue) -> *mut NamlBytes {
    let bytes = unsafe { value_ref(v) }.and_then(SqlValue::as_bytes).unwrap_or_default();
    unsafe { naml_bytes_from(bytes.as_ptr(), bytes.len()) }
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn naml_sql_value_incref(v: *mut NamlSqlValue) {
    if !v.is_null() {
        unsafe { (*v).header.incref() };
    }
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn naml_sql_value_decref(v: *mut NamlSqlValue) {
    if !v.is_null() {
        unsafe {
            if (*v).header.decref() {
                drop(Box::from_raw(v));
            }
        }
    }
}

/// Decrement an array of values, releasing the values with it
#[unsafe(no_mangle)]
pub unsafe extern "C" fn naml_array_decref_sql_values(arr: *mut NamlArray) {
    if arr.is_null() {
        return;
    }
    unsafe {
        if (*arr).header.refcount() == 1 {
            for &elem in (*arr).as_slice() {
                naml_sql_value_decref(elem as *mut NamlSqlValue);
            }
        }
        naml_std_core::naml_array_decref(arr);
    }
}

#[unsafe(no_mangle)]
pub extern "C" fn naml_sql_record_new() -> *mut NamlSqlRecord {
    Box::into_raw(Box::new(NamlSqlRecord {
        header: HeapHeader::new(HeapTag::SqlRecord),
        record: Record::new(),
    }))
}

/// Number of positional slots
#[unsafe(no_mangle)]
pub unsafe extern "C" fn naml_sql_record_len(r: *const NamlSqlRecord) -> i64 {
    if r.is_null() {
        0
    } else {
        unsafe { (*r).record.len() as i64 }
    }
}

/// Positional slot as a new value (null pointer when absent)
#[unsafe(no_mangle)]
pub unsafe extern "C" fn naml_sql_record_get(r: *const NamlSqlRecord, index: i64) -> *mut NamlSqlValue {
    if r.is_null() || index < 0 {
        return std::ptr::null_mut();
    }
    match unsafe { (*r).record.get(index as usize) } {
        Some(value) => create_value(value.clone()),
        None => std::ptr::null_mut(),
    }
}

/// Named slot as a new value (null pointer when absent)
#[unsafe(no_mangle)]
pub unsafe extern "C" fn naml_sql_record_field(
    r: *const NamlSqlRecord,
    name: *const NamlString,
) -> *mut NamlSqlValue {
    if r.is_null() || name.is_null() {
        return std::ptr::null_mut();
    }
    unsafe {
        match (*r).record.field((*name).as_str()) {
            Some(value) => create_value(value.clone()),
            None => std::ptr::null_mut(),
        }
    }
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn naml_sql_record_decref(r: *mut NamlSqlRecord) {
    if !r.is_null() {
        unsafe {
            if (*r).header.decref() {
                drop(Box::from_raw(r));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use naml_std_core::{naml_array_get, naml_array_len, naml_bytes_decref, naml_string_decref,
                        string_from_naml};

    use super::*;
    use crate::driver::RowTarget;

    #[test]
    fn test_value_accessors() {
        unsafe {
            let v = create_value(SqlValue::Float(2.75));
            assert_eq!(naml_sql_value_kind(v), 2);
            assert_eq!(naml_sql_value_as_int(v), 2);
            assert_eq!(naml_sql_value_as_float(v), 2.75);
            let s = naml_sql_value_as_string(v);
            assert_eq!(string_from_naml(s), "2.75");
            naml_string_decref(s);
            naml_sql_value_decref(v);

            let v = create_value(SqlValue::Null);
            assert_eq!(naml_sql_value_kind(v), 0);
            assert_eq!(naml_sql_value_is_null(v), 1);
            let s = naml_sql_value_as_string(v);
            assert_eq!(string_from_naml(s), "");
            naml_string_decref(s);
            naml_sql_value_decref(v);
        }
    }

    #[test]
    fn test_blob_value() {
        unsafe {
            let v = create_value(SqlValue::Blob(vec![0xde, 0xad]));
            assert_eq!(naml_sql_value_kind(v), 4);
            let b = naml_sql_value_as_bytes(v);
            assert_eq!((*b).as_slice(), &[0xde, 0xad]);
            naml_bytes_decref(b);
            naml_sql_value_decref(v);
        }
    }

    #[test]
    fn test_values_to_array() {
        unsafe {
            let arr = values_to_array(vec![SqlValue::Integer(5), SqlValue::Text("x".into())]);
            assert_eq!(naml_array_len(arr), 2);
            let first = naml_array_get(arr, 0) as *const NamlSqlValue;
            assert_eq!((*first).value(), &SqlValue::Integer(5));
            naml_array_decref_sql_values(arr);
        }
    }

    #[test]
    fn test_record_accessors() {
        unsafe {
            let r = naml_sql_record_new();
            (*r).record_mut().set_position(0, SqlValue::Integer(1));
            (*r).record_mut().set_named("id", SqlValue::Integer(1));
            assert_eq!(naml_sql_record_len(r), 1);

            let v = naml_sql_record_get(r, 0);
            assert_eq!(naml_sql_value_as_int(v), 1);
            naml_sql_value_decref(v);
            assert!(naml_sql_record_get(r, 3).is_null());

            let name = naml_string_from("id");
            let v = naml_sql_record_field(r, name);
            assert_eq!(naml_sql_value_kind(v), 1);
            naml_sql_value_decref(v);
            naml_string_decref(name);

            naml_sql_record_decref(r);
        }
    }
}
