///
/// Column values as they come out of a result row.
///
/// SQLite tags every value with one of five storage classes; each maps to one
/// `SqlValue` variant. Any other tag is a broken invariant and is reported as
/// a fatal error.
///

use std::fmt;

use rusqlite::ffi;

use crate::error::{Result, SqlError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Null,
    Integer,
    Float,
    Text,
    Blob,
}

impl ColumnType {
    pub fn from_code(code: i32) -> Result<Self> {
        match code {
            ffi::SQLITE_INTEGER => Ok(ColumnType::Integer),
            ffi::SQLITE_FLOAT => Ok(ColumnType::Float),
            ffi::SQLITE_TEXT => Ok(ColumnType::Text),
            ffi::SQLITE_BLOB => Ok(ColumnType::Blob),
            ffi::SQLITE_NULL => Ok(ColumnType::Null),
            other => Err(SqlError::UnrecognizedColumnType(other)),
        }
    }

    /// Discriminant exposed to naml code.
    pub fn kind(self) -> i64 {
        match self {
            ColumnType::Null => 0,
            ColumnType::Integer => 1,
            ColumnType::Float => 2,
            ColumnType::Text => 3,
            ColumnType::Blob => 4,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    Integer(i64),
    Float(f64),
    Text(String),
    Blob(Vec<u8>),
}

impl SqlValue {
    pub fn column_type(&self) -> ColumnType {
        match self {
            SqlValue::Null => ColumnType::Null,
            SqlValue::Integer(_) => ColumnType::Integer,
            SqlValue::Float(_) => ColumnType::Float,
            SqlValue::Text(_) => ColumnType::Text,
            SqlValue::Blob(_) => ColumnType::Blob,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, SqlValue::Null)
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            SqlValue::Integer(i) => Some(*i),
            SqlValue::Float(f) => Some(*f as i64),
            SqlValue::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            SqlValue::Float(f) => Some(*f),
            SqlValue::Integer(i) => Some(*i as f64),
            SqlValue::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            SqlValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            SqlValue::Blob(b) => Some(b),
            SqlValue::Text(s) => Some(s.as_bytes()),
            _ => None,
        }
    }
}

impl fmt::Display for SqlValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SqlValue::Null => write!(f, "NULL"),
            SqlValue::Integer(i) => write!(f, "{}", i),
            SqlValue::Float(x) => write!(f, "{}", x),
            SqlValue::Text(s) => write!(f, "{}", s),
            SqlValue::Blob(b) => write!(f, "<blob {} bytes>", b.len()),
        }
    }
}
