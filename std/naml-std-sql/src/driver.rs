///
/// Uniform driver interface.
///
/// Every backend exposes the same three objects:
///
/// - `Environment`: root factory for connections
/// - `Connection`: one open database handle
/// - `Cursor`: one prepared statement that produces rows
///
/// Ownership is hierarchical. A connection keeps its environment alive, a
/// cursor keeps its connection alive, and a connection refuses to close while
/// it still has open cursors.
///

use std::rc::Rc;
use std::time::Duration;

use indexmap::IndexMap;

use crate::error::Result;
use crate::value::SqlValue;

/// Descriptive fields published next to each driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DriverInfo {
    pub name: &'static str,
    pub description: &'static str,
    pub version: &'static str,
    pub copyright: &'static str,
}

/// Result of `Connection::execute`.
#[derive(Debug)]
pub enum Execution<C> {
    /// A statement without result columns; carries the affected-row count.
    RowCount(i64),
    /// A statement that produces rows.
    Cursor(C),
}

impl<C> Execution<C> {
    pub fn row_count(&self) -> Option<i64> {
        match self {
            Execution::RowCount(n) => Some(*n),
            Execution::Cursor(_) => None,
        }
    }

    pub fn into_cursor(self) -> Option<C> {
        match self {
            Execution::Cursor(c) => Some(c),
            Execution::RowCount(_) => None,
        }
    }
}

/// Which slots of a fetch target receive a row's values.
///
/// Parsed from a mode string: `n` selects positional slots, `a` selects slots
/// keyed by column name. Other characters are ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchMode {
    pub numeric: bool,
    pub named: bool,
}

impl FetchMode {
    pub const NUMERIC: FetchMode = FetchMode { numeric: true, named: false };
    pub const NAMED: FetchMode = FetchMode { numeric: false, named: true };
    pub const BOTH: FetchMode = FetchMode { numeric: true, named: true };

    pub fn parse(mode: &str) -> Self {
        FetchMode {
            numeric: mode.contains('n'),
            named: mode.contains('a'),
        }
    }
}

impl Default for FetchMode {
    fn default() -> Self {
        FetchMode::NUMERIC
    }
}

/// Aggregate a cursor can copy a row into.
pub trait RowTarget {
    fn set_position(&mut self, index: usize, value: SqlValue);
    fn set_named(&mut self, name: &str, value: SqlValue);
}

impl RowTarget for Vec<SqlValue> {
    fn set_position(&mut self, index: usize, value: SqlValue) {
        if index >= self.len() {
            self.resize(index + 1, SqlValue::Null);
        }
        self[index] = value;
    }

    fn set_named(&mut self, _name: &str, _value: SqlValue) {}
}

impl RowTarget for IndexMap<String, SqlValue> {
    fn set_position(&mut self, _index: usize, _value: SqlValue) {}

    fn set_named(&mut self, name: &str, value: SqlValue) {
        self.insert(name.to_string(), value);
    }
}

/// A reusable row aggregate with positional and named slots.
///
/// Slots are overwritten on each fetch, never cleared, so a record reused
/// across cursors keeps stale entries past the current row's width.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    values: Vec<SqlValue>,
    fields: IndexMap<String, SqlValue>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty() && self.fields.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&SqlValue> {
        self.values.get(index)
    }

    pub fn field(&self, name: &str) -> Option<&SqlValue> {
        self.fields.get(name)
    }

    pub fn values(&self) -> &[SqlValue] {
        &self.values
    }

    pub fn fields(&self) -> &IndexMap<String, SqlValue> {
        &self.fields
    }
}

impl RowTarget for Record {
    fn set_position(&mut self, index: usize, value: SqlValue) {
        self.values.set_position(index, value);
    }

    fn set_named(&mut self, name: &str, value: SqlValue) {
        self.fields.set_named(name, value);
    }
}

pub trait Environment {
    type Connection: Connection;

    fn info(&self) -> &'static DriverInfo;

    /// Opens a data source. A `timeout` sets how long to wait on a locked
    /// database before giving up.
    fn connect(&self, source: &str, timeout: Option<Duration>) -> Result<Self::Connection>;

    /// Returns false when the environment was already closed.
    fn close(&self) -> bool;

    fn is_closed(&self) -> bool;
}

pub trait Connection {
    type Cursor: Cursor;

    fn execute(&self, sql: &str) -> Result<Execution<Self::Cursor>>;

    fn commit(&self) -> Result<()>;

    fn rollback(&self) -> Result<()>;

    fn set_autocommit(&self, enabled: bool) -> Result<()>;

    fn autocommit(&self) -> Result<bool>;

    /// Quotes a string for inclusion inside a single-quoted SQL literal.
    fn escape(&self, value: &str) -> String;

    fn last_auto_id(&self) -> Result<i64>;

    fn open_cursors(&self) -> usize;

    /// Returns `Ok(false)` when the connection was already closed and fails
    /// while cursors are still open.
    fn close(&self) -> Result<bool>;

    fn is_closed(&self) -> bool;
}

pub trait Cursor {
    /// Copies the next row into `target`. Returns false once the rows are
    /// exhausted, at which point the cursor is closed.
    fn fetch_into(&self, target: &mut dyn RowTarget, mode: FetchMode) -> Result<bool>;

    /// Next row as a list of values, or `None` once exhausted.
    fn fetch(&self) -> Result<Option<Vec<SqlValue>>> {
        let mut row = Vec::new();
        Ok(self.fetch_into(&mut row, FetchMode::NUMERIC)?.then_some(row))
    }

    fn column_names(&self) -> Result<Rc<[String]>>;

    /// Declared column types; `None` for columns without one.
    fn column_types(&self) -> Result<Rc<[Option<String>]>>;

    /// Returns false when the cursor was already closed.
    fn close(&self) -> bool;

    fn is_closed(&self) -> bool;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetch_mode_parsing() {
        assert_eq!(FetchMode::parse("n"), FetchMode::NUMERIC);
        assert_eq!(FetchMode::parse("a"), FetchMode::NAMED);
        assert_eq!(FetchMode::parse("an"), FetchMode::BOTH);
        assert_eq!(FetchMode::parse("xyz"), FetchMode { numeric: false, named: false });
        assert_eq!(FetchMode::default(), FetchMode::NUMERIC);
    }

    #[test]
    fn test_vec_target_grows() {
        let mut row: Vec<SqlValue> = Vec::new();
        row.set_position(2, SqlValue::Integer(9));
        row.set_named("ignored", SqlValue::Integer(1));
        assert_eq!(row, vec![SqlValue::Null, SqlValue::Null, SqlValue::Integer(9)]);
    }

    #[test]
    fn test_record_keeps_both_parts() {
        let mut record = Record::new();
        assert!(record.is_empty());
        record.set_position(0, SqlValue::Text("ada".to_string()));
        record.set_named("name", SqlValue::Text("ada".to_string()));
        assert_eq!(record.len(), 1);
        assert_eq!(record.get(0), record.field("name"));
        assert!(record.field("missing").is_none());
    }

    #[test]
    fn test_execution_accessors() {
        let done: Execution<()> = Execution::RowCount(3);
        assert_eq!(done.row_count(), Some(3));
        assert!(done.into_cursor().is_none());

        let rows: Execution<&str> = Execution::Cursor("cursor");
        assert_eq!(rows.row_count(), None);
        assert_eq!(rows.into_cursor(), Some("cursor"));
    }
}
