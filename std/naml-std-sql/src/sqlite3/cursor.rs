use std::cell::RefCell;
use std::fmt;
use std::os::raw::c_int;
use std::rc::Rc;

use rusqlite::ffi;
use tracing::{debug, trace, warn};

use crate::driver::{Cursor, FetchMode, RowTarget};
use crate::error::{Result, SqlError};
use crate::sqlite3::statement::RawStatement;
use crate::sqlite3::Sqlite3Connection;

struct CursorState {
    /// `None` once closed or exhausted.
    stmt: RefCell<Option<RawStatement>>,
    names: Rc<[String]>,
    types: Rc<[Option<String>]>,
    conn: Sqlite3Connection,
}

impl Drop for CursorState {
    fn drop(&mut self) {
        if let Some(stmt) = self.stmt.get_mut().take() {
            if let Err(e) = stmt.finalize() {
                warn!(error = %e, "finalize failed while reclaiming cursor");
            }
            self.conn.cursor_closed();
        }
    }
}

/// SQLite3 cursor. Cloning shares the same statement.
#[derive(Clone)]
pub struct Sqlite3Cursor {
    state: Rc<CursorState>,
}

impl Sqlite3Cursor {
    /// Takes ownership of `stmt` and caches its column metadata.
    pub(crate) fn new(conn: Sqlite3Connection, stmt: RawStatement) -> Self {
        let count = stmt.column_count();
        let names: Rc<[String]> = (0..count).map(|i| stmt.column_name(i)).collect();
        let types: Rc<[Option<String>]> = (0..count).map(|i| stmt.column_decltype(i)).collect();
        conn.cursor_opened();
        Self {
            state: Rc::new(CursorState {
                stmt: RefCell::new(Some(stmt)),
                names,
                types,
                conn,
            }),
        }
    }

    pub fn column_count(&self) -> usize {
        self.state.names.len()
    }

    pub fn connection(&self) -> &Sqlite3Connection {
        &self.state.conn
    }

    /// Finalizes after `SQLITE_DONE` or a step error; the finalize result
    /// carries the step error, if any.
    fn finish(&self, stmt: RawStatement, rc: c_int) -> Result<bool> {
        let result = stmt.finalize();
        self.state.conn.cursor_closed();
        match result {
            Ok(()) => {
                debug!("sqlite3 cursor exhausted");
                Ok(false)
            }
            Err(e) => {
                debug!(rc, error = %e, "sqlite3 cursor step failed");
                Err(e)
            }
        }
    }
}

impl fmt::Debug for Sqlite3Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sqlite3Cursor")
            .field("closed", &self.is_closed())
            .field("columns", &self.state.names)
            .finish()
    }
}

impl Cursor for Sqlite3Cursor {
    fn fetch_into(&self, target: &mut dyn RowTarget, mode: FetchMode) -> Result<bool> {
        let mut slot = self.state.stmt.borrow_mut();
        let stmt = slot.as_mut().ok_or(SqlError::CursorClosed)?;

        let rc = stmt.step();
        if rc != ffi::SQLITE_ROW {
            let stmt = slot.take().ok_or(SqlError::CursorClosed)?;
            drop(slot);
            return self.finish(stmt, rc);
        }

        if mode.numeric {
            for col in 0..self.state.names.len() {
                target.set_position(col, stmt.column_value(col)?);
            }
        }
        if mode.named {
            for (col, name) in self.state.names.iter().enumerate() {
                target.set_named(name, stmt.column_value(col)?);
            }
        }
        trace!(columns = self.state.names.len(), "sqlite3 row fetched");
        Ok(true)
    }

    fn column_names(&self) -> Result<Rc<[String]>> {
        if self.is_closed() {
            return Err(SqlError::CursorClosed);
        }
        Ok(Rc::clone(&self.state.names))
    }

    fn column_types(&self) -> Result<Rc<[Option<String>]>> {
        if self.is_closed() {
            return Err(SqlError::CursorClosed);
        }
        Ok(Rc::clone(&self.state.types))
    }

    fn close(&self) -> bool {
        let stmt = self.state.stmt.borrow_mut().take();
        let Some(stmt) = stmt else {
            return false;
        };
        if let Err(e) = stmt.finalize() {
            warn!(error = %e, "finalize error on close ignored");
        }
        self.state.conn.cursor_closed();
        debug!("sqlite3 cursor closed");
        true
    }

    fn is_closed(&self) -> bool {
        self.state.stmt.borrow().is_none()
    }
}
