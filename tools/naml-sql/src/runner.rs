use std::io::{self, Write};

use naml_std_sql::{Connection, Cursor, Execution, SqlError, SqlValue, Sqlite3Connection};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RunError {
    #[error("{0}")]
    Sql(#[from] SqlError),

    #[error("write failed: {0}")]
    Io(#[from] io::Error),
}

/// Discards a partial transaction by switching autocommit back on.
pub fn abandon_transaction(conn: &Sqlite3Connection) -> bool {
    match conn.set_autocommit(true) {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!(error = %e, "could not discard the partial transaction");
            false
        }
    }
}

pub struct Runner<W: Write> {
    out: W,
    headers: bool,
    null_text: String,
}

impl<W: Write> Runner<W> {
    pub fn new(out: W, headers: bool, null_text: &str) -> Self {
        Self {
            out,
            headers,
            null_text: null_text.to_string(),
        }
    }

    /// Executes one statement, printing its rows or its affected-row count.
    pub fn run(&mut self, conn: &Sqlite3Connection, sql: &str) -> Result<(), RunError> {
        match conn.execute(sql)? {
            Execution::RowCount(n) => {
                writeln!(self.out, "{} row(s) affected", n)?;
            }
            Execution::Cursor(cursor) => {
                if self.headers {
                    writeln!(self.out, "{}", cursor.column_names()?.join("\t"))?;
                }
                let mut count = 0usize;
                while let Some(row) = cursor.fetch()? {
                    let line: Vec<String> = row.iter().map(|v| self.render(v)).collect();
                    writeln!(self.out, "{}", line.join("\t"))?;
                    count += 1;
                }
                tracing::debug!(rows = count, "query finished");
            }
        }
        Ok(())
    }

    fn render(&self, value: &SqlValue) -> String {
        match value {
            SqlValue::Null => self.null_text.clone(),
            other => other.to_string(),
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}
