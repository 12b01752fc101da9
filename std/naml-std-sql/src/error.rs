///
/// Driver error types.
///
/// Errors split into two channels. Recoverable failures come from SQLite
/// itself (prepare, step, commit/rollback, connect) and are handed back to
/// the caller as values. Misuse failures (closed objects, open cursors, bad
/// handles) are fatal and surface as naml exceptions.
///

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SqlError {
    #[error("{message}")]
    Sqlite { message: String, code: i64 },

    #[error("{0}")]
    Native(#[from] rusqlite::Error),

    #[error("environment is closed")]
    EnvironmentClosed,

    #[error("connection is closed")]
    ConnectionClosed,

    #[error("cursor is closed")]
    CursorClosed,

    #[error("there are open cursors")]
    OpenCursors,

    #[error("{0}")]
    BeginTransaction(String),

    #[error("Unrecognized column type {0}")]
    UnrecognizedColumnType(i32),

    #[error("{kind} expected")]
    InvalidHandle { kind: &'static str, handle: i64 },

    #[error("unknown driver '{0}'")]
    UnknownDriver(String),

    #[error("Failed to read config at {path}: {reason}")]
    Config { path: String, reason: String },
}

impl SqlError {
    /// Fatal errors are programmer misuse or broken invariants; the rest are
    /// reported back as ordinary failures.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, SqlError::Sqlite { .. } | SqlError::Native(_))
    }

    /// Native SQLite result code, or -1 when the error did not come from SQLite.
    pub fn code(&self) -> i64 {
        match self {
            SqlError::Sqlite { code, .. } => *code,
            SqlError::Native(rusqlite::Error::SqliteFailure(err, _)) => err.extended_code as i64,
            _ => -1,
        }
    }
}

pub type Result<T> = std::result::Result<T, SqlError>;
