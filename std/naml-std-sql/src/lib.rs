///
/// naml SQL Database Support
///
/// A driver model in three levels. An environment is opened for a driver
/// name and opens connections; a connection executes SQL and controls
/// transactions; a query execution yields a cursor that steps through the
/// result one row at a time.
///
/// Architecture:
/// - `driver` defines the traits every backend implements, plus the fetch
///   targets rows are written into.
/// - `sqlite3` is the SQLite3 backend (rusqlite with bundled SQLite).
/// - `bindings` exports the C ABI naml code links to. Objects live in
///   per-thread handle registries and naml code holds i64 handles.
/// - Errors come in two channels: SQLite failures are returned as values,
///   misuse (closed objects, open cursors, bad handles) raises a DBError.
///
/// Lifetimes: a connection keeps its environment alive and a cursor keeps its
/// connection alive, so objects may be released in any order. A connection
/// refuses to close while cursors on it are open.
///

pub mod bindings;
pub mod config;
pub mod driver;
pub mod error;
pub mod sqlite3;
pub mod value;

pub use config::DriverConfig;
pub use driver::{
    Connection, Cursor, DriverInfo, Environment, Execution, FetchMode, Record, RowTarget,
};
pub use error::{Result, SqlError};
pub use sqlite3::{Sqlite3Connection, Sqlite3Cursor, Sqlite3Environment};
pub use value::{ColumnType, SqlValue};

/// Drivers this build knows about.
pub const DRIVERS: &[&DriverInfo] = &[&sqlite3::INFO];

/// Opens an environment for `driver` with the default configuration.
pub fn open(driver: &str) -> Result<Sqlite3Environment> {
    open_with_config(driver, DriverConfig::default())
}

pub fn open_with_config(driver: &str, config: DriverConfig) -> Result<Sqlite3Environment> {
    match driver {
        "sqlite3" => Ok(sqlite3::open_with_config(config)),
        other => Err(SqlError::UnknownDriver(other.to_string())),
    }
}

pub fn driver_info(driver: &str) -> Option<&'static DriverInfo> {
    DRIVERS.iter().copied().find(|info| info.name == driver)
}
