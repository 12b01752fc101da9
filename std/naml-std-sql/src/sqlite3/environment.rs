use std::cell::Cell;
use std::fmt;
use std::rc::Rc;
use std::time::Duration;

use tracing::debug;

use crate::config::DriverConfig;
use crate::driver::{DriverInfo, Environment};
use crate::error::{Result, SqlError};
use crate::sqlite3::{Sqlite3Connection, INFO};

struct EnvState {
    closed: Cell<bool>,
    config: DriverConfig,
}

/// SQLite3 environment. Cloning shares the same environment.
#[derive(Clone)]
pub struct Sqlite3Environment {
    state: Rc<EnvState>,
}

impl Sqlite3Environment {
    pub fn new() -> Self {
        Self::with_config(DriverConfig::default())
    }

    pub fn with_config(config: DriverConfig) -> Self {
        Self {
            state: Rc::new(EnvState {
                closed: Cell::new(false),
                config,
            }),
        }
    }

    pub fn config(&self) -> &DriverConfig {
        &self.state.config
    }
}

impl fmt::Debug for Sqlite3Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sqlite3Environment")
            .field("closed", &self.state.closed.get())
            .finish()
    }
}

impl Default for Sqlite3Environment {
    fn default() -> Self {
        Self::new()
    }
}

impl Environment for Sqlite3Environment {
    type Connection = Sqlite3Connection;

    fn info(&self) -> &'static DriverInfo {
        &INFO
    }

    fn connect(&self, source: &str, timeout: Option<Duration>) -> Result<Sqlite3Connection> {
        if self.is_closed() {
            return Err(SqlError::EnvironmentClosed);
        }

        // rusqlite closes the handle itself when the open fails
        let db = rusqlite::Connection::open_with_flags(source, self.state.config.open_flags())?;
        if let Some(timeout) = timeout.or_else(|| self.state.config.busy_timeout()) {
            db.busy_timeout(timeout)?;
        }

        debug!(source, ?timeout, "sqlite3 connection opened");
        Ok(Sqlite3Connection::new(self.clone(), db))
    }

    fn close(&self) -> bool {
        if self.state.closed.replace(true) {
            return false;
        }
        debug!("sqlite3 environment closed");
        true
    }

    fn is_closed(&self) -> bool {
        self.state.closed.get()
    }
}
