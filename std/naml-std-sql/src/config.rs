///
/// # Driver Configuration
///
/// Settings an environment applies to every connection it opens. They are
/// read from a TOML file; every key is optional and falls back to the
/// defaults below.
///
/// ## Example
///
/// ```toml
/// busy_timeout_ms = 2000
/// read_only = false
/// create = true
/// uri = true
/// error_prefix = "naml.sql: "
/// ```
///

use std::path::Path;
use std::time::Duration;

use rusqlite::OpenFlags;
use serde::{Deserialize, Serialize};

use crate::error::{Result, SqlError};

pub const DEFAULT_ERROR_PREFIX: &str = "naml.sql: ";

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct DriverConfig {
    /// Busy timeout used when `connect` is not given one.
    pub busy_timeout_ms: Option<u64>,
    pub read_only: bool,
    /// Create the database file when it does not exist (ignored when read-only).
    pub create: bool,
    /// Accept `file:` URIs as data sources.
    pub uri: bool,
    /// Prepended to error messages handed to naml code.
    pub error_prefix: String,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            busy_timeout_ms: None,
            read_only: false,
            create: true,
            uri: true,
            error_prefix: DEFAULT_ERROR_PREFIX.to_string(),
        }
    }
}

impl DriverConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| SqlError::Config {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        Self::parse(&content, &path.display().to_string())
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        Self::parse(content, "<inline>")
    }

    fn parse(content: &str, origin: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e: toml::de::Error| SqlError::Config {
            path: origin.to_string(),
            reason: e.message().to_string(),
        })
    }

    pub fn open_flags(&self) -> OpenFlags {
        let mut flags = OpenFlags::SQLITE_OPEN_NO_MUTEX;
        if self.read_only {
            flags |= OpenFlags::SQLITE_OPEN_READ_ONLY;
        } else {
            flags |= OpenFlags::SQLITE_OPEN_READ_WRITE;
            if self.create {
                flags |= OpenFlags::SQLITE_OPEN_CREATE;
            }
        }
        if self.uri {
            flags |= OpenFlags::SQLITE_OPEN_URI;
        }
        flags
    }

    pub fn busy_timeout(&self) -> Option<Duration> {
        self.busy_timeout_ms.map(Duration::from_millis)
    }
}
