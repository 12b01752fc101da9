use std::path::Path;
use std::rc::Rc;
use std::time::Duration;

use naml_std_core::{naml_string_from, string_from_naml, NamlString};
use tracing::debug;

use super::{
    lookup, raise, raise_lookup, register, release, report, write_out, CONNECTIONS,
    ENVIRONMENTS, OUT_OK, OUT_RAISED,
};
use crate::config::DriverConfig;
use crate::driver::Environment;
use crate::sqlite3;

fn open_env(driver: &str, config: DriverConfig) -> i64 {
    let prefix: Rc<str> = Rc::from(config.error_prefix.as_str());
    match crate::open_with_config(driver, config) {
        Ok(env) => {
            let handle = register(&ENVIRONMENTS, env, prefix);
            debug!(driver, handle, "environment opened");
            handle
        }
        Err(e) => {
            raise(&e, &prefix);
            0
        }
    }
}

/// Open an environment for `driver` ("sqlite3"). Returns 0 and raises for an
/// unknown driver.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn naml_sql_open(driver: *const NamlString) -> i64 {
    let driver = unsafe { string_from_naml(driver) };
    open_env(&driver, DriverConfig::default())
}

/// Open an environment configured from the TOML file at `config_path`
#[unsafe(no_mangle)]
pub unsafe extern "C" fn naml_sql_open_with_config(
    driver: *const NamlString,
    config_path: *const NamlString,
) -> i64 {
    let driver = unsafe { string_from_naml(driver) };
    let path = unsafe { string_from_naml(config_path) };
    match DriverConfig::load(Path::new(&path)) {
        Ok(config) => open_env(&driver, config),
        Err(e) => {
            raise_lookup(&e);
            0
        }
    }
}

/// One-line description of a driver, including the linked SQLite version
#[unsafe(no_mangle)]
pub unsafe extern "C" fn naml_sql_driver_info(driver: *const NamlString) -> *mut NamlString {
    let driver = unsafe { string_from_naml(driver) };
    match crate::driver_info(&driver) {
        Some(info) => naml_string_from(&format!(
            "{} {} (SQLite {}). {}",
            info.description,
            info.version,
            sqlite3::native_version(),
            info.copyright
        )),
        None => {
            raise_lookup(&crate::SqlError::UnknownDriver(driver));
            std::ptr::null_mut()
        }
    }
}

/// Connect to `source`. A negative `timeout_ms` means none was given and
/// the environment's configured busy timeout applies.
///
/// On success `out_value` is the connection handle.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn naml_sql_env_connect(
    env: i64,
    source: *const NamlString,
    timeout_ms: i64,
    out_tag: *mut i32,
    out_value: *mut i64,
) {
    let (env, prefix) = match lookup(&ENVIRONMENTS, env) {
        Ok(found) => found,
        Err(e) => {
            raise_lookup(&e);
            unsafe { write_out(out_tag, out_value, OUT_RAISED, 0) };
            return;
        }
    };
    let source = unsafe { string_from_naml(source) };
    let timeout = u64::try_from(timeout_ms).ok().map(Duration::from_millis);

    match env.connect(&source, timeout) {
        Ok(conn) => {
            let handle = register(&CONNECTIONS, conn, Rc::clone(&prefix));
            unsafe { write_out(out_tag, out_value, OUT_OK, handle) };
        }
        Err(e) => unsafe { report(e, &prefix, out_tag, out_value) },
    }
}

/// Close an environment. Returns 1, or 0 when it was already closed.
#[unsafe(no_mangle)]
pub extern "C" fn naml_sql_env_close(env: i64) -> i64 {
    match lookup(&ENVIRONMENTS, env) {
        Ok((env, _)) => env.close() as i64,
        Err(e) => {
            raise_lookup(&e);
            0
        }
    }
}

/// Drop the handle. Connections opened from it stay usable.
#[unsafe(no_mangle)]
pub extern "C" fn naml_sql_env_release(env: i64) -> i64 {
    release(&ENVIRONMENTS, env) as i64
}
