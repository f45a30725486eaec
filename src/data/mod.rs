pub mod migrations;
pub mod repository;

use std::path::Path;

use rusqlite::Connection;

use crate::error::AppError;

/// Opens (creating if needed) the store at `path` and brings its schema up to date.
pub fn open_store(path: &Path) -> Result<Connection, AppError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let conn = Connection::open(path)?;
    conn.busy_timeout(std::time::Duration::from_secs(5))?;
    migrations::run_migrations(&conn)?;
    Ok(conn)
}
