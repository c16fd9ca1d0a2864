//! Database connection management
//!
//! Opens the backing SQLite database with the sqlite-vec extension loaded
//! and the pragmas the store relies on (WAL journal, NORMAL sync).

use std::path::Path;
use std::sync::Once;

use rusqlite::Connection;

use crate::error::{RecallError, Result};

static REGISTER: Once = Once::new();

/// Register sqlite-vec with SQLite's auto-extension hook.
///
/// Must run before the first connection is opened; every connection opened
/// afterwards sees the vec0 module. Process-wide, hence the `Once`.
fn register_sqlite_vec_extension() -> Result<()> {
    let mut rc = rusqlite::ffi::SQLITE_OK;
    REGISTER.call_once(|| unsafe {
        // The extension entry point has a C signature rusqlite doesn't know,
        // so the cast goes through transmute.
        rc = rusqlite::ffi::sqlite3_auto_extension(Some(std::mem::transmute(
            sqlite_vec::sqlite3_vec_init as *const (),
        )));
    });

    if rc != rusqlite::ffi::SQLITE_OK {
        return Err(RecallError::StorageInit(
            "failed to register sqlite-vec extension".to_string(),
        ));
    }

    Ok(())
}

/// Open (creating if necessary) the database at `db_path`.
pub fn open_database(db_path: &Path) -> Result<Connection> {
    register_sqlite_vec_extension()?;

    if let Some(db_dir) = db_path.parent() {
        if !db_dir.as_os_str().is_empty() {
            std::fs::create_dir_all(db_dir)
                .map_err(|e| RecallError::StorageInit(format!("{}: {}", db_dir.display(), e)))?;
        }
    }

    let conn = Connection::open(db_path)
        .map_err(|e| RecallError::StorageInit(format!("{}: {}", db_path.display(), e)))?;

    // WAL mode for concurrent readers, NORMAL sync as the steady-state
    // durability level. Operations that promise a flush checkpoint the WAL
    // themselves.
    conn.pragma_update(None, "journal_mode", WAL)?;
    conn.pragma_update(None, "foreign_keys", ON)?;
    conn.pragma_update(None, "synchronous", NORMAL)?;

    let vec_version: String = conn
        .query_row("SELECT vec_version()", [], |row| row.get(0))
        .map_err(|e| {
            RecallError::StorageInit(format!("sqlite-vec extension unavailable: {}", e))
        })?;
    tracing::debug!("Connected to {} (sqlite-vec {})", db_path.display(), vec_version);

    Ok(conn)
}

// SQL pragma constants
const WAL: &str = "WAL";
const ON: &str = "ON";
const NORMAL: &str = "NORMAL";
