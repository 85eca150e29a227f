//! Schema migration runner.
//!
//! # Responsibility
//! - Hold the ordered list of schema scripts shipped with this build.
//! - Bring any older database up to the latest version in one transaction.
//!
//! # Invariants
//! - Registry versions increase strictly; `PRAGMA user_version` records the
//!   last applied script.
//! - A database stamped newer than this build is refused, never downgraded.
//! - Seed rows (the section catalog) ship inside the script that creates
//!   their table, so a fresh database is usable immediately.
//!
//! # See also
//! - docs/architecture/data-model.md

use crate::db::{DbError, DbResult};
use rusqlite::Connection;

struct Migration {
    version: u32,
    script: &'static str,
}

const REGISTRY: [Migration; 3] = [
    Migration {
        version: 1,
        script: include_str!("0001_init.sql"),
    },
    Migration {
        version: 2,
        script: include_str!("0002_requests.sql"),
    },
    Migration {
        version: 3,
        script: include_str!("0003_project_notes.sql"),
    },
];

/// Returns the newest schema version this build understands.
pub fn latest_version() -> u32 {
    REGISTRY
        .iter()
        .map(|migration| migration.version)
        .max()
        .unwrap_or(0)
}

/// Runs every script newer than the database's recorded version.
pub fn apply_migrations(conn: &mut Connection) -> DbResult<()> {
    let installed = installed_version(conn)?;
    let latest = latest_version();

    if installed > latest {
        return Err(DbError::UnsupportedSchemaVersion {
            db_version: installed,
            latest_supported: latest,
        });
    }

    let pending: Vec<&Migration> = REGISTRY
        .iter()
        .filter(|migration| migration.version > installed)
        .collect();
    if pending.is_empty() {
        return Ok(());
    }

    // One transaction for the whole batch; a failed script leaves the file
    // at the previously recorded user_version.
    let tx = conn.transaction()?;
    for migration in pending {
        tx.execute_batch(migration.script)?;
        tx.execute_batch(&format!("PRAGMA user_version = {};", migration.version))?;
    }
    tx.commit()?;

    Ok(())
}

fn installed_version(conn: &Connection) -> DbResult<u32> {
    Ok(conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?)
}
