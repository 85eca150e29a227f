//! SQLite connection factory.
//!
//! # Responsibility
//! - Open file-backed or in-memory connections.
//! - Enforce connection pragmas and bring the schema up to date before a
//!   connection is handed out.
//!
//! # Invariants
//! - Every returned connection has `foreign_keys=ON`; project removal relies
//!   on declared cascades for cowrites, arrangements, and requests.
//! - Every returned connection is fully migrated.
//!
//! # See also
//! - docs/architecture/data-model.md

use super::migrations::apply_migrations;
use super::{DbError, DbResult};
use log::{error, info};
use rusqlite::Connection;
use std::path::Path;
use std::time::{Duration, Instant};

/// Opens (or creates) the database file at `path` and migrates it.
///
/// # Side effects
/// - Emits `db_open` logging events with mode, duration, and status.
pub fn open_db(path: impl AsRef<Path>) -> DbResult<Connection> {
    prepare("file", || Connection::open(path))
}

/// Opens a private in-memory database and migrates it.
///
/// Backs the test suites and the CLI demo flow; behavior otherwise matches
/// [`open_db`].
pub fn open_db_in_memory() -> DbResult<Connection> {
    prepare("memory", Connection::open_in_memory)
}

fn prepare(
    mode: &'static str,
    open: impl FnOnce() -> rusqlite::Result<Connection>,
) -> DbResult<Connection> {
    let started_at = Instant::now();
    info!("event=db_open module=db status=start mode={mode}");

    let outcome = open()
        .map_err(|err| ("db_open_failed", DbError::from(err)))
        .and_then(|mut conn| match configure(&mut conn) {
            Ok(()) => Ok(conn),
            Err(err) => Err(("db_bootstrap_failed", err)),
        });

    match outcome {
        Ok(conn) => {
            info!(
                "event=db_open module=db status=ok mode={mode} duration_ms={}",
                started_at.elapsed().as_millis()
            );
            Ok(conn)
        }
        Err((error_code, err)) => {
            error!(
                "event=db_open module=db status=error mode={mode} duration_ms={} error_code={error_code} error={err}",
                started_at.elapsed().as_millis()
            );
            Err(err)
        }
    }
}

fn configure(conn: &mut Connection) -> DbResult<()> {
    // Cascade deletes for cowrites, arrangements, and requests need this on
    // every connection; SQLite ships with it off.
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(Duration::from_secs(5))?;
    apply_migrations(conn)
}
