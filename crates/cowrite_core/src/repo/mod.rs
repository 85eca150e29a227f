//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define use-case oriented data access contracts for projects,
//!   arrangements, requests, and the supporting user/section tables.
//! - Isolate SQLite query and transaction details from service
//!   orchestration.
//!
//! # Invariants
//! - Repository APIs return semantic errors; raw storage errors never cross
//!   the service boundary unclassified.
//! - Multi-step mutations (project creation, reconciliation, accept, leave)
//!   run inside one immediate transaction each.
//!
//! # See also
//! - docs/architecture/data-model.md

use crate::db::migrations::latest_version;
use rusqlite::Connection;

pub mod arrangement_repo;
pub mod project_repo;
pub mod request_repo;
pub mod section_repo;
pub mod user_repo;

/// Coarse error classification shared by every repository and gate error.
///
/// Transport adapters map these to their status vocabulary without
/// pattern-matching repository internals: `NotFound` for absent entities,
/// `BadRequest` for malformed input, invalid references, and invalid state
/// transitions, `Unauthorized` for failed access predicates, and `Internal`
/// for storage transport failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    BadRequest,
    Unauthorized,
    Internal,
}

impl ErrorKind {
    /// Stable lowercase label for logs and diagnostics.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NotFound => "not_found",
            Self::BadRequest => "bad_request",
            Self::Unauthorized => "unauthorized",
            Self::Internal => "internal",
        }
    }
}

/// Version gap found when a connection has not been fully migrated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchemaGap {
    pub expected_version: u32,
    pub actual_version: u32,
}

/// Returns the migration gap for `conn`, if any.
///
/// Repositories call this from `try_new` so that an unmigrated connection is
/// rejected up front instead of failing on the first query.
pub(crate) fn schema_version_gap(conn: &Connection) -> rusqlite::Result<Option<SchemaGap>> {
    let actual_version: u32 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
    let expected_version = latest_version();
    if actual_version == expected_version {
        Ok(None)
    } else {
        Ok(Some(SchemaGap {
            expected_version,
            actual_version,
        }))
    }
}
