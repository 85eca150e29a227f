//! Section catalog persistence.
//!
//! # Responsibility
//! - Serve the shared, read-mostly catalog of song section labels that
//!   arrangement entries reference.
//!
//! # Invariants
//! - Catalog listing is deterministic: `id ASC`.
//! - Section names are unique; the catalog is seeded by migration and only
//!   ever grows.

use crate::db::DbError;
use crate::model::arrangement::{Section, SectionId};
use crate::repo::{schema_version_gap, ErrorKind};
use rusqlite::{Connection, OptionalExtension, Row};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type SectionRepoResult<T> = Result<T, SectionRepoError>;

/// Repository error for section catalog lookups.
#[derive(Debug)]
pub enum SectionRepoError {
    Db(DbError),
    SectionNotFound(SectionId),
    /// Schema on this connection is out of date.
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
}

impl SectionRepoError {
    /// Coarse classification for transport adapters.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Db(_) => ErrorKind::Internal,
            Self::SectionNotFound(_) => ErrorKind::NotFound,
            Self::UninitializedConnection { .. } => ErrorKind::Internal,
        }
    }
}

impl Display for SectionRepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::SectionNotFound(id) => write!(f, "section not found: {id}"),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "section repository requires schema version {expected_version}, got {actual_version}"
            ),
        }
    }
}

impl Error for SectionRepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for SectionRepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for SectionRepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// SQLite-backed section catalog repository.
pub struct SqliteSectionRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteSectionRepository<'conn> {
    /// Binds to a migrated connection.
    pub fn try_new(conn: &'conn Connection) -> SectionRepoResult<Self> {
        if let Some(gap) = schema_version_gap(conn)? {
            return Err(SectionRepoError::UninitializedConnection {
                expected_version: gap.expected_version,
                actual_version: gap.actual_version,
            });
        }
        Ok(Self { conn })
    }

    /// Lists the whole catalog in id order.
    pub fn list_sections(&self) -> SectionRepoResult<Vec<Section>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, name FROM sections ORDER BY id ASC;")?;
        let mut rows = stmt.query([])?;
        let mut sections = Vec::new();
        while let Some(row) = rows.next()? {
            sections.push(parse_section_row(row)?);
        }
        Ok(sections)
    }

    /// Fetches one catalog entry by id.
    pub fn get_section(&self, id: SectionId) -> SectionRepoResult<Section> {
        self.conn
            .query_row("SELECT id, name FROM sections WHERE id = ?1;", [id], |row| {
                Ok(Section {
                    id: row.get("id")?,
                    name: row.get("name")?,
                })
            })
            .optional()?
            .ok_or(SectionRepoError::SectionNotFound(id))
    }
}

fn parse_section_row(row: &Row<'_>) -> SectionRepoResult<Section> {
    Ok(Section {
        id: row.get("id")?,
        name: row.get("name")?,
    })
}
