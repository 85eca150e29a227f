//! Arrangement repository and the ordering reconciliation algorithm.
//!
//! # Responsibility
//! - Maintain the ordered entry rows backing each project's arrangement.
//! - Diff a client-declared desired ordering against persisted state and
//!   apply the resulting removals, repositions, and inserts in one
//!   transaction.
//!
//! # Invariants
//! - Listing is deterministic: `position ASC, id ASC`.
//! - Every mutation re-stamps the owning project's `updated_at`.
//! - Reconciliation applies removals before repositions and inserts, and
//!   never leaves a project with zero entries; a blank placeholder row is
//!   inserted when the desired ordering empties the set.
//! - Reconciliation is full-replace: the last submitted ordering wins at
//!   entry granularity, no merge of concurrent edits is attempted.
//!
//! # See also
//! - docs/architecture/data-model.md

use crate::db::DbError;
use crate::model::arrangement::{ArrangementEntry, ArrangementRow, DesiredEntry, EntryId, SectionId};
use crate::model::project::ProjectId;
use crate::repo::project_repo::{project_exists, touch_project};
use crate::repo::{schema_version_gap, ErrorKind};
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction, TransactionBehavior};
use std::collections::BTreeSet;
use std::error::Error;
use std::fmt::{Display, Formatter};

const ENTRY_SELECT_SQL: &str = "SELECT
    id,
    project_id,
    section_id,
    position,
    updated_at
FROM arrangements";

pub type ArrangementRepoResult<T> = Result<T, ArrangementRepoError>;

/// Repository error for arrangement entry operations.
#[derive(Debug)]
pub enum ArrangementRepoError {
    Db(DbError),
    /// Project has zero entry rows; valid projects always hold at least a
    /// blank placeholder.
    ArrangementNotFound(ProjectId),
    /// Removal target does not exist.
    EntryNotFound(EntryId),
    /// Reposition target does not exist; surfaced as invalid input per the
    /// update contract.
    RepositionTargetMissing(EntryId),
    /// Insert referenced an unknown project.
    UnknownProject(ProjectId),
    /// Insert referenced an unknown section.
    UnknownSection(SectionId),
    /// Positions must be non-negative.
    InvalidPosition(i64),
    /// Connection is missing schema migrations.
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
}

impl ArrangementRepoError {
    /// Coarse classification for transport adapters.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Db(_) => ErrorKind::Internal,
            Self::ArrangementNotFound(_) => ErrorKind::NotFound,
            Self::EntryNotFound(_) => ErrorKind::NotFound,
            Self::RepositionTargetMissing(_) => ErrorKind::BadRequest,
            Self::UnknownProject(_) => ErrorKind::BadRequest,
            Self::UnknownSection(_) => ErrorKind::BadRequest,
            Self::InvalidPosition(_) => ErrorKind::BadRequest,
            Self::UninitializedConnection { .. } => ErrorKind::Internal,
        }
    }
}

impl Display for ArrangementRepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::ArrangementNotFound(id) => write!(f, "no arrangement entries for project {id}"),
            Self::EntryNotFound(id) => write!(f, "arrangement entry not found: {id}"),
            Self::RepositionTargetMissing(id) => {
                write!(f, "cannot reposition unknown arrangement entry {id}")
            }
            Self::UnknownProject(id) => write!(f, "arrangement references unknown project {id}"),
            Self::UnknownSection(id) => write!(f, "arrangement references unknown section {id}"),
            Self::InvalidPosition(position) => {
                write!(f, "arrangement position must be non-negative, got {position}")
            }
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "arrangement repository requires schema version {expected_version}, got {actual_version}"
            ),
        }
    }
}

impl Error for ArrangementRepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for ArrangementRepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for ArrangementRepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Mutation set that transforms a persisted ordering into a desired one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcilePlan {
    /// Entry ids persisted but absent from the desired ordering.
    pub removals: Vec<EntryId>,
    /// `(entry id, new position)` for entries present on both sides.
    pub repositions: Vec<(EntryId, i64)>,
    /// `(section reference, position)` for desired elements without an id.
    pub inserts: Vec<(Option<SectionId>, i64)>,
}

/// Diffs the persisted ordering against the client-declared one.
///
/// Anything persisted but missing from `desired` is deletion-by-omission.
/// A desired id unknown to the persisted set is a stale echo of another
/// client's edit and is skipped without creating or erroring.
pub fn plan_reconcile(current: &[ArrangementRow], desired: &[DesiredEntry]) -> ReconcilePlan {
    let current_ids: BTreeSet<EntryId> = current.iter().map(|row| row.id).collect();
    let desired_ids: BTreeSet<EntryId> = desired.iter().filter_map(|element| element.id).collect();

    let mut plan = ReconcilePlan::default();
    for id in current_ids.difference(&desired_ids) {
        plan.removals.push(*id);
    }

    for element in desired {
        match element.id {
            Some(id) if current_ids.contains(&id) => {
                plan.repositions.push((id, element.position));
            }
            Some(_) => {}
            None => plan.inserts.push((element.section_id, element.position)),
        }
    }

    plan
}

/// Repository interface for arrangement entry mutations.
pub trait ArrangementRepository {
    fn create_blank(&self, project_id: ProjectId) -> ArrangementRepoResult<ArrangementEntry>;
    fn add_entry(
        &self,
        project_id: ProjectId,
        section_id: Option<SectionId>,
        position: i64,
    ) -> ArrangementRepoResult<ArrangementEntry>;
    fn reposition_entry(
        &self,
        entry_id: EntryId,
        new_position: i64,
    ) -> ArrangementRepoResult<ArrangementEntry>;
    fn list_for_project(&self, project_id: ProjectId) -> ArrangementRepoResult<Vec<ArrangementRow>>;
    fn remove_entry(&self, entry_id: EntryId) -> ArrangementRepoResult<()>;
    fn clear(&self, project_id: ProjectId) -> ArrangementRepoResult<ArrangementEntry>;
    fn reconcile(
        &self,
        project_id: ProjectId,
        desired: &[DesiredEntry],
    ) -> ArrangementRepoResult<Vec<ArrangementRow>>;
}

/// SQLite-backed arrangement repository.
pub struct SqliteArrangementRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteArrangementRepository<'conn> {
    /// Creates the repository, verifying the connection is migrated.
    pub fn try_new(conn: &'conn Connection) -> ArrangementRepoResult<Self> {
        if let Some(gap) = schema_version_gap(conn)? {
            return Err(ArrangementRepoError::UninitializedConnection {
                expected_version: gap.expected_version,
                actual_version: gap.actual_version,
            });
        }
        Ok(Self { conn })
    }
}

impl ArrangementRepository for SqliteArrangementRepository<'_> {
    fn create_blank(&self, project_id: ProjectId) -> ArrangementRepoResult<ArrangementEntry> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        if !project_exists(&tx, project_id)? {
            return Err(ArrangementRepoError::UnknownProject(project_id));
        }

        tx.execute(
            "INSERT INTO arrangements (project_id) VALUES (?1);",
            [project_id],
        )?;
        let entry_id = tx.last_insert_rowid();
        touch_project(&tx, project_id)?;

        let entry =
            get_entry(&tx, entry_id)?.ok_or(ArrangementRepoError::EntryNotFound(entry_id))?;
        tx.commit()?;
        Ok(entry)
    }

    fn add_entry(
        &self,
        project_id: ProjectId,
        section_id: Option<SectionId>,
        position: i64,
    ) -> ArrangementRepoResult<ArrangementEntry> {
        if position < 0 {
            return Err(ArrangementRepoError::InvalidPosition(position));
        }

        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        if !project_exists(&tx, project_id)? {
            return Err(ArrangementRepoError::UnknownProject(project_id));
        }
        if let Some(section_id) = section_id {
            if !section_exists(&tx, section_id)? {
                return Err(ArrangementRepoError::UnknownSection(section_id));
            }
        }

        tx.execute(
            "INSERT INTO arrangements (project_id, section_id, position) VALUES (?1, ?2, ?3);",
            params![project_id, section_id, position],
        )?;
        let entry_id = tx.last_insert_rowid();
        touch_project(&tx, project_id)?;

        let entry =
            get_entry(&tx, entry_id)?.ok_or(ArrangementRepoError::EntryNotFound(entry_id))?;
        tx.commit()?;
        Ok(entry)
    }

    fn reposition_entry(
        &self,
        entry_id: EntryId,
        new_position: i64,
    ) -> ArrangementRepoResult<ArrangementEntry> {
        if new_position < 0 {
            return Err(ArrangementRepoError::InvalidPosition(new_position));
        }

        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let project_id = tx
            .query_row(
                "SELECT project_id FROM arrangements WHERE id = ?1;",
                [entry_id],
                |row| row.get::<_, ProjectId>(0),
            )
            .optional()?;
        let Some(project_id) = project_id else {
            return Err(ArrangementRepoError::RepositionTargetMissing(entry_id));
        };

        tx.execute(
            "UPDATE arrangements
             SET position = ?1, updated_at = (strftime('%s', 'now') * 1000)
             WHERE id = ?2;",
            params![new_position, entry_id],
        )?;
        touch_project(&tx, project_id)?;

        let entry = get_entry(&tx, entry_id)?
            .ok_or(ArrangementRepoError::RepositionTargetMissing(entry_id))?;
        tx.commit()?;
        Ok(entry)
    }

    fn list_for_project(
        &self,
        project_id: ProjectId,
    ) -> ArrangementRepoResult<Vec<ArrangementRow>> {
        let rows = list_rows(self.conn, project_id)?;
        if rows.is_empty() {
            return Err(ArrangementRepoError::ArrangementNotFound(project_id));
        }
        Ok(rows)
    }

    fn remove_entry(&self, entry_id: EntryId) -> ArrangementRepoResult<()> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let project_id = tx
            .query_row(
                "SELECT project_id FROM arrangements WHERE id = ?1;",
                [entry_id],
                |row| row.get::<_, ProjectId>(0),
            )
            .optional()?;
        let Some(project_id) = project_id else {
            return Err(ArrangementRepoError::EntryNotFound(entry_id));
        };

        tx.execute("DELETE FROM arrangements WHERE id = ?1;", [entry_id])?;
        touch_project(&tx, project_id)?;
        tx.commit()?;
        Ok(())
    }

    fn clear(&self, project_id: ProjectId) -> ArrangementRepoResult<ArrangementEntry> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let removed = tx.execute(
            "DELETE FROM arrangements WHERE project_id = ?1;",
            [project_id],
        )?;
        if removed == 0 {
            return Err(ArrangementRepoError::ArrangementNotFound(project_id));
        }

        tx.execute(
            "INSERT INTO arrangements (project_id) VALUES (?1);",
            [project_id],
        )?;
        let entry_id = tx.last_insert_rowid();
        touch_project(&tx, project_id)?;

        let entry =
            get_entry(&tx, entry_id)?.ok_or(ArrangementRepoError::EntryNotFound(entry_id))?;
        tx.commit()?;
        Ok(entry)
    }

    fn reconcile(
        &self,
        project_id: ProjectId,
        desired: &[DesiredEntry],
    ) -> ArrangementRepoResult<Vec<ArrangementRow>> {
        if let Some(element) = desired.iter().find(|element| element.position < 0) {
            return Err(ArrangementRepoError::InvalidPosition(element.position));
        }

        // One transaction spans the current-state read through the final
        // write so a concurrent reconcile cannot interleave with the diff.
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let current = list_rows(&tx, project_id)?;
        if current.is_empty() {
            return Err(ArrangementRepoError::ArrangementNotFound(project_id));
        }

        let plan = plan_reconcile(&current, desired);

        for entry_id in &plan.removals {
            tx.execute("DELETE FROM arrangements WHERE id = ?1;", [*entry_id])?;
        }
        for (entry_id, position) in &plan.repositions {
            tx.execute(
                "UPDATE arrangements
                 SET position = ?1, updated_at = (strftime('%s', 'now') * 1000)
                 WHERE id = ?2;",
                params![*position, *entry_id],
            )?;
        }
        for (section_id, position) in &plan.inserts {
            if let Some(section_id) = section_id {
                if !section_exists(&tx, *section_id)? {
                    return Err(ArrangementRepoError::UnknownSection(*section_id));
                }
            }
            tx.execute(
                "INSERT INTO arrangements (project_id, section_id, position) VALUES (?1, ?2, ?3);",
                params![project_id, section_id, position],
            )?;
        }

        let survivors: i64 = tx.query_row(
            "SELECT COUNT(*) FROM arrangements WHERE project_id = ?1;",
            [project_id],
            |row| row.get(0),
        )?;
        if survivors == 0 {
            tx.execute(
                "INSERT INTO arrangements (project_id) VALUES (?1);",
                [project_id],
            )?;
        }

        touch_project(&tx, project_id)?;
        let rows = list_rows(&tx, project_id)?;
        tx.commit()?;
        Ok(rows)
    }
}

fn list_rows(conn: &Connection, project_id: ProjectId) -> ArrangementRepoResult<Vec<ArrangementRow>> {
    let mut stmt = conn.prepare(
        "SELECT a.id AS id, a.section_id AS section_id, s.name AS section_name,
                a.position AS position
         FROM arrangements a
         LEFT JOIN sections s ON s.id = a.section_id
         WHERE a.project_id = ?1
         ORDER BY a.position ASC, a.id ASC;",
    )?;
    let mut rows = stmt.query([project_id])?;
    let mut entries = Vec::new();
    while let Some(row) = rows.next()? {
        entries.push(parse_arrangement_row(row)?);
    }
    Ok(entries)
}

fn get_entry(conn: &Connection, entry_id: EntryId) -> ArrangementRepoResult<Option<ArrangementEntry>> {
    let mut stmt = conn.prepare(&format!("{ENTRY_SELECT_SQL} WHERE id = ?1;"))?;
    let mut rows = stmt.query([entry_id])?;
    if let Some(row) = rows.next()? {
        return Ok(Some(parse_entry_row(row)?));
    }
    Ok(None)
}

fn parse_entry_row(row: &Row<'_>) -> ArrangementRepoResult<ArrangementEntry> {
    Ok(ArrangementEntry {
        id: row.get("id")?,
        project_id: row.get("project_id")?,
        section_id: row.get("section_id")?,
        position: row.get("position")?,
        updated_at: row.get("updated_at")?,
    })
}

fn parse_arrangement_row(row: &Row<'_>) -> ArrangementRepoResult<ArrangementRow> {
    Ok(ArrangementRow {
        id: row.get("id")?,
        section_id: row.get("section_id")?,
        section_name: row.get("section_name")?,
        position: row.get("position")?,
    })
}

fn section_exists(conn: &Connection, section_id: SectionId) -> rusqlite::Result<bool> {
    conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM sections WHERE id = ?1);",
        [section_id],
        |row| row.get(0),
    )
}
