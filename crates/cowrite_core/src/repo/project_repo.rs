//! Project repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Provide project record CRUD plus the membership-aware leave operation.
//! - Own the `updated_at` touch helper every other mutation path calls.
//!
//! # Invariants
//! - Creation writes the project row, its owner membership, and one blank
//!   arrangement entry inside a single immediate transaction.
//! - Leaving as the owner dissolves the whole project; leaving as a
//!   contributor removes one membership and withdraws pending invitations
//!   addressed to the leaver.
//! - Any update path re-stamps `updated_at`, even when no fields changed.
//!
//! # See also
//! - docs/architecture/data-model.md

use crate::db::DbError;
use crate::model::project::{
    Membership, Project, ProjectDetails, ProjectId, ProjectPatch, ProjectSummary, ProjectTag,
};
use crate::repo::user_repo::username_taken;
use crate::repo::{schema_version_gap, ErrorKind};
use rusqlite::types::Value;
use rusqlite::{
    params, params_from_iter, Connection, OptionalExtension, Row, Transaction, TransactionBehavior,
};
use std::error::Error;
use std::fmt::{Display, Formatter};

const PROJECT_SELECT_SQL: &str = "SELECT
    id,
    title,
    owner,
    notes,
    created_at,
    updated_at
FROM projects";

pub type ProjectRepoResult<T> = Result<T, ProjectRepoError>;

/// Repository error for project record operations.
#[derive(Debug)]
pub enum ProjectRepoError {
    Db(DbError),
    /// Target project does not exist.
    ProjectNotFound(ProjectId),
    /// Listing target user does not exist.
    UserNotFound(String),
    /// Creation referenced an unregistered owner.
    UnknownOwner(String),
    /// Leave target has no membership row for the given user.
    MembershipNotFound {
        project_id: ProjectId,
        username: String,
    },
    /// The connection's schema version does not match this build.
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    InvalidData(String),
}

impl ProjectRepoError {
    /// Coarse classification for transport adapters.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Db(_) => ErrorKind::Internal,
            Self::ProjectNotFound(_) => ErrorKind::NotFound,
            Self::UserNotFound(_) => ErrorKind::NotFound,
            Self::UnknownOwner(_) => ErrorKind::BadRequest,
            Self::MembershipNotFound { .. } => ErrorKind::BadRequest,
            Self::UninitializedConnection { .. } => ErrorKind::Internal,
            Self::InvalidData(_) => ErrorKind::Internal,
        }
    }
}

impl Display for ProjectRepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::ProjectNotFound(id) => write!(f, "project not found: {id}"),
            Self::UserNotFound(username) => write!(f, "user not found: {username}"),
            Self::UnknownOwner(username) => {
                write!(f, "project owner is not a registered user: {username}")
            }
            Self::MembershipNotFound {
                project_id,
                username,
            } => write!(f, "no membership for user {username} on project {project_id}"),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "project repository requires schema version {expected_version}, got {actual_version}"
            ),
            Self::InvalidData(message) => write!(f, "invalid persisted project data: {message}"),
        }
    }
}

impl Error for ProjectRepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for ProjectRepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for ProjectRepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Result of removing one member from a project.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeaveOutcome {
    /// The departing member owned the project; the record and all its
    /// dependents were deleted.
    ProjectDissolved,
    /// A contributor membership was removed and any pending invitations
    /// addressed to the departing member were withdrawn.
    MembershipRemoved { withdrawn_requests: usize },
}

/// Repository interface for project records and memberships.
pub trait ProjectRepository {
    fn create_project(&self, title: &str, owner: &str) -> ProjectRepoResult<Project>;
    fn get_project(&self, id: ProjectId) -> ProjectRepoResult<ProjectDetails>;
    fn get_summary(&self, id: ProjectId) -> ProjectRepoResult<ProjectSummary>;
    fn update_project(&self, id: ProjectId, patch: &ProjectPatch) -> ProjectRepoResult<Project>;
    fn remove_project(&self, id: ProjectId) -> ProjectRepoResult<()>;
    fn leave_project(&self, id: ProjectId, username: &str) -> ProjectRepoResult<LeaveOutcome>;
    fn projects_for_user(&self, username: &str) -> ProjectRepoResult<Vec<ProjectTag>>;
    fn memberships_for_project(&self, id: ProjectId) -> ProjectRepoResult<Vec<Membership>>;
}

/// SQLite-backed project repository.
pub struct SqliteProjectRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteProjectRepository<'conn> {
    /// Wraps a connection whose schema is up to date.
    pub fn try_new(conn: &'conn Connection) -> ProjectRepoResult<Self> {
        if let Some(gap) = schema_version_gap(conn)? {
            return Err(ProjectRepoError::UninitializedConnection {
                expected_version: gap.expected_version,
                actual_version: gap.actual_version,
            });
        }
        Ok(Self { conn })
    }
}

impl ProjectRepository for SqliteProjectRepository<'_> {
    fn create_project(&self, title: &str, owner: &str) -> ProjectRepoResult<Project> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        if !username_taken(&tx, owner)? {
            return Err(ProjectRepoError::UnknownOwner(owner.to_string()));
        }

        tx.execute(
            "INSERT INTO projects (title, owner) VALUES (?1, ?2);",
            params![title, owner],
        )?;
        let project_id = tx.last_insert_rowid();

        tx.execute(
            "INSERT INTO cowrites (project_id, username, is_owner) VALUES (?1, ?2, 1);",
            params![project_id, owner],
        )?;
        tx.execute(
            "INSERT INTO arrangements (project_id) VALUES (?1);",
            [project_id],
        )?;

        let project = get_project_record(&tx, project_id)?
            .ok_or(ProjectRepoError::ProjectNotFound(project_id))?;
        tx.commit()?;

        Ok(project)
    }

    fn get_project(&self, id: ProjectId) -> ProjectRepoResult<ProjectDetails> {
        let project =
            get_project_record(self.conn, id)?.ok_or(ProjectRepoError::ProjectNotFound(id))?;

        let mut stmt = self.conn.prepare(
            "SELECT username FROM cowrites WHERE project_id = ?1 ORDER BY username ASC;",
        )?;
        let mut rows = stmt.query([id])?;
        let mut contributors = Vec::new();
        while let Some(row) = rows.next()? {
            contributors.push(row.get("username")?);
        }

        Ok(ProjectDetails {
            id: project.id,
            title: project.title,
            owner: project.owner,
            notes: project.notes,
            created_at: project.created_at,
            updated_at: project.updated_at,
            contributors,
        })
    }

    fn get_summary(&self, id: ProjectId) -> ProjectRepoResult<ProjectSummary> {
        self.conn
            .query_row(
                "SELECT id, title, owner, updated_at FROM projects WHERE id = ?1;",
                [id],
                |row| {
                    Ok(ProjectSummary {
                        id: row.get("id")?,
                        title: row.get("title")?,
                        owner: row.get("owner")?,
                        updated_at: row.get("updated_at")?,
                    })
                },
            )
            .optional()?
            .ok_or(ProjectRepoError::ProjectNotFound(id))
    }

    fn update_project(&self, id: ProjectId, patch: &ProjectPatch) -> ProjectRepoResult<Project> {
        // The stamp applies even for an empty patch.
        let mut sql = String::from("UPDATE projects SET updated_at = (strftime('%s', 'now') * 1000)");
        let mut bind_values: Vec<Value> = Vec::new();

        if let Some(title) = &patch.title {
            sql.push_str(", title = ?");
            bind_values.push(Value::Text(title.clone()));
        }
        if let Some(notes) = &patch.notes {
            sql.push_str(", notes = ?");
            bind_values.push(Value::Text(notes.clone()));
        }

        sql.push_str(" WHERE id = ?;");
        bind_values.push(Value::Integer(id));

        let changed = self.conn.execute(&sql, params_from_iter(bind_values))?;
        if changed == 0 {
            return Err(ProjectRepoError::ProjectNotFound(id));
        }

        get_project_record(self.conn, id)?.ok_or(ProjectRepoError::ProjectNotFound(id))
    }

    fn remove_project(&self, id: ProjectId) -> ProjectRepoResult<()> {
        let changed = self
            .conn
            .execute("DELETE FROM projects WHERE id = ?1;", [id])?;
        if changed == 0 {
            return Err(ProjectRepoError::ProjectNotFound(id));
        }
        Ok(())
    }

    fn leave_project(&self, id: ProjectId, username: &str) -> ProjectRepoResult<LeaveOutcome> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;

        let owner_flag = tx
            .query_row(
                "SELECT is_owner FROM cowrites WHERE project_id = ?1 AND username = ?2;",
                params![id, username],
                |row| row.get::<_, i64>(0),
            )
            .optional()?;
        let Some(owner_flag) = owner_flag else {
            return Err(ProjectRepoError::MembershipNotFound {
                project_id: id,
                username: username.to_string(),
            });
        };
        let is_owner = parse_bool(owner_flag, "cowrites.is_owner")?;

        tx.execute(
            "DELETE FROM cowrites WHERE project_id = ?1 AND username = ?2;",
            params![id, username],
        )?;

        let outcome = if is_owner {
            tx.execute("DELETE FROM projects WHERE id = ?1;", [id])?;
            LeaveOutcome::ProjectDissolved
        } else {
            let withdrawn_requests = tx.execute(
                "DELETE FROM requests
                 WHERE project_id = ?1 AND recipient = ?2 AND accepted IS NULL;",
                params![id, username],
            )?;
            touch_project(&tx, id)?;
            LeaveOutcome::MembershipRemoved { withdrawn_requests }
        };

        tx.commit()?;
        Ok(outcome)
    }

    fn projects_for_user(&self, username: &str) -> ProjectRepoResult<Vec<ProjectTag>> {
        if !username_taken(self.conn, username)? {
            return Err(ProjectRepoError::UserNotFound(username.to_string()));
        }

        let mut stmt = self.conn.prepare(
            "SELECT p.id AS id, p.title AS title, p.updated_at AS updated_at, c.is_owner AS is_owner
             FROM cowrites c
             JOIN projects p ON p.id = c.project_id
             WHERE c.username = ?1
             ORDER BY p.updated_at DESC, p.id ASC;",
        )?;
        let mut rows = stmt.query([username])?;
        let mut tags = Vec::new();
        while let Some(row) = rows.next()? {
            tags.push(parse_tag_row(row)?);
        }
        Ok(tags)
    }

    fn memberships_for_project(&self, id: ProjectId) -> ProjectRepoResult<Vec<Membership>> {
        let mut stmt = self.conn.prepare(
            "SELECT project_id, username, is_owner
             FROM cowrites
             WHERE project_id = ?1
             ORDER BY username ASC;",
        )?;
        let mut rows = stmt.query([id])?;
        let mut memberships = Vec::new();
        while let Some(row) = rows.next()? {
            memberships.push(parse_membership_row(row)?);
        }
        Ok(memberships)
    }
}

/// Re-stamps a project's `updated_at` marker.
///
/// Arrangement and membership mutations call this inside their own
/// transactions; returns the affected row count so callers can detect a
/// vanished project.
pub(crate) fn touch_project(conn: &Connection, project_id: ProjectId) -> rusqlite::Result<usize> {
    conn.execute(
        "UPDATE projects SET updated_at = (strftime('%s', 'now') * 1000) WHERE id = ?1;",
        [project_id],
    )
}

pub(crate) fn project_exists(conn: &Connection, project_id: ProjectId) -> rusqlite::Result<bool> {
    conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM projects WHERE id = ?1);",
        [project_id],
        |row| row.get(0),
    )
}

fn get_project_record(
    conn: &Connection,
    project_id: ProjectId,
) -> ProjectRepoResult<Option<Project>> {
    let mut stmt = conn.prepare(&format!("{PROJECT_SELECT_SQL} WHERE id = ?1;"))?;
    let mut rows = stmt.query([project_id])?;
    if let Some(row) = rows.next()? {
        return Ok(Some(parse_project_row(row)?));
    }
    Ok(None)
}

fn parse_project_row(row: &Row<'_>) -> ProjectRepoResult<Project> {
    Ok(Project {
        id: row.get("id")?,
        title: row.get("title")?,
        owner: row.get("owner")?,
        notes: row.get("notes")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

fn parse_tag_row(row: &Row<'_>) -> ProjectRepoResult<ProjectTag> {
    Ok(ProjectTag {
        id: row.get("id")?,
        title: row.get("title")?,
        updated_at: row.get("updated_at")?,
        is_owner: parse_bool(row.get("is_owner")?, "cowrites.is_owner")?,
    })
}

fn parse_membership_row(row: &Row<'_>) -> ProjectRepoResult<Membership> {
    Ok(Membership {
        project_id: row.get("project_id")?,
        username: row.get("username")?,
        is_owner: parse_bool(row.get("is_owner")?, "cowrites.is_owner")?,
    })
}

fn parse_bool(value: i64, column: &'static str) -> ProjectRepoResult<bool> {
    match value {
        0 => Ok(false),
        1 => Ok(true),
        other => Err(ProjectRepoError::InvalidData(format!(
            "invalid boolean value `{other}` in {column}"
        ))),
    }
}
