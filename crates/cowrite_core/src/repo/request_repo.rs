//! Collaboration request repository and state machine transitions.
//!
//! # Responsibility
//! - Persist invitation rows and drive the pending/accepted/rejected
//!   transitions.
//! - Grant the contributor membership atomically with acceptance.
//!
//! # Invariants
//! - At most one pending request per (project, sender, recipient) triple;
//!   resolved requests never block a fresh one.
//! - Terminal states are immutable: transitions run as conditional updates
//!   guarded on the pending state, and an affected-row count of zero means
//!   the request was already resolved.
//! - Acceptance writes the state flip and the membership row in one
//!   transaction; a membership conflict rolls the flip back.
//!
//! # See also
//! - docs/architecture/data-model.md

use crate::db::DbError;
use crate::model::project::ProjectId;
use crate::model::request::{CollaborationRequest, RequestId, RequestState, UserRequest};
use crate::repo::project_repo::{project_exists, touch_project};
use crate::repo::user_repo::username_taken;
use crate::repo::{schema_version_gap, ErrorKind};
use rusqlite::{params, Connection, ErrorCode, Row, Transaction, TransactionBehavior};
use std::error::Error;
use std::fmt::{Display, Formatter};

const REQUEST_SELECT_SQL: &str = "SELECT
    id,
    project_id,
    sender,
    recipient,
    accepted,
    sent_at
FROM requests";

pub type RequestRepoResult<T> = Result<T, RequestRepoError>;

/// Repository error for collaboration request operations.
#[derive(Debug)]
pub enum RequestRepoError {
    Db(DbError),
    /// Target request does not exist.
    RequestNotFound(RequestId),
    /// Listing target user does not exist.
    UserNotFound(String),
    /// Listing target project does not exist.
    ProjectNotFound(ProjectId),
    /// A pending request for the same (project, sender, recipient) triple
    /// already exists.
    AlreadyPending {
        project_id: ProjectId,
        sender: String,
        recipient: String,
    },
    /// Transition target is already in a terminal state.
    AlreadyResolved(RequestId),
    /// New request referenced an unregistered sender.
    UnknownSender(String),
    /// New request referenced an unregistered recipient.
    UnknownRecipient(String),
    /// New request referenced an unknown project.
    UnknownProject(ProjectId),
    /// Acceptance found the recipient already holding a membership.
    MembershipConflict {
        project_id: ProjectId,
        username: String,
    },
    /// Connection was opened without running migrations.
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    InvalidData(String),
}

impl RequestRepoError {
    /// Coarse classification for transport adapters.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Db(_) => ErrorKind::Internal,
            Self::RequestNotFound(_) => ErrorKind::NotFound,
            Self::UserNotFound(_) => ErrorKind::NotFound,
            Self::ProjectNotFound(_) => ErrorKind::NotFound,
            Self::AlreadyPending { .. } => ErrorKind::BadRequest,
            Self::AlreadyResolved(_) => ErrorKind::BadRequest,
            Self::UnknownSender(_) => ErrorKind::BadRequest,
            Self::UnknownRecipient(_) => ErrorKind::BadRequest,
            Self::UnknownProject(_) => ErrorKind::BadRequest,
            Self::MembershipConflict { .. } => ErrorKind::BadRequest,
            Self::UninitializedConnection { .. } => ErrorKind::Internal,
            Self::InvalidData(_) => ErrorKind::Internal,
        }
    }
}

impl Display for RequestRepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::RequestNotFound(id) => write!(f, "collaboration request not found: {id}"),
            Self::UserNotFound(username) => write!(f, "user not found: {username}"),
            Self::ProjectNotFound(id) => write!(f, "project not found: {id}"),
            Self::AlreadyPending {
                project_id,
                sender,
                recipient,
            } => write!(
                f,
                "request from {sender} to {recipient} on project {project_id} is already pending"
            ),
            Self::AlreadyResolved(id) => write!(f, "request {id} is already resolved"),
            Self::UnknownSender(username) => {
                write!(f, "request sender is not a registered user: {username}")
            }
            Self::UnknownRecipient(username) => {
                write!(f, "request recipient is not a registered user: {username}")
            }
            Self::UnknownProject(id) => write!(f, "request references unknown project {id}"),
            Self::MembershipConflict {
                project_id,
                username,
            } => write!(
                f,
                "collaboration could not be made: {username} is already a member of project {project_id}"
            ),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "request repository requires schema version {expected_version}, got {actual_version}"
            ),
            Self::InvalidData(message) => write!(f, "invalid persisted request data: {message}"),
        }
    }
}

impl Error for RequestRepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for RequestRepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RequestRepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Repository interface for collaboration request operations.
pub trait RequestRepository {
    fn make_request(
        &self,
        project_id: ProjectId,
        sender: &str,
        recipient: &str,
    ) -> RequestRepoResult<CollaborationRequest>;
    fn get_request(&self, id: RequestId) -> RequestRepoResult<CollaborationRequest>;
    fn requests_for_user(&self, username: &str) -> RequestRepoResult<Vec<UserRequest>>;
    fn requests_for_project(
        &self,
        project_id: ProjectId,
    ) -> RequestRepoResult<Vec<CollaborationRequest>>;
    fn accept(&self, id: RequestId) -> RequestRepoResult<CollaborationRequest>;
    fn reject(&self, id: RequestId) -> RequestRepoResult<CollaborationRequest>;
}

/// SQLite-backed collaboration request repository.
pub struct SqliteRequestRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteRequestRepository<'conn> {
    /// Creates the repository over an already-migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RequestRepoResult<Self> {
        if let Some(gap) = schema_version_gap(conn)? {
            return Err(RequestRepoError::UninitializedConnection {
                expected_version: gap.expected_version,
                actual_version: gap.actual_version,
            });
        }
        Ok(Self { conn })
    }
}

impl RequestRepository for SqliteRequestRepository<'_> {
    fn make_request(
        &self,
        project_id: ProjectId,
        sender: &str,
        recipient: &str,
    ) -> RequestRepoResult<CollaborationRequest> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        if !username_taken(&tx, sender)? {
            return Err(RequestRepoError::UnknownSender(sender.to_string()));
        }
        if !username_taken(&tx, recipient)? {
            return Err(RequestRepoError::UnknownRecipient(recipient.to_string()));
        }
        if !project_exists(&tx, project_id)? {
            return Err(RequestRepoError::UnknownProject(project_id));
        }

        let pending: bool = tx.query_row(
            "SELECT EXISTS(
                SELECT 1 FROM requests
                WHERE project_id = ?1 AND sender = ?2 AND recipient = ?3
                  AND accepted IS NULL
            );",
            params![project_id, sender, recipient],
            |row| row.get(0),
        )?;
        if pending {
            return Err(already_pending(project_id, sender, recipient));
        }

        let inserted = tx.execute(
            "INSERT INTO requests (project_id, sender, recipient) VALUES (?1, ?2, ?3);",
            params![project_id, sender, recipient],
        );
        match inserted {
            Ok(_) => {}
            // The partial unique index backstops the pending check under
            // concurrent senders.
            Err(rusqlite::Error::SqliteFailure(e, _))
                if e.code == ErrorCode::ConstraintViolation =>
            {
                return Err(already_pending(project_id, sender, recipient));
            }
            Err(err) => return Err(err.into()),
        }

        let request_id = tx.last_insert_rowid();
        let request =
            get_request_row(&tx, request_id)?.ok_or(RequestRepoError::RequestNotFound(request_id))?;
        tx.commit()?;
        Ok(request)
    }

    fn get_request(&self, id: RequestId) -> RequestRepoResult<CollaborationRequest> {
        get_request_row(self.conn, id)?.ok_or(RequestRepoError::RequestNotFound(id))
    }

    fn requests_for_user(&self, username: &str) -> RequestRepoResult<Vec<UserRequest>> {
        if !username_taken(self.conn, username)? {
            return Err(RequestRepoError::UserNotFound(username.to_string()));
        }

        let mut stmt = self.conn.prepare(
            "SELECT r.id AS id, r.project_id AS project_id, p.title AS project_title,
                    r.sender AS sender, r.accepted AS accepted, r.sent_at AS sent_at
             FROM requests r
             JOIN projects p ON p.id = r.project_id
             WHERE r.recipient = ?1
             ORDER BY r.sent_at DESC, r.id DESC;",
        )?;
        let mut rows = stmt.query([username])?;
        let mut requests = Vec::new();
        while let Some(row) = rows.next()? {
            requests.push(parse_user_request_row(row)?);
        }
        Ok(requests)
    }

    fn requests_for_project(
        &self,
        project_id: ProjectId,
    ) -> RequestRepoResult<Vec<CollaborationRequest>> {
        if !project_exists(self.conn, project_id)? {
            return Err(RequestRepoError::ProjectNotFound(project_id));
        }

        let mut stmt = self.conn.prepare(&format!(
            "{REQUEST_SELECT_SQL}
             WHERE project_id = ?1
             ORDER BY sent_at DESC, id DESC;"
        ))?;
        let mut rows = stmt.query([project_id])?;
        let mut requests = Vec::new();
        while let Some(row) = rows.next()? {
            requests.push(parse_request_row(row)?);
        }
        Ok(requests)
    }

    fn accept(&self, id: RequestId) -> RequestRepoResult<CollaborationRequest> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let request = get_request_row(&tx, id)?.ok_or(RequestRepoError::RequestNotFound(id))?;

        let changed = tx.execute(
            "UPDATE requests SET accepted = ?1 WHERE id = ?2 AND accepted IS NULL;",
            params![request_state_to_db(RequestState::Accepted), id],
        )?;
        if changed == 0 {
            return Err(RequestRepoError::AlreadyResolved(id));
        }

        let granted = tx.execute(
            "INSERT INTO cowrites (project_id, username, is_owner) VALUES (?1, ?2, 0);",
            params![request.project_id, request.recipient],
        );
        match granted {
            Ok(_) => {}
            // Dropping the transaction rolls the accepted flip back, so a
            // conflicting membership leaves the request pending.
            Err(rusqlite::Error::SqliteFailure(e, _))
                if e.code == ErrorCode::ConstraintViolation =>
            {
                return Err(RequestRepoError::MembershipConflict {
                    project_id: request.project_id,
                    username: request.recipient,
                });
            }
            Err(err) => return Err(err.into()),
        }

        touch_project(&tx, request.project_id)?;
        let request = get_request_row(&tx, id)?.ok_or(RequestRepoError::RequestNotFound(id))?;
        tx.commit()?;
        Ok(request)
    }

    fn reject(&self, id: RequestId) -> RequestRepoResult<CollaborationRequest> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        if get_request_row(&tx, id)?.is_none() {
            return Err(RequestRepoError::RequestNotFound(id));
        }

        let changed = tx.execute(
            "UPDATE requests SET accepted = ?1 WHERE id = ?2 AND accepted IS NULL;",
            params![request_state_to_db(RequestState::Rejected), id],
        )?;
        if changed == 0 {
            return Err(RequestRepoError::AlreadyResolved(id));
        }

        let request = get_request_row(&tx, id)?.ok_or(RequestRepoError::RequestNotFound(id))?;
        tx.commit()?;
        Ok(request)
    }
}

fn already_pending(project_id: ProjectId, sender: &str, recipient: &str) -> RequestRepoError {
    RequestRepoError::AlreadyPending {
        project_id,
        sender: sender.to_string(),
        recipient: recipient.to_string(),
    }
}

fn get_request_row(
    conn: &Connection,
    id: RequestId,
) -> RequestRepoResult<Option<CollaborationRequest>> {
    let mut stmt = conn.prepare(&format!("{REQUEST_SELECT_SQL} WHERE id = ?1;"))?;
    let mut rows = stmt.query([id])?;
    if let Some(row) = rows.next()? {
        return Ok(Some(parse_request_row(row)?));
    }
    Ok(None)
}

fn parse_request_row(row: &Row<'_>) -> RequestRepoResult<CollaborationRequest> {
    let accepted: Option<i64> = row.get("accepted")?;
    let state = parse_request_state(accepted).ok_or_else(|| {
        RequestRepoError::InvalidData(format!(
            "invalid accepted value `{accepted:?}` in requests.accepted"
        ))
    })?;

    Ok(CollaborationRequest {
        id: row.get("id")?,
        project_id: row.get("project_id")?,
        sender: row.get("sender")?,
        recipient: row.get("recipient")?,
        state,
        sent_at: row.get("sent_at")?,
    })
}

fn parse_user_request_row(row: &Row<'_>) -> RequestRepoResult<UserRequest> {
    let accepted: Option<i64> = row.get("accepted")?;
    let state = parse_request_state(accepted).ok_or_else(|| {
        RequestRepoError::InvalidData(format!(
            "invalid accepted value `{accepted:?}` in requests.accepted"
        ))
    })?;

    Ok(UserRequest {
        request_id: row.get("id")?,
        project_id: row.get("project_id")?,
        project_title: row.get("project_title")?,
        sender: row.get("sender")?,
        state,
        sent_at: row.get("sent_at")?,
    })
}

fn request_state_to_db(state: RequestState) -> Option<i64> {
    match state {
        RequestState::Pending => None,
        RequestState::Accepted => Some(1),
        RequestState::Rejected => Some(0),
    }
}

fn parse_request_state(value: Option<i64>) -> Option<RequestState> {
    match value {
        None => Some(RequestState::Pending),
        Some(1) => Some(RequestState::Accepted),
        Some(0) => Some(RequestState::Rejected),
        Some(_) => None,
    }
}
