//! Identity predicates over project, membership, and request state.
//!
//! # Responsibility
//! - Answer whether a calling identity is the project owner, a contributor,
//!   or the recipient of a request.
//!
//! # Invariants
//! - Predicates resolve the referenced entity first: a missing project or
//!   request surfaces as not-found, never as a blanket unauthorized.
//! - Predicates read current state on every call; nothing is cached.

use crate::db::DbError;
use crate::model::project::ProjectId;
use crate::model::request::RequestId;
use crate::repo::project_repo::project_exists;
use crate::repo::{schema_version_gap, ErrorKind};
use rusqlite::{params, Connection, OptionalExtension};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Authenticated caller identity supplied by the boundary auth layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Identity {
    Anonymous,
    User(String),
}

impl Identity {
    /// Convenience constructor for an authenticated identity.
    pub fn user(username: impl Into<String>) -> Self {
        Self::User(username.into())
    }

    /// Username when authenticated.
    pub fn username(&self) -> Option<&str> {
        match self {
            Self::Anonymous => None,
            Self::User(username) => Some(username.as_str()),
        }
    }
}

pub type AccessResult<T> = Result<T, AccessError>;

/// Errors from access predicate evaluation.
#[derive(Debug)]
pub enum AccessError {
    Db(DbError),
    /// Caller identity does not satisfy the predicate.
    Unauthorized,
    /// Referenced project does not exist.
    ProjectNotFound(ProjectId),
    /// Referenced request does not exist.
    RequestNotFound(RequestId),
    /// The gate's connection has not been migrated yet.
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
}

impl AccessError {
    /// Coarse classification for transport adapters.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Db(_) => ErrorKind::Internal,
            Self::Unauthorized => ErrorKind::Unauthorized,
            Self::ProjectNotFound(_) => ErrorKind::NotFound,
            Self::RequestNotFound(_) => ErrorKind::NotFound,
            Self::UninitializedConnection { .. } => ErrorKind::Internal,
        }
    }
}

impl Display for AccessError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::Unauthorized => write!(f, "caller is not authorized for this operation"),
            Self::ProjectNotFound(id) => write!(f, "project not found: {id}"),
            Self::RequestNotFound(id) => write!(f, "collaboration request not found: {id}"),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "access gate requires schema version {expected_version}, got {actual_version}"
            ),
        }
    }
}

impl Error for AccessError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for AccessError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for AccessError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Read-only predicate evaluator over a migrated connection.
pub struct AccessGate<'conn> {
    conn: &'conn Connection,
}

impl<'conn> AccessGate<'conn> {
    /// Creates a gate from a migrated connection.
    pub fn try_new(conn: &'conn Connection) -> AccessResult<Self> {
        if let Some(gap) = schema_version_gap(conn)? {
            return Err(AccessError::UninitializedConnection {
                expected_version: gap.expected_version,
                actual_version: gap.actual_version,
            });
        }
        Ok(Self { conn })
    }

    /// Requires any authenticated identity.
    pub fn ensure_logged_in(&self, identity: &Identity) -> AccessResult<()> {
        if identity.username().is_none() {
            return Err(AccessError::Unauthorized);
        }
        Ok(())
    }

    /// Requires the identity to match the targeted username.
    pub fn ensure_correct_user(
        &self,
        identity: &Identity,
        target_username: &str,
    ) -> AccessResult<()> {
        match identity.username() {
            Some(username) if username == target_username => Ok(()),
            _ => Err(AccessError::Unauthorized),
        }
    }

    /// Requires the identity to own the project.
    pub fn ensure_project_owner(
        &self,
        identity: &Identity,
        project_id: ProjectId,
    ) -> AccessResult<()> {
        let owner = self
            .conn
            .query_row(
                "SELECT owner FROM projects WHERE id = ?1;",
                [project_id],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        let Some(owner) = owner else {
            return Err(AccessError::ProjectNotFound(project_id));
        };

        match identity.username() {
            Some(username) if username == owner => Ok(()),
            _ => Err(AccessError::Unauthorized),
        }
    }

    /// Requires the identity to hold any membership on the project, owner
    /// or contributor.
    pub fn ensure_project_contributor(
        &self,
        identity: &Identity,
        project_id: ProjectId,
    ) -> AccessResult<()> {
        if !project_exists(self.conn, project_id)? {
            return Err(AccessError::ProjectNotFound(project_id));
        }
        let Some(username) = identity.username() else {
            return Err(AccessError::Unauthorized);
        };

        let member: bool = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM cowrites WHERE project_id = ?1 AND username = ?2);",
            params![project_id, username],
            |row| row.get(0),
        )?;
        if member {
            Ok(())
        } else {
            Err(AccessError::Unauthorized)
        }
    }

    /// Requires the identity to be the recipient of the request.
    pub fn ensure_request_recipient(
        &self,
        identity: &Identity,
        request_id: RequestId,
    ) -> AccessResult<()> {
        let recipient = self
            .conn
            .query_row(
                "SELECT recipient FROM requests WHERE id = ?1;",
                [request_id],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        let Some(recipient) = recipient else {
            return Err(AccessError::RequestNotFound(request_id));
        };

        match identity.username() {
            Some(username) if username == recipient => Ok(()),
            _ => Err(AccessError::Unauthorized),
        }
    }
}
