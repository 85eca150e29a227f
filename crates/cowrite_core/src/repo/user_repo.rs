//! User catalog persistence.
//!
//! # Responsibility
//! - Register account rows that ownership, membership, and request tables
//!   reference by username.
//! - Keep identity lookups cheap for access predicates.
//!
//! # Invariants
//! - Usernames are url-safe tokens, at most 30 characters.
//! - Username and email are unique; duplicates surface as field-level
//!   errors, never as raw constraint failures.

use crate::db::DbError;
use crate::repo::{schema_version_gap, ErrorKind};
use once_cell::sync::Lazy;
use regex::Regex;
use rusqlite::{params, Connection, Transaction, TransactionBehavior};
use std::error::Error;
use std::fmt::{Display, Formatter};

static USERNAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_.-]{1,30}$").expect("valid username regex"));

pub type UserRepoResult<T> = Result<T, UserRepoError>;

/// Repository error for user registration and lookup.
#[derive(Debug)]
pub enum UserRepoError {
    Db(DbError),
    /// Username is empty, too long, or contains unsupported characters.
    InvalidUsername(String),
    /// Email is empty or not addressable.
    InvalidEmail(String),
    /// Username is already registered.
    DuplicateUsername(String),
    /// Email is already registered under another username.
    DuplicateEmail(String),
    /// The connection has not been migrated to the expected schema.
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
}

impl UserRepoError {
    /// Coarse classification for transport adapters.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Db(_) => ErrorKind::Internal,
            Self::InvalidUsername(_) => ErrorKind::BadRequest,
            Self::InvalidEmail(_) => ErrorKind::BadRequest,
            Self::DuplicateUsername(_) => ErrorKind::BadRequest,
            Self::DuplicateEmail(_) => ErrorKind::BadRequest,
            Self::UninitializedConnection { .. } => ErrorKind::Internal,
        }
    }
}

impl Display for UserRepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::InvalidUsername(username) => write!(f, "invalid username: `{username}`"),
            Self::InvalidEmail(email) => write!(f, "invalid email: `{email}`"),
            Self::DuplicateUsername(username) => {
                write!(f, "username already registered: {username}")
            }
            Self::DuplicateEmail(email) => write!(f, "email already registered: {email}"),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "user repository requires schema version {expected_version}, got {actual_version}"
            ),
        }
    }
}

impl Error for UserRepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for UserRepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for UserRepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Registration payload for one account row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUser {
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
}

/// SQLite-backed user repository.
pub struct SqliteUserRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteUserRepository<'conn> {
    /// Binds the repository to a migrated connection.
    pub fn try_new(conn: &'conn Connection) -> UserRepoResult<Self> {
        if let Some(gap) = schema_version_gap(conn)? {
            return Err(UserRepoError::UninitializedConnection {
                expected_version: gap.expected_version,
                actual_version: gap.actual_version,
            });
        }
        Ok(Self { conn })
    }

    /// Registers one account row after normalizing whitespace.
    pub fn create_user(&self, user: &NewUser) -> UserRepoResult<()> {
        let username = user.username.trim();
        if !is_valid_username(username) {
            return Err(UserRepoError::InvalidUsername(user.username.clone()));
        }

        let email = user.email.trim();
        if !is_plausible_email(email) {
            return Err(UserRepoError::InvalidEmail(user.email.clone()));
        }

        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        if username_taken(&tx, username)? {
            return Err(UserRepoError::DuplicateUsername(username.to_string()));
        }
        if email_taken(&tx, email)? {
            return Err(UserRepoError::DuplicateEmail(email.to_string()));
        }

        tx.execute(
            "INSERT INTO users (username, first_name, last_name, email)
             VALUES (?1, ?2, ?3, ?4);",
            params![
                username,
                user.first_name.trim(),
                user.last_name.trim(),
                email
            ],
        )?;
        tx.commit()?;

        Ok(())
    }

    /// Returns whether `username` names a registered account.
    pub fn user_exists(&self, username: &str) -> UserRepoResult<bool> {
        Ok(username_taken(self.conn, username)?)
    }
}

pub(crate) fn username_taken(conn: &Connection, username: &str) -> rusqlite::Result<bool> {
    conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM users WHERE username = ?1);",
        [username],
        |row| row.get(0),
    )
}

fn email_taken(conn: &Connection, email: &str) -> rusqlite::Result<bool> {
    conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM users WHERE email = ?1);",
        [email],
        |row| row.get(0),
    )
}

fn is_valid_username(username: &str) -> bool {
    USERNAME_RE.is_match(username)
}

fn is_plausible_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty() && !domain.is_empty() && !domain.starts_with('.') && domain.contains('.')
}
