//! Project use-case service.
//!
//! # Responsibility
//! - Validate project titles above the repository layer.
//! - Provide create, read, update, remove, and leave entry points.
//!
//! # Invariants
//! - Titles are trimmed and never blank.
//! - Creation and leave delegate their multi-step writes to repository
//!   transactions; callers never observe partial effects.

use crate::model::project::{
    Membership, Project, ProjectDetails, ProjectId, ProjectPatch, ProjectSummary, ProjectTag,
};
use crate::repo::project_repo::{LeaveOutcome, ProjectRepoError, ProjectRepository};
use crate::repo::ErrorKind;
use log::info;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Errors from project service operations.
#[derive(Debug)]
pub enum ProjectServiceError {
    /// Title is blank after trim.
    InvalidTitle,
    /// Repository-level failure.
    Repo(ProjectRepoError),
}

impl ProjectServiceError {
    /// Coarse classification for transport adapters.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidTitle => ErrorKind::BadRequest,
            Self::Repo(err) => err.kind(),
        }
    }
}

impl Display for ProjectServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidTitle => write!(f, "project title must not be blank"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ProjectServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::InvalidTitle => None,
            Self::Repo(err) => Some(err),
        }
    }
}

impl From<ProjectRepoError> for ProjectServiceError {
    fn from(value: ProjectRepoError) -> Self {
        Self::Repo(value)
    }
}

/// Project service facade.
pub struct ProjectService<R: ProjectRepository> {
    repo: R,
}

impl<R: ProjectRepository> ProjectService<R> {
    /// Creates service from repository implementation.
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Creates a project with its owner membership and blank arrangement.
    pub fn create_project(
        &self,
        title: impl Into<String>,
        owner: &str,
    ) -> Result<Project, ProjectServiceError> {
        let title = normalize_title(title.into())?;
        let project = self.repo.create_project(title.as_str(), owner)?;
        info!(
            "event=project_create module=project status=ok project_id={} owner={}",
            project.id, project.owner
        );
        Ok(project)
    }

    /// Fetches a project with its contributor usernames.
    pub fn get_project(&self, id: ProjectId) -> Result<ProjectDetails, ProjectServiceError> {
        self.repo.get_project(id).map_err(Into::into)
    }

    /// Fetches the identity projection of a project.
    pub fn get_summary(&self, id: ProjectId) -> Result<ProjectSummary, ProjectServiceError> {
        self.repo.get_summary(id).map_err(Into::into)
    }

    /// Applies a partial update; the modification stamp moves regardless of
    /// which fields are present.
    pub fn update_project(
        &self,
        id: ProjectId,
        patch: &ProjectPatch,
    ) -> Result<Project, ProjectServiceError> {
        let normalized = ProjectPatch {
            title: match &patch.title {
                Some(title) => Some(normalize_title(title.clone())?),
                None => None,
            },
            notes: patch.notes.clone(),
        };
        self.repo.update_project(id, &normalized).map_err(Into::into)
    }

    /// Hard-deletes a project and all dependent rows.
    pub fn remove_project(&self, id: ProjectId) -> Result<(), ProjectServiceError> {
        self.repo.remove_project(id).map_err(Into::into)
    }

    /// Removes one member; an owner's departure dissolves the project.
    pub fn leave_project(
        &self,
        id: ProjectId,
        username: &str,
    ) -> Result<LeaveOutcome, ProjectServiceError> {
        let outcome = self.repo.leave_project(id, username)?;
        match outcome {
            LeaveOutcome::ProjectDissolved => {
                info!(
                    "event=project_leave module=project status=ok project_id={id} username={username} outcome=dissolved"
                );
            }
            LeaveOutcome::MembershipRemoved { withdrawn_requests } => {
                info!(
                    "event=project_leave module=project status=ok project_id={id} username={username} outcome=membership_removed withdrawn_requests={withdrawn_requests}"
                );
            }
        }
        Ok(outcome)
    }

    /// Lists the projects a user belongs to, most recently updated first.
    pub fn projects_for_user(
        &self,
        username: &str,
    ) -> Result<Vec<ProjectTag>, ProjectServiceError> {
        self.repo.projects_for_user(username).map_err(Into::into)
    }

    /// Lists membership rows for a project in username order.
    pub fn memberships_for_project(
        &self,
        id: ProjectId,
    ) -> Result<Vec<Membership>, ProjectServiceError> {
        self.repo.memberships_for_project(id).map_err(Into::into)
    }
}

fn normalize_title(value: String) -> Result<String, ProjectServiceError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ProjectServiceError::InvalidTitle);
    }
    Ok(trimmed.to_string())
}
