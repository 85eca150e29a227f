//! Collaboration lifecycle use-case service.
//!
//! # Responsibility
//! - Parse boundary response literals into typed transitions.
//! - Provide invitation send, list, and resolve entry points.
//!
//! # Invariants
//! - Only the literals `accept` and `reject` resolve a request; anything
//!   else is rejected before persistence is touched.
//! - Resolution side effects stay inside repository transactions.

use crate::model::project::ProjectId;
use crate::model::request::{
    parse_request_response, CollaborationRequest, RequestId, RequestResponse,
    RequestResponseError, UserRequest,
};
use crate::repo::request_repo::{RequestRepoError, RequestRepository};
use crate::repo::ErrorKind;
use log::info;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Errors from collaboration service operations.
#[derive(Debug)]
pub enum CollabServiceError {
    /// Response literal was neither `accept` nor `reject`.
    InvalidResponse(RequestResponseError),
    /// Repository-level failure.
    Repo(RequestRepoError),
}

impl CollabServiceError {
    /// Coarse classification for transport adapters.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidResponse(_) => ErrorKind::BadRequest,
            Self::Repo(err) => err.kind(),
        }
    }
}

impl Display for CollabServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidResponse(err) => write!(f, "{err}"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for CollabServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::InvalidResponse(err) => Some(err),
            Self::Repo(err) => Some(err),
        }
    }
}

impl From<RequestRepoError> for CollabServiceError {
    fn from(value: RequestRepoError) -> Self {
        Self::Repo(value)
    }
}

/// Collaboration lifecycle service facade.
pub struct CollabService<R: RequestRepository> {
    repo: R,
}

impl<R: RequestRepository> CollabService<R> {
    /// Creates service from repository implementation.
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Sends a collaboration invitation.
    pub fn make_request(
        &self,
        project_id: ProjectId,
        sender: &str,
        recipient: &str,
    ) -> Result<CollaborationRequest, CollabServiceError> {
        let request = self.repo.make_request(project_id, sender, recipient)?;
        info!(
            "event=request_send module=collab status=ok request_id={} project_id={} sender={} recipient={}",
            request.id, request.project_id, request.sender, request.recipient
        );
        Ok(request)
    }

    /// Fetches one request by id.
    pub fn get_request(&self, id: RequestId) -> Result<CollaborationRequest, CollabServiceError> {
        self.repo.get_request(id).map_err(Into::into)
    }

    /// Lists all requests addressed to a user, newest first.
    pub fn requests_for_user(
        &self,
        username: &str,
    ) -> Result<Vec<UserRequest>, CollabServiceError> {
        self.repo.requests_for_user(username).map_err(Into::into)
    }

    /// Lists all requests scoped to a project, newest first.
    pub fn requests_for_project(
        &self,
        project_id: ProjectId,
    ) -> Result<Vec<CollaborationRequest>, CollabServiceError> {
        self.repo
            .requests_for_project(project_id)
            .map_err(Into::into)
    }

    /// Resolves a request from a boundary response literal.
    pub fn respond(
        &self,
        id: RequestId,
        response: &str,
    ) -> Result<CollaborationRequest, CollabServiceError> {
        let response = parse_request_response(response).map_err(CollabServiceError::InvalidResponse)?;
        match response {
            RequestResponse::Accept => self.accept(id),
            RequestResponse::Reject => self.reject(id),
        }
    }

    /// Accepts a pending request, granting the contributor membership.
    pub fn accept(&self, id: RequestId) -> Result<CollaborationRequest, CollabServiceError> {
        let request = self.repo.accept(id)?;
        info!(
            "event=request_accept module=collab status=ok request_id={} project_id={} recipient={}",
            request.id, request.project_id, request.recipient
        );
        Ok(request)
    }

    /// Rejects a pending request; no membership side effect.
    pub fn reject(&self, id: RequestId) -> Result<CollaborationRequest, CollabServiceError> {
        let request = self.repo.reject(id)?;
        info!(
            "event=request_reject module=collab status=ok request_id={} project_id={}",
            request.id, request.project_id
        );
        Ok(request)
    }
}
