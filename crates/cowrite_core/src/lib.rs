//! Core domain logic for Cowrite, a collaborative song arrangement backend.
//! Every business rule lives here; front ends only render what this crate
//! decides.

pub mod access;
pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use access::gate::{AccessError, AccessGate, AccessResult, Identity};
pub use logging::{default_log_level, init_logging, logging_status};
pub use model::arrangement::{
    ArrangementEntry, ArrangementRow, DesiredEntry, EntryId, Section, SectionId,
};
pub use model::project::{
    Membership, Project, ProjectDetails, ProjectId, ProjectPatch, ProjectSummary, ProjectTag,
};
pub use model::request::{
    parse_request_response, CollaborationRequest, RequestId, RequestResponse,
    RequestResponseError, RequestState, UserRequest,
};
pub use repo::arrangement_repo::{
    ArrangementRepoError, ArrangementRepoResult, ArrangementRepository,
    SqliteArrangementRepository,
};
pub use repo::project_repo::{
    LeaveOutcome, ProjectRepoError, ProjectRepoResult, ProjectRepository, SqliteProjectRepository,
};
pub use repo::request_repo::{
    RequestRepoError, RequestRepoResult, RequestRepository, SqliteRequestRepository,
};
pub use repo::section_repo::{SectionRepoError, SectionRepoResult, SqliteSectionRepository};
pub use repo::user_repo::{NewUser, SqliteUserRepository, UserRepoError, UserRepoResult};
pub use repo::ErrorKind;
pub use service::arrangement_service::ArrangementService;
pub use service::collab_service::{CollabService, CollabServiceError};
pub use service::project_service::{ProjectService, ProjectServiceError};

/// Cheap liveness probe for embedding hosts.
pub fn ping() -> &'static str {
    "pong"
}

/// Reports the version baked into this build of the core.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
