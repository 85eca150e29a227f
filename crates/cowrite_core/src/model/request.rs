//! Collaboration request domain model and response contract.
//!
//! # Responsibility
//! - Define the invitation record and its explicit lifecycle states.
//! - Parse the boundary's accept/reject response literal.
//!
//! # Invariants
//! - `Pending` is the only state that permits a transition; `Accepted` and
//!   `Rejected` are terminal and immutable.
//! - At most one pending request exists per (project, sender, recipient).

use crate::model::project::ProjectId;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Stable identifier for a collaboration request.
pub type RequestId = i64;

/// Lifecycle state of a collaboration request.
///
/// Stored as a nullable boolean column; the mapping lives at the repository
/// boundary so everything above it sees only this enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestState {
    /// Sent, not yet answered by the recipient.
    Pending,
    /// Recipient accepted; a contributor membership exists.
    Accepted,
    /// Recipient declined; no membership side effect.
    Rejected,
}

impl RequestState {
    /// Returns whether this state permits no further transitions.
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Pending)
    }

    /// Stable lowercase label used in logs and diagnostics.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Accepted => "accepted",
            Self::Rejected => "rejected",
        }
    }
}

/// Canonical invitation record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollaborationRequest {
    pub id: RequestId,
    pub project_id: ProjectId,
    pub sender: String,
    pub recipient: String,
    pub state: RequestState,
    /// Epoch ms timestamp of when the invitation was created.
    pub sent_at: i64,
}

/// Recipient-facing read model: a request with its project/sender context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRequest {
    pub request_id: RequestId,
    pub project_id: ProjectId,
    pub project_title: String,
    pub sender: String,
    pub state: RequestState,
    pub sent_at: i64,
}

/// Recipient's answer in the response contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestResponse {
    Accept,
    Reject,
}

/// Parses the boundary response literal (`"accept"` or `"reject"`).
///
/// Any other value is rejected; the transport surfaces that as a bad
/// request.
pub fn parse_request_response(value: &str) -> Result<RequestResponse, RequestResponseError> {
    let normalized = value.trim();
    if normalized.is_empty() {
        return Err(RequestResponseError::EmptyResponse);
    }

    match normalized {
        "accept" => Ok(RequestResponse::Accept),
        "reject" => Ok(RequestResponse::Reject),
        other => Err(RequestResponseError::UnsupportedResponse(other.to_string())),
    }
}

/// Response literal parse errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestResponseError {
    EmptyResponse,
    UnsupportedResponse(String),
}

impl Display for RequestResponseError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyResponse => write!(f, "response value must not be empty"),
            Self::UnsupportedResponse(value) => {
                write!(f, "response must be `accept` or `reject`, got `{value}`")
            }
        }
    }
}

impl Error for RequestResponseError {}

#[cfg(test)]
mod tests {
    use super::{parse_request_response, RequestResponse, RequestResponseError, RequestState};

    #[test]
    fn pending_is_the_only_non_terminal_state() {
        assert!(!RequestState::Pending.is_terminal());
        assert!(RequestState::Accepted.is_terminal());
        assert!(RequestState::Rejected.is_terminal());
    }

    #[test]
    fn parses_both_supported_response_literals() {
        assert_eq!(
            parse_request_response("accept").expect("accept parse"),
            RequestResponse::Accept
        );
        assert_eq!(
            parse_request_response(" reject ").expect("reject parse"),
            RequestResponse::Reject
        );
    }

    #[test]
    fn rejects_empty_response_literal() {
        let err = parse_request_response("   ").expect_err("empty response must fail");
        assert_eq!(err, RequestResponseError::EmptyResponse);
    }

    #[test]
    fn rejects_unsupported_response_literal() {
        let err = parse_request_response("maybe").expect_err("unknown response must fail");
        assert_eq!(
            err,
            RequestResponseError::UnsupportedResponse("maybe".to_string())
        );
    }

    #[test]
    fn rejects_capitalized_response_literal() {
        let err = parse_request_response("Accept").expect_err("capitalized literal must fail");
        assert_eq!(
            err,
            RequestResponseError::UnsupportedResponse("Accept".to_string())
        );
    }
}
