//! Project and membership domain model.
//!
//! # Responsibility
//! - Define the project record and its read-model projections.
//! - Define the membership ("cowrite") record linking users to projects.
//!
//! # Invariants
//! - Every project has exactly one owner, who also holds the single
//!   `is_owner` membership row for that project.
//! - `updated_at` moves forward on any arrangement or membership mutation.

use serde::{Deserialize, Serialize};

/// Stable identifier for a project.
pub type ProjectId = i64;

/// Canonical project record as persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: ProjectId,
    pub title: String,
    /// Username of the owning member.
    pub owner: String,
    /// Free-form working notes, absent until first set.
    pub notes: Option<String>,
    /// Epoch ms creation timestamp.
    pub created_at: i64,
    /// Epoch ms timestamp of the last arrangement/membership/field change.
    pub updated_at: i64,
}

/// Full project view: core fields plus every member's username.
///
/// `contributors` includes the owner; ordering is alphabetical for stable
/// rendering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectDetails {
    pub id: ProjectId,
    pub title: String,
    pub owner: String,
    pub notes: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
    pub contributors: Vec<String>,
}

/// Light projection for contexts that only need identity, such as rendering
/// the target project of a pending invitation without exposing notes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectSummary {
    pub id: ProjectId,
    pub title: String,
    pub owner: String,
    pub updated_at: i64,
}

/// One project as it appears on a user's dashboard listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectTag {
    pub id: ProjectId,
    pub title: String,
    pub updated_at: i64,
    /// Whether the listed user owns this project.
    pub is_owner: bool,
}

/// Membership record granting a user access to a project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Membership {
    pub project_id: ProjectId,
    pub username: String,
    pub is_owner: bool,
}

/// Field set accepted by the partial project update contract.
///
/// `None` means "leave unchanged"; the update itself still re-stamps
/// `updated_at` even when both fields are absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ProjectPatch {
    pub title: Option<String>,
    pub notes: Option<String>,
}

impl ProjectPatch {
    /// Returns whether the patch carries no field changes.
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.notes.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::ProjectPatch;

    #[test]
    fn patch_fields_default_to_unchanged() {
        let parsed: ProjectPatch = serde_json::from_str(r#"{"title": "Night Drive"}"#).unwrap();
        assert_eq!(parsed.title.as_deref(), Some("Night Drive"));
        assert_eq!(parsed.notes, None);
        assert!(!parsed.is_empty());
    }

    #[test]
    fn empty_payload_parses_as_empty_patch() {
        let parsed: ProjectPatch = serde_json::from_str("{}").unwrap();
        assert!(parsed.is_empty());
    }
}
