//! Arrangement domain model and sync contract shapes.
//!
//! # Responsibility
//! - Define the persisted arrangement entry and its section-joined read
//!   model.
//! - Define the client sync payload element used by reconciliation.
//!
//! # Invariants
//! - A project always holds at least one entry; a `section_id` of `None`
//!   marks the blank placeholder kept while the arrangement is empty.
//! - `position` values are non-negative and totally ordered for rendering;
//!   they need not be contiguous, ties break by row id.

use crate::model::project::ProjectId;
use serde::{Deserialize, Serialize};

/// Stable identifier for one arrangement entry row.
pub type EntryId = i64;

/// Identifier into the shared section catalog.
pub type SectionId = i64;

/// One entry of the shared section catalog (intro, verse, chorus, ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Section {
    pub id: SectionId,
    pub name: String,
}

/// Persisted arrangement entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArrangementEntry {
    pub id: EntryId,
    pub project_id: ProjectId,
    /// `None` for the blank placeholder row.
    pub section_id: Option<SectionId>,
    pub position: i64,
    /// Epoch ms update timestamp.
    pub updated_at: i64,
}

/// Section-joined read model returned when listing a project's arrangement.
///
/// A blank placeholder row carries `None` for both section fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArrangementRow {
    pub id: EntryId,
    pub section_id: Option<SectionId>,
    pub section_name: Option<String>,
    pub position: i64,
}

/// One element of the client-declared desired ordering.
///
/// The wire contract names the section reference `section`; an element
/// without an `id` is a new insert, an element whose `id` is unknown to the
/// persisted state is skipped by reconciliation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DesiredEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<EntryId>,
    #[serde(default, rename = "section")]
    pub section_id: Option<SectionId>,
    pub position: i64,
}

impl DesiredEntry {
    /// Desired placement of an entry that already exists.
    pub fn existing(id: EntryId, position: i64) -> Self {
        Self {
            id: Some(id),
            section_id: None,
            position,
        }
    }

    /// Desired insert of a new entry referencing `section_id`.
    pub fn insert(section_id: Option<SectionId>, position: i64) -> Self {
        Self {
            id: None,
            section_id,
            position,
        }
    }
}
