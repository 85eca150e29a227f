//! Arrangement use-case service.
//!
//! # Responsibility
//! - Provide stable entry points for arrangement reads and mutations.
//! - Delegate persistence and diffing to the repository layer.
//!
//! # Invariants
//! - Service APIs never bypass repository transaction contracts.
//! - Reconciliation is full-replace; callers submitting concurrently race
//!   at whole-ordering granularity.

use crate::model::arrangement::{ArrangementEntry, ArrangementRow, DesiredEntry, EntryId, SectionId};
use crate::model::project::ProjectId;
use crate::repo::arrangement_repo::{ArrangementRepoResult, ArrangementRepository};
use log::info;

/// Use-case service wrapper for arrangement operations.
pub struct ArrangementService<R: ArrangementRepository> {
    repo: R,
}

impl<R: ArrangementRepository> ArrangementService<R> {
    /// Creates a service using the provided repository implementation.
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Inserts the blank placeholder entry for a new project.
    pub fn create_blank(&self, project_id: ProjectId) -> ArrangementRepoResult<ArrangementEntry> {
        self.repo.create_blank(project_id)
    }

    /// Inserts one entry at the given position.
    pub fn add_entry(
        &self,
        project_id: ProjectId,
        section_id: Option<SectionId>,
        position: i64,
    ) -> ArrangementRepoResult<ArrangementEntry> {
        self.repo.add_entry(project_id, section_id, position)
    }

    /// Moves one existing entry to a new position.
    pub fn reposition_entry(
        &self,
        entry_id: EntryId,
        new_position: i64,
    ) -> ArrangementRepoResult<ArrangementEntry> {
        self.repo.reposition_entry(entry_id, new_position)
    }

    /// Lists a project's entries in rendering order with section names.
    pub fn list_for_project(
        &self,
        project_id: ProjectId,
    ) -> ArrangementRepoResult<Vec<ArrangementRow>> {
        self.repo.list_for_project(project_id)
    }

    /// Deletes one entry.
    pub fn remove_entry(&self, entry_id: EntryId) -> ArrangementRepoResult<()> {
        self.repo.remove_entry(entry_id)
    }

    /// Resets a project's arrangement to a single blank entry.
    pub fn clear(&self, project_id: ProjectId) -> ArrangementRepoResult<ArrangementEntry> {
        let entry = self.repo.clear(project_id)?;
        info!("event=arrangement_clear module=arrangement status=ok project_id={project_id}");
        Ok(entry)
    }

    /// Replaces a project's persisted ordering with a client-declared one.
    ///
    /// # Contract
    /// - Entries absent from `desired` are deleted.
    /// - Desired ids unknown to persisted state are skipped silently.
    /// - Returns the final ordering after the diff is applied.
    pub fn reconcile(
        &self,
        project_id: ProjectId,
        desired: &[DesiredEntry],
    ) -> ArrangementRepoResult<Vec<ArrangementRow>> {
        let rows = self.repo.reconcile(project_id, desired)?;
        info!(
            "event=arrangement_reconcile module=arrangement status=ok project_id={} desired_count={} final_count={}",
            project_id,
            desired.len(),
            rows.len()
        );
        Ok(rows)
    }
}
