//! Use-case service facades over repository contracts.
//!
//! # Responsibility
//! - Validate boundary input before it reaches persistence.
//! - Emit structured log events for compound mutations.
//!
//! # Invariants
//! - Services never bypass repository transaction boundaries.
//! - Service layer remains storage-agnostic.

pub mod arrangement_service;
pub mod collab_service;
pub mod project_service;
