//! Domain records for collaborative projects.
//!
//! # Responsibility
//! - Define the canonical shapes for projects, memberships, arrangement
//!   rows, and collaboration requests.
//! - Keep boundary contracts (sync payload elements, response literals) as
//!   typed values rather than loose strings.
//!
//! # Invariants
//! - Identities are stable `i64` row ids; usernames are their own keys.
//! - Request state is an explicit three-variant enum; the nullable-boolean
//!   storage shape never leaks above the repository layer.
//!
//! # See also
//! - docs/architecture/data-model.md

pub mod arrangement;
pub mod project;
pub mod request;
