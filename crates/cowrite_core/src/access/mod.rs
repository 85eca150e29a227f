//! Access policy layer gating state-changing calls.
//!
//! # Responsibility
//! - Resolve caller identity against project ownership, membership, and
//!   request addressing.
//!
//! # Invariants
//! - Predicates are read-only; they never mutate persistence.
//! - Unauthorized signals originate here and nowhere else in the crate.

pub mod gate;
