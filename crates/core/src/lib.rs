//! `quorum-core` — identifiers and error primitives shared by every crate.
//!
//! This crate contains **pure domain** primitives (no IO, no async).

pub mod aggregate;
pub mod error;
pub mod id;

pub use aggregate::Aggregate;
pub use error::{DomainError, FetchError};
pub use id::{BoardId, ResourceId, SubmissionId, UserId};
