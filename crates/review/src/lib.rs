//! Review workflow domain module (event-sourced).
//!
//! The submission lifecycle is a consumer of the capability engine: every
//! transition is gated on the caller's board role facts. No IO, no storage.

pub mod status;
pub mod submission;

pub use status::{Gate, SubmissionAction, SubmissionStatus};
pub use submission::{
    Actor, CreateDraft, StatusChanged, Submission, SubmissionCommand, SubmissionCreated,
    SubmissionEvent, Transition,
};
