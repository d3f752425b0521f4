//! `quorum-session` — the session authority and its collaborator seams.
//!
//! One [`SessionAuthority`] is constructed per page load (per tenant) and
//! passed to consumers explicitly; there is no global session state.

pub mod authority;
pub mod client;
pub mod config;
pub mod error;
pub mod membership;
pub mod signal;

pub use authority::{SessionAuthority, SessionState};
pub use client::{MembershipClient, ProfileClient};
pub use config::SessionConfig;
pub use error::SessionError;
pub use membership::{load_board_facts, load_project_facts, load_role_facts};
pub use signal::UnauthorizedSignal;
