//! `quorum-auth` — who the caller is and what they may do.
//!
//! Everything here is synchronous and free of network access. The capability
//! engine in particular is a pure function of identity and role facts.

pub mod capabilities;
pub mod claims;
pub mod credential;
pub mod membership;
pub mod profile;
pub mod roles;

pub use capabilities::{Capabilities, CapabilityDenied, derive_capabilities};
pub use claims::{AdvisoryClaims, decode_claims};
pub use credential::{
    CREDENTIAL_KEY, CredentialError, CredentialStore, PLATFORM_OPERATOR_KEY, StoredCredential,
};
pub use membership::{BoardMembership, Facts, Membership, ProjectMembership, RoleFacts};
pub use profile::{ApprovalState, Identity, OperatorSource, Profile};
pub use roles::{BoardRole, ProjectRole};
