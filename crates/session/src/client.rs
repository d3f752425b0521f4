//! Outbound collaborators the session layer depends on.
//!
//! Implementations live in the request layer (HTTP in production, scripted
//! fakes in tests). They are expected to raise the
//! [`UnauthorizedSignal`](crate::UnauthorizedSignal) themselves when the server
//! rejects the credential.

use async_trait::async_trait;
use quorum_auth::{BoardMembership, Profile, ProjectMembership};
use quorum_core::{BoardId, FetchError, ResourceId};

#[async_trait]
pub trait ProfileClient: Send + Sync {
    /// Profile of the caller identified by the stored credential.
    async fn fetch_profile(&self) -> Result<Profile, FetchError>;
}

#[async_trait]
pub trait MembershipClient: Send + Sync {
    async fn fetch_project_memberships(&self, resource_id: ResourceId)
    -> Result<Vec<ProjectMembership>, FetchError>;

    async fn fetch_board_memberships(&self, board_id: BoardId) -> Result<Vec<BoardMembership>, FetchError>;
}
