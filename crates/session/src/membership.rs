//! Loading role facts for the capability engine.
//!
//! Fetch failures become [`Facts::Unavailable`]; they are never surfaced as
//! errors, and never as an empty-but-loaded list (which could make a caller
//! look like the only lead of nothing).

use quorum_auth::{BoardMembership, Facts, ProjectMembership, RoleFacts};
use quorum_core::{BoardId, ResourceId};

use crate::client::MembershipClient;

pub async fn load_project_facts(client: &dyn MembershipClient, resource_id: ResourceId) -> Facts<ProjectMembership> {
    match client.fetch_project_memberships(resource_id).await {
        Ok(memberships) => Facts::Loaded(
            memberships
                .into_iter()
                .filter(|m| m.resource_id == resource_id)
                .collect(),
        ),
        Err(err) => {
            tracing::warn!(%resource_id, "project memberships unavailable: {err}");
            Facts::Unavailable
        }
    }
}

pub async fn load_board_facts(client: &dyn MembershipClient, board_id: BoardId) -> Facts<BoardMembership> {
    match client.fetch_board_memberships(board_id).await {
        Ok(memberships) => Facts::Loaded(memberships.into_iter().filter(|m| m.resource_id == board_id).collect()),
        Err(err) => {
            tracing::warn!(%board_id, "board memberships unavailable: {err}");
            Facts::Unavailable
        }
    }
}

/// Load facts for every listed project and board, one request each.
pub async fn load_role_facts(
    client: &dyn MembershipClient,
    projects: &[ResourceId],
    boards: &[BoardId],
) -> RoleFacts {
    let mut facts = RoleFacts::new();
    for &resource_id in projects {
        facts = facts.with_project(resource_id, load_project_facts(client, resource_id).await);
    }
    for &board_id in boards {
        facts = facts.with_board(board_id, load_board_facts(client, board_id).await);
    }
    facts
}
