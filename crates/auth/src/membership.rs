//! Resource-scoped role facts, as fetched from the server.

use std::collections::HashMap;

use quorum_core::{BoardId, ResourceId, UserId};
use serde::{Deserialize, Serialize};

use crate::roles::{BoardRole, ProjectRole};

/// A user's role on one resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Membership<Id, R> {
    pub user_id: UserId,
    pub resource_id: Id,
    pub role: R,
}

pub type ProjectMembership = Membership<ResourceId, ProjectRole>;
pub type BoardMembership = Membership<BoardId, BoardRole>;

/// Outcome of fetching the memberships of one resource.
///
/// `Unavailable` (fetch failed) and a resource that was never fetched are
/// treated identically by the capability engine: no capabilities.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Facts<T> {
    Loaded(Vec<T>),
    Unavailable,
}

impl<T> Facts<T> {
    pub fn loaded(&self) -> Option<&[T]> {
        match self {
            Facts::Loaded(items) => Some(items),
            Facts::Unavailable => None,
        }
    }
}

/// All role facts known to the client at one point in time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoleFacts {
    projects: HashMap<ResourceId, Facts<ProjectMembership>>,
    boards: HashMap<BoardId, Facts<BoardMembership>>,
}

impl RoleFacts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_project(mut self, resource_id: ResourceId, facts: Facts<ProjectMembership>) -> Self {
        self.projects.insert(resource_id, facts);
        self
    }

    pub fn with_board(mut self, board_id: BoardId, facts: Facts<BoardMembership>) -> Self {
        self.boards.insert(board_id, facts);
        self
    }

    /// Loaded memberships of a project, `None` if unknown or unavailable.
    pub fn project(&self, resource_id: ResourceId) -> Option<&[ProjectMembership]> {
        self.projects.get(&resource_id).and_then(Facts::loaded)
    }

    /// Loaded memberships of a board, `None` if unknown or unavailable.
    pub fn board(&self, board_id: BoardId) -> Option<&[BoardMembership]> {
        self.boards.get(&board_id).and_then(Facts::loaded)
    }
}
