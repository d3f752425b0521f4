use serde::{Deserialize, Serialize};

/// Role within a project-style resource membership.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectRole {
    /// Elevated role; every resource keeps at least one.
    Lead,
    Participant,
}

/// Role within a review board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoardRole {
    Member,
    Reviewer,
    BoardAdmin,
}

impl ProjectRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProjectRole::Lead => "lead",
            ProjectRole::Participant => "participant",
        }
    }
}

impl BoardRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            BoardRole::Member => "member",
            BoardRole::Reviewer => "reviewer",
            BoardRole::BoardAdmin => "board_admin",
        }
    }
}

impl core::fmt::Display for ProjectRole {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl core::fmt::Display for BoardRole {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}
