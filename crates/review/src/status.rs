use serde::{Deserialize, Serialize};

/// Submission status lifecycle.
///
/// `Accepted` and `Declined` are terminal. `RevisionRequested` loops back to
/// `Submitted` as many times as the board asks for changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionStatus {
    Draft,
    Submitted,
    InTriage,
    AssignedToMain,
    UnderReview,
    DecisionMade,
    Accepted,
    RevisionRequested,
    Declined,
}

impl SubmissionStatus {
    pub const ALL: [SubmissionStatus; 9] = [
        SubmissionStatus::Draft,
        SubmissionStatus::Submitted,
        SubmissionStatus::InTriage,
        SubmissionStatus::AssignedToMain,
        SubmissionStatus::UnderReview,
        SubmissionStatus::DecisionMade,
        SubmissionStatus::Accepted,
        SubmissionStatus::RevisionRequested,
        SubmissionStatus::Declined,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SubmissionStatus::Draft => "draft",
            SubmissionStatus::Submitted => "submitted",
            SubmissionStatus::InTriage => "in_triage",
            SubmissionStatus::AssignedToMain => "assigned_to_main",
            SubmissionStatus::UnderReview => "under_review",
            SubmissionStatus::DecisionMade => "decision_made",
            SubmissionStatus::Accepted => "accepted",
            SubmissionStatus::RevisionRequested => "revision_requested",
            SubmissionStatus::Declined => "declined",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, SubmissionStatus::Accepted | SubmissionStatus::Declined)
    }

    /// Actions whose source state is `self`.
    pub fn outgoing(&self) -> impl Iterator<Item = SubmissionAction> + '_ {
        SubmissionAction::ALL.into_iter().filter(move |a| a.from() == *self)
    }
}

impl core::fmt::Display for SubmissionStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Who may perform a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Gate {
    /// The submission's author.
    Author,
    /// A reviewer or board admin of the owning board.
    Reviewer,
    /// A board admin of the owning board.
    BoardAdmin,
}

/// A single edge of the lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionAction {
    Submit,
    BeginTriage,
    AssignToMain,
    StartReview,
    RecordDecision,
    Accept,
    RequestRevision,
    Decline,
    Resubmit,
}

impl SubmissionAction {
    pub const ALL: [SubmissionAction; 9] = [
        SubmissionAction::Submit,
        SubmissionAction::BeginTriage,
        SubmissionAction::AssignToMain,
        SubmissionAction::StartReview,
        SubmissionAction::RecordDecision,
        SubmissionAction::Accept,
        SubmissionAction::RequestRevision,
        SubmissionAction::Decline,
        SubmissionAction::Resubmit,
    ];

    pub fn from(&self) -> SubmissionStatus {
        match self {
            SubmissionAction::Submit => SubmissionStatus::Draft,
            SubmissionAction::BeginTriage => SubmissionStatus::Submitted,
            SubmissionAction::AssignToMain => SubmissionStatus::InTriage,
            SubmissionAction::StartReview => SubmissionStatus::AssignedToMain,
            SubmissionAction::RecordDecision => SubmissionStatus::UnderReview,
            SubmissionAction::Accept | SubmissionAction::RequestRevision | SubmissionAction::Decline => {
                SubmissionStatus::DecisionMade
            }
            SubmissionAction::Resubmit => SubmissionStatus::RevisionRequested,
        }
    }

    pub fn to(&self) -> SubmissionStatus {
        match self {
            SubmissionAction::Submit | SubmissionAction::Resubmit => SubmissionStatus::Submitted,
            SubmissionAction::BeginTriage => SubmissionStatus::InTriage,
            SubmissionAction::AssignToMain => SubmissionStatus::AssignedToMain,
            SubmissionAction::StartReview => SubmissionStatus::UnderReview,
            SubmissionAction::RecordDecision => SubmissionStatus::DecisionMade,
            SubmissionAction::Accept => SubmissionStatus::Accepted,
            SubmissionAction::RequestRevision => SubmissionStatus::RevisionRequested,
            SubmissionAction::Decline => SubmissionStatus::Declined,
        }
    }

    pub fn gate(&self) -> Gate {
        match self {
            SubmissionAction::Submit | SubmissionAction::Resubmit => Gate::Author,
            SubmissionAction::RecordDecision => Gate::Reviewer,
            SubmissionAction::BeginTriage
            | SubmissionAction::AssignToMain
            | SubmissionAction::StartReview
            | SubmissionAction::Accept
            | SubmissionAction::RequestRevision
            | SubmissionAction::Decline => Gate::BoardAdmin,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SubmissionAction::Submit => "submit",
            SubmissionAction::BeginTriage => "begin_triage",
            SubmissionAction::AssignToMain => "assign_to_main",
            SubmissionAction::StartReview => "start_review",
            SubmissionAction::RecordDecision => "record_decision",
            SubmissionAction::Accept => "accept",
            SubmissionAction::RequestRevision => "request_revision",
            SubmissionAction::Decline => "decline",
            SubmissionAction::Resubmit => "resubmit",
        }
    }
}

impl core::fmt::Display for SubmissionAction {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_states_have_no_exits() {
        for status in SubmissionStatus::ALL {
            let exits = status.outgoing().count();
            assert_eq!(status.is_terminal(), exits == 0, "{status}");
        }
    }

    #[test]
    fn decision_fans_out_three_ways() {
        let mut targets: Vec<_> = SubmissionStatus::DecisionMade.outgoing().map(|a| a.to()).collect();
        targets.sort_by_key(|s| s.as_str());
        assert_eq!(
            targets,
            vec![
                SubmissionStatus::Accepted,
                SubmissionStatus::Declined,
                SubmissionStatus::RevisionRequested,
            ]
        );
    }

    #[test]
    fn leaving_review_needs_a_reviewer_and_triage_needs_an_admin() {
        for action in SubmissionStatus::UnderReview.outgoing() {
            assert_eq!(action.gate(), Gate::Reviewer);
        }
        for status in [SubmissionStatus::InTriage, SubmissionStatus::AssignedToMain] {
            for action in status.outgoing() {
                assert_eq!(action.gate(), Gate::BoardAdmin);
            }
        }
    }

    #[test]
    fn revision_loops_back_to_submitted() {
        assert_eq!(SubmissionAction::Resubmit.from(), SubmissionStatus::RevisionRequested);
        assert_eq!(SubmissionAction::Resubmit.to(), SubmissionStatus::Submitted);
        assert!(!SubmissionStatus::RevisionRequested.is_terminal());
    }
}
