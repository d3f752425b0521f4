use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use quorum_auth::{BoardRole, Capabilities};
use quorum_core::{Aggregate, BoardId, DomainError, SubmissionId, UserId};

use crate::status::{Gate, SubmissionAction, SubmissionStatus};

/// The caller of a transition, reduced to what the gates look at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub user_id: UserId,
    /// Role on the submission's board, if any.
    pub board_role: Option<BoardRole>,
    /// Approval gate; unapproved accounts can read but never transition.
    pub may_mutate: bool,
}

impl Actor {
    /// Build an actor for `board_id` from a capability snapshot.
    ///
    /// Returns `None` for callers without a user profile (logged out or
    /// platform-operator sessions).
    pub fn from_capabilities(caps: &Capabilities, board_id: BoardId) -> Option<Self> {
        let user_id = caps.caller()?;
        Some(Self {
            user_id,
            board_role: caps.board_role(board_id),
            may_mutate: caps.may_mutate,
        })
    }

    fn passes(&self, gate: Gate, author_id: UserId) -> bool {
        if !self.may_mutate {
            return false;
        }
        match gate {
            Gate::Author => self.user_id == author_id,
            Gate::Reviewer => matches!(self.board_role, Some(BoardRole::Reviewer | BoardRole::BoardAdmin)),
            Gate::BoardAdmin => self.board_role == Some(BoardRole::BoardAdmin),
        }
    }
}

/// Aggregate root: Submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    id: SubmissionId,
    board_id: Option<BoardId>,
    author_id: Option<UserId>,
    status: SubmissionStatus,
    revision_round: u32,
    version: u64,
    created: bool,
}

impl Submission {
    /// Create an empty, not-yet-created aggregate instance for rehydration.
    pub fn empty(id: SubmissionId) -> Self {
        Self {
            id,
            board_id: None,
            author_id: None,
            status: SubmissionStatus::Draft,
            revision_round: 0,
            version: 0,
            created: false,
        }
    }

    pub fn id(&self) -> SubmissionId {
        self.id
    }

    pub fn board_id(&self) -> Option<BoardId> {
        self.board_id
    }

    pub fn author_id(&self) -> Option<UserId> {
        self.author_id
    }

    pub fn status(&self) -> SubmissionStatus {
        self.status
    }

    /// Number of times the submission came back after a revision request.
    pub fn revision_round(&self) -> u32 {
        self.revision_round
    }

    /// Whether `actor` may take `action` right now.
    pub fn can(&self, actor: &Actor, action: SubmissionAction) -> bool {
        self.check(actor, action).is_ok()
    }

    /// Actions the caller described by `caps` may take in the current state.
    ///
    /// Empty when the board's role facts are missing.
    pub fn available_actions(&self, caps: &Capabilities) -> Vec<SubmissionAction> {
        let Some(board_id) = self.board_id else {
            return Vec::new();
        };
        let Some(actor) = Actor::from_capabilities(caps, board_id) else {
            return Vec::new();
        };
        self.status
            .outgoing()
            .filter(|action| self.can(&actor, *action))
            .collect()
    }

    fn check(&self, actor: &Actor, action: SubmissionAction) -> Result<(), DomainError> {
        if !self.created {
            return Err(DomainError::invariant("submission does not exist"));
        }
        if action.from() != self.status {
            return Err(DomainError::invariant(format!(
                "cannot {action} a submission that is {}",
                self.status
            )));
        }
        let author_id = self
            .author_id
            .ok_or_else(|| DomainError::invariant("submission has no author"))?;
        if !actor.passes(action.gate(), author_id) {
            return Err(DomainError::forbidden(format!("caller may not {action}")));
        }
        Ok(())
    }
}

/// Command: CreateDraft.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateDraft {
    pub submission_id: SubmissionId,
    pub board_id: BoardId,
    pub author_id: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Payload shared by every lifecycle command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transition {
    pub submission_id: SubmissionId,
    pub actor: Actor,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SubmissionCommand {
    CreateDraft(CreateDraft),
    Submit(Transition),
    BeginTriage(Transition),
    AssignToMain(Transition),
    StartReview(Transition),
    RecordDecision(Transition),
    Accept(Transition),
    RequestRevision(Transition),
    Decline(Transition),
    Resubmit(Transition),
}

impl SubmissionCommand {
    /// Build the lifecycle command for `action`.
    pub fn for_action(action: SubmissionAction, transition: Transition) -> Self {
        match action {
            SubmissionAction::Submit => SubmissionCommand::Submit(transition),
            SubmissionAction::BeginTriage => SubmissionCommand::BeginTriage(transition),
            SubmissionAction::AssignToMain => SubmissionCommand::AssignToMain(transition),
            SubmissionAction::StartReview => SubmissionCommand::StartReview(transition),
            SubmissionAction::RecordDecision => SubmissionCommand::RecordDecision(transition),
            SubmissionAction::Accept => SubmissionCommand::Accept(transition),
            SubmissionAction::RequestRevision => SubmissionCommand::RequestRevision(transition),
            SubmissionAction::Decline => SubmissionCommand::Decline(transition),
            SubmissionAction::Resubmit => SubmissionCommand::Resubmit(transition),
        }
    }

    fn transition(&self) -> Option<(SubmissionAction, &Transition)> {
        let pair = match self {
            SubmissionCommand::CreateDraft(_) => return None,
            SubmissionCommand::Submit(t) => (SubmissionAction::Submit, t),
            SubmissionCommand::BeginTriage(t) => (SubmissionAction::BeginTriage, t),
            SubmissionCommand::AssignToMain(t) => (SubmissionAction::AssignToMain, t),
            SubmissionCommand::StartReview(t) => (SubmissionAction::StartReview, t),
            SubmissionCommand::RecordDecision(t) => (SubmissionAction::RecordDecision, t),
            SubmissionCommand::Accept(t) => (SubmissionAction::Accept, t),
            SubmissionCommand::RequestRevision(t) => (SubmissionAction::RequestRevision, t),
            SubmissionCommand::Decline(t) => (SubmissionAction::Decline, t),
            SubmissionCommand::Resubmit(t) => (SubmissionAction::Resubmit, t),
        };
        Some(pair)
    }
}

/// Event: SubmissionCreated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionCreated {
    pub submission_id: SubmissionId,
    pub board_id: BoardId,
    pub author_id: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Payload shared by every lifecycle event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusChanged {
    pub submission_id: SubmissionId,
    pub from: SubmissionStatus,
    pub to: SubmissionStatus,
    pub by: UserId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SubmissionEvent {
    SubmissionCreated(SubmissionCreated),
    Submitted(StatusChanged),
    TriageBegun(StatusChanged),
    AssignedToMain(StatusChanged),
    ReviewStarted(StatusChanged),
    DecisionRecorded(StatusChanged),
    Accepted(StatusChanged),
    RevisionRequested(StatusChanged),
    Declined(StatusChanged),
    Resubmitted(StatusChanged),
}

impl SubmissionEvent {
    fn for_action(action: SubmissionAction, change: StatusChanged) -> Self {
        match action {
            SubmissionAction::Submit => SubmissionEvent::Submitted(change),
            SubmissionAction::BeginTriage => SubmissionEvent::TriageBegun(change),
            SubmissionAction::AssignToMain => SubmissionEvent::AssignedToMain(change),
            SubmissionAction::StartReview => SubmissionEvent::ReviewStarted(change),
            SubmissionAction::RecordDecision => SubmissionEvent::DecisionRecorded(change),
            SubmissionAction::Accept => SubmissionEvent::Accepted(change),
            SubmissionAction::RequestRevision => SubmissionEvent::RevisionRequested(change),
            SubmissionAction::Decline => SubmissionEvent::Declined(change),
            SubmissionAction::Resubmit => SubmissionEvent::Resubmitted(change),
        }
    }

    pub fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            SubmissionEvent::SubmissionCreated(e) => e.occurred_at,
            SubmissionEvent::Submitted(e)
            | SubmissionEvent::TriageBegun(e)
            | SubmissionEvent::AssignedToMain(e)
            | SubmissionEvent::ReviewStarted(e)
            | SubmissionEvent::DecisionRecorded(e)
            | SubmissionEvent::Accepted(e)
            | SubmissionEvent::RevisionRequested(e)
            | SubmissionEvent::Declined(e)
            | SubmissionEvent::Resubmitted(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Submission {
    type Command = SubmissionCommand;
    type Event = SubmissionEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            SubmissionEvent::SubmissionCreated(e) => {
                self.id = e.submission_id;
                self.board_id = Some(e.board_id);
                self.author_id = Some(e.author_id);
                self.status = SubmissionStatus::Draft;
                self.revision_round = 0;
                self.created = true;
            }
            SubmissionEvent::Resubmitted(e) => {
                self.status = e.to;
                self.revision_round += 1;
            }
            SubmissionEvent::Submitted(e)
            | SubmissionEvent::TriageBegun(e)
            | SubmissionEvent::AssignedToMain(e)
            | SubmissionEvent::ReviewStarted(e)
            | SubmissionEvent::DecisionRecorded(e)
            | SubmissionEvent::Accepted(e)
            | SubmissionEvent::RevisionRequested(e)
            | SubmissionEvent::Declined(e) => {
                self.status = e.to;
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            SubmissionCommand::CreateDraft(cmd) => self.handle_create(cmd),
            other => match other.transition() {
                Some((action, transition)) => self.handle_transition(action, transition),
                None => Err(DomainError::invariant("unsupported command")),
            },
        }
    }

    fn version(&self) -> u64 {
        self.version
    }
}

impl Submission {
    fn handle_create(&self, cmd: &CreateDraft) -> Result<Vec<SubmissionEvent>, DomainError> {
        if self.created {
            return Err(DomainError::invariant("submission already exists"));
        }

        Ok(vec![SubmissionEvent::SubmissionCreated(SubmissionCreated {
            submission_id: cmd.submission_id,
            board_id: cmd.board_id,
            author_id: cmd.author_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_transition(
        &self,
        action: SubmissionAction,
        cmd: &Transition,
    ) -> Result<Vec<SubmissionEvent>, DomainError> {
        if self.id != cmd.submission_id {
            return Err(DomainError::invariant("submission_id mismatch"));
        }
        self.check(&cmd.actor, action)?;

        Ok(vec![SubmissionEvent::for_action(
            action,
            StatusChanged {
                submission_id: cmd.submission_id,
                from: self.status,
                to: action.to(),
                by: cmd.actor.user_id,
                occurred_at: cmd.occurred_at,
            },
        )])
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use quorum_auth::{
        ApprovalState, BoardMembership, Facts, Identity, Profile, RoleFacts, derive_capabilities,
    };

    use super::*;

    struct Fixture {
        submission: Submission,
        board_id: BoardId,
        author: Actor,
        reviewer: Actor,
        admin: Actor,
    }

    fn actor(board_role: Option<BoardRole>) -> Actor {
        Actor {
            user_id: UserId::new(),
            board_role,
            may_mutate: true,
        }
    }

    fn fixture() -> Fixture {
        let id = SubmissionId::new();
        let board_id = BoardId::new();
        let author = actor(Some(BoardRole::Member));
        let mut submission = Submission::empty(id);
        let events = submission
            .handle(&SubmissionCommand::CreateDraft(CreateDraft {
                submission_id: id,
                board_id,
                author_id: author.user_id,
                occurred_at: Utc::now(),
            }))
            .unwrap();
        submission.apply(&events[0]);

        Fixture {
            submission,
            board_id,
            author,
            reviewer: actor(Some(BoardRole::Reviewer)),
            admin: actor(Some(BoardRole::BoardAdmin)),
        }
    }

    fn step(submission: &mut Submission, action: SubmissionAction, actor: Actor) -> Result<(), DomainError> {
        let cmd = SubmissionCommand::for_action(
            action,
            Transition {
                submission_id: submission.id(),
                actor,
                occurred_at: Utc::now(),
            },
        );
        for event in submission.handle(&cmd)? {
            submission.apply(&event);
        }
        Ok(())
    }

    fn drive_to_under_review(f: &mut Fixture) {
        step(&mut f.submission, SubmissionAction::Submit, f.author).unwrap();
        step(&mut f.submission, SubmissionAction::BeginTriage, f.admin).unwrap();
        step(&mut f.submission, SubmissionAction::AssignToMain, f.admin).unwrap();
        step(&mut f.submission, SubmissionAction::StartReview, f.admin).unwrap();
        assert_eq!(f.submission.status(), SubmissionStatus::UnderReview);
    }

    fn caps_for(user_id: UserId, board_id: BoardId, roles: Vec<BoardRole>) -> Capabilities {
        let profile = Profile {
            id: user_id,
            email: "reviewer@acme.example".to_string(),
            full_name: "Reviewer".to_string(),
            is_superuser: false,
            is_approved: true,
            organization_onboarded: true,
        };
        let facts = RoleFacts::new().with_board(
            board_id,
            Facts::Loaded(
                roles
                    .into_iter()
                    .map(|role| BoardMembership {
                        user_id,
                        resource_id: board_id,
                        role,
                    })
                    .collect(),
            ),
        );
        derive_capabilities(&Identity::user(profile), ApprovalState { is_approved: true }, &facts)
    }

    #[test]
    fn full_happy_path_to_accepted() {
        let mut f = fixture();
        drive_to_under_review(&mut f);

        step(&mut f.submission, SubmissionAction::RecordDecision, f.reviewer).unwrap();
        step(&mut f.submission, SubmissionAction::Accept, f.admin).unwrap();

        assert_eq!(f.submission.status(), SubmissionStatus::Accepted);
        assert_eq!(f.submission.version(), 7);
        assert!(f.submission.status().is_terminal());
    }

    #[test]
    fn revision_cycle_counts_rounds() {
        let mut f = fixture();
        for round in 1..=3 {
            if round == 1 {
                step(&mut f.submission, SubmissionAction::Submit, f.author).unwrap();
            }
            step(&mut f.submission, SubmissionAction::BeginTriage, f.admin).unwrap();
            step(&mut f.submission, SubmissionAction::AssignToMain, f.admin).unwrap();
            step(&mut f.submission, SubmissionAction::StartReview, f.admin).unwrap();
            step(&mut f.submission, SubmissionAction::RecordDecision, f.reviewer).unwrap();
            step(&mut f.submission, SubmissionAction::RequestRevision, f.admin).unwrap();
            step(&mut f.submission, SubmissionAction::Resubmit, f.author).unwrap();
            assert_eq!(f.submission.revision_round(), round);
            assert_eq!(f.submission.status(), SubmissionStatus::Submitted);
        }
    }

    #[test]
    fn only_admin_moves_out_of_triage() {
        let mut f = fixture();
        step(&mut f.submission, SubmissionAction::Submit, f.author).unwrap();
        step(&mut f.submission, SubmissionAction::BeginTriage, f.admin).unwrap();

        let err = step(&mut f.submission, SubmissionAction::AssignToMain, f.reviewer).unwrap_err();
        assert!(matches!(err, DomainError::Forbidden(_)));
        assert_eq!(f.submission.status(), SubmissionStatus::InTriage);
    }

    #[test]
    fn only_author_submits() {
        let mut f = fixture();
        let err = step(&mut f.submission, SubmissionAction::Submit, f.admin).unwrap_err();
        assert!(matches!(err, DomainError::Forbidden(_)));
    }

    #[test]
    fn unapproved_actor_cannot_transition() {
        let mut f = fixture();
        let mut author = f.author;
        author.may_mutate = false;
        assert!(step(&mut f.submission, SubmissionAction::Submit, author).is_err());
    }

    #[test]
    fn wrong_source_state_is_an_invariant_error() {
        let mut f = fixture();
        let err = step(&mut f.submission, SubmissionAction::Accept, f.admin).unwrap_err();
        assert!(matches!(err, DomainError::InvariantViolation(_)));
    }

    #[test]
    fn terminal_states_refuse_everything() {
        let mut f = fixture();
        drive_to_under_review(&mut f);
        step(&mut f.submission, SubmissionAction::RecordDecision, f.admin).unwrap();
        step(&mut f.submission, SubmissionAction::Decline, f.admin).unwrap();

        for action in SubmissionAction::ALL {
            assert!(!f.submission.can(&f.admin, action));
        }
    }

    #[test]
    fn under_review_without_board_role_offers_nothing() {
        let mut f = fixture();
        drive_to_under_review(&mut f);

        let outsider = caps_for(UserId::new(), f.board_id, Vec::new());
        assert!(f.submission.available_actions(&outsider).is_empty());

        let member = caps_for(UserId::new(), f.board_id, vec![BoardRole::Member]);
        assert!(f.submission.available_actions(&member).is_empty());

        let reviewer = caps_for(UserId::new(), f.board_id, vec![BoardRole::Reviewer]);
        assert_eq!(
            f.submission.available_actions(&reviewer),
            vec![SubmissionAction::RecordDecision]
        );
    }

    #[test]
    fn missing_board_facts_offer_nothing() {
        let mut f = fixture();
        drive_to_under_review(&mut f);

        let profile = Profile {
            id: UserId::new(),
            email: "admin@acme.example".to_string(),
            full_name: "Admin".to_string(),
            is_superuser: true,
            is_approved: true,
            organization_onboarded: true,
        };
        let facts = RoleFacts::new().with_board(f.board_id, Facts::Unavailable);
        let caps = derive_capabilities(&Identity::user(profile), ApprovalState { is_approved: true }, &facts);

        assert!(f.submission.available_actions(&caps).is_empty());
        assert!(f.submission.available_actions(&Capabilities::none()).is_empty());
    }

    proptest! {
        /// Arbitrary command sequences never leave a terminal state and never
        /// produce an edge that is not part of the lifecycle.
        #[test]
        fn random_walks_respect_the_lifecycle(
            script in prop::collection::vec((0usize..9, 0usize..3), 0..40),
        ) {
            let mut f = fixture();
            let actors = [f.author, f.reviewer, f.admin];
            let mut terminal_reached: Option<SubmissionStatus> = None;

            for (action_ix, actor_ix) in script {
                let action = SubmissionAction::ALL[action_ix];
                let before = f.submission.status();
                let result = step(&mut f.submission, action, actors[actor_ix]);

                if let Some(terminal) = terminal_reached {
                    prop_assert!(result.is_err());
                    prop_assert_eq!(f.submission.status(), terminal);
                    continue;
                }
                if result.is_ok() {
                    prop_assert_eq!(action.from(), before);
                    prop_assert_eq!(f.submission.status(), action.to());
                } else {
                    prop_assert_eq!(f.submission.status(), before);
                }
                if f.submission.status().is_terminal() {
                    terminal_reached = Some(f.submission.status());
                }
            }
        }
    }
}
