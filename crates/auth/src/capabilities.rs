//! Capability engine: identity + role facts → what the caller may do.
//!
//! - No IO
//! - No panics
//! - Recomputed from scratch on every change; never patched in place
//!
//! Every predicate answers `false` when the facts it needs are missing, so a
//! failed membership fetch can only ever remove capabilities.

use std::collections::BTreeSet;

use quorum_core::{BoardId, ResourceId, UserId};
use serde::Serialize;
use thiserror::Error;

use crate::membership::{ProjectMembership, RoleFacts};
use crate::profile::{ApprovalState, Identity, OperatorSource};
use crate::roles::{BoardRole, ProjectRole};

/// Why a membership action is not available.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CapabilityDenied {
    #[error("not authenticated")]
    NotAuthenticated,

    #[error("membership facts for this resource are unavailable")]
    FactsUnavailable,

    #[error("caller is not a member of this resource")]
    NotMember,

    #[error("resource would be left without a lead")]
    SoleLead,
}

/// Read-only capability snapshot for one identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Capabilities {
    pub is_authenticated: bool,
    pub is_platform_operator: bool,
    /// False when operator status rests only on the unverified credential claim.
    pub platform_operator_verified: bool,
    pub is_superuser: bool,
    /// Approved tenant users and superusers may write; everyone else reads.
    pub may_mutate: bool,
    caller: Option<UserId>,
    facts: RoleFacts,
}

pub fn derive_capabilities(identity: &Identity, approval: ApprovalState, facts: &RoleFacts) -> Capabilities {
    let is_superuser = identity.profile().is_some_and(|p| p.is_superuser);

    Capabilities {
        is_authenticated: identity.is_authenticated(),
        is_platform_operator: identity.is_platform_operator(),
        platform_operator_verified: identity.is_platform_operator()
            && identity.operator_source() == Some(OperatorSource::Login),
        is_superuser,
        may_mutate: approval.is_approved || is_superuser,
        caller: identity.user_id(),
        facts: facts.clone(),
    }
}

impl Capabilities {
    /// Capabilities of nobody (logged out).
    pub fn none() -> Self {
        derive_capabilities(&Identity::anonymous(), ApprovalState::default(), &RoleFacts::new())
    }

    pub fn caller(&self) -> Option<UserId> {
        self.caller
    }

    fn project(&self, resource_id: ResourceId) -> Option<&[ProjectMembership]> {
        self.facts.project(resource_id)
    }

    fn rows_of(&self, resource_id: ResourceId, user_id: UserId) -> impl Iterator<Item = &ProjectMembership> {
        self.project(resource_id)
            .unwrap_or_default()
            .iter()
            .filter(move |m| m.user_id == user_id)
    }

    /// A user holding several rows on one resource is a lead if any row says so.
    fn holds_lead(&self, resource_id: ResourceId, user_id: UserId) -> bool {
        self.rows_of(resource_id, user_id).any(|m| m.role == ProjectRole::Lead)
    }

    pub fn is_member(&self, resource_id: ResourceId) -> bool {
        match self.caller {
            Some(caller) => self.rows_of(resource_id, caller).next().is_some(),
            None => false,
        }
    }

    /// Superusers count as leads, but only for resources whose facts loaded.
    pub fn is_lead(&self, resource_id: ResourceId) -> bool {
        if self.project(resource_id).is_none() {
            return false;
        }
        if self.is_superuser {
            return true;
        }
        match self.caller {
            Some(caller) => self.holds_lead(resource_id, caller),
            None => false,
        }
    }

    /// Number of distinct users holding `Lead`; zero when facts are unavailable.
    pub fn lead_count(&self, resource_id: ResourceId) -> usize {
        self.project(resource_id)
            .map(|members| {
                members
                    .iter()
                    .filter(|m| m.role == ProjectRole::Lead)
                    .map(|m| m.user_id)
                    .collect::<BTreeSet<_>>()
                    .len()
            })
            .unwrap_or(0)
    }

    fn is_only_lead(&self, resource_id: ResourceId, user_id: UserId) -> bool {
        self.holds_lead(resource_id, user_id) && self.lead_count(resource_id) <= 1
    }

    /// Shared guard behind demote/remove/leave: the resource must keep a lead.
    fn check_keeps_a_lead(&self, resource_id: ResourceId, user_id: UserId) -> Result<(), CapabilityDenied> {
        if !self.is_authenticated {
            return Err(CapabilityDenied::NotAuthenticated);
        }
        if self.project(resource_id).is_none() {
            return Err(CapabilityDenied::FactsUnavailable);
        }
        if self.is_only_lead(resource_id, user_id) {
            return Err(CapabilityDenied::SoleLead);
        }
        Ok(())
    }

    pub fn check_demote(&self, resource_id: ResourceId, target: UserId) -> Result<(), CapabilityDenied> {
        self.check_keeps_a_lead(resource_id, target)
    }

    pub fn check_remove(&self, resource_id: ResourceId, target: UserId) -> Result<(), CapabilityDenied> {
        self.check_keeps_a_lead(resource_id, target)
    }

    pub fn check_leave(&self, resource_id: ResourceId) -> Result<(), CapabilityDenied> {
        let caller = self.caller.ok_or(CapabilityDenied::NotAuthenticated)?;
        self.check_keeps_a_lead(resource_id, caller)?;
        if !self.is_member(resource_id) {
            return Err(CapabilityDenied::NotMember);
        }
        Ok(())
    }

    pub fn can_demote(&self, resource_id: ResourceId, target: UserId) -> bool {
        self.check_demote(resource_id, target).is_ok()
    }

    pub fn can_remove(&self, resource_id: ResourceId, target: UserId) -> bool {
        self.check_remove(resource_id, target).is_ok()
    }

    pub fn can_leave(&self, resource_id: ResourceId) -> bool {
        self.check_leave(resource_id).is_ok()
    }

    /// Whether member-management actions should be offered at all.
    pub fn may_manage_members(&self, resource_id: ResourceId) -> bool {
        self.may_mutate && self.is_lead(resource_id)
    }

    /// Leads remaining if `user_id` stopped being a lead (`None` without facts).
    pub fn leads_after_demotion(&self, resource_id: ResourceId, user_id: UserId) -> Option<usize> {
        self.project(resource_id)?;
        let count = self.lead_count(resource_id);
        if self.holds_lead(resource_id, user_id) {
            Some(count.saturating_sub(1))
        } else {
            Some(count)
        }
    }

    /// The caller's role on a board, if facts are loaded and the caller has one.
    pub fn board_role(&self, board_id: BoardId) -> Option<BoardRole> {
        let caller = self.caller?;
        self.facts
            .board(board_id)?
            .iter()
            .filter(|m| m.user_id == caller)
            .map(|m| m.role)
            .max_by_key(|role| match role {
                BoardRole::Member => 0,
                BoardRole::Reviewer => 1,
                BoardRole::BoardAdmin => 2,
            })
    }

    pub fn is_board_admin(&self, board_id: BoardId) -> bool {
        self.board_role(board_id) == Some(BoardRole::BoardAdmin)
    }

    /// Reviewers and board admins may act on submissions under review.
    pub fn is_reviewer(&self, board_id: BoardId) -> bool {
        matches!(
            self.board_role(board_id),
            Some(BoardRole::Reviewer | BoardRole::BoardAdmin)
        )
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::membership::{BoardMembership, Facts, Membership};
    use crate::profile::Profile;

    fn profile(id: UserId, is_superuser: bool, is_approved: bool) -> Profile {
        Profile {
            id,
            email: format!("{id}@acme.example"),
            full_name: "Test User".to_string(),
            is_superuser,
            is_approved,
            organization_onboarded: true,
        }
    }

    fn member(resource_id: ResourceId, user_id: UserId, role: ProjectRole) -> ProjectMembership {
        Membership {
            user_id,
            resource_id,
            role,
        }
    }

    fn caps_for(identity: &Identity, facts: &RoleFacts) -> Capabilities {
        derive_capabilities(identity, identity.approval(), facts)
    }

    #[test]
    fn approval_gates_mutation_unless_superuser() {
        let facts = RoleFacts::new();
        let pending = Identity::user(profile(UserId::new(), false, false));
        let approved = Identity::user(profile(UserId::new(), false, true));
        let superuser = Identity::user(profile(UserId::new(), true, false));

        assert!(!caps_for(&pending, &facts).may_mutate);
        assert!(caps_for(&approved, &facts).may_mutate);
        assert!(caps_for(&superuser, &facts).may_mutate);
    }

    #[test]
    fn platform_operator_flags() {
        let facts = RoleFacts::new();
        let replayed = caps_for(&Identity::platform_operator(OperatorSource::Claims), &facts);
        let logged_in = caps_for(&Identity::platform_operator(OperatorSource::Login), &facts);

        assert!(replayed.is_platform_operator);
        assert!(!replayed.platform_operator_verified);
        assert!(logged_in.platform_operator_verified);
        assert!(!logged_in.may_mutate);
        assert!(!logged_in.is_superuser);
    }

    #[test]
    fn sole_lead_cannot_be_demoted_removed_or_leave() {
        let resource = ResourceId::new();
        let lead = UserId::new();
        let participant = UserId::new();
        let facts = RoleFacts::new().with_project(
            resource,
            Facts::Loaded(vec![
                member(resource, lead, ProjectRole::Lead),
                member(resource, participant, ProjectRole::Participant),
            ]),
        );
        let caps = caps_for(&Identity::user(profile(lead, false, true)), &facts);

        assert_eq!(caps.lead_count(resource), 1);
        assert!(caps.is_lead(resource));
        assert!(!caps.can_demote(resource, lead));
        assert!(!caps.can_remove(resource, lead));
        assert!(!caps.can_leave(resource));
        assert_eq!(caps.check_leave(resource), Err(CapabilityDenied::SoleLead));
        assert_eq!(caps.leads_after_demotion(resource, lead), Some(0));

        // Participants are never protected by the invariant.
        assert!(caps.can_demote(resource, participant));
        assert!(caps.can_remove(resource, participant));
    }

    #[test]
    fn second_lead_unlocks_the_original_lead() {
        let resource = ResourceId::new();
        let lead = UserId::new();
        let other = UserId::new();
        let before = RoleFacts::new().with_project(
            resource,
            Facts::Loaded(vec![
                member(resource, lead, ProjectRole::Lead),
                member(resource, other, ProjectRole::Participant),
            ]),
        );
        let after = RoleFacts::new().with_project(
            resource,
            Facts::Loaded(vec![
                member(resource, lead, ProjectRole::Lead),
                member(resource, other, ProjectRole::Lead),
            ]),
        );
        let identity = Identity::user(profile(lead, false, true));

        let caps = caps_for(&identity, &before);
        assert!(!caps.can_demote(resource, lead));

        let caps = caps_for(&identity, &after);
        assert!(caps.can_demote(resource, lead));
        assert!(caps.can_remove(resource, lead));
        assert!(caps.can_leave(resource));
    }

    #[test]
    fn duplicate_rows_do_not_hide_the_sole_lead() {
        let resource = ResourceId::new();
        let lead = UserId::new();
        let participant = UserId::new();
        let facts = RoleFacts::new().with_project(
            resource,
            Facts::Loaded(vec![
                member(resource, lead, ProjectRole::Participant),
                member(resource, lead, ProjectRole::Lead),
                member(resource, lead, ProjectRole::Lead),
                member(resource, participant, ProjectRole::Participant),
            ]),
        );
        let caps = caps_for(&Identity::user(profile(lead, false, true)), &facts);

        assert_eq!(caps.lead_count(resource), 1);
        assert!(caps.is_lead(resource));
        assert!(caps.is_member(resource));
        assert!(!caps.can_demote(resource, lead));
        assert!(!caps.can_remove(resource, lead));
        assert_eq!(caps.check_leave(resource), Err(CapabilityDenied::SoleLead));
        assert_eq!(caps.leads_after_demotion(resource, lead), Some(0));
    }

    #[test]
    fn unavailable_facts_grant_nothing() {
        let resource = ResourceId::new();
        let facts = RoleFacts::new().with_project(resource, Facts::Unavailable);
        let superuser = Identity::user(profile(UserId::new(), true, true));
        let caps = caps_for(&superuser, &facts);

        assert!(!caps.is_lead(resource));
        assert!(!caps.is_member(resource));
        assert!(!caps.may_manage_members(resource));
        assert!(!caps.can_demote(resource, UserId::new()));
        assert!(!caps.can_remove(resource, UserId::new()));
        assert!(!caps.can_leave(resource));
        assert_eq!(caps.lead_count(resource), 0);
        assert_eq!(
            caps.check_demote(resource, UserId::new()),
            Err(CapabilityDenied::FactsUnavailable)
        );

        // A resource that was never fetched behaves the same.
        let unknown = ResourceId::new();
        assert!(!caps.is_lead(unknown));
        assert_eq!(caps.leads_after_demotion(unknown, UserId::new()), None);
    }

    #[test]
    fn superuser_leads_loaded_resources() {
        let resource = ResourceId::new();
        let facts = RoleFacts::new().with_project(
            resource,
            Facts::Loaded(vec![member(resource, UserId::new(), ProjectRole::Lead)]),
        );
        let caps = caps_for(&Identity::user(profile(UserId::new(), true, false)), &facts);

        assert!(caps.is_lead(resource));
        assert!(!caps.is_member(resource));
        assert!(caps.may_manage_members(resource));
        assert_eq!(caps.check_leave(resource), Err(CapabilityDenied::NotMember));
    }

    #[test]
    fn unapproved_lead_cannot_manage_members() {
        let resource = ResourceId::new();
        let lead = UserId::new();
        let facts = RoleFacts::new().with_project(
            resource,
            Facts::Loaded(vec![member(resource, lead, ProjectRole::Lead)]),
        );
        let caps = caps_for(&Identity::user(profile(lead, false, false)), &facts);

        assert!(caps.is_lead(resource));
        assert!(!caps.may_manage_members(resource));
    }

    #[test]
    fn logged_out_has_no_capabilities() {
        let resource = ResourceId::new();
        let facts = RoleFacts::new().with_project(
            resource,
            Facts::Loaded(vec![
                member(resource, UserId::new(), ProjectRole::Lead),
                member(resource, UserId::new(), ProjectRole::Lead),
            ]),
        );
        let caps = derive_capabilities(&Identity::anonymous(), ApprovalState::default(), &facts);

        assert!(!caps.is_authenticated);
        assert!(!caps.can_demote(resource, UserId::new()));
        assert!(!caps.can_leave(resource));
        assert_eq!(Capabilities::none().caller(), None);
    }

    #[test]
    fn board_roles() {
        let board = BoardId::new();
        let reviewer = UserId::new();
        let admin = UserId::new();
        let facts = RoleFacts::new().with_board(
            board,
            Facts::Loaded(vec![
                BoardMembership {
                    user_id: reviewer,
                    resource_id: board,
                    role: BoardRole::Reviewer,
                },
                BoardMembership {
                    user_id: admin,
                    resource_id: board,
                    role: BoardRole::Member,
                },
                BoardMembership {
                    user_id: admin,
                    resource_id: board,
                    role: BoardRole::BoardAdmin,
                },
            ]),
        );

        let reviewer_caps = caps_for(&Identity::user(profile(reviewer, false, true)), &facts);
        let admin_caps = caps_for(&Identity::user(profile(admin, false, true)), &facts);
        let outsider_caps = caps_for(&Identity::user(profile(UserId::new(), true, true)), &facts);

        assert!(reviewer_caps.is_reviewer(board));
        assert!(!reviewer_caps.is_board_admin(board));
        assert!(admin_caps.is_board_admin(board));
        assert!(admin_caps.is_reviewer(board));
        assert_eq!(outsider_caps.board_role(board), None);
        assert!(!outsider_caps.is_reviewer(board));
    }

    proptest! {
        /// Whatever the membership mix, no predicate ever lets the last lead go.
        #[test]
        fn last_lead_is_always_protected(
            participants in 0usize..6,
            extra_leads in 0usize..4,
            shadow_rows in 0usize..3,
        ) {
            let resource = ResourceId::new();
            let lead = UserId::new();
            let mut members: Vec<_> = (0..shadow_rows)
                .map(|_| member(resource, lead, ProjectRole::Participant))
                .collect();
            members.push(member(resource, lead, ProjectRole::Lead));
            let mut other_leads = Vec::new();
            for _ in 0..extra_leads {
                let id = UserId::new();
                other_leads.push(id);
                members.push(member(resource, id, ProjectRole::Lead));
            }
            for _ in 0..participants {
                members.push(member(resource, UserId::new(), ProjectRole::Participant));
            }
            let facts = RoleFacts::new().with_project(resource, Facts::Loaded(members));
            let caps = caps_for(&Identity::user(profile(lead, false, true)), &facts);

            let expected = extra_leads > 0;
            prop_assert_eq!(caps.lead_count(resource), extra_leads + 1);
            prop_assert_eq!(caps.can_demote(resource, lead), expected);
            prop_assert_eq!(caps.can_remove(resource, lead), expected);
            prop_assert_eq!(caps.can_leave(resource), expected);
            for other in other_leads {
                prop_assert!(caps.can_demote(resource, other));
            }
        }
    }
}
