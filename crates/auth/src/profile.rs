//! Authenticated identity, as owned by the session authority.

use quorum_core::UserId;
use serde::{Deserialize, Serialize};

/// Server-side user profile (result of the profile fetch).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub id: UserId,
    pub email: String,
    pub full_name: String,
    #[serde(default)]
    pub is_superuser: bool,
    #[serde(default)]
    pub is_approved: bool,
    /// Whether the tenant finished onboarding (re-read via `refresh_user`).
    #[serde(default)]
    pub organization_onboarded: bool,
}

/// Coarse "may mutate anything" gate, independent of role.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalState {
    pub is_approved: bool,
}

/// Where a platform-operator session's status came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperatorSource {
    /// Replayed at boot from the credential's advisory claim (unverified).
    Claims,
    /// Established by an explicit login response.
    Login,
}

/// Read-only identity snapshot.
///
/// Invariant: `is_authenticated == user.is_some() || is_platform_operator`.
/// Fields are private so the invariant holds for every constructed value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Identity {
    user: Option<Profile>,
    is_platform_operator: bool,
    operator_source: Option<OperatorSource>,
    is_authenticated: bool,
    is_loading: bool,
}

impl Identity {
    /// Initial value before the stored credential has been examined.
    pub fn booting() -> Self {
        Self {
            is_loading: true,
            ..Self::anonymous()
        }
    }

    pub fn anonymous() -> Self {
        Self {
            user: None,
            is_platform_operator: false,
            operator_source: None,
            is_authenticated: false,
            is_loading: false,
        }
    }

    /// A profile fetch is in flight.
    pub fn authenticating() -> Self {
        Self::booting()
    }

    pub fn user(profile: Profile) -> Self {
        Self {
            user: Some(profile),
            is_platform_operator: false,
            operator_source: None,
            is_authenticated: true,
            is_loading: false,
        }
    }

    pub fn platform_operator(source: OperatorSource) -> Self {
        Self {
            user: None,
            is_platform_operator: true,
            operator_source: Some(source),
            is_authenticated: true,
            is_loading: false,
        }
    }

    pub fn profile(&self) -> Option<&Profile> {
        self.user.as_ref()
    }

    pub fn user_id(&self) -> Option<UserId> {
        self.user.as_ref().map(|p| p.id)
    }

    pub fn is_platform_operator(&self) -> bool {
        self.is_platform_operator
    }

    pub fn operator_source(&self) -> Option<OperatorSource> {
        self.operator_source
    }

    pub fn is_authenticated(&self) -> bool {
        self.is_authenticated
    }

    pub fn is_loading(&self) -> bool {
        self.is_loading
    }

    pub fn approval(&self) -> ApprovalState {
        ApprovalState {
            is_approved: self.user.as_ref().is_some_and(|p| p.is_approved),
        }
    }
}

impl Default for Identity {
    fn default() -> Self {
        Self::booting()
    }
}
