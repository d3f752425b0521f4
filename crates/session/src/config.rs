use quorum_tenancy::Tenant;

/// Per-authority settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Tenant resolved for this page load.
    pub tenant: Tenant,
    /// Drop stored credentials whose advisory `exp` claim has passed.
    pub honour_expiry: bool,
}

impl SessionConfig {
    pub fn new(tenant: Tenant) -> Self {
        Self {
            tenant,
            honour_expiry: true,
        }
    }

    pub fn with_honour_expiry(mut self, honour_expiry: bool) -> Self {
        self.honour_expiry = honour_expiry;
        self
    }
}
