//! Per-process assembly: one tenant, one session, one branding loader.

use std::sync::Arc;

use anyhow::Context;
use quorum_auth::{Capabilities, CredentialStore, Identity, RoleFacts};
use quorum_session::{SessionAuthority, SessionConfig, UnauthorizedSignal};
use quorum_store::{FileKeyValueStore, KeyValueStore};
use quorum_tenancy::{Branding, BrandingLoader, Tenant, TenantResolver};
use serde::Serialize;

use crate::config::ClientConfig;
use crate::http::ApiClient;

/// Read-only view of the capability flags that do not depend on a resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CapabilitySummary {
    pub is_authenticated: bool,
    pub is_platform_operator: bool,
    pub platform_operator_verified: bool,
    pub is_superuser: bool,
    pub may_mutate: bool,
}

impl From<&Capabilities> for CapabilitySummary {
    fn from(caps: &Capabilities) -> Self {
        Self {
            is_authenticated: caps.is_authenticated,
            is_platform_operator: caps.is_platform_operator,
            platform_operator_verified: caps.platform_operator_verified,
            is_superuser: caps.is_superuser,
            may_mutate: caps.may_mutate,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Snapshot {
    pub tenant: Tenant,
    pub branding: Branding,
    pub identity: Identity,
    pub capabilities: CapabilitySummary,
}

pub struct App {
    resolver: TenantResolver,
    tenant: Tenant,
    api: ApiClient,
    session: SessionAuthority,
    branding: BrandingLoader,
}

impl App {
    /// Open the persisted store named by `config` and wire everything to it.
    pub fn build(config: &ClientConfig) -> anyhow::Result<Self> {
        let path = config
            .store_path()
            .context("no data directory available; set QUORUM_DATA_DIR")?;
        let store = FileKeyValueStore::open(path.clone())
            .with_context(|| format!("failed to open session store at {}", path.display()))?;
        Ok(Self::with_store(config, Arc::new(store)))
    }

    pub fn with_store(config: &ClientConfig, store: Arc<dyn KeyValueStore>) -> Self {
        // A CLI process cannot reload in place; the next invocation picks the tenant up.
        let resolver = TenantResolver::new(
            store.clone(),
            Arc::new(|| tracing::info!("tenant override changed; takes effect on next start")),
        );
        let tenant = resolver.resolve(&config.hostname);

        let credentials = CredentialStore::new(store);
        let signal = UnauthorizedSignal::new();
        let api = ApiClient::new(config.api_url.clone(), tenant.clone(), credentials.clone(), signal.clone());

        let session = SessionAuthority::new(
            Arc::new(api.clone()),
            credentials,
            signal,
            SessionConfig::new(tenant.clone()),
        );
        let branding = BrandingLoader::new(Arc::new(api.clone()), tenant.clone());

        tracing::info!(tenant = %tenant.slug, host = %config.hostname, "tenant resolved");

        Self {
            resolver,
            tenant,
            api,
            session,
            branding,
        }
    }

    pub fn tenant(&self) -> &Tenant {
        &self.tenant
    }

    pub fn resolver(&self) -> &TenantResolver {
        &self.resolver
    }

    pub fn session(&self) -> &SessionAuthority {
        &self.session
    }

    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    /// Start the signal listener and replay the stored credential.
    pub async fn start(&self) -> anyhow::Result<()> {
        self.session.init().context("failed to start session listener")?;
        self.session.boot().await;
        Ok(())
    }

    pub fn shutdown(&self) {
        self.session.dispose();
    }

    pub async fn snapshot(&self, facts: &RoleFacts) -> Snapshot {
        let branding = self.branding.load().await;
        let identity = self.session.identity();
        let capabilities = CapabilitySummary::from(&self.session.capabilities(facts));

        Snapshot {
            tenant: self.tenant.clone(),
            branding,
            identity,
            capabilities,
        }
    }
}

impl core::fmt::Debug for App {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("App")
            .field("tenant", &self.tenant)
            .field("session", &self.session)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use quorum_session::SessionState;
    use quorum_store::InMemoryKeyValueStore;
    use quorum_tenancy::DEV_OVERRIDE_KEY;

    use super::*;

    fn config(hostname: &str) -> ClientConfig {
        ClientConfig::from_lookup(|key| match key {
            "QUORUM_HOSTNAME" => Some(hostname.to_string()),
            "QUORUM_API_URL" => Some("http://api.invalid/api".to_string()),
            _ => None,
        })
    }

    #[test]
    fn tenant_comes_from_hostname() {
        let app = App::with_store(&config("acme.app.example"), Arc::new(InMemoryKeyValueStore::new()));
        assert_eq!(app.tenant().slug.as_str(), "acme");
    }

    #[test]
    fn dev_override_applies_on_next_build() {
        let store = Arc::new(InMemoryKeyValueStore::new());
        let app = App::with_store(&config("localhost:5173"), store.clone());
        assert_eq!(app.tenant().slug.as_str(), "default");

        app.resolver().set_dev_override("globex").unwrap();
        assert_eq!(store.get(DEV_OVERRIDE_KEY).as_deref(), Some("globex"));

        let rebuilt = App::with_store(&config("localhost:5173"), store);
        assert_eq!(rebuilt.tenant().slug.as_str(), "globex");
    }

    #[tokio::test]
    async fn start_without_credential_needs_no_network() {
        let app = App::with_store(&config("acme.app.example"), Arc::new(InMemoryKeyValueStore::new()));

        app.start().await.unwrap();

        assert_eq!(app.session().state(), SessionState::Unauthenticated);
        let caps = CapabilitySummary::from(&app.session().capabilities(&RoleFacts::new()));
        assert!(!caps.is_authenticated);
        assert!(!caps.may_mutate);
        app.shutdown();
    }
}
