//! Tenant resolution from the request origin.
//!
//! Resolution never fails outward: a host that does not name a valid tenant is
//! logged and scoped to [`DEFAULT_TENANT_SLUG`].

use std::net::IpAddr;
use std::sync::Arc;

use quorum_store::KeyValueStore;

use crate::slug::{DEFAULT_TENANT_SLUG, PLATFORM_OPERATOR_SLUG, Tenant, TenantSlug, TenancyError};

/// Persisted key holding the development tenant override.
pub const DEV_OVERRIDE_KEY: &str = "tenant.dev_override";

/// Reaction to a tenant switch: the host application must tear down and
/// rebuild every per-tenant resource (session, branding, cached facts).
pub trait ReloadHook: Send + Sync {
    fn reload(&self);
}

impl<F> ReloadHook for F
where
    F: Fn() + Send + Sync,
{
    fn reload(&self) {
        self()
    }
}

/// Whether `hostname` is a loopback/development origin.
pub fn is_development_host(hostname: &str) -> bool {
    let host = normalize_host(hostname).to_ascii_lowercase();

    if host == "localhost" || host.ends_with(".localhost") || host == "0.0.0.0" {
        return true;
    }

    let bare = host.trim_start_matches('[').trim_end_matches(']');
    bare.parse::<IpAddr>().is_ok_and(|ip| ip.is_loopback())
}

/// Derive the active tenant from the origin host name.
///
/// - Development hosts read the override from `overrides` (default if unset or invalid).
/// - Otherwise the first DNS label is the candidate slug.
pub fn resolve_tenant(hostname: &str, overrides: &dyn KeyValueStore) -> Tenant {
    if is_development_host(hostname) {
        return match overrides.get(DEV_OVERRIDE_KEY) {
            Some(raw) => match TenantSlug::parse(&raw) {
                Ok(slug) => Tenant::new(slug),
                Err(_) => {
                    tracing::warn!(
                        override_slug = %raw,
                        "ignoring invalid development tenant override; using {DEFAULT_TENANT_SLUG}"
                    );
                    Tenant::default_tenant()
                }
            },
            None => Tenant::default_tenant(),
        };
    }

    let host = normalize_host(hostname);

    let bare = host.trim_start_matches('[').trim_end_matches(']');
    if bare.parse::<IpAddr>().is_ok() {
        tracing::warn!(host = %host, "IP origin carries no tenant; using {DEFAULT_TENANT_SLUG}");
        return Tenant::default_tenant();
    }

    let candidate = host.split('.').next().unwrap_or_default();
    match TenantSlug::parse(candidate) {
        Ok(slug) => Tenant::new(slug),
        Err(_) => {
            tracing::warn!(
                host = %host,
                candidate = %candidate,
                "host does not name a valid tenant; using {DEFAULT_TENANT_SLUG}"
            );
            Tenant::default_tenant()
        }
    }
}

/// Pure predicate: is this the reserved platform-operator tenant?
pub fn is_platform_operator_tenant(tenant: &Tenant) -> bool {
    tenant.slug.as_str() == PLATFORM_OPERATOR_SLUG
}

/// Strip surrounding whitespace, a trailing root dot and any `:port` suffix.
///
/// Case is preserved: an upper-case label is not a valid slug.
fn normalize_host(hostname: &str) -> String {
    let host = hostname.trim().to_string();

    let host = if let Some(end) = host.strip_prefix('[').and_then(|rest| rest.find(']')) {
        // Bracketed IPv6, possibly followed by a port.
        host[..end + 2].to_string()
    } else if host.matches(':').count() == 1 {
        host.split(':').next().unwrap_or_default().to_string()
    } else {
        host
    };

    host.trim_end_matches('.').to_string()
}

/// Tenant resolver bound to the persisted development override.
#[derive(Clone)]
pub struct TenantResolver {
    store: Arc<dyn KeyValueStore>,
    reload: Arc<dyn ReloadHook>,
}

impl TenantResolver {
    pub fn new(store: Arc<dyn KeyValueStore>, reload: Arc<dyn ReloadHook>) -> Self {
        Self { store, reload }
    }

    pub fn resolve(&self, hostname: &str) -> Tenant {
        resolve_tenant(hostname, self.store.as_ref())
    }

    /// Persist a development tenant override, then force a full reload.
    ///
    /// This is deliberately not an in-place change: every cached per-tenant
    /// resource must be re-fetched under the new tenant.
    pub fn set_dev_override(&self, slug: &str) -> Result<(), TenancyError> {
        let slug = TenantSlug::parse(slug)?;

        self.store
            .set(DEV_OVERRIDE_KEY, slug.as_str())
            .map_err(|e| TenancyError::Store(e.to_string()))?;

        tracing::info!(tenant = %slug, "development tenant override set; reloading");
        self.reload.reload();
        Ok(())
    }

    /// Remove the development override (back to the default tenant) and reload.
    pub fn clear_dev_override(&self) -> Result<(), TenancyError> {
        self.store
            .remove(DEV_OVERRIDE_KEY)
            .map_err(|e| TenancyError::Store(e.to_string()))?;

        tracing::info!("development tenant override cleared; reloading");
        self.reload.reload();
        Ok(())
    }
}

impl core::fmt::Debug for TenantResolver {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("TenantResolver").finish_non_exhaustive()
    }
}
