//! `quorum-tenancy` — which organization the client is talking to.
//!
//! The tenant is derived from the origin host name once per page load and never
//! changes afterwards; switching tenants in development goes through a reload.

pub mod branding;
pub mod resolver;
pub mod slug;

pub use branding::{Branding, BrandingLoader, BrandingSource};
pub use resolver::{
    DEV_OVERRIDE_KEY, ReloadHook, TenantResolver, is_development_host, is_platform_operator_tenant,
    resolve_tenant,
};
pub use slug::{DEFAULT_TENANT_SLUG, PLATFORM_OPERATOR_SLUG, Tenant, TenantSlug, TenancyError};
