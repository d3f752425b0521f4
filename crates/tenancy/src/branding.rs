//! Per-tenant display metadata.
//!
//! Branding is fetched at most once per session and never blocks
//! authentication. Any failure degrades to [`Branding::default`].

use std::sync::Arc;

use async_trait::async_trait;
use quorum_core::FetchError;
use serde::{Deserialize, Serialize};
use tokio::sync::OnceCell;

use crate::slug::Tenant;

const DEFAULT_NAME: &str = "Quorum";
const DEFAULT_PRIMARY_COLOR: &str = "#2563eb";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Branding {
    pub name: String,
    pub primary_color: String,
    #[serde(default)]
    pub icon_url: Option<String>,
}

impl Default for Branding {
    fn default() -> Self {
        Self {
            name: DEFAULT_NAME.to_string(),
            primary_color: DEFAULT_PRIMARY_COLOR.to_string(),
            icon_url: None,
        }
    }
}

impl Branding {
    /// Replace unusable fields with built-in defaults.
    fn sanitized(self) -> Self {
        let defaults = Branding::default();

        let name = if self.name.trim().is_empty() {
            defaults.name
        } else {
            self.name.trim().to_string()
        };

        let primary_color = if is_hex_color(&self.primary_color) {
            self.primary_color
        } else {
            defaults.primary_color
        };

        let icon_url = self.icon_url.filter(|url| !url.trim().is_empty());

        Self {
            name,
            primary_color,
            icon_url,
        }
    }
}

fn is_hex_color(raw: &str) -> bool {
    raw.strip_prefix('#').is_some_and(|hex| {
        matches!(hex.len(), 3 | 6) && hex.chars().all(|c| c.is_ascii_hexdigit())
    })
}

/// Source of tenant branding (HTTP in production, scripted in tests).
#[async_trait]
pub trait BrandingSource: Send + Sync {
    async fn fetch_tenant_branding(&self, tenant: &Tenant) -> Result<Branding, FetchError>;
}

/// Loads branding once for the tenant of this page load.
pub struct BrandingLoader {
    source: Arc<dyn BrandingSource>,
    tenant: Tenant,
    loaded: OnceCell<Branding>,
}

impl BrandingLoader {
    pub fn new(source: Arc<dyn BrandingSource>, tenant: Tenant) -> Self {
        Self {
            source,
            tenant,
            loaded: OnceCell::new(),
        }
    }

    pub fn tenant(&self) -> &Tenant {
        &self.tenant
    }

    /// Fetch branding on first call; later calls return the same value.
    ///
    /// A failed fetch is also remembered (as defaults) so a broken branding
    /// endpoint is not retried on every screen.
    pub async fn load(&self) -> Branding {
        self.loaded
            .get_or_init(|| async {
                match self.source.fetch_tenant_branding(&self.tenant).await {
                    Ok(branding) => {
                        tracing::debug!(tenant = %self.tenant.slug, "tenant branding loaded");
                        branding.sanitized()
                    }
                    Err(err) => {
                        tracing::warn!(
                            tenant = %self.tenant.slug,
                            "tenant branding unavailable, using defaults: {err}"
                        );
                        Branding::default()
                    }
                }
            })
            .await
            .clone()
    }

    /// Branding if already loaded, defaults otherwise.
    pub fn current(&self) -> Branding {
        self.loaded.get().cloned().unwrap_or_default()
    }
}

impl core::fmt::Debug for BrandingLoader {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("BrandingLoader")
            .field("tenant", &self.tenant)
            .field("loaded", &self.loaded.get())
            .finish()
    }
}
