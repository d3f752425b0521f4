use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Tenant used whenever the origin does not name a valid one.
pub const DEFAULT_TENANT_SLUG: &str = "default";

/// Reserved tenant designating the platform-operator surface.
pub const PLATFORM_OPERATOR_SLUG: &str = "admin";

/// DNS label length limit; a longer slug can never be a real subdomain.
const MAX_SLUG_LEN: usize = 63;

static SLUG_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z0-9]([a-z0-9-]*[a-z0-9])?$").expect("invalid tenant slug pattern"));

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TenancyError {
    #[error("invalid tenant slug '{0}'")]
    InvalidSlug(String),

    #[error("failed to persist tenant override: {0}")]
    Store(String),
}

/// Validated tenant identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TenantSlug(String);

impl TenantSlug {
    pub fn parse(raw: &str) -> Result<Self, TenancyError> {
        if is_valid_slug(raw) {
            Ok(Self(raw.to_string()))
        } else {
            Err(TenancyError::InvalidSlug(raw.to_string()))
        }
    }

    pub fn default_tenant() -> Self {
        Self(DEFAULT_TENANT_SLUG.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for TenantSlug {
    type Error = TenancyError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<TenantSlug> for String {
    fn from(value: TenantSlug) -> Self {
        value.0
    }
}

impl core::fmt::Display for TenantSlug {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

pub fn is_valid_slug(raw: &str) -> bool {
    raw.len() <= MAX_SLUG_LEN && SLUG_PATTERN.is_match(raw)
}

/// The active organization for this page load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tenant {
    pub slug: TenantSlug,
    pub is_platform_operator_tenant: bool,
}

impl Tenant {
    pub fn new(slug: TenantSlug) -> Self {
        let is_platform_operator_tenant = slug.as_str() == PLATFORM_OPERATOR_SLUG;
        Self {
            slug,
            is_platform_operator_tenant,
        }
    }

    pub fn default_tenant() -> Self {
        Self::new(TenantSlug::default_tenant())
    }
}
