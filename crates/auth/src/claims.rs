//! Client-side decoding of the credential's payload segment.
//!
//! Nothing here verifies a signature. Claims are a hint used to skip work on
//! the platform-operator surface, never a source of authority.

use base64::Engine;
use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// URL-safe alphabet, tolerant of both padded and unpadded segments.
const PAYLOAD_ENGINE: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Untrusted claims decoded from a bearer credential.
///
/// Unknown fields are ignored; every known field is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdvisoryClaims {
    /// Subject (server-side user id), if present.
    pub sub: Option<String>,

    /// Tenant slug the credential was issued for.
    pub tenant: Option<String>,

    /// Platform-operator hint.
    #[serde(alias = "is_platform_admin")]
    pub is_platform_operator: Option<bool>,

    /// Expiry, seconds since the Unix epoch.
    pub exp: Option<i64>,

    /// Issued-at, seconds since the Unix epoch.
    pub iat: Option<i64>,
}

impl AdvisoryClaims {
    pub fn advertises_platform_operator(&self) -> bool {
        self.is_platform_operator.unwrap_or(false)
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.exp.and_then(|secs| DateTime::from_timestamp(secs, 0))
    }

    /// True only when an expiry is present and already elapsed.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at().is_some_and(|exp| now >= exp)
    }
}

/// Decode the middle segment of a `header.payload.signature` credential.
///
/// Any structural problem yields `None` ("no claims"); this function never
/// panics on arbitrary input.
pub fn decode_claims(credential: &str) -> Option<AdvisoryClaims> {
    let mut segments = credential.trim().split('.');
    let (_header, payload, _signature) = (segments.next()?, segments.next()?, segments.next()?);
    if segments.next().is_some() || payload.is_empty() {
        return None;
    }

    let bytes = PAYLOAD_ENGINE.decode(payload).ok()?;
    let value: serde_json::Value = serde_json::from_slice(&bytes).ok()?;
    if !value.is_object() {
        return None;
    }

    serde_json::from_value(value).ok()
}
