//! reqwest-backed implementations of the engine's outbound collaborators.
//!
//! Every request carries the stored credential (if any) and the tenant slug.
//! A 401 from any endpoint raises the unauthorized signal, tagged with the
//! credential that was sent, before the error is returned to the caller.

use async_trait::async_trait;
use quorum_auth::{BoardMembership, CredentialStore, Profile, ProjectMembership};
use quorum_core::{BoardId, FetchError, ResourceId};
use quorum_session::{MembershipClient, ProfileClient, UnauthorizedSignal};
use quorum_tenancy::{Branding, BrandingSource, Tenant};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;

pub const TENANT_HEADER: &str = "X-Tenant";

const PROFILE_PATH: &str = "/users/me/";
const BRANDING_PATH: &str = "/tenant/branding/";

#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    tenant: Tenant,
    credentials: CredentialStore,
    signal: UnauthorizedSignal,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>, tenant: Tenant, credentials: CredentialStore, signal: UnauthorizedSignal) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
            tenant,
            credentials,
            signal,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, FetchError> {
        let mut req = self
            .http
            .get(self.url(path))
            .header(TENANT_HEADER, self.tenant.slug.as_str());

        let sent = self.credentials.token();
        if let Some(token) = &sent {
            req = req.bearer_auth(token);
        }

        let resp = req.send().await.map_err(|e| FetchError::Network(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(self.reject(status, body, sent.as_deref()));
        }

        resp.json::<T>().await.map_err(|e| FetchError::Decode(e.to_string()))
    }

    /// Map a non-success status to a fetch error, raising the signal on 401.
    /// The signal names the credential the request carried.
    fn reject(&self, status: StatusCode, body: String, sent: Option<&str>) -> FetchError {
        if status == StatusCode::UNAUTHORIZED {
            tracing::warn!(tenant = %self.tenant.slug, "credential rejected by API");
            match sent {
                Some(token) => self.signal.raise_for(token),
                None => self.signal.raise(),
            }
            return FetchError::Unauthorized;
        }
        FetchError::Api(status.as_u16(), body)
    }
}

impl core::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.base_url)
            .field("tenant", &self.tenant.slug)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl ProfileClient for ApiClient {
    async fn fetch_profile(&self) -> Result<Profile, FetchError> {
        self.get_json(PROFILE_PATH).await
    }
}

#[async_trait]
impl MembershipClient for ApiClient {
    async fn fetch_project_memberships(
        &self,
        resource_id: ResourceId,
    ) -> Result<Vec<ProjectMembership>, FetchError> {
        self.get_json(&format!("/projects/{resource_id}/members/")).await
    }

    async fn fetch_board_memberships(&self, board_id: BoardId) -> Result<Vec<BoardMembership>, FetchError> {
        self.get_json(&format!("/boards/{board_id}/members/")).await
    }
}

#[async_trait]
impl BrandingSource for ApiClient {
    async fn fetch_tenant_branding(&self, _tenant: &Tenant) -> Result<Branding, FetchError> {
        self.get_json(BRANDING_PATH).await
    }
}
