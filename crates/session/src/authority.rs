//! Session authority: sole owner of the credential and the current identity.
//!
//! Every transition replaces the whole [`SessionState`] under one lock and
//! bumps an epoch. A profile response is applied only if the epoch it was
//! requested under is still current, so a logout or unauthorized signal that
//! lands while a fetch is in flight can never be undone by a late response.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use quorum_auth::{
    Capabilities, CredentialError, CredentialStore, Identity, OperatorSource, Profile, RoleFacts, StoredCredential,
    decode_claims, derive_capabilities,
};
use quorum_tenancy::Tenant;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::client::ProfileClient;
use crate::config::SessionConfig;
use crate::error::SessionError;
use crate::signal::UnauthorizedSignal;

/// Lifecycle of one session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    /// Stored credential not examined yet.
    Booting,
    Unauthenticated,
    /// Explicit login waiting for the profile.
    Authenticating,
    /// Stored credential replayed at boot, waiting for the profile.
    AuthenticatingViaReplay,
    User(Profile),
    PlatformOperator(OperatorSource),
}

impl SessionState {
    pub fn identity(&self) -> Identity {
        match self {
            SessionState::Booting => Identity::booting(),
            SessionState::Unauthenticated => Identity::anonymous(),
            SessionState::Authenticating | SessionState::AuthenticatingViaReplay => {
                Identity::authenticating()
            }
            SessionState::User(profile) => Identity::user(profile.clone()),
            SessionState::PlatformOperator(source) => Identity::platform_operator(*source),
        }
    }

    fn name(&self) -> &'static str {
        match self {
            SessionState::Booting => "booting",
            SessionState::Unauthenticated => "unauthenticated",
            SessionState::Authenticating => "authenticating",
            SessionState::AuthenticatingViaReplay => "authenticating_via_replay",
            SessionState::User(_) => "user",
            SessionState::PlatformOperator(_) => "platform_operator",
        }
    }
}

struct Slot {
    state: SessionState,
    epoch: u64,
    /// Credential whose boot-path replay is suppressed because `login` already
    /// owns its profile fetch. Consumed by the first boot reaction.
    replay_guard: Option<String>,
    /// Credential a failed clear left in the store. Never replayed.
    revoked: Option<String>,
    /// Unauthorized-signal raises already handled.
    signals_seen: u64,
}

struct Inner {
    profiles: Arc<dyn ProfileClient>,
    credentials: CredentialStore,
    config: SessionConfig,
    slot: Mutex<Slot>,
    identity: watch::Sender<Identity>,
    signal: UnauthorizedSignal,
    listener: Mutex<Option<JoinHandle<()>>>,
}

/// Cheap to clone; clones share one session.
#[derive(Clone)]
pub struct SessionAuthority {
    inner: Arc<Inner>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    // State is replaced wholesale, never left half-written.
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl SessionAuthority {
    pub fn new(
        profiles: Arc<dyn ProfileClient>,
        credentials: CredentialStore,
        signal: UnauthorizedSignal,
        config: SessionConfig,
    ) -> Self {
        let (identity, _rx) = watch::channel(Identity::booting());
        let signals_seen = signal.raised();

        Self {
            inner: Arc::new(Inner {
                profiles,
                credentials,
                config,
                slot: Mutex::new(Slot {
                    state: SessionState::Booting,
                    epoch: 0,
                    replay_guard: None,
                    revoked: None,
                    signals_seen,
                }),
                identity,
                signal,
                listener: Mutex::new(None),
            }),
        }
    }

    // ───────────────────────── lifecycle ─────────────────────────

    /// Start listening for unauthorized signals. Calling it twice is a no-op.
    pub fn init(&self) -> Result<(), SessionError> {
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| SessionError::NoRuntime)?;

        let mut listener = lock(&self.inner.listener);
        if listener.as_ref().is_some_and(|handle| !handle.is_finished()) {
            return Ok(());
        }

        let this = self.clone();
        let mut raised = self.inner.signal.subscribe();
        *listener = Some(runtime.spawn(async move {
            loop {
                this.handle_pending_signals();
                if raised.changed().await.is_err() {
                    break;
                }
            }
        }));

        tracing::debug!(tenant = %self.inner.config.tenant.slug, "session authority initialised");
        Ok(())
    }

    /// Stop the signal listener. Signals raised afterwards are still handled
    /// at the start of the next `login`.
    pub fn dispose(&self) {
        if let Some(handle) = lock(&self.inner.listener).take() {
            handle.abort();
            tracing::debug!(tenant = %self.inner.config.tenant.slug, "session authority disposed");
        }
    }

    // ───────────────────────── snapshots ─────────────────────────

    pub fn tenant(&self) -> &Tenant {
        &self.inner.config.tenant
    }

    pub fn state(&self) -> SessionState {
        lock(&self.inner.slot).state.clone()
    }

    pub fn identity(&self) -> Identity {
        self.inner.identity.borrow().clone()
    }

    /// Identity updates; every transition publishes a new value.
    pub fn subscribe(&self) -> watch::Receiver<Identity> {
        self.inner.identity.subscribe()
    }

    /// Capabilities for the current identity, derived afresh on every call.
    pub fn capabilities(&self, facts: &RoleFacts) -> Capabilities {
        let identity = self.identity();
        derive_capabilities(&identity, identity.approval(), facts)
    }

    // ───────────────────────── operations ─────────────────────────

    /// Boot-path reaction to the stored credential.
    ///
    /// - No credential: `Unauthenticated`.
    /// - Advisory platform-operator claim (or stored flag): operator session, no fetch.
    /// - Otherwise replay via the profile fetch; any failure clears the credential.
    ///
    /// If `login` just stored this same credential, the reaction is suppressed
    /// and `login` remains the only fetch for it.
    pub async fn boot(&self) {
        let stored = self.inner.credentials.load();

        let epoch = {
            let mut slot = lock(&self.inner.slot);
            let guard = slot.replay_guard.take();
            let suppressed = guard
                .as_deref()
                .is_some_and(|token| stored.as_ref().is_some_and(|c| c.token() == token));
            if suppressed {
                tracing::debug!("boot reaction suppressed; login owns the profile fetch");
                return;
            }

            let Some(credential) = stored.as_ref() else {
                self.replace(&mut slot, SessionState::Unauthenticated);
                tracing::info!(tenant = %self.inner.config.tenant.slug, "no stored credential");
                return;
            };

            if slot.revoked.as_deref() == Some(credential.token()) {
                // Retry the clear; the session stays logged out either way.
                let _ = self.clear_locked(&mut slot);
                tracing::info!(tenant = %self.inner.config.tenant.slug, "stored credential was logged out; not replaying");
                return;
            }

            let claims = decode_claims(credential.token());
            if let Some(claims) = &claims {
                if let Some(claimed) = claims.tenant.as_deref() {
                    if claimed != self.inner.config.tenant.slug.as_str() {
                        tracing::warn!(
                            tenant = %self.inner.config.tenant.slug,
                            claimed_tenant = %claimed,
                            "credential claims a different tenant; ignoring advisory claim"
                        );
                    }
                }
                if self.inner.config.honour_expiry && claims.is_expired(Utc::now()) {
                    let _ = self.clear_locked(&mut slot);
                    tracing::info!(tenant = %self.inner.config.tenant.slug, "stored credential expired; cleared");
                    return;
                }
            }

            let advertises_operator = credential.is_platform_operator()
                || claims.as_ref().is_some_and(|c| c.advertises_platform_operator());
            if advertises_operator {
                self.replace(&mut slot, SessionState::PlatformOperator(OperatorSource::Claims));
                tracing::info!(
                    tenant = %self.inner.config.tenant.slug,
                    "platform-operator session restored from credential claims"
                );
                return;
            }

            self.replace(&mut slot, SessionState::AuthenticatingViaReplay)
        };

        // Failure is already logged and reflected in the state.
        let _ = self.fetch_and_apply(epoch).await;
    }

    /// Store a fresh credential and establish the session for it.
    ///
    /// The credential is durable before any identity transition is published.
    /// Unauthorized signals raised before this call are handled first.
    pub async fn login(&self, token: impl Into<String>, is_platform_operator: bool) -> Result<(), SessionError> {
        self.handle_pending_signals();

        let credential = StoredCredential::new(token, is_platform_operator)?;

        let epoch = {
            let mut slot = lock(&self.inner.slot);
            self.inner.credentials.save(&credential)?;
            slot.revoked = None;
            slot.replay_guard = Some(credential.token().to_string());

            if is_platform_operator {
                self.replace(&mut slot, SessionState::PlatformOperator(OperatorSource::Login));
                tracing::info!(tenant = %self.inner.config.tenant.slug, "platform operator logged in");
                return Ok(());
            }
            self.replace(&mut slot, SessionState::Authenticating)
        };

        self.fetch_and_apply(epoch).await
    }

    /// Clear the credential and identity. No network; idempotent.
    ///
    /// The in-memory session is cleared even when the store cannot be
    /// written; the error then reports that the logout is not durable.
    pub fn logout(&self) -> Result<(), SessionError> {
        let mut slot = lock(&self.inner.slot);
        let was = slot.state.name();
        self.clear_locked(&mut slot)?;
        tracing::info!(tenant = %self.inner.config.tenant.slug, from = was, "logged out");
        Ok(())
    }

    /// Re-read the profile of a tenant user. No-op for any other state.
    ///
    /// A rejected credential ends the session; a transient failure keeps it.
    pub async fn refresh_user(&self) -> Result<(), SessionError> {
        let epoch = {
            let slot = lock(&self.inner.slot);
            match slot.state {
                SessionState::User(_) => slot.epoch,
                _ => {
                    tracing::debug!(state = slot.state.name(), "refresh skipped; not a tenant user session");
                    return Ok(());
                }
            }
        };

        match self.inner.profiles.fetch_profile().await {
            Ok(profile) => {
                let mut slot = lock(&self.inner.slot);
                if slot.epoch != epoch {
                    tracing::debug!("discarding stale profile refresh");
                    return Err(SessionError::Superseded);
                }
                self.publish(&mut slot, SessionState::User(profile));
                tracing::debug!("profile refreshed");
                Ok(())
            }
            Err(err) if err.is_unauthorized() => {
                let mut slot = lock(&self.inner.slot);
                if slot.epoch == epoch {
                    let _ = self.clear_locked(&mut slot);
                    tracing::info!("credential rejected during refresh; session cleared");
                }
                Err(err.into())
            }
            Err(err) => {
                tracing::warn!("profile refresh failed, keeping session: {err}");
                Err(err.into())
            }
        }
    }

    /// Clear the session in response to a rejected credential.
    ///
    /// Same effect as [`logout`](Self::logout); a no-op when already logged out.
    pub fn handle_unauthorized(&self) {
        let mut slot = lock(&self.inner.slot);
        self.clear_rejected(&mut slot, &[None]);
    }

    // ───────────────────────── internals ─────────────────────────

    /// Handle every signal raised since the last call, at most once.
    fn handle_pending_signals(&self) {
        let mut slot = lock(&self.inner.slot);
        let (raised, rejected) = self.inner.signal.since(slot.signals_seen);
        if raised <= slot.signals_seen {
            return;
        }
        slot.signals_seen = raised;
        self.clear_rejected(&mut slot, &rejected);
    }

    /// Clear the session if any rejection names the stored credential or
    /// names none at all.
    fn clear_rejected(&self, slot: &mut Slot, rejected: &[Option<String>]) {
        let current = self.inner.credentials.token();
        if slot.state == SessionState::Unauthenticated && current.is_none() {
            tracing::debug!("unauthorized signal while logged out; ignoring");
            return;
        }

        let hits_current = rejected
            .iter()
            .any(|r| r.is_none() || r.as_deref() == current.as_deref());
        if !hits_current {
            tracing::debug!("rejection was for a replaced credential; keeping session");
            return;
        }

        let was = slot.state.name();
        let _ = self.clear_locked(slot);
        tracing::info!(tenant = %self.inner.config.tenant.slug, from = was, "credential rejected; session cleared");
    }

    async fn fetch_and_apply(&self, epoch: u64) -> Result<(), SessionError> {
        let result = self.inner.profiles.fetch_profile().await;

        let mut slot = lock(&self.inner.slot);
        if slot.epoch != epoch {
            tracing::debug!("discarding stale profile response");
            return Err(SessionError::Superseded);
        }

        match result {
            Ok(profile) => {
                tracing::info!(
                    tenant = %self.inner.config.tenant.slug,
                    user_id = %profile.id,
                    "session authenticated"
                );
                self.publish(&mut slot, SessionState::User(profile));
                Ok(())
            }
            Err(err) => {
                tracing::warn!(
                    tenant = %self.inner.config.tenant.slug,
                    "profile fetch failed; clearing credential: {err}"
                );
                let _ = self.clear_locked(&mut slot);
                Err(err.into())
            }
        }
    }

    /// Start a new epoch with `state`. Returns the new epoch.
    fn replace(&self, slot: &mut Slot, state: SessionState) -> u64 {
        slot.epoch += 1;
        self.publish(slot, state);
        slot.epoch
    }

    fn publish(&self, slot: &mut Slot, state: SessionState) {
        let identity = state.identity();
        slot.state = state;
        self.inner.identity.send_if_modified(|current| {
            if *current == identity {
                false
            } else {
                *current = identity;
                true
            }
        });
    }

    /// Drop to `Unauthenticated`. A credential the store fails to forget is
    /// remembered as revoked so this process never replays it.
    fn clear_locked(&self, slot: &mut Slot) -> Result<(), CredentialError> {
        slot.replay_guard = None;
        let stored = self.inner.credentials.token();
        let cleared = self.inner.credentials.clear();
        match &cleared {
            Ok(()) => slot.revoked = None,
            Err(err) => {
                tracing::error!("failed to clear stored credential: {err}");
                slot.revoked = stored;
            }
        }
        self.replace(slot, SessionState::Unauthenticated);
        cleared
    }
}

impl core::fmt::Debug for SessionAuthority {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SessionAuthority")
            .field("tenant", &self.inner.config.tenant)
            .field("state", &self.state().name())
            .finish_non_exhaustive()
    }
}
