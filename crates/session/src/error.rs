use quorum_auth::CredentialError;
use quorum_core::FetchError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Credential(#[from] CredentialError),

    #[error("profile fetch failed: {0}")]
    Profile(#[from] FetchError),

    /// A logout, unauthorized signal or newer login won the race.
    #[error("session changed while the request was in flight")]
    Superseded,

    #[error("no async runtime available to run the signal listener")]
    NoRuntime,
}
