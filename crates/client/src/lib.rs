//! `quorum-client` — wiring of the engine against a real API.
//!
//! Owns configuration, the reqwest-backed collaborators and the per-process
//! assembly of tenant, session and branding.

pub mod app;
pub mod config;
pub mod http;

pub use app::{App, CapabilitySummary, Snapshot};
pub use config::ClientConfig;
pub use http::ApiClient;
