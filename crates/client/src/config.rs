//! Environment configuration.

use std::path::PathBuf;

use quorum_observability::LogFormat;

const DEFAULT_API_URL: &str = "http://localhost:8000/api";
const DEFAULT_HOSTNAME: &str = "localhost";
const STORE_FILE: &str = "session.json";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// API base URL, without a trailing slash.
    pub api_url: String,
    /// Origin host name used for tenant resolution.
    pub hostname: String,
    /// Directory for the persisted key/value file (OS data dir if unset).
    pub data_dir: Option<PathBuf>,
    /// Credential to log in with, if any.
    pub credential: Option<String>,
    pub platform_operator: bool,
    /// `QUORUM_LOG_FORMAT=pretty` for human-readable logs; JSON otherwise.
    pub log_format: LogFormat,
}

impl ClientConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable lookup (the environment in production).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let api_url = non_empty("QUORUM_API_URL")
            .unwrap_or_else(|| DEFAULT_API_URL.to_string())
            .trim_end_matches('/')
            .to_string();

        Self {
            api_url,
            hostname: non_empty("QUORUM_HOSTNAME").unwrap_or_else(|| DEFAULT_HOSTNAME.to_string()),
            data_dir: non_empty("QUORUM_DATA_DIR").map(PathBuf::from),
            credential: non_empty("QUORUM_CREDENTIAL"),
            platform_operator: non_empty("QUORUM_PLATFORM_OPERATOR")
                .is_some_and(|v| v.eq_ignore_ascii_case("true") || v == "1"),
            log_format: match non_empty("QUORUM_LOG_FORMAT") {
                Some(v) if v.eq_ignore_ascii_case("pretty") => LogFormat::Pretty,
                _ => LogFormat::Json,
            },
        }
    }

    /// Location of the persisted key/value file.
    pub fn store_path(&self) -> Option<PathBuf> {
        match &self.data_dir {
            Some(dir) => Some(dir.join(STORE_FILE)),
            None => quorum_store::default_store_path(),
        }
    }
}
