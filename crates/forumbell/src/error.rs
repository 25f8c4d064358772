//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` into user-facing errors with
//! actionable help text.

use miette::Diagnostic;
use thiserror::Error;

use forumbell_config::ConfigError;
use forumbell_core::CoreError;

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const PAIRING: i32 = 3;
    pub const NOT_FOUND: i32 = 4;
    pub const UNSUPPORTED: i32 = 5;
    pub const STORAGE: i32 = 6;
    pub const CONNECTION: i32 = 7;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Discovery ────────────────────────────────────────────────────

    #[error("{term} was not found")]
    #[diagnostic(
        code(forumbell::site_not_found),
        help("Check the address and that the forum is reachable from here.")
    )]
    SiteNotFound { term: String },

    #[error("{term} does not support mobile APIs")]
    #[diagnostic(
        code(forumbell::no_mobile_api),
        help("The forum owner needs to upgrade Discourse to a version with user API keys.")
    )]
    NoMobileApi { term: String },

    // ── Sites ────────────────────────────────────────────────────────

    #[error("Forum '{identifier}' is not in your list")]
    #[diagnostic(
        code(forumbell::not_found),
        help("Run: forumbell list to see tracked forums")
    )]
    NotFound { identifier: String },

    // ── Pairing ──────────────────────────────────────────────────────

    #[error("Pairing failed: {message}")]
    #[diagnostic(
        code(forumbell::pairing_failed),
        help("Start over with: forumbell pair <site>, and paste the newest redirect URL.")
    )]
    Pairing { message: String },

    // ── Identity & storage ───────────────────────────────────────────

    #[error("Cannot establish device identity: {reason}")]
    #[diagnostic(
        code(forumbell::identity),
        help("Check that the data directory is writable.\nData dir: {data_dir}")
    )]
    Identity { reason: String, data_dir: String },

    #[error("Failed to save '{key}': {reason}")]
    #[diagnostic(
        code(forumbell::storage),
        help("Check that the data directory is writable.\nData dir: {data_dir}")
    )]
    Storage {
        key: String,
        reason: String,
        data_dir: String,
    },

    // ── API ──────────────────────────────────────────────────────────

    #[error("Request failed: {message}")]
    #[diagnostic(code(forumbell::api_error))]
    Api {
        message: String,
        status: Option<u16>,
    },

    // ── Validation ───────────────────────────────────────────────────

    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(forumbell::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────

    #[error("{source}")]
    #[diagnostic(
        code(forumbell::config),
        help("Inspect the file with: forumbell config show\nExpected at: {path}")
    )]
    Config {
        #[source]
        source: ConfigError,
        path: String,
    },

    // ── IO / Serialization ────────────────────────────────────────────

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Invalid JSON: {0}")]
    #[diagnostic(code(forumbell::json))]
    Json(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    #[diagnostic(code(forumbell::internal))]
    Internal(String),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::SiteNotFound { .. } | Self::NotFound { .. } => exit_code::NOT_FOUND,
            Self::NoMobileApi { .. } => exit_code::UNSUPPORTED,
            Self::Pairing { .. } => exit_code::PAIRING,
            Self::Identity { .. } | Self::Storage { .. } => exit_code::STORAGE,
            Self::Api { status: None, .. } => exit_code::CONNECTION,
            Self::Validation { .. } | Self::Config { .. } => exit_code::USAGE,
            _ => exit_code::GENERAL,
        }
    }

    /// Attach the data directory to storage-related errors.
    pub fn with_data_dir(self, dir: &std::path::Path) -> Self {
        let shown = dir.display().to_string();
        match self {
            Self::Identity { reason, .. } => Self::Identity {
                reason,
                data_dir: shown,
            },
            Self::Storage { key, reason, .. } => Self::Storage {
                key,
                reason,
                data_dir: shown,
            },
            other => other,
        }
    }
}

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Validation { field, reason } => Self::Validation { field, reason },
            other => Self::Config {
                source: other,
                path: forumbell_config::config_path().display().to_string(),
            },
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::SiteNotFound { term } => Self::SiteNotFound { term },
            CoreError::NoMobileApi { term } => Self::NoMobileApi { term },

            CoreError::PairingFailure { .. } | CoreError::NonceMismatch => Self::Pairing {
                message: err.to_string(),
            },

            CoreError::UnknownSite { id } => Self::NotFound {
                identifier: id.to_string(),
            },

            CoreError::Identity { reason } => Self::Identity {
                reason,
                data_dir: String::new(),
            },

            CoreError::Persistence { key, reason } => Self::Storage {
                key,
                reason,
                data_dir: String::new(),
            },

            CoreError::Api { message, status } => Self::Api { message, status },

            CoreError::Config { message } => Self::Validation {
                field: "url".into(),
                reason: message,
            },

            CoreError::Internal(message) => Self::Internal(message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn discovery_errors_map_to_distinct_codes() {
        let missing: CliError = CoreError::SiteNotFound {
            term: "x.example".into(),
        }
        .into();
        let old: CliError = CoreError::NoMobileApi {
            term: "x.example".into(),
        }
        .into();
        assert_eq!(missing.exit_code(), exit_code::NOT_FOUND);
        assert_eq!(old.exit_code(), exit_code::UNSUPPORTED);
    }

    #[test]
    fn pairing_errors_share_a_code() {
        let mismatch: CliError = CoreError::NonceMismatch.into();
        let garbled: CliError = CoreError::PairingFailure {
            reason: "bad base64".into(),
        }
        .into();
        assert_eq!(mismatch.exit_code(), exit_code::PAIRING);
        assert_eq!(garbled.exit_code(), exit_code::PAIRING);
    }

    #[test]
    fn http_status_is_not_a_connection_failure() {
        let status: CliError = CoreError::Api {
            message: "403".into(),
            status: Some(403),
        }
        .into();
        let offline: CliError = CoreError::Api {
            message: "connection refused".into(),
            status: None,
        }
        .into();
        assert_eq!(status.exit_code(), exit_code::GENERAL);
        assert_eq!(offline.exit_code(), exit_code::CONNECTION);
    }

    #[test]
    fn storage_errors_carry_data_dir() {
        let err: CliError = CoreError::Persistence {
            key: "sites".into(),
            reason: "read-only".into(),
        }
        .into();
        match err.with_data_dir(std::path::Path::new("/srv/forumbell")) {
            CliError::Storage { data_dir, .. } => assert_eq!(data_dir, "/srv/forumbell"),
            other => panic!("unexpected: {other:?}"),
        }
    }
}
