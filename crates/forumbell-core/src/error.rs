// ── Core error types ──
//
// User-facing errors from forumbell-core. Consumers never see HTTP
// status codes or JSON parse failures directly. The
// `From<forumbell_api::Error>` impl translates transport-layer errors
// into domain-appropriate variants.

use thiserror::Error;

use crate::model::SiteId;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Discovery ────────────────────────────────────────────────────
    #[error("{term} was not found")]
    SiteNotFound { term: String },

    #[error("{term} does not support mobile APIs")]
    NoMobileApi { term: String },

    // ── Pairing ──────────────────────────────────────────────────────
    #[error("Pairing reply could not be understood: {reason}")]
    PairingFailure { reason: String },

    #[error("Pairing reply does not match the pending request")]
    NonceMismatch,

    #[error("Site {id} is not registered")]
    UnknownSite { id: SiteId },

    // ── Identity & persistence ───────────────────────────────────────
    #[error("Cannot establish device identity: {reason}")]
    Identity { reason: String },

    #[error("Failed to persist '{key}': {reason}")]
    Persistence { key: String, reason: String },

    // ── API errors (wrapped, not exposed raw) ────────────────────────
    #[error("API error: {message}")]
    Api {
        message: String,
        /// HTTP status code (if applicable).
        status: Option<u16>,
    },

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },

    // ── Internal errors ──────────────────────────────────────────────
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// Discovery could not produce a site.
    pub fn is_discovery_failure(&self) -> bool {
        matches!(self, Self::SiteNotFound { .. } | Self::NoMobileApi { .. })
    }

    /// A pairing reply was rejected.
    pub fn is_pairing_failure(&self) -> bool {
        matches!(self, Self::PairingFailure { .. } | Self::NonceMismatch)
    }

    /// The text shown to the user when this error reaches the alert path.
    pub fn user_message(&self) -> String {
        match self {
            Self::SiteNotFound { term } => format!("{term} was not found!"),
            Self::NoMobileApi { term } => format!(
                "Sorry, {term} does not support mobile APIs, have owner upgrade Discourse to latest!"
            ),
            Self::PairingFailure { .. } => {
                "The reply could not be understood, please try again!".into()
            }
            Self::NonceMismatch => "We were not expecting this reply, please try again!".into(),
            Self::UnknownSite { .. } => {
                "That site is no longer in your list, please add it again!".into()
            }
            other => other.to_string(),
        }
    }
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<forumbell_api::Error> for CoreError {
    fn from(err: forumbell_api::Error) -> Self {
        match err {
            forumbell_api::Error::InvalidUrl(e) => CoreError::Config {
                message: format!("Invalid URL: {e}"),
            },
            forumbell_api::Error::Deserialization { message, body: _ } => {
                CoreError::Internal(format!("Deserialization error: {message}"))
            }
            other => CoreError::Api {
                status: other.status(),
                message: other.to_string(),
            },
        }
    }
}

impl From<serde_json::Error> for CoreError {
    fn from(err: serde_json::Error) -> Self {
        CoreError::Internal(format!("JSON error: {err}"))
    }
}
