use thiserror::Error;

/// Top-level error type for the `forumbell-api` crate.
///
/// Covers every failure mode of talking to a single site: transport,
/// URL handling, unexpected HTTP status, and payload decoding.
/// `forumbell-core` maps these into discovery/refresh outcomes.
#[derive(Debug, Error)]
pub enum Error {
    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Request timed out.
    #[error("Request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    /// A header name or value could not be put on the wire.
    #[error("Invalid header: {name}")]
    InvalidHeader { name: String },

    // ── HTTP ────────────────────────────────────────────────────────
    /// The site answered with a status other than the one expected.
    #[error("Unexpected HTTP status {status} from {url}")]
    Status { status: u16, url: String },

    /// The final URL after redirects has no usable origin.
    #[error("No usable origin in {url}")]
    OpaqueOrigin { url: String },

    // ── Data ────────────────────────────────────────────────────────
    /// JSON deserialization failed, with the raw body for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },
}

impl Error {
    /// Returns `true` if this is a transient error worth retrying later.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_timeout() || e.is_connect(),
            Self::Timeout { .. } => true,
            Self::Status { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// Returns `true` if this is a "not found" error.
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::Transport(e) => e.status() == Some(reqwest::StatusCode::NOT_FOUND),
            Self::Status { status: 404, .. } => true,
            _ => false,
        }
    }

    /// The HTTP status code carried by this error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            Self::Transport(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_errors_are_transient() {
        let err = Error::Status {
            status: 503,
            url: "https://forum.example".into(),
        };
        assert!(err.is_transient());
        assert!(!err.is_not_found());
        assert_eq!(err.status(), Some(503));
    }

    #[test]
    fn not_found_status() {
        let err = Error::Status {
            status: 404,
            url: "https://forum.example/session/current.json".into(),
        };
        assert!(err.is_not_found());
        assert!(!err.is_transient());
    }

    #[test]
    fn decode_errors_are_permanent() {
        let err = Error::Deserialization {
            message: "expected value".into(),
            body: "<html>".into(),
        };
        assert!(!err.is_transient());
        assert_eq!(err.status(), None);
    }
}
