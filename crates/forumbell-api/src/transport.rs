// Shared transport configuration for building reqwest::Client instances.
//
// Every site is reached through one client built here, so timeout,
// redirect, and user-agent settings live in a single place.

use std::time::Duration;

use reqwest::redirect::Policy;

const DEFAULT_USER_AGENT: &str = concat!("forumbell/", env!("CARGO_PKG_VERSION"));

/// Shared transport configuration for building HTTP clients.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Upper bound for a single request, connect through body.
    pub timeout: Duration,
    /// How many redirects to follow before giving up.
    pub max_redirects: usize,
    pub user_agent: String,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            max_redirects: 10,
            user_agent: DEFAULT_USER_AGENT.into(),
        }
    }
}

impl TransportConfig {
    /// Build a `reqwest::Client` from this config.
    pub fn build_client(&self) -> Result<reqwest::Client, crate::error::Error> {
        reqwest::Client::builder()
            .timeout(self.timeout)
            .user_agent(self.user_agent.as_str())
            .redirect(Policy::limited(self.max_redirects))
            .build()
            .map_err(crate::error::Error::Transport)
    }

    /// Same config with a different request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}
