// Site HTTP client
//
// Wraps an `HttpFetch` with site-rooted URL construction and JSON
// decoding. Endpoint groups (discovery, session) are implemented as
// inherent methods in separate files to keep this module focused on
// transport mechanics.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use url::Url;

use crate::error::Error;
use crate::fetch::{FetchRequest, FetchResponse, HttpFetch, ReqwestFetch};
use crate::transport::TransportConfig;

/// HTTP client for talking to any number of Discourse sites.
///
/// Holds no per-site state: every call takes the site's base URL
/// (protocol-qualified, no trailing slash). Cheap to clone.
#[derive(Clone)]
pub struct SiteClient {
    fetch: Arc<dyn HttpFetch>,
}

impl SiteClient {
    /// Create a client backed by reqwest.
    pub fn new(transport: &TransportConfig) -> Result<Self, Error> {
        Ok(Self::with_fetch(Arc::new(ReqwestFetch::new(transport)?)))
    }

    /// Create a client over any fetch primitive.
    pub fn with_fetch(fetch: Arc<dyn HttpFetch>) -> Self {
        Self { fetch }
    }

    // ── URL builders ─────────────────────────────────────────────────

    /// Build `{base}{path}`. `path` must start with `/`.
    pub(crate) fn site_url(base: &str, path: &str) -> Result<Url, Error> {
        let full = format!("{}{}", base.trim_end_matches('/'), path);
        Ok(Url::parse(&full)?)
    }

    // ── Request helpers ──────────────────────────────────────────────

    pub(crate) async fn send(&self, request: FetchRequest) -> Result<FetchResponse, Error> {
        self.fetch.fetch(request).await
    }

    /// Send a request, require a 2xx status, and decode the JSON body.
    pub(crate) async fn send_json<T: DeserializeOwned>(
        &self,
        request: FetchRequest,
    ) -> Result<T, Error> {
        let resp = self.send(request).await?;
        if !resp.is_success() {
            return Err(Error::Status {
                status: resp.status,
                url: resp.url.to_string(),
            });
        }
        resp.json()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn site_url_appends_path() {
        let url = SiteClient::site_url("https://forum.example", "/site/basic-info.json").unwrap();
        assert_eq!(url.as_str(), "https://forum.example/site/basic-info.json");
    }

    #[test]
    fn site_url_tolerates_trailing_slash() {
        let url = SiteClient::site_url("https://forum.example/", "/session/current.json").unwrap();
        assert_eq!(url.as_str(), "https://forum.example/session/current.json");
    }

    #[test]
    fn site_url_rejects_garbage() {
        assert!(SiteClient::site_url("not a url", "/x").is_err());
    }
}
