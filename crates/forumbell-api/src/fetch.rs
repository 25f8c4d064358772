// The "fetch JSON from URL with headers" primitive.
//
// Everything above this module talks to sites through `HttpFetch`, so the
// registry can be driven by a scripted fetcher in tests and by reqwest in
// production. Responses are fully buffered; bodies here are small JSON
// documents.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;

use crate::error::Error;
use crate::transport::TransportConfig;

/// HTTP methods used against a site.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Head,
}

impl Method {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Head => "HEAD",
        }
    }
}

/// A single outbound request.
#[derive(Clone)]
pub struct FetchRequest {
    pub method: Method,
    pub url: Url,
    pub headers: Vec<(String, String)>,
}

impl FetchRequest {
    pub fn get(url: Url) -> Self {
        Self {
            method: Method::Get,
            url,
            headers: Vec::new(),
        }
    }

    pub fn head(url: Url) -> Self {
        Self {
            method: Method::Head,
            url,
            headers: Vec::new(),
        }
    }

    /// Append a header. Later headers with the same name are sent as well.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Look up the first header with `name` (ASCII case-insensitive).
    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

// Header values can carry API keys; only names are printed.
impl fmt::Debug for FetchRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.headers.iter().map(|(n, _)| n.as_str()).collect();
        f.debug_struct("FetchRequest")
            .field("method", &self.method)
            .field("url", &self.url.as_str())
            .field("headers", &names)
            .finish()
    }
}

/// A buffered response.
#[derive(Debug, Clone)]
pub struct FetchResponse {
    pub status: u16,
    /// The final URL after any redirects were followed.
    pub url: Url,
    pub body: Bytes,
}

impl FetchResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Decode the body as JSON. Fails cleanly on non-JSON bodies.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, Error> {
        serde_json::from_slice(&self.body).map_err(|e| Error::Deserialization {
            message: e.to_string(),
            body: String::from_utf8_lossy(&self.body).into_owned(),
        })
    }
}

/// Async transport primitive: issue one request, return the buffered response.
///
/// Implementations must follow redirects and report the final URL in
/// [`FetchResponse::url`]. Non-2xx statuses are returned, not raised.
#[async_trait]
pub trait HttpFetch: Send + Sync {
    async fn fetch(&self, request: FetchRequest) -> Result<FetchResponse, Error>;
}

/// [`HttpFetch`] backed by `reqwest`.
#[derive(Debug, Clone)]
pub struct ReqwestFetch {
    http: reqwest::Client,
    timeout: Duration,
}

impl ReqwestFetch {
    pub fn new(transport: &TransportConfig) -> Result<Self, Error> {
        Ok(Self {
            http: transport.build_client()?,
            timeout: transport.timeout,
        })
    }

    fn header_map(headers: &[(String, String)]) -> Result<HeaderMap, Error> {
        let mut map = HeaderMap::with_capacity(headers.len());
        for (name, value) in headers {
            let header_name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|_| Error::InvalidHeader { name: name.clone() })?;
            let header_value = HeaderValue::from_str(value)
                .map_err(|_| Error::InvalidHeader { name: name.clone() })?;
            map.append(header_name, header_value);
        }
        Ok(map)
    }
}

#[async_trait]
impl HttpFetch for ReqwestFetch {
    async fn fetch(&self, request: FetchRequest) -> Result<FetchResponse, Error> {
        debug!("{} {}", request.method.as_str(), request.url);

        let headers = Self::header_map(&request.headers)?;
        let builder = match request.method {
            Method::Get => self.http.get(request.url),
            Method::Head => self.http.head(request.url),
        };

        let resp = builder.headers(headers).send().await.map_err(|e| {
            if e.is_timeout() {
                Error::Timeout {
                    timeout_secs: self.timeout.as_secs(),
                }
            } else {
                Error::Transport(e)
            }
        })?;

        let status = resp.status().as_u16();
        let url = resp.url().clone();
        let body = resp.bytes().await.map_err(Error::Transport)?;

        Ok(FetchResponse { status, url, body })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn response(body: &'static str) -> FetchResponse {
        FetchResponse {
            status: 200,
            url: Url::parse("https://forum.example/").unwrap(),
            body: Bytes::from_static(body.as_bytes()),
        }
    }

    #[test]
    fn json_rejects_html_bodies() {
        let resp = response("<html>nope</html>");
        let err = resp.json::<serde_json::Value>().unwrap_err();
        match err {
            Error::Deserialization { body, .. } => assert!(body.contains("nope")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn debug_hides_header_values() {
        let req = FetchRequest::get(Url::parse("https://forum.example/x").unwrap())
            .header("User-Api-Key", "very-secret");
        let printed = format!("{req:?}");
        assert!(printed.contains("User-Api-Key"));
        assert!(!printed.contains("very-secret"));
    }

    #[test]
    fn header_lookup_ignores_case() {
        let req = FetchRequest::head(Url::parse("https://forum.example/").unwrap())
            .header("Content-Type", "application/json");
        assert_eq!(req.header_value("content-type"), Some("application/json"));
        assert_eq!(req.header_value("accept"), None);
    }

    #[test]
    fn header_map_rejects_bad_names() {
        let err = ReqwestFetch::header_map(&[("bad header".into(), "v".into())]).unwrap_err();
        assert!(matches!(err, Error::InvalidHeader { .. }));
    }
}
