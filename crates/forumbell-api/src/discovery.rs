// Discovery endpoints
//
// Probing a candidate site for user-API-key support and reading its
// public descriptor. Both are anonymous requests.

use tracing::debug;
use url::Url;

use crate::client::SiteClient;
use crate::error::Error;
use crate::fetch::FetchRequest;
use crate::models::BasicInfo;

/// Path of the user-API-key authorization page. Also the capability probe.
pub const USER_API_KEY_PATH: &str = "/user-api-key/new";

/// Path of the public site descriptor.
pub const BASIC_INFO_PATH: &str = "/site/basic-info.json";

impl SiteClient {
    /// Check whether `base` exposes the user-API-key endpoint.
    ///
    /// `HEAD {base}/user-api-key/new`
    ///
    /// Returns the final URL the probe landed on, after redirects. Any
    /// status other than 200 is reported as [`Error::Status`].
    pub async fn probe_user_api_key(&self, base: &str) -> Result<Url, Error> {
        let url = Self::site_url(base, USER_API_KEY_PATH)?;
        debug!(%url, "probing for user API key support");

        let resp = self.send(FetchRequest::head(url)).await?;
        if resp.status != 200 {
            return Err(Error::Status {
                status: resp.status,
                url: resp.url.to_string(),
            });
        }
        Ok(resp.url)
    }

    /// Fetch the public site descriptor.
    ///
    /// `GET {base}/site/basic-info.json`
    pub async fn basic_info(&self, base: &str) -> Result<BasicInfo, Error> {
        let url = Self::site_url(base, BASIC_INFO_PATH)?;
        debug!(%url, "fetching basic info");
        self.send_json(FetchRequest::get(url)).await
    }
}

/// Reduce a URL to `scheme://host[:port]`, dropping path, query and fragment.
///
/// Used to re-derive a site's canonical base from wherever a redirect
/// chain ended.
pub fn origin(url: &Url) -> Result<String, Error> {
    let origin = url.origin();
    if !origin.is_tuple() {
        return Err(Error::OpaqueOrigin {
            url: url.to_string(),
        });
    }
    Ok(origin.ascii_serialization())
}
