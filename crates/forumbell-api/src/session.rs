// Session endpoints
//
// Authenticated reads made with a user API key.

use secrecy::{ExposeSecret, SecretString};
use tracing::debug;

use crate::client::SiteClient;
use crate::error::Error;
use crate::fetch::FetchRequest;
use crate::models::CurrentSession;

/// Path of the current-session document.
pub const CURRENT_SESSION_PATH: &str = "/session/current.json";

/// Header carrying the user API key.
pub const USER_API_KEY_HEADER: &str = "User-Api-Key";

impl SiteClient {
    /// Fetch the session of the user owning `api_key`.
    ///
    /// `GET {base}/session/current.json` with `User-Api-Key: {api_key}`
    pub async fn current_session(
        &self,
        base: &str,
        api_key: &SecretString,
    ) -> Result<CurrentSession, Error> {
        let url = Self::site_url(base, CURRENT_SESSION_PATH)?;
        debug!(%url, "fetching current session");

        let request = FetchRequest::get(url)
            .header(USER_API_KEY_HEADER, api_key.expose_secret())
            .header("Content-Type", "application/json");
        self.send_json(request).await
    }
}
