// ── Site domain type ──
//
// One remote community: where it lives, how it presents itself, whether
// we hold a user API key for it, and the last unread counters we saw.

use std::fmt;

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use forumbell_api::SiteClient;
use forumbell_api::discovery::origin;

use crate::error::CoreError;

/// In-memory identity of a registered site.
///
/// Never persisted. Two entries with the same URL still have distinct ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SiteId(pub(crate) u64);

impl fmt::Display for SiteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "site-{}", self.0)
    }
}

/// A remote community.
///
/// The serialized form is exactly these seven fields, in camelCase.
/// Counters are only meaningful while `auth_token` is set.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Site {
    /// Canonical base URL: protocol-qualified, no trailing slash.
    pub url: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default, with = "secret_token")]
    pub auth_token: Option<SecretString>,
    #[serde(default)]
    pub unread_notifications: u64,
    #[serde(default)]
    pub unread_private_messages: u64,
}

/// A site together with its registry identity.
#[derive(Debug, Clone)]
pub struct RegisteredSite {
    pub id: SiteId,
    pub site: Site,
}

impl Site {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    pub fn is_paired(&self) -> bool {
        self.auth_token.is_some()
    }

    /// Unread notifications plus unread private messages; 0 when unpaired.
    pub fn unread_count(&self) -> u64 {
        if self.is_paired() {
            self.unread_notifications
                .saturating_add(self.unread_private_messages)
        } else {
            0
        }
    }

    /// Display name: the title when known, otherwise the URL.
    pub fn display_name(&self) -> &str {
        self.title.as_deref().unwrap_or(&self.url)
    }

    // ── Discovery ────────────────────────────────────────────────────

    /// Turn free text into a candidate base URL.
    ///
    /// Trims whitespace, strips trailing slashes, and assumes `http://`
    /// when no `http(s)://` scheme is given.
    pub fn normalize_term(term: &str) -> String {
        let trimmed = term.trim().trim_end_matches('/');
        let lower = trimmed.to_ascii_lowercase();
        if lower.starts_with("http://") || lower.starts_with("https://") {
            trimmed.to_owned()
        } else {
            format!("http://{trimmed}")
        }
    }

    /// Probe `term` for user-API-key support and build a site from it.
    ///
    /// The canonical URL is taken from wherever the probe's redirects
    /// ended, so `example.com` can become `https://example.com`.
    pub async fn discover(term: &str, client: &SiteClient) -> Result<Site, CoreError> {
        let shown = term.trim().trim_end_matches('/').to_owned();
        let candidate = Self::normalize_term(term);
        debug!(%candidate, "discovering site");

        let final_url = match client.probe_user_api_key(&candidate).await {
            Ok(url) => url,
            Err(forumbell_api::Error::Status { status, .. }) => {
                debug!(%candidate, status, "site lacks user API key support");
                return Err(CoreError::NoMobileApi { term: shown });
            }
            Err(e) => {
                debug!(%candidate, error = %e, "probe failed");
                return Err(CoreError::SiteNotFound { term: shown });
            }
        };

        let not_found = |e: forumbell_api::Error| {
            debug!(%candidate, error = %e, "discovery failed");
            CoreError::SiteNotFound { term: shown.clone() }
        };

        let url = origin(&final_url).map_err(not_found)?;
        let info = client.basic_info(&url).await.map_err(not_found)?;

        Ok(Site {
            url,
            title: info.title,
            description: info.description,
            icon: info.apple_touch_icon_url,
            ..Site::default()
        })
    }

    // ── Refresh ──────────────────────────────────────────────────────

    /// Pull the current unread counters from the site.
    ///
    /// Returns `true` iff either counter changed. Unpaired sites are
    /// skipped. Failures are logged and reported as "no change".
    pub async fn refresh_notification_counts(&mut self, client: &SiteClient) -> bool {
        let Some(token) = self.auth_token.as_ref() else {
            return false;
        };

        let user = match client.current_session(&self.url, token).await {
            Ok(session) => session.current_user,
            Err(e) if e.is_transient() => {
                debug!(url = %self.url, error = %e, "notification refresh skipped");
                return false;
            }
            Err(e) => {
                warn!(url = %self.url, error = %e, "notification refresh failed");
                return false;
            }
        };

        let mut changed = false;
        if self.unread_notifications != user.unread_notifications {
            self.unread_notifications = user.unread_notifications;
            changed = true;
        }
        if self.unread_private_messages != user.unread_private_messages {
            self.unread_private_messages = user.unread_private_messages;
            changed = true;
        }

        if changed {
            debug!(
                url = %self.url,
                notifications = self.unread_notifications,
                messages = self.unread_private_messages,
                "unread counters changed"
            );
        }
        changed
    }

    /// The token as a plain string, for callers that must hand it on.
    pub fn expose_token(&self) -> Option<&str> {
        self.auth_token.as_ref().map(ExposeSecret::expose_secret)
    }
}

/// Persist the token in clear; the store, not the struct, is the boundary.
mod secret_token {
    use secrecy::{ExposeSecret, SecretString};
    use serde::{Deserialize, Deserializer, Serializer};

    #[allow(clippy::ref_option)]
    pub fn serialize<S: Serializer>(
        token: &Option<SecretString>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match token {
            Some(t) => serializer.serialize_some(t.expose_secret()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<SecretString>, D::Error> {
        Ok(Option::<String>::deserialize(deserializer)?.map(SecretString::from))
    }
}
