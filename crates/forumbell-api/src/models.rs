// Wire types for the handful of Discourse endpoints we read.
//
// Field names follow the server's snake_case JSON. Everything optional on
// the server side is optional (or defaulted) here, so a sparse response
// never fails decoding.

use serde::{Deserialize, Serialize};

/// `GET /site/basic-info.json`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BasicInfo {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub apple_touch_icon_url: Option<String>,
}

/// `GET /session/current.json`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrentSession {
    pub current_user: CurrentUser,
}

/// The authenticated user as seen through a user API key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrentUser {
    #[serde(default)]
    pub id: Option<u64>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub unread_notifications: u64,
    #[serde(default)]
    pub unread_private_messages: u64,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn basic_info_tolerates_missing_fields() {
        let info: BasicInfo = serde_json::from_value(json!({ "title": "Meta" })).unwrap();
        assert_eq!(info.title.as_deref(), Some("Meta"));
        assert!(info.description.is_none());
        assert!(info.apple_touch_icon_url.is_none());
    }

    #[test]
    fn current_user_counters_default_to_zero() {
        let session: CurrentSession = serde_json::from_value(json!({
            "current_user": { "id": 7, "username": "sam" }
        }))
        .unwrap();
        assert_eq!(session.current_user.unread_notifications, 0);
        assert_eq!(session.current_user.unread_private_messages, 0);
        assert_eq!(session.current_user.username.as_deref(), Some("sam"));
    }

    #[test]
    fn current_session_requires_user() {
        assert!(serde_json::from_value::<CurrentSession>(json!({})).is_err());
    }
}
