// ── Platform collaborators ──
//
// The handful of device facilities the registry needs: a human-readable
// device name for pairing requests, a way to tell the user something went
// wrong, and an app badge.

use tracing::warn;

/// Device facilities consumed by the registry.
pub trait Platform: Send + Sync {
    /// Human-readable device name, embedded in `application_name`.
    fn device_name(&self) -> String;

    /// Show a message to the user. Fire-and-forget.
    fn alert(&self, message: &str);

    /// Whether the user allowed the app to show a badge count.
    fn badge_permitted(&self) -> bool {
        false
    }

    /// Set the app badge. Only called when [`badge_permitted`](Self::badge_permitted).
    fn set_badge_count(&self, _count: u64) {}
}

/// Headless platform: alerts go to the log, there is no badge.
#[derive(Debug, Clone)]
pub struct LogPlatform {
    device_name: String,
}

impl LogPlatform {
    pub fn new(device_name: impl Into<String>) -> Self {
        Self {
            device_name: device_name.into(),
        }
    }
}

impl Platform for LogPlatform {
    fn device_name(&self) -> String {
        self.device_name.clone()
    }

    fn alert(&self, message: &str) {
        warn!(%message, "user alert");
    }
}
