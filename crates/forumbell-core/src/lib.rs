// forumbell-core: Site registry, pairing protocol, and unread-count polling.

pub mod config;
pub mod error;
pub mod keystore;
pub mod model;
pub mod observer;
pub mod pairing;
pub mod platform;
pub mod registry;
pub mod storage;

// ── Primary re-exports ──────────────────────────────────────────────
pub use config::{PairingOptions, RegistryConfig};
pub use error::CoreError;
pub use keystore::{KeyPair, KeyStore};
pub use model::{RegisteredSite, Site, SiteId};
pub use observer::{ObserverHub, SubscriptionId};
pub use pairing::PairingReply;
pub use platform::{LogPlatform, Platform};
pub use registry::SiteRegistry;
pub use storage::{FileStore, KeyValueStore, MemoryStore};

// The HTTP layer is part of the public construction surface.
pub use forumbell_api::{HttpFetch, SiteClient, TransportConfig};
