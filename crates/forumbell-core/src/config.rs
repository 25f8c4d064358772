// ── Runtime registry configuration ──
//
// These types describe storage keys and pairing constants. They never
// touch disk: forumbell-config (or a test) builds a `RegistryConfig` and
// hands it in.

/// Constants embedded in every pairing request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PairingOptions {
    /// Where the site should deliver push notifications for this client.
    pub push_url: String,
    /// Custom-scheme URI the site redirects to with the encrypted payload.
    pub auth_redirect: String,
    /// Prefix of `application_name`; the device name is appended.
    pub application_label: String,
}

impl Default for PairingOptions {
    fn default() -> Self {
        Self {
            push_url: "https://api.discourse.org/api/ios_notify".into(),
            auth_redirect: "discourse://auth_redirect".into(),
            application_label: "Discourse".into(),
        }
    }
}

/// Configuration for a [`SiteRegistry`](crate::SiteRegistry).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryConfig {
    /// Storage key of the serialized site collection.
    pub sites_key: String,
    /// Storage key of the serialized key pair.
    pub keypair_key: String,
    /// RSA modulus size for a freshly generated key pair.
    pub key_bits: usize,
    pub pairing: PairingOptions,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            sites_key: "sites".into(),
            keypair_key: "keypair".into(),
            key_bits: 2048,
            pairing: PairingOptions::default(),
        }
    }
}
