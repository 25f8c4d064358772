// ── Device key pair ──
//
// Each installation has one long-lived RSA key pair. Sites encrypt the
// user API key they issue to its public half; only this device can read
// the reply. The pair is generated on first use and never rotated.

use std::fmt;
use std::sync::Arc;

use rsa::pkcs1::{DecodeRsaPrivateKey, EncodeRsaPrivateKey, EncodeRsaPublicKey, LineEnding};
use rsa::pkcs8::DecodePrivateKey;
use rsa::{Pkcs1v15Encrypt, RsaPrivateKey, RsaPublicKey};
use serde::{Deserialize, Serialize};
use tokio::sync::OnceCell;
use tracing::{debug, error, info};

use crate::error::CoreError;
use crate::storage::KeyValueStore;

/// A PEM-encoded RSA key pair, persisted verbatim as `{public, private}`.
#[derive(Clone, Serialize, Deserialize)]
pub struct KeyPair {
    public: String,
    private: String,
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("public", &self.public)
            .finish_non_exhaustive()
    }
}

impl KeyPair {
    /// Generate a fresh pair. CPU-bound; run off the async executor.
    pub fn generate(bits: usize) -> Result<Self, CoreError> {
        let private = RsaPrivateKey::new(&mut rand::rngs::OsRng, bits).map_err(identity)?;
        let public = RsaPublicKey::from(&private);

        Ok(Self {
            public: public.to_pkcs1_pem(LineEnding::LF).map_err(identity)?,
            private: private.to_pkcs1_pem(LineEnding::LF).map_err(identity)?.to_string(),
        })
    }

    /// Parse a persisted pair, checking that the private half decodes.
    pub fn from_json(json: &str) -> Result<Self, CoreError> {
        let pair: Self = serde_json::from_str(json).map_err(identity)?;
        pair.private_key()?;
        Ok(pair)
    }

    /// The public half, PEM-encoded, as sent in pairing requests.
    pub fn public_pem(&self) -> &str {
        &self.public
    }

    /// Decode the private half. Accepts PKCS#1 and PKCS#8 PEM.
    pub fn private_key(&self) -> Result<RsaPrivateKey, CoreError> {
        RsaPrivateKey::from_pkcs1_pem(&self.private)
            .or_else(|_| RsaPrivateKey::from_pkcs8_pem(&self.private))
            .map_err(identity)
    }

    /// Decrypt a ciphertext addressed to this device.
    pub fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>, CoreError> {
        let key = self.private_key()?;
        key.decrypt(Pkcs1v15Encrypt, ciphertext)
            .map_err(|e| CoreError::PairingFailure {
                reason: format!("decryption failed: {e}"),
            })
    }
}

fn identity(err: impl fmt::Display) -> CoreError {
    CoreError::Identity {
        reason: err.to_string(),
    }
}

/// Owns the device key pair: loads it from storage or creates it once.
pub struct KeyStore {
    store: Arc<dyn KeyValueStore>,
    storage_key: String,
    key_bits: usize,
    cached: OnceCell<Arc<KeyPair>>,
}

impl KeyStore {
    pub fn new(store: Arc<dyn KeyValueStore>, storage_key: impl Into<String>, key_bits: usize) -> Self {
        Self {
            store,
            storage_key: storage_key.into(),
            key_bits,
            cached: OnceCell::new(),
        }
    }

    /// Return the device key pair, loading or generating it on first call.
    ///
    /// Concurrent first calls share one load; at most one pair is ever
    /// generated per store. Storage failures are fatal: without a key
    /// pair no site can be paired.
    pub async fn load_or_create(&self) -> Result<Arc<KeyPair>, CoreError> {
        self.cached
            .get_or_try_init(|| async {
                self.load_or_generate().await.map(Arc::new).inspect_err(|e| {
                    error!(error = %e, "cannot establish device identity");
                })
            })
            .await
            .cloned()
    }

    async fn load_or_generate(&self) -> Result<KeyPair, CoreError> {
        let existing = self.store.get(&self.storage_key).await.map_err(identity)?;

        if let Some(json) = existing {
            debug!(key = %self.storage_key, "loading device key pair");
            let pair = KeyPair::from_json(&json)?;
            info!("loaded existing device key pair");
            return Ok(pair);
        }

        debug!(bits = self.key_bits, "generating device key pair");
        let bits = self.key_bits;
        let pair = tokio::task::spawn_blocking(move || KeyPair::generate(bits))
            .await
            .map_err(|e| CoreError::Identity {
                reason: format!("key generation task failed: {e}"),
            })??;

        let json = serde_json::to_string(&pair).map_err(identity)?;
        self.store
            .set(&self.storage_key, &json)
            .await
            .map_err(identity)?;

        info!(bits, "generated new device key pair");
        Ok(pair)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;
    use rsa::pkcs1::DecodeRsaPublicKey;

    const TEST_BITS: usize = 1024;

    #[tokio::test]
    async fn generates_once_then_loads() {
        let store = Arc::new(MemoryStore::new());

        let first = KeyStore::new(store.clone(), "keypair", TEST_BITS)
            .load_or_create()
            .await
            .unwrap();
        assert_eq!(store.write_count("keypair"), 1);
        assert!(first.public_pem().starts_with("-----BEGIN RSA PUBLIC KEY-----"));

        // A second store instance over the same storage reads it back.
        let second = KeyStore::new(store.clone(), "keypair", TEST_BITS)
            .load_or_create()
            .await
            .unwrap();
        assert_eq!(first.public_pem(), second.public_pem());
        assert_eq!(store.write_count("keypair"), 1);
    }

    #[tokio::test]
    async fn cached_instance_is_reused() {
        let store = Arc::new(MemoryStore::new());
        let keys = KeyStore::new(store.clone(), "keypair", TEST_BITS);

        let (a, b) = tokio::join!(keys.load_or_create(), keys.load_or_create());
        assert!(Arc::ptr_eq(&a.unwrap(), &b.unwrap()));
        assert_eq!(store.write_count("keypair"), 1);
    }

    #[tokio::test]
    async fn corrupt_pair_is_an_identity_error() {
        let store = Arc::new(MemoryStore::new());
        store.insert("keypair", r#"{"public":"x","private":"not a pem"}"#);

        let err = KeyStore::new(store, "keypair", TEST_BITS)
            .load_or_create()
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::Identity { .. }));
    }

    #[tokio::test]
    async fn write_failure_is_an_identity_error() {
        let store = Arc::new(MemoryStore::new());
        store.fail_writes(true);

        let err = KeyStore::new(store, "keypair", TEST_BITS)
            .load_or_create()
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::Identity { .. }));
    }

    #[test]
    fn decrypts_what_the_public_half_encrypts() {
        let pair = KeyPair::generate(TEST_BITS).unwrap();
        let public = RsaPublicKey::from_pkcs1_pem(pair.public_pem()).unwrap();
        let sealed = public
            .encrypt(&mut rand::rngs::OsRng, Pkcs1v15Encrypt, b"hello")
            .unwrap();
        assert_eq!(pair.decrypt(&sealed).unwrap(), b"hello");
    }

    #[test]
    fn debug_hides_private_half() {
        let pair = KeyPair::generate(TEST_BITS).unwrap();
        assert!(!format!("{pair:?}").contains("PRIVATE KEY"));
    }
}
