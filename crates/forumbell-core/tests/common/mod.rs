// Shared fixtures for registry integration tests.
#![allow(clippy::unwrap_used, dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, OnceLock};
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use bytes::Bytes;
use rsa::pkcs1::DecodeRsaPublicKey;
use rsa::{Pkcs1v15Encrypt, RsaPublicKey};
use secrecy::SecretString;
use serde_json::json;
use url::Url;

use forumbell_api::{Error, FetchRequest, FetchResponse, HttpFetch, Method};
use forumbell_core::{
    KeyPair, MemoryStore, Platform, RegistryConfig, Site, SiteClient, SiteRegistry,
};

// ── Scripted fetch ──────────────────────────────────────────────────

#[derive(Clone)]
struct Reply {
    status: u16,
    final_url: Option<Url>,
    body: String,
}

/// `HttpFetch` answering from a table keyed by `"METHOD url"`.
///
/// Unscripted requests fail with a timeout. Every request is logged and
/// the peak number of concurrent requests is tracked.
#[derive(Default)]
pub struct ScriptedFetch {
    routes: Mutex<HashMap<String, Reply>>,
    calls: Mutex<Vec<FetchRequest>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

fn route_key(method: Method, url: &str) -> String {
    format!("{} {}", method.as_str(), Url::parse(url).unwrap())
}

impl ScriptedFetch {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn script(&self, method: Method, url: &str, reply: Reply) {
        self.routes.lock().unwrap().insert(route_key(method, url), reply);
    }

    /// `HEAD url` answers `status`, optionally after redirecting to `final_url`.
    pub fn on_head(&self, url: &str, status: u16, final_url: Option<&str>) {
        self.script(
            Method::Head,
            url,
            Reply {
                status,
                final_url: final_url.map(|u| Url::parse(u).unwrap()),
                body: String::new(),
            },
        );
    }

    pub fn on_get(&self, url: &str, status: u16, body: serde_json::Value) {
        self.script(
            Method::Get,
            url,
            Reply {
                status,
                final_url: None,
                body: body.to_string(),
            },
        );
    }

    /// Script `/session/current.json` for a site.
    pub fn on_session(&self, base: &str, notifications: u64, messages: u64) {
        self.on_get(
            &format!("{base}/session/current.json"),
            200,
            json!({
                "current_user": {
                    "id": 1,
                    "username": "sam",
                    "unread_notifications": notifications,
                    "unread_private_messages": messages
                }
            }),
        );
    }

    pub fn calls(&self) -> Vec<FetchRequest> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn urls(&self) -> Vec<String> {
        self.calls().iter().map(|c| c.url.to_string()).collect()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl HttpFetch for ScriptedFetch {
    async fn fetch(&self, request: FetchRequest) -> Result<FetchResponse, Error> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        self.calls.lock().unwrap().push(request.clone());

        // Give any concurrent caller a chance to overlap.
        tokio::time::sleep(Duration::from_millis(2)).await;

        let reply = self
            .routes
            .lock()
            .unwrap()
            .get(&route_key(request.method, request.url.as_str()))
            .cloned();
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let reply = reply.ok_or(Error::Timeout { timeout_secs: 30 })?;
        Ok(FetchResponse {
            status: reply.status,
            url: reply.final_url.unwrap_or(request.url),
            body: Bytes::from(reply.body),
        })
    }
}

// ── Recording platform ──────────────────────────────────────────────

#[derive(Default)]
pub struct RecordingPlatform {
    alerts: Mutex<Vec<String>>,
    badge: Mutex<Option<u64>>,
    badges_allowed: bool,
}

impl RecordingPlatform {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_badges() -> Arc<Self> {
        Arc::new(Self {
            badges_allowed: true,
            ..Self::default()
        })
    }

    pub fn alerts(&self) -> Vec<String> {
        self.alerts.lock().unwrap().clone()
    }

    pub fn badge(&self) -> Option<u64> {
        *self.badge.lock().unwrap()
    }
}

impl Platform for RecordingPlatform {
    fn device_name(&self) -> String {
        "Test Device".into()
    }

    fn alert(&self, message: &str) {
        self.alerts.lock().unwrap().push(message.to_owned());
    }

    fn badge_permitted(&self) -> bool {
        self.badges_allowed
    }

    fn set_badge_count(&self, count: u64) {
        *self.badge.lock().unwrap() = Some(count);
    }
}

// ── Keys ────────────────────────────────────────────────────────────

/// One small key pair shared by every test in the binary.
pub fn test_keys() -> &'static KeyPair {
    static KEYS: OnceLock<KeyPair> = OnceLock::new();
    KEYS.get_or_init(|| KeyPair::generate(1024).unwrap())
}

/// Encrypt a pairing reply the way a site would.
pub fn seal_reply(nonce: &str, key: &str) -> String {
    let public = RsaPublicKey::from_pkcs1_pem(test_keys().public_pem()).unwrap();
    let plaintext = json!({ "nonce": nonce, "key": key }).to_string();
    let sealed = public
        .encrypt(&mut rand::rngs::OsRng, Pkcs1v15Encrypt, plaintext.as_bytes())
        .unwrap();
    STANDARD.encode(sealed)
}

pub fn query_value(url: &Url, name: &str) -> String {
    url.query_pairs()
        .find(|(k, _)| k == name)
        .map(|(_, v)| v.into_owned())
        .unwrap()
}

// ── Harness ─────────────────────────────────────────────────────────

pub struct Harness {
    pub registry: SiteRegistry,
    pub fetch: Arc<ScriptedFetch>,
    pub store: Arc<MemoryStore>,
    pub platform: Arc<RecordingPlatform>,
}

/// A store pre-seeded with the shared key pair.
pub fn seeded_store() -> Arc<MemoryStore> {
    let store = Arc::new(MemoryStore::new());
    store.insert("keypair", &serde_json::to_string(test_keys()).unwrap());
    store
}

pub async fn harness() -> Harness {
    harness_with(seeded_store(), RecordingPlatform::new()).await
}

pub async fn harness_with(store: Arc<MemoryStore>, platform: Arc<RecordingPlatform>) -> Harness {
    let fetch = ScriptedFetch::new();
    let registry = SiteRegistry::open(
        RegistryConfig {
            key_bits: 1024,
            ..RegistryConfig::default()
        },
        SiteClient::with_fetch(fetch.clone()),
        store.clone(),
        platform.clone(),
    )
    .await
    .unwrap();

    Harness {
        registry,
        fetch,
        store,
        platform,
    }
}

pub fn paired_site(url: &str, notifications: u64, messages: u64) -> Site {
    Site {
        auth_token: Some(SecretString::from(format!("token-for-{url}"))),
        unread_notifications: notifications,
        unread_private_messages: messages,
        ..Site::new(url)
    }
}

pub fn site_count(store: &MemoryStore) -> usize {
    let json = store.value("sites").unwrap_or_else(|| "[]".into());
    serde_json::from_str::<Vec<serde_json::Value>>(&json).unwrap().len()
}
