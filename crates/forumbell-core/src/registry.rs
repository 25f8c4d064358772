// ── Site registry ──
//
// Owns the ordered site collection and everything that mutates it:
// add/remove, the sequential refresh cascade, and the pairing session.
// Every mutation is persisted and then announced to observers.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use url::Url;

use forumbell_api::SiteClient;

use crate::config::RegistryConfig;
use crate::error::CoreError;
use crate::keystore::KeyStore;
use crate::model::{RegisteredSite, Site, SiteId};
use crate::observer::{ObserverHub, SubscriptionId};
use crate::pairing;
use crate::platform::Platform;
use crate::storage::KeyValueStore;

// ── Pairing session ──────────────────────────────────────────────

#[derive(Default)]
struct PairingSession {
    /// Generated on first use, then reused for the process lifetime.
    client_id: Option<String>,
    /// At most one request is awaiting a reply.
    pending: Option<PendingPairing>,
}

struct PendingPairing {
    nonce: String,
    site: SiteId,
}

// ── SiteRegistry ─────────────────────────────────────────────────

/// The collection of sites this client tracks.
///
/// Cheaply cloneable via `Arc<RegistryInner>`. Construct one at startup
/// and hand clones to whatever needs it.
#[derive(Clone)]
pub struct SiteRegistry {
    inner: Arc<RegistryInner>,
}

struct RegistryInner {
    config: RegistryConfig,
    client: SiteClient,
    store: Arc<dyn KeyValueStore>,
    platform: Arc<dyn Platform>,
    keys: KeyStore,
    /// Current collection; also the snapshot handed to readers.
    sites: watch::Sender<Arc<Vec<RegisteredSite>>>,
    next_site_id: AtomicU64,
    session: Mutex<PairingSession>,
    observers: ObserverHub,
    /// Serializes writes of the collection to the store.
    persist_lock: Mutex<()>,
    last_refresh: watch::Sender<Option<DateTime<Utc>>>,
}

impl SiteRegistry {
    /// Create an empty registry. Does no I/O; see [`open`](Self::open).
    pub fn new(
        config: RegistryConfig,
        client: SiteClient,
        store: Arc<dyn KeyValueStore>,
        platform: Arc<dyn Platform>,
    ) -> Self {
        let keys = KeyStore::new(Arc::clone(&store), config.keypair_key.clone(), config.key_bits);
        let (sites, _) = watch::channel(Arc::new(Vec::new()));
        let (last_refresh, _) = watch::channel(None);

        Self {
            inner: Arc::new(RegistryInner {
                config,
                client,
                store,
                platform,
                keys,
                sites,
                next_site_id: AtomicU64::new(1),
                session: Mutex::new(PairingSession::default()),
                observers: ObserverHub::new(),
                persist_lock: Mutex::new(()),
                last_refresh,
            }),
        }
    }

    /// Create a registry, load the persisted collection, and make sure a
    /// device key pair exists.
    pub async fn open(
        config: RegistryConfig,
        client: SiteClient,
        store: Arc<dyn KeyValueStore>,
        platform: Arc<dyn Platform>,
    ) -> Result<Self, CoreError> {
        let registry = Self::new(config, client, store, platform);
        tokio::try_join!(registry.load(), registry.inner.keys.load_or_create())?;
        Ok(registry)
    }

    /// Replace the in-memory collection with the persisted one, if any.
    ///
    /// A collection that fails to decode is an error rather than an
    /// empty list, so it is never silently overwritten.
    pub async fn load(&self) -> Result<(), CoreError> {
        let key = &self.inner.config.sites_key;
        let stored = self.inner.store.get(key).await.map_err(|e| {
            error!(key = %key, error = %e, "failed to read site collection");
            persistence(key, &e)
        })?;

        let Some(json) = stored else {
            debug!("no persisted site collection");
            return Ok(());
        };

        let sites: Vec<Site> = serde_json::from_str(&json).map_err(|e| {
            error!(key = %key, error = %e, "persisted site collection is corrupt");
            persistence(key, &e)
        })?;

        let entries: Vec<RegisteredSite> = sites
            .into_iter()
            .map(|site| RegisteredSite {
                id: self.next_id(),
                site,
            })
            .collect();
        info!(count = entries.len(), "loaded site collection");

        self.inner.sites.send_replace(Arc::new(entries));
        self.inner.observers.notify();
        Ok(())
    }

    // ── Reads ────────────────────────────────────────────────────

    /// The current collection, in insertion order.
    pub fn sites(&self) -> Arc<Vec<RegisteredSite>> {
        Arc::clone(&self.inner.sites.borrow())
    }

    /// Look up one site by id.
    pub fn site(&self, id: SiteId) -> Option<Site> {
        self.inner
            .sites
            .borrow()
            .iter()
            .find(|entry| entry.id == id)
            .map(|entry| entry.site.clone())
    }

    pub fn len(&self) -> usize {
        self.inner.sites.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.sites.borrow().is_empty()
    }

    /// Unread notifications plus private messages over paired sites.
    pub fn total_unread_count(&self) -> u64 {
        self.inner
            .sites
            .borrow()
            .iter()
            .map(|entry| entry.site.unread_count())
            .fold(0, u64::saturating_add)
    }

    /// When the last refresh cascade finished, if one has run.
    pub fn last_refresh(&self) -> Option<DateTime<Utc>> {
        *self.inner.last_refresh.borrow()
    }

    // ── Observation ──────────────────────────────────────────────

    pub fn subscribe(&self, callback: impl Fn() + Send + Sync + 'static) -> SubscriptionId {
        self.inner.observers.subscribe(callback)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.inner.observers.unsubscribe(id)
    }

    /// Stream of collection snapshots, updated on every in-memory change.
    pub fn changes(&self) -> watch::Receiver<Arc<Vec<RegisteredSite>>> {
        self.inner.sites.subscribe()
    }

    // ── Mutation ─────────────────────────────────────────────────

    /// Append a site. Duplicates by URL are allowed.
    pub async fn add(&self, site: Site) -> Result<SiteId, CoreError> {
        let id = self.next_id();
        debug!(%id, url = %site.url, "adding site");
        self.inner.sites.send_modify(|sites| {
            Arc::make_mut(sites).push(RegisteredSite { id, site });
        });
        self.commit().await?;
        Ok(id)
    }

    /// Remove a site. Returns `false`, without persisting, if it is absent.
    pub async fn remove(&self, id: SiteId) -> Result<bool, CoreError> {
        let removed = self.inner.sites.send_if_modified(|sites| {
            let Some(pos) = sites.iter().position(|entry| entry.id == id) else {
                return false;
            };
            Arc::make_mut(sites).remove(pos);
            true
        });

        if !removed {
            return Ok(false);
        }
        debug!(%id, "removed site");
        self.commit().await?;
        Ok(true)
    }

    /// Discover a site from free text and add it.
    ///
    /// Discovery failures are shown to the user and returned; nothing is
    /// added in that case.
    pub async fn discover_and_add(&self, term: &str) -> Result<SiteId, CoreError> {
        match Site::discover(term, &self.inner.client).await {
            Ok(site) => self.add(site).await,
            Err(e) => {
                self.inner.platform.alert(&e.user_message());
                Err(e)
            }
        }
    }

    // ── Refresh cascade ──────────────────────────────────────────

    /// Refresh every site's unread counters, one site at a time.
    ///
    /// Sites are taken from a snapshot and processed last-to-first. At
    /// most one request is in flight at any moment. If anything changed
    /// the collection is persisted once at the end. Returns whether any
    /// counter changed.
    pub async fn refresh_all(&self) -> Result<bool, CoreError> {
        let mut queue: Vec<RegisteredSite> = self.sites().iter().cloned().collect();
        if queue.is_empty() {
            return Ok(false);
        }

        let total = queue.len();
        let mut changed_any = false;
        while let Some(mut entry) = queue.pop() {
            let changed = entry
                .site
                .refresh_notification_counts(&self.inner.client)
                .await;
            if changed {
                self.write_back_counts(&entry);
            }
            changed_any |= changed;
        }

        self.inner.last_refresh.send_replace(Some(Utc::now()));
        debug!(sites = total, changed = changed_any, "refresh cascade complete");

        if changed_any {
            self.commit().await?;
        }
        Ok(changed_any)
    }

    /// Run [`refresh_all`](Self::refresh_all) every `interval` until cancelled.
    pub fn spawn_refresh_task(&self, interval: Duration, cancel: CancellationToken) -> JoinHandle<()> {
        let registry = self.clone();
        tokio::spawn(refresh_task(registry, interval, cancel))
    }

    // ── Pairing ──────────────────────────────────────────────────

    /// Start pairing with a site and return the URL the user must open.
    ///
    /// Replaces any pairing already in progress; a reply to the earlier
    /// request will no longer be accepted.
    pub async fn begin_pairing(&self, id: SiteId) -> Result<Url, CoreError> {
        let site = self.site(id).ok_or(CoreError::UnknownSite { id })?;
        let keys = self.inner.keys.load_or_create().await?;

        let (client_id, nonce) = {
            let mut session = self.inner.session.lock().await;
            let client_id = session
                .client_id
                .get_or_insert_with(pairing::generate_client_id)
                .clone();
            let nonce = pairing::generate_nonce();
            session.pending = Some(PendingPairing {
                nonce: nonce.clone(),
                site: id,
            });
            (client_id, nonce)
        };

        info!(%id, url = %site.url, "pairing started");
        pairing::build_pairing_url(
            &site.url,
            &client_id,
            &nonce,
            keys.public_pem(),
            &self.inner.platform.device_name(),
            &self.inner.config.pairing,
        )
    }

    /// Accept an encrypted pairing reply.
    ///
    /// The reply must carry the nonce of the pending request. On success
    /// the token is stored, the site is refreshed once, the collection is
    /// persisted, and the pending request is closed. On any failure the
    /// user is alerted and nothing changes.
    pub async fn complete_pairing(&self, payload: &str) -> Result<SiteId, CoreError> {
        let keys = self.inner.keys.load_or_create().await?;

        let reply = match pairing::decrypt_reply(payload, &keys) {
            Ok(reply) => reply,
            Err(e) => {
                warn!(error = %e, "pairing reply rejected");
                return Err(self.alerted(e));
            }
        };

        let target = {
            let mut session = self.inner.session.lock().await;
            match session.pending.take() {
                Some(pending) if pending.nonce == reply.nonce => pending.site,
                other => {
                    session.pending = other;
                    warn!("pairing reply does not match the pending request");
                    return Err(self.alerted(CoreError::NonceMismatch));
                }
            }
        };

        let Some(mut site) = self.site(target) else {
            warn!(id = %target, "paired site was removed");
            return Err(self.alerted(CoreError::UnknownSite { id: target }));
        };

        site.auth_token = Some(reply.key);
        site.refresh_notification_counts(&self.inner.client).await;

        let stored = self.inner.sites.send_if_modified(|sites| {
            let Some(entry) = Arc::make_mut(sites).iter_mut().find(|e| e.id == target) else {
                return false;
            };
            entry.site.auth_token.clone_from(&site.auth_token);
            entry.site.unread_notifications = site.unread_notifications;
            entry.site.unread_private_messages = site.unread_private_messages;
            true
        });
        if !stored {
            warn!(id = %target, "paired site was removed during refresh");
            return Err(self.alerted(CoreError::UnknownSite { id: target }));
        }

        info!(id = %target, url = %site.url, "pairing complete");
        self.commit().await?;
        Ok(target)
    }

    /// Handle an incoming redirect URL.
    ///
    /// URLs without exactly one `payload=` are ignored (`Ok(None)`).
    pub async fn handle_open_url(&self, incoming: &str) -> Result<Option<SiteId>, CoreError> {
        let Some(payload) = pairing::extract_payload(incoming) else {
            debug!("ignoring URL without pairing payload");
            return Ok(None);
        };
        self.complete_pairing(&payload).await.map(Some)
    }

    /// Where to send the user for a site: the site itself once paired,
    /// otherwise a fresh pairing request.
    pub async fn visit_url(&self, id: SiteId) -> Result<Url, CoreError> {
        let site = self.site(id).ok_or(CoreError::UnknownSite { id })?;
        if site.is_paired() {
            return Url::parse(&site.url).map_err(|e| CoreError::Config {
                message: format!("invalid site URL '{}': {e}", site.url),
            });
        }
        self.begin_pairing(id).await
    }

    // ── Internals ────────────────────────────────────────────────

    fn next_id(&self) -> SiteId {
        SiteId(self.inner.next_site_id.fetch_add(1, Ordering::Relaxed))
    }

    fn alerted(&self, err: CoreError) -> CoreError {
        self.inner.platform.alert(&err.user_message());
        err
    }

    /// Copy refreshed counters into the live entry, if it still exists.
    ///
    /// Only counters are written so a token stored by a concurrent
    /// pairing is never overwritten.
    fn write_back_counts(&self, refreshed: &RegisteredSite) {
        self.inner.sites.send_if_modified(|sites| {
            let Some(entry) = Arc::make_mut(sites)
                .iter_mut()
                .find(|e| e.id == refreshed.id)
            else {
                return false;
            };
            entry.site.unread_notifications = refreshed.site.unread_notifications;
            entry.site.unread_private_messages = refreshed.site.unread_private_messages;
            true
        });
    }

    /// Persist, then notify observers. Observers hear about the in-memory
    /// change even when the write fails.
    async fn commit(&self) -> Result<(), CoreError> {
        let saved = self.save().await;
        self.inner.observers.notify();
        saved
    }

    /// Write the current collection and reconcile the badge.
    async fn save(&self) -> Result<(), CoreError> {
        let key = &self.inner.config.sites_key;
        let _writer = self.inner.persist_lock.lock().await;

        // Snapshot under the writer lock: the last write always carries
        // the latest in-memory state.
        let snapshot = self.sites();
        let sites: Vec<&Site> = snapshot.iter().map(|entry| &entry.site).collect();
        let json = serde_json::to_string(&sites)?;

        self.inner.store.set(key, &json).await.map_err(|e| {
            error!(key = %key, error = %e, "failed to persist site collection");
            persistence(key, &e)
        })?;
        debug!(count = sites.len(), "site collection persisted");

        if self.inner.platform.badge_permitted() {
            self.inner.platform.set_badge_count(self.total_unread_count());
        }
        Ok(())
    }
}

fn persistence(key: &str, err: &impl std::fmt::Display) -> CoreError {
    CoreError::Persistence {
        key: key.to_owned(),
        reason: err.to_string(),
    }
}

// ── Background tasks ─────────────────────────────────────────────

/// Periodically run the refresh cascade.
async fn refresh_task(registry: SiteRegistry, interval: Duration, cancel: CancellationToken) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            _ = ticker.tick() => {
                if let Err(e) = registry.refresh_all().await {
                    warn!(error = %e, "periodic refresh failed");
                }
            }
        }
    }
    debug!("refresh task stopped");
}
