//! In-memory resolution cache
//!
//! Maps a fingerprint of the full URL to the reference it resolved to,
//! including the hotlink sentinel. Entries expire after a fixed TTL, the
//! least recently used are evicted past a fixed capacity, and entries can be
//! evicted one URL at a time or for every URL of a media item or site.

use crate::config::{default_cache_max_entries, CacheConfig};
use crate::models::{MediaReference, Resolution, DEFAULT_OWNER_ID};
use chrono::{DateTime, Duration, Utc};
use lru::LruCache;
use std::collections::{HashMap, HashSet};
use std::num::NonZeroUsize;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

const KEY_PREFIX: &str = "image_url_to_id_";

/// Upper bound on entry lifetime (ten years)
const MAX_TTL_SECS: u64 = 10 * 365 * 86_400;

/// A cached resolution
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub reference: MediaReference,
    pub expires_at: DateTime<Utc>,
}

impl CacheEntry {
    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

struct CacheState {
    entries: LruCache<String, CacheEntry>,
    /// (owner_id, media_id) → keys pointing at that item
    by_media: HashMap<(u64, u64), HashSet<String>>,
}

impl CacheState {
    fn new(capacity: NonZeroUsize) -> Self {
        Self {
            entries: LruCache::new(capacity),
            by_media: HashMap::new(),
        }
    }

    fn forget(&mut self, key: &str, entry: &CacheEntry) {
        let media = (entry.reference.owner_id, entry.reference.media_id);
        if let Some(keys) = self.by_media.get_mut(&media) {
            keys.remove(key);
            if keys.is_empty() {
                self.by_media.remove(&media);
            }
        }
    }

    fn remove(&mut self, key: &str) -> Option<CacheEntry> {
        let entry = self.entries.pop(key)?;
        self.forget(key, &entry);
        Some(entry)
    }

    fn insert(&mut self, key: String, entry: CacheEntry) {
        self.remove(&key);
        self.by_media
            .entry((entry.reference.owner_id, entry.reference.media_id))
            .or_default()
            .insert(key.clone());

        // The key was just removed, so anything handed back was evicted
        if let Some((evicted_key, evicted)) = self.entries.push(key, entry) {
            self.forget(&evicted_key, &evicted);
        }
    }

    /// Drop expired entries from the least recently used end
    fn pop_expired_tail(&mut self, now: DateTime<Utc>) {
        while self
            .entries
            .peek_lru()
            .is_some_and(|(_, entry)| entry.is_expired(now))
        {
            if let Some((key, entry)) = self.entries.pop_lru() {
                self.forget(&key, &entry);
            }
        }
    }

    fn purge_expired(&mut self, now: DateTime<Utc>) -> usize {
        let expired: Vec<String> = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.is_expired(now))
            .map(|(key, _)| key.clone())
            .collect();
        for key in &expired {
            self.remove(key);
        }
        expired.len()
    }
}

/// Shared resolution cache handle
#[derive(Clone)]
pub struct MediaCache {
    state: Arc<RwLock<CacheState>>,
    ttl: Duration,
}

impl MediaCache {
    /// Create a cache whose entries live for `ttl_secs` seconds
    pub fn new(ttl_secs: u64) -> Self {
        Self::with_capacity(ttl_secs, default_cache_max_entries())
    }

    /// Create a cache holding at most `max_entries` entries
    pub fn with_capacity(ttl_secs: u64, max_entries: usize) -> Self {
        let capacity = NonZeroUsize::new(max_entries).unwrap_or(NonZeroUsize::MIN);
        Self {
            state: Arc::new(RwLock::new(CacheState::new(capacity))),
            ttl: Duration::seconds(ttl_secs.min(MAX_TTL_SECS) as i64),
        }
    }

    pub fn from_config(config: &CacheConfig) -> Self {
        Self::with_capacity(config.ttl_secs, config.max_entries)
    }

    /// Cache key for a URL: a stable hash of the full URL string
    pub fn fingerprint(url: &str) -> String {
        format!("{}{}", KEY_PREFIX, blake3::hash(url.as_bytes()).to_hex())
    }

    /// Look up a URL. Never touches anything but the cache itself.
    pub async fn get(&self, url: &str) -> Resolution {
        let key = Self::fingerprint(url);
        let now = Utc::now();

        // A hit refreshes recency, so this takes the write lock
        let mut state = self.state.write().await;
        let live = match state.entries.get(&key) {
            None => return Resolution::Miss,
            Some(entry) => (!entry.is_expired(now)).then(|| entry.reference.clone()),
        };

        match live {
            Some(reference) => Resolution::from_reference(reference),
            None => {
                debug!("Evicting expired cache entry for {}", url);
                state.remove(&key);
                Resolution::Miss
            }
        }
    }

    /// Store a resolution and hand the media ID back for chaining
    pub async fn put(&self, media_id: u64, size_variant: &str, url: &str, owner_id: u64) -> u64 {
        let entry = CacheEntry {
            reference: MediaReference::new(media_id, owner_id, size_variant),
            expires_at: Utc::now() + self.ttl,
        };

        let mut state = self.state.write().await;
        state.pop_expired_tail(Utc::now());
        state.insert(Self::fingerprint(url), entry);
        media_id
    }

    /// Store a resolution owned by the default site
    pub async fn put_default(&self, media_id: u64, size_variant: &str, url: &str) -> u64 {
        self.put(media_id, size_variant, url, DEFAULT_OWNER_ID).await
    }

    /// Store the hotlink sentinel for an external URL
    pub async fn put_hotlink(&self, url: &str) {
        let sentinel = MediaReference::hotlink();
        self.put(sentinel.media_id, &sentinel.size_variant, url, sentinel.owner_id)
            .await;
    }

    /// Remove the entry for a URL; absent entries are fine
    pub async fn invalidate(&self, url: &str) {
        self.state.write().await.remove(&Self::fingerprint(url));
    }

    /// Remove every entry that resolves to the given media item
    pub async fn invalidate_media(&self, media_id: u64, owner_id: u64) {
        let mut state = self.state.write().await;
        let keys = state
            .by_media
            .get(&(owner_id, media_id))
            .cloned()
            .unwrap_or_default();
        for key in &keys {
            state.remove(key);
        }
        debug!(
            "Evicted {} cache entries for media {} on site {}",
            keys.len(),
            media_id,
            owner_id
        );
    }

    /// Remove every entry owned by a site
    pub async fn invalidate_owner(&self, owner_id: u64) {
        let mut state = self.state.write().await;
        let keys: Vec<String> = state
            .by_media
            .iter()
            .filter(|((owner, _), _)| *owner == owner_id)
            .flat_map(|(_, keys)| keys.iter().cloned())
            .collect();
        for key in &keys {
            state.remove(key);
        }
    }

    /// Drop every expired entry, returning how many went
    pub async fn purge_expired(&self) -> usize {
        self.state.write().await.purge_expired(Utc::now())
    }

    /// Drop everything
    pub async fn clear(&self) {
        let mut state = self.state.write().await;
        state.entries.clear();
        state.by_media.clear();
    }

    /// Number of live and expired-but-unevicted entries, never above capacity
    pub async fn len(&self) -> usize {
        self.state.read().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
