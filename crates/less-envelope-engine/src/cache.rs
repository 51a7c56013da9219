//! Cache of unlocked system and intermediate keys.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use less_crypto::SecretKey;
use parking_lot::Mutex;

use crate::record::KeyMeta;

struct CachedKey {
    key: SecretKey,
    loaded: Instant,
}

#[derive(Default)]
struct Entries {
    /// (id, created) → unlocked key
    keys: HashMap<KeyMeta, CachedKey>,
    /// id → newest known version and when it was checked
    latest: HashMap<String, (KeyMeta, Instant)>,
}

/// Bounded, time-limited cache of decrypted keys.
///
/// Evicts the least recently loaded entry once `max_size` is reached. The
/// latest-version index is bounded the same way, by check time.
/// Key bytes are zeroized when an entry is dropped.
pub struct KeyCache {
    max_size: usize,
    ttl: Duration,
    entries: Mutex<Entries>,
}

impl KeyCache {
    pub fn new(max_size: usize, ttl: Duration) -> Self {
        Self {
            max_size: max_size.max(1),
            ttl,
            entries: Mutex::new(Entries::default()),
        }
    }

    pub fn get(&self, meta: &KeyMeta) -> Option<SecretKey> {
        let mut entries = self.entries.lock();
        let fresh = entries
            .keys
            .get(meta)
            .map(|cached| cached.loaded.elapsed() < self.ttl)?;
        if !fresh {
            entries.keys.remove(meta);
            return None;
        }
        entries.keys.get(meta).map(|cached| cached.key.clone())
    }

    pub fn insert(&self, meta: KeyMeta, key: SecretKey) {
        let mut entries = self.entries.lock();
        if !entries.keys.contains_key(&meta) && entries.keys.len() >= self.max_size {
            let oldest = entries
                .keys
                .iter()
                .min_by_key(|(_, cached)| cached.loaded)
                .map(|(meta, _)| meta.clone());
            if let Some(oldest) = oldest {
                entries.keys.remove(&oldest);
                if entries.latest.get(&oldest.id).is_some_and(|(meta, _)| *meta == oldest) {
                    entries.latest.remove(&oldest.id);
                }
            }
        }
        entries.keys.insert(
            meta,
            CachedKey {
                key,
                loaded: Instant::now(),
            },
        );
    }

    /// Newest known version of `id`, if it was checked within `check_interval`.
    pub fn latest(&self, id: &str, check_interval: Duration) -> Option<KeyMeta> {
        let entries = self.entries.lock();
        entries
            .latest
            .get(id)
            .filter(|(_, checked)| checked.elapsed() < check_interval)
            .map(|(meta, _)| meta.clone())
    }

    pub fn set_latest(&self, meta: KeyMeta) {
        let mut entries = self.entries.lock();
        if !entries.latest.contains_key(&meta.id) && entries.latest.len() >= self.max_size {
            let oldest = entries
                .latest
                .iter()
                .min_by_key(|(_, (_, checked))| *checked)
                .map(|(id, _)| id.clone());
            if let Some(oldest) = oldest {
                entries.latest.remove(&oldest);
            }
        }
        entries
            .latest
            .insert(meta.id.clone(), (meta, Instant::now()));
    }

    /// Number of unlocked keys held.
    pub fn len(&self) -> usize {
        self.entries.lock().keys.len()
    }

    /// Number of ids with a remembered latest version.
    pub fn latest_len(&self) -> usize {
        self.entries.lock().latest.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        let mut entries = self.entries.lock();
        entries.keys.clear();
        entries.latest.clear();
    }
}
