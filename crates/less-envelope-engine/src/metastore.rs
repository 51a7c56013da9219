//! Persistence for encrypted system and intermediate keys.

use std::collections::HashMap;

use parking_lot::RwLock;

use crate::error::Result;
use crate::record::EnvelopeKeyRecord;

pub trait Metastore: Send + Sync {
    /// Load the key stored under `id` at exactly `created`.
    fn load(&self, id: &str, created: i64) -> Result<Option<EnvelopeKeyRecord>>;

    /// Load the most recently created key for `id`.
    fn load_latest(&self, id: &str) -> Result<Option<EnvelopeKeyRecord>>;

    /// Store a key. Returns `false` if `(id, created)` already exists.
    fn store(&self, id: &str, created: i64, record: &EnvelopeKeyRecord) -> Result<bool>;
}

/// In-memory metastore: key id → (created → record).
#[derive(Default)]
pub struct MemoryMetastore {
    keys: RwLock<HashMap<String, HashMap<i64, EnvelopeKeyRecord>>>,
}

impl MemoryMetastore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored key versions across all ids.
    pub fn len(&self) -> usize {
        self.keys.read().values().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Metastore for MemoryMetastore {
    fn load(&self, id: &str, created: i64) -> Result<Option<EnvelopeKeyRecord>> {
        Ok(self
            .keys
            .read()
            .get(id)
            .and_then(|versions| versions.get(&created))
            .cloned())
    }

    fn load_latest(&self, id: &str) -> Result<Option<EnvelopeKeyRecord>> {
        Ok(self.keys.read().get(id).and_then(|versions| {
            versions
                .iter()
                .max_by_key(|(created, _)| **created)
                .map(|(_, record)| record.clone())
        }))
    }

    fn store(&self, id: &str, created: i64, record: &EnvelopeKeyRecord) -> Result<bool> {
        let mut keys = self.keys.write();
        let versions = keys.entry(id.to_string()).or_default();
        if versions.contains_key(&created) {
            return Ok(false);
        }
        versions.insert(created, record.clone());
        Ok(true)
    }
}
