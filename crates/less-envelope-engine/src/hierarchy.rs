//! System key → intermediate key → data row key.
//!
//! - System key `_SK_{service}_{product}`: encrypted by the KMS.
//! - Intermediate key `_IK_{partition}_{service}_{product}`: encrypted by the
//!   system key.
//! - Data row key: random per record, encrypted by the intermediate key and
//!   stored inside the record.
//!
//! Every blob below the KMS uses the intermediate key id as AAD, so a record
//! only opens under the partition it was sealed for.

use std::time::Duration;

use less_crypto::{generate_key, SecretKey};

use crate::cache::KeyCache;
use crate::error::{EngineError, Result};
use crate::kms::{KeyManagementService, StaticKms, STATIC_MASTER_KEY};
use crate::metastore::{MemoryMetastore, Metastore};
use crate::options::{CryptoPolicy, SetupOptions};
use crate::record::{DataRowRecord, EnvelopeKeyRecord, KeyMeta};

macro_rules! verbose {
    ($self:expr, $($arg:tt)*) => {
        if $self.verbose {
            tracing::debug!($($arg)*);
        }
    };
}

fn now() -> i64 {
    chrono::Utc::now().timestamp()
}

fn secs(value: i64) -> Duration {
    Duration::from_secs(value.max(0) as u64)
}

pub struct KeyHierarchy {
    service: String,
    product: String,
    policy: CryptoPolicy,
    verbose: bool,
    kms: Box<dyn KeyManagementService>,
    metastore: Box<dyn Metastore>,
    system_keys: KeyCache,
    /// Present only when session caching is enabled.
    intermediate_keys: Option<KeyCache>,
}

impl KeyHierarchy {
    pub fn new(
        service: impl Into<String>,
        product: impl Into<String>,
        policy: CryptoPolicy,
        kms: Box<dyn KeyManagementService>,
        metastore: Box<dyn Metastore>,
    ) -> Self {
        let intermediate_keys = policy.session_caching.then(|| {
            KeyCache::new(
                policy.session_cache_max_size,
                secs(policy.session_cache_duration_secs),
            )
        });
        Self {
            service: service.into(),
            product: product.into(),
            system_keys: KeyCache::new(
                policy.session_cache_max_size,
                secs(policy.check_interval_secs),
            ),
            intermediate_keys,
            policy,
            verbose: false,
            kms,
            metastore,
        }
    }

    /// Build the hierarchy described by validated setup options.
    pub fn from_options(options: &SetupOptions) -> Result<Self> {
        options.validate()?;
        let kms = StaticKms::new(STATIC_MASTER_KEY)?;
        Ok(Self::new(
            options.service_name.clone(),
            options.product_id.clone(),
            options.policy()?,
            Box::new(kms),
            Box::new(MemoryMetastore::new()),
        )
        .with_verbose(options.verbose))
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn policy(&self) -> &CryptoPolicy {
        &self.policy
    }

    pub fn system_key_id(&self) -> String {
        format!("_SK_{}_{}", self.service, self.product)
    }

    pub fn intermediate_key_id(&self, partition: &str) -> String {
        format!("_IK_{}_{}_{}", partition, self.service, self.product)
    }

    fn is_expired(&self, created: i64) -> bool {
        now().saturating_sub(created) >= self.policy.expire_after_secs
    }

    // ========================================================================
    // Record operations
    // ========================================================================

    pub fn encrypt(&self, partition: &str, data: &[u8]) -> Result<DataRowRecord> {
        let ik_id = self.intermediate_key_id(partition);
        let (ik_meta, ik) = self.latest_intermediate_key(&ik_id)?;
        let aad = ik_id.as_bytes();

        let drk = generate_key()?;
        let data = drk
            .cipher()?
            .encrypt(data, aad)
            .map_err(|e| EngineError::Encrypt(e.to_string()))?;
        let encrypted_key = ik
            .cipher()?
            .encrypt(drk.as_bytes(), aad)
            .map_err(|e| EngineError::Encrypt(e.to_string()))?;

        Ok(DataRowRecord {
            key: EnvelopeKeyRecord {
                revoked: None,
                created: now(),
                encrypted_key,
                parent_key_meta: Some(ik_meta),
            },
            data,
        })
    }

    pub fn decrypt(&self, partition: &str, record: &DataRowRecord) -> Result<Vec<u8>> {
        let parent = record
            .key
            .parent_key_meta
            .as_ref()
            .ok_or(EngineError::MissingParentKey)?;
        let ik_id = self.intermediate_key_id(partition);
        if parent.id != ik_id {
            return Err(EngineError::PartitionMismatch {
                expected: ik_id,
                found: parent.id.clone(),
            });
        }
        let aad = ik_id.as_bytes();

        let ik = self.intermediate_key(parent)?;
        let drk = ik
            .cipher()?
            .decrypt(&record.key.encrypted_key, aad)
            .map_err(|e| EngineError::Decrypt(format!("data row key: {e}")))?;
        let drk = SecretKey::from_bytes(drk)?;
        drk.cipher()?
            .decrypt(&record.data, aad)
            .map_err(|e| EngineError::Decrypt(format!("data: {e}")))
    }

    /// Drop all unlocked keys.
    pub fn close(&self) {
        self.system_keys.clear();
        if let Some(cache) = &self.intermediate_keys {
            cache.clear();
        }
    }

    // ========================================================================
    // Key loading
    // ========================================================================

    /// Newest usable version of `id`, creating a new one when none exists or
    /// the newest has expired or been revoked.
    fn latest_key(
        &self,
        id: &str,
        cache: Option<&KeyCache>,
        unlock: impl Fn(&EnvelopeKeyRecord) -> Result<SecretKey>,
        seal: impl Fn(&SecretKey) -> Result<(Vec<u8>, Option<KeyMeta>)>,
    ) -> Result<(KeyMeta, SecretKey)> {
        let check_interval = secs(self.policy.check_interval_secs);
        if let Some(cache) = cache {
            if let Some(meta) = cache.latest(id, check_interval) {
                if !self.is_expired(meta.created) {
                    if let Some(key) = cache.get(&meta) {
                        verbose!(self, key_id = %id, created = meta.created, "cache hit");
                        return Ok((meta, key));
                    }
                }
            }
        }

        if let Some(record) = self.metastore.load_latest(id)? {
            if !record.is_revoked() && !self.is_expired(record.created) {
                let meta = KeyMeta::new(id, record.created);
                let key = unlock(&record)?;
                self.remember(cache, &meta, &key);
                return Ok((meta, key));
            }
            verbose!(self, key_id = %id, created = record.created, "rotating expired or revoked key");
        }

        let key = generate_key()?;
        let created = now();
        let (encrypted_key, parent_key_meta) = seal(&key)?;
        let record = EnvelopeKeyRecord {
            revoked: None,
            created,
            encrypted_key,
            parent_key_meta,
        };
        let meta = KeyMeta::new(id, created);

        if self.metastore.store(id, created, &record)? {
            verbose!(self, key_id = %id, created, "created key");
            self.remember(cache, &meta, &key);
            return Ok((meta, key));
        }

        // Lost a race with another writer for the same second; use theirs.
        let stored = self
            .metastore
            .load(id, created)?
            .ok_or_else(|| EngineError::KeyLookup(format!("{id}@{created} vanished")))?;
        let key = unlock(&stored)?;
        self.remember(cache, &meta, &key);
        Ok((meta, key))
    }

    fn remember(&self, cache: Option<&KeyCache>, meta: &KeyMeta, key: &SecretKey) {
        if let Some(cache) = cache {
            cache.insert(meta.clone(), key.clone());
            cache.set_latest(meta.clone());
        }
    }

    fn unlock_system_key(&self, record: &EnvelopeKeyRecord) -> Result<SecretKey> {
        self.kms.decrypt_key(&record.encrypted_key)
    }

    fn unlock_intermediate_key(&self, id: &str, record: &EnvelopeKeyRecord) -> Result<SecretKey> {
        let parent = record
            .parent_key_meta
            .as_ref()
            .ok_or(EngineError::MissingParentKey)?;
        if parent.id != self.system_key_id() {
            return Err(EngineError::KeyLookup(format!(
                "intermediate key {id} has foreign parent {}",
                parent.id
            )));
        }
        let sk = self.system_key(parent)?;
        let bytes = sk
            .cipher()?
            .decrypt(&record.encrypted_key, id.as_bytes())
            .map_err(|e| EngineError::KeyLookup(format!("intermediate key {id}: {e}")))?;
        Ok(SecretKey::from_bytes(bytes)?)
    }

    fn latest_system_key(&self) -> Result<(KeyMeta, SecretKey)> {
        let id = self.system_key_id();
        self.latest_key(
            &id,
            Some(&self.system_keys),
            |record| self.unlock_system_key(record),
            |key| Ok((self.kms.encrypt_key(key)?, None)),
        )
    }

    fn latest_intermediate_key(&self, id: &str) -> Result<(KeyMeta, SecretKey)> {
        self.latest_key(
            id,
            self.intermediate_keys.as_ref(),
            |record| self.unlock_intermediate_key(id, record),
            |key| {
                let (sk_meta, sk) = self.latest_system_key()?;
                let encrypted = sk.cipher()?.encrypt(key.as_bytes(), id.as_bytes())?;
                Ok((encrypted, Some(sk_meta)))
            },
        )
    }

    /// Exact system key version named by `meta`.
    fn system_key(&self, meta: &KeyMeta) -> Result<SecretKey> {
        if let Some(key) = self.system_keys.get(meta) {
            return Ok(key);
        }
        let record = self
            .metastore
            .load(&meta.id, meta.created)?
            .ok_or_else(|| {
                EngineError::KeyLookup(format!("system key {}@{} not found", meta.id, meta.created))
            })?;
        let key = self.unlock_system_key(&record)?;
        self.system_keys.insert(meta.clone(), key.clone());
        Ok(key)
    }

    /// Exact intermediate key version named by `meta`.
    fn intermediate_key(&self, meta: &KeyMeta) -> Result<SecretKey> {
        if let Some(key) = self.intermediate_keys.as_ref().and_then(|c| c.get(meta)) {
            verbose!(self, key_id = %meta.id, created = meta.created, "cache hit");
            return Ok(key);
        }
        let record = self
            .metastore
            .load(&meta.id, meta.created)?
            .ok_or_else(|| {
                EngineError::Decrypt(format!(
                    "intermediate key {}@{} not found",
                    meta.id, meta.created
                ))
            })?;
        let key = self.unlock_intermediate_key(&meta.id, &record)?;
        if let Some(cache) = &self.intermediate_keys {
            cache.insert(meta.clone(), key.clone());
        }
        Ok(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    /// Metastore handle shared between a hierarchy and the test.
    struct Shared(Arc<MemoryMetastore>);

    impl Metastore for Shared {
        fn load(&self, id: &str, created: i64) -> Result<Option<EnvelopeKeyRecord>> {
            self.0.load(id, created)
        }
        fn load_latest(&self, id: &str) -> Result<Option<EnvelopeKeyRecord>> {
            self.0.load_latest(id)
        }
        fn store(&self, id: &str, created: i64, record: &EnvelopeKeyRecord) -> Result<bool> {
            self.0.store(id, created, record)
        }
    }

    fn hierarchy_with(policy: CryptoPolicy) -> (KeyHierarchy, Arc<MemoryMetastore>) {
        let store = Arc::new(MemoryMetastore::new());
        let hierarchy = KeyHierarchy::new(
            "TestService",
            "TestProduct",
            policy,
            Box::new(StaticKms::new(STATIC_MASTER_KEY).unwrap()),
            Box::new(Shared(store.clone())),
        );
        (hierarchy, store)
    }

    fn hierarchy() -> KeyHierarchy {
        hierarchy_with(CryptoPolicy::default()).0
    }

    #[test]
    fn key_ids_follow_naming() {
        let h = hierarchy();
        assert_eq!(h.system_key_id(), "_SK_TestService_TestProduct");
        assert_eq!(
            h.intermediate_key_id("partition"),
            "_IK_partition_TestService_TestProduct"
        );
    }

    #[test]
    fn round_trip() {
        let h = hierarchy();
        let record = h.encrypt("partition", b"mysecretdata").unwrap();
        assert_eq!(h.decrypt("partition", &record).unwrap(), b"mysecretdata");
    }

    #[test]
    fn record_points_at_intermediate_key() {
        let h = hierarchy();
        let record = h.encrypt("partition", b"x").unwrap();
        let parent = record.key.parent_key_meta.unwrap();
        assert_eq!(parent.id, h.intermediate_key_id("partition"));
    }

    #[test]
    fn wrong_partition_fails() {
        let h = hierarchy();
        let record = h.encrypt("partition", b"mysecretdata").unwrap();
        assert!(matches!(
            h.decrypt("partition2", &record),
            Err(EngineError::PartitionMismatch { .. })
        ));
        assert!(h.decrypt("Partition", &record).is_err());
    }

    #[test]
    fn relabelled_parent_still_fails() {
        let h = hierarchy();
        h.encrypt("other", b"warm up other partition").unwrap();
        let mut record = h.encrypt("partition", b"mysecretdata").unwrap();
        // Point the record at the other partition's key: AAD and key both differ.
        let other_meta = h.encrypt("other", b"y").unwrap().key.parent_key_meta;
        record.key.parent_key_meta = other_meta;
        assert!(h.decrypt("other", &record).is_err());
    }

    #[test]
    fn tampered_data_fails() {
        let h = hierarchy();
        let mut record = h.encrypt("partition", b"mysecretdata").unwrap();
        record.data[14] ^= 0x01;
        assert!(h.decrypt("partition", &record).is_err());
    }

    #[test]
    fn tampered_key_fails() {
        let h = hierarchy();
        let mut record = h.encrypt("partition", b"mysecretdata").unwrap();
        record.key.encrypted_key[0] ^= 0x01;
        assert!(h.decrypt("partition", &record).is_err());
    }

    #[test]
    fn missing_parent_fails() {
        let h = hierarchy();
        let mut record = h.encrypt("partition", b"data").unwrap();
        record.key.parent_key_meta = None;
        assert!(matches!(
            h.decrypt("partition", &record),
            Err(EngineError::MissingParentKey)
        ));
    }

    #[test]
    fn unknown_intermediate_version_fails() {
        let h = hierarchy();
        let mut record = h.encrypt("partition", b"data").unwrap();
        if let Some(meta) = record.key.parent_key_meta.as_mut() {
            meta.created += 1;
        }
        assert!(h.decrypt("partition", &record).is_err());
    }

    #[test]
    fn intermediate_key_is_reused_within_partition() {
        let (h, store) = hierarchy_with(CryptoPolicy::default());
        let a = h.encrypt("partition", b"a").unwrap();
        let b = h.encrypt("partition", b"b").unwrap();
        assert_eq!(a.key.parent_key_meta, b.key.parent_key_meta);
        // One system key, one intermediate key.
        assert_eq!(store.len(), 2);
        h.encrypt("second", b"c").unwrap();
        assert_eq!(store.len(), 3);
    }

    #[test]
    fn expired_keys_rotate_but_old_records_open() {
        let policy = CryptoPolicy {
            expire_after_secs: 1,
            ..CryptoPolicy::default()
        };
        let (h, _store) = hierarchy_with(policy);
        let old = h.encrypt("partition", b"old").unwrap();
        std::thread::sleep(Duration::from_millis(2100));
        let new = h.encrypt("partition", b"new").unwrap();
        assert_ne!(old.key.parent_key_meta, new.key.parent_key_meta);
        assert_eq!(h.decrypt("partition", &old).unwrap(), b"old");
        assert_eq!(h.decrypt("partition", &new).unwrap(), b"new");
    }

    fn revoked(created: i64, parent_key_meta: Option<KeyMeta>) -> EnvelopeKeyRecord {
        EnvelopeKeyRecord {
            revoked: Some(true),
            created,
            // Never unlocked: opening this would fail.
            encrypted_key: vec![0u8; 60],
            parent_key_meta,
        }
    }

    #[test]
    fn revoked_intermediate_key_rotates() {
        let (h, store) = hierarchy_with(CryptoPolicy::default());
        let ik_id = h.intermediate_key_id("partition");
        let stale = now() - 100;
        let parent = KeyMeta::new(h.system_key_id(), stale);
        assert!(store.store(&ik_id, stale, &revoked(stale, Some(parent))).unwrap());

        let record = h.encrypt("partition", b"fresh").unwrap();
        let ik_meta = record.key.parent_key_meta.clone().unwrap();
        assert_eq!(ik_meta.id, ik_id);
        assert_ne!(ik_meta.created, stale);
        assert!(!store.load(&ik_id, ik_meta.created).unwrap().unwrap().is_revoked());
        assert_eq!(h.decrypt("partition", &record).unwrap(), b"fresh");
    }

    #[test]
    fn revoked_system_key_rotates() {
        let (h, store) = hierarchy_with(CryptoPolicy::default());
        let sk_id = h.system_key_id();
        let stale = now() - 100;
        assert!(store.store(&sk_id, stale, &revoked(stale, None)).unwrap());

        let record = h.encrypt("partition", b"fresh").unwrap();
        let ik_meta = record.key.parent_key_meta.clone().unwrap();
        let ik = store.load(&ik_meta.id, ik_meta.created).unwrap().unwrap();
        let sk_meta = ik.parent_key_meta.unwrap();
        assert_eq!(sk_meta.id, sk_id);
        assert_ne!(sk_meta.created, stale);
        assert_eq!(h.decrypt("partition", &record).unwrap(), b"fresh");
    }

    #[test]
    fn session_cache_survives_close_for_metastore_lookup() {
        let policy = CryptoPolicy {
            session_caching: true,
            session_cache_max_size: 2,
            ..CryptoPolicy::default()
        };
        let (h, _store) = hierarchy_with(policy);
        let record = h.encrypt("partition", b"cached").unwrap();
        assert_eq!(h.decrypt("partition", &record).unwrap(), b"cached");
        h.close();
        assert_eq!(h.decrypt("partition", &record).unwrap(), b"cached");
    }

    #[test]
    fn records_open_in_second_hierarchy_over_same_store() {
        let (h1, store) = hierarchy_with(CryptoPolicy::default());
        let record = h1.encrypt("partition", b"portable").unwrap();
        let h2 = KeyHierarchy::new(
            "TestService",
            "TestProduct",
            CryptoPolicy::default(),
            Box::new(StaticKms::new(STATIC_MASTER_KEY).unwrap()),
            Box::new(Shared(store)),
        );
        assert_eq!(h2.decrypt("partition", &record).unwrap(), b"portable");
    }

    #[test]
    fn other_product_cannot_open() {
        let (h1, store) = hierarchy_with(CryptoPolicy::default());
        let record = h1.encrypt("partition", b"scoped").unwrap();
        let h2 = KeyHierarchy::new(
            "TestService",
            "OtherProduct",
            CryptoPolicy::default(),
            Box::new(StaticKms::new(STATIC_MASTER_KEY).unwrap()),
            Box::new(Shared(store)),
        );
        assert!(h2.decrypt("partition", &record).is_err());
    }

    #[test]
    fn empty_payload_round_trips() {
        let h = hierarchy();
        let record = h.encrypt("partition", b"").unwrap();
        assert!(h.decrypt("partition", &record).unwrap().is_empty());
    }
}
