//! Master key providers. The KMS protects system keys only.

use less_crypto::{KeyCipher, SecretKey};

use crate::error::{EngineError, Result};

/// Fixed master key used by the `static` KMS. Test and local use only.
pub const STATIC_MASTER_KEY: &[u8; 32] = b"thisIsAStaticMasterKeyForTesting";

pub trait KeyManagementService: Send + Sync {
    /// Encrypt a system key under the master key.
    fn encrypt_key(&self, key: &SecretKey) -> Result<Vec<u8>>;

    /// Decrypt a system key previously produced by `encrypt_key`.
    fn decrypt_key(&self, encrypted: &[u8]) -> Result<SecretKey>;
}

/// KMS backed by a single in-process master key.
pub struct StaticKms {
    cipher: KeyCipher,
}

impl StaticKms {
    pub fn new(master_key: &[u8]) -> Result<Self> {
        Ok(Self {
            cipher: KeyCipher::new(master_key)?,
        })
    }
}

impl KeyManagementService for StaticKms {
    fn encrypt_key(&self, key: &SecretKey) -> Result<Vec<u8>> {
        Ok(self.cipher.encrypt(key.as_bytes(), b"")?)
    }

    fn decrypt_key(&self, encrypted: &[u8]) -> Result<SecretKey> {
        let bytes = self
            .cipher
            .decrypt(encrypted, b"")
            .map_err(|e| EngineError::KeyLookup(format!("KMS decrypt: {e}")))?;
        Ok(SecretKey::from_bytes(bytes)?)
    }
}
