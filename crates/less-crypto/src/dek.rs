//! Random 256-bit key material.
//!
//! System, intermediate and data row keys are all plain AES-256 keys. They
//! differ only in which key encrypts them before they are persisted.

use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::aes_gcm::KeyCipher;
use crate::error::CryptoError;
use crate::types::AES_KEY_LENGTH;

/// Owned key bytes, zeroized on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SecretKey {
    bytes: Vec<u8>,
}

impl SecretKey {
    /// Wrap decrypted key bytes, checking the length.
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self, CryptoError> {
        if bytes.len() != AES_KEY_LENGTH {
            let got = bytes.len();
            let mut bytes = bytes;
            bytes.zeroize();
            return Err(CryptoError::InvalidKeyLength {
                expected: AES_KEY_LENGTH,
                got,
            });
        }
        Ok(Self { bytes })
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Build a reusable cipher over this key.
    pub fn cipher(&self) -> Result<KeyCipher, CryptoError> {
        KeyCipher::new(&self.bytes)
    }
}

impl std::fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SecretKey(..)")
    }
}

/// Generate a random 256-bit key.
pub fn generate_key() -> Result<SecretKey, CryptoError> {
    let mut bytes = vec![0u8; AES_KEY_LENGTH];
    getrandom::getrandom(&mut bytes).map_err(|e| CryptoError::RngFailed(e.to_string()))?;
    Ok(SecretKey { bytes })
}
