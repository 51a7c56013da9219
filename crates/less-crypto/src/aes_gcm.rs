//! AES-256-GCM encryption for key material and record payloads.
//!
//! Wire format: [12 bytes: IV][N bytes: ciphertext + tag]
//! The caller supplies the AAD; the engine binds every blob to the id of the
//! key that protects it.

use aes_gcm::aead::{Aead, KeyInit, Payload};
use aes_gcm::{Aes256Gcm, Nonce};

use crate::error::CryptoError;
use crate::types::{AES_GCM_IV_LENGTH, AES_GCM_TAG_LENGTH, AES_KEY_LENGTH};

/// Random 12-byte IV.
fn generate_iv() -> Result<[u8; AES_GCM_IV_LENGTH], CryptoError> {
    let mut iv = [0u8; AES_GCM_IV_LENGTH];
    getrandom::getrandom(&mut iv).map_err(|e| CryptoError::RngFailed(e.to_string()))?;
    Ok(iv)
}

fn check_key(key: &[u8]) -> Result<(), CryptoError> {
    if key.len() != AES_KEY_LENGTH {
        return Err(CryptoError::InvalidKeyLength {
            expected: AES_KEY_LENGTH,
            got: key.len(),
        });
    }
    Ok(())
}

/// AES-256-GCM cipher bound to one key, for repeated use.
///
/// The engine keeps one of these per unlocked system or intermediate key.
pub struct KeyCipher {
    cipher: Aes256Gcm,
}

impl KeyCipher {
    /// Create a cipher from 32 bytes of raw key material.
    pub fn new(key: &[u8]) -> Result<Self, CryptoError> {
        check_key(key)?;
        let cipher = Aes256Gcm::new_from_slice(key)
            .map_err(|e| CryptoError::EncryptionFailed(e.to_string()))?;
        Ok(Self { cipher })
    }

    /// Encrypt `plaintext`, returning `[IV][ciphertext+tag]`.
    pub fn encrypt(&self, plaintext: &[u8], aad: &[u8]) -> Result<Vec<u8>, CryptoError> {
        let iv = generate_iv()?;
        let nonce = Nonce::from_slice(&iv);

        let ciphertext = self
            .cipher
            .encrypt(
                nonce,
                Payload {
                    msg: plaintext,
                    aad,
                },
            )
            .map_err(|e| CryptoError::EncryptionFailed(e.to_string()))?;

        let mut result = Vec::with_capacity(AES_GCM_IV_LENGTH + ciphertext.len());
        result.extend_from_slice(&iv);
        result.extend_from_slice(&ciphertext);
        Ok(result)
    }

    /// Decrypt a `[IV][ciphertext+tag]` blob.
    pub fn decrypt(&self, data: &[u8], aad: &[u8]) -> Result<Vec<u8>, CryptoError> {
        if data.len() < AES_GCM_IV_LENGTH + AES_GCM_TAG_LENGTH {
            return Err(CryptoError::DataTooShort {
                min: AES_GCM_IV_LENGTH + AES_GCM_TAG_LENGTH,
                got: data.len(),
            });
        }
        let iv = &data[..AES_GCM_IV_LENGTH];
        let ciphertext = &data[AES_GCM_IV_LENGTH..];
        let nonce = Nonce::from_slice(iv);

        self.cipher
            .decrypt(
                nonce,
                Payload {
                    msg: ciphertext,
                    aad,
                },
            )
            .map_err(|e| CryptoError::DecryptionFailed(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::GCM_OVERHEAD;

    fn random_cipher() -> KeyCipher {
        let mut key = [0u8; 32];
        getrandom::getrandom(&mut key).unwrap();
        KeyCipher::new(&key).unwrap()
    }

    #[test]
    fn encrypt_decrypt_round_trip() {
        let cipher = random_cipher();
        let plaintext = b"Hello, World!";
        let encrypted = cipher.encrypt(plaintext, b"").unwrap();
        let decrypted = cipher.decrypt(&encrypted, b"").unwrap();
        assert_eq!(decrypted, plaintext);
    }

    #[test]
    fn overhead_is_iv_plus_tag() {
        let encrypted = random_cipher().encrypt(&[7u8; 100], b"aad").unwrap();
        assert_eq!(encrypted.len(), 100 + GCM_OVERHEAD);
    }

    #[test]
    fn different_ciphertext_each_time() {
        let cipher = random_cipher();
        let enc1 = cipher.encrypt(b"test", b"").unwrap();
        let enc2 = cipher.encrypt(b"test", b"").unwrap();
        assert_ne!(enc1, enc2);
        assert_eq!(cipher.decrypt(&enc1, b"").unwrap(), b"test");
        assert_eq!(cipher.decrypt(&enc2, b"").unwrap(), b"test");
    }

    #[test]
    fn known_key_round_trip() {
        let key = hex::decode("000102030405060708090a0b0c0d0e0f101112131415161718191a1b1c1d1e1f")
            .unwrap();
        let encrypted = KeyCipher::new(&key).unwrap().encrypt(b"vector", b"ctx").unwrap();
        // A second cipher from the same bytes opens it.
        let reopened = KeyCipher::new(&key).unwrap();
        assert_eq!(reopened.decrypt(&encrypted, b"ctx").unwrap(), b"vector");
    }

    #[test]
    fn empty_plaintext() {
        let cipher = random_cipher();
        let encrypted = cipher.encrypt(b"", b"").unwrap();
        assert_eq!(encrypted.len(), GCM_OVERHEAD);
        assert!(cipher.decrypt(&encrypted, b"").unwrap().is_empty());
    }

    #[test]
    fn rejects_tampered_ciphertext() {
        let cipher = random_cipher();
        let mut encrypted = cipher.encrypt(b"secret", b"").unwrap();
        let last = encrypted.len() - 1;
        encrypted[last] ^= 0x01;
        assert!(cipher.decrypt(&encrypted, b"").is_err());
    }

    #[test]
    fn rejects_tampered_iv() {
        let cipher = random_cipher();
        let mut encrypted = cipher.encrypt(b"secret", b"").unwrap();
        encrypted[0] ^= 0x80;
        assert!(cipher.decrypt(&encrypted, b"").is_err());
    }

    #[test]
    fn wrong_key_fails() {
        let encrypted = random_cipher().encrypt(b"secret", b"").unwrap();
        assert!(random_cipher().decrypt(&encrypted, b"").is_err());
    }

    #[test]
    fn aad_mismatch_fails() {
        let cipher = random_cipher();
        let encrypted = cipher.encrypt(b"secret", b"partition").unwrap();
        assert!(cipher.decrypt(&encrypted, b"Partition").is_err());
        assert!(cipher.decrypt(&encrypted, b"").is_err());
    }

    #[test]
    fn rejects_truncated() {
        let err = random_cipher().decrypt(&[0u8; 27], b"").unwrap_err();
        assert!(matches!(err, CryptoError::DataTooShort { min: 28, got: 27 }));
    }

    #[test]
    fn rejects_bad_key_length() {
        let err = KeyCipher::new(&[0u8; 16]).err().unwrap();
        assert!(matches!(
            err,
            CryptoError::InvalidKeyLength {
                expected: 32,
                got: 16
            }
        ));
    }
}
