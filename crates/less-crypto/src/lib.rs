//! AES-256-GCM primitives and random key material for envelope encryption.

pub mod aes_gcm;
pub mod dek;
pub mod error;
pub mod types;

pub use aes_gcm::KeyCipher;
pub use dek::{generate_key, SecretKey};
pub use error::CryptoError;
pub use types::{AES_GCM_IV_LENGTH, AES_GCM_TAG_LENGTH, AES_KEY_LENGTH, GCM_OVERHEAD};
