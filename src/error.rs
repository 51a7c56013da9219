//! Client error taxonomy.
//!
//! Engine status codes are wrapped here at the call boundary and carried
//! verbatim; their meaning is defined by the engine.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid configuration: {0}")]
    ConfigValidation(String),

    #[error("Setup failed with error number {code}")]
    SetupError { code: i32 },

    #[error("Client not initialized")]
    NotInitialized,

    #[error("Client already initialized")]
    AlreadyInitialized,

    #[error("Client has been shut down")]
    ShutDown,

    #[error("Encrypt failed with error number {code}")]
    EncryptionError { code: i32 },

    #[error("Decrypt failed with error number {code}")]
    DecryptionError { code: i32 },

    #[error("Buffer decode error: {0}")]
    BufferDecode(String),

    #[error("Buffer encode error: {0}")]
    BufferEncode(String),

    #[error("Malformed data row record: {0}")]
    MalformedRecord(String),

    #[error("Decrypted data is not UTF-8: {0}")]
    InvalidUtf8(String),

    #[error("JSON error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Coarse grouping of [`Error`] variants for callers deciding what to do
/// with a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Configuration rejected locally, before reaching the engine.
    Configuration,
    /// Engine refused setup: unsupported options or an unreachable backend.
    /// May be transient.
    Backend,
    /// Client used in the wrong state. Always a caller bug.
    Lifecycle,
    /// Engine-reported encrypt/decrypt failure: wrong partition, tampered or
    /// malformed input, or an unreachable backend.
    Crypto,
    /// Local marshaling failure.
    Marshaling,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::ConfigValidation(_) => ErrorKind::Configuration,
            Error::SetupError { .. } => ErrorKind::Backend,
            Error::NotInitialized | Error::AlreadyInitialized | Error::ShutDown => {
                ErrorKind::Lifecycle
            }
            Error::EncryptionError { .. } | Error::DecryptionError { .. } => ErrorKind::Crypto,
            Error::BufferDecode(_)
            | Error::BufferEncode(_)
            | Error::MalformedRecord(_)
            | Error::InvalidUtf8(_)
            | Error::Serialization(_) => ErrorKind::Marshaling,
        }
    }

    /// Raw engine status code, for errors the engine reported.
    pub fn code(&self) -> Option<i32> {
        match self {
            Error::SetupError { code }
            | Error::EncryptionError { code }
            | Error::DecryptionError { code } => Some(*code),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn engine_codes_are_preserved() {
        let err = Error::DecryptionError { code: -104 };
        assert_eq!(err.code(), Some(-104));
        assert_eq!(err.to_string(), "Decrypt failed with error number -104");
        assert_eq!(Error::NotInitialized.code(), None);
    }

    #[test]
    fn kinds_separate_caller_bugs_from_crypto_failures() {
        assert_eq!(Error::NotInitialized.kind(), ErrorKind::Lifecycle);
        assert_eq!(Error::ShutDown.kind(), ErrorKind::Lifecycle);
        assert_eq!(Error::DecryptionError { code: -5 }.kind(), ErrorKind::Crypto);
        assert_eq!(Error::SetupError { code: -105 }.kind(), ErrorKind::Backend);
        assert_eq!(
            Error::ConfigValidation("x".into()).kind(),
            ErrorKind::Configuration
        );
        assert_eq!(Error::BufferDecode("x".into()).kind(), ErrorKind::Marshaling);
    }
}
