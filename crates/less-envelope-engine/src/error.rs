use thiserror::Error;

// ============================================================================
// Status codes returned across the C ABI
// ============================================================================

pub const ERR_NONE: i32 = 0;
pub const ERR_NULL_PTR: i32 = -1;
pub const ERR_BUFFER_TOO_LARGE: i32 = -2;
pub const ERR_BUFFER_TOO_SMALL: i32 = -3;
pub const ERR_COPY_FAILED: i32 = -4;
pub const ERR_JSON_DECODE_FAILED: i32 = -5;
pub const ERR_JSON_ENCODE_FAILED: i32 = -6;
pub const ERR_INVALID_UTF8: i32 = -7;
pub const ERR_NOT_INITIALIZED: i32 = -100;
pub const ERR_ALREADY_INITIALIZED: i32 = -101;
pub const ERR_GET_SESSION_FAILED: i32 = -102;
pub const ERR_ENCRYPT_FAILED: i32 = -103;
pub const ERR_DECRYPT_FAILED: i32 = -104;
pub const ERR_BAD_CONFIG: i32 = -105;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Null buffer pointer")]
    NullPointer,

    #[error("Buffer declares invalid length {0}")]
    InvalidLength(i64),

    #[error("Buffer too large: {0} bytes")]
    BufferTooLarge(usize),

    #[error("Output buffer too small: need {needed} bytes, capacity {capacity}")]
    BufferTooSmall { needed: usize, capacity: usize },

    #[error("Integer buffer must hold 8 bytes, got {0}")]
    InvalidInteger(usize),

    #[error("JSON decode failed: {0}")]
    JsonDecode(String),

    #[error("JSON encode failed: {0}")]
    JsonEncode(String),

    #[error("Invalid UTF-8 in buffer")]
    InvalidUtf8,

    #[error("Engine not initialized")]
    NotInitialized,

    #[error("Engine already initialized")]
    AlreadyInitialized,

    #[error("Bad config: {0}")]
    BadConfig(String),

    #[error("Unsupported {kind}: {value}")]
    Unsupported { kind: &'static str, value: String },

    #[error("Key lookup failed: {0}")]
    KeyLookup(String),

    #[error("Intermediate key {found} does not belong to partition (expected {expected})")]
    PartitionMismatch { expected: String, found: String },

    #[error("Envelope key record has no parent key")]
    MissingParentKey,

    #[error("Encrypt failed: {0}")]
    Encrypt(String),

    #[error("Decrypt failed: {0}")]
    Decrypt(String),

    #[error("Crypto error: {0}")]
    Crypto(#[from] less_crypto::CryptoError),
}

/// Which engine operation an error surfaced from. Crypto and lookup failures
/// map to the operation's generic status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Setup,
    Encrypt,
    Decrypt,
}

impl EngineError {
    /// Status code reported across the ABI for this error.
    pub fn code(&self, op: Operation) -> i32 {
        match self {
            EngineError::NullPointer => ERR_NULL_PTR,
            EngineError::InvalidLength(_) | EngineError::BufferTooLarge(_) => ERR_BUFFER_TOO_LARGE,
            EngineError::BufferTooSmall { .. } => ERR_BUFFER_TOO_SMALL,
            EngineError::InvalidInteger(_) => ERR_COPY_FAILED,
            EngineError::JsonDecode(_) => ERR_JSON_DECODE_FAILED,
            EngineError::JsonEncode(_) => ERR_JSON_ENCODE_FAILED,
            EngineError::InvalidUtf8 => ERR_INVALID_UTF8,
            EngineError::NotInitialized => ERR_NOT_INITIALIZED,
            EngineError::AlreadyInitialized => ERR_ALREADY_INITIALIZED,
            EngineError::BadConfig(_) | EngineError::Unsupported { .. } => ERR_BAD_CONFIG,
            EngineError::KeyLookup(_) => match op {
                Operation::Setup => ERR_BAD_CONFIG,
                _ => ERR_GET_SESSION_FAILED,
            },
            EngineError::PartitionMismatch { .. }
            | EngineError::MissingParentKey
            | EngineError::Encrypt(_)
            | EngineError::Decrypt(_)
            | EngineError::Crypto(_) => match op {
                Operation::Encrypt => ERR_ENCRYPT_FAILED,
                _ => ERR_DECRYPT_FAILED,
            },
        }
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;
