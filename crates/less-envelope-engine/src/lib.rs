//! Reference envelope-encryption engine.
//!
//! Implements the native side of the envelope contract: setup from wire JSON
//! options, encrypt/decrypt in component or JSON-envelope form, all over
//! length-prefixed transfer buffers with `i32` status codes. Keys are derived
//! in a system → intermediate → data row hierarchy, with a static master key
//! and an in-memory metastore.

pub mod buffer;
pub mod cache;
pub mod engine;
pub mod error;
pub mod ffi;
pub mod hierarchy;
pub mod kms;
pub mod metastore;
pub mod options;
pub mod record;

pub use engine::SoftwareEngine;
pub use error::EngineError;
pub use hierarchy::KeyHierarchy;
pub use options::{CryptoPolicy, SetupOptions};
pub use record::{DataRowRecord, EnvelopeKeyRecord, KeyMeta};
