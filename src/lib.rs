//! Envelope-encryption client.
//!
//! Validates configuration, marshals calls into length-prefixed transfer
//! buffers for a native engine, and returns typed records. Cryptography and
//! key management live in the engine (`less-envelope-engine`).

pub mod buffer;
pub mod capacity;
pub mod client;
pub mod config;
pub mod engine;
pub mod error;
pub mod record;
pub mod translate;

pub use buffer::Buffer;
pub use capacity::CapacityEstimator;
pub use client::EnvelopeClient;
pub use config::{Config, ConfigBuilder, KmsType, MetastoreType, ReadConsistency};
pub use engine::{Engine, FfiEngine, SoftwareEngine};
pub use error::{Error, ErrorKind, Result};
pub use record::{DataRowRecord, EnvelopeKeyRecord, KeyMeta};
pub use translate::{to_wire_json, wire_key, WIRE_FIELDS};
