//! Buffer-level engine surface: every operation reads input buffers, writes
//! output buffers and returns a status code (`< 0` on failure).

use std::sync::Arc;

use parking_lot::RwLock;
use zeroize::Zeroizing;

use crate::buffer;
use crate::error::{EngineError, Operation, Result, ERR_NONE};
use crate::hierarchy::KeyHierarchy;
use crate::options::SetupOptions;
use crate::record::{DataRowRecord, EnvelopeKeyRecord, KeyMeta};

fn status(result: Result<()>, op: Operation) -> i32 {
    match result {
        Ok(()) => ERR_NONE,
        Err(err) => {
            let code = err.code(op);
            match op {
                Operation::Setup => tracing::warn!(error = %err, code, "setup rejected"),
                _ => tracing::debug!(error = %err, code, ?op, "operation failed"),
            }
            code
        }
    }
}

/// One engine instance. The C ABI in [`crate::ffi`] wraps a process-global
/// one; embedders and tests may hold their own.
pub struct SoftwareEngine {
    hierarchy: RwLock<Option<Arc<KeyHierarchy>>>,
}

impl Default for SoftwareEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl SoftwareEngine {
    pub const fn new() -> Self {
        Self {
            hierarchy: parking_lot::const_rwlock(None),
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.hierarchy.read().is_some()
    }

    fn session(&self) -> Result<Arc<KeyHierarchy>> {
        self.hierarchy
            .read()
            .clone()
            .ok_or(EngineError::NotInitialized)
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Configure the engine from a buffer holding the wire JSON options.
    pub fn setup_json(&self, config: &[u8]) -> i32 {
        status(self.try_setup(config), Operation::Setup)
    }

    fn try_setup(&self, config: &[u8]) -> Result<()> {
        let mut slot = self.hierarchy.write();
        if slot.is_some() {
            return Err(EngineError::AlreadyInitialized);
        }
        let options = SetupOptions::from_json(buffer::read_str(config)?)?;
        let hierarchy = KeyHierarchy::from_options(&options)?;
        tracing::debug!(
            service = %options.service_name,
            product = %options.product_id,
            session_caching = options.enable_session_caching,
            "engine initialized"
        );
        *slot = Some(Arc::new(hierarchy));
        Ok(())
    }

    /// Release all key material. Calls after this fail with "not initialized".
    pub fn shutdown(&self) {
        if let Some(hierarchy) = self.hierarchy.write().take() {
            hierarchy.close();
            tracing::debug!("engine shut down");
        }
    }

    // ========================================================================
    // Component form
    // ========================================================================

    #[allow(clippy::too_many_arguments)]
    pub fn encrypt(
        &self,
        partition: &[u8],
        data: &[u8],
        out_data: &mut [u8],
        out_key: &mut [u8],
        out_created: &mut [u8],
        out_parent_key_id: &mut [u8],
        out_parent_key_created: &mut [u8],
    ) -> i32 {
        let result = (|| -> Result<()> {
            let hierarchy = self.session()?;
            let partition = buffer::read_str(partition)?;
            let record = hierarchy.encrypt(partition, buffer::read_bytes(data)?)?;
            let parent = record
                .key
                .parent_key_meta
                .as_ref()
                .ok_or(EngineError::MissingParentKey)?;
            buffer::write_bytes(out_data, &record.data)?;
            buffer::write_bytes(out_key, &record.key.encrypted_key)?;
            buffer::write_i64(out_created, record.key.created)?;
            buffer::write_bytes(out_parent_key_id, parent.id.as_bytes())?;
            buffer::write_i64(out_parent_key_created, parent.created)?;
            Ok(())
        })();
        status(result, Operation::Encrypt)
    }

    #[allow(clippy::too_many_arguments)]
    pub fn decrypt(
        &self,
        partition: &[u8],
        data: &[u8],
        key: &[u8],
        created: i64,
        parent_key_id: &[u8],
        parent_key_created: i64,
        out_data: &mut [u8],
    ) -> i32 {
        let result = (|| -> Result<()> {
            let hierarchy = self.session()?;
            let partition = buffer::read_str(partition)?;
            let record = DataRowRecord {
                key: EnvelopeKeyRecord {
                    revoked: None,
                    created,
                    encrypted_key: buffer::read_bytes(key)?.to_vec(),
                    parent_key_meta: Some(KeyMeta::new(
                        buffer::read_str(parent_key_id)?,
                        parent_key_created,
                    )),
                },
                data: buffer::read_bytes(data)?.to_vec(),
            };
            let plaintext = Zeroizing::new(hierarchy.decrypt(partition, &record)?);
            buffer::write_bytes(out_data, &plaintext)
        })();
        status(result, Operation::Decrypt)
    }

    // ========================================================================
    // JSON envelope form
    // ========================================================================

    pub fn encrypt_to_json(&self, partition: &[u8], data: &[u8], out_json: &mut [u8]) -> i32 {
        let result = (|| -> Result<()> {
            let hierarchy = self.session()?;
            let partition = buffer::read_str(partition)?;
            let record = hierarchy.encrypt(partition, buffer::read_bytes(data)?)?;
            let json = serde_json::to_vec(&record)
                .map_err(|e| EngineError::JsonEncode(e.to_string()))?;
            buffer::write_bytes(out_json, &json)
        })();
        status(result, Operation::Encrypt)
    }

    pub fn decrypt_from_json(&self, partition: &[u8], json: &[u8], out_data: &mut [u8]) -> i32 {
        let result = (|| -> Result<()> {
            let hierarchy = self.session()?;
            let partition = buffer::read_str(partition)?;
            let record: DataRowRecord = serde_json::from_slice(buffer::read_bytes(json)?)
                .map_err(|e| EngineError::JsonDecode(e.to_string()))?;
            let plaintext = Zeroizing::new(hierarchy.decrypt(partition, &record)?);
            buffer::write_bytes(out_data, &plaintext)
        })();
        status(result, Operation::Decrypt)
    }
}
