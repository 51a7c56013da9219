//! Envelope client: lifecycle plus encrypt/decrypt over an [`Engine`].
//!
//! `Uninitialized → Initialized → Shutdown`. Shutdown is terminal. Encrypt
//! and decrypt take the state read lock for the whole call and run in
//! parallel; setup and shutdown take the write lock.

use parking_lot::RwLock;

use crate::buffer::Buffer;
use crate::capacity::CapacityEstimator;
use crate::config::Config;
use crate::engine::{Engine, SoftwareEngine};
use crate::error::{Error, Result};
use crate::record::{DataRowRecord, EnvelopeKeyRecord, KeyMeta};
use crate::translate::to_wire_json;

enum ClientState {
    Uninitialized,
    Initialized { estimator: CapacityEstimator },
    Shutdown,
}

impl ClientState {
    fn estimator(&self) -> Result<&CapacityEstimator> {
        match self {
            ClientState::Initialized { estimator } => Ok(estimator),
            ClientState::Uninitialized | ClientState::Shutdown => Err(Error::NotInitialized),
        }
    }
}

fn check(status: i32, call: &'static str, error: impl FnOnce(i32) -> Error) -> Result<()> {
    if status < 0 {
        tracing::warn!(code = status, call, "engine call failed");
        return Err(error(status));
    }
    Ok(())
}

fn encryption_error(code: i32) -> Error {
    Error::EncryptionError { code }
}

fn decryption_error(code: i32) -> Error {
    Error::DecryptionError { code }
}

pub struct EnvelopeClient<E: Engine = SoftwareEngine> {
    engine: E,
    state: RwLock<ClientState>,
}

impl EnvelopeClient<SoftwareEngine> {
    /// Client over a private in-process engine instance.
    pub fn new() -> Self {
        Self::with_engine(SoftwareEngine::new())
    }
}

impl Default for EnvelopeClient<SoftwareEngine> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: Engine> EnvelopeClient<E> {
    pub fn with_engine(engine: E) -> Self {
        Self {
            engine,
            state: RwLock::new(ClientState::Uninitialized),
        }
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn is_initialized(&self) -> bool {
        matches!(*self.state.read(), ClientState::Initialized { .. })
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Hand the configuration to the engine. On failure the client stays
    /// uninitialized and setup may be retried.
    pub fn setup(&self, config: &Config) -> Result<()> {
        let mut state = self.state.write();
        match *state {
            ClientState::Uninitialized => {}
            ClientState::Initialized { .. } => return Err(Error::AlreadyInitialized),
            ClientState::Shutdown => return Err(Error::ShutDown),
        }

        let wire = Buffer::encode_str(&to_wire_json(config)?)?;
        check(self.engine.setup_json(&wire), "setup", |code| Error::SetupError {
            code,
        })?;

        *state = ClientState::Initialized {
            estimator: CapacityEstimator::new(config.service_name(), config.product_id()),
        };
        tracing::debug!(
            service = config.service_name(),
            product = config.product_id(),
            "envelope client initialized"
        );
        Ok(())
    }

    pub fn shutdown(&self) -> Result<()> {
        let mut state = self.state.write();
        match *state {
            ClientState::Initialized { .. } => {}
            ClientState::Uninitialized => return Err(Error::NotInitialized),
            ClientState::Shutdown => return Err(Error::ShutDown),
        }
        self.engine.shutdown();
        *state = ClientState::Shutdown;
        tracing::debug!("envelope client shut down");
        Ok(())
    }

    // ========================================================================
    // Component form
    // ========================================================================

    pub fn encrypt(&self, partition: &str, data: &[u8]) -> Result<DataRowRecord> {
        let state = self.state.read();
        let estimator = state.estimator()?;

        let partition_buf = Buffer::encode_str(partition)?;
        let data_buf = Buffer::encode_bytes(data)?;
        let mut out_data = Buffer::allocate(estimator.encrypted_data(data.len()))?;
        let mut out_key = Buffer::allocate(estimator.encrypted_key())?;
        let mut out_created = Buffer::allocate(estimator.created())?;
        let mut out_parent_key_id = Buffer::allocate(estimator.parent_key_id(partition))?;
        let mut out_parent_key_created = Buffer::allocate(estimator.created())?;
        tracing::debug!(
            data_len = data.len(),
            capacity = out_data.capacity(),
            "encrypt"
        );

        let status = self.engine.encrypt(
            &partition_buf,
            &data_buf,
            &mut out_data,
            &mut out_key,
            &mut out_created,
            &mut out_parent_key_id,
            &mut out_parent_key_created,
        );
        check(status, "encrypt", encryption_error)?;

        Ok(DataRowRecord {
            key: EnvelopeKeyRecord {
                created: out_created.decode_i64()?,
                encrypted_key: out_key.decode_bytes()?,
                parent_key_meta: KeyMeta::new(
                    out_parent_key_id.decode_string()?,
                    out_parent_key_created.decode_i64()?,
                ),
            },
            data: out_data.decode_bytes()?,
        })
    }

    pub fn decrypt(&self, partition: &str, record: &DataRowRecord) -> Result<Vec<u8>> {
        let state = self.state.read();
        let estimator = state.estimator()?;

        let partition_buf = Buffer::encode_str(partition)?;
        let data_buf = Buffer::encode_bytes(&record.data)?;
        let key_buf = Buffer::encode_bytes(&record.key.encrypted_key)?;
        let parent_buf = Buffer::encode_str(&record.key.parent_key_meta.id)?;
        let mut out_data = Buffer::allocate(estimator.decrypt(record.data.len()))?;
        tracing::debug!(
            data_len = record.data.len(),
            capacity = out_data.capacity(),
            "decrypt"
        );

        let status = self.engine.decrypt(
            &partition_buf,
            &data_buf,
            &key_buf,
            record.key.created,
            &parent_buf,
            record.key.parent_key_meta.created,
            &mut out_data,
        );
        check(status, "decrypt", decryption_error)?;
        out_data.decode_bytes()
    }

    // ========================================================================
    // JSON envelope form
    // ========================================================================

    /// Encrypt into a persistable JSON envelope.
    pub fn encrypt_to_json(&self, partition: &str, data: &[u8]) -> Result<String> {
        let state = self.state.read();
        let estimator = state.estimator()?;

        let partition_buf = Buffer::encode_str(partition)?;
        let data_buf = Buffer::encode_bytes(data)?;
        let mut out_json = Buffer::allocate(estimator.json_envelope(partition, data.len()))?;
        tracing::debug!(
            data_len = data.len(),
            capacity = out_json.capacity(),
            "encrypt_to_json"
        );

        let status = self
            .engine
            .encrypt_to_json(&partition_buf, &data_buf, &mut out_json);
        check(status, "encrypt_to_json", encryption_error)?;
        out_json.decode_string()
    }

    pub fn decrypt_from_json(&self, partition: &str, json: &str) -> Result<Vec<u8>> {
        let state = self.state.read();
        let estimator = state.estimator()?;

        let partition_buf = Buffer::encode_str(partition)?;
        let json_buf = Buffer::encode_str(json)?;
        let mut out_data = Buffer::allocate(estimator.decrypt_from_json(json.len()))?;
        tracing::debug!(
            json_len = json.len(),
            capacity = out_data.capacity(),
            "decrypt_from_json"
        );

        let status = self
            .engine
            .decrypt_from_json(&partition_buf, &json_buf, &mut out_data);
        check(status, "decrypt_from_json", decryption_error)?;
        out_data.decode_bytes()
    }

    pub fn encrypt_string(&self, partition: &str, data: &str) -> Result<String> {
        self.encrypt_to_json(partition, data.as_bytes())
    }

    pub fn decrypt_string(&self, partition: &str, json: &str) -> Result<String> {
        let plaintext = self.decrypt_from_json(partition, json)?;
        String::from_utf8(plaintext).map_err(|e| Error::InvalidUtf8(e.to_string()))
    }
}
