//! Engine seam.
//!
//! An [`Engine`] is the native side of the contract: it reads input
//! buffers, writes into output buffers and returns an `i32` status, with
//! negative values meaning failure. [`SoftwareEngine`] runs an engine
//! instance in-process; [`FfiEngine`] goes through the exported C symbols
//! and the process-global engine behind them.

use less_envelope_engine::ffi;
pub use less_envelope_engine::SoftwareEngine;

use crate::buffer::Buffer;

pub trait Engine: Send + Sync {
    fn setup_json(&self, config: &Buffer) -> i32;

    fn shutdown(&self);

    #[allow(clippy::too_many_arguments)]
    fn encrypt(
        &self,
        partition: &Buffer,
        data: &Buffer,
        out_data: &mut Buffer,
        out_key: &mut Buffer,
        out_created: &mut Buffer,
        out_parent_key_id: &mut Buffer,
        out_parent_key_created: &mut Buffer,
    ) -> i32;

    #[allow(clippy::too_many_arguments)]
    fn decrypt(
        &self,
        partition: &Buffer,
        data: &Buffer,
        key: &Buffer,
        created: i64,
        parent_key_id: &Buffer,
        parent_key_created: i64,
        out_data: &mut Buffer,
    ) -> i32;

    fn encrypt_to_json(&self, partition: &Buffer, data: &Buffer, out_json: &mut Buffer) -> i32;

    fn decrypt_from_json(&self, partition: &Buffer, json: &Buffer, out_data: &mut Buffer) -> i32;
}

impl Engine for SoftwareEngine {
    fn setup_json(&self, config: &Buffer) -> i32 {
        SoftwareEngine::setup_json(self, config.as_bytes())
    }

    fn shutdown(&self) {
        SoftwareEngine::shutdown(self)
    }

    fn encrypt(
        &self,
        partition: &Buffer,
        data: &Buffer,
        out_data: &mut Buffer,
        out_key: &mut Buffer,
        out_created: &mut Buffer,
        out_parent_key_id: &mut Buffer,
        out_parent_key_created: &mut Buffer,
    ) -> i32 {
        SoftwareEngine::encrypt(
            self,
            partition.as_bytes(),
            data.as_bytes(),
            out_data.as_mut_bytes(),
            out_key.as_mut_bytes(),
            out_created.as_mut_bytes(),
            out_parent_key_id.as_mut_bytes(),
            out_parent_key_created.as_mut_bytes(),
        )
    }

    fn decrypt(
        &self,
        partition: &Buffer,
        data: &Buffer,
        key: &Buffer,
        created: i64,
        parent_key_id: &Buffer,
        parent_key_created: i64,
        out_data: &mut Buffer,
    ) -> i32 {
        SoftwareEngine::decrypt(
            self,
            partition.as_bytes(),
            data.as_bytes(),
            key.as_bytes(),
            created,
            parent_key_id.as_bytes(),
            parent_key_created,
            out_data.as_mut_bytes(),
        )
    }

    fn encrypt_to_json(&self, partition: &Buffer, data: &Buffer, out_json: &mut Buffer) -> i32 {
        SoftwareEngine::encrypt_to_json(
            self,
            partition.as_bytes(),
            data.as_bytes(),
            out_json.as_mut_bytes(),
        )
    }

    fn decrypt_from_json(&self, partition: &Buffer, json: &Buffer, out_data: &mut Buffer) -> i32 {
        SoftwareEngine::decrypt_from_json(
            self,
            partition.as_bytes(),
            json.as_bytes(),
            out_data.as_mut_bytes(),
        )
    }
}

/// Calls the engine through its C ABI.
///
/// All `FfiEngine` values share one process-global engine, so at most one
/// client per process should own its lifecycle.
#[derive(Debug, Default, Clone, Copy)]
pub struct FfiEngine;

// SAFETY (all methods): every pointer comes from a live `Buffer` whose header
// matches its allocation, inputs are borrowed shared and outputs exclusively,
// and none of them outlive the call.
impl Engine for FfiEngine {
    fn setup_json(&self, config: &Buffer) -> i32 {
        unsafe { ffi::SetupJson(config.as_ptr()) }
    }

    fn shutdown(&self) {
        ffi::Shutdown()
    }

    fn encrypt(
        &self,
        partition: &Buffer,
        data: &Buffer,
        out_data: &mut Buffer,
        out_key: &mut Buffer,
        out_created: &mut Buffer,
        out_parent_key_id: &mut Buffer,
        out_parent_key_created: &mut Buffer,
    ) -> i32 {
        unsafe {
            ffi::Encrypt(
                partition.as_ptr(),
                data.as_ptr(),
                out_data.as_mut_ptr(),
                out_key.as_mut_ptr(),
                out_created.as_mut_ptr(),
                out_parent_key_id.as_mut_ptr(),
                out_parent_key_created.as_mut_ptr(),
            )
        }
    }

    fn decrypt(
        &self,
        partition: &Buffer,
        data: &Buffer,
        key: &Buffer,
        created: i64,
        parent_key_id: &Buffer,
        parent_key_created: i64,
        out_data: &mut Buffer,
    ) -> i32 {
        unsafe {
            ffi::Decrypt(
                partition.as_ptr(),
                data.as_ptr(),
                key.as_ptr(),
                created,
                parent_key_id.as_ptr(),
                parent_key_created,
                out_data.as_mut_ptr(),
            )
        }
    }

    fn encrypt_to_json(&self, partition: &Buffer, data: &Buffer, out_json: &mut Buffer) -> i32 {
        unsafe { ffi::EncryptToJson(partition.as_ptr(), data.as_ptr(), out_json.as_mut_ptr()) }
    }

    fn decrypt_from_json(&self, partition: &Buffer, json: &Buffer, out_data: &mut Buffer) -> i32 {
        unsafe { ffi::DecryptFromJson(partition.as_ptr(), json.as_ptr(), out_data.as_mut_ptr()) }
    }
}
