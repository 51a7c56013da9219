//! C ABI over a process-global [`SoftwareEngine`].
//!
//! Every pointer argument is a length-prefixed buffer (see [`crate::buffer`]).
//! Output buffers carry their capacity in the header on entry.

#![allow(non_snake_case)]

use std::ffi::c_void;

use crate::buffer::{input_slice, output_slice};
use crate::engine::SoftwareEngine;
use crate::error::{EngineError, Operation, Result};

static ENGINE: SoftwareEngine = SoftwareEngine::new();

/// The engine behind the exported symbols.
pub fn global() -> &'static SoftwareEngine {
    &ENGINE
}

fn or_status(result: Result<i32>, op: Operation) -> i32 {
    result.unwrap_or_else(|err: EngineError| err.code(op))
}

/// # Safety
/// `config_json` must be null or a valid input buffer.
#[no_mangle]
pub unsafe extern "C" fn SetupJson(config_json: *const c_void) -> i32 {
    or_status(
        input_slice(config_json).map(|config| ENGINE.setup_json(config)),
        Operation::Setup,
    )
}

#[no_mangle]
pub extern "C" fn Shutdown() {
    ENGINE.shutdown();
}

/// # Safety
/// Inputs must be null or valid input buffers; outputs must be null or valid,
/// non-overlapping output buffers.
#[no_mangle]
pub unsafe extern "C" fn Encrypt(
    partition_id: *const c_void,
    data: *const c_void,
    output_encrypted_data: *mut c_void,
    output_encrypted_key: *mut c_void,
    output_created: *mut c_void,
    output_parent_key_id: *mut c_void,
    output_parent_key_created: *mut c_void,
) -> i32 {
    let result = (|| -> Result<i32> {
        Ok(ENGINE.encrypt(
            input_slice(partition_id)?,
            input_slice(data)?,
            output_slice(output_encrypted_data)?,
            output_slice(output_encrypted_key)?,
            output_slice(output_created)?,
            output_slice(output_parent_key_id)?,
            output_slice(output_parent_key_created)?,
        ))
    })();
    or_status(result, Operation::Encrypt)
}

/// # Safety
/// Inputs must be null or valid input buffers; `output_decrypted_data` must be
/// null or a valid output buffer.
#[no_mangle]
pub unsafe extern "C" fn Decrypt(
    partition_id: *const c_void,
    encrypted_data: *const c_void,
    encrypted_key: *const c_void,
    created: i64,
    parent_key_id: *const c_void,
    parent_key_created: i64,
    output_decrypted_data: *mut c_void,
) -> i32 {
    let result = (|| -> Result<i32> {
        Ok(ENGINE.decrypt(
            input_slice(partition_id)?,
            input_slice(encrypted_data)?,
            input_slice(encrypted_key)?,
            created,
            input_slice(parent_key_id)?,
            parent_key_created,
            output_slice(output_decrypted_data)?,
        ))
    })();
    or_status(result, Operation::Decrypt)
}

/// # Safety
/// `partition_id` and `data` must be null or valid input buffers; `json` must
/// be null or a valid output buffer.
#[no_mangle]
pub unsafe extern "C" fn EncryptToJson(
    partition_id: *const c_void,
    data: *const c_void,
    json: *mut c_void,
) -> i32 {
    let result = (|| -> Result<i32> {
        Ok(ENGINE.encrypt_to_json(
            input_slice(partition_id)?,
            input_slice(data)?,
            output_slice(json)?,
        ))
    })();
    or_status(result, Operation::Encrypt)
}

/// # Safety
/// `partition_id` and `json` must be null or valid input buffers; `data` must
/// be null or a valid output buffer.
#[no_mangle]
pub unsafe extern "C" fn DecryptFromJson(
    partition_id: *const c_void,
    json: *const c_void,
    data: *mut c_void,
) -> i32 {
    let result = (|| -> Result<i32> {
        Ok(ENGINE.decrypt_from_json(
            input_slice(partition_id)?,
            input_slice(json)?,
            output_slice(data)?,
        ))
    })();
    or_status(result, Operation::Decrypt)
}
