//! Output sizing for engine calls.
//!
//! The engine writes into host-allocated buffers and cannot grow them, so
//! every output is reserved up front from the input sizes. Estimates are
//! upper bounds: a base floor per output plus [`SAFETY_MARGIN`].

use crate::buffer::INT64_SIZE;

/// Fixed JSON envelope text: field names, punctuation, two timestamps and
/// the encoded data row key.
pub const ENVELOPE_OVERHEAD: usize = 185;

/// Ciphertext growth per AES-GCM blob (IV, tag and framing), rounded up.
pub const ENCRYPTION_OVERHEAD: usize = 48;

/// Data row key size before encryption.
pub const DATA_ROW_KEY_SIZE: usize = 32;

/// Padding added to every variable-size estimate.
pub const SAFETY_MARGIN: usize = 256;

const BASE64_INFLATION_NUM: usize = 134;
const BASE64_INFLATION_DEN: usize = 100;

/// Byte length of `value` once written as a JSON string, without quotes.
fn json_escaped_len(value: &str) -> usize {
    serde_json::to_string(value).map_or(value.len(), |quoted| quoted.len() - 2)
}

fn base64_len(bytes: usize) -> usize {
    bytes
        .saturating_mul(BASE64_INFLATION_NUM)
        .div_ceil(BASE64_INFLATION_DEN)
}

/// Computes output capacities for one service/product pair.
#[derive(Debug, Clone)]
pub struct CapacityEstimator {
    service_len: usize,
    product_len: usize,
    service_escaped: usize,
    product_escaped: usize,
}

impl CapacityEstimator {
    pub fn new(service_name: &str, product_id: &str) -> Self {
        Self {
            service_len: service_name.len(),
            product_len: product_id.len(),
            service_escaped: json_escaped_len(service_name),
            product_escaped: json_escaped_len(product_id),
        }
    }

    /// Capacity for an `encrypt_to_json` envelope over `data_len` bytes.
    pub fn json_envelope(&self, partition: &str, data_len: usize) -> usize {
        ENVELOPE_OVERHEAD
            .saturating_add(self.service_escaped)
            .saturating_add(self.product_escaped)
            .saturating_add(json_escaped_len(partition))
            .saturating_add(base64_len(data_len.saturating_add(ENCRYPTION_OVERHEAD)))
            .saturating_add(SAFETY_MARGIN)
    }

    pub fn encrypted_data(&self, data_len: usize) -> usize {
        data_len
            .saturating_add(ENCRYPTION_OVERHEAD)
            .saturating_add(SAFETY_MARGIN)
    }

    pub fn encrypted_key(&self) -> usize {
        DATA_ROW_KEY_SIZE + ENCRYPTION_OVERHEAD + SAFETY_MARGIN
    }

    /// Capacity for the intermediate key ID `_IK_{partition}_{service}_{product}`.
    pub fn parent_key_id(&self, partition: &str) -> usize {
        "_IK___"
            .len()
            .saturating_add(partition.len())
            .saturating_add(self.service_len)
            .saturating_add(self.product_len)
            .saturating_add(SAFETY_MARGIN)
    }

    pub fn created(&self) -> usize {
        INT64_SIZE
    }

    /// Plaintext never exceeds the envelope that carries it.
    pub fn decrypt_from_json(&self, json_len: usize) -> usize {
        json_len
    }

    /// Plaintext never exceeds its ciphertext.
    pub fn decrypt(&self, ciphertext_len: usize) -> usize {
        ciphertext_len
    }
}
