//! Key and data records in their persisted JSON form.
//!
//! `{"Key":{"Created":..,"Key":"<b64>","ParentKeyMeta":{"KeyId":..,"Created":..}},"Data":"<b64>"}`

use serde::{Deserialize, Serialize};

/// Identifies one version of a key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct KeyMeta {
    #[serde(rename = "KeyId")]
    pub id: String,
    #[serde(rename = "Created")]
    pub created: i64,
}

impl KeyMeta {
    pub fn new(id: impl Into<String>, created: i64) -> Self {
        Self {
            id: id.into(),
            created,
        }
    }
}

/// A key encrypted under its parent. System keys have no parent; the KMS
/// protects them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvelopeKeyRecord {
    #[serde(rename = "Revoked", default, skip_serializing_if = "Option::is_none")]
    pub revoked: Option<bool>,
    #[serde(rename = "Created")]
    pub created: i64,
    #[serde(rename = "Key", with = "base64_bytes")]
    pub encrypted_key: Vec<u8>,
    #[serde(
        rename = "ParentKeyMeta",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub parent_key_meta: Option<KeyMeta>,
}

impl EnvelopeKeyRecord {
    pub fn is_revoked(&self) -> bool {
        self.revoked.unwrap_or(false)
    }
}

/// Encrypted payload plus the encrypted data row key that unlocks it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataRowRecord {
    #[serde(rename = "Key")]
    pub key: EnvelopeKeyRecord,
    #[serde(rename = "Data", with = "base64_bytes")]
    pub data: Vec<u8>,
}

mod base64_bytes {
    use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&BASE64.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        BASE64.decode(encoded).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> DataRowRecord {
        DataRowRecord {
            key: EnvelopeKeyRecord {
                revoked: None,
                created: 1_700_000_123,
                encrypted_key: vec![1, 2, 3],
                parent_key_meta: Some(KeyMeta::new("_IK_p_s_pr", 1_700_000_000)),
            },
            data: vec![9, 8, 7],
        }
    }

    #[test]
    fn serializes_with_wire_names() {
        let json = serde_json::to_value(sample()).unwrap();
        assert_eq!(json["Key"]["Created"], 1_700_000_123);
        assert_eq!(json["Key"]["Key"], "AQID");
        assert_eq!(json["Key"]["ParentKeyMeta"]["KeyId"], "_IK_p_s_pr");
        assert_eq!(json["Data"], "CQgH");
        assert!(json["Key"].get("Revoked").is_none());
    }

    #[test]
    fn parses_record_without_parent() {
        let ekr: EnvelopeKeyRecord =
            serde_json::from_str(r#"{"Created":5,"Key":"AA=="}"#).unwrap();
        assert!(ekr.parent_key_meta.is_none());
        assert!(!ekr.is_revoked());
        assert_eq!(ekr.encrypted_key, vec![0]);
    }

    #[test]
    fn rejects_invalid_base64() {
        let err = serde_json::from_str::<DataRowRecord>(
            r#"{"Key":{"Created":1,"Key":"!!!"},"Data":"AA=="}"#,
        );
        assert!(err.is_err());
    }
}
