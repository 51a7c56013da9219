//! Typed data row records.
//!
//! JSON form, shared with the engine:
//! `{"Key":{"Created":..,"Key":"<b64>","ParentKeyMeta":{"KeyId":..,"Created":..}},"Data":"<b64>"}`

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Identifies the intermediate key version that wraps a data row key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct KeyMeta {
    #[serde(rename = "KeyId")]
    pub id: String,
    /// Unix seconds.
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

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.created, 0)
    }
}

/// Data row key encrypted under its intermediate key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvelopeKeyRecord {
    #[serde(rename = "Created")]
    pub created: i64,
    #[serde(rename = "Key", with = "base64_bytes")]
    pub encrypted_key: Vec<u8>,
    #[serde(rename = "ParentKeyMeta")]
    pub parent_key_meta: KeyMeta,
}

impl EnvelopeKeyRecord {
    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.created, 0)
    }
}

/// Self-contained, opaque result of an encrypt. Safe to persist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataRowRecord {
    #[serde(rename = "Key")]
    pub key: EnvelopeKeyRecord,
    #[serde(rename = "Data", with = "base64_bytes")]
    pub data: Vec<u8>,
}

impl DataRowRecord {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parse a JSON envelope. Missing fields, including `ParentKeyMeta`, and
    /// invalid base64 are reported as [`Error::MalformedRecord`].
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| Error::MalformedRecord(e.to_string()))
    }
}

mod base64_bytes {
    use base64::{engine::general_purpose::STANDARD, Engine};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let text = String::deserialize(deserializer)?;
        STANDARD.decode(text).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ENVELOPE: &str = r#"{"Key":{"Created":1700000123,"Key":"AQID","ParentKeyMeta":{"KeyId":"_IK_p_s_pr","Created":1700000000}},"Data":"CQgH"}"#;

    #[test]
    fn parses_envelope() {
        let record = DataRowRecord::from_json(ENVELOPE).unwrap();
        assert_eq!(record.data, vec![9, 8, 7]);
        assert_eq!(record.key.encrypted_key, vec![1, 2, 3]);
        assert_eq!(record.key.parent_key_meta, KeyMeta::new("_IK_p_s_pr", 1_700_000_000));
    }

    #[test]
    fn to_json_uses_wire_names() {
        let record = DataRowRecord::from_json(ENVELOPE).unwrap();
        let value: serde_json::Value = serde_json::from_str(&record.to_json().unwrap()).unwrap();
        let expected: serde_json::Value = serde_json::from_str(ENVELOPE).unwrap();
        assert_eq!(value, expected);
    }

    #[test]
    fn engine_only_fields_are_ignored() {
        let json = r#"{"Key":{"Revoked":false,"Created":1,"Key":"AA==","ParentKeyMeta":{"KeyId":"k","Created":1}},"Data":""}"#;
        let record = DataRowRecord::from_json(json).unwrap();
        assert!(record.data.is_empty());
    }

    #[test]
    fn missing_parent_is_malformed() {
        let err = DataRowRecord::from_json(r#"{"Key":{"Created":1,"Key":"AA=="},"Data":"AA=="}"#)
            .unwrap_err();
        assert!(matches!(err, Error::MalformedRecord(ref m) if m.contains("ParentKeyMeta")));
    }

    #[test]
    fn bad_base64_is_malformed() {
        let err = DataRowRecord::from_json(
            r#"{"Key":{"Created":1,"Key":"***","ParentKeyMeta":{"KeyId":"k","Created":1}},"Data":"AA=="}"#,
        )
        .unwrap_err();
        assert!(matches!(err, Error::MalformedRecord(_)));
    }

    #[test]
    fn created_at_converts_seconds() {
        let meta = KeyMeta::new("k", 1_700_000_000);
        assert_eq!(meta.created_at().unwrap().timestamp(), 1_700_000_000);
        assert!(KeyMeta::new("k", i64::MAX).created_at().is_none());
    }
}
