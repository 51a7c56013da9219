//! Setup options as received over the wire.
//!
//! Keys are PascalCase with upper-case acronyms (`KMS`, `ProductID`,
//! `DynamoDBRegion`). Unknown keys are rejected so that a client whose field
//! table drifts fails setup instead of silently losing settings.

use std::collections::BTreeMap;

use serde::Deserialize;

use crate::error::{EngineError, Result};

/// Default key expiry: 90 days.
pub const DEFAULT_EXPIRE_AFTER_SECS: i64 = 90 * 24 * 60 * 60;

/// Default revalidation interval for cached latest keys: 60 minutes.
pub const DEFAULT_CHECK_INTERVAL_SECS: i64 = 60 * 60;

/// Default session cache size.
pub const DEFAULT_SESSION_CACHE_MAX_SIZE: usize = 1000;

/// Default session cache entry lifetime: 2 hours.
pub const DEFAULT_SESSION_CACHE_DURATION_SECS: i64 = 2 * 60 * 60;

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SetupOptions {
    #[serde(rename = "KMS")]
    pub kms: String,
    #[serde(rename = "Metastore")]
    pub metastore: String,
    #[serde(rename = "ServiceName")]
    pub service_name: String,
    #[serde(rename = "ProductID")]
    pub product_id: String,
    #[serde(rename = "ConnectionString", default)]
    pub connection_string: Option<String>,
    #[serde(rename = "DynamoDBEndpoint", default)]
    pub dynamo_db_endpoint: Option<String>,
    #[serde(rename = "DynamoDBRegion", default)]
    pub dynamo_db_region: Option<String>,
    #[serde(rename = "DynamoDBTableName", default)]
    pub dynamo_db_table_name: Option<String>,
    #[serde(rename = "EnableRegionSuffix", default)]
    pub enable_region_suffix: bool,
    #[serde(rename = "PreferredRegion", default)]
    pub preferred_region: Option<String>,
    #[serde(rename = "RegionMap", default)]
    pub region_map: Option<BTreeMap<String, String>>,
    #[serde(rename = "Verbose", default)]
    pub verbose: bool,
    #[serde(rename = "EnableSessionCaching", default)]
    pub enable_session_caching: bool,
    #[serde(rename = "ExpireAfter", default)]
    pub expire_after: Option<i64>,
    #[serde(rename = "CheckInterval", default)]
    pub check_interval: Option<i64>,
    #[serde(rename = "ReplicaReadConsistency", default)]
    pub replica_read_consistency: Option<String>,
    #[serde(rename = "SessionCacheMaxSize", default)]
    pub session_cache_max_size: Option<i64>,
    #[serde(rename = "SessionCacheDuration", default)]
    pub session_cache_duration: Option<i64>,
}

/// Numeric policy derived from the options, with defaults filled in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CryptoPolicy {
    pub expire_after_secs: i64,
    pub check_interval_secs: i64,
    pub session_caching: bool,
    pub session_cache_max_size: usize,
    pub session_cache_duration_secs: i64,
}

impl Default for CryptoPolicy {
    fn default() -> Self {
        Self {
            expire_after_secs: DEFAULT_EXPIRE_AFTER_SECS,
            check_interval_secs: DEFAULT_CHECK_INTERVAL_SECS,
            session_caching: false,
            session_cache_max_size: DEFAULT_SESSION_CACHE_MAX_SIZE,
            session_cache_duration_secs: DEFAULT_SESSION_CACHE_DURATION_SECS,
        }
    }
}

fn positive(name: &str, value: Option<i64>, default: i64) -> Result<i64> {
    match value {
        None => Ok(default),
        Some(v) if v > 0 => Ok(v),
        Some(v) => Err(EngineError::BadConfig(format!(
            "{name} must be positive, got {v}"
        ))),
    }
}

impl SetupOptions {
    /// Parse the JSON payload of a setup buffer.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| EngineError::BadConfig(e.to_string()))
    }

    pub fn policy(&self) -> Result<CryptoPolicy> {
        let max_size = positive(
            "SessionCacheMaxSize",
            self.session_cache_max_size,
            DEFAULT_SESSION_CACHE_MAX_SIZE as i64,
        )?;
        Ok(CryptoPolicy {
            expire_after_secs: positive(
                "ExpireAfter",
                self.expire_after,
                DEFAULT_EXPIRE_AFTER_SECS,
            )?,
            check_interval_secs: positive(
                "CheckInterval",
                self.check_interval,
                DEFAULT_CHECK_INTERVAL_SECS,
            )?,
            session_caching: self.enable_session_caching,
            session_cache_max_size: usize::try_from(max_size)
                .map_err(|e| EngineError::BadConfig(e.to_string()))?,
            session_cache_duration_secs: positive(
                "SessionCacheDuration",
                self.session_cache_duration,
                DEFAULT_SESSION_CACHE_DURATION_SECS,
            )?,
        })
    }

    /// Check the fields this engine needs before any key material is created.
    pub fn validate(&self) -> Result<()> {
        if self.service_name.is_empty() {
            return Err(EngineError::BadConfig("ServiceName is empty".into()));
        }
        if self.product_id.is_empty() {
            return Err(EngineError::BadConfig("ProductID is empty".into()));
        }
        match self.kms.as_str() {
            "static" => {}
            "aws" => {
                return Err(EngineError::Unsupported {
                    kind: "KMS",
                    value: self.kms.clone(),
                })
            }
            other => return Err(EngineError::BadConfig(format!("unknown KMS '{other}'"))),
        }
        match self.metastore.as_str() {
            "memory" => {}
            "rdbms" | "dynamodb" => {
                return Err(EngineError::Unsupported {
                    kind: "Metastore",
                    value: self.metastore.clone(),
                })
            }
            other => {
                return Err(EngineError::BadConfig(format!(
                    "unknown Metastore '{other}'"
                )))
            }
        }
        self.policy().map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn base() -> serde_json::Value {
        json!({
            "KMS": "static",
            "Metastore": "memory",
            "ServiceName": "TestService",
            "ProductID": "TestProduct",
            "ConnectionString": null,
            "DynamoDBEndpoint": null,
            "DynamoDBRegion": null,
            "DynamoDBTableName": null,
            "EnableRegionSuffix": false,
            "PreferredRegion": null,
            "RegionMap": null,
            "Verbose": false,
            "EnableSessionCaching": true,
            "ExpireAfter": null,
            "CheckInterval": null,
            "ReplicaReadConsistency": null,
            "SessionCacheMaxSize": null,
            "SessionCacheDuration": null
        })
    }

    #[test]
    fn parses_full_wire_object() {
        let opts = SetupOptions::from_json(&base().to_string()).unwrap();
        assert_eq!(opts.service_name, "TestService");
        assert_eq!(opts.product_id, "TestProduct");
        assert!(opts.enable_session_caching);
        opts.validate().unwrap();
    }

    #[test]
    fn null_optionals_take_defaults() {
        let opts = SetupOptions::from_json(&base().to_string()).unwrap();
        let policy = opts.policy().unwrap();
        assert_eq!(policy.expire_after_secs, DEFAULT_EXPIRE_AFTER_SECS);
        assert_eq!(policy.session_cache_max_size, DEFAULT_SESSION_CACHE_MAX_SIZE);
        assert!(policy.session_caching);
    }

    #[test]
    fn rejects_unknown_keys() {
        let mut value = base();
        value["ProductId"] = json!("drifted");
        assert!(SetupOptions::from_json(&value.to_string()).is_err());
    }

    #[test]
    fn rejects_missing_required_keys() {
        let mut value = base();
        value.as_object_mut().unwrap().remove("ServiceName");
        assert!(SetupOptions::from_json(&value.to_string()).is_err());
    }

    #[test]
    fn unsupported_backends_are_reported() {
        let mut value = base();
        value["Metastore"] = json!("rdbms");
        value["ConnectionString"] = json!("mysql://localhost/keys");
        let opts = SetupOptions::from_json(&value.to_string()).unwrap();
        assert!(matches!(
            opts.validate(),
            Err(EngineError::Unsupported {
                kind: "Metastore",
                ..
            })
        ));

        let mut value = base();
        value["KMS"] = json!("aws");
        let opts = SetupOptions::from_json(&value.to_string()).unwrap();
        assert!(opts.validate().is_err());
    }

    #[test]
    fn rejects_non_positive_durations() {
        let mut value = base();
        value["ExpireAfter"] = json!(0);
        let opts = SetupOptions::from_json(&value.to_string()).unwrap();
        assert!(opts.validate().is_err());
    }
}
