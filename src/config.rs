//! Client configuration.
//!
//! [`ConfigBuilder`] takes loosely typed input, from code or deserialized
//! from an application's own config file, and [`ConfigBuilder::build`]
//! validates it into an immutable [`Config`]. Nothing invalid reaches the
//! engine.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KmsType {
    Aws,
    Static,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetastoreType {
    Rdbms,
    DynamoDb,
    Memory,
}

/// Read consistency for RDBMS replicas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReadConsistency {
    Eventual,
    Global,
    Session,
}

/// Validated configuration. Field names here are the source of the wire
/// keys (see [`crate::translate`]), so every field is serialized, absent
/// optionals as `null`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Config {
    kms: KmsType,
    metastore: MetastoreType,
    service_name: String,
    product_id: String,
    connection_string: Option<String>,
    dynamo_db_endpoint: Option<String>,
    dynamo_db_region: Option<String>,
    dynamo_db_table_name: Option<String>,
    enable_region_suffix: bool,
    preferred_region: Option<String>,
    region_map: Option<BTreeMap<String, String>>,
    verbose: bool,
    enable_session_caching: bool,
    expire_after: Option<i64>,
    check_interval: Option<i64>,
    replica_read_consistency: Option<ReadConsistency>,
    session_cache_max_size: Option<i64>,
    session_cache_duration: Option<i64>,
}

impl Config {
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    pub fn kms(&self) -> KmsType {
        self.kms
    }

    pub fn metastore(&self) -> MetastoreType {
        self.metastore
    }

    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    pub fn product_id(&self) -> &str {
        &self.product_id
    }

    pub fn connection_string(&self) -> Option<&str> {
        self.connection_string.as_deref()
    }

    pub fn dynamo_db_endpoint(&self) -> Option<&str> {
        self.dynamo_db_endpoint.as_deref()
    }

    pub fn dynamo_db_region(&self) -> Option<&str> {
        self.dynamo_db_region.as_deref()
    }

    pub fn dynamo_db_table_name(&self) -> Option<&str> {
        self.dynamo_db_table_name.as_deref()
    }

    pub fn enable_region_suffix(&self) -> bool {
        self.enable_region_suffix
    }

    pub fn preferred_region(&self) -> Option<&str> {
        self.preferred_region.as_deref()
    }

    pub fn region_map(&self) -> Option<&BTreeMap<String, String>> {
        self.region_map.as_ref()
    }

    pub fn verbose(&self) -> bool {
        self.verbose
    }

    pub fn enable_session_caching(&self) -> bool {
        self.enable_session_caching
    }

    /// Key expiry in seconds; `None` uses the engine default.
    pub fn expire_after(&self) -> Option<i64> {
        self.expire_after
    }

    pub fn check_interval(&self) -> Option<i64> {
        self.check_interval
    }

    pub fn replica_read_consistency(&self) -> Option<ReadConsistency> {
        self.replica_read_consistency
    }

    pub fn session_cache_max_size(&self) -> Option<i64> {
        self.session_cache_max_size
    }

    pub fn session_cache_duration(&self) -> Option<i64> {
        self.session_cache_duration
    }
}

/// Unvalidated configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ConfigBuilder {
    pub kms: Option<KmsType>,
    pub metastore: Option<MetastoreType>,
    pub service_name: Option<String>,
    pub product_id: Option<String>,
    pub connection_string: Option<String>,
    pub dynamo_db_endpoint: Option<String>,
    pub dynamo_db_region: Option<String>,
    pub dynamo_db_table_name: Option<String>,
    pub enable_region_suffix: Option<bool>,
    pub preferred_region: Option<String>,
    pub region_map: Option<BTreeMap<String, String>>,
    pub verbose: Option<bool>,
    pub enable_session_caching: Option<bool>,
    pub expire_after: Option<i64>,
    pub check_interval: Option<i64>,
    pub replica_read_consistency: Option<ReadConsistency>,
    pub session_cache_max_size: Option<i64>,
    pub session_cache_duration: Option<i64>,
}

fn invalid(message: impl Into<String>) -> Error {
    Error::ConfigValidation(message.into())
}

fn non_empty(name: &str, value: Option<String>) -> Result<String> {
    match value {
        Some(v) if !v.is_empty() => Ok(v),
        Some(_) => Err(invalid(format!("{name} must not be empty"))),
        None => Err(invalid(format!("{name} is required"))),
    }
}

fn positive(name: &str, value: Option<i64>) -> Result<Option<i64>> {
    match value {
        Some(v) if v <= 0 => Err(invalid(format!("{name} must be positive, got {v}"))),
        other => Ok(other),
    }
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse builder fields from JSON using the snake_case field names.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| invalid(e.to_string()))
    }

    pub fn kms(mut self, kms: KmsType) -> Self {
        self.kms = Some(kms);
        self
    }

    pub fn metastore(mut self, metastore: MetastoreType) -> Self {
        self.metastore = Some(metastore);
        self
    }

    pub fn service_name(mut self, name: impl Into<String>) -> Self {
        self.service_name = Some(name.into());
        self
    }

    pub fn product_id(mut self, id: impl Into<String>) -> Self {
        self.product_id = Some(id.into());
        self
    }

    pub fn connection_string(mut self, dsn: impl Into<String>) -> Self {
        self.connection_string = Some(dsn.into());
        self
    }

    pub fn dynamo_db_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.dynamo_db_endpoint = Some(endpoint.into());
        self
    }

    pub fn dynamo_db_region(mut self, region: impl Into<String>) -> Self {
        self.dynamo_db_region = Some(region.into());
        self
    }

    pub fn dynamo_db_table_name(mut self, table: impl Into<String>) -> Self {
        self.dynamo_db_table_name = Some(table.into());
        self
    }

    pub fn enable_region_suffix(mut self, enable: bool) -> Self {
        self.enable_region_suffix = Some(enable);
        self
    }

    pub fn preferred_region(mut self, region: impl Into<String>) -> Self {
        self.preferred_region = Some(region.into());
        self
    }

    /// Add one region → KMS key ARN entry.
    pub fn region(mut self, region: impl Into<String>, arn: impl Into<String>) -> Self {
        self.region_map
            .get_or_insert_with(BTreeMap::new)
            .insert(region.into(), arn.into());
        self
    }

    pub fn region_map(mut self, map: BTreeMap<String, String>) -> Self {
        self.region_map = Some(map);
        self
    }

    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = Some(verbose);
        self
    }

    pub fn enable_session_caching(mut self, enable: bool) -> Self {
        self.enable_session_caching = Some(enable);
        self
    }

    pub fn expire_after(mut self, secs: i64) -> Self {
        self.expire_after = Some(secs);
        self
    }

    pub fn check_interval(mut self, secs: i64) -> Self {
        self.check_interval = Some(secs);
        self
    }

    pub fn replica_read_consistency(mut self, consistency: ReadConsistency) -> Self {
        self.replica_read_consistency = Some(consistency);
        self
    }

    pub fn session_cache_max_size(mut self, size: i64) -> Self {
        self.session_cache_max_size = Some(size);
        self
    }

    pub fn session_cache_duration(mut self, secs: i64) -> Self {
        self.session_cache_duration = Some(secs);
        self
    }

    pub fn build(self) -> Result<Config> {
        let kms = self.kms.ok_or_else(|| invalid("kms is required"))?;
        let metastore = self.metastore.ok_or_else(|| invalid("metastore is required"))?;
        let service_name = non_empty("service_name", self.service_name)?;
        let product_id = non_empty("product_id", self.product_id)?;

        if kms == KmsType::Aws {
            let preferred = self
                .preferred_region
                .as_deref()
                .filter(|r| !r.is_empty())
                .ok_or_else(|| invalid("kms=aws requires preferred_region"))?;
            let map = self
                .region_map
                .as_ref()
                .filter(|m| !m.is_empty())
                .ok_or_else(|| invalid("kms=aws requires a non-empty region_map"))?;
            if !map.contains_key(preferred) {
                return Err(invalid(format!(
                    "region_map has no entry for preferred_region '{preferred}'"
                )));
            }
        }

        match metastore {
            MetastoreType::Rdbms => {
                non_empty("connection_string", self.connection_string.clone())
                    .map_err(|_| invalid("metastore=rdbms requires connection_string"))?;
            }
            _ if self.replica_read_consistency.is_some() => {
                return Err(invalid(
                    "replica_read_consistency is only valid with metastore=rdbms",
                ));
            }
            _ => {}
        }

        if metastore != MetastoreType::DynamoDb {
            let dynamo_fields = [
                ("dynamo_db_endpoint", self.dynamo_db_endpoint.is_some()),
                ("dynamo_db_region", self.dynamo_db_region.is_some()),
                ("dynamo_db_table_name", self.dynamo_db_table_name.is_some()),
                ("enable_region_suffix", self.enable_region_suffix == Some(true)),
            ];
            if let Some((name, _)) = dynamo_fields.iter().find(|(_, set)| *set) {
                return Err(invalid(format!(
                    "{name} is only valid with metastore=dynamodb"
                )));
            }
        }

        Ok(Config {
            kms,
            metastore,
            service_name,
            product_id,
            connection_string: self.connection_string,
            dynamo_db_endpoint: self.dynamo_db_endpoint,
            dynamo_db_region: self.dynamo_db_region,
            dynamo_db_table_name: self.dynamo_db_table_name,
            enable_region_suffix: self.enable_region_suffix.unwrap_or(false),
            preferred_region: self.preferred_region,
            region_map: self.region_map,
            verbose: self.verbose.unwrap_or(false),
            enable_session_caching: self.enable_session_caching.unwrap_or(false),
            expire_after: positive("expire_after", self.expire_after)?,
            check_interval: positive("check_interval", self.check_interval)?,
            replica_read_consistency: self.replica_read_consistency,
            session_cache_max_size: positive("session_cache_max_size", self.session_cache_max_size)?,
            session_cache_duration: positive("session_cache_duration", self.session_cache_duration)?,
        })
    }
}
