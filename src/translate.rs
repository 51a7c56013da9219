//! Config → engine wire JSON.
//!
//! Field names map to PascalCase wire keys with upper-case acronyms:
//! `product_id` → `ProductID`, `dynamo_db_region` → `DynamoDBRegion`,
//! `kms` → `KMS`. Absent optionals are sent as `null`.

use serde_json::{Map, Value};

use crate::config::Config;
use crate::error::{Error, Result};

/// Every [`Config`] field and its wire key.
pub const WIRE_FIELDS: &[(&str, &str)] = &[
    ("kms", "KMS"),
    ("metastore", "Metastore"),
    ("service_name", "ServiceName"),
    ("product_id", "ProductID"),
    ("connection_string", "ConnectionString"),
    ("dynamo_db_endpoint", "DynamoDBEndpoint"),
    ("dynamo_db_region", "DynamoDBRegion"),
    ("dynamo_db_table_name", "DynamoDBTableName"),
    ("enable_region_suffix", "EnableRegionSuffix"),
    ("preferred_region", "PreferredRegion"),
    ("region_map", "RegionMap"),
    ("verbose", "Verbose"),
    ("enable_session_caching", "EnableSessionCaching"),
    ("expire_after", "ExpireAfter"),
    ("check_interval", "CheckInterval"),
    ("replica_read_consistency", "ReplicaReadConsistency"),
    ("session_cache_max_size", "SessionCacheMaxSize"),
    ("session_cache_duration", "SessionCacheDuration"),
];

fn wire_part(part: &str) -> String {
    match part {
        "db" => "DB".to_owned(),
        "id" => "ID".to_owned(),
        "kms" => "KMS".to_owned(),
        _ => {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        }
    }
}

/// Wire key for a snake_case field name. Acronyms match whole parts only.
pub fn wire_key(field: &str) -> String {
    field.split('_').map(wire_part).collect()
}

/// Serialize a validated config into the JSON object the engine expects.
pub fn to_wire_json(config: &Config) -> Result<String> {
    let Value::Object(fields) = serde_json::to_value(config)? else {
        return Err(Error::BufferEncode(
            "configuration did not serialize to an object".into(),
        ));
    };
    let wire: Map<String, Value> = fields
        .into_iter()
        .map(|(field, value)| (wire_key(&field), value))
        .collect();
    Ok(serde_json::to_string(&Value::Object(wire))?)
}
