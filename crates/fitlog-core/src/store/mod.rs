//! Storage interfaces consumed by the sync engine and integrity checker.
//!
//! The remote store is the canonical source of truth shared across
//! devices; the local cache is a per-device key-value store. Both are
//! object-safe async traits so the engine can be constructed with test
//! doubles.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::{Error, Result};
use crate::models::{Domain, DomainRecord};

mod http;
mod libsql;
mod memory;

pub use http::{HttpRemote, HttpRemoteConfig};
pub use libsql::LibSqlCache;
pub use memory::{MemoryCache, MemoryRemote};

/// Owner-scoped filter for remote collection reads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteFilter {
    /// Restrict to records owned by this user
    pub owner_id: String,
    /// Only records strictly newer than this watermark (Unix ms)
    pub updated_after: Option<i64>,
}

impl RemoteFilter {
    /// Filter on owner only (full collection).
    pub fn for_owner(owner_id: impl Into<String>) -> Self {
        Self {
            owner_id: owner_id.into(),
            updated_after: None,
        }
    }

    /// Restrict to records newer than the given watermark.
    #[must_use]
    pub const fn updated_after(mut self, watermark: i64) -> Self {
        self.updated_after = Some(watermark);
        self
    }
}

/// Canonical remote store.
///
/// Implementations must report transport/server failures as errors,
/// distinct from "no data found" (`None` / empty vec).
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Fetch records matching the filter.
    async fn fetch(&self, table: &str, filter: &RemoteFilter) -> Result<Vec<DomainRecord>>;

    /// Fetch a single record by id, `None` when absent.
    async fn fetch_one(&self, table: &str, id: &str) -> Result<Option<DomainRecord>>;

    /// Insert or update a record, returning the stored representation
    /// (the remote side may assign/normalize fields).
    async fn upsert(&self, table: &str, record: &DomainRecord) -> Result<DomainRecord>;

    /// Delete a record by id. Deleting an absent record is not an error.
    async fn delete(&self, table: &str, id: &str) -> Result<()>;

    /// Replace a JSON array field on the owner's record wholesale.
    async fn update_json_field(
        &self,
        table: &str,
        owner_id: &str,
        field: &str,
        items: &[DomainRecord],
    ) -> Result<()>;
}

/// Per-device durable key-value cache.
#[async_trait]
pub trait LocalCache: Send + Sync {
    /// Read a value, `None` when the key is absent.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Durably write a value.
    async fn set(&self, key: &str, value: &[u8]) -> Result<()>;

    /// Remove a key; removing an absent key is not an error.
    async fn remove(&self, key: &str) -> Result<()>;

    /// List keys starting with the given prefix (empty prefix lists all).
    async fn list_keys(&self, prefix: &str) -> Result<Vec<String>>;
}

/// Parse a JSON-embedded collection into domain records at the remote
/// boundary.
///
/// Embedded entries routinely omit `owner_id` (the owning row implies
/// it); it is injected before boundary validation.
pub fn parse_embedded_array(
    owner_id: &str,
    domain: Domain,
    value: Option<&Value>,
) -> Result<BTreeMap<String, DomainRecord>> {
    let Some(value) = value else {
        return Ok(BTreeMap::new());
    };
    let Value::Array(items) = value else {
        return Err(Error::Corruption(format!(
            "embedded '{domain}' collection is not an array"
        )));
    };

    let mut records = BTreeMap::new();
    for item in items {
        let mut item = item.clone();
        if let Value::Object(fields) = &mut item {
            let missing_owner =
                !matches!(fields.get("owner_id"), Some(Value::String(s)) if !s.is_empty());
            if missing_owner {
                fields.insert("owner_id".to_string(), Value::String(owner_id.to_string()));
            }
        }
        let record = DomainRecord::from_value(item)
            .map_err(|error| Error::Corruption(format!("embedded '{domain}' entry: {error}")))?;
        records.insert(record.id.clone(), record);
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn embedded_array_injects_owner_id() {
        let records = parse_embedded_array(
            "u1",
            Domain::BodyMeasurement,
            Some(&json!([{ "id": "b1", "updated_at": 5 }])),
        )
        .unwrap();
        assert_eq!(records["b1"].owner_id, "u1");
    }

    #[test]
    fn embedded_array_rejects_non_arrays() {
        let err = parse_embedded_array("u1", Domain::BodyMeasurement, Some(&json!({"x": 1})))
            .unwrap_err();
        assert!(matches!(err, Error::Corruption(_)));
    }

    #[test]
    fn absent_field_is_an_empty_collection() {
        let records = parse_embedded_array("u1", Domain::NutritionEntry, None).unwrap();
        assert!(records.is_empty());
    }
}
