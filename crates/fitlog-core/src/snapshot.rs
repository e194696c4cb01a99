//! Local domain snapshots: the cached view of one owner's domain.
//!
//! Each snapshot is one cache value (`cache/{owner}/{domain}`) holding
//! the full record set as a JSON array. Snapshots are replaced whole on
//! write, which keeps the cache free of torn partial states: a crashed
//! pass either left the previous snapshot or the new one.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::models::{Domain, DomainRecord};
use crate::store::LocalCache;

/// Cache key for an owner's domain snapshot.
pub fn snapshot_key(owner_id: &str, domain: Domain) -> String {
    format!("cache/{owner_id}/{domain}")
}

/// Load a snapshot as a map keyed by item id (empty when absent).
pub async fn load_snapshot(
    cache: &Arc<dyn LocalCache>,
    owner_id: &str,
    domain: Domain,
) -> Result<BTreeMap<String, DomainRecord>> {
    let Some(bytes) = cache.get(&snapshot_key(owner_id, domain)).await? else {
        return Ok(BTreeMap::new());
    };
    let records: Vec<DomainRecord> = serde_json::from_slice(&bytes).map_err(|error| {
        Error::Corruption(format!("unreadable local snapshot for '{domain}': {error}"))
    })?;
    Ok(records
        .into_iter()
        .map(|record| (record.id.clone(), record))
        .collect())
}

/// Replace a snapshot wholesale.
pub async fn store_snapshot(
    cache: &Arc<dyn LocalCache>,
    owner_id: &str,
    domain: Domain,
    records: &BTreeMap<String, DomainRecord>,
) -> Result<()> {
    let ordered: Vec<&DomainRecord> = records.values().collect();
    let bytes = serde_json::to_vec(&ordered)?;
    cache.set(&snapshot_key(owner_id, domain), &bytes).await
}
