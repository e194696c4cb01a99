//! In-memory store implementations.
//!
//! Used as test doubles throughout the workspace and by embedders that
//! want a throwaway cache. `MemoryRemote` can be told to fail specific
//! operations to exercise error paths.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::Mutex;

use crate::error::{Error, Result};
use crate::models::DomainRecord;

use super::{LocalCache, RemoteFilter, RemoteStore};

/// In-memory `LocalCache`.
#[derive(Default)]
pub struct MemoryCache {
    entries: Mutex<BTreeMap<String, Vec<u8>>>,
    fail_writes: AtomicBool,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent `set` calls fail with a persistence error.
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl LocalCache for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.entries.lock().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &[u8]) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(Error::Persistence("simulated write failure".to_string()));
        }
        self.entries
            .lock()
            .await
            .insert(key.to_string(), value.to_vec());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.entries.lock().await.remove(key);
        Ok(())
    }

    async fn list_keys(&self, prefix: &str) -> Result<Vec<String>> {
        Ok(self
            .entries
            .lock()
            .await
            .keys()
            .filter(|key| key.starts_with(prefix))
            .cloned()
            .collect())
    }
}

/// In-memory `RemoteStore`: tables of records keyed by id.
///
/// JSON array fields live on the owner's record inside the same table,
/// mirroring the remote schema where embedded collections are a column
/// on the profile row.
#[derive(Default)]
pub struct MemoryRemote {
    tables: Mutex<BTreeMap<String, BTreeMap<String, DomainRecord>>>,
    fail_fetch: AtomicBool,
    fail_upsert: AtomicBool,
}

impl MemoryRemote {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent fetches fail with a transient remote error.
    pub fn fail_fetch(&self, fail: bool) {
        self.fail_fetch.store(fail, Ordering::SeqCst);
    }

    /// Make subsequent upserts/json writes fail with a transient remote error.
    pub fn fail_upsert(&self, fail: bool) {
        self.fail_upsert.store(fail, Ordering::SeqCst);
    }

    /// Seed a record directly, bypassing failure flags.
    pub async fn seed(&self, table: &str, record: DomainRecord) {
        self.tables
            .lock()
            .await
            .entry(table.to_string())
            .or_default()
            .insert(record.id.clone(), record);
    }

    /// Snapshot of a table's records, for assertions.
    pub async fn table(&self, table: &str) -> Vec<DomainRecord> {
        self.tables
            .lock()
            .await
            .get(table)
            .map(|records| records.values().cloned().collect())
            .unwrap_or_default()
    }

    fn check_fetch(&self) -> Result<()> {
        if self.fail_fetch.load(Ordering::SeqCst) {
            return Err(Error::Remote("simulated fetch failure".to_string()));
        }
        Ok(())
    }

    fn check_write(&self) -> Result<()> {
        if self.fail_upsert.load(Ordering::SeqCst) {
            return Err(Error::Remote("simulated write failure".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl RemoteStore for MemoryRemote {
    async fn fetch(&self, table: &str, filter: &RemoteFilter) -> Result<Vec<DomainRecord>> {
        self.check_fetch()?;
        let tables = self.tables.lock().await;
        let Some(records) = tables.get(table) else {
            return Ok(Vec::new());
        };
        Ok(records
            .values()
            .filter(|record| record.owner_id == filter.owner_id)
            .filter(|record| {
                filter
                    .updated_after
                    .is_none_or(|watermark| record.updated_at > watermark)
            })
            .cloned()
            .collect())
    }

    async fn fetch_one(&self, table: &str, id: &str) -> Result<Option<DomainRecord>> {
        self.check_fetch()?;
        let tables = self.tables.lock().await;
        Ok(tables.get(table).and_then(|records| records.get(id)).cloned())
    }

    async fn upsert(&self, table: &str, record: &DomainRecord) -> Result<DomainRecord> {
        self.check_write()?;
        self.tables
            .lock()
            .await
            .entry(table.to_string())
            .or_default()
            .insert(record.id.clone(), record.clone());
        Ok(record.clone())
    }

    async fn delete(&self, table: &str, id: &str) -> Result<()> {
        self.check_write()?;
        if let Some(records) = self.tables.lock().await.get_mut(table) {
            records.remove(id);
        }
        Ok(())
    }

    async fn update_json_field(
        &self,
        table: &str,
        owner_id: &str,
        field: &str,
        items: &[DomainRecord],
    ) -> Result<()> {
        self.check_write()?;
        let array = items
            .iter()
            .map(DomainRecord::to_value)
            .collect::<Result<Vec<Value>>>()?;

        let mut tables = self.tables.lock().await;
        let owner = tables
            .get_mut(table)
            .and_then(|records| records.get_mut(owner_id))
            .ok_or_else(|| {
                Error::NotFound(format!("owner record '{owner_id}' in table '{table}'"))
            })?;
        owner
            .fields
            .insert(field.to_string(), Value::Array(array));
        Ok(())
    }
}
