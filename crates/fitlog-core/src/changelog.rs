//! Change log store: pending local mutations awaiting reconciliation.
//!
//! One JSON map per domain under `changelog/{domain}`, item id to
//! [`MutationRecord`]. Last-write-wins at the log level: only the most
//! recent pending mutation per item is retained.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::models::{Domain, MutationRecord, Operation};
use crate::store::LocalCache;

/// Durable mutation log over the local cache.
#[derive(Clone)]
pub struct ChangeLogStore {
    cache: Arc<dyn LocalCache>,
}

impl ChangeLogStore {
    pub fn new(cache: Arc<dyn LocalCache>) -> Self {
        Self { cache }
    }

    fn key(domain: Domain) -> String {
        format!("changelog/{domain}")
    }

    /// Cache key for a domain's log; used by deep recovery to clear logs.
    pub(crate) fn cache_key(domain: Domain) -> String {
        Self::key(domain)
    }

    async fn load(&self, domain: Domain) -> Result<BTreeMap<String, MutationRecord>> {
        let Some(bytes) = self.cache.get(&Self::key(domain)).await? else {
            return Ok(BTreeMap::new());
        };
        serde_json::from_slice(&bytes).map_err(|error| {
            Error::Corruption(format!("unreadable change log for '{domain}': {error}"))
        })
    }

    async fn save(&self, domain: Domain, log: &BTreeMap<String, MutationRecord>) -> Result<()> {
        let bytes = serde_json::to_vec(log)?;
        self.cache.set(&Self::key(domain), &bytes).await
    }

    /// Record a local mutation, overwriting any prior pending entry for
    /// the same item with the latest operation and a fresh timestamp.
    ///
    /// A `Delete` over a still-unsynced `Create` removes the entry
    /// outright: the item never reached the remote store, so there is
    /// nothing left to reconcile.
    pub async fn record_mutation(
        &self,
        domain: Domain,
        item_id: &str,
        operation: Operation,
    ) -> Result<()> {
        let mut log = self.load(domain).await?;

        if operation == Operation::Delete {
            if let Some(prior) = log.get(item_id) {
                if !prior.synced && prior.operation == Operation::Create {
                    log.remove(item_id);
                    return self.save(domain, &log).await;
                }
            }
        }

        log.insert(
            item_id.to_string(),
            MutationRecord::pending(domain, item_id, operation),
        );
        self.save(domain, &log).await
    }

    /// Pending entries for a domain (`synced == false` only).
    pub async fn unsynced_entries(&self, domain: Domain) -> Result<BTreeMap<String, MutationRecord>> {
        let log = self.load(domain).await?;
        Ok(log
            .into_iter()
            .filter(|(_, record)| !record.synced)
            .collect())
    }

    /// Mark an item's pending mutation as reconciled.
    ///
    /// No-op when the entry is absent (already compacted). The synced
    /// flag is only durable once the underlying write succeeds; a write
    /// failure surfaces as an error and leaves the entry pending.
    pub async fn mark_synced(&self, domain: Domain, item_id: &str) -> Result<()> {
        let mut log = self.load(domain).await?;
        let Some(record) = log.get_mut(item_id) else {
            return Ok(());
        };
        record.synced = true;
        record.synced_at = Some(crate::util::timestamp_now_ms());
        self.save(domain, &log).await
    }

    /// Drop synced entries whose sync happened before the age horizon.
    pub async fn compact(&self, domain: Domain, max_age_ms: i64) -> Result<usize> {
        let horizon = crate::util::timestamp_now_ms() - max_age_ms;
        let mut log = self.load(domain).await?;
        let before = log.len();
        log.retain(|_, record| {
            !record.synced || record.synced_at.is_none_or(|at| at >= horizon)
        });
        let dropped = before - log.len();
        if dropped > 0 {
            self.save(domain, &log).await?;
            tracing::debug!("Compacted {dropped} synced change-log entries for '{domain}'");
        }
        Ok(dropped)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use crate::store::MemoryCache;

    use super::*;

    fn store() -> ChangeLogStore {
        ChangeLogStore::new(Arc::new(MemoryCache::new()))
    }

    #[tokio::test]
    async fn record_mutation_is_last_write_wins() {
        let log = store();
        log.record_mutation(Domain::Workout, "w1", Operation::Create)
            .await
            .unwrap();
        log.record_mutation(Domain::Workout, "w1", Operation::Update)
            .await
            .unwrap();

        let pending = log.unsynced_entries(Domain::Workout).await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending["w1"].operation, Operation::Update);
    }

    #[tokio::test]
    async fn delete_over_unsynced_create_drops_the_entry() {
        let log = store();
        log.record_mutation(Domain::Meal, "m1", Operation::Create)
            .await
            .unwrap();
        log.record_mutation(Domain::Meal, "m1", Operation::Delete)
            .await
            .unwrap();

        let pending = log.unsynced_entries(Domain::Meal).await.unwrap();
        assert!(pending.is_empty());
    }

    #[tokio::test]
    async fn delete_over_synced_create_stays_pending() {
        let log = store();
        log.record_mutation(Domain::Meal, "m1", Operation::Create)
            .await
            .unwrap();
        log.mark_synced(Domain::Meal, "m1").await.unwrap();
        log.record_mutation(Domain::Meal, "m1", Operation::Delete)
            .await
            .unwrap();

        let pending = log.unsynced_entries(Domain::Meal).await.unwrap();
        assert_eq!(pending["m1"].operation, Operation::Delete);
    }

    #[tokio::test]
    async fn mark_synced_stamps_timestamp_and_filters_entry() {
        let log = store();
        log.record_mutation(Domain::Workout, "w1", Operation::Update)
            .await
            .unwrap();
        log.mark_synced(Domain::Workout, "w1").await.unwrap();

        let pending = log.unsynced_entries(Domain::Workout).await.unwrap();
        assert!(pending.is_empty());
    }

    #[tokio::test]
    async fn mark_synced_is_noop_for_absent_entries() {
        let log = store();
        log.mark_synced(Domain::Workout, "ghost").await.unwrap();
    }

    #[tokio::test]
    async fn domains_are_isolated() {
        let log = store();
        log.record_mutation(Domain::Workout, "x", Operation::Create)
            .await
            .unwrap();

        assert!(log.unsynced_entries(Domain::Meal).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn compact_drops_only_old_synced_entries() {
        let log = store();
        log.record_mutation(Domain::Workout, "old", Operation::Update)
            .await
            .unwrap();
        log.record_mutation(Domain::Workout, "pending", Operation::Update)
            .await
            .unwrap();
        log.mark_synced(Domain::Workout, "old").await.unwrap();

        // Horizon in the future relative to the synced_at stamp.
        let dropped = log.compact(Domain::Workout, -1).await.unwrap();
        assert_eq!(dropped, 1);

        let pending = log.unsynced_entries(Domain::Workout).await.unwrap();
        assert!(pending.contains_key("pending"));
    }
}
