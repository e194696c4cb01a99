//! Synchronization engine: per-domain reconciliation between the local
//! cache and the remote store.
//!
//! One long-lived engine per process, constructed with injected store
//! implementations. A pass over a domain pulls the remote delta, diffs
//! it against the change log, pushes pending local mutations through
//! the conflict resolver, then replaces the local snapshot wholesale
//! and advances the domain watermark. Re-running a pass is the recovery
//! path after any partial failure: already-synced entries are skipped.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;

use crate::changelog::ChangeLogStore;
use crate::error::Result;
use crate::events::SyncEvent;
use crate::metadata::SyncMetadataStore;
use crate::models::{Domain, DomainBacking, DomainRecord, Operation, SyncResult};
use crate::resolver::{resolve_with_policy, Winner};
use crate::snapshot::{load_snapshot, store_snapshot};
use crate::store::{parse_embedded_array, LocalCache, RemoteFilter, RemoteStore};

const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Orchestrates reconciliation for every domain of one installation.
pub struct SyncEngine {
    remote: Arc<dyn RemoteStore>,
    cache: Arc<dyn LocalCache>,
    changelog: ChangeLogStore,
    metadata: SyncMetadataStore,
    events: broadcast::Sender<SyncEvent>,
}

impl SyncEngine {
    /// Build an engine over the given stores.
    pub fn new(remote: Arc<dyn RemoteStore>, cache: Arc<dyn LocalCache>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            remote,
            changelog: ChangeLogStore::new(Arc::clone(&cache)),
            metadata: SyncMetadataStore::new(Arc::clone(&cache)),
            cache,
            events,
        }
    }

    /// Subscribe to sync notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.events.subscribe()
    }

    /// The engine's change log (pending-mutation inspection, compaction).
    pub const fn change_log(&self) -> &ChangeLogStore {
        &self.changelog
    }

    /// The engine's sync metadata store.
    pub const fn metadata(&self) -> &SyncMetadataStore {
        &self.metadata
    }

    /// Apply a local write: update the domain snapshot and record the
    /// mutation in the change log for the next sync pass.
    ///
    /// This is the entry point business logic calls on every local
    /// create/update/delete.
    pub async fn record_local_change(
        &self,
        owner_id: &str,
        domain: Domain,
        record: &DomainRecord,
        operation: Operation,
    ) -> Result<()> {
        let mut snapshot = load_snapshot(&self.cache, owner_id, domain).await?;
        if operation == Operation::Delete {
            snapshot.remove(&record.id);
        } else {
            snapshot.insert(record.id.clone(), record.clone());
        }
        store_snapshot(&self.cache, owner_id, domain, &snapshot).await?;
        self.changelog
            .record_mutation(domain, &record.id, operation)
            .await
    }

    /// Reconcile one domain.
    ///
    /// Returns an aborted result (`success = false`) when the initial
    /// remote fetch fails transiently; the local cache is untouched in
    /// that case. Per-item push or bookkeeping failures do not abort
    /// the pass; the affected entries stay unsynced for the next run.
    pub async fn synchronize(&self, owner_id: &str, domain: Domain) -> Result<SyncResult> {
        let watermark = self.metadata.watermark(domain).await?;
        let policy = self.metadata.conflict_policy().await?;
        let backing = domain.backing();

        // Remote read happens before any local write, so an aborted
        // pass cannot leave a partially overwritten snapshot.
        let remote_items = match self.fetch_remote(owner_id, domain, watermark).await {
            Ok(items) => items,
            Err(error) if error.is_transient() => {
                tracing::warn!("Aborting '{domain}' sync pass: {error}");
                let result = SyncResult::aborted();
                let _ = self.events.send(SyncEvent::SyncCompleted { domain, result });
                return Ok(result);
            }
            Err(error) => return Err(error),
        };

        let mut local = load_snapshot(&self.cache, owner_id, domain).await?;
        let pending = self.changelog.unsynced_entries(domain).await?;

        let ids: BTreeSet<String> = local
            .keys()
            .chain(remote_items.keys())
            .chain(pending.keys())
            .cloned()
            .collect();

        let mut synced_items = 0;
        let mut conflicts = 0;

        // JSON-field-backed pushes accumulate into the working array and
        // flush with a single remote write; their change-log entries are
        // only marked synced once that write succeeds.
        let mut working = remote_items.clone();
        let mut working_dirty = false;
        let mut deferred_marks: Vec<String> = Vec::new();

        for id in &ids {
            let Some(mutation) = pending.get(id) else {
                // Remote is authoritative for locally-unmodified items.
                if let Some(remote_record) = remote_items.get(id) {
                    local.insert(id.clone(), remote_record.clone());
                }
                continue;
            };

            match mutation.operation {
                Operation::Delete => match backing {
                    DomainBacking::Table { table } => {
                        // A missing remote item is already deleted, not an
                        // error; only transport failures leave the entry
                        // pending.
                        if let Err(error) = self.remote.delete(table, id).await {
                            tracing::warn!("Delete of '{id}' in '{domain}' failed: {error}");
                            continue;
                        }
                        local.remove(id);
                        if self.try_mark_synced(domain, id).await {
                            synced_items += 1;
                        }
                    }
                    DomainBacking::JsonField { .. } => {
                        if working.remove(id).is_some() {
                            working_dirty = true;
                        }
                        local.remove(id);
                        deferred_marks.push(id.clone());
                    }
                },
                Operation::Create | Operation::Update => {
                    let local_record = local.get(id).cloned();
                    let remote_record = remote_items.get(id);
                    let two_sided = local_record.is_some() && remote_record.is_some();

                    let resolution =
                        resolve_with_policy(policy, local_record.as_ref(), remote_record);
                    if two_sided {
                        conflicts += 1;
                        let _ = self.events.send(SyncEvent::ConflictResolved {
                            domain,
                            item_id: id.clone(),
                            winner: resolution.source,
                        });
                    }

                    let Some(winning) = resolution.record else {
                        // Stale log entry: the item is gone on both sides.
                        self.try_mark_synced(domain, id).await;
                        continue;
                    };

                    local.insert(id.clone(), winning.clone());

                    match resolution.source {
                        Winner::Remote => {
                            // Adopted the canonical version; nothing to push.
                            if self.try_mark_synced(domain, id).await {
                                synced_items += 1;
                            }
                        }
                        Winner::Local | Winner::Merged => match backing {
                            DomainBacking::Table { table } => {
                                match self.remote.upsert(table, &winning).await {
                                    Ok(stored) => {
                                        // Adopt the remote-assigned representation.
                                        if stored.id != *id {
                                            local.remove(id);
                                        }
                                        local.insert(stored.id.clone(), stored);
                                        if self.try_mark_synced(domain, id).await {
                                            synced_items += 1;
                                        }
                                    }
                                    Err(error) => {
                                        tracing::warn!(
                                            "Push of '{id}' in '{domain}' failed: {error}"
                                        );
                                    }
                                }
                            }
                            DomainBacking::JsonField { .. } => {
                                working.insert(id.clone(), winning);
                                working_dirty = true;
                                deferred_marks.push(id.clone());
                            }
                        },
                    }
                }
            }
        }

        if working_dirty {
            if let DomainBacking::JsonField { table, field } = backing {
                let items: Vec<DomainRecord> = working.values().cloned().collect();
                match self
                    .remote
                    .update_json_field(table, owner_id, field, &items)
                    .await
                {
                    Ok(()) => {
                        for id in &deferred_marks {
                            if self.try_mark_synced(domain, id).await {
                                synced_items += 1;
                            }
                        }
                    }
                    Err(error) => {
                        tracing::warn!(
                            "Array flush for '{domain}' failed, {} entries stay pending: {error}",
                            deferred_marks.len()
                        );
                    }
                }
            }
        } else {
            // Deletes of items the remote never had: nothing to write.
            for id in &deferred_marks {
                if self.try_mark_synced(domain, id).await {
                    synced_items += 1;
                }
            }
        }

        store_snapshot(&self.cache, owner_id, domain, &local).await?;
        self.metadata
            .set_watermark(domain, crate::util::timestamp_now_ms())
            .await?;

        let result = SyncResult::completed(synced_items, conflicts);
        tracing::info!(
            "Synchronized '{domain}' for {owner_id}: {synced_items} item(s), {conflicts} conflict(s)"
        );
        let _ = self.events.send(SyncEvent::SyncCompleted { domain, result });
        Ok(result)
    }

    /// Reconcile every domain, isolating failures per domain.
    pub async fn synchronize_all(&self, owner_id: &str) -> BTreeMap<Domain, SyncResult> {
        let mut results = BTreeMap::new();
        for domain in Domain::ALL {
            let result = match self.synchronize(owner_id, domain).await {
                Ok(result) => result,
                Err(error) => {
                    tracing::warn!("Sync pass for '{domain}' failed: {error}");
                    SyncResult::aborted()
                }
            };
            results.insert(domain, result);
        }
        results
    }

    /// Reconcile one domain with a caller-supplied deadline.
    ///
    /// On timeout the in-flight pass is abandoned; the snapshot replace
    /// is a single write, so abandonment cannot tear the local cache,
    /// and unsynced entries simply wait for the next run.
    pub async fn synchronize_with_timeout(
        &self,
        owner_id: &str,
        domain: Domain,
        timeout: Duration,
    ) -> Result<SyncResult> {
        match tokio::time::timeout(timeout, self.synchronize(owner_id, domain)).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!("Sync pass for '{domain}' timed out after {timeout:?}");
                Ok(SyncResult::aborted())
            }
        }
    }

    /// Record an entry as synced. A cache write failure is item-local:
    /// the entry stays pending for the next pass and the sibling items
    /// in the current pass still proceed.
    async fn try_mark_synced(&self, domain: Domain, item_id: &str) -> bool {
        match self.changelog.mark_synced(domain, item_id).await {
            Ok(()) => true,
            Err(error) => {
                tracing::warn!(
                    "Recording sync of '{item_id}' in '{domain}' failed, entry stays pending: {error}"
                );
                false
            }
        }
    }

    async fn fetch_remote(
        &self,
        owner_id: &str,
        domain: Domain,
        watermark: i64,
    ) -> Result<BTreeMap<String, DomainRecord>> {
        match domain.backing() {
            DomainBacking::Table { table } => {
                let filter = RemoteFilter::for_owner(owner_id).updated_after(watermark);
                let records = self.remote.fetch(table, &filter).await?;
                Ok(records
                    .into_iter()
                    .map(|record| (record.id.clone(), record))
                    .collect())
            }
            DomainBacking::JsonField { table, field } => {
                // No incremental filtering here: the whole array rides on
                // the owner record and is fetched on every pass.
                let Some(owner) = self.remote.fetch_one(table, owner_id).await? else {
                    return Ok(BTreeMap::new());
                };
                parse_embedded_array(owner_id, domain, owner.field(field))
            }
        }
    }
}
