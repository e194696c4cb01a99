//! Integrity checker: point-in-time audits of local/remote divergence
//! with automatic repair, plus the full-rebuild recovery path.
//!
//! Independent of the sync engine's internals: it consumes only the
//! remote store and local cache interfaces, fetching fresh views for
//! every check. Checks run in a fixed sequence and are isolated from
//! each other; an unexpected failure inside one becomes a single
//! `Corruption` issue rather than aborting the run.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use serde_json::Value;

use crate::changelog::ChangeLogStore;
use crate::error::Result;
use crate::metadata::SyncMetadataStore;
use crate::models::{
    Domain, DomainBacking, DomainRecord, IntegrityIssue, IntegrityReport, IssueKind,
};
use crate::snapshot::{load_snapshot, store_snapshot};
use crate::store::{parse_embedded_array, LocalCache, RemoteFilter, RemoteStore};

/// Outcome of a deep data recovery run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecoveryOutcome {
    /// Whether the closing audit found no outstanding issues
    pub success: bool,
    /// Human-readable summary, including the remaining issue count
    pub message: String,
}

/// Audits and repairs divergence between the local cache and the
/// remote store.
pub struct IntegrityChecker {
    remote: Arc<dyn RemoteStore>,
    cache: Arc<dyn LocalCache>,
    changelog: ChangeLogStore,
    metadata: SyncMetadataStore,
}

impl IntegrityChecker {
    /// Build a checker over the given stores.
    pub fn new(remote: Arc<dyn RemoteStore>, cache: Arc<dyn LocalCache>) -> Self {
        let changelog = ChangeLogStore::new(Arc::clone(&cache));
        let metadata = SyncMetadataStore::new(Arc::clone(&cache));
        Self::with_stores(remote, cache, changelog, metadata)
    }

    /// Build a checker sharing an existing change log and metadata
    /// store (clones share the metadata write lock), so a recovery's
    /// watermark reset cannot race an engine's watermark update.
    pub fn with_stores(
        remote: Arc<dyn RemoteStore>,
        cache: Arc<dyn LocalCache>,
        changelog: ChangeLogStore,
        metadata: SyncMetadataStore,
    ) -> Self {
        Self {
            remote,
            cache,
            changelog,
            metadata,
        }
    }

    /// Run the full audit sequence and return a fresh report.
    ///
    /// Repairs that succeed are flagged `repaired=true` but stay in the
    /// issue list; `success` is only true when nothing diverged at all.
    pub async fn verify_integrity(&self, owner_id: &str) -> IntegrityReport {
        let mut issues = Vec::new();

        collect(
            &mut issues,
            Domain::Profile,
            "onboarding state",
            self.check_onboarding_state(owner_id).await,
        );
        collect(
            &mut issues,
            Domain::Workout,
            "workout completions",
            self.check_table_domain(owner_id, Domain::Workout).await,
        );
        collect(
            &mut issues,
            Domain::Meal,
            "meal completions",
            self.check_table_domain(owner_id, Domain::Meal).await,
        );
        collect(
            &mut issues,
            Domain::Profile,
            "profile record",
            self.check_profile_record(owner_id).await,
        );
        collect(
            &mut issues,
            Domain::BodyMeasurement,
            "body measurements",
            self.check_embedded_collection(owner_id, Domain::BodyMeasurement)
                .await,
        );
        collect(
            &mut issues,
            Domain::NutritionEntry,
            "nutrition entries",
            self.check_embedded_collection(owner_id, Domain::NutritionEntry)
                .await,
        );

        let report = IntegrityReport::from_issues(issues);
        tracing::info!(
            "Integrity audit for {owner_id}: {} issue(s), {} repaired",
            report.issues.len(),
            report.repaired_count
        );
        report
    }

    /// Rebuild the local caches from the remote store wholesale.
    ///
    /// Backs up every cache key to a timestamped slot, resets all sync
    /// watermarks, overwrites each domain's local snapshot with the
    /// full remote view (dropping any unsynced local mutations), then
    /// runs one more audit. Remote is treated as sole source of truth,
    /// so this must only ever be invoked explicitly.
    ///
    /// Failures propagate as errors: once the backup and reset have
    /// begun there is no safe local fallback to paper over.
    pub async fn perform_deep_data_recovery(&self, owner_id: &str) -> Result<RecoveryOutcome> {
        let stamp = crate::util::timestamp_now_ms();
        tracing::warn!("Starting deep data recovery for {owner_id} (backup slot {stamp})");

        // 1. Snapshot the entire cache verbatim. Backup slots are never
        //    overwritten or auto-deleted.
        for key in self.cache.list_keys("").await? {
            if key.starts_with("backup/") {
                continue;
            }
            if let Some(value) = self.cache.get(&key).await? {
                self.cache
                    .set(&format!("backup/{stamp}/{key}"), &value)
                    .await?;
            }
        }

        // 2. Force the next sync pass to treat all remote data as new.
        self.metadata.reset_watermarks().await?;

        // 3. Rebuild every domain from the remote view, dropping
        //    pending local mutations along with their change logs.
        for domain in Domain::ALL {
            let remote_items = self.fetch_full_remote(owner_id, domain).await?;
            store_snapshot(&self.cache, owner_id, domain, &remote_items).await?;
            self.cache.remove(&ChangeLogStore::cache_key(domain)).await?;
        }

        // 4. Audit once more and report what remains.
        let report = self.verify_integrity(owner_id).await;
        let outstanding = report.outstanding().count();
        let message = format!(
            "Deep recovery complete; {} outstanding issue(s) after rebuild ({} repaired during audit)",
            outstanding, report.repaired_count
        );
        tracing::warn!("{message}");
        Ok(RecoveryOutcome {
            success: outstanding == 0,
            message,
        })
    }

    async fn fetch_full_remote(
        &self,
        owner_id: &str,
        domain: Domain,
    ) -> Result<BTreeMap<String, DomainRecord>> {
        match domain.backing() {
            DomainBacking::Table { table } => {
                let records = self
                    .remote
                    .fetch(table, &RemoteFilter::for_owner(owner_id))
                    .await?;
                Ok(records
                    .into_iter()
                    .map(|record| (record.id.clone(), record))
                    .collect())
            }
            DomainBacking::JsonField { table, field } => {
                let Some(owner) = self.remote.fetch_one(table, owner_id).await? else {
                    return Ok(BTreeMap::new());
                };
                parse_embedded_array(owner_id, domain, owner.field(field))
            }
        }
    }

    /// Check: the onboarding flag on the profile agrees between sides.
    async fn check_onboarding_state(&self, owner_id: &str) -> Result<Vec<IntegrityIssue>> {
        let remote = self.remote.fetch_one("profiles", owner_id).await?;
        let mut local = load_snapshot(&self.cache, owner_id, Domain::Profile).await?;

        let mut issues = Vec::new();
        match (local.get(owner_id).cloned(), remote) {
            (None, None) => {}
            (None, Some(remote_profile)) => {
                let mut issue = IntegrityIssue::new(
                    IssueKind::MissingLocal,
                    Domain::Profile,
                    Some(owner_id.to_string()),
                    "remote profile exists but the local cache has none",
                    true,
                );
                local.insert(owner_id.to_string(), remote_profile);
                store_snapshot(&self.cache, owner_id, Domain::Profile, &local).await?;
                issue.repaired = true;
                issues.push(issue);
            }
            (Some(local_profile), None) => {
                let mut issue = IntegrityIssue::new(
                    IssueKind::MissingRemote,
                    Domain::Profile,
                    Some(owner_id.to_string()),
                    "local profile exists but the remote store has none",
                    true,
                );
                match self.remote.upsert("profiles", &local_profile).await {
                    Ok(_) => issue.repaired = true,
                    Err(error) => {
                        tracing::warn!("Profile push repair failed: {error}");
                    }
                }
                issues.push(issue);
            }
            (Some(local_profile), Some(remote_profile)) => {
                let local_flag = onboarding_flag(&local_profile);
                let remote_flag = onboarding_flag(&remote_profile);
                if local_flag != remote_flag {
                    let mut issue = IntegrityIssue::new(
                        IssueKind::Mismatch,
                        Domain::Profile,
                        Some(owner_id.to_string()),
                        format!(
                            "onboarding flag diverged (local={local_flag}, remote={remote_flag})"
                        ),
                        true,
                    );
                    // Newer side wins; ties favor the canonical store.
                    if remote_profile.updated_at >= local_profile.updated_at {
                        local.insert(owner_id.to_string(), remote_profile);
                        store_snapshot(&self.cache, owner_id, Domain::Profile, &local).await?;
                        issue.repaired = true;
                    } else {
                        match self.remote.upsert("profiles", &local_profile).await {
                            Ok(_) => issue.repaired = true,
                            Err(error) => {
                                tracing::warn!("Onboarding repair push failed: {error}");
                            }
                        }
                    }
                    issues.push(issue);
                }
            }
        }
        Ok(issues)
    }

    /// Check: a table-backed domain's full local and remote sets agree.
    async fn check_table_domain(
        &self,
        owner_id: &str,
        domain: Domain,
    ) -> Result<Vec<IntegrityIssue>> {
        let table = domain.backing().table();
        let remote_items = self.fetch_full_remote(owner_id, domain).await?;
        let mut local = load_snapshot(&self.cache, owner_id, domain).await?;
        let pending = self.changelog.unsynced_entries(domain).await?;

        let ids: BTreeSet<String> = local.keys().chain(remote_items.keys()).cloned().collect();
        let mut issues = Vec::new();
        let mut local_dirty = false;

        for id in &ids {
            match (local.get(id).cloned(), remote_items.get(id)) {
                (None, Some(remote_record)) => {
                    let mut issue = IntegrityIssue::new(
                        IssueKind::MissingLocal,
                        domain,
                        Some(id.clone()),
                        format!("remote '{domain}' item '{id}' missing from local cache"),
                        true,
                    );
                    local.insert(id.clone(), remote_record.clone());
                    local_dirty = true;
                    issue.repaired = true;
                    issues.push(issue);
                }
                (Some(local_record), None) => {
                    if pending.contains_key(id) {
                        // A pending mutation already owns this item; the
                        // next sync pass will push it. Repairing here
                        // would race two writers against the remote.
                        issues.push(IntegrityIssue::new(
                            IssueKind::MissingRemote,
                            domain,
                            Some(id.clone()),
                            format!(
                                "local '{domain}' item '{id}' absent remotely; pending mutation left for the next sync pass"
                            ),
                            false,
                        ));
                        continue;
                    }
                    let mut issue = IntegrityIssue::new(
                        IssueKind::MissingRemote,
                        domain,
                        Some(id.clone()),
                        format!("local '{domain}' item '{id}' missing from remote store"),
                        true,
                    );
                    match self.remote.upsert(table, &local_record).await {
                        Ok(_) => issue.repaired = true,
                        Err(error) => {
                            tracing::warn!("Push repair of '{id}' failed: {error}");
                        }
                    }
                    issues.push(issue);
                }
                (Some(local_record), Some(remote_record)) => {
                    if local_record == *remote_record {
                        continue;
                    }
                    let mut issue = IntegrityIssue::new(
                        IssueKind::Mismatch,
                        domain,
                        Some(id.clone()),
                        format!(
                            "'{domain}' item '{id}' differs (local updated_at={}, remote updated_at={})",
                            local_record.updated_at, remote_record.updated_at
                        ),
                        true,
                    );
                    if remote_record.updated_at >= local_record.updated_at {
                        local.insert(id.clone(), remote_record.clone());
                        local_dirty = true;
                        issue.repaired = true;
                    } else {
                        match self.remote.upsert(table, &local_record).await {
                            Ok(_) => issue.repaired = true,
                            Err(error) => {
                                tracing::warn!("Mismatch repair push of '{id}' failed: {error}");
                            }
                        }
                    }
                    issues.push(issue);
                }
                (None, None) => {}
            }
        }

        if local_dirty {
            store_snapshot(&self.cache, owner_id, domain, &local).await?;
        }
        Ok(issues)
    }

    /// Check: the profile record itself agrees between sides.
    async fn check_profile_record(&self, owner_id: &str) -> Result<Vec<IntegrityIssue>> {
        // The profile domain is table-backed with a single owner-keyed
        // row; the generic table check covers it.
        self.check_table_domain(owner_id, Domain::Profile).await
    }

    /// Check: a JSON-embedded collection agrees between sides.
    ///
    /// Local-only entries are never pushed from here: a local-ahead
    /// array means unsynced local writes, and rebuilding the remote
    /// array would race the sync engine. They are flagged and left for
    /// its next pass.
    async fn check_embedded_collection(
        &self,
        owner_id: &str,
        domain: Domain,
    ) -> Result<Vec<IntegrityIssue>> {
        let remote_items = self.fetch_full_remote(owner_id, domain).await?;
        let mut local = load_snapshot(&self.cache, owner_id, domain).await?;

        let ids: BTreeSet<String> = local.keys().chain(remote_items.keys()).cloned().collect();
        let mut issues = Vec::new();
        let mut local_dirty = false;

        for id in &ids {
            match (local.get(id).cloned(), remote_items.get(id)) {
                (None, Some(remote_record)) => {
                    let mut issue = IntegrityIssue::new(
                        IssueKind::MissingLocal,
                        domain,
                        Some(id.clone()),
                        format!("remote '{domain}' entry '{id}' missing from local cache"),
                        true,
                    );
                    local.insert(id.clone(), remote_record.clone());
                    local_dirty = true;
                    issue.repaired = true;
                    issues.push(issue);
                }
                (Some(_), None) => {
                    issues.push(IntegrityIssue::new(
                        IssueKind::MissingRemote,
                        domain,
                        Some(id.clone()),
                        format!(
                            "local '{domain}' entry '{id}' absent from the remote array; left for the next sync pass"
                        ),
                        false,
                    ));
                }
                (Some(local_record), Some(remote_record)) => {
                    if local_record == *remote_record {
                        continue;
                    }
                    let mut issue = IntegrityIssue::new(
                        IssueKind::Mismatch,
                        domain,
                        Some(id.clone()),
                        format!("'{domain}' entry '{id}' differs between local and remote"),
                        true,
                    );
                    if remote_record.updated_at >= local_record.updated_at {
                        local.insert(id.clone(), remote_record.clone());
                        local_dirty = true;
                        issue.repaired = true;
                    } else {
                        // Local is newer but array rewrites belong to the
                        // sync engine; record without repairing.
                        issue.auto_repairable = false;
                    }
                    issues.push(issue);
                }
                (None, None) => {}
            }
        }

        if local_dirty {
            store_snapshot(&self.cache, owner_id, domain, &local).await?;
        }
        Ok(issues)
    }
}

fn onboarding_flag(profile: &DomainRecord) -> bool {
    matches!(profile.field("onboarding_complete"), Some(Value::Bool(true)))
}

/// Fold one check's outcome into the run, converting an unexpected
/// failure into a single non-repairable `Corruption` issue.
fn collect(
    issues: &mut Vec<IntegrityIssue>,
    domain: Domain,
    check_name: &str,
    result: Result<Vec<IntegrityIssue>>,
) {
    match result {
        Ok(found) => issues.extend(found),
        Err(error) => {
            tracing::warn!("Integrity check '{check_name}' failed: {error}");
            issues.push(IntegrityIssue::new(
                IssueKind::Corruption,
                domain,
                None,
                format!("check '{check_name}' failed: {error}"),
                false,
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use crate::engine::SyncEngine;
    use crate::models::Operation;
    use crate::snapshot::snapshot_key;
    use crate::store::{MemoryCache, MemoryRemote};

    use super::*;

    const OWNER: &str = "u1";

    struct Harness {
        checker: IntegrityChecker,
        remote: Arc<MemoryRemote>,
        cache: Arc<MemoryCache>,
    }

    fn harness() -> Harness {
        let remote = Arc::new(MemoryRemote::new());
        let cache = Arc::new(MemoryCache::new());
        let checker = IntegrityChecker::new(
            Arc::clone(&remote) as Arc<dyn RemoteStore>,
            Arc::clone(&cache) as Arc<dyn LocalCache>,
        );
        Harness {
            checker,
            remote,
            cache,
        }
    }

    fn engine(h: &Harness) -> SyncEngine {
        SyncEngine::new(
            Arc::clone(&h.remote) as Arc<dyn RemoteStore>,
            Arc::clone(&h.cache) as Arc<dyn LocalCache>,
        )
    }

    fn record(id: &str, updated_at: i64) -> DomainRecord {
        DomainRecord::new(id, OWNER).with_updated_at(updated_at)
    }

    fn profile(updated_at: i64, onboarded: bool) -> DomainRecord {
        record(OWNER, updated_at).with_field("onboarding_complete", json!(onboarded))
    }

    async fn put_local(h: &Harness, domain: Domain, records: &[DomainRecord]) {
        let cache = Arc::clone(&h.cache) as Arc<dyn LocalCache>;
        let map: BTreeMap<String, DomainRecord> = records
            .iter()
            .map(|r| (r.id.clone(), r.clone()))
            .collect();
        store_snapshot(&cache, OWNER, domain, &map).await.unwrap();
    }

    async fn local(h: &Harness, domain: Domain) -> BTreeMap<String, DomainRecord> {
        let cache = Arc::clone(&h.cache) as Arc<dyn LocalCache>;
        load_snapshot(&cache, OWNER, domain).await.unwrap()
    }

    #[tokio::test]
    async fn clean_state_reports_success() {
        let h = harness();
        h.remote.seed("profiles", profile(1, true)).await;
        put_local(&h, Domain::Profile, &[profile(1, true)]).await;

        let report = h.checker.verify_integrity(OWNER).await;
        assert!(report.success, "unexpected issues: {:?}", report.issues);
    }

    #[tokio::test]
    async fn missing_local_is_repaired_and_not_reported_again() {
        let h = harness();
        h.remote.seed("workout_completions", record("w1", 10)).await;

        let report = h.checker.verify_integrity(OWNER).await;
        let issue = report
            .issues
            .iter()
            .find(|issue| issue.kind == IssueKind::MissingLocal)
            .unwrap();
        assert!(issue.repaired);
        assert_eq!(report.repaired_count, 1);

        // Round trip: the repaired item must not resurface.
        let second = h.checker.verify_integrity(OWNER).await;
        assert!(second.success, "unexpected issues: {:?}", second.issues);
        assert_eq!(local(&h, Domain::Workout).await.len(), 1);
    }

    #[tokio::test]
    async fn missing_remote_without_pending_mutation_is_pushed() {
        let h = harness();
        put_local(&h, Domain::Meal, &[record("m1", 10)]).await;

        let report = h.checker.verify_integrity(OWNER).await;
        let issue = report
            .issues
            .iter()
            .find(|issue| issue.kind == IssueKind::MissingRemote)
            .unwrap();
        assert!(issue.repaired);
        assert_eq!(h.remote.table("meal_completions").await.len(), 1);
    }

    #[tokio::test]
    async fn missing_remote_with_pending_mutation_is_deferred() {
        let h = harness();
        let eng = engine(&h);
        eng.record_local_change(OWNER, Domain::Meal, &record("m1", 10), Operation::Create)
            .await
            .unwrap();

        let report = h.checker.verify_integrity(OWNER).await;
        let issue = report
            .issues
            .iter()
            .find(|issue| issue.kind == IssueKind::MissingRemote)
            .unwrap();
        assert!(!issue.auto_repairable);
        assert!(!issue.repaired);
        // Nothing was pushed behind the engine's back.
        assert!(h.remote.table("meal_completions").await.is_empty());
    }

    #[tokio::test]
    async fn mismatch_repair_prefers_newer_remote() {
        let h = harness();
        h.remote
            .seed(
                "workout_completions",
                record("w1", 100).with_field("calories", json!(300)),
            )
            .await;
        put_local(
            &h,
            Domain::Workout,
            &[record("w1", 50).with_field("calories", json!(250))],
        )
        .await;

        let report = h.checker.verify_integrity(OWNER).await;
        let issue = report
            .issues
            .iter()
            .find(|issue| issue.kind == IssueKind::Mismatch)
            .unwrap();
        assert!(issue.repaired);

        let repaired = local(&h, Domain::Workout).await;
        assert_eq!(repaired["w1"].field("calories"), Some(&json!(300)));
    }

    #[tokio::test]
    async fn mismatch_repair_pushes_newer_local() {
        let h = harness();
        h.remote.seed("workout_completions", record("w1", 50)).await;
        put_local(
            &h,
            Domain::Workout,
            &[record("w1", 100).with_field("calories", json!(999))],
        )
        .await;

        let report = h.checker.verify_integrity(OWNER).await;
        assert_eq!(report.repaired_count, 1);

        let remote = h.remote.table("workout_completions").await;
        assert_eq!(remote[0].updated_at, 100);
    }

    #[tokio::test]
    async fn onboarding_flag_divergence_favors_newer_side() {
        let h = harness();
        h.remote.seed("profiles", profile(100, true)).await;
        put_local(&h, Domain::Profile, &[profile(50, false)]).await;

        let report = h.checker.verify_integrity(OWNER).await;
        let issue = report
            .issues
            .iter()
            .find(|issue| issue.description.contains("onboarding"))
            .unwrap();
        assert!(issue.repaired);

        let repaired = local(&h, Domain::Profile).await;
        assert_eq!(
            repaired[OWNER].field("onboarding_complete"),
            Some(&json!(true))
        );
    }

    #[tokio::test]
    async fn local_ahead_embedded_array_is_flagged_but_deferred() {
        let h = harness();
        h.remote.seed("profiles", profile(1, true)).await;
        put_local(&h, Domain::Profile, &[profile(1, true)]).await;
        put_local(&h, Domain::BodyMeasurement, &[record("b1", 10)]).await;

        let report = h.checker.verify_integrity(OWNER).await;
        let issue = report
            .issues
            .iter()
            .find(|issue| issue.domain == Domain::BodyMeasurement)
            .unwrap();
        assert_eq!(issue.kind, IssueKind::MissingRemote);
        assert!(!issue.auto_repairable);
        assert!(!issue.repaired);

        // The remote array was not rewritten behind the engine's back.
        let remote_profile = h.remote.fetch_one("profiles", OWNER).await.unwrap().unwrap();
        assert_eq!(remote_profile.field("body_measurements"), None);
    }

    #[tokio::test]
    async fn embedded_remote_entries_are_copied_local() {
        let h = harness();
        let remote_profile = profile(1, true).with_field(
            "nutrition_entries",
            json!([{ "id": "n1", "updated_at": 5, "kcal": 120 }]),
        );
        h.remote.seed("profiles", remote_profile.clone()).await;
        put_local(&h, Domain::Profile, &[remote_profile]).await;

        let report = h.checker.verify_integrity(OWNER).await;
        assert_eq!(report.repaired_count, 1);
        assert_eq!(local(&h, Domain::NutritionEntry).await.len(), 1);
    }

    #[tokio::test]
    async fn corrupt_snapshot_becomes_a_corruption_issue_without_blocking_others() {
        let h = harness();
        h.cache
            .set(&snapshot_key(OWNER, Domain::Workout), b"garbage")
            .await
            .unwrap();
        h.remote.seed("meal_completions", record("m1", 10)).await;

        let report = h.checker.verify_integrity(OWNER).await;
        assert!(report
            .issues
            .iter()
            .any(|issue| issue.kind == IssueKind::Corruption && issue.domain == Domain::Workout));
        // The meal check still ran and repaired its gap.
        assert!(report
            .issues
            .iter()
            .any(|issue| issue.domain == Domain::Meal && issue.repaired));
    }

    #[tokio::test]
    async fn deep_recovery_rebuilds_from_remote_and_backs_up_first() {
        let h = harness();
        h.remote.seed("profiles", profile(1, true)).await;
        h.remote.seed("workout_completions", record("w1", 10)).await;

        // Local junk plus an unsynced mutation that will be discarded.
        let eng = engine(&h);
        eng.record_local_change(OWNER, Domain::Workout, &record("junk", 5), Operation::Create)
            .await
            .unwrap();
        eng.metadata()
            .set_watermark(Domain::Workout, 999)
            .await
            .unwrap();

        let outcome = h.checker.perform_deep_data_recovery(OWNER).await.unwrap();
        assert!(outcome.success);

        // Local matches remote; the junk item and its pending entry are gone.
        let workouts = local(&h, Domain::Workout).await;
        assert_eq!(workouts.len(), 1);
        assert!(workouts.contains_key("w1"));
        assert!(h
            .checker
            .changelog
            .unsynced_entries(Domain::Workout)
            .await
            .unwrap()
            .is_empty());

        // Watermarks were reset.
        assert_eq!(
            h.checker.metadata.watermark(Domain::Workout).await.unwrap(),
            0
        );

        // The pre-recovery cache was backed up verbatim.
        let backups = h.cache.list_keys("backup/").await.unwrap();
        assert!(backups
            .iter()
            .any(|key| key.ends_with(&snapshot_key(OWNER, Domain::Workout))));
    }

    #[tokio::test]
    async fn deep_recovery_converges_for_table_domains() {
        let h = harness();
        h.remote.seed("profiles", profile(1, true)).await;
        h.remote.seed("workout_completions", record("w1", 10)).await;
        h.remote.seed("meal_completions", record("m1", 10)).await;
        put_local(&h, Domain::Workout, &[record("stale", 1)]).await;

        h.checker.perform_deep_data_recovery(OWNER).await.unwrap();

        let report = h.checker.verify_integrity(OWNER).await;
        assert!(!report.issues.iter().any(|issue| matches!(
            issue.kind,
            IssueKind::MissingLocal | IssueKind::MissingRemote
        )));
    }

    #[tokio::test]
    async fn checker_built_on_engine_stores_resets_shared_watermarks() {
        let remote = Arc::new(MemoryRemote::new());
        let cache = Arc::new(MemoryCache::new());
        let eng = SyncEngine::new(
            Arc::clone(&remote) as Arc<dyn RemoteStore>,
            Arc::clone(&cache) as Arc<dyn LocalCache>,
        );
        let checker = IntegrityChecker::with_stores(
            Arc::clone(&remote) as Arc<dyn RemoteStore>,
            Arc::clone(&cache) as Arc<dyn LocalCache>,
            eng.change_log().clone(),
            eng.metadata().clone(),
        );

        remote.seed("profiles", profile(1, true)).await;
        eng.metadata()
            .set_watermark(Domain::Workout, 500)
            .await
            .unwrap();

        checker.perform_deep_data_recovery(OWNER).await.unwrap();
        assert_eq!(
            eng.metadata().watermark(Domain::Workout).await.unwrap(),
            0
        );
    }

    #[tokio::test]
    async fn deep_recovery_propagates_remote_failure() {
        let h = harness();
        h.remote.fail_fetch(true);
        let error = h.checker.perform_deep_data_recovery(OWNER).await.unwrap_err();
        assert!(error.is_transient());
    }
}
