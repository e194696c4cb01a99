//! Mutation tracking and sync bookkeeping models.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Domain;

/// Kind of local mutation recorded in the change log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Create,
    Update,
    Delete,
}

/// Last-known pending mutation for one locally-changed item.
///
/// Only the most recent pending mutation per item is retained; the
/// change log is not an event history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MutationRecord {
    /// Domain the item belongs to
    pub domain: Domain,
    /// Local item identifier
    pub item_id: String,
    /// Pending operation kind
    pub operation: Operation,
    /// When the mutation happened locally (Unix ms)
    pub local_timestamp: i64,
    /// Whether the mutation has been reconciled with the remote store
    pub synced: bool,
    /// When reconciliation succeeded (Unix ms)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub synced_at: Option<i64>,
}

impl MutationRecord {
    /// Record a fresh pending mutation stamped with the current time.
    pub fn pending(domain: Domain, item_id: impl Into<String>, operation: Operation) -> Self {
        Self {
            domain,
            item_id: item_id.into(),
            operation,
            local_timestamp: crate::util::timestamp_now_ms(),
            synced: false,
            synced_at: None,
        }
    }
}

/// How conflicting local/remote versions of the same item are settled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictPolicy {
    /// Remote store always wins
    ServerWins,
    /// Local device always wins
    ClientWins,
    /// Strictly newer `updated_at` wins; ties go to remote
    #[default]
    NewestWins,
    /// Deterministic tie-break applies, but the resolution is flagged
    /// for review by the caller
    Manual,
}

impl ConflictPolicy {
    /// Stable name used in persisted metadata and CLI output.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ServerWins => "server_wins",
            Self::ClientWins => "client_wins",
            Self::NewestWins => "newest_wins",
            Self::Manual => "manual",
        }
    }
}

/// Per-installation sync bookkeeping: watermarks, device identity, policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncMetadata {
    /// Last successful sync watermark per domain (Unix ms), keyed by
    /// `Domain::as_str`
    #[serde(default)]
    pub last_sync: BTreeMap<String, i64>,
    /// Stable per-installation identifier, immutable once generated
    pub device_id: String,
    /// Configured conflict-resolution policy
    #[serde(default)]
    pub conflict_policy: ConflictPolicy,
}

impl SyncMetadata {
    /// Fresh metadata for a new installation.
    pub fn new_installation() -> Self {
        Self {
            last_sync: BTreeMap::new(),
            device_id: Uuid::now_v7().to_string(),
            conflict_policy: ConflictPolicy::default(),
        }
    }

    /// Watermark for a domain; zero when the domain has never synced.
    pub fn watermark(&self, domain: Domain) -> i64 {
        self.last_sync.get(domain.as_str()).copied().unwrap_or(0)
    }

    /// Advance a domain's watermark.
    pub fn set_watermark(&mut self, domain: Domain, timestamp: i64) {
        self.last_sync.insert(domain.as_str().to_string(), timestamp);
    }
}

/// Outcome of one `synchronize` pass over a single domain.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncResult {
    /// False when the pass was aborted (remote fetch failed or timed out)
    pub success: bool,
    /// Pending mutations reconciled during this pass
    pub synced_items: usize,
    /// Items that required conflict resolution (both sides had candidates)
    pub conflicts: usize,
}

impl SyncResult {
    /// A completed pass.
    pub const fn completed(synced_items: usize, conflicts: usize) -> Self {
        Self {
            success: true,
            synced_items,
            conflicts,
        }
    }

    /// An aborted pass; nothing was marked synced past the abort point.
    pub const fn aborted() -> Self {
        Self {
            success: false,
            synced_items: 0,
            conflicts: 0,
        }
    }
}
