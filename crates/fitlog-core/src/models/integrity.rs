//! Integrity audit report models.

use serde::{Deserialize, Serialize};

use super::Domain;

/// Classification of a divergence between local cache and remote store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    /// Present remotely, absent locally
    MissingLocal,
    /// Present locally, absent remotely
    MissingRemote,
    /// Both present with differing critical fields
    Mismatch,
    /// A check failed unexpectedly (parse error, unreadable data)
    Corruption,
    /// Record shape incompatible with the domain's expected keys
    SchemaIncompatible,
}

/// A single divergence found by one integrity-check run.
///
/// Produced fresh on every run and never persisted beyond the report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntegrityIssue {
    /// What kind of divergence was found
    pub kind: IssueKind,
    /// Domain the divergence belongs to
    pub domain: Domain,
    /// Affected item, when the divergence is item-scoped
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item_id: Option<String>,
    /// Human-readable description
    pub description: String,
    /// Whether an automatic repair action exists for this issue
    pub auto_repairable: bool,
    /// Whether the repair action completed without error
    pub repaired: bool,
}

impl IntegrityIssue {
    /// A new, not-yet-repaired issue.
    pub fn new(
        kind: IssueKind,
        domain: Domain,
        item_id: Option<String>,
        description: impl Into<String>,
        auto_repairable: bool,
    ) -> Self {
        Self {
            kind,
            domain,
            item_id,
            description: description.into(),
            auto_repairable,
            repaired: false,
        }
    }
}

/// Result of one point-in-time integrity audit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntegrityReport {
    /// True iff no divergence was found at all; repaired issues still
    /// appear in `issues`, so callers must check `repaired` per issue
    pub success: bool,
    /// When the audit ran (Unix ms)
    pub timestamp: i64,
    /// Everything the audit found, repaired or not
    pub issues: Vec<IntegrityIssue>,
    /// Issues whose repair action completed without error
    pub repaired_count: usize,
}

impl IntegrityReport {
    /// Build a report from the issues a run collected.
    ///
    /// `success` and `repaired_count` are derived here so they can
    /// never drift from the issue list.
    pub fn from_issues(issues: Vec<IntegrityIssue>) -> Self {
        let repaired_count = issues.iter().filter(|issue| issue.repaired).count();
        Self {
            success: issues.is_empty(),
            timestamp: crate::util::timestamp_now_ms(),
            issues,
            repaired_count,
        }
    }

    /// Issues that remain unrepaired after the run.
    pub fn outstanding(&self) -> impl Iterator<Item = &IntegrityIssue> {
        self.issues.iter().filter(|issue| !issue.repaired)
    }
}
