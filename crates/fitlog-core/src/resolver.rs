//! Conflict resolution: pure decision logic, no I/O.

use serde_json::Value;

use crate::models::{ConflictPolicy, DomainRecord};

/// Which side a resolution selected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Winner {
    Local,
    Remote,
    Merged,
}

/// Outcome of resolving a local/remote pair.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    /// Side whose record was selected
    pub source: Winner,
    /// The winning record, `None` only when both sides were absent
    pub record: Option<DomainRecord>,
    /// Set under the `Manual` policy: the deterministic tie-break was
    /// applied but the caller asked to review such outcomes
    pub requires_review: bool,
}

impl Resolution {
    const fn of(source: Winner, record: Option<DomainRecord>) -> Self {
        Self {
            source,
            record,
            requires_review: false,
        }
    }
}

/// Resolve a local/remote pair by timestamp.
///
/// Rules, in order: a lone present side wins outright; a strictly newer
/// `updated_at` wins; equal timestamps (including both zero) go to
/// remote. The tie-break is a full-record "remote wins", not a field
/// merge — callers wanting field-level reconciliation use
/// [`merge_fields`] explicitly.
pub fn resolve(local: Option<&DomainRecord>, remote: Option<&DomainRecord>) -> Resolution {
    match (local, remote) {
        (None, None) => Resolution::of(Winner::Remote, None),
        (Some(local), None) => Resolution::of(Winner::Local, Some(local.clone())),
        (None, Some(remote)) => Resolution::of(Winner::Remote, Some(remote.clone())),
        (Some(local), Some(remote)) => {
            if local.updated_at > remote.updated_at {
                Resolution::of(Winner::Local, Some(local.clone()))
            } else {
                Resolution::of(Winner::Remote, Some(remote.clone()))
            }
        }
    }
}

/// Resolve under a configured policy.
///
/// `ServerWins`/`ClientWins` force a present side (falling back to the
/// other when their side is absent); `NewestWins` is [`resolve`];
/// `Manual` applies the same deterministic tie-break but flags the
/// resolution for review when both sides held candidates.
pub fn resolve_with_policy(
    policy: ConflictPolicy,
    local: Option<&DomainRecord>,
    remote: Option<&DomainRecord>,
) -> Resolution {
    match policy {
        ConflictPolicy::NewestWins => resolve(local, remote),
        ConflictPolicy::ServerWins => match remote {
            Some(remote) => Resolution::of(Winner::Remote, Some(remote.clone())),
            None => resolve(local, None),
        },
        ConflictPolicy::ClientWins => match local {
            Some(local) => Resolution::of(Winner::Local, Some(local.clone())),
            None => resolve(None, remote),
        },
        ConflictPolicy::Manual => {
            let mut resolution = resolve(local, remote);
            if local.is_some() && remote.is_some() {
                resolution.requires_review = true;
            }
            resolution
        }
    }
}

/// Field-level merge for domains that request it.
///
/// Copies every field present on `remote` but null/absent on `local`;
/// local non-null values are never overwritten. The merged record keeps
/// the newer of the two timestamps.
pub fn merge_fields(local: &DomainRecord, remote: &DomainRecord) -> DomainRecord {
    let mut merged = local.clone();
    for (name, value) in &remote.fields {
        let local_value = merged.fields.get(name);
        if local_value.is_none() || local_value == Some(&Value::Null) {
            merged.fields.insert(name.clone(), value.clone());
        }
    }
    merged.updated_at = local.updated_at.max(remote.updated_at);
    merged
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    fn record(id: &str, updated_at: i64) -> DomainRecord {
        DomainRecord::new(id, "u1").with_updated_at(updated_at)
    }

    #[test]
    fn lone_present_side_wins() {
        let local = record("w1", 10);
        let resolution = resolve(Some(&local), None);
        assert_eq!(resolution.source, Winner::Local);
        assert_eq!(resolution.record, Some(local));

        let remote = record("w1", 10);
        let resolution = resolve(None, Some(&remote));
        assert_eq!(resolution.source, Winner::Remote);
    }

    #[test]
    fn strictly_newer_side_wins() {
        let local = record("w1", 100);
        let remote = record("w1", 50);
        assert_eq!(resolve(Some(&local), Some(&remote)).source, Winner::Local);
        assert_eq!(resolve(Some(&remote), Some(&local)).source, Winner::Remote);
    }

    #[test]
    fn equal_timestamps_favor_remote_deterministically() {
        let local = record("w1", 100).with_field("calories", json!(200));
        let remote = record("w1", 100).with_field("calories", json!(300));

        for _ in 0..10 {
            let resolution = resolve(Some(&local), Some(&remote));
            assert_eq!(resolution.source, Winner::Remote);
            assert_eq!(resolution.record.as_ref(), Some(&remote));
        }
    }

    #[test]
    fn zero_timestamps_also_favor_remote() {
        let local = record("w1", 0);
        let remote = record("w1", 0);
        assert_eq!(resolve(Some(&local), Some(&remote)).source, Winner::Remote);
    }

    #[test]
    fn server_wins_policy_forces_remote() {
        let local = record("w1", 999);
        let remote = record("w1", 1);
        let resolution = resolve_with_policy(ConflictPolicy::ServerWins, Some(&local), Some(&remote));
        assert_eq!(resolution.source, Winner::Remote);
    }

    #[test]
    fn client_wins_policy_falls_back_when_local_absent() {
        let remote = record("w1", 1);
        let resolution = resolve_with_policy(ConflictPolicy::ClientWins, None, Some(&remote));
        assert_eq!(resolution.source, Winner::Remote);
    }

    #[test]
    fn manual_policy_flags_two_sided_resolutions() {
        let local = record("w1", 100);
        let remote = record("w1", 100);
        let resolution = resolve_with_policy(ConflictPolicy::Manual, Some(&local), Some(&remote));
        assert!(resolution.requires_review);
        assert_eq!(resolution.source, Winner::Remote);

        let one_sided = resolve_with_policy(ConflictPolicy::Manual, Some(&local), None);
        assert!(!one_sided.requires_review);
    }

    #[test]
    fn merge_fields_fills_gaps_without_overwriting() {
        let local = record("p1", 100)
            .with_field("display_name", json!("Sam"))
            .with_field("goal_weight_kg", Value::Null);
        let remote = record("p1", 50)
            .with_field("display_name", json!("Old Name"))
            .with_field("goal_weight_kg", json!(78.0))
            .with_field("height_cm", json!(180));

        let merged = merge_fields(&local, &remote);
        assert_eq!(merged.field("display_name"), Some(&json!("Sam")));
        assert_eq!(merged.field("goal_weight_kg"), Some(&json!(78.0)));
        assert_eq!(merged.field("height_cm"), Some(&json!(180)));
        assert_eq!(merged.updated_at, 100);
    }
}
