//! Data models for FitLog's reconciliation core.

mod domain;
mod integrity;
mod record;
mod sync;

pub use domain::{Domain, DomainBacking};
pub use integrity::{IntegrityIssue, IntegrityReport, IssueKind};
pub use record::DomainRecord;
pub use sync::{ConflictPolicy, MutationRecord, Operation, SyncMetadata, SyncResult};
