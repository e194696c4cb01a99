//! Domain-scoped sync notifications for UI collaborators.

use crate::models::{Domain, SyncResult};
use crate::resolver::Winner;

/// Broadcast by the sync engine as passes complete and conflicts resolve.
#[derive(Debug, Clone)]
pub enum SyncEvent {
    /// A domain pass finished (successfully or not).
    SyncCompleted {
        domain: Domain,
        result: SyncResult,
    },
    /// A two-sided conflict was resolved for one item.
    ConflictResolved {
        domain: Domain,
        item_id: String,
        winner: Winner,
    },
}
