//! Result of one sync pass.

use medwatch_core::types::DbId;
use serde::{Deserialize, Serialize};

/// Counters and errors of a completed sync pass.
///
/// Also persisted verbatim as the `summary` column of the sync run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncSummary {
    pub sync_run_id: DbId,
    pub duration_ms: u64,
    /// Shortage-table entries classified SHORTAGE.
    pub shortage_entries: usize,
    /// Shortage-table entries classified TENSION.
    pub tension_entries: usize,
    pub products_created: u64,
    pub products_updated: u64,
    pub moved_to_available: usize,
    pub moved_to_tension: usize,
    pub moved_to_shortage: usize,
    pub change_events: usize,
    pub notifications_attempted: usize,
    pub notifications_succeeded: usize,
    pub notifications_failed: usize,
    /// Push tokens and email addresses whose delivery failed.
    pub failed_endpoints: Vec<String>,
    /// Entries new since the previous shortage snapshot. `None` without one.
    pub new_shortage_lines: Option<usize>,
    /// Per-item failures, rendered as `"<kind> <item>: <message>"`.
    pub errors: Vec<String>,
}

impl SyncSummary {
    /// Status history records written during the pass.
    pub fn status_changes(&self) -> usize {
        self.moved_to_available + self.moved_to_tension + self.moved_to_shortage
    }
}
