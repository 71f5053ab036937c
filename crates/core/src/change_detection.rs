//! Change events and the two strategies used to derive them.
//!
//! - **Stateful**: the status-history rows written during the current pass
//!   are, by construction, the changes. The query lives in the db crate;
//!   this module only orders the resulting events.
//! - **File diff**: two raw snapshots of the shortage file are compared as
//!   sets of lines. An entry is new when its `(product_code, start_date)`
//!   key does not occur in the previous snapshot. Line order is irrelevant.

use std::collections::{BTreeMap, HashSet};

use serde::Serialize;

use crate::availability::MedicationStatus;
use crate::error::CoreError;
use crate::registry::{parse_shortage_line, ShortageEntry};
use crate::types::DbId;

/// Which strategy the orchestrator uses to produce change events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeDetectionStrategy {
    Stateful,
    FileDiff,
}

impl ChangeDetectionStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Stateful => "stateful",
            Self::FileDiff => "file_diff",
        }
    }

    pub fn from_str(s: &str) -> Result<Self, CoreError> {
        match s.trim() {
            "stateful" => Ok(Self::Stateful),
            "file_diff" => Ok(Self::FileDiff),
            other => Err(CoreError::Validation(format!(
                "Unknown change detection strategy '{other}' (expected stateful or file_diff)"
            ))),
        }
    }
}

/// A product whose status changed during a sync pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChangeEvent {
    pub product_id: DbId,
    pub product_code: String,
    pub product_name: String,
    pub new_status: MedicationStatus,
}

/// Sort events for fan-out: shortages, then tensions, then returns to
/// availability; ties broken by name then id so the order is stable.
pub fn order_change_events(events: &mut [ChangeEvent]) {
    events.sort_by(|a, b| {
        a.new_status
            .fanout_rank()
            .cmp(&b.new_status.fanout_rank())
            .then_with(|| a.product_name.cmp(&b.product_name))
            .then_with(|| a.product_id.cmp(&b.product_id))
    });
}

/// Collapse several events for the same product into the latest one.
///
/// `events` must be in chronological order.
pub fn latest_per_product(events: Vec<ChangeEvent>) -> Vec<ChangeEvent> {
    let mut latest: BTreeMap<DbId, ChangeEvent> = BTreeMap::new();
    for event in events {
        latest.insert(event.product_id, event);
    }
    latest.into_values().collect()
}

/// Shortage entries of `current` whose `(code, start_date)` key is absent
/// from `previous`.
///
/// Both inputs are raw shortage-file lines. Malformed lines are ignored on
/// both sides. Each new key is reported once, with the last matching line
/// winning (same rule as the shortage parser).
pub fn new_shortage_entries<S: AsRef<str>>(previous: &[S], current: &[S]) -> Vec<ShortageEntry> {
    let previous_lines: HashSet<&str> = previous.iter().map(|l| l.as_ref()).collect();
    let previous_keys: HashSet<(String, String)> = previous
        .iter()
        .filter_map(|l| parse_shortage_line(l.as_ref()))
        .map(|entry| entry.key())
        .collect();

    let mut fresh: BTreeMap<(String, String), ShortageEntry> = BTreeMap::new();
    for line in current.iter().map(|l| l.as_ref()) {
        if previous_lines.contains(line) {
            continue;
        }
        let Some(entry) = parse_shortage_line(line) else {
            continue;
        };
        let key = entry.key();
        if !previous_keys.contains(&key) {
            fresh.insert(key, entry);
        }
    }
    fresh.into_values().collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn event(id: DbId, name: &str, status: MedicationStatus) -> ChangeEvent {
        ChangeEvent {
            product_id: id,
            product_code: format!("CIS{id:03}"),
            product_name: name.to_string(),
            new_status: status,
        }
    }

    #[test]
    fn ruptures_are_ordered_before_tensions() {
        let mut events = vec![
            event(1, "A", MedicationStatus::Available),
            event(2, "B", MedicationStatus::Tension),
            event(3, "C", MedicationStatus::Shortage),
            event(4, "A", MedicationStatus::Shortage),
        ];
        order_change_events(&mut events);
        let ids: Vec<DbId> = events.iter().map(|e| e.product_id).collect();
        assert_eq!(ids, vec![4, 3, 2, 1]);
    }

    #[test]
    fn latest_per_product_keeps_last_event() {
        let events = vec![
            event(1, "A", MedicationStatus::Tension),
            event(1, "A", MedicationStatus::Shortage),
            event(2, "B", MedicationStatus::Available),
        ];
        let collapsed = latest_per_product(events);
        assert_eq!(collapsed.len(), 2);
        assert_eq!(collapsed[0].new_status, MedicationStatus::Shortage);
    }

    #[test]
    fn file_diff_reports_new_keys_only() {
        let previous = [
            "CIS001\tx\t1\tTension\t01/01/2024",
            "CIS002\tx\t2\tRupture\t05/01/2024",
        ];
        let current = [
            "CIS001\tx\t1\tTension\t01/01/2024",
            "CIS002\tx\t2\tRupture\t05/01/2024",
            "CIS003\tx\t2\tRupture\t10/01/2024",
        ];
        let fresh = new_shortage_entries(&previous, &current);
        assert_eq!(fresh.len(), 1);
        assert_eq!(fresh[0].product_code, "CIS003");
    }

    #[test]
    fn file_diff_ignores_reordering() {
        let previous = [
            "CIS001\tx\t1\tTension\t01/01/2024",
            "CIS002\tx\t2\tRupture\t05/01/2024",
        ];
        let current = [
            "CIS002\tx\t2\tRupture\t05/01/2024",
            "CIS001\tx\t1\tTension\t01/01/2024",
        ];
        assert!(new_shortage_entries(&previous, &current).is_empty());
    }

    #[test]
    fn file_diff_same_key_with_edited_text_is_not_new() {
        let previous = ["CIS001\tx\t1\tTension\t01/01/2024"];
        let current = ["CIS001\tx\t2\tRupture de stock\t01/01/2024"];
        assert!(new_shortage_entries(&previous, &current).is_empty());
    }

    #[test]
    fn file_diff_new_start_date_is_new_episode() {
        let previous = ["CIS001\tx\t1\tTension\t01/01/2024"];
        let current = ["CIS001\tx\t1\tTension\t01/06/2024"];
        let fresh = new_shortage_entries(&previous, &current);
        assert_eq!(fresh.len(), 1);
        assert_eq!(fresh[0].start_date, "01/06/2024");
    }

    #[test]
    fn file_diff_against_empty_previous_reports_everything() {
        let previous: [&str; 0] = [];
        let current = ["CIS001\tx\t1\tTension\t01/01/2024", "garbage"];
        assert_eq!(new_shortage_entries(&previous, &current).len(), 1);
    }

    #[test]
    fn strategy_parses_known_names() {
        assert_eq!(
            ChangeDetectionStrategy::from_str("file_diff").unwrap(),
            ChangeDetectionStrategy::FileDiff
        );
        assert!(ChangeDetectionStrategy::from_str("magic").is_err());
    }
}
