//! Checklist completion is never stored; it is derived from the checklist's items
//! whenever a checklist is rendered.

use chrono::{DateTime, Utc};

use super::item::Item;

/// A checklist is complete when none of its items is incomplete, so a checklist
/// without items counts as complete.
pub fn is_completed(items: &[Item]) -> bool {
    items.iter().all(|item| item.is_completed)
}

/// Latest item completion time, present only once the whole checklist is complete.
pub fn completed_at(items: &[Item]) -> Option<DateTime<Utc>> {
    if !is_completed(items) {
        return None;
    }
    items.iter().filter_map(|item| item.completed_at).max()
}
