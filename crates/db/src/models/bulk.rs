//! Batch mutations over items that answer with one outcome per input entry, in input
//! order, instead of failing the whole request on the first bad entry.

use chrono::{DateTime, Utc};
use sea_orm::ConnectionTrait;
use serde::Serialize;
use strum_macros::{Display, EnumString};
use ts_rs::TS;

use super::item::{Item, ItemError, UpdateItem};
use crate::DbErr;

/// Per-entry result of a batch, rendered as its HTTP status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryStatus {
    Ok,
    Forbidden,
    NotFound,
    Failed,
}

impl EntryStatus {
    pub fn code(self) -> u16 {
        match self {
            EntryStatus::Ok => 200,
            EntryStatus::Forbidden => 403,
            EntryStatus::NotFound => 404,
            EntryStatus::Failed => 500,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, TS, EnumString, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum CompletionAction {
    Complete,
    Incomplete,
}

impl CompletionAction {
    fn completed(self) -> bool {
        matches!(self, CompletionAction::Complete)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompletionOutcome {
    pub item_id: i64,
    /// The updated item, absent when the entry missed.
    pub item: Option<Item>,
    pub action: CompletionAction,
    pub status: EntryStatus,
}

/// Completes or un-completes every listed item. Missing items are reported per entry and
/// do not stop the batch. Any storage failure aborts the batch; callers run this inside a
/// transaction so the batch is all-or-nothing.
pub async fn apply_completion<C: ConnectionTrait>(
    db: &C,
    item_ids: &[i64],
    action: CompletionAction,
    actor: i64,
    now: DateTime<Utc>,
) -> Result<Vec<CompletionOutcome>, DbErr> {
    let mut outcomes = Vec::with_capacity(item_ids.len());
    for &item_id in item_ids {
        let item = Item::set_completion(db, item_id, action.completed(), actor, now).await?;
        let status = if item.is_some() {
            EntryStatus::Ok
        } else {
            EntryStatus::NotFound
        };
        outcomes.push(CompletionOutcome {
            item_id,
            item,
            action,
            status,
        });
    }

    let missed = outcomes
        .iter()
        .filter(|outcome| outcome.status == EntryStatus::NotFound)
        .count();
    tracing::debug!(%action, entries = outcomes.len(), missed, "applied completion batch");
    Ok(outcomes)
}

#[derive(Debug, Clone, PartialEq)]
pub struct BulkUpdateEntry {
    pub id: i64,
    pub action: String,
    pub patch: UpdateItem,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BulkUpdateOutcome {
    pub id: i64,
    pub action: String,
    pub status: EntryStatus,
}

/// Applies each patch on its own against items of `checklist_id`. Entries are independent:
/// a missing item is a 404, an item of another checklist is a 403 and stays untouched, and
/// a storage failure on one entry is recorded as a 500 while the rest still run.
pub async fn apply_bulk_update<C: ConnectionTrait>(
    db: &C,
    checklist_id: i64,
    entries: &[BulkUpdateEntry],
    actor: i64,
) -> Vec<BulkUpdateOutcome> {
    let mut outcomes = Vec::with_capacity(entries.len());
    for entry in entries {
        let status = match update_entry(db, checklist_id, entry, actor).await {
            Ok(status) => status,
            Err(err) => {
                tracing::error!(item_id = entry.id, checklist_id, error = %err, "bulk update entry failed");
                EntryStatus::Failed
            }
        };
        outcomes.push(BulkUpdateOutcome {
            id: entry.id,
            action: entry.action.clone(),
            status,
        });
    }

    let updated = outcomes
        .iter()
        .filter(|outcome| outcome.status == EntryStatus::Ok)
        .count();
    tracing::info!(checklist_id, entries = outcomes.len(), updated, "applied bulk update");
    outcomes
}

async fn update_entry<C: ConnectionTrait>(
    db: &C,
    checklist_id: i64,
    entry: &BulkUpdateEntry,
    actor: i64,
) -> Result<EntryStatus, ItemError> {
    let Some(item) = Item::find_by_id(db, entry.id).await? else {
        return Ok(EntryStatus::NotFound);
    };
    if item.checklist_id != checklist_id {
        return Ok(EntryStatus::Forbidden);
    }
    match Item::update(db, item.id, &entry.patch, actor).await {
        Ok(_) => Ok(EntryStatus::Ok),
        Err(ItemError::NotFound) => Ok(EntryStatus::NotFound),
        Err(err) => Err(err),
    }
}
