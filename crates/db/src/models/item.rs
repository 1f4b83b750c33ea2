use std::collections::HashMap;

use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, Set,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use ts_rs::TS;

use crate::{
    entities::item,
    query::{FieldKind, FieldSpec, ListQuery, Page, QueryError, apply_list_query},
};

/// Fields that item listings may filter and sort on.
pub const ITEM_FIELDS: &[FieldSpec<item::Column>] = &[
    FieldSpec::new("id", item::Column::Id, FieldKind::Integer),
    FieldSpec::new("checklist_id", item::Column::ChecklistId, FieldKind::Integer),
    FieldSpec::new("description", item::Column::Description, FieldKind::Text),
    FieldSpec::new("is_completed", item::Column::IsCompleted, FieldKind::Boolean),
    FieldSpec::new("completed_at", item::Column::CompletedAt, FieldKind::Timestamp),
    FieldSpec::new("due", item::Column::Due, FieldKind::Timestamp),
    FieldSpec::new("urgency", item::Column::Urgency, FieldKind::Integer),
    FieldSpec::new("assignee_id", item::Column::AssigneeId, FieldKind::Integer),
    FieldSpec::new("task_id", item::Column::TaskId, FieldKind::Integer),
    FieldSpec::new("created_by", item::Column::CreatedBy, FieldKind::Integer),
    FieldSpec::new("updated_by", item::Column::UpdatedBy, FieldKind::Integer),
    FieldSpec::new("created_at", item::Column::CreatedAt, FieldKind::Timestamp),
    FieldSpec::new("updated_at", item::Column::UpdatedAt, FieldKind::Timestamp),
];

#[derive(Debug, Error)]
pub enum ItemError {
    #[error(transparent)]
    Database(#[from] DbErr),
    #[error(transparent)]
    Query(#[from] QueryError),
    #[error("item not found")]
    NotFound,
}

#[derive(Debug, Clone, PartialEq, Serialize, TS)]
pub struct Item {
    pub id: i64,
    pub checklist_id: i64,
    pub description: String,
    pub is_completed: bool,
    #[ts(type = "Date | null")]
    pub completed_at: Option<DateTime<Utc>>,
    #[ts(type = "Date | null")]
    pub due: Option<DateTime<Utc>>,
    pub urgency: Option<i32>,
    pub assignee_id: Option<i64>,
    pub task_id: Option<i64>,
    pub created_by: Option<i64>,
    pub updated_by: Option<i64>,
    #[ts(type = "Date")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "Date")]
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Deserialize, TS)]
pub struct CreateItem {
    pub description: String,
    #[ts(type = "Date | null")]
    pub due: Option<DateTime<Utc>>,
    pub urgency: Option<i32>,
    pub assignee_id: Option<i64>,
    pub task_id: Option<i64>,
}

/// Partial item patch. The outer `Option` says whether the field was sent, the inner one
/// whether it was set to null.
#[derive(Debug, Clone, Default, PartialEq, TS)]
pub struct UpdateItem {
    pub description: Option<String>,
    #[ts(type = "Date | null")]
    pub due: Option<Option<DateTime<Utc>>>,
    pub urgency: Option<Option<i32>>,
    pub assignee_id: Option<Option<i64>>,
    pub task_id: Option<Option<i64>>,
}

impl Item {
    pub(crate) fn from_model(model: item::Model) -> Self {
        Self {
            id: model.id,
            checklist_id: model.checklist_id,
            description: model.description,
            is_completed: model.is_completed,
            completed_at: model.completed_at,
            due: model.due,
            urgency: model.urgency,
            assignee_id: model.assignee_id,
            task_id: model.task_id,
            created_by: model.created_by,
            updated_by: model.updated_by,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }

    pub async fn find_by_id<C: ConnectionTrait>(db: &C, id: i64) -> Result<Option<Self>, DbErr> {
        let record = item::Entity::find_by_id(id).one(db).await?;
        Ok(record.map(Self::from_model))
    }

    /// Looks an item up only within its owning checklist.
    pub async fn find_in_checklist<C: ConnectionTrait>(
        db: &C,
        checklist_id: i64,
        id: i64,
    ) -> Result<Option<Self>, DbErr> {
        let record = item::Entity::find_by_id(id)
            .filter(item::Column::ChecklistId.eq(checklist_id))
            .one(db)
            .await?;
        Ok(record.map(Self::from_model))
    }

    pub async fn find_by_checklist_id<C: ConnectionTrait>(
        db: &C,
        checklist_id: i64,
    ) -> Result<Vec<Self>, DbErr> {
        let records = item::Entity::find()
            .filter(item::Column::ChecklistId.eq(checklist_id))
            .order_by_asc(item::Column::Id)
            .all(db)
            .await?;
        Ok(records.into_iter().map(Self::from_model).collect())
    }

    /// Loads the items of many checklists in one query, grouped by checklist id.
    pub async fn find_by_checklist_ids<C: ConnectionTrait>(
        db: &C,
        checklist_ids: &[i64],
    ) -> Result<HashMap<i64, Vec<Self>>, DbErr> {
        let mut grouped: HashMap<i64, Vec<Self>> = HashMap::new();
        if checklist_ids.is_empty() {
            return Ok(grouped);
        }
        let records = item::Entity::find()
            .filter(item::Column::ChecklistId.is_in(checklist_ids.iter().copied()))
            .order_by_asc(item::Column::Id)
            .all(db)
            .await?;
        for record in records {
            grouped
                .entry(record.checklist_id)
                .or_default()
                .push(Self::from_model(record));
        }
        Ok(grouped)
    }

    pub async fn find_page<C: ConnectionTrait>(
        db: &C,
        checklist_id: Option<i64>,
        query: &ListQuery,
    ) -> Result<Page<Self>, ItemError> {
        let mut select = item::Entity::find();
        if let Some(checklist_id) = checklist_id {
            select = select.filter(item::Column::ChecklistId.eq(checklist_id));
        }
        let select = apply_list_query(select, query, ITEM_FIELDS)?;
        let total = select.clone().count(db).await?;
        let records = select
            .offset(query.pagination.offset)
            .limit(query.pagination.limit)
            .all(db)
            .await?;
        Ok(Page {
            records: records.into_iter().map(Self::from_model).collect(),
            total,
        })
    }

    pub async fn create<C: ConnectionTrait>(
        db: &C,
        checklist_id: i64,
        data: &CreateItem,
        actor: i64,
        now: DateTime<Utc>,
    ) -> Result<Self, DbErr> {
        let active = item::ActiveModel {
            checklist_id: Set(checklist_id),
            description: Set(data.description.clone()),
            is_completed: Set(false),
            completed_at: Set(None),
            due: Set(data.due),
            urgency: Set(data.urgency),
            assignee_id: Set(data.assignee_id),
            task_id: Set(data.task_id),
            created_by: Set(Some(actor)),
            updated_by: Set(Some(actor)),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        };
        let model = active.insert(db).await?;
        Ok(Self::from_model(model))
    }

    pub async fn update<C: ConnectionTrait>(
        db: &C,
        id: i64,
        data: &UpdateItem,
        actor: i64,
    ) -> Result<Self, ItemError> {
        let record = item::Entity::find_by_id(id)
            .one(db)
            .await?
            .ok_or(ItemError::NotFound)?;

        let mut active: item::ActiveModel = record.into();
        if let Some(description) = &data.description {
            active.description = Set(description.clone());
        }
        if let Some(due) = data.due {
            active.due = Set(due);
        }
        if let Some(urgency) = data.urgency {
            active.urgency = Set(urgency);
        }
        if let Some(assignee_id) = data.assignee_id {
            active.assignee_id = Set(assignee_id);
        }
        if let Some(task_id) = data.task_id {
            active.task_id = Set(task_id);
        }
        active.updated_by = Set(Some(actor));
        active.updated_at = Set(Utc::now());

        let updated = active.update(db).await?;
        Ok(Self::from_model(updated))
    }

    /// Marks an item completed or incomplete. Completing stamps `completed_at`;
    /// un-completing clears it.
    pub async fn set_completion<C: ConnectionTrait>(
        db: &C,
        id: i64,
        completed: bool,
        actor: i64,
        now: DateTime<Utc>,
    ) -> Result<Option<Self>, DbErr> {
        let Some(record) = item::Entity::find_by_id(id).one(db).await? else {
            return Ok(None);
        };
        let mut active: item::ActiveModel = record.into();
        active.is_completed = Set(completed);
        active.completed_at = Set(completed.then_some(now));
        active.updated_by = Set(Some(actor));
        active.updated_at = Set(now);
        let updated = active.update(db).await?;
        Ok(Some(Self::from_model(updated)))
    }

    pub async fn delete<C: ConnectionTrait>(db: &C, id: i64) -> Result<u64, DbErr> {
        let result = item::Entity::delete_by_id(id).exec(db).await?;
        Ok(result.rows_affected)
    }

    pub async fn delete_by_checklist_id<C: ConnectionTrait>(
        db: &C,
        checklist_id: i64,
    ) -> Result<u64, DbErr> {
        let result = item::Entity::delete_many()
            .filter(item::Column::ChecklistId.eq(checklist_id))
            .exec(db)
            .await?;
        Ok(result.rows_affected)
    }
}
