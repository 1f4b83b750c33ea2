use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ConnectionTrait, DbErr, EntityTrait, PaginatorTrait, QuerySelect, Set,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use ts_rs::TS;

use super::{
    completion,
    item::{CreateItem, Item},
};
use crate::{
    entities::checklist,
    query::{FieldKind, FieldSpec, ListQuery, Page, QueryError, apply_list_query},
};

/// Fields that checklist listings may filter and sort on.
pub const CHECKLIST_FIELDS: &[FieldSpec<checklist::Column>] = &[
    FieldSpec::new("id", checklist::Column::Id, FieldKind::Integer),
    FieldSpec::new("object_domain", checklist::Column::ObjectDomain, FieldKind::Text),
    FieldSpec::new("object_id", checklist::Column::ObjectId, FieldKind::Text),
    FieldSpec::new("description", checklist::Column::Description, FieldKind::Text),
    FieldSpec::new("due", checklist::Column::Due, FieldKind::Timestamp),
    FieldSpec::new("urgency", checklist::Column::Urgency, FieldKind::Integer),
    FieldSpec::new("created_by", checklist::Column::CreatedBy, FieldKind::Integer),
    FieldSpec::new("updated_by", checklist::Column::UpdatedBy, FieldKind::Integer),
    FieldSpec::new("created_at", checklist::Column::CreatedAt, FieldKind::Timestamp),
    FieldSpec::new("updated_at", checklist::Column::UpdatedAt, FieldKind::Timestamp),
];

#[derive(Debug, Error)]
pub enum ChecklistError {
    #[error(transparent)]
    Database(#[from] DbErr),
    #[error(transparent)]
    Query(#[from] QueryError),
    #[error("checklist not found")]
    NotFound,
}

#[derive(Debug, Clone, PartialEq, Serialize, TS)]
pub struct Checklist {
    pub id: i64,
    pub object_domain: String,
    pub object_id: String,
    pub description: String,
    #[ts(type = "Date | null")]
    pub due: Option<DateTime<Utc>>,
    pub urgency: Option<i32>,
    pub created_by: Option<i64>,
    pub updated_by: Option<i64>,
    #[ts(type = "Date")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "Date")]
    pub updated_at: DateTime<Utc>,
}

/// A checklist together with its items, which is all completion derivation needs.
#[derive(Debug, Clone, PartialEq, Serialize, TS)]
pub struct ChecklistWithItems {
    #[serde(flatten)]
    #[ts(flatten)]
    pub checklist: Checklist,
    pub items: Vec<Item>,
}

impl ChecklistWithItems {
    pub fn is_completed(&self) -> bool {
        completion::is_completed(&self.items)
    }

    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        completion::completed_at(&self.items)
    }
}

#[derive(Debug, Clone, Default, Deserialize, TS)]
pub struct CreateChecklist {
    pub object_domain: String,
    pub object_id: String,
    pub description: String,
    #[ts(type = "Date | null")]
    pub due: Option<DateTime<Utc>>,
    pub urgency: Option<i32>,
    /// Descriptions of the items created alongside the checklist.
    pub items: Vec<String>,
    /// Stamped on every item created alongside the checklist.
    pub task_id: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, TS)]
pub struct UpdateChecklist {
    pub object_domain: Option<String>,
    pub object_id: Option<String>,
    pub description: Option<String>,
    #[ts(type = "Date | null")]
    pub due: Option<Option<DateTime<Utc>>>,
    pub urgency: Option<Option<i32>>,
}

impl Checklist {
    fn from_model(model: checklist::Model) -> Self {
        Self {
            id: model.id,
            object_domain: model.object_domain,
            object_id: model.object_id,
            description: model.description,
            due: model.due,
            urgency: model.urgency,
            created_by: model.created_by,
            updated_by: model.updated_by,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }

    pub async fn find_by_id<C: ConnectionTrait>(db: &C, id: i64) -> Result<Option<Self>, DbErr> {
        let record = checklist::Entity::find_by_id(id).one(db).await?;
        Ok(record.map(Self::from_model))
    }

    pub async fn find_page<C: ConnectionTrait>(
        db: &C,
        query: &ListQuery,
    ) -> Result<Page<Self>, ChecklistError> {
        let select = apply_list_query(checklist::Entity::find(), query, CHECKLIST_FIELDS)?;
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

    /// Pairs each checklist with its items using a single item query.
    pub async fn with_items<C: ConnectionTrait>(
        db: &C,
        checklists: Vec<Self>,
    ) -> Result<Vec<ChecklistWithItems>, DbErr> {
        let ids: Vec<i64> = checklists.iter().map(|checklist| checklist.id).collect();
        let mut items = Item::find_by_checklist_ids(db, &ids).await?;
        Ok(checklists
            .into_iter()
            .map(|checklist| ChecklistWithItems {
                items: items.remove(&checklist.id).unwrap_or_default(),
                checklist,
            })
            .collect())
    }

    pub async fn load_items<C: ConnectionTrait>(
        self,
        db: &C,
    ) -> Result<ChecklistWithItems, DbErr> {
        let items = Item::find_by_checklist_id(db, self.id).await?;
        Ok(ChecklistWithItems {
            checklist: self,
            items,
        })
    }

    /// Inserts the checklist and one item per description. Run inside a transaction to
    /// keep the pair atomic.
    pub async fn create<C: ConnectionTrait>(
        db: &C,
        data: &CreateChecklist,
        actor: i64,
        now: DateTime<Utc>,
    ) -> Result<ChecklistWithItems, DbErr> {
        let active = checklist::ActiveModel {
            object_domain: Set(data.object_domain.clone()),
            object_id: Set(data.object_id.clone()),
            description: Set(data.description.clone()),
            due: Set(data.due),
            urgency: Set(data.urgency),
            created_by: Set(Some(actor)),
            updated_by: Set(Some(actor)),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        };
        let checklist = Self::from_model(active.insert(db).await?);

        let mut items = Vec::with_capacity(data.items.len());
        for description in &data.items {
            let item = CreateItem {
                description: description.clone(),
                task_id: data.task_id,
                ..Default::default()
            };
            items.push(Item::create(db, checklist.id, &item, actor, now).await?);
        }

        Ok(ChecklistWithItems { checklist, items })
    }

    pub async fn update<C: ConnectionTrait>(
        db: &C,
        id: i64,
        data: &UpdateChecklist,
        actor: i64,
    ) -> Result<Self, ChecklistError> {
        let record = checklist::Entity::find_by_id(id)
            .one(db)
            .await?
            .ok_or(ChecklistError::NotFound)?;

        let mut active: checklist::ActiveModel = record.into();
        if let Some(object_domain) = &data.object_domain {
            active.object_domain = Set(object_domain.clone());
        }
        if let Some(object_id) = &data.object_id {
            active.object_id = Set(object_id.clone());
        }
        if let Some(description) = &data.description {
            active.description = Set(description.clone());
        }
        if let Some(due) = data.due {
            active.due = Set(due);
        }
        if let Some(urgency) = data.urgency {
            active.urgency = Set(urgency);
        }
        active.updated_by = Set(Some(actor));
        active.updated_at = Set(Utc::now());

        let updated = active.update(db).await?;
        Ok(Self::from_model(updated))
    }

    /// Deletes the checklist and its items. Run inside a transaction.
    pub async fn delete<C: ConnectionTrait>(db: &C, id: i64) -> Result<u64, DbErr> {
        Item::delete_by_checklist_id(db, id).await?;
        let result = checklist::Entity::delete_by_id(id).exec(db).await?;
        Ok(result.rows_affected)
    }
}
