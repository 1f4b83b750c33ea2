use std::collections::HashMap;

use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, Set,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use ts_rs::TS;

use super::due::DueProjectionError;
use crate::{
    entities::{template, template_checklist, template_item},
    query::{FieldKind, FieldSpec, ListQuery, Page, QueryError, apply_list_query},
    types::DueUnit,
};

/// Fields that template listings may filter and sort on.
pub const TEMPLATE_FIELDS: &[FieldSpec<template::Column>] = &[
    FieldSpec::new("id", template::Column::Id, FieldKind::Integer),
    FieldSpec::new("name", template::Column::Name, FieldKind::Text),
    FieldSpec::new("created_by", template::Column::CreatedBy, FieldKind::Integer),
    FieldSpec::new("updated_by", template::Column::UpdatedBy, FieldKind::Integer),
    FieldSpec::new("created_at", template::Column::CreatedAt, FieldKind::Timestamp),
    FieldSpec::new("updated_at", template::Column::UpdatedAt, FieldKind::Timestamp),
];

#[derive(Debug, Error)]
pub enum TemplateError {
    #[error(transparent)]
    Database(#[from] DbErr),
    #[error(transparent)]
    Query(#[from] QueryError),
    #[error(transparent)]
    DueProjection(#[from] DueProjectionError),
    #[error("template not found")]
    NotFound,
    #[error("template {0} has no checklist blueprint")]
    MissingChecklist(i64),
}

#[derive(Debug, Clone, PartialEq, Serialize, TS)]
pub struct TemplateChecklist {
    pub id: i64,
    pub description: String,
    pub due_interval: Option<i32>,
    pub due_unit: Option<DueUnit>,
    pub urgency: Option<i32>,
    pub created_by: Option<i64>,
    pub updated_by: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, TS)]
pub struct TemplateItem {
    pub id: i64,
    pub description: String,
    pub due_interval: Option<i32>,
    pub due_unit: Option<DueUnit>,
    pub urgency: Option<i32>,
    pub assignee_id: Option<i64>,
    pub task_id: Option<i64>,
    pub created_by: Option<i64>,
    pub updated_by: Option<i64>,
}

/// A template with its checklist blueprint and item blueprints in stored order.
#[derive(Debug, Clone, PartialEq, Serialize, TS)]
pub struct Template {
    pub id: i64,
    pub name: String,
    pub checklist: TemplateChecklist,
    pub items: Vec<TemplateItem>,
    pub created_by: Option<i64>,
    pub updated_by: Option<i64>,
    #[ts(type = "Date")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "Date")]
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Deserialize, TS)]
pub struct TemplateChecklistData {
    pub description: String,
    pub due_interval: Option<i32>,
    pub due_unit: Option<DueUnit>,
    pub urgency: Option<i32>,
}

#[derive(Debug, Clone, Default, Deserialize, TS)]
pub struct TemplateItemData {
    pub description: String,
    pub due_interval: Option<i32>,
    pub due_unit: Option<DueUnit>,
    pub urgency: Option<i32>,
    pub assignee_id: Option<i64>,
    pub task_id: Option<i64>,
}

/// Full template body, used for both creation and replacement.
#[derive(Debug, Clone, Default, Deserialize, TS)]
pub struct TemplateData {
    pub name: String,
    pub checklist: TemplateChecklistData,
    pub items: Vec<TemplateItemData>,
}

impl TemplateChecklist {
    fn from_model(model: template_checklist::Model) -> Self {
        Self {
            id: model.id,
            description: model.description,
            due_interval: model.due_interval,
            due_unit: model.due_unit,
            urgency: model.urgency,
            created_by: model.created_by,
            updated_by: model.updated_by,
        }
    }
}

impl TemplateItem {
    fn from_model(model: template_item::Model) -> Self {
        Self {
            id: model.id,
            description: model.description,
            due_interval: model.due_interval,
            due_unit: model.due_unit,
            urgency: model.urgency,
            assignee_id: model.assignee_id,
            task_id: model.task_id,
            created_by: model.created_by,
            updated_by: model.updated_by,
        }
    }
}

impl Template {
    fn assemble(
        model: template::Model,
        checklist: Option<template_checklist::Model>,
        items: Vec<template_item::Model>,
    ) -> Result<Self, TemplateError> {
        let checklist = checklist.ok_or(TemplateError::MissingChecklist(model.id))?;
        Ok(Self {
            id: model.id,
            name: model.name,
            checklist: TemplateChecklist::from_model(checklist),
            items: items.into_iter().map(TemplateItem::from_model).collect(),
            created_by: model.created_by,
            updated_by: model.updated_by,
            created_at: model.created_at,
            updated_at: model.updated_at,
        })
    }

    /// Loads the blueprints for a set of template rows, preserving row order.
    async fn load_children<C: ConnectionTrait>(
        db: &C,
        models: Vec<template::Model>,
    ) -> Result<Vec<Self>, TemplateError> {
        if models.is_empty() {
            return Ok(Vec::new());
        }
        let ids: Vec<i64> = models.iter().map(|model| model.id).collect();

        let mut checklists: HashMap<i64, template_checklist::Model> =
            template_checklist::Entity::find()
                .filter(template_checklist::Column::TemplateId.is_in(ids.clone()))
                .all(db)
                .await?
                .into_iter()
                .map(|record| (record.template_id, record))
                .collect();

        let mut items: HashMap<i64, Vec<template_item::Model>> = HashMap::new();
        for record in template_item::Entity::find()
            .filter(template_item::Column::TemplateId.is_in(ids))
            .order_by_asc(template_item::Column::Id)
            .all(db)
            .await?
        {
            items.entry(record.template_id).or_default().push(record);
        }

        models
            .into_iter()
            .map(|model| {
                let checklist = checklists.remove(&model.id);
                let items = items.remove(&model.id).unwrap_or_default();
                Self::assemble(model, checklist, items)
            })
            .collect()
    }

    pub async fn find_by_id<C: ConnectionTrait>(
        db: &C,
        id: i64,
    ) -> Result<Option<Self>, TemplateError> {
        let Some(model) = template::Entity::find_by_id(id).one(db).await? else {
            return Ok(None);
        };
        Ok(Self::load_children(db, vec![model]).await?.pop())
    }

    pub async fn find_page<C: ConnectionTrait>(
        db: &C,
        query: &ListQuery,
    ) -> Result<Page<Self>, TemplateError> {
        let select = apply_list_query(template::Entity::find(), query, TEMPLATE_FIELDS)?;
        let total = select.clone().count(db).await?;
        let models = select
            .offset(query.pagination.offset)
            .limit(query.pagination.limit)
            .all(db)
            .await?;
        Ok(Page {
            records: Self::load_children(db, models).await?,
            total,
        })
    }

    async fn insert_children<C: ConnectionTrait>(
        db: &C,
        template_id: i64,
        data: &TemplateData,
        actor: i64,
        now: DateTime<Utc>,
    ) -> Result<(), DbErr> {
        template_checklist::ActiveModel {
            template_id: Set(template_id),
            description: Set(data.checklist.description.clone()),
            due_interval: Set(data.checklist.due_interval),
            due_unit: Set(data.checklist.due_unit),
            urgency: Set(data.checklist.urgency),
            created_by: Set(Some(actor)),
            updated_by: Set(Some(actor)),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(db)
        .await?;

        for item in &data.items {
            template_item::ActiveModel {
                template_id: Set(template_id),
                description: Set(item.description.clone()),
                due_interval: Set(item.due_interval),
                due_unit: Set(item.due_unit),
                urgency: Set(item.urgency),
                assignee_id: Set(item.assignee_id),
                task_id: Set(item.task_id),
                created_by: Set(Some(actor)),
                updated_by: Set(Some(actor)),
                created_at: Set(now),
                updated_at: Set(now),
                ..Default::default()
            }
            .insert(db)
            .await?;
        }
        Ok(())
    }

    async fn delete_children<C: ConnectionTrait>(db: &C, template_id: i64) -> Result<(), DbErr> {
        template_item::Entity::delete_many()
            .filter(template_item::Column::TemplateId.eq(template_id))
            .exec(db)
            .await?;
        template_checklist::Entity::delete_many()
            .filter(template_checklist::Column::TemplateId.eq(template_id))
            .exec(db)
            .await?;
        Ok(())
    }

    /// Creates a template with its blueprints. Run inside a transaction.
    pub async fn create<C: ConnectionTrait>(
        db: &C,
        data: &TemplateData,
        actor: i64,
    ) -> Result<Self, TemplateError> {
        let now = Utc::now();
        let model = template::ActiveModel {
            name: Set(data.name.clone()),
            created_by: Set(Some(actor)),
            updated_by: Set(Some(actor)),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(db)
        .await?;
        Self::insert_children(db, model.id, data, actor, now).await?;
        Self::find_by_id(db, model.id)
            .await?
            .ok_or(TemplateError::NotFound)
    }

    /// Replaces the name, checklist blueprint and every item blueprint. The previous
    /// blueprints are deleted, not merged. Run inside a transaction.
    pub async fn replace<C: ConnectionTrait>(
        db: &C,
        id: i64,
        data: &TemplateData,
        actor: i64,
    ) -> Result<Self, TemplateError> {
        let record = template::Entity::find_by_id(id)
            .one(db)
            .await?
            .ok_or(TemplateError::NotFound)?;

        let now = Utc::now();
        let mut active: template::ActiveModel = record.into();
        active.name = Set(data.name.clone());
        active.updated_by = Set(Some(actor));
        active.updated_at = Set(now);
        active.update(db).await?;

        Self::delete_children(db, id).await?;
        Self::insert_children(db, id, data, actor, now).await?;
        Self::find_by_id(db, id).await?.ok_or(TemplateError::NotFound)
    }

    /// Deletes the template and its blueprints. Checklists already instantiated from it
    /// are untouched. Run inside a transaction.
    pub async fn delete<C: ConnectionTrait>(db: &C, id: i64) -> Result<u64, DbErr> {
        Self::delete_children(db, id).await?;
        let result = template::Entity::delete_by_id(id).exec(db).await?;
        Ok(result.rows_affected)
    }
}
