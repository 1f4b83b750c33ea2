//! Stamping a template out into concrete checklists ("assigns").

use chrono::{DateTime, Utc};
use sea_orm::ConnectionTrait;
use serde::Deserialize;
use ts_rs::TS;

use super::{
    checklist::{Checklist, ChecklistWithItems, CreateChecklist},
    due::project_due,
    item::{CreateItem, Item},
    template::{Template, TemplateError},
};

/// The external object a new checklist is attached to.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, TS)]
pub struct AssignTarget {
    pub object_domain: String,
    pub object_id: i64,
}

/// Creates one checklist per target, in target order, each with a copy of every item
/// blueprint in stored order. Every due date is projected from the single `now` anchor.
///
/// The writes are not atomic on their own; callers pass a transaction so a failure on any
/// target leaves nothing behind. The template is only read.
pub async fn instantiate<C: ConnectionTrait>(
    db: &C,
    template: &Template,
    targets: &[AssignTarget],
    actor: i64,
    now: DateTime<Utc>,
) -> Result<Vec<ChecklistWithItems>, TemplateError> {
    let blueprint = &template.checklist;
    let checklist_due = project_due(now, blueprint.due_interval, blueprint.due_unit)?;

    let item_data = template
        .items
        .iter()
        .map(|item| {
            Ok(CreateItem {
                description: item.description.clone(),
                due: project_due(now, item.due_interval, item.due_unit)?,
                urgency: item.urgency,
                assignee_id: item.assignee_id,
                task_id: item.task_id,
            })
        })
        .collect::<Result<Vec<_>, TemplateError>>()?;

    let mut created = Vec::with_capacity(targets.len());
    for target in targets {
        let data = CreateChecklist {
            object_domain: target.object_domain.clone(),
            object_id: target.object_id.to_string(),
            description: blueprint.description.clone(),
            due: checklist_due,
            urgency: blueprint.urgency,
            items: Vec::new(),
            task_id: None,
        };
        let ChecklistWithItems { checklist, .. } = Checklist::create(db, &data, actor, now).await?;

        let mut items = Vec::with_capacity(item_data.len());
        for item in &item_data {
            items.push(Item::create(db, checklist.id, item, actor, now).await?);
        }
        created.push(ChecklistWithItems { checklist, items });
    }

    tracing::info!(
        template_id = template.id,
        checklists = created.len(),
        items_per_checklist = item_data.len(),
        "instantiated template"
    );
    Ok(created)
}
