//! JSON:API style documents: typed resources with `self` links, collection documents with
//! `meta` and pagination links.

use chrono::{DateTime, SecondsFormat, Utc};
use db::{
    models::{
        bulk::{BulkUpdateOutcome, CompletionOutcome},
        checklist::ChecklistWithItems,
        item::Item,
        summary::ItemSummary,
        template::{Template, TemplateChecklist, TemplateItem},
    },
    query::{ListQuery, Pagination},
};
use serde::Serialize;
use url::form_urlencoded;

/// RFC 3339 with an explicit numeric offset, e.g. `2024-01-01T00:00:00+00:00`.
pub fn format_timestamp(value: DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Secs, false)
}

fn format_optional(value: Option<DateTime<Utc>>) -> Option<String> {
    value.map(format_timestamp)
}

#[derive(Debug, Serialize)]
pub struct Links {
    #[serde(rename = "self")]
    pub self_link: String,
}

#[derive(Debug, Serialize)]
pub struct Resource<A> {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub id: i64,
    pub attributes: A,
    pub links: Links,
}

#[derive(Debug, Serialize)]
pub struct ItemAttributes {
    pub checklist_id: i64,
    pub description: String,
    pub is_completed: bool,
    pub completed_at: Option<String>,
    pub due: Option<String>,
    pub urgency: Option<i32>,
    pub assignee_id: Option<i64>,
    pub task_id: Option<i64>,
    pub created_by: Option<i64>,
    pub updated_by: Option<i64>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<&Item> for ItemAttributes {
    fn from(item: &Item) -> Self {
        Self {
            checklist_id: item.checklist_id,
            description: item.description.clone(),
            is_completed: item.is_completed,
            completed_at: format_optional(item.completed_at),
            due: format_optional(item.due),
            urgency: item.urgency,
            assignee_id: item.assignee_id,
            task_id: item.task_id,
            created_by: item.created_by,
            updated_by: item.updated_by,
            created_at: format_timestamp(item.created_at),
            updated_at: format_timestamp(item.updated_at),
        }
    }
}

/// Item as embedded in a checklist or listed under `includes`.
#[derive(Debug, Serialize)]
pub struct ItemBody {
    pub id: i64,
    #[serde(flatten)]
    pub attributes: ItemAttributes,
}

impl From<&Item> for ItemBody {
    fn from(item: &Item) -> Self {
        Self {
            id: item.id,
            attributes: ItemAttributes::from(item),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ChecklistAttributes {
    pub object_domain: String,
    pub object_id: String,
    pub description: String,
    pub is_completed: bool,
    pub completed_at: Option<String>,
    pub due: Option<String>,
    pub urgency: Option<i32>,
    pub created_by: Option<i64>,
    pub updated_by: Option<i64>,
    pub created_at: String,
    pub updated_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub items: Option<Vec<ItemBody>>,
}

#[derive(Debug, Serialize)]
pub struct TemplateResource {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub id: i64,
    pub name: String,
    pub checklist: TemplateChecklist,
    pub items: Vec<TemplateItem>,
    pub links: Links,
}

#[derive(Debug, Serialize)]
pub struct Document<T> {
    pub data: T,
}

impl<T> Document<T> {
    pub fn new(data: T) -> Self {
        Self { data }
    }
}

#[derive(Debug, Serialize)]
pub struct Meta {
    pub count: usize,
    pub total: u64,
}

#[derive(Debug, Serialize)]
pub struct PageLinks {
    pub first: String,
    pub prev: Option<String>,
    pub next: Option<String>,
    pub last: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CollectionDocument<T> {
    pub data: Vec<T>,
    pub meta: Meta,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub links: Option<PageLinks>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub includes: Option<Vec<ItemBody>>,
}

/// Builds absolute URLs for resources and collection pages.
#[derive(Debug, Clone)]
pub struct UrlBuilder {
    base: String,
}

impl UrlBuilder {
    pub fn new(base: &str) -> Self {
        Self {
            base: base.trim_end_matches('/').to_string(),
        }
    }

    pub fn path(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    pub fn checklist(&self, id: i64) -> String {
        self.path(&format!("/checklists/{id}"))
    }

    pub fn item(&self, checklist_id: i64, id: i64) -> String {
        self.path(&format!("/checklists/{checklist_id}/items/{id}"))
    }

    pub fn template(&self, id: i64) -> String {
        self.path(&format!("/checklists/templates/{id}"))
    }

    /// `first`/`prev`/`next`/`last` links for `path`, carrying over the query's sort and
    /// filters. `last` is absent when every record fits on one page.
    pub fn page_links(
        &self,
        path: &str,
        query: &ListQuery,
        include_items: bool,
        total: u64,
    ) -> PageLinks {
        let Pagination { limit, offset } = query.pagination;
        let limit = limit.max(1);
        let link = |offset: u64| self.page_url(path, query, include_items, limit, offset);

        let pages = total.div_ceil(limit);
        PageLinks {
            first: link(0),
            prev: (offset > 0).then(|| link(offset.saturating_sub(limit))),
            next: offset
                .checked_add(limit)
                .filter(|next| *next < total)
                .map(link),
            last: (pages > 1).then(|| link((pages - 1) * limit)),
        }
    }

    fn page_url(
        &self,
        path: &str,
        query: &ListQuery,
        include_items: bool,
        limit: u64,
        offset: u64,
    ) -> String {
        let mut params = form_urlencoded::Serializer::new(String::new());
        for filter in &query.filters {
            params.append_pair(
                &format!("filter[{}][{}]", filter.field, filter.op),
                &filter.value,
            );
        }
        if let Some(sort) = &query.sort {
            params.append_pair("sort", &sort.as_param());
        }
        if include_items {
            params.append_pair("include", "items");
        }
        params.append_pair("page[limit]", &limit.to_string());
        params.append_pair("page[offset]", &offset.to_string());
        format!("{}?{}", self.path(path), params.finish())
    }
}

impl UrlBuilder {
    pub fn checklist_resource(
        &self,
        entry: &ChecklistWithItems,
        include_items: bool,
    ) -> Resource<ChecklistAttributes> {
        let checklist = &entry.checklist;
        Resource {
            kind: "checklists",
            id: checklist.id,
            attributes: ChecklistAttributes {
                object_domain: checklist.object_domain.clone(),
                object_id: checklist.object_id.clone(),
                description: checklist.description.clone(),
                is_completed: entry.is_completed(),
                completed_at: format_optional(entry.completed_at()),
                due: format_optional(checklist.due),
                urgency: checklist.urgency,
                created_by: checklist.created_by,
                updated_by: checklist.updated_by,
                created_at: format_timestamp(checklist.created_at),
                updated_at: format_timestamp(checklist.updated_at),
                items: include_items.then(|| entry.items.iter().map(ItemBody::from).collect()),
            },
            links: Links {
                self_link: self.checklist(checklist.id),
            },
        }
    }

    pub fn item_resource(&self, item: &Item) -> Resource<ItemAttributes> {
        Resource {
            kind: "items",
            id: item.id,
            attributes: ItemAttributes::from(item),
            links: Links {
                self_link: self.item(item.checklist_id, item.id),
            },
        }
    }

    pub fn template_resource(&self, template: &Template) -> TemplateResource {
        TemplateResource {
            kind: "templates",
            id: template.id,
            name: template.name.clone(),
            checklist: template.checklist.clone(),
            items: template.items.clone(),
            links: Links {
                self_link: self.template(template.id),
            },
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CompletionEntry {
    pub id: Option<i64>,
    pub item_id: i64,
    pub checklist_id: Option<i64>,
    pub is_completed: Option<bool>,
    pub action: String,
    pub status: u16,
}

impl From<&CompletionOutcome> for CompletionEntry {
    fn from(outcome: &CompletionOutcome) -> Self {
        Self {
            id: outcome.item.as_ref().map(|item| item.id),
            item_id: outcome.item_id,
            checklist_id: outcome.item.as_ref().map(|item| item.checklist_id),
            is_completed: outcome.item.as_ref().map(|item| item.is_completed),
            action: outcome.action.to_string(),
            status: outcome.status.code(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct BulkEntry {
    pub id: i64,
    pub action: String,
    pub status: u16,
}

impl From<&BulkUpdateOutcome> for BulkEntry {
    fn from(outcome: &BulkUpdateOutcome) -> Self {
        Self {
            id: outcome.id,
            action: outcome.action.clone(),
            status: outcome.status.code(),
        }
    }
}

pub type SummaryDocument = Document<ItemSummary>;
