use axum::{
    Extension, Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    middleware::from_fn_with_state,
    routing::{get, post},
};
use chrono::{DateTime, FixedOffset, Utc};
use db::{
    TransactionTrait,
    models::{
        bulk::{BulkUpdateEntry, CompletionAction, apply_bulk_update, apply_completion},
        checklist::Checklist,
        item::{CreateItem, Item, UpdateItem},
        summary::item_summary,
    },
};
use serde::Deserialize;
use serde_json::Value;

use crate::{
    AppState,
    error::ApiError,
    http::auth::Principal,
    list_params::ListParams,
    middleware::load_checklist_middleware,
    response::{
        BulkEntry, CollectionDocument, CompletionEntry, Document, ItemAttributes, Meta, Resource,
        SummaryDocument,
    },
    validation::{
        BULK_UPDATE_ENTRY, COMPLETION_ENTRY, ITEM_CREATE, ITEM_UPDATE, JsonBody,
        ValidationErrors, check_due_window, check_fields, data_attributes, decode, double_option,
        require_non_empty_array,
    },
};

type ItemDocument = Document<Resource<ItemAttributes>>;

#[derive(Debug, Deserialize)]
pub struct ItemPath {
    pub checklist_id: i64,
    pub item_id: i64,
}

#[derive(Debug, Deserialize)]
struct CreateItemPayload {
    description: String,
    due: Option<DateTime<Utc>>,
    urgency: Option<i32>,
    assignee_id: Option<i64>,
    task_id: Option<i64>,
}

impl From<CreateItemPayload> for CreateItem {
    fn from(payload: CreateItemPayload) -> Self {
        Self {
            description: payload.description,
            due: payload.due,
            urgency: payload.urgency,
            assignee_id: payload.assignee_id,
            task_id: payload.task_id,
        }
    }
}

#[derive(Debug, Deserialize)]
struct UpdateItemPayload {
    description: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    due: Option<Option<DateTime<Utc>>>,
    #[serde(default, deserialize_with = "double_option")]
    urgency: Option<Option<i32>>,
    #[serde(default, deserialize_with = "double_option")]
    assignee_id: Option<Option<i64>>,
    #[serde(default, deserialize_with = "double_option")]
    task_id: Option<Option<i64>>,
}

impl From<UpdateItemPayload> for UpdateItem {
    fn from(payload: UpdateItemPayload) -> Self {
        Self {
            description: payload.description,
            due: payload.due,
            urgency: payload.urgency,
            assignee_id: payload.assignee_id,
            task_id: payload.task_id,
        }
    }
}

#[derive(Debug, Deserialize)]
struct BulkUpdatePayload {
    id: i64,
    action: String,
    attributes: UpdateItemPayload,
}

#[derive(Debug, Deserialize)]
struct CompletionPayload {
    item_id: i64,
}

#[derive(Debug, Deserialize)]
pub struct SummaryQuery {
    pub date: Option<String>,
    pub object_domain: Option<String>,
}

fn validate_item_attributes(
    body: &Value,
    create: bool,
    checklist: &Checklist,
) -> Result<Value, ApiError> {
    let mut errors = ValidationErrors::new();
    let attributes = data_attributes(body, &mut errors);
    if attributes.is_object() {
        let rules = if create { ITEM_CREATE } else { ITEM_UPDATE };
        check_fields(attributes, rules, "data.attributes", &mut errors);
        check_due_window(attributes, "data.attributes", Utc::now(), checklist.due, &mut errors);
    }
    errors.into_result()?;
    Ok(attributes.clone())
}

/// Validates a `{data: [...]}` batch body entry by entry and returns the entries.
fn validate_batch<'a>(
    body: &'a Value,
    check_entry: impl Fn(&Value, &str, &mut ValidationErrors),
) -> Result<&'a [Value], ApiError> {
    let mut errors = ValidationErrors::new();
    let entries = require_non_empty_array(body, "data", "", &mut errors);
    for (index, entry) in entries.iter().enumerate() {
        check_entry(entry, &format!("data.{index}"), &mut errors);
    }
    errors.into_result()?;
    Ok(entries)
}

pub async fn list_items(
    State(state): State<AppState>,
    Extension(checklist): Extension<Checklist>,
    params: ListParams,
) -> Result<Json<CollectionDocument<Resource<ItemAttributes>>>, ApiError> {
    let page = Item::find_page(&state.db().pool, Some(checklist.id), &params.query).await?;
    let urls = state.urls();
    let data: Vec<_> = page.records.iter().map(|item| urls.item_resource(item)).collect();
    let path = format!("/checklists/{}/items", checklist.id);
    Ok(Json(CollectionDocument {
        meta: Meta {
            count: data.len(),
            total: page.total,
        },
        links: Some(urls.page_links(&path, &params.query, false, page.total)),
        includes: None,
        data,
    }))
}

pub async fn create_item(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Extension(checklist): Extension<Checklist>,
    JsonBody(body): JsonBody,
) -> Result<(StatusCode, Json<ItemDocument>), ApiError> {
    let attributes = validate_item_attributes(&body, true, &checklist)?;
    let data: CreateItem = decode::<CreateItemPayload>(&attributes, "data.attributes")?.into();

    let tx = state.db().pool.begin().await?;
    let item = Item::create(&tx, checklist.id, &data, principal.user_id, Utc::now()).await?;
    tx.commit().await?;

    Ok((
        StatusCode::CREATED,
        Json(Document::new(state.urls().item_resource(&item))),
    ))
}

async fn find_owned_item(state: &AppState, path: &ItemPath) -> Result<Item, ApiError> {
    Item::find_in_checklist(&state.db().pool, path.checklist_id, path.item_id)
        .await?
        .ok_or_else(|| {
            tracing::warn!(
                checklist_id = path.checklist_id,
                item_id = path.item_id,
                "Item not found in checklist"
            );
            ApiError::not_found()
        })
}

pub async fn get_item(
    State(state): State<AppState>,
    Path(path): Path<ItemPath>,
) -> Result<Json<ItemDocument>, ApiError> {
    let item = find_owned_item(&state, &path).await?;
    Ok(Json(Document::new(state.urls().item_resource(&item))))
}

pub async fn update_item(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Extension(checklist): Extension<Checklist>,
    Path(path): Path<ItemPath>,
    JsonBody(body): JsonBody,
) -> Result<Json<ItemDocument>, ApiError> {
    let existing = find_owned_item(&state, &path).await?;
    let attributes = validate_item_attributes(&body, false, &checklist)?;
    let data: UpdateItem = decode::<UpdateItemPayload>(&attributes, "data.attributes")?.into();

    let tx = state.db().pool.begin().await?;
    let item = Item::update(&tx, existing.id, &data, principal.user_id).await?;
    tx.commit().await?;

    Ok(Json(Document::new(state.urls().item_resource(&item))))
}

pub async fn delete_item(
    State(state): State<AppState>,
    Path(path): Path<ItemPath>,
) -> Result<StatusCode, ApiError> {
    let existing = find_owned_item(&state, &path).await?;
    Item::delete(&state.db().pool, existing.id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn bulk_update_items(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Extension(checklist): Extension<Checklist>,
    JsonBody(body): JsonBody,
) -> Result<Json<Document<Vec<BulkEntry>>>, ApiError> {
    let now = Utc::now();
    let entries = validate_batch(&body, |entry, prefix, errors| {
        check_fields(entry, BULK_UPDATE_ENTRY, prefix, errors);
        if let Some(attributes) = entry.get("attributes").filter(|value| value.is_object()) {
            let prefix = format!("{prefix}.attributes");
            check_fields(attributes, ITEM_UPDATE, &prefix, errors);
            check_due_window(attributes, &prefix, now, checklist.due, errors);
        }
    })?;

    let entries = entries
        .iter()
        .enumerate()
        .map(|(index, entry)| {
            let payload: BulkUpdatePayload = decode(entry, &format!("data.{index}"))?;
            Ok(BulkUpdateEntry {
                id: payload.id,
                action: payload.action,
                patch: payload.attributes.into(),
            })
        })
        .collect::<Result<Vec<_>, ApiError>>()?;

    let outcomes =
        apply_bulk_update(&state.db().pool, checklist.id, &entries, principal.user_id).await;
    Ok(Json(Document::new(outcomes.iter().map(BulkEntry::from).collect())))
}

async fn set_completion(
    state: &AppState,
    principal: Principal,
    body: &Value,
    action: CompletionAction,
) -> Result<Json<Document<Vec<CompletionEntry>>>, ApiError> {
    let entries = validate_batch(body, |entry, prefix, errors| {
        check_fields(entry, COMPLETION_ENTRY, prefix, errors);
    })?;
    let item_ids = entries
        .iter()
        .enumerate()
        .map(|(index, entry)| {
            decode::<CompletionPayload>(entry, &format!("data.{index}")).map(|p| p.item_id)
        })
        .collect::<Result<Vec<_>, ApiError>>()?;

    let tx = state.db().pool.begin().await?;
    let outcomes = apply_completion(&tx, &item_ids, action, principal.user_id, Utc::now()).await?;
    tx.commit().await?;

    Ok(Json(Document::new(
        outcomes.iter().map(CompletionEntry::from).collect(),
    )))
}

pub async fn complete_items(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    JsonBody(body): JsonBody,
) -> Result<Json<Document<Vec<CompletionEntry>>>, ApiError> {
    set_completion(&state, principal, &body, CompletionAction::Complete).await
}

pub async fn incomplete_items(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    JsonBody(body): JsonBody,
) -> Result<Json<Document<Vec<CompletionEntry>>>, ApiError> {
    set_completion(&state, principal, &body, CompletionAction::Incomplete).await
}

pub async fn item_summaries(
    State(state): State<AppState>,
    Query(query): Query<SummaryQuery>,
) -> Result<Json<SummaryDocument>, ApiError> {
    let now: DateTime<FixedOffset> = match query.date.as_deref().map(str::trim) {
        Some(raw) if !raw.is_empty() => DateTime::parse_from_rfc3339(raw).map_err(|_| {
            ApiError::Validation(ValidationErrors::single(
                "date",
                "must be an RFC 3339 timestamp with offset",
            ))
        })?,
        _ => Utc::now().fixed_offset(),
    };
    let domain = query
        .object_domain
        .as_deref()
        .map(str::trim)
        .filter(|domain| !domain.is_empty());

    let summary = item_summary(&state.db().pool, domain, now).await?;
    Ok(Json(Document::new(summary)))
}

pub fn router(state: &AppState) -> Router<AppState> {
    let checklist_items = Router::new()
        .route("/checklists/{checklist_id}/items", get(list_items).post(create_item))
        .route("/checklists/{checklist_id}/items/_bulk", post(bulk_update_items))
        .route(
            "/checklists/{checklist_id}/items/{item_id}",
            get(get_item).patch(update_item).delete(delete_item),
        )
        .route_layer(from_fn_with_state(state.clone(), load_checklist_middleware));

    Router::new()
        .route("/checklists/complete", post(complete_items))
        .route("/checklists/incomplete", post(incomplete_items))
        .route("/checklists/items/summaries", get(item_summaries))
        .merge(checklist_items)
}
