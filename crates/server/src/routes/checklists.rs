use axum::{
    Extension, Json, Router,
    extract::{Query, State},
    http::StatusCode,
    middleware::from_fn_with_state,
    routing::get,
};
use chrono::{DateTime, Utc};
use db::{
    TransactionTrait,
    models::checklist::{Checklist, CreateChecklist, UpdateChecklist},
};
use serde::Deserialize;
use serde_json::Value;

use crate::{
    AppState,
    error::ApiError,
    http::auth::Principal,
    list_params::ListParams,
    middleware::load_checklist_middleware,
    response::{ChecklistAttributes, CollectionDocument, Document, Meta, Resource},
    routes::IncludeQuery,
    validation::{
        CHECKLIST_CREATE, CHECKLIST_UPDATE, JsonBody, ValidationErrors, check_due_window,
        check_fields, data_attributes, decode, double_option, require_non_empty_array,
    },
};

type ChecklistDocument = Document<Resource<ChecklistAttributes>>;

/// External object ids arrive either as strings or as numbers; both are stored as text.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ObjectId {
    Text(String),
    Number(i64),
}

impl From<ObjectId> for String {
    fn from(id: ObjectId) -> Self {
        match id {
            ObjectId::Text(text) => text,
            ObjectId::Number(number) => number.to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct CreateChecklistPayload {
    object_domain: String,
    object_id: ObjectId,
    description: String,
    due: Option<DateTime<Utc>>,
    urgency: Option<i32>,
    items: Vec<String>,
    task_id: Option<i64>,
}

impl From<CreateChecklistPayload> for CreateChecklist {
    fn from(payload: CreateChecklistPayload) -> Self {
        Self {
            object_domain: payload.object_domain,
            object_id: payload.object_id.into(),
            description: payload.description,
            due: payload.due,
            urgency: payload.urgency,
            items: payload.items,
            task_id: payload.task_id,
        }
    }
}

#[derive(Debug, Deserialize)]
struct UpdateChecklistPayload {
    object_domain: Option<String>,
    object_id: Option<ObjectId>,
    description: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    due: Option<Option<DateTime<Utc>>>,
    #[serde(default, deserialize_with = "double_option")]
    urgency: Option<Option<i32>>,
}

impl From<UpdateChecklistPayload> for UpdateChecklist {
    fn from(payload: UpdateChecklistPayload) -> Self {
        Self {
            object_domain: payload.object_domain,
            object_id: payload.object_id.map(String::from),
            description: payload.description,
            due: payload.due,
            urgency: payload.urgency,
        }
    }
}

fn validate_create(body: &Value, now: DateTime<Utc>) -> Result<CreateChecklist, ApiError> {
    let mut errors = ValidationErrors::new();
    let attributes = data_attributes(body, &mut errors);
    if attributes.is_object() {
        check_fields(attributes, CHECKLIST_CREATE, "data.attributes", &mut errors);
        check_due_window(attributes, "data.attributes", now, None, &mut errors);
        if attributes.get("items").is_some_and(Value::is_array) {
            let items = require_non_empty_array(attributes, "items", "data.attributes", &mut errors);
            for (index, item) in items.iter().enumerate() {
                if !item.as_str().is_some_and(|text| !text.trim().is_empty()) {
                    errors.add(
                        format!("data.attributes.items.{index}"),
                        "must be a non-empty string",
                    );
                }
            }
        }
    }
    errors.into_result()?;
    decode::<CreateChecklistPayload>(attributes, "data.attributes").map(Into::into)
}

fn validate_update(body: &Value, now: DateTime<Utc>) -> Result<UpdateChecklist, ApiError> {
    let mut errors = ValidationErrors::new();
    let attributes = data_attributes(body, &mut errors);
    if attributes.is_object() {
        check_fields(attributes, CHECKLIST_UPDATE, "data.attributes", &mut errors);
        check_due_window(attributes, "data.attributes", now, None, &mut errors);
    }
    errors.into_result()?;
    decode::<UpdateChecklistPayload>(attributes, "data.attributes").map(Into::into)
}

pub async fn list_checklists(
    State(state): State<AppState>,
    params: ListParams,
) -> Result<Json<CollectionDocument<Resource<ChecklistAttributes>>>, ApiError> {
    let pool = &state.db().pool;
    let page = Checklist::find_page(pool, &params.query).await?;
    let total = page.total;
    let entries = Checklist::with_items(pool, page.records).await?;

    let urls = state.urls();
    let data: Vec<_> = entries
        .iter()
        .map(|entry| urls.checklist_resource(entry, params.include_items))
        .collect();
    Ok(Json(CollectionDocument {
        meta: Meta {
            count: data.len(),
            total,
        },
        links: Some(urls.page_links("/checklists", &params.query, params.include_items, total)),
        includes: None,
        data,
    }))
}

pub async fn create_checklist(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    JsonBody(body): JsonBody,
) -> Result<(StatusCode, Json<ChecklistDocument>), ApiError> {
    let now = Utc::now();
    let data = validate_create(&body, now)?;

    let tx = state.db().pool.begin().await?;
    let created = Checklist::create(&tx, &data, principal.user_id, now).await?;
    tx.commit().await?;

    tracing::info!(
        checklist_id = created.checklist.id,
        items = created.items.len(),
        "created checklist"
    );
    let resource = state.urls().checklist_resource(&created, true);
    Ok((StatusCode::CREATED, Json(Document::new(resource))))
}

pub async fn get_checklist(
    State(state): State<AppState>,
    Extension(checklist): Extension<Checklist>,
    Query(include): Query<IncludeQuery>,
) -> Result<Json<ChecklistDocument>, ApiError> {
    let entry = checklist.load_items(&state.db().pool).await?;
    let resource = state.urls().checklist_resource(&entry, include.items());
    Ok(Json(Document::new(resource)))
}

pub async fn update_checklist(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Extension(existing): Extension<Checklist>,
    JsonBody(body): JsonBody,
) -> Result<Json<ChecklistDocument>, ApiError> {
    let data = validate_update(&body, Utc::now())?;

    let tx = state.db().pool.begin().await?;
    let checklist = Checklist::update(&tx, existing.id, &data, principal.user_id).await?;
    let entry = checklist.load_items(&tx).await?;
    tx.commit().await?;

    Ok(Json(Document::new(state.urls().checklist_resource(&entry, false))))
}

pub async fn delete_checklist(
    State(state): State<AppState>,
    Extension(existing): Extension<Checklist>,
) -> Result<StatusCode, ApiError> {
    let tx = state.db().pool.begin().await?;
    let rows_affected = Checklist::delete(&tx, existing.id).await?;
    tx.commit().await?;

    if rows_affected == 0 {
        return Err(ApiError::not_found());
    }
    tracing::info!(checklist_id = existing.id, "deleted checklist");
    Ok(StatusCode::NO_CONTENT)
}

pub fn router(state: &AppState) -> Router<AppState> {
    let checklist_router = Router::new()
        .route(
            "/checklists/{checklist_id}",
            get(get_checklist)
                .patch(update_checklist)
                .delete(delete_checklist),
        )
        .route_layer(from_fn_with_state(state.clone(), load_checklist_middleware));

    Router::new()
        .route("/checklists", get(list_checklists).post(create_checklist))
        .merge(checklist_router)
}
