use axum::{
    Extension, Json, Router,
    extract::State,
    http::StatusCode,
    middleware::from_fn_with_state,
    routing::{get, post},
};
use chrono::Utc;
use db::{
    TransactionTrait,
    models::{
        instantiation::{AssignTarget, instantiate},
        template::{Template, TemplateData},
    },
};
use serde_json::Value;

use crate::{
    AppState,
    error::ApiError,
    http::auth::Principal,
    list_params::ListParams,
    middleware::load_template_middleware,
    response::{
        ChecklistAttributes, CollectionDocument, Document, ItemBody, Meta, Resource,
        TemplateResource,
    },
    validation::{
        ASSIGN_TARGET, JsonBody, TEMPLATE, TEMPLATE_CHECKLIST, TEMPLATE_ITEM, ValidationErrors,
        check_fields, check_interval_pair, data_attributes, decode, require_non_empty_array,
    },
};

fn validate_template(body: &Value) -> Result<TemplateData, ApiError> {
    let mut errors = ValidationErrors::new();
    let attributes = data_attributes(body, &mut errors);
    if attributes.is_object() {
        let prefix = "data.attributes";
        check_fields(attributes, TEMPLATE, prefix, &mut errors);

        if let Some(checklist) = attributes.get("checklist").filter(|value| value.is_object()) {
            let prefix = format!("{prefix}.checklist");
            check_fields(checklist, TEMPLATE_CHECKLIST, &prefix, &mut errors);
            check_interval_pair(checklist, &prefix, &mut errors);
        }

        if attributes.get("items").is_some_and(Value::is_array) {
            let items = require_non_empty_array(attributes, "items", prefix, &mut errors);
            for (index, item) in items.iter().enumerate() {
                let prefix = format!("{prefix}.items.{index}");
                check_fields(item, TEMPLATE_ITEM, &prefix, &mut errors);
                check_interval_pair(item, &prefix, &mut errors);
            }
        }
    }
    errors.into_result()?;
    decode(attributes, "data.attributes")
}

fn validate_targets(body: &Value) -> Result<Vec<AssignTarget>, ApiError> {
    let mut errors = ValidationErrors::new();
    let entries = require_non_empty_array(body, "data", "", &mut errors);
    for (index, entry) in entries.iter().enumerate() {
        let prefix = format!("data.{index}.attributes");
        match entry.get("attributes") {
            Some(attributes) => check_fields(attributes, ASSIGN_TARGET, &prefix, &mut errors),
            None => errors.add(prefix, "is required"),
        }
    }
    errors.into_result()?;

    entries
        .iter()
        .enumerate()
        .map(|(index, entry)| decode(&entry["attributes"], &format!("data.{index}.attributes")))
        .collect()
}

pub async fn list_templates(
    State(state): State<AppState>,
    params: ListParams,
) -> Result<Json<CollectionDocument<TemplateResource>>, ApiError> {
    let page = Template::find_page(&state.db().pool, &params.query).await?;
    let urls = state.urls();
    let data: Vec<_> = page
        .records
        .iter()
        .map(|template| urls.template_resource(template))
        .collect();
    Ok(Json(CollectionDocument {
        meta: Meta {
            count: data.len(),
            total: page.total,
        },
        links: Some(urls.page_links("/checklists/templates", &params.query, false, page.total)),
        includes: None,
        data,
    }))
}

pub async fn create_template(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    JsonBody(body): JsonBody,
) -> Result<(StatusCode, Json<Document<TemplateResource>>), ApiError> {
    let data = validate_template(&body)?;

    let tx = state.db().pool.begin().await?;
    let template = Template::create(&tx, &data, principal.user_id).await?;
    tx.commit().await?;

    tracing::info!(template_id = template.id, items = template.items.len(), "created template");
    Ok((
        StatusCode::CREATED,
        Json(Document::new(state.urls().template_resource(&template))),
    ))
}

pub async fn get_template(
    State(state): State<AppState>,
    Extension(template): Extension<Template>,
) -> Json<Document<TemplateResource>> {
    Json(Document::new(state.urls().template_resource(&template)))
}

pub async fn update_template(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Extension(existing): Extension<Template>,
    JsonBody(body): JsonBody,
) -> Result<Json<Document<TemplateResource>>, ApiError> {
    let data = validate_template(&body)?;

    let tx = state.db().pool.begin().await?;
    let template = Template::replace(&tx, existing.id, &data, principal.user_id).await?;
    tx.commit().await?;

    Ok(Json(Document::new(state.urls().template_resource(&template))))
}

pub async fn delete_template(
    State(state): State<AppState>,
    Extension(existing): Extension<Template>,
) -> Result<StatusCode, ApiError> {
    let tx = state.db().pool.begin().await?;
    let rows_affected = Template::delete(&tx, existing.id).await?;
    tx.commit().await?;

    if rows_affected == 0 {
        return Err(ApiError::not_found());
    }
    Ok(StatusCode::NO_CONTENT)
}

pub async fn assign_template(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Extension(template): Extension<Template>,
    JsonBody(body): JsonBody,
) -> Result<(StatusCode, Json<CollectionDocument<Resource<ChecklistAttributes>>>), ApiError> {
    let targets = validate_targets(&body)?;

    let tx = state.db().pool.begin().await?;
    let created = instantiate(&tx, &template, &targets, principal.user_id, Utc::now()).await?;
    tx.commit().await?;

    let urls = state.urls();
    let data: Vec<_> = created
        .iter()
        .map(|entry| urls.checklist_resource(entry, true))
        .collect();
    let includes = created
        .iter()
        .flat_map(|entry| entry.items.iter().map(ItemBody::from))
        .collect();
    Ok((
        StatusCode::CREATED,
        Json(CollectionDocument {
            meta: Meta {
                count: data.len(),
                total: data.len() as u64,
            },
            links: None,
            includes: Some(includes),
            data,
        }),
    ))
}

pub fn router(state: &AppState) -> Router<AppState> {
    let template_router = Router::new()
        .route(
            "/checklists/templates/{template_id}",
            get(get_template)
                .patch(update_template)
                .delete(delete_template),
        )
        .route("/checklists/templates/{template_id}/assigns", post(assign_template))
        .route_layer(from_fn_with_state(state.clone(), load_template_middleware));

    Router::new()
        .route("/checklists/templates", get(list_templates).post(create_template))
        .merge(template_router)
}
