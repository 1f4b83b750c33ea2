use std::{fmt::Display, future::Future};

use axum::{
    extract::{Path, Request, State},
    middleware::Next,
    response::Response,
};
use db::models::{checklist::Checklist, template::Template};
use serde::Deserialize;

use crate::{AppState, error::ApiError};

#[derive(Debug, Deserialize)]
pub struct ChecklistPath {
    pub checklist_id: i64,
}

#[derive(Debug, Deserialize)]
pub struct TemplatePath {
    pub template_id: i64,
}

async fn fetch_model_or_error<M, E, Fut>(
    model_name: &'static str,
    model_id: i64,
    load_future: Fut,
) -> Result<M, ApiError>
where
    E: Display,
    Fut: Future<Output = Result<Option<M>, E>>,
{
    match load_future.await {
        Ok(Some(model)) => Ok(model),
        Ok(None) => {
            tracing::warn!("{model_name} {model_id} not found");
            Err(ApiError::not_found())
        }
        Err(error) => {
            tracing::error!("Failed to fetch {model_name} {model_id}: {error}");
            Err(ApiError::Internal(error.to_string()))
        }
    }
}

async fn load_request_extension<M, E, Fut>(
    request: Request,
    next: Next,
    model_name: &'static str,
    model_id: i64,
    load_future: Fut,
) -> Result<Response, ApiError>
where
    M: Clone + Send + Sync + 'static,
    E: Display,
    Fut: Future<Output = Result<Option<M>, E>>,
{
    let model = fetch_model_or_error(model_name, model_id, load_future).await?;
    let mut request = request;
    request.extensions_mut().insert(model);
    Ok(next.run(request).await)
}

pub async fn load_checklist_middleware(
    State(state): State<AppState>,
    Path(path): Path<ChecklistPath>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    load_request_extension(
        request,
        next,
        "Checklist",
        path.checklist_id,
        Checklist::find_by_id(&state.db().pool, path.checklist_id),
    )
    .await
}

pub async fn load_template_middleware(
    State(state): State<AppState>,
    Path(path): Path<TemplatePath>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    load_request_extension(
        request,
        next,
        "Template",
        path.template_id,
        Template::find_by_id(&state.db().pool, path.template_id),
    )
    .await
}
