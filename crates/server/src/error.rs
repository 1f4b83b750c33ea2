use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use db::{
    DbErr,
    models::{checklist::ChecklistError, item::ItemError, template::TemplateError},
    query::QueryError,
};
use serde::Serialize;
use thiserror::Error;

use crate::validation::ValidationErrors;

#[derive(Debug, Error, ts_rs::TS)]
#[ts(type = "string")]
pub enum ApiError {
    #[error(transparent)]
    Checklist(#[from] ChecklistError),
    #[error(transparent)]
    Item(#[from] ItemError),
    #[error(transparent)]
    Template(#[from] TemplateError),
    #[error(transparent)]
    Query(#[from] QueryError),
    #[error(transparent)]
    Database(#[from] DbErr),
    #[error("The given data was invalid.")]
    Validation(ValidationErrors),
    #[error("Unauthorized")]
    Unauthorized,
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    Internal(String),
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    status: u16,
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    errors: Option<ValidationErrors>,
}

impl ApiError {
    pub fn not_found() -> Self {
        ApiError::NotFound("Not Found".to_string())
    }

    fn status_and_type(&self) -> (StatusCode, &'static str) {
        match self {
            ApiError::Checklist(err) => match err {
                ChecklistError::NotFound => (StatusCode::NOT_FOUND, "ChecklistError"),
                ChecklistError::Query(_) => (StatusCode::UNPROCESSABLE_ENTITY, "ChecklistError"),
                ChecklistError::Database(_) => {
                    (StatusCode::INTERNAL_SERVER_ERROR, "ChecklistError")
                }
            },
            ApiError::Item(err) => match err {
                ItemError::NotFound => (StatusCode::NOT_FOUND, "ItemError"),
                ItemError::Query(_) => (StatusCode::UNPROCESSABLE_ENTITY, "ItemError"),
                ItemError::Database(_) => (StatusCode::INTERNAL_SERVER_ERROR, "ItemError"),
            },
            ApiError::Template(err) => match err {
                TemplateError::NotFound => (StatusCode::NOT_FOUND, "TemplateError"),
                TemplateError::Query(_) => (StatusCode::UNPROCESSABLE_ENTITY, "TemplateError"),
                TemplateError::Database(_)
                | TemplateError::DueProjection(_)
                | TemplateError::MissingChecklist(_) => {
                    (StatusCode::INTERNAL_SERVER_ERROR, "TemplateError")
                }
            },
            ApiError::Query(_) => (StatusCode::UNPROCESSABLE_ENTITY, "QueryError"),
            ApiError::Database(db_err) => match db_err {
                DbErr::RecordNotFound(_) => (StatusCode::NOT_FOUND, "DatabaseError"),
                _ => (StatusCode::INTERNAL_SERVER_ERROR, "DatabaseError"),
            },
            ApiError::Validation(_) => (StatusCode::UNPROCESSABLE_ENTITY, "ValidationError"),
            ApiError::Unauthorized => (StatusCode::UNAUTHORIZED, "Unauthorized"),
            ApiError::NotFound(_) => (StatusCode::NOT_FOUND, "NotFound"),
            ApiError::Forbidden(_) => (StatusCode::FORBIDDEN, "ForbiddenError"),
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "BadRequest"),
            ApiError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "InternalError"),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status_code, error_type) = self.status_and_type();

        if status_code.is_server_error() {
            tracing::error!(
                status = %status_code,
                error_type,
                error = %self,
                "API request failed"
            );
        }

        let body = ErrorBody {
            status: status_code.as_u16(),
            error: self.to_string(),
            errors: match self {
                ApiError::Validation(errors) => Some(errors),
                _ => None,
            },
        };
        (status_code, Json(body)).into_response()
    }
}
