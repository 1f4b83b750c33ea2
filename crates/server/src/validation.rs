//! Request validation driven by static per-entity field tables. Handlers validate the raw
//! JSON body first and only then deserialize it into typed payloads, so every rejection is
//! reported as a 422 with per-field messages.

use std::collections::BTreeMap;

use axum::{
    Json,
    extract::{FromRequest, Request, rejection::JsonRejection},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, de::DeserializeOwned};
use serde_json::Value;

use crate::error::ApiError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    String,
    Integer,
    Boolean,
    Timestamp,
    Array,
    Object,
    /// Accepts a string or an integer, e.g. external object ids.
    StringOrInteger,
    OneOf(&'static [&'static str]),
}

#[derive(Debug, Clone, Copy)]
pub struct FieldRule {
    pub name: &'static str,
    pub ty: FieldType,
    pub required: bool,
}

impl FieldRule {
    pub const fn required(name: &'static str, ty: FieldType) -> Self {
        Self {
            name,
            ty,
            required: true,
        }
    }

    pub const fn optional(name: &'static str, ty: FieldType) -> Self {
        Self {
            name,
            ty,
            required: false,
        }
    }
}

const DUE_UNITS: &[&str] = &["minute", "hour", "day", "week", "month"];

pub const CHECKLIST_CREATE: &[FieldRule] = &[
    FieldRule::required("object_domain", FieldType::String),
    FieldRule::required("object_id", FieldType::StringOrInteger),
    FieldRule::required("description", FieldType::String),
    FieldRule::optional("due", FieldType::Timestamp),
    FieldRule::optional("urgency", FieldType::Integer),
    FieldRule::required("items", FieldType::Array),
    FieldRule::optional("task_id", FieldType::Integer),
];

pub const CHECKLIST_UPDATE: &[FieldRule] = &[
    FieldRule::optional("object_domain", FieldType::String),
    FieldRule::optional("object_id", FieldType::StringOrInteger),
    FieldRule::optional("description", FieldType::String),
    FieldRule::optional("due", FieldType::Timestamp),
    FieldRule::optional("urgency", FieldType::Integer),
];

pub const ITEM_CREATE: &[FieldRule] = &[
    FieldRule::required("description", FieldType::String),
    FieldRule::optional("due", FieldType::Timestamp),
    FieldRule::optional("urgency", FieldType::Integer),
    FieldRule::optional("assignee_id", FieldType::Integer),
    FieldRule::optional("task_id", FieldType::Integer),
];

pub const ITEM_UPDATE: &[FieldRule] = &[
    FieldRule::optional("description", FieldType::String),
    FieldRule::optional("due", FieldType::Timestamp),
    FieldRule::optional("urgency", FieldType::Integer),
    FieldRule::optional("assignee_id", FieldType::Integer),
    FieldRule::optional("task_id", FieldType::Integer),
];

pub const TEMPLATE: &[FieldRule] = &[
    FieldRule::required("name", FieldType::String),
    FieldRule::required("checklist", FieldType::Object),
    FieldRule::required("items", FieldType::Array),
];

pub const TEMPLATE_CHECKLIST: &[FieldRule] = &[
    FieldRule::required("description", FieldType::String),
    FieldRule::optional("due_interval", FieldType::Integer),
    FieldRule::optional("due_unit", FieldType::OneOf(DUE_UNITS)),
    FieldRule::optional("urgency", FieldType::Integer),
];

pub const TEMPLATE_ITEM: &[FieldRule] = &[
    FieldRule::required("description", FieldType::String),
    FieldRule::optional("due_interval", FieldType::Integer),
    FieldRule::optional("due_unit", FieldType::OneOf(DUE_UNITS)),
    FieldRule::optional("urgency", FieldType::Integer),
    FieldRule::optional("assignee_id", FieldType::Integer),
    FieldRule::optional("task_id", FieldType::Integer),
];

pub const ASSIGN_TARGET: &[FieldRule] = &[
    FieldRule::required("object_domain", FieldType::String),
    FieldRule::required("object_id", FieldType::Integer),
];

pub const COMPLETION_ENTRY: &[FieldRule] = &[FieldRule::required("item_id", FieldType::Integer)];

pub const BULK_UPDATE_ENTRY: &[FieldRule] = &[
    FieldRule::required("id", FieldType::Integer),
    FieldRule::required("action", FieldType::OneOf(&["update"])),
    FieldRule::required("attributes", FieldType::Object),
];

/// Field path to messages, rendered under `errors` in a 422 response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ValidationErrors(BTreeMap<String, Vec<String>>);

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn single(field: impl Into<String>, message: impl Into<String>) -> Self {
        let mut errors = Self::new();
        errors.add(field, message);
        errors
    }

    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.0.entry(field.into()).or_default().push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn messages(&self, field: &str) -> &[String] {
        self.0.get(field).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn into_result(self) -> Result<(), ApiError> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(ApiError::Validation(self))
        }
    }
}

fn join(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{prefix}.{name}")
    }
}

fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|value| value.with_timezone(&Utc))
}

fn type_matches(ty: FieldType, value: &Value) -> bool {
    match ty {
        FieldType::String => value.is_string(),
        FieldType::Integer => value.is_i64(),
        FieldType::Boolean => value.is_boolean(),
        FieldType::Timestamp => value.as_str().and_then(parse_timestamp).is_some(),
        FieldType::Array => value.is_array(),
        FieldType::Object => value.is_object(),
        FieldType::StringOrInteger => value.is_string() || value.is_i64(),
        FieldType::OneOf(allowed) => value.as_str().is_some_and(|v| allowed.contains(&v)),
    }
}

fn type_message(ty: FieldType) -> String {
    match ty {
        FieldType::String => "must be a string".to_string(),
        FieldType::Integer => "must be an integer".to_string(),
        FieldType::Boolean => "must be a boolean".to_string(),
        FieldType::Timestamp => "must be an RFC 3339 timestamp with offset".to_string(),
        FieldType::Array => "must be an array".to_string(),
        FieldType::Object => "must be an object".to_string(),
        FieldType::StringOrInteger => "must be a string or an integer".to_string(),
        FieldType::OneOf(allowed) => format!("must be one of: {}", allowed.join(", ")),
    }
}

/// Checks `value` against `rules`, recording failures under `prefix`. Null counts as
/// absent. Fields not in the table are ignored.
pub fn check_fields(value: &Value, rules: &[FieldRule], prefix: &str, errors: &mut ValidationErrors) {
    let Some(object) = value.as_object() else {
        let field = if prefix.is_empty() { "data" } else { prefix };
        errors.add(field, "must be an object");
        return;
    };
    for rule in rules {
        let field = join(prefix, rule.name);
        match object.get(rule.name) {
            None | Some(Value::Null) => {
                if rule.required {
                    errors.add(field, "is required");
                }
            }
            Some(Value::String(text)) if rule.required && text.trim().is_empty() => {
                errors.add(field, "must not be empty");
            }
            Some(present) => {
                if !type_matches(rule.ty, present) {
                    errors.add(field, type_message(rule.ty));
                }
            }
        }
    }
}

/// `due_interval` and `due_unit` must be given together.
pub fn check_interval_pair(value: &Value, prefix: &str, errors: &mut ValidationErrors) {
    let present = |name: &str| value.get(name).is_some_and(|v| !v.is_null());
    match (present("due_interval"), present("due_unit")) {
        (true, false) => errors.add(join(prefix, "due_unit"), "is required with due_interval"),
        (false, true) => errors.add(join(prefix, "due_interval"), "is required with due_unit"),
        _ => {}
    }
}

/// A directly written due date may not lie in the past nor after the owning checklist's due.
pub fn check_due_window(
    value: &Value,
    prefix: &str,
    now: DateTime<Utc>,
    checklist_due: Option<DateTime<Utc>>,
    errors: &mut ValidationErrors,
) {
    let Some(due) = value.get("due").and_then(Value::as_str).and_then(parse_timestamp) else {
        return;
    };
    let field = join(prefix, "due");
    if due < now {
        errors.add(field.clone(), "must not be in the past");
    }
    if checklist_due.is_some_and(|limit| due > limit) {
        errors.add(field, "must not be after the checklist due date");
    }
}

/// Requires `value[name]` to be a non-empty array and returns its elements.
pub fn require_non_empty_array<'a>(
    value: &'a Value,
    name: &str,
    prefix: &str,
    errors: &mut ValidationErrors,
) -> &'a [Value] {
    match value.get(name).and_then(Value::as_array) {
        Some(entries) if !entries.is_empty() => entries.as_slice(),
        Some(_) => {
            errors.add(join(prefix, name), "must not be empty");
            &[]
        }
        None => {
            errors.add(join(prefix, name), "must be an array");
            &[]
        }
    }
}

/// Returns `body.data.attributes`, recording an error when it is not an object.
pub fn data_attributes<'a>(body: &'a Value, errors: &mut ValidationErrors) -> &'a Value {
    match body.pointer("/data/attributes") {
        Some(attributes) if attributes.is_object() => attributes,
        _ => {
            errors.add("data.attributes", "must be an object");
            &Value::Null
        }
    }
}

/// Deserializes an already validated value.
pub fn decode<T: DeserializeOwned>(value: &Value, field: &str) -> Result<T, ApiError> {
    serde_json::from_value(value.clone())
        .map_err(|err| ApiError::Validation(ValidationErrors::single(field, err.to_string())))
}

/// Distinguishes an absent field (`None`) from an explicit null (`Some(None)`).
pub fn double_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// JSON body extractor whose rejections use the API error envelope.
#[derive(Debug)]
pub struct JsonBody(pub Value);

impl<S> FromRequest<S> for JsonBody
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<Value>::from_request(req, state).await {
            Ok(Json(value)) => Ok(JsonBody(value)),
            Err(rejection) => Err(json_rejection(rejection)),
        }
    }
}

fn json_rejection(rejection: JsonRejection) -> ApiError {
    ApiError::BadRequest(rejection.body_text())
}
