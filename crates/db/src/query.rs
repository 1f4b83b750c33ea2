//! Listing support shared by every collection endpoint: pagination, a single sort key and
//! `field op value` filters resolved against a static per-entity field table.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use sea_orm::{
    ColumnTrait, EntityTrait, QueryFilter, QueryOrder, Select, Value, sea_query::Order,
};
use strum_macros::{Display, EnumString};
use thiserror::Error;

pub const DEFAULT_PAGE_LIMIT: u64 = 10;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum QueryError {
    #[error("unknown field: {0}")]
    UnknownField(String),
    #[error("unknown filter operator: {0}")]
    UnknownOperator(String),
    #[error("operator {op} is not supported on field {field}")]
    UnsupportedOperator { field: String, op: FilterOp },
    #[error("invalid value {value:?} for field {field}")]
    InvalidValue { field: String, value: String },
}

/// Storage type of a listable field; drives how filter values are parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Integer,
    Text,
    Timestamp,
    Boolean,
}

#[derive(Debug, Clone, Copy)]
pub struct FieldSpec<C> {
    pub name: &'static str,
    pub column: C,
    pub kind: FieldKind,
}

impl<C> FieldSpec<C> {
    pub const fn new(name: &'static str, column: C, kind: FieldKind) -> Self {
        Self { name, column, kind }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString, Display)]
pub enum FilterOp {
    #[strum(serialize = "like")]
    Like,
    #[strum(serialize = "!like")]
    NotLike,
    #[strum(serialize = "is")]
    Is,
    #[strum(serialize = "!is")]
    IsNot,
    #[strum(serialize = "in")]
    In,
    #[strum(serialize = "!in")]
    NotIn,
}

impl FilterOp {
    pub fn parse(raw: &str) -> Result<Self, QueryError> {
        FilterOp::from_str(raw).map_err(|_| QueryError::UnknownOperator(raw.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Filter {
    pub field: String,
    pub op: FilterOp,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sort {
    pub field: String,
    pub descending: bool,
}

impl Sort {
    /// `created_at` sorts ascending, `-created_at` descending.
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        let (field, descending) = match raw.strip_prefix('-') {
            Some(rest) => (rest, true),
            None => (raw, false),
        };
        if field.is_empty() {
            return None;
        }
        Some(Self {
            field: field.to_string(),
            descending,
        })
    }

    pub fn as_param(&self) -> String {
        if self.descending {
            format!("-{}", self.field)
        } else {
            self.field.clone()
        }
    }

    fn order(&self) -> Order {
        if self.descending { Order::Desc } else { Order::Asc }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub limit: u64,
    pub offset: u64,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            limit: DEFAULT_PAGE_LIMIT,
            offset: 0,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListQuery {
    pub pagination: Pagination,
    pub sort: Option<Sort>,
    pub filters: Vec<Filter>,
}

#[derive(Debug, Clone)]
pub struct Page<T> {
    pub records: Vec<T>,
    pub total: u64,
}

fn lookup<'a, C>(fields: &'a [FieldSpec<C>], name: &str) -> Result<&'a FieldSpec<C>, QueryError> {
    fields
        .iter()
        .find(|field| field.name == name)
        .ok_or_else(|| QueryError::UnknownField(name.to_string()))
}

fn parse_value(field: &str, kind: FieldKind, raw: &str) -> Result<Value, QueryError> {
    let invalid = || QueryError::InvalidValue {
        field: field.to_string(),
        value: raw.to_string(),
    };
    let raw = raw.trim();
    match kind {
        FieldKind::Text => Ok(Value::from(raw.to_string())),
        FieldKind::Integer => raw.parse::<i64>().map(Value::from).map_err(|_| invalid()),
        FieldKind::Timestamp => DateTime::parse_from_rfc3339(raw)
            .map(|value| Value::from(value.with_timezone(&Utc)))
            .map_err(|_| invalid()),
        FieldKind::Boolean => match raw {
            "true" | "1" => Ok(Value::from(true)),
            "false" | "0" => Ok(Value::from(false)),
            _ => Err(invalid()),
        },
    }
}

fn like_pattern(raw: &str) -> String {
    if raw.contains('%') {
        raw.to_string()
    } else {
        format!("%{raw}%")
    }
}

fn apply_filter<E>(
    select: Select<E>,
    spec: &FieldSpec<E::Column>,
    filter: &Filter,
) -> Result<Select<E>, QueryError>
where
    E: EntityTrait,
    E::Column: Copy,
{
    let column = spec.column;
    let select = match filter.op {
        FilterOp::Like | FilterOp::NotLike => {
            if spec.kind != FieldKind::Text {
                return Err(QueryError::UnsupportedOperator {
                    field: spec.name.to_string(),
                    op: filter.op,
                });
            }
            let pattern = like_pattern(&filter.value);
            if filter.op == FilterOp::Like {
                select.filter(column.like(pattern))
            } else {
                select.filter(column.not_like(pattern))
            }
        }
        FilterOp::Is => select.filter(column.eq(parse_value(spec.name, spec.kind, &filter.value)?)),
        FilterOp::IsNot => {
            select.filter(column.ne(parse_value(spec.name, spec.kind, &filter.value)?))
        }
        FilterOp::In | FilterOp::NotIn => {
            let values = filter
                .value
                .split(',')
                .filter(|part| !part.trim().is_empty())
                .map(|part| parse_value(spec.name, spec.kind, part))
                .collect::<Result<Vec<_>, _>>()?;
            if filter.op == FilterOp::In {
                select.filter(column.is_in(values))
            } else {
                select.filter(column.is_not_in(values))
            }
        }
    };
    Ok(select)
}

/// Applies filters and ordering. Results are always tie-broken by the `id` field so
/// pagination is stable.
pub fn apply_list_query<E>(
    mut select: Select<E>,
    query: &ListQuery,
    fields: &[FieldSpec<E::Column>],
) -> Result<Select<E>, QueryError>
where
    E: EntityTrait,
    E::Column: Copy,
{
    for filter in &query.filters {
        let spec = lookup(fields, &filter.field)?;
        select = apply_filter(select, spec, filter)?;
    }

    if let Some(sort) = &query.sort {
        let spec = lookup(fields, &sort.field)?;
        select = select.order_by(spec.column, sort.order());
    }

    let id = lookup(fields, "id")?;
    Ok(select.order_by(id.column, Order::Asc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::checklist;

    const FIELDS: &[FieldSpec<checklist::Column>] = &[
        FieldSpec::new("id", checklist::Column::Id, FieldKind::Integer),
        FieldSpec::new("description", checklist::Column::Description, FieldKind::Text),
        FieldSpec::new("due", checklist::Column::Due, FieldKind::Timestamp),
    ];

    fn check(query: &ListQuery) -> Result<(), QueryError> {
        apply_list_query(checklist::Entity::find(), query, FIELDS).map(|_| ())
    }

    fn filter(field: &str, op: FilterOp, value: &str) -> Filter {
        Filter {
            field: field.to_string(),
            op,
            value: value.to_string(),
        }
    }

    #[test]
    fn sort_parses_direction_prefix() {
        assert_eq!(
            Sort::parse("-due"),
            Some(Sort {
                field: "due".to_string(),
                descending: true
            })
        );
        assert_eq!(Sort::parse("id").map(|s| s.descending), Some(false));
        assert_eq!(Sort::parse("-"), None);
        assert_eq!(Sort::parse("-urgency").unwrap().as_param(), "-urgency");
    }

    #[test]
    fn filter_operators_parse_negations() {
        assert_eq!(FilterOp::parse("!like").unwrap(), FilterOp::NotLike);
        assert_eq!(FilterOp::parse("in").unwrap(), FilterOp::In);
        assert_eq!(
            FilterOp::parse("between").unwrap_err(),
            QueryError::UnknownOperator("between".to_string())
        );
    }

    #[test]
    fn rejects_unknown_fields() {
        let query = ListQuery {
            sort: Sort::parse("-secret"),
            ..Default::default()
        };
        assert_eq!(
            check(&query).unwrap_err(),
            QueryError::UnknownField("secret".to_string())
        );
    }

    #[test]
    fn rejects_like_on_non_text_fields() {
        let query = ListQuery {
            filters: vec![filter("id", FilterOp::Like, "1")],
            ..Default::default()
        };
        assert!(matches!(
            check(&query),
            Err(QueryError::UnsupportedOperator { .. })
        ));
    }

    #[test]
    fn checks_every_in_value() {
        let query = ListQuery {
            filters: vec![filter("id", FilterOp::In, "1,2,x")],
            ..Default::default()
        };
        assert_eq!(
            check(&query).unwrap_err(),
            QueryError::InvalidValue {
                field: "id".to_string(),
                value: "x".to_string()
            }
        );

        let query = ListQuery {
            filters: vec![filter("due", FilterOp::Is, "2024-01-01T00:00:00+07:00")],
            ..Default::default()
        };
        assert!(check(&query).is_ok());
    }

    #[test]
    fn like_pattern_wraps_plain_values() {
        assert_eq!(like_pattern("nda"), "%nda%");
        assert_eq!(like_pattern("nda%"), "nda%");
    }
}
