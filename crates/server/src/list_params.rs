//! Parses collection query strings: `page[limit]`, `page[offset]`, `sort`, `include` and
//! `filter[field][op]`.

use axum::{extract::FromRequestParts, http::request::Parts};
use db::query::{Filter, FilterOp, ListQuery, Pagination, Sort};
use url::form_urlencoded;

use crate::{AppState, config::PaginationConfig, error::ApiError, validation::ValidationErrors};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListParams {
    pub query: ListQuery,
    pub include_items: bool,
}

fn parse_filter_key(key: &str) -> Option<(&str, &str)> {
    let rest = key.strip_prefix("filter[")?;
    let (field, rest) = rest.split_once("][")?;
    let op = rest.strip_suffix(']')?;
    Some((field, op))
}

/// Counts must fit a signed 64-bit SQL parameter.
fn parse_count(raw: &str) -> Option<u64> {
    raw.trim()
        .parse::<i64>()
        .ok()
        .and_then(|count| u64::try_from(count).ok())
}

impl ListParams {
    pub fn parse(raw_query: &str, pagination: &PaginationConfig) -> Result<Self, ValidationErrors> {
        let mut errors = ValidationErrors::new();
        let mut params = ListParams {
            query: ListQuery {
                pagination: Pagination {
                    limit: pagination.default_limit,
                    offset: 0,
                },
                ..Default::default()
            },
            include_items: false,
        };

        for (key, value) in form_urlencoded::parse(raw_query.as_bytes()) {
            match key.as_ref() {
                "page[limit]" => match parse_count(&value) {
                    Some(limit) if limit > 0 => {
                        params.query.pagination.limit = limit.min(pagination.max_limit);
                    }
                    _ => errors.add("page.limit", "must be a positive integer"),
                },
                "page[offset]" => match parse_count(&value) {
                    Some(offset) => params.query.pagination.offset = offset,
                    None => errors.add("page.offset", "must be a non-negative integer"),
                },
                "sort" => match Sort::parse(&value) {
                    Some(sort) => params.query.sort = Some(sort),
                    None => errors.add("sort", "must name a field"),
                },
                "include" => {
                    for include in value.split(',').map(str::trim) {
                        match include {
                            "items" => params.include_items = true,
                            "" => {}
                            other => errors.add("include", format!("unknown include: {other}")),
                        }
                    }
                }
                other => {
                    let Some((field, op)) = parse_filter_key(other) else {
                        continue;
                    };
                    match FilterOp::parse(op) {
                        Ok(op) => params.query.filters.push(Filter {
                            field: field.to_string(),
                            op,
                            value: value.to_string(),
                        }),
                        Err(err) => errors.add(format!("filter.{field}"), err.to_string()),
                    }
                }
            }
        }

        if errors.is_empty() {
            Ok(params)
        } else {
            Err(errors)
        }
    }
}

impl FromRequestParts<AppState> for ListParams {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let raw = parts.uri.query().unwrap_or_default();
        ListParams::parse(raw, &state.config().pagination).map_err(ApiError::Validation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(raw: &str) -> Result<ListParams, ValidationErrors> {
        ListParams::parse(raw, &PaginationConfig::default())
    }

    #[test]
    fn defaults_without_parameters() {
        let params = parse("").unwrap();
        assert_eq!(params.query.pagination, Pagination { limit: 10, offset: 0 });
        assert!(params.query.sort.is_none());
        assert!(params.query.filters.is_empty());
        assert!(!params.include_items);
    }

    #[test]
    fn parses_bracketed_keys() {
        let params = parse(
            "page%5Blimit%5D=5&page[offset]=15&sort=-due&include=items\
             &filter[description][!like]=draft&filter[id][in]=1,2,3",
        )
        .unwrap();
        assert_eq!(params.query.pagination, Pagination { limit: 5, offset: 15 });
        assert_eq!(params.query.sort.as_ref().map(Sort::as_param), Some("-due".to_string()));
        assert!(params.include_items);
        assert_eq!(
            params.query.filters,
            vec![
                Filter {
                    field: "description".to_string(),
                    op: FilterOp::NotLike,
                    value: "draft".to_string(),
                },
                Filter {
                    field: "id".to_string(),
                    op: FilterOp::In,
                    value: "1,2,3".to_string(),
                },
            ]
        );
    }

    #[test]
    fn limit_is_capped() {
        let params = parse("page[limit]=1000").unwrap();
        assert_eq!(params.query.pagination.limit, 100);
    }

    #[test]
    fn malformed_values_are_reported() {
        let errors = parse("page[limit]=0&page[offset]=-1&filter[id][between]=1&include=owner")
            .unwrap_err();
        assert_eq!(errors.messages("page.limit"), ["must be a positive integer"]);
        assert_eq!(errors.messages("page.offset"), ["must be a non-negative integer"]);
        assert_eq!(errors.messages("filter.id"), ["unknown filter operator: between"]);
        assert_eq!(errors.messages("include"), ["unknown include: owner"]);
    }

    #[test]
    fn counts_beyond_sql_range_are_rejected() {
        let errors = parse("page[offset]=18446744073709551615&page[limit]=9223372036854775808")
            .unwrap_err();
        assert_eq!(errors.messages("page.offset"), ["must be a non-negative integer"]);
        assert_eq!(errors.messages("page.limit"), ["must be a positive integer"]);

        let params = parse("page[offset]=9223372036854775807").unwrap();
        assert_eq!(params.query.pagination.offset, i64::MAX as u64);
    }
}
