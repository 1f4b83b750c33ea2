use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::{AppState, config::AccessControlMode, error::ApiError};

/// The user on whose behalf a request acts; stamped into audit fields on every write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Principal {
    pub user_id: i64,
}

fn parse_authorization_bearer(value: &str) -> Option<&str> {
    let trimmed = value.trim();
    let (prefix, rest) = trimmed.split_once(' ')?;
    if !prefix.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = rest.trim();
    if token.is_empty() {
        return None;
    }
    Some(token)
}

fn extract_request_token(req: &Request) -> Option<String> {
    // 1) Authorization: Bearer <token>
    if let Some(value) = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(parse_authorization_bearer)
    {
        return Some(value.to_string());
    }

    // 2) X-API-Token: <token>
    req.headers()
        .get("x-api-token")
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

pub async fn require_api_auth(State(state): State<AppState>, mut req: Request, next: Next) -> Response {
    let access_control = &state.config().access_control;

    let principal = match access_control.mode {
        AccessControlMode::Disabled => Principal {
            user_id: access_control.anonymous_user_id,
        },
        AccessControlMode::Token => {
            let presented = extract_request_token(&req);
            match presented.as_deref().and_then(|token| access_control.user_for_token(token)) {
                Some(user_id) => Principal { user_id },
                None => {
                    let reason = if presented.is_none() {
                        "missing_token"
                    } else {
                        "token_mismatch"
                    };
                    tracing::warn!(
                        path = %req.uri().path(),
                        method = %req.method(),
                        reason,
                        "Unauthorized API request"
                    );
                    return ApiError::Unauthorized.into_response();
                }
            }
        }
    };

    req.extensions_mut().insert(principal);
    next.run(req).await
}

#[cfg(test)]
mod tests {
    use super::parse_authorization_bearer;

    #[test]
    fn bearer_prefix_is_case_insensitive() {
        assert_eq!(parse_authorization_bearer("Bearer abc"), Some("abc"));
        assert_eq!(parse_authorization_bearer("bearer   abc  "), Some("abc"));
        assert_eq!(parse_authorization_bearer("Basic abc"), None);
        assert_eq!(parse_authorization_bearer("Bearer "), None);
    }
}
