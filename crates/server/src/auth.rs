use std::sync::Arc;

use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts, HeaderMap, StatusCode},
    Json,
};
use server_api::{resolve_actor, Actor};
use shared::error::{ApiError, ErrorCode};

use crate::app_state::AppState;

pub(crate) type HttpError = (StatusCode, Json<ApiError>);

pub(crate) fn http_error(err: ApiError) -> HttpError {
    let status = match err.code {
        ErrorCode::Unauthorized => StatusCode::UNAUTHORIZED,
        ErrorCode::Forbidden => StatusCode::FORBIDDEN,
        ErrorCode::NotFound => StatusCode::NOT_FOUND,
        ErrorCode::Validation => StatusCode::BAD_REQUEST,
        ErrorCode::Conflict => StatusCode::CONFLICT,
        ErrorCode::Internal => {
            tracing::error!(message = %err.message, "request failed");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    (status, Json(err))
}

/// The caller identified by the `Authorization: Bearer` header.
pub(crate) struct AuthUser(pub Actor);

#[axum::async_trait]
impl FromRequestParts<Arc<AppState>> for AuthUser {
    type Rejection = HttpError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(&parts.headers).ok_or_else(|| {
            http_error(ApiError::new(
                ErrorCode::Unauthorized,
                "Missing bearer token",
            ))
        })?;
        resolve_actor(&state.api, token)
            .await
            .map(AuthUser)
            .map_err(http_error)
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn bearer_token_requires_scheme_and_value() {
        let mut headers = HeaderMap::new();
        assert_eq!(bearer_token(&headers), None);

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer abc.def"));
        assert_eq!(bearer_token(&headers), Some("abc.def"));

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        assert_eq!(bearer_token(&headers), None);

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("bearer  "));
        assert_eq!(bearer_token(&headers), None);
    }

    #[test]
    fn error_codes_map_to_statuses() {
        let cases = [
            (ErrorCode::Unauthorized, StatusCode::UNAUTHORIZED),
            (ErrorCode::Forbidden, StatusCode::FORBIDDEN),
            (ErrorCode::NotFound, StatusCode::NOT_FOUND),
            (ErrorCode::Validation, StatusCode::BAD_REQUEST),
            (ErrorCode::Conflict, StatusCode::CONFLICT),
            (ErrorCode::Internal, StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (code, status) in cases {
            assert_eq!(http_error(ApiError::new(code, "x")).0, status);
        }
    }
}
