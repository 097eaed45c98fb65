//! API middleware
//!
//! Contains:
//! - `AppState`, the services shared by every handler
//! - `ApiError`, the JSON error body and its status mapping
//! - Credential extraction and the authentication middleware

use axum::{
    extract::{rejection::JsonRejection, FromRequest, FromRequestParts, Request, State},
    http::{header, request::Parts, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::db::GraphGateway;
use crate::models::{Credentials, User};
use crate::services::{AccountError, AccountService, ListingError, ListingService, SessionManager};

/// Name of the cookie carrying the username
pub const USERNAME_COOKIE: &str = "username";
/// Name of the cookie carrying the session token
pub const TOKEN_COOKIE: &str = "token";

/// Application state containing shared services
#[derive(Clone)]
pub struct AppState {
    pub accounts: Arc<AccountService>,
    pub listings: Arc<ListingService>,
}

impl AppState {
    pub fn new(gateway: Arc<dyn GraphGateway>, sessions: Arc<dyn SessionManager>) -> Self {
        Self {
            accounts: Arc::new(AccountService::new(gateway.clone(), sessions)),
            listings: Arc::new(ListingService::new(gateway)),
        }
    }
}

/// Authenticated user extracted from request, with the credentials that
/// authenticated them
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub user: User,
    pub credentials: Credentials,
}

impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthenticatedUser>()
            .cloned()
            .ok_or_else(|| ApiError::unauthorized("Authentication required"))
    }
}

/// JSON request body whose decode failures answer with a `VALIDATION_ERROR`
#[derive(Debug, Clone)]
pub struct JsonBody<T>(pub T);

impl<S, T> FromRequest<S> for JsonBody<T>
where
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(Self(value)),
            Err(rejection) => {
                tracing::debug!(error = %rejection.body_text(), "request body rejected");
                Err(ApiError::from(rejection))
            }
        }
    }
}

/// Error response for API errors
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiError {
    pub error: ApiErrorDetail,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiErrorDetail {
    pub code: String,
    pub message: String,
}

impl ApiError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: ApiErrorDetail {
                code: code.into(),
                message: message.into(),
            },
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new("UNAUTHORIZED", message)
    }

    pub fn validation_error(message: impl Into<String>) -> Self {
        Self::new("VALIDATION_ERROR", message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new("CONFLICT", message)
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new("UNAVAILABLE", message)
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::new("INTERNAL_ERROR", message)
    }
}

impl From<AccountError> for ApiError {
    fn from(err: AccountError) -> Self {
        match err {
            AccountError::InvalidInput(msg) => ApiError::validation_error(msg),
            AccountError::Unauthorized => ApiError::unauthorized("Invalid credentials or session"),
            AccountError::Conflict(msg) => ApiError::conflict(msg),
            AccountError::Unavailable(msg) => {
                tracing::warn!(%msg, "request failed, store unavailable");
                ApiError::unavailable("Service temporarily unavailable, retry later")
            }
            AccountError::Internal(msg) => {
                tracing::error!(%msg, "internal error");
                ApiError::internal_error("Internal server error")
            }
        }
    }
}

impl From<ListingError> for ApiError {
    fn from(err: ListingError) -> Self {
        match err {
            ListingError::InvalidInput(msg) => ApiError::validation_error(msg),
            ListingError::UnknownListing | ListingError::UnknownUser | ListingError::OwnListing => {
                ApiError::validation_error(err.to_string())
            }
            ListingError::AlreadySold => ApiError::conflict(err.to_string()),
            ListingError::Unavailable(msg) => {
                tracing::warn!(%msg, "request failed, store unavailable");
                ApiError::unavailable("Service temporarily unavailable, retry later")
            }
            ListingError::Internal(msg) => {
                tracing::error!(%msg, "internal error");
                ApiError::internal_error("Internal server error")
            }
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        let message = match rejection {
            JsonRejection::JsonDataError(e) => {
                // Keep serde's field detail, drop axum's prefix
                let detail = e.body_text();
                let detail = detail
                    .split_once(": ")
                    .map(|(_, field)| field.to_string())
                    .unwrap_or(detail);
                format!("Invalid request body: {}", detail)
            }
            JsonRejection::JsonSyntaxError(_) => "Request body is not valid JSON".to_string(),
            JsonRejection::MissingJsonContentType(_) => {
                "Expected a request body with Content-Type: application/json".to_string()
            }
            _ => "Invalid request body".to_string(),
        };
        ApiError::validation_error(message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self.error.code.as_str() {
            "UNAUTHORIZED" => StatusCode::UNAUTHORIZED,
            "VALIDATION_ERROR" => StatusCode::BAD_REQUEST,
            "CONFLICT" => StatusCode::CONFLICT,
            "UNAVAILABLE" => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        (status, Json(self)).into_response()
    }
}

/// Read a cookie value from the request headers
fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|cookies| cookies.split(';'))
        .filter_map(|cookie| cookie.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.to_string())
}

/// Extract session credentials from request headers.
///
/// A bearer `Authorization` header wins over the `username`/`token` cookie
/// pair; a pair with either half missing counts as no credentials.
pub fn extract_credentials(headers: &HeaderMap) -> Option<Credentials> {
    if let Some(auth_header) = headers.get(header::AUTHORIZATION) {
        if let Ok(auth_str) = auth_header.to_str() {
            if let Some(token) = auth_str.strip_prefix("Bearer ") {
                return Some(Credentials::Bearer(token.trim().to_string()));
            }
        }
    }

    let username = cookie_value(headers, USERNAME_COOKIE)?;
    let token = cookie_value(headers, TOKEN_COOKIE)?;
    if username.is_empty() || token.is_empty() {
        return None;
    }
    Some(Credentials::CookiePair { username, token })
}

/// Authentication middleware
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let credentials = extract_credentials(request.headers())
        .ok_or_else(|| ApiError::unauthorized("Missing authentication credentials"))?;

    let user = state.accounts.authenticate(Some(&credentials)).await?;

    request
        .extensions_mut()
        .insert(AuthenticatedUser { user, credentials });
    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(pairs: &[(header::HeaderName, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.append(name.clone(), HeaderValue::from_str(value).unwrap());
        }
        map
    }

    #[test]
    fn test_extract_bearer() {
        let map = headers(&[(header::AUTHORIZATION, "Bearer abc.def.ghi")]);
        assert_eq!(
            extract_credentials(&map),
            Some(Credentials::Bearer("abc.def.ghi".to_string()))
        );
    }

    #[test]
    fn test_extract_cookie_pair() {
        let map = headers(&[(header::COOKIE, "theme=dark; username=alice; token=t0k3n")]);
        assert_eq!(
            extract_credentials(&map),
            Some(Credentials::CookiePair {
                username: "alice".to_string(),
                token: "t0k3n".to_string(),
            })
        );
    }

    #[test]
    fn test_extract_cookie_pair_across_headers() {
        let map = headers(&[
            (header::COOKIE, "username=alice"),
            (header::COOKIE, "token=t0k3n"),
        ]);
        assert!(matches!(
            extract_credentials(&map),
            Some(Credentials::CookiePair { .. })
        ));
    }

    #[test]
    fn test_bearer_wins_over_cookies() {
        let map = headers(&[
            (header::AUTHORIZATION, "Bearer signed"),
            (header::COOKIE, "username=alice; token=opaque"),
        ]);
        assert_eq!(
            extract_credentials(&map),
            Some(Credentials::Bearer("signed".to_string()))
        );
    }

    #[test]
    fn test_half_a_cookie_pair_is_nothing() {
        assert!(extract_credentials(&headers(&[(header::COOKIE, "username=alice")])).is_none());
        assert!(extract_credentials(&headers(&[(header::COOKIE, "token=t")])).is_none());
        assert!(extract_credentials(&headers(&[(header::AUTHORIZATION, "Basic abc")])).is_none());
        assert!(extract_credentials(&HeaderMap::new()).is_none());
    }

    #[test]
    fn test_account_error_status_mapping() {
        let cases = [
            (AccountError::InvalidInput("x".to_string()), StatusCode::BAD_REQUEST),
            (AccountError::Unauthorized, StatusCode::UNAUTHORIZED),
            (AccountError::Conflict("x".to_string()), StatusCode::CONFLICT),
            (AccountError::Unavailable("x".to_string()), StatusCode::SERVICE_UNAVAILABLE),
            (AccountError::Internal("x".to_string()), StatusCode::INTERNAL_SERVER_ERROR),
        ];

        for (err, status) in cases {
            assert_eq!(ApiError::from(err).into_response().status(), status);
        }
    }

    #[test]
    fn test_listing_error_status_mapping() {
        let cases = [
            (ListingError::InvalidInput("x".to_string()), StatusCode::BAD_REQUEST),
            (ListingError::UnknownListing, StatusCode::BAD_REQUEST),
            (ListingError::OwnListing, StatusCode::BAD_REQUEST),
            (ListingError::AlreadySold, StatusCode::CONFLICT),
            (ListingError::Unavailable("x".to_string()), StatusCode::SERVICE_UNAVAILABLE),
            (ListingError::Internal("x".to_string()), StatusCode::INTERNAL_SERVER_ERROR),
        ];

        for (err, status) in cases {
            assert_eq!(ApiError::from(err).into_response().status(), status);
        }
    }

    #[test]
    fn test_internal_details_are_not_exposed() {
        let err = ApiError::from(AccountError::Internal("secret detail".to_string()));
        assert!(!err.error.message.contains("secret detail"));
    }
}
