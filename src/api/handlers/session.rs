use axum::{
    extract::Extension,
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use std::sync::Arc;

use super::{SessionResponse, UserResponse};
use crate::identity::{extract_bearer, IdentityService};

#[utoipa::path(
    get,
    path = "/v1/auth/session",
    responses(
        (status = 200, description = "Session is active", body = SessionResponse),
        (status = 401, description = "No valid session"),
    ),
    tag = "auth"
)]
pub async fn session(
    headers: HeaderMap,
    identity: Extension<Arc<IdentityService>>,
) -> impl IntoResponse {
    // One uniform rejection for missing, malformed, expired, or revoked-by
    // -status tokens: the boundary does not explain itself.
    let Some(token) = headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(extract_bearer)
    else {
        return StatusCode::UNAUTHORIZED.into_response();
    };

    match identity.authorize(token, &[]).await {
        Some(authorized) => {
            let response = SessionResponse {
                user: UserResponse::from(&authorized.user),
                issued_at: authorized.claims.iat,
                expires_at: authorized.claims.exp,
            };
            (StatusCode::OK, Json(response)).into_response()
        }
        None => StatusCode::UNAUTHORIZED.into_response(),
    }
}
