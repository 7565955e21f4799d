use axum::{extract::Extension, http::StatusCode, response::IntoResponse, Json};
use std::sync::Arc;

use super::{error_response, AuthResponse, LoginRequest};
use crate::identity::IdentityService;

#[utoipa::path(
    post,
    path = "/v1/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = AuthResponse),
        (status = 401, description = "Authentication failed", body = String),
    ),
    tag = "auth"
)]
pub async fn login(
    identity: Extension<Arc<IdentityService>>,
    payload: Option<Json<LoginRequest>>,
) -> impl IntoResponse {
    let request: LoginRequest = match payload {
        Some(Json(payload)) => payload,
        None => return (StatusCode::BAD_REQUEST, "Missing payload".to_string()).into_response(),
    };

    match identity.login(&request.email, &request.password).await {
        Ok(session) => (StatusCode::OK, Json(AuthResponse::from(session))).into_response(),
        Err(err) => error_response(&err).into_response(),
    }
}
