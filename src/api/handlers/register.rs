use axum::{extract::Extension, http::StatusCode, response::IntoResponse, Json};
use std::sync::Arc;

use super::{error_response, AuthResponse, RegisterRequest};
use crate::identity::IdentityService;
use crate::store::Role;

#[utoipa::path(
    post,
    path = "/v1/auth/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Registration successful", body = AuthResponse),
        (status = 400, description = "Invalid input", body = String),
        (status = 409, description = "Username or email already exists", body = String),
    ),
    tag = "auth"
)]
pub async fn register(
    identity: Extension<Arc<IdentityService>>,
    payload: Option<Json<RegisterRequest>>,
) -> impl IntoResponse {
    let request: RegisterRequest = match payload {
        Some(Json(payload)) => payload,
        None => return (StatusCode::BAD_REQUEST, "Missing payload".to_string()).into_response(),
    };

    let role = request.role.unwrap_or(Role::User);
    match identity
        .register(&request.username, &request.email, &request.password, role)
        .await
    {
        Ok(session) => (StatusCode::CREATED, Json(AuthResponse::from(session))).into_response(),
        Err(err) => error_response(&err).into_response(),
    }
}
