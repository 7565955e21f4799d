use axum::{
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use std::sync::Arc;
use utoipa::ToSchema;

use super::{error_response, AuthResponse};
use crate::federation::{FederationService, Provider};

#[derive(Debug, Deserialize, ToSchema)]
pub struct CallbackQuery {
    pub code: String,
}

#[utoipa::path(
    get,
    path = "/v1/auth/oauth/{provider}/callback",
    params(
        ("provider" = String, Path, description = "Federation provider (github, google)"),
        ("code" = String, Query, description = "Authorization code"),
    ),
    responses(
        (status = 200, description = "Federated login successful", body = AuthResponse),
        (status = 400, description = "Unknown provider or missing code", body = String),
        (status = 401, description = "Federation failed", body = String),
    ),
    tag = "auth"
)]
pub async fn oauth_callback(
    Path(provider): Path<String>,
    Query(query): Query<CallbackQuery>,
    federation: Extension<Arc<FederationService>>,
) -> impl IntoResponse {
    let Some(provider) = Provider::parse(&provider) else {
        return (
            StatusCode::BAD_REQUEST,
            format!("Unknown provider: {provider}"),
        )
            .into_response();
    };
    if query.code.is_empty() {
        return (StatusCode::BAD_REQUEST, "Missing code".to_string()).into_response();
    }

    match federation.authenticate(provider, &query.code).await {
        Ok(session) => (StatusCode::OK, Json(AuthResponse::from(session))).into_response(),
        Err(err) => error_response(&err).into_response(),
    }
}
