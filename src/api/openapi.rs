//! OpenAPI document for the auth API.

use utoipa::OpenApi;

use super::handlers;

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::health::health,
        handlers::register::register,
        handlers::login::login,
        handlers::oauth::oauth_callback,
        handlers::session::session,
    ),
    components(schemas(
        handlers::RegisterRequest,
        handlers::LoginRequest,
        handlers::AuthResponse,
        handlers::UserResponse,
        handlers::SessionResponse,
        crate::store::Role,
    )),
    tags(
        (name = "auth", description = "Identity and session authentication"),
        (name = "health", description = "Service health"),
    )
)]
pub struct ApiDoc;
