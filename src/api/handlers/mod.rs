//! Request handlers and shared wire types.

pub mod health;
pub use self::health::health;

pub mod register;
pub use self::register::register;

pub mod login;
pub use self::login::login;

pub mod oauth;
pub use self::oauth::oauth_callback;

pub mod session;
pub use self::session::session;

use axum::http::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::error;
use utoipa::ToSchema;

use crate::error::{Error, ValidationReason};
use crate::identity::AuthSession;
use crate::store::{Role, User};

#[derive(Debug, Deserialize, ToSchema)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    /// Requested role; defaults to `user`.
    #[serde(default)]
    pub role: Option<Role>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Public view of a user. The password hash and monetary counters never
/// leave the service through this API.
#[derive(Debug, Serialize, ToSchema)]
pub struct UserResponse {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub role: Role,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
}

impl From<&User> for UserResponse {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            email: user.email.clone(),
            role: user.role,
            avatar_url: user.avatar_url.clone(),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AuthResponse {
    pub user: UserResponse,
    pub token: String,
}

impl From<AuthSession> for AuthResponse {
    fn from(session: AuthSession) -> Self {
        Self {
            user: UserResponse::from(&session.user),
            token: session.token,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SessionResponse {
    pub user: UserResponse,
    pub issued_at: i64,
    pub expires_at: i64,
}

/// Map a service error to a wire response. Backend detail is logged here
/// and replaced with a generic message.
pub(crate) fn error_response(err: &Error) -> (StatusCode, String) {
    match err {
        Error::Validation { field, reason } => {
            let status = match reason {
                ValidationReason::Taken => StatusCode::CONFLICT,
                _ => StatusCode::BAD_REQUEST,
            };
            (status, format!("{field}: {reason}"))
        }
        Error::Authentication(_) => (
            StatusCode::UNAUTHORIZED,
            "Authentication failed".to_string(),
        ),
        Error::Federation(_) => (StatusCode::UNAUTHORIZED, "Federation failed".to_string()),
        Error::Store(inner) => {
            error!("record store failure: {inner:?}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal error".to_string(),
            )
        }
        Error::Internal(inner) => {
            error!("internal failure: {inner:?}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal error".to_string(),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{AuthenticationError, FederationError};

    #[test]
    fn taken_fields_map_to_conflict() {
        let err = Error::Validation {
            field: "username",
            reason: ValidationReason::Taken,
        };
        let (status, body) = error_response(&err);
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body, "username: already taken");
    }

    #[test]
    fn format_errors_map_to_bad_request() {
        let err = Error::Validation {
            field: "email",
            reason: ValidationReason::Format,
        };
        let (status, _) = error_response(&err);
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[test]
    fn auth_and_federation_errors_are_opaque() {
        let (status, body) = error_response(&Error::Authentication(AuthenticationError::Disabled));
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert!(!body.contains("active"));

        let (status, body) = error_response(&Error::Federation(FederationError::NoEmail));
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert!(!body.contains("email"));
    }

    #[test]
    fn internal_errors_hide_detail() {
        let err = Error::Internal(anyhow::anyhow!("dsn=postgres://secret@db"));
        let (status, body) = error_response(&err);
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, "Internal error");
    }

    #[test]
    fn user_response_omits_credentials() {
        let user = User {
            id: 1,
            username: "alice".to_string(),
            email: "alice@x.com".to_string(),
            password_hash: "$argon2id$secret".to_string(),
            role: Role::User,
            status: crate::store::Status::Active,
            avatar_url: None,
            balance: 100,
            total_earnings: 5,
            created_at: 0,
            updated_at: 0,
        };
        let body = serde_json::to_string(&UserResponse::from(&user)).ok();
        let body = body.as_deref().unwrap_or_default();
        assert!(body.contains("alice"));
        assert!(!body.contains("argon2"));
        assert!(!body.contains("balance"));
    }
}
