//! Registration, login, and request-time authorization.

use std::sync::Arc;

use regex::Regex;
use tracing::{debug, error, instrument};

use crate::error::{AuthenticationError, Error, ValidationReason};
use crate::password::CredentialVerifier;
use crate::store::{NewUser, RecordStore, Role, Status, StoreError, User};
use crate::token::{SessionClaims, TokenCodec};

const BEARER_PREFIX: &str = "Bearer ";
const DEFAULT_MIN_PASSWORD_LEN: usize = 8;

/// A user together with a freshly issued session token.
#[derive(Debug, Clone)]
pub struct AuthSession {
    pub user: User,
    pub token: String,
}

/// The outcome of a successful authorization check: the live user record
/// and the verified token claims.
#[derive(Debug, Clone)]
pub struct Authorized {
    pub user: User,
    pub claims: SessionClaims,
}

pub struct IdentityService {
    store: Arc<dyn RecordStore>,
    codec: TokenCodec,
    credentials: CredentialVerifier,
    min_password_len: usize,
}

/// Normalize an email for lookup/uniqueness checks.
pub(crate) fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Basic email format check on already-normalized input.
pub(crate) fn valid_email(email_normalized: &str) -> bool {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").is_ok_and(|regex| regex.is_match(email_normalized))
}

/// Usernames are 3-20 word characters; `\w` is Unicode-aware, so any
/// script's letters and digits qualify alongside underscore.
pub(crate) fn valid_username(username: &str) -> bool {
    Regex::new(r"^\w{3,20}$").is_ok_and(|regex| regex.is_match(username))
}

/// Return the token after the fixed, case-sensitive bearer prefix.
#[must_use]
pub fn extract_bearer(header: &str) -> Option<&str> {
    header
        .strip_prefix(BEARER_PREFIX)
        .filter(|token| !token.is_empty())
}

impl IdentityService {
    #[must_use]
    pub fn new(
        store: Arc<dyn RecordStore>,
        codec: TokenCodec,
        credentials: CredentialVerifier,
    ) -> Self {
        Self {
            store,
            codec,
            credentials,
            min_password_len: DEFAULT_MIN_PASSWORD_LEN,
        }
    }

    #[must_use]
    pub fn with_min_password_len(mut self, len: usize) -> Self {
        self.min_password_len = len;
        self
    }

    /// Create an account and issue a session.
    ///
    /// Validation order is fixed so the first failing field is always the
    /// one reported: username, then email, then password policy.
    ///
    /// # Errors
    ///
    /// [`Error::Validation`] for rejected input, [`Error::Store`] or
    /// [`Error::Internal`] for backend failures.
    #[instrument(skip(self, password))]
    pub async fn register(
        &self,
        username: &str,
        email: &str,
        password: &str,
        role: Role,
    ) -> Result<AuthSession, Error> {
        let username = username.trim();
        if !valid_username(username) {
            return Err(Error::validation("username", ValidationReason::Format));
        }
        if self.store.find_by_username(username).await?.is_some() {
            return Err(Error::validation("username", ValidationReason::Taken));
        }

        let email = normalize_email(email);
        if !valid_email(&email) {
            return Err(Error::validation("email", ValidationReason::Format));
        }
        if self.store.find_by_email(&email).await?.is_some() {
            return Err(Error::validation("email", ValidationReason::Taken));
        }

        if password.chars().count() < self.min_password_len {
            return Err(Error::validation(
                "password",
                ValidationReason::TooShort(self.min_password_len),
            ));
        }

        let password_hash = self.credentials.hash(password).map_err(Error::Internal)?;
        let created = self
            .store
            .create(NewUser {
                username: username.to_string(),
                email,
                password_hash,
                role,
                avatar_url: None,
            })
            .await;

        match created {
            Ok(user) => self.issue_session(user),
            // Lost a race with a concurrent registration; report it the
            // same way the pre-checks would have.
            Err(StoreError::Duplicate { field }) => {
                Err(Error::validation(field, ValidationReason::Taken))
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Authenticate with email and password and issue a session.
    ///
    /// # Errors
    ///
    /// [`AuthenticationError::NotFound`], [`AuthenticationError::Disabled`],
    /// or [`AuthenticationError::BadCredential`], in that order.
    #[instrument(skip(self, password))]
    pub async fn login(&self, email: &str, password: &str) -> Result<AuthSession, Error> {
        let email = normalize_email(email);
        let Some(user) = self.store.find_by_email(&email).await? else {
            return Err(AuthenticationError::NotFound.into());
        };
        if user.status != Status::Active {
            return Err(AuthenticationError::Disabled.into());
        }
        // A federated-only account has an empty stored hash and never
        // verifies, whatever the supplied password.
        if !self.credentials.verify(password, &user.password_hash) {
            return Err(AuthenticationError::BadCredential.into());
        }

        self.issue_session(user)
    }

    /// Verify a token and authorize the subject against `required_roles`.
    ///
    /// The user is re-fetched by id so role and status changes apply
    /// without re-login. Total function: `None` on every failure path, and
    /// callers cannot tell which check failed.
    pub async fn authorize(&self, token: &str, required_roles: &[Role]) -> Option<Authorized> {
        let claims = match self.codec.verify(token) {
            Ok(claims) => claims,
            Err(err) => {
                debug!("token rejected: {err}");
                return None;
            }
        };

        let user = match self.store.find_by_id(claims.sub).await {
            Ok(Some(user)) => user,
            Ok(None) => {
                debug!("token subject {} no longer exists", claims.sub);
                return None;
            }
            Err(err) => {
                error!("failed to load token subject: {err}");
                return None;
            }
        };

        if user.status != Status::Active {
            debug!("token subject {} is not active", user.id);
            return None;
        }
        if !required_roles.is_empty() && !required_roles.contains(&user.role) {
            debug!("token subject {} lacks a required role", user.id);
            return None;
        }

        Some(Authorized { user, claims })
    }

    /// Issue a session token for an already-resolved user. Used by the
    /// federation flow once an account is matched or created.
    ///
    /// # Errors
    ///
    /// [`Error::Internal`] if signing fails.
    pub fn issue_session(&self, user: User) -> Result<AuthSession, Error> {
        let token = self
            .codec
            .issue(&user)
            .map_err(|err| Error::Internal(err.into()))?;
        Ok(AuthSession { user, token })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use secrecy::SecretString;

    fn service() -> IdentityService {
        IdentityService::new(
            Arc::new(MemoryStore::new()),
            TokenCodec::new(SecretString::from("test-secret")),
            CredentialVerifier::insecure_fast(),
        )
    }

    #[test]
    fn extract_bearer_is_case_sensitive_and_total() {
        assert_eq!(extract_bearer("Bearer abc.def.ghi"), Some("abc.def.ghi"));
        assert_eq!(extract_bearer("bearer abc"), None);
        assert_eq!(extract_bearer("Basic abc"), None);
        assert_eq!(extract_bearer("Bearer "), None);
        assert_eq!(extract_bearer(""), None);
    }

    #[test]
    fn username_format_rules() {
        assert!(valid_username("alice"));
        assert!(valid_username("al_1"));
        assert!(valid_username("переводчик"));
        assert!(!valid_username("al"));
        assert!(!valid_username("a".repeat(21).as_str()));
        assert!(!valid_username("alice!"));
        assert!(!valid_username("a b"));
    }

    #[tokio::test]
    async fn register_then_login_round_trips() {
        let service = service();
        let session = service
            .register("alice", "alice@x.com", "Secret123", Role::User)
            .await
            .unwrap();
        assert_eq!(session.user.username, "alice");
        assert_eq!(session.user.role, Role::User);
        assert_eq!(session.user.balance, 0);

        let session = service.login("alice@x.com", "Secret123").await.unwrap();
        assert_eq!(session.user.username, "alice");
    }

    #[tokio::test]
    async fn register_reports_first_failing_field() {
        let service = service();
        service
            .register("alice", "alice@x.com", "Secret123", Role::User)
            .await
            .unwrap();

        // Duplicate username wins over duplicate email.
        let err = service
            .register("alice", "alice@x.com", "Secret123", Role::User)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Validation {
                field: "username",
                reason: ValidationReason::Taken
            }
        ));

        let err = service
            .register("alice2", "alice@x.com", "Secret123", Role::User)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Validation {
                field: "email",
                reason: ValidationReason::Taken
            }
        ));

        let err = service
            .register("alice2", "alice2@x.com", "short", Role::User)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Validation {
                field: "password",
                reason: ValidationReason::TooShort(8)
            }
        ));
    }

    #[tokio::test]
    async fn register_rejects_malformed_input() {
        let service = service();
        let err = service
            .register("a!", "alice@x.com", "Secret123", Role::User)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Validation {
                field: "username",
                reason: ValidationReason::Format
            }
        ));

        let err = service
            .register("alice", "not-an-email", "Secret123", Role::User)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Validation {
                field: "email",
                reason: ValidationReason::Format
            }
        ));
    }

    #[tokio::test]
    async fn login_failure_order() {
        let store = Arc::new(MemoryStore::new());
        let service = IdentityService::new(
            store.clone(),
            TokenCodec::new(SecretString::from("test-secret")),
            CredentialVerifier::insecure_fast(),
        );

        let err = service.login("ghost@x.com", "pw").await.unwrap_err();
        assert!(matches!(
            err,
            Error::Authentication(AuthenticationError::NotFound)
        ));

        let mut session = service
            .register("alice", "alice@x.com", "Secret123", Role::User)
            .await
            .unwrap();
        let err = service.login("alice@x.com", "wrong-pw").await.unwrap_err();
        assert!(matches!(
            err,
            Error::Authentication(AuthenticationError::BadCredential)
        ));

        session.user.status = Status::Suspended;
        store.update(&session.user).await.unwrap();
        let err = service.login("alice@x.com", "Secret123").await.unwrap_err();
        assert!(matches!(
            err,
            Error::Authentication(AuthenticationError::Disabled)
        ));
    }

    #[tokio::test]
    async fn federated_only_account_never_logs_in() {
        let store = Arc::new(MemoryStore::new());
        let service = IdentityService::new(
            store.clone(),
            TokenCodec::new(SecretString::from("test-secret")),
            CredentialVerifier::insecure_fast(),
        );
        store
            .create(NewUser {
                username: "fed".to_string(),
                email: "fed@x.com".to_string(),
                password_hash: String::new(),
                role: Role::User,
                avatar_url: None,
            })
            .await
            .unwrap();

        for password in ["", "password", "fed", "\0"] {
            let err = service.login("fed@x.com", password).await.unwrap_err();
            assert!(matches!(
                err,
                Error::Authentication(AuthenticationError::BadCredential)
            ));
        }
    }

    #[tokio::test]
    async fn authorize_checks_live_role_and_status() {
        let store = Arc::new(MemoryStore::new());
        let service = IdentityService::new(
            store.clone(),
            TokenCodec::new(SecretString::from("test-secret")),
            CredentialVerifier::insecure_fast(),
        );
        let session = service
            .register("alice", "alice@x.com", "Secret123", Role::User)
            .await
            .unwrap();

        // No role requirement.
        let authorized = service.authorize(&session.token, &[]).await.unwrap();
        assert_eq!(authorized.user.id, session.user.id);
        assert_eq!(authorized.claims.sub, session.user.id);

        // Role requirement not met.
        assert!(service
            .authorize(&session.token, &[Role::Admin])
            .await
            .is_none());

        // Role change applies without re-login: the live record wins over
        // the token snapshot.
        let mut user = session.user.clone();
        user.role = Role::Admin;
        store.update(&user).await.unwrap();
        assert!(service
            .authorize(&session.token, &[Role::Admin])
            .await
            .is_some());

        // Suspension applies immediately too.
        user.status = Status::Suspended;
        store.update(&user).await.unwrap();
        assert!(service.authorize(&session.token, &[]).await.is_none());
    }

    #[tokio::test]
    async fn authorize_rejects_garbage_tokens() {
        let service = service();
        assert!(service.authorize("", &[]).await.is_none());
        assert!(service.authorize("a.b.c", &[]).await.is_none());
        assert!(service.authorize("not a token", &[]).await.is_none());
    }

    // Token failures collapse into None at this boundary; they never
    // surface as an authentication error.
    #[tokio::test]
    async fn authorize_collapses_expired_tokens_to_none() {
        let service = IdentityService::new(
            Arc::new(MemoryStore::new()),
            TokenCodec::new(SecretString::from("test-secret")).with_ttl_seconds(0),
            CredentialVerifier::insecure_fast(),
        );
        let session = service
            .register("alice", "alice@x.com", "Secret123", Role::User)
            .await
            .unwrap();

        // Zero TTL means exp == iat, which is already expired.
        assert!(service.authorize(&session.token, &[]).await.is_none());
    }
}
