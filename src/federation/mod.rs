//! OAuth identity federation and account linking.
//!
//! A request walks a fixed ladder: exchange the authorization code, fetch
//! the profile, match or create a local account by email, issue a session.
//! Nothing is written to the record store until account creation, so an
//! early failure leaks no partial state.
//!
//! Creation is idempotent under concurrent callbacks: the store's unique
//! email constraint is the authoritative guard, and losing that race is
//! handled by falling back to the matched-account path.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{error, info, instrument};

use crate::error::{Error, FederationError};
use crate::identity::{normalize_email, AuthSession, IdentityService};
use crate::store::{NewUser, RecordStore, Role, Status, StoreError};

mod github;
mod google;
mod provider;

pub use github::GithubGateway;
pub use google::GoogleGateway;
pub use provider::{AccessGrant, FederatedProfile, GatewayError, Provider, ProviderGateway};

const USERNAME_FALLBACK: &str = "user";
const USERNAME_MAX_CHARS: usize = 15;

/// Ceiling for the collision-resolution loop. The reference behavior was
/// unbounded; a pathological display name under heavy contention now fails
/// with [`FederationError::UsernameExhausted`] instead of spinning.
const MAX_USERNAME_ATTEMPTS: u32 = 50;

/// Attempts at the create-or-match ladder itself. Each retry only happens
/// when a concurrent registration stole the candidate username between the
/// probe and the insert.
const MAX_CREATE_ATTEMPTS: u32 = 3;

pub struct FederationService {
    store: Arc<dyn RecordStore>,
    identity: Arc<IdentityService>,
    gateways: HashMap<Provider, Arc<dyn ProviderGateway>>,
    default_role: Role,
}

/// Keep letters and digits of any script plus underscore, capped at 15
/// characters; an empty result falls back to a fixed base.
fn sanitize_display_name(display_name: &str) -> String {
    let base: String = display_name
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == '_')
        .take(USERNAME_MAX_CHARS)
        .collect();
    if base.is_empty() {
        USERNAME_FALLBACK.to_string()
    } else {
        base
    }
}

impl FederationService {
    #[must_use]
    pub fn new(store: Arc<dyn RecordStore>, identity: Arc<IdentityService>) -> Self {
        Self {
            store,
            identity,
            gateways: HashMap::new(),
            default_role: Role::User,
        }
    }

    #[must_use]
    pub fn with_gateway(mut self, provider: Provider, gateway: Arc<dyn ProviderGateway>) -> Self {
        self.gateways.insert(provider, gateway);
        self
    }

    /// Role assigned to accounts created on first federated contact.
    #[must_use]
    pub fn with_default_role(mut self, role: Role) -> Self {
        self.default_role = role;
        self
    }

    /// Convert an authorization code into a local session, creating an
    /// account on first contact.
    ///
    /// # Errors
    ///
    /// [`FederationError`] variants for provider and linking failures;
    /// [`Error::Store`] for fatal backend errors.
    #[instrument(skip(self, code))]
    pub async fn authenticate(&self, provider: Provider, code: &str) -> Result<AuthSession, Error> {
        let Some(gateway) = self.gateways.get(&provider) else {
            return Err(FederationError::UnknownProvider(provider.to_string()).into());
        };

        // Provider and network detail stays in the logs; callers get one
        // generic federation failure.
        let grant = gateway.exchange_code(code).await.map_err(|err| {
            error!("{provider} code exchange failed: {err}");
            FederationError::ProviderRejected
        })?;
        let profile = gateway.fetch_profile(&grant).await.map_err(|err| {
            error!("{provider} profile fetch failed: {err}");
            FederationError::ProviderRejected
        })?;

        let Some(email) = profile.email.as_deref().map(normalize_email) else {
            return Err(FederationError::NoEmail.into());
        };

        match self.store.find_by_email(&email).await? {
            Some(user) => self.matched(user, &profile).await,
            None => self.create_account(&email, &profile).await,
        }
    }

    /// The `AccountMatched` path: gate on status, sync the avatar when the
    /// provider supplies a different one, and issue a session.
    async fn matched(
        &self,
        mut user: crate::store::User,
        profile: &FederatedProfile,
    ) -> Result<AuthSession, Error> {
        if user.status != Status::Active {
            return Err(FederationError::Disabled.into());
        }

        if let Some(avatar_url) = &profile.avatar_url {
            if user.avatar_url.as_deref() != Some(avatar_url.as_str()) {
                user.avatar_url = Some(avatar_url.clone());
                self.store.update(&user).await?;
            }
        }

        self.identity.issue_session(user)
    }

    /// The `AccountCreated` path. A duplicate-email violation means a
    /// concurrent callback won the creation race; fall back to matching
    /// the row it created instead of surfacing an error.
    async fn create_account(
        &self,
        email: &str,
        profile: &FederatedProfile,
    ) -> Result<AuthSession, Error> {
        for _ in 0..MAX_CREATE_ATTEMPTS {
            let username = self.unique_username(&profile.display_name).await?;
            let created = self
                .store
                .create(NewUser {
                    username,
                    email: email.to_string(),
                    // Federated-only accounts carry no password credential.
                    password_hash: String::new(),
                    role: self.default_role,
                    avatar_url: profile.avatar_url.clone(),
                })
                .await;

            match created {
                Ok(user) => {
                    info!("created account {} for federated identity", user.id);
                    return self.identity.issue_session(user);
                }
                Err(StoreError::Duplicate { .. }) => {
                    if let Some(user) = self.store.find_by_email(email).await? {
                        return self.matched(user, profile).await;
                    }
                    // The username, not the email, was stolen; probe again.
                }
                Err(err) => return Err(err.into()),
            }
        }

        Err(Error::Internal(anyhow::anyhow!(
            "gave up creating federated account after {MAX_CREATE_ATTEMPTS} attempts"
        )))
    }

    /// Resolve a free username from a display name by appending an
    /// incrementing suffix. The store is re-probed on every attempt so a
    /// candidate freed or taken mid-loop is observed.
    async fn unique_username(&self, display_name: &str) -> Result<String, Error> {
        let base = sanitize_display_name(display_name);
        for attempt in 0..MAX_USERNAME_ATTEMPTS {
            let candidate = if attempt == 0 {
                base.clone()
            } else {
                format!("{base}{attempt}")
            };
            if self.store.find_by_username(&candidate).await?.is_none() {
                return Ok(candidate);
            }
        }
        Err(FederationError::UsernameExhausted.into())
    }
}
