//! Provider gateway interface and shared HTTP plumbing.

use std::future::Future;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;
use tokio::time::{sleep, Duration};
use tracing::{error, warn};

/// Supported federation providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Provider {
    Github,
    Google,
}

impl Provider {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Github => "github",
            Self::Google => "google",
        }
    }

    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "github" => Some(Self::Github),
            "google" => Some(Self::Google),
            _ => None,
        }
    }
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An access grant returned by a provider's token endpoint. The raw token
/// is secret; it is consumed once to fetch the profile and discarded.
pub struct AccessGrant {
    access_token: SecretString,
}

impl AccessGrant {
    #[must_use]
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            access_token: SecretString::from(access_token.into()),
        }
    }

    #[must_use]
    pub fn expose(&self) -> &str {
        self.access_token.expose_secret()
    }
}

/// A provider's view of the authenticated user. Ephemeral: consumed once
/// to resolve or create a local account.
#[derive(Debug, Clone)]
pub struct FederatedProfile {
    pub external_id: String,
    pub email: Option<String>,
    pub display_name: String,
    pub avatar_url: Option<String>,
}

#[derive(Debug, Error)]
pub enum GatewayError {
    /// The provider answered but refused the exchange (bad/expired code,
    /// bad credentials). Not worth retrying.
    #[error("provider rejected the request")]
    Rejected,
    #[error("provider request failed")]
    Http(#[from] reqwest::Error),
    #[error("unexpected provider response")]
    Malformed,
}

/// Narrow interface to an upstream OAuth service.
#[async_trait]
pub trait ProviderGateway: Send + Sync {
    async fn exchange_code(&self, code: &str) -> Result<AccessGrant, GatewayError>;
    async fn fetch_profile(&self, grant: &AccessGrant) -> Result<FederatedProfile, GatewayError>;
}

/// Per-request timeout for outbound provider calls.
pub(crate) const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

const MAX_ATTEMPTS: u32 = 3;

/// Run an outbound call with bounded retries and exponential backoff.
/// A `Rejected` answer is terminal; only transport-level failures retry.
pub(crate) async fn with_retry<T, F, Fut>(operation: &str, mut call: F) -> Result<T, GatewayError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, GatewayError>>,
{
    let mut attempt = 0;
    loop {
        attempt += 1;

        if attempt > 1 {
            let backoff_time = 2u64.pow(attempt - 2);
            warn!("{operation}: backing off for {backoff_time} seconds");
            sleep(Duration::from_secs(backoff_time)).await;
        }

        match call().await {
            Ok(value) => return Ok(value),
            Err(GatewayError::Rejected) => return Err(GatewayError::Rejected),
            Err(err) if attempt >= MAX_ATTEMPTS => {
                error!("{operation}: failed after {MAX_ATTEMPTS} attempts: {err}");
                return Err(err);
            }
            Err(err) => {
                error!("{operation}: {err}");
            }
        }
    }
}
