//! GitHub OAuth gateway.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{header::ACCEPT, Client};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::json;
use tracing::warn;

use super::provider::{
    with_retry, AccessGrant, FederatedProfile, GatewayError, ProviderGateway, REQUEST_TIMEOUT,
};

const ACCESS_TOKEN_URL: &str = "https://github.com/login/oauth/access_token";
const USER_URL: &str = "https://api.github.com/user";
const EMAILS_URL: &str = "https://api.github.com/user/emails";

pub struct GithubGateway {
    client: Client,
    client_id: String,
    client_secret: SecretString,
}

#[derive(Deserialize)]
struct AccessTokenResponse {
    access_token: Option<String>,
}

#[derive(Deserialize)]
struct GithubUser {
    id: i64,
    login: String,
    name: Option<String>,
    email: Option<String>,
    avatar_url: Option<String>,
}

#[derive(Deserialize)]
struct GithubEmail {
    email: String,
    primary: bool,
    verified: bool,
}

impl GithubGateway {
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn new(client_id: String, client_secret: SecretString) -> Result<Self> {
        let client = Client::builder()
            .user_agent(crate::APP_USER_AGENT)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("failed to build github client")?;
        Ok(Self {
            client,
            client_id,
            client_secret,
        })
    }

    async fn request_grant(&self, code: &str) -> Result<AccessGrant, GatewayError> {
        let response = self
            .client
            .post(ACCESS_TOKEN_URL)
            .header(ACCEPT, "application/json")
            .json(&json!({
                "client_id": self.client_id,
                "client_secret": self.client_secret.expose_secret(),
                "code": code,
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(GatewayError::Rejected);
        }

        let body: AccessTokenResponse =
            response.json().await.map_err(|_| GatewayError::Malformed)?;
        // GitHub reports bad codes with 200 and an error body; no token
        // means no usable grant.
        match body.access_token {
            Some(token) if !token.is_empty() => Ok(AccessGrant::new(token)),
            _ => Err(GatewayError::Rejected),
        }
    }

    async fn request_profile(&self, grant: &AccessGrant) -> Result<FederatedProfile, GatewayError> {
        let response = self
            .client
            .get(USER_URL)
            .bearer_auth(grant.expose())
            .header(ACCEPT, "application/vnd.github+json")
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(GatewayError::Rejected);
        }

        let user: GithubUser = response.json().await.map_err(|_| GatewayError::Malformed)?;

        // The profile email is absent when the user hides it; a scoped
        // secondary call resolves the primary verified address.
        let mut email = user.email.filter(|email| !email.is_empty());
        if email.is_none() {
            email = self.primary_email(grant).await;
        }

        let display_name = user
            .name
            .filter(|name| !name.trim().is_empty())
            .unwrap_or(user.login);

        Ok(FederatedProfile {
            external_id: user.id.to_string(),
            email,
            display_name,
            avatar_url: user.avatar_url,
        })
    }

    /// Best effort: a failure here only means no email, which the caller
    /// turns into its own error.
    async fn primary_email(&self, grant: &AccessGrant) -> Option<String> {
        let response = self
            .client
            .get(EMAILS_URL)
            .bearer_auth(grant.expose())
            .header(ACCEPT, "application/vnd.github+json")
            .send()
            .await;

        let response = match response {
            Ok(response) if response.status().is_success() => response,
            Ok(response) => {
                warn!("github emails lookup returned {}", response.status());
                return None;
            }
            Err(err) => {
                warn!("github emails lookup failed: {err}");
                return None;
            }
        };

        let emails: Vec<GithubEmail> = match response.json().await {
            Ok(emails) => emails,
            Err(err) => {
                warn!("github emails response malformed: {err}");
                return None;
            }
        };

        emails
            .iter()
            .find(|entry| entry.primary && entry.verified)
            .or_else(|| emails.iter().find(|entry| entry.verified))
            .map(|entry| entry.email.clone())
    }
}

#[async_trait]
impl ProviderGateway for GithubGateway {
    async fn exchange_code(&self, code: &str) -> Result<AccessGrant, GatewayError> {
        with_retry("github code exchange", || self.request_grant(code)).await
    }

    async fn fetch_profile(&self, grant: &AccessGrant) -> Result<FederatedProfile, GatewayError> {
        with_retry("github profile fetch", || self.request_profile(grant)).await
    }
}
