//! Google OAuth gateway.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use super::provider::{
    with_retry, AccessGrant, FederatedProfile, GatewayError, ProviderGateway, REQUEST_TIMEOUT,
};

const TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const USERINFO_URL: &str = "https://www.googleapis.com/oauth2/v2/userinfo";

pub struct GoogleGateway {
    client: Client,
    client_id: String,
    client_secret: SecretString,
    redirect_uri: String,
}

#[derive(Deserialize)]
struct AccessTokenResponse {
    access_token: Option<String>,
}

#[derive(Deserialize)]
struct GoogleUser {
    id: String,
    email: Option<String>,
    #[serde(default)]
    verified_email: bool,
    name: Option<String>,
    picture: Option<String>,
}

impl GoogleGateway {
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn new(
        client_id: String,
        client_secret: SecretString,
        redirect_uri: String,
    ) -> Result<Self> {
        let client = Client::builder()
            .user_agent(crate::APP_USER_AGENT)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("failed to build google client")?;
        Ok(Self {
            client,
            client_id,
            client_secret,
            redirect_uri,
        })
    }

    async fn request_grant(&self, code: &str) -> Result<AccessGrant, GatewayError> {
        let response = self
            .client
            .post(TOKEN_URL)
            .form(&[
                ("grant_type", "authorization_code"),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.expose_secret()),
                ("redirect_uri", self.redirect_uri.as_str()),
                ("code", code),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(GatewayError::Rejected);
        }

        let body: AccessTokenResponse =
            response.json().await.map_err(|_| GatewayError::Malformed)?;
        match body.access_token {
            Some(token) if !token.is_empty() => Ok(AccessGrant::new(token)),
            _ => Err(GatewayError::Rejected),
        }
    }

    async fn request_profile(&self, grant: &AccessGrant) -> Result<FederatedProfile, GatewayError> {
        let response = self
            .client
            .get(USERINFO_URL)
            .bearer_auth(grant.expose())
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(GatewayError::Rejected);
        }

        let user: GoogleUser = response.json().await.map_err(|_| GatewayError::Malformed)?;

        // Only a verified address may link accounts.
        let email = user
            .email
            .filter(|email| !email.is_empty() && user.verified_email);
        let display_name = user
            .name
            .filter(|name| !name.trim().is_empty())
            .unwrap_or_else(|| user.id.clone());

        Ok(FederatedProfile {
            external_id: user.id,
            email,
            display_name,
            avatar_url: user.picture,
        })
    }
}

#[async_trait]
impl ProviderGateway for GoogleGateway {
    async fn exchange_code(&self, code: &str) -> Result<AccessGrant, GatewayError> {
        with_retry("google code exchange", || self.request_grant(code)).await
    }

    async fn fetch_profile(&self, grant: &AccessGrant) -> Result<FederatedProfile, GatewayError> {
        with_retry("google profile fetch", || self.request_profile(grant)).await
    }
}
