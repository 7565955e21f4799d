use crate::{
    federation::{FederationService, GithubGateway, GoogleGateway, Provider},
    identity::IdentityService,
    password::CredentialVerifier,
    store::PgStore,
    token::TokenCodec,
};
use anyhow::{anyhow, Context, Result};
use axum::{
    body::Body,
    extract::MatchedPath,
    http::{
        header::{AUTHORIZATION, CONTENT_TYPE},
        HeaderName, HeaderValue, Method, Request,
    },
    routing::{get, post},
    Extension, Router,
};
use secrecy::SecretString;
use sqlx::postgres::PgPoolOptions;
use std::{sync::Arc, time::Duration};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    request_id::PropagateRequestIdLayer,
    set_header::SetRequestHeaderLayer,
    trace::TraceLayer,
};
use tracing::{info, info_span, Span};
use ulid::Ulid;
use url::Url;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

pub(crate) mod handlers;
mod openapi;

pub use openapi::ApiDoc;

/// Credentials for one OAuth provider.
#[derive(Debug, Clone)]
pub struct OAuthClientConfig {
    pub client_id: String,
    pub client_secret: SecretString,
}

/// Everything the server needs beyond the listen port and the DSN.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub token_secret: SecretString,
    pub frontend_url: Option<String>,
    pub github: Option<OAuthClientConfig>,
    pub google: Option<OAuthClientConfig>,
    pub oauth_redirect_url: Option<String>,
}

/// Start the server
/// # Errors
/// Return error if failed to start the server
pub async fn new(port: u16, dsn: String, config: ServerConfig) -> Result<()> {
    // Connect to database
    let pool = PgPoolOptions::new()
        .min_connections(1)
        .max_connections(5)
        .max_lifetime(Duration::from_secs(60 * 2))
        .test_before_acquire(true)
        .connect(&dsn)
        .await
        .context("Failed to connect to database")?;

    let store = Arc::new(PgStore::new(pool));
    let identity = Arc::new(IdentityService::new(
        store.clone(),
        TokenCodec::new(config.token_secret.clone()),
        CredentialVerifier::new(),
    ));

    let mut federation = FederationService::new(store, identity.clone());
    if let Some(github) = &config.github {
        let gateway = GithubGateway::new(github.client_id.clone(), github.client_secret.clone())?;
        federation = federation.with_gateway(Provider::Github, Arc::new(gateway));
    }
    if let Some(google) = &config.google {
        let redirect = config
            .oauth_redirect_url
            .clone()
            .ok_or_else(|| anyhow!("Google OAuth requires --oauth-redirect-url"))?;
        let gateway = GoogleGateway::new(
            google.client_id.clone(),
            google.client_secret.clone(),
            redirect,
        )?;
        federation = federation.with_gateway(Provider::Google, Arc::new(gateway));
    }
    let federation = Arc::new(federation);

    let mut app = router()
        .merge(SwaggerUi::new("/docs").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestHeaderLayer::if_not_present(
                    HeaderName::from_static("x-request-id"),
                    |_req: &_| HeaderValue::from_str(Ulid::new().to_string().as_str()).ok(),
                ))
                .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
                    "x-request-id",
                )))
                .layer(TraceLayer::new_for_http().make_span_with(make_span))
                .layer(Extension(identity))
                .layer(Extension(federation)),
        );

    if let Some(frontend_url) = &config.frontend_url {
        let origin = frontend_origin(frontend_url)?;
        let cors = CorsLayer::new()
            .allow_headers([CONTENT_TYPE, AUTHORIZATION])
            .allow_methods([Method::GET, Method::POST])
            .allow_origin(AllowOrigin::exact(origin))
            .allow_credentials(true);
        app = app.layer(cors);
    }

    let listener = TcpListener::bind(format!("::0:{port}")).await?;

    info!("Listening on [::]:{}", port);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Gracefully shutdown");
        })
        .await?;

    Ok(())
}

/// Build the API router with all documented routes registered.
#[must_use]
pub fn router() -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/v1/auth/register", post(handlers::register))
        .route("/v1/auth/login", post(handlers::login))
        .route(
            "/v1/auth/oauth/:provider/callback",
            get(handlers::oauth_callback),
        )
        .route("/v1/auth/session", get(handlers::session))
}

fn make_span(request: &Request<Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|val| val.to_str().ok())
        .unwrap_or("none");
    let matched_path = request
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| request.uri().path(), MatchedPath::as_str);

    info_span!(
        "http.request",
        http.method = %request.method(),
        http.route = matched_path,
        request_id
    )
}

fn frontend_origin(frontend_base_url: &str) -> Result<HeaderValue> {
    let parsed = Url::parse(frontend_base_url)
        .with_context(|| format!("Invalid frontend base URL: {frontend_base_url}"))?;
    let host = parsed.host_str().ok_or_else(|| {
        anyhow!("Frontend base URL must include a valid host: {frontend_base_url}")
    })?;
    let port = parsed
        .port()
        .map_or_else(String::new, |port| format!(":{port}"));
    let origin = format!("{}://{}{}", parsed.scheme(), host, port);
    HeaderValue::from_str(&origin).context("Failed to build frontend origin header")
}
