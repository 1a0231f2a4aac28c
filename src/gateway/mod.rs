//! API gateway: rate limiting, offline token checks and request forwarding.

use anyhow::{Context, Result};
use axum::{
    body::Body,
    extract::{ConnectInfo, Extension, State},
    http::{HeaderValue, Request},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use secrecy::SecretString;
use std::{net::SocketAddr, sync::Arc, time::Duration};
use tokio::net::TcpListener;
use tracing::{info, warn};
use url::Url;

pub mod handlers;
pub mod identity;
pub mod notify;
pub mod proxy;
pub mod rate_limit;
pub mod routes;


use self::{
    notify::NotificationHub, proxy::ServiceClient, rate_limit::SlidingWindowLimiter,
    routes::Backend,
};
use crate::{
    error::ApiError,
    server::{cors, shutdown_signal, with_http_layers, Environment},
    token::TokenService,
};

/// Base URLs of the backend services.
#[derive(Clone, Debug)]
pub struct Upstreams {
    pub auth: Url,
    pub billing: Url,
    pub grievance: Url,
}

#[derive(Clone, Debug)]
pub struct GatewayConfig {
    environment: Environment,
    upstreams: Upstreams,
    proxy_timeout: Duration,
    rate_limit_window: Duration,
    rate_limit_max_requests: usize,
    trust_forwarded_for: bool,
    admin_token: Option<SecretString>,
}

impl GatewayConfig {
    #[must_use]
    pub fn new(environment: Environment, upstreams: Upstreams) -> Self {
        Self {
            environment,
            upstreams,
            proxy_timeout: Duration::from_secs(30),
            rate_limit_window: Duration::from_secs(60),
            rate_limit_max_requests: 100,
            trust_forwarded_for: false,
            admin_token: None,
        }
    }

    #[must_use]
    pub fn with_proxy_timeout(mut self, timeout: Duration) -> Self {
        self.proxy_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_rate_limit(mut self, window: Duration, max_requests: usize) -> Self {
        self.rate_limit_window = window;
        self.rate_limit_max_requests = max_requests;
        self
    }

    #[must_use]
    pub fn with_trust_forwarded_for(mut self, trust: bool) -> Self {
        self.trust_forwarded_for = trust;
        self
    }

    #[must_use]
    pub fn with_admin_token(mut self, token: Option<SecretString>) -> Self {
        self.admin_token = token;
        self
    }

    #[must_use]
    pub fn environment(&self) -> Environment {
        self.environment
    }

    #[must_use]
    pub fn upstream(&self, backend: Backend) -> &Url {
        match backend {
            Backend::Auth => &self.upstreams.auth,
            Backend::Billing => &self.upstreams.billing,
            Backend::Grievance => &self.upstreams.grievance,
        }
    }

    #[must_use]
    pub fn proxy_timeout(&self) -> Duration {
        self.proxy_timeout
    }

    #[must_use]
    pub fn rate_limit_window(&self) -> Duration {
        self.rate_limit_window
    }

    #[must_use]
    pub fn rate_limit_max_requests(&self) -> usize {
        self.rate_limit_max_requests
    }

    #[must_use]
    pub fn trust_forwarded_for(&self) -> bool {
        self.trust_forwarded_for
    }

    #[must_use]
    pub fn admin_token(&self) -> Option<&SecretString> {
        self.admin_token.as_ref()
    }
}

pub struct GatewayState {
    config: GatewayConfig,
    tokens: TokenService,
    limiter: Arc<SlidingWindowLimiter>,
    client: ServiceClient,
    hub: Arc<NotificationHub>,
}

impl GatewayState {
    /// # Errors
    /// Returns an error if the outbound HTTP client cannot be built
    pub fn new(config: GatewayConfig, tokens: TokenService) -> Result<Self, reqwest::Error> {
        let client = ServiceClient::new(config.proxy_timeout())?;
        let limiter = Arc::new(SlidingWindowLimiter::new(
            config.rate_limit_window(),
            config.rate_limit_max_requests(),
        ));

        Ok(Self {
            config,
            tokens,
            limiter,
            client,
            hub: Arc::new(NotificationHub::new()),
        })
    }

    #[must_use]
    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    #[must_use]
    pub fn tokens(&self) -> &TokenService {
        &self.tokens
    }

    #[must_use]
    pub fn limiter(&self) -> &Arc<SlidingWindowLimiter> {
        &self.limiter
    }

    #[must_use]
    pub fn client(&self) -> &ServiceClient {
        &self.client
    }

    #[must_use]
    pub fn hub(&self) -> &Arc<NotificationHub> {
        &self.hub
    }
}

fn first_header<'a>(request: &'a Request<Body>, name: &str) -> Option<&'a str> {
    request
        .headers()
        .get(name)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

/// Address the rate limiter counts against.
fn client_key(request: &Request<Body>, trust_forwarded_for: bool) -> String {
    if trust_forwarded_for {
        if let Some(address) = first_header(request, "x-forwarded-for")
            .or_else(|| first_header(request, "x-real-ip"))
        {
            return address.to_string();
        }
    }

    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map_or_else(
            || "unknown".to_string(),
            |ConnectInfo(address)| address.ip().to_string(),
        )
}

async fn rate_limit(
    State(state): State<Arc<GatewayState>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let client = client_key(&request, state.config().trust_forwarded_for());
    if !state.limiter().check(&client) {
        warn!(client, "Rate limit exceeded");
        return ApiError::RateLimited.into_response();
    }
    next.run(request).await
}

/// Routes with state attached, without the tracing and CORS layers.
pub fn router(state: Arc<GatewayState>) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/api/health", get(handlers::api_health))
        .route("/admin/broadcast", post(handlers::broadcast))
        .route("/admin/clients", get(handlers::clients))
        .route("/ws", get(notify::ws_handler))
        .fallback(proxy::forward)
        .layer(middleware::from_fn_with_state(state.clone(), rate_limit))
        .layer(Extension(state))
}

/// Start the gateway
/// # Errors
/// Return error if the listener cannot be bound or the server fails
pub async fn new(
    port: u16,
    state: Arc<GatewayState>,
    cors_origins: Vec<HeaderValue>,
) -> Result<()> {
    let config = state.config();
    info!(
        environment = %config.environment(),
        auth = %config.upstream(Backend::Auth),
        billing = %config.upstream(Backend::Billing),
        grievance = %config.upstream(Backend::Grievance),
        "Gateway configuration"
    );

    let sweeper = state.limiter().spawn_sweeper(config.rate_limit_window());

    let app = with_http_layers(router(state), cors(cors_origins));

    let listener = TcpListener::bind(format!("::0:{port}"))
        .await
        .with_context(|| format!("Failed to bind port {port}"))?;

    info!("Gateway listening on [::]:{}", port);
    info!("WebSocket notifications enabled on /ws");

    let served = axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await;

    sweeper.abort();
    served?;

    Ok(())
}
