use crate::config::Settings;
use crate::gateway::{CompletionApi, CompletionPrompt, GatewayClient, UpstreamReply};
use crate::models::{Fallback, InsightRequest, InsightResponse, Region};
use crate::prompts::{select_module, select_prompt, Category};
use crate::rate_limit::{client_id, RateLimiter};
use crate::validate::validate_payload;
use anyhow::{anyhow, Context, Result};
use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderMap, HeaderName, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use std::{net::SocketAddr, sync::Arc, time::Duration};
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info, warn};

const MAX_BODY_BYTES: usize = 64 * 1024;
const SIMPLIFIED_MAX_TOKENS: u32 = 300;
const DETAILED_MAX_TOKENS: u32 = 600;

const CORS_HEADERS: [(HeaderName, &str); 3] = [
    (header::ACCESS_CONTROL_ALLOW_ORIGIN, "*"),
    (
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        "authorization, x-client-info, apikey, content-type",
    ),
    (header::ACCESS_CONTROL_ALLOW_METHODS, "POST, OPTIONS"),
];

#[derive(Clone)]
pub struct AppState {
    pub gateway: Arc<dyn CompletionApi>,
    pub limiter: Arc<RateLimiter>,
    pub upstream_timeout: Duration,
}

impl AppState {
    pub fn new(
        gateway: Arc<dyn CompletionApi>,
        limiter: RateLimiter,
        upstream_timeout: Duration,
    ) -> Self {
        Self {
            gateway,
            limiter: Arc::new(limiter),
            upstream_timeout,
        }
    }
}

pub async fn run_server(settings: Settings) -> Result<()> {
    let gateway: Arc<dyn CompletionApi> = Arc::new(GatewayClient::new(&settings.gateway)?);
    info!(
        "Forwarding insights to {} (model {})",
        settings.gateway.endpoint, settings.gateway.model
    );
    info!(
        "Rate limit: {} requests per {} seconds per client",
        settings.rate_limit_max,
        settings.rate_limit_window.as_secs()
    );

    let state = AppState::new(
        gateway,
        RateLimiter::new(settings.rate_limit_max, settings.rate_limit_window),
        settings.gateway.timeout,
    );
    let app = build_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], settings.port));
    info!("Listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/ai-interpret", post(handle_insight).options(preflight))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> &'static str {
    "OK"
}

async fn preflight() -> Response {
    (StatusCode::OK, CORS_HEADERS).into_response()
}

async fn handle_insight(State(state): State<AppState>, headers: HeaderMap, body: Body) -> Response {
    let client = client_id(&headers);
    let insight = interpret(&state, &client, body).await;
    (StatusCode::OK, CORS_HEADERS, Json(insight)).into_response()
}

// Every degraded path folds into an `error: true` response.
pub async fn interpret(state: &AppState, client: &str, body: Body) -> InsightResponse {
    let generic = select_module(Category::General, Region::Global);

    if !state.limiter.allow(client).await {
        info!("Rate limit exceeded for {}", client);
        return Fallback::RateLimited.into_response(generic);
    }

    let bytes = match axum::body::to_bytes(body, MAX_BODY_BYTES).await {
        Ok(b) => b,
        Err(e) => {
            warn!("Rejecting insight request: unreadable or oversized body: {}", e);
            return Fallback::InvalidPayload.into_response(generic);
        }
    };

    let payload: serde_json::Value = match serde_json::from_slice(&bytes) {
        Ok(v) => v,
        Err(e) => {
            warn!("Rejecting insight request: invalid JSON body: {}", e);
            return Fallback::InvalidPayload.into_response(generic);
        }
    };

    let request = match validate_payload(&payload) {
        Ok(r) => r,
        Err(e) => {
            warn!("Rejecting insight request: {}", e.reason);
            return Fallback::InvalidPayload.into_response(generic);
        }
    };

    let category = Category::parse(&request.category);
    let module = select_module(category, request.region);
    debug!(
        client = %client,
        calculator = %request.calculator_name,
        category = %request.category,
        region = %request.region,
        "Insight context"
    );

    match request_insight(state, &request, category).await {
        Ok(UpstreamReply::Text(text)) => {
            info!("Generated insight for '{}'", request.calculator_name);
            InsightResponse::success(text, module)
        }
        Ok(UpstreamReply::RateLimited) => {
            warn!(
                "AI gateway rate limited insight for '{}'",
                request.calculator_name
            );
            Fallback::UpstreamBusy.into_response(module)
        }
        Ok(UpstreamReply::QuotaExhausted) => {
            warn!(
                "AI gateway quota exhausted while serving '{}'",
                request.calculator_name
            );
            Fallback::QuotaExhausted.into_response(module)
        }
        Err(err) => {
            error!(
                "Failed to generate insight for '{}': {:?}",
                request.calculator_name, err
            );
            Fallback::Unavailable.into_response(module)
        }
    }
}

async fn request_insight(
    state: &AppState,
    request: &InsightRequest,
    category: Category,
) -> Result<UpstreamReply> {
    let prompt = compose_prompt(request, category)?;
    tokio::time::timeout(state.upstream_timeout, state.gateway.complete(&prompt))
        .await
        .map_err(|_| anyhow!("AI gateway timed out after {:?}", state.upstream_timeout))?
}

pub fn compose_prompt(request: &InsightRequest, category: Category) -> Result<CompletionPrompt> {
    let system = select_prompt(
        category,
        request.region,
        &request.locale,
        &request.currency,
        &request.currency_symbol,
        request.is_simplified,
    );
    let inputs =
        serde_json::to_string_pretty(&request.inputs).context("Failed to serialize inputs")?;
    let results =
        serde_json::to_string_pretty(&request.results).context("Failed to serialize results")?;
    let user = format!(
        "Calculator: {}\nCategory: {}\nRegion: {}\nLocale: {}\nCurrency: {} ({})\n\nInputs:\n{}\n\nResults:\n{}\n\nExplain what these results mean for me.",
        request.calculator_name,
        request.category,
        request.region,
        request.locale,
        request.currency,
        request.currency_symbol,
        inputs,
        results
    );
    let max_tokens = if request.is_simplified {
        SIMPLIFIED_MAX_TOKENS
    } else {
        DETAILED_MAX_TOKENS
    };
    Ok(CompletionPrompt {
        system,
        user,
        max_tokens,
    })
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        let mut term = signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
        term.recv().await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Shutdown signal received (Ctrl+C)");
        }
        _ = terminate => {
            info!("Shutdown signal received (SIGTERM)");
        }
    }
}
