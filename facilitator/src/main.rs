//! Standalone x402 facilitator server for EVM, Solana and Sui.
//!
//! This binary serves [`FacilitatorLocal`] over HTTP. Every enabled network is
//! verified and settled by the same process; which ones are enabled comes from
//! the environment.
//!
//! # Endpoints
//!
//! - `POST /verify`    - Verify a payment payload
//! - `POST /settle`    - Settle a payment on-chain
//! - `GET  /verify`    - Describe the verify body
//! - `GET  /settle`    - Describe the settle body
//! - `GET  /supported` - List supported payment kinds
//! - `GET  /health`    - Health check with the enabled networks
//! - `GET  /metrics`   - Prometheus-format metrics
//!
//! # Configuration
//!
//! - `PORT`              - Server port (default: 4020)
//! - `HOST`              - Bind address (default: 0.0.0.0)
//! - `BIND_ADDR`         - Full `host:port`, takes precedence over `HOST`/`PORT`
//! - `X402_NETWORKS`     - Comma-separated allow-list (default: networks with credentials)
//! - `EVM_PRIVATE_KEY`   - Hex key paying EVM settlement gas
//! - `SVM_PRIVATE_KEY`   - Base58 Solana keypair acting as fee payer
//! - `SUI_PRIVATE_KEY`   - Hex ed25519 seed of the Sui gas sponsor
//! - `RPC_URL_<NETWORK>` - RPC override, e.g. `RPC_URL_BASE_SEPOLIA`

use axum::body::Bytes;
use axum::error_handling::HandleErrorLayer;
use axum::extract::{DefaultBodyLimit, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{Value, json};
use std::env;
use std::fmt::Write;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tower::ServiceBuilder;
use tower::buffer::BufferLayer;
use tower::limit::RateLimitLayer;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use x402_multichain::chain::{ChainConnector, FacilitatorConfig, RpcChainConnector};
use x402_multichain::facilitator::{Facilitator, FacilitatorLocal};
use x402_multichain::proto::{ErrorReason, SettleRequest, SettleResponse, VerifyRequest};

const DEFAULT_PORT: u16 = 4020;
const MAX_BODY_BYTES: usize = 2 * 1024 * 1024;
const RATE_LIMIT_REQUESTS: u64 = 100;
const RATE_LIMIT_WINDOW: Duration = Duration::from_secs(60);

/// How a `/verify` or `/settle` call ended.
#[derive(Clone, Copy)]
enum Outcome {
    Accepted,
    /// The facilitator answered with a rejection or a failed settlement.
    Rejected,
    /// The body did not parse, or the facilitator itself failed.
    Error,
}

/// Request counters of one endpoint.
#[derive(Default)]
struct EndpointMetrics {
    requests: AtomicU64,
    rejected: AtomicU64,
    errors: AtomicU64,
}

impl EndpointMetrics {
    fn record(&self, outcome: Outcome) {
        self.requests.fetch_add(1, Ordering::Relaxed);
        match outcome {
            Outcome::Accepted => {}
            Outcome::Rejected => {
                self.rejected.fetch_add(1, Ordering::Relaxed);
            }
            Outcome::Error => {
                self.errors.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    /// Appends the counters as Prometheus text, named `x402_<endpoint>_*`.
    fn render(&self, endpoint: &str, out: &mut String) {
        let counters = [
            ("requests", "requests received", &self.requests),
            ("rejected", "payments rejected or not settled", &self.rejected),
            ("errors", "malformed bodies and internal failures", &self.errors),
        ];
        for (name, help, counter) in counters {
            let metric = format!("x402_{endpoint}_{name}_total");
            let _ = writeln!(out, "# HELP {metric} Total /{endpoint} {help}.");
            let _ = writeln!(out, "# TYPE {metric} counter");
            let _ = writeln!(out, "{metric} {}", counter.load(Ordering::Relaxed));
        }
    }
}

/// Shared application state.
struct AppState {
    facilitator: FacilitatorLocal<RpcChainConnector>,
    verify: EndpointMetrics,
    settle: EndpointMetrics,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // LOG_LEVEL is used if RUST_LOG is not set
    let log_level = env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&log_level)),
        )
        .init();

    let config = FacilitatorConfig::from_env()?;
    tracing::info!(config = ?config, "Loaded facilitator configuration");
    let connector = RpcChainConnector::new(config);
    if connector.networks().is_empty() {
        tracing::warn!("No networks enabled; set X402_NETWORKS or signing keys");
    }
    for network in connector.networks() {
        tracing::info!(
            network = %network,
            settlement_address = ?connector.settlement_address(network),
            "Network enabled"
        );
    }

    let state = Arc::new(AppState {
        facilitator: FacilitatorLocal::new(connector),
        verify: EndpointMetrics::default(),
        settle: EndpointMetrics::default(),
    });

    let bind_address = bind_address();
    let listener = tokio::net::TcpListener::bind(&bind_address).await?;
    tracing::info!("Listening on {bind_address}");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

/// `BIND_ADDR`, otherwise `HOST:PORT`.
fn bind_address() -> String {
    env::var("BIND_ADDR").unwrap_or_else(|_| {
        let port = env::var("PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(DEFAULT_PORT);
        let host = env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        format!("{host}:{port}")
    })
}

fn router(state: Arc<AppState>) -> Router {
    // RateLimit is not Clone, so BufferLayer wraps it; HandleErrorLayer turns
    // its overload errors into 429 responses.
    let payment_routes = Router::new()
        .route("/verify", get(verify_info_handler).post(verify_handler))
        .route("/settle", get(settle_info_handler).post(settle_handler))
        .layer(
            ServiceBuilder::new()
                .layer(HandleErrorLayer::new(|err: tower::BoxError| async move {
                    tracing::warn!(error = %err, "Rate limit or buffer error");
                    (
                        StatusCode::TOO_MANY_REQUESTS,
                        Json(json!({
                            "error": "rate_limited",
                            "message": "Too many requests. Please try again later.",
                        })),
                    )
                }))
                .layer(BufferLayer::new(256))
                .layer(RateLimitLayer::new(RATE_LIMIT_REQUESTS, RATE_LIMIT_WINDOW)),
        );

    Router::new()
        .route("/", get(root_handler))
        .route("/health", get(health_handler))
        .route("/supported", get(supported_handler))
        .route("/metrics", get(metrics_handler))
        .merge(payment_routes)
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Waits for Ctrl-C, then lets in-flight requests drain.
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for Ctrl-C");
        return;
    }
    tracing::info!("Shutdown signal received, draining connections...");
}

async fn root_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(json!({
        "service": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "x402Version": 1,
        "scheme": "exact",
        "networks": state.facilitator.connector().networks(),
        "endpoints": ["/verify", "/settle", "/supported", "/health", "/metrics"],
    }))
}

async fn health_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "networks": state.facilitator.connector().networks(),
    }))
}

async fn supported_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.facilitator.supported().await {
        Ok(response) => (StatusCode::OK, Json(json!(response))),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": e.to_string() })),
        ),
    }
}

fn body_description(endpoint: &str, action: &str) -> Value {
    json!({
        "endpoint": endpoint,
        "description": format!("POST to {action} x402 payments"),
        "body": {
            "x402Version": "number (optional)",
            "paymentPayload": "PaymentPayload",
            "paymentRequirements": "PaymentRequirements",
        }
    })
}

async fn verify_info_handler() -> impl IntoResponse {
    Json(body_description("/verify", "verify"))
}

async fn settle_info_handler() -> impl IntoResponse {
    Json(body_description("/settle", "settle"))
}

/// Adds `error` to a serialized response object.
fn with_error(mut value: Value, error: String) -> Value {
    if let Some(obj) = value.as_object_mut() {
        obj.insert("error".to_string(), Value::String(error));
    }
    value
}

fn invalid_verify_body(reason: ErrorReason, error: String) -> Json<Value> {
    Json(with_error(
        json!({ "isValid": false, "invalidReason": reason }),
        error,
    ))
}

fn failed_settle_body(reason: ErrorReason, error: String) -> Json<Value> {
    Json(with_error(json!(SettleResponse::failure(reason, "", None)), error))
}

async fn verify_handler(State(state): State<Arc<AppState>>, body: Bytes) -> impl IntoResponse {
    let request = match serde_json::from_slice::<VerifyRequest>(&body) {
        Ok(request) => request,
        Err(e) => {
            state.verify.record(Outcome::Error);
            return (
                StatusCode::BAD_REQUEST,
                invalid_verify_body(ErrorReason::InvalidPayload, e.to_string()),
            );
        }
    };

    match state.facilitator.verify(&request).await {
        Ok(response) => {
            state.verify.record(if response.is_valid() {
                Outcome::Accepted
            } else {
                Outcome::Rejected
            });
            (StatusCode::OK, Json(json!(response)))
        }
        Err(e) => {
            state.verify.record(Outcome::Error);
            tracing::warn!(error = %e, "Verify failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                invalid_verify_body(ErrorReason::UnexpectedVerifyError, e.to_string()),
            )
        }
    }
}

async fn settle_handler(State(state): State<Arc<AppState>>, body: Bytes) -> impl IntoResponse {
    let request = match serde_json::from_slice::<SettleRequest>(&body) {
        Ok(request) => request,
        Err(e) => {
            state.settle.record(Outcome::Error);
            return (
                StatusCode::BAD_REQUEST,
                failed_settle_body(ErrorReason::InvalidPayload, e.to_string()),
            );
        }
    };

    match state.facilitator.settle(&request).await {
        Ok(response) => {
            state.settle.record(if response.success {
                Outcome::Accepted
            } else {
                Outcome::Rejected
            });
            (StatusCode::OK, Json(json!(response)))
        }
        Err(e) => {
            state.settle.record(Outcome::Error);
            tracing::warn!(error = %e, "Settle failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                failed_settle_body(ErrorReason::UnexpectedSettleError, e.to_string()),
            )
        }
    }
}

/// Returns Prometheus-format metrics as plain text.
async fn metrics_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let mut body = String::new();
    state.verify.render("verify", &mut body);
    state.settle.render("settle", &mut body);
    (
        StatusCode::OK,
        [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
        body,
    )
}
