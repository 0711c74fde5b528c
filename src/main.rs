mod catalog;
mod config;
mod http;
mod metrics;
mod models;
mod pipeline;

use axum::{
    Json, Router,
    body::{Body, Bytes},
    extract::State,
    http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{any, get, post},
};
use config::ServerConfig;
use crate::http::{HandlerEvent, HandlerResponse};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use pipeline::{Pipeline, PipelineConfig};
use serde_json::json;
use std::{net::SocketAddr, sync::Arc};
use tower_http::{
    cors::{Any, CorsLayer},
    set_header::SetResponseHeaderLayer,
    trace::TraceLayer,
};
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, fmt};

const OPENAPI_YAML: &str = include_str!("../docs/openapi.yaml");

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        error!(target = "catalog.api", "server crashed: {err}");
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    init_tracing();

    let config = config::SERVER.clone();
    let prometheus_handle = PrometheusBuilder::new().install_recorder()?;
    let state = AppState::new(
        Pipeline::new(PipelineConfig::from_env()),
        prometheus_handle,
        config.clone(),
    );
    let app = router(state);

    let addr: SocketAddr = ([0, 0, 0, 0], config.port).into();
    info!(target = "catalog.api", "listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app.into_make_service()).await?;
    Ok(())
}

#[derive(Clone)]
struct AppState {
    pipeline: Pipeline,
    openapi: Arc<serde_json::Value>,
    prometheus_handle: PrometheusHandle,
    config: Arc<ServerConfig>,
}

impl AppState {
    fn new(pipeline: Pipeline, prometheus_handle: PrometheusHandle, config: ServerConfig) -> Self {
        let openapi = serde_yaml::from_str(OPENAPI_YAML).unwrap_or_else(|err| {
            warn!(target = "catalog.api", error = %err, "embedded openapi document is invalid");
            json!({"openapi": "3.0.3"})
        });
        Self {
            pipeline,
            openapi: Arc::new(openapi),
            prometheus_handle,
            config: Arc::new(config),
        }
    }
}

fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_headers(Any)
        .allow_methods(Any)
        .allow_origin(Any);
    let body_limit = state.config.body_limit;

    // The catalog route answers its own preflight, so it sits outside the CORS
    // layer. Extractor rejections (413, 400) still need the origin header.
    let catalog_origin = SetResponseHeaderLayer::if_not_present(
        header::ACCESS_CONTROL_ALLOW_ORIGIN,
        HeaderValue::from_static(crate::http::ALLOW_ORIGIN),
    );

    Router::new()
        .route("/health", get(health))
        .route("/metrics", get(metrics_endpoint))
        .route("/openapi.json", get(openapi_json))
        .route("/invoke", post(invoke))
        .layer(cors)
        .route("/parse-catalog", any(parse_catalog).layer(catalog_origin))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(axum::extract::DefaultBodyLimit::max(body_limit))
}

/// Health and readiness check.
///
/// - Method: `GET`
/// - Path: `/health`
///
/// Returns a small JSON payload with `status` and `service`.
async fn health() -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "service": "catalog-parser-rs",
    }))
}

async fn openapi_json(State(state): State<AppState>, headers: HeaderMap) -> Response {
    if let Some(key) = &state.config.openapi_key
        && presented(&headers, "X-Docs-Key") != key.as_str()
    {
        return unauthorized();
    }
    Json((*state.openapi).clone()).into_response()
}

async fn metrics_endpoint(State(state): State<AppState>, headers: HeaderMap) -> Response {
    if let Some(secret) = &state.config.metrics_key
        && presented(&headers, "X-Metrics-Key") != secret.as_str()
    {
        return unauthorized();
    }
    let body = state.prometheus_handle.render();
    (
        [("Content-Type", "text/plain; version=0.0.4")],
        body,
    )
        .into_response()
}

/// Parse an uploaded catalog file.
///
/// - Method: `POST` (`OPTIONS` for preflight; anything else gets 405)
/// - Path: `/parse-catalog`
/// - Body: `{ "fileData": "<base64>", "filename": "catalog.csv" }`
/// - Response: the handler envelope's status, headers and JSON body
async fn parse_catalog(
    State(state): State<AppState>,
    method: Method,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    crate::metrics::inc_requests("/parse-catalog");
    let request_id = request_id_from(&headers);
    // Preflight and rejected methods ignore the body, so only POST cares
    // whether it decodes.
    let envelope = match String::from_utf8(body.to_vec()) {
        Err(err) if method == Method::POST => HandlerResponse::invalid_body(err, &request_id),
        decoded => {
            let event = HandlerEvent {
                http_method: method.as_str().to_string(),
                body: decoded.ok(),
            };
            dispatch(state.pipeline.clone(), event, request_id).await
        }
    };
    crate::metrics::response_status("/parse-catalog", envelope.status_code);
    envelope_into_response(envelope)
}

/// Run a raw handler event and return the envelope as JSON.
///
/// - Method: `POST`
/// - Path: `/invoke`
/// - Body: `{ "httpMethod": "POST", "body": "<json string>" }`
async fn invoke(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(event): Json<HandlerEvent>,
) -> Json<HandlerResponse> {
    crate::metrics::inc_requests("/invoke");
    let request_id = request_id_from(&headers);
    let envelope = dispatch(state.pipeline.clone(), event, request_id).await;
    crate::metrics::response_status("/invoke", envelope.status_code);
    Json(envelope)
}

/// Runs the handler off the async workers; a crashed parse becomes a 500.
async fn dispatch(pipeline: Pipeline, event: HandlerEvent, request_id: String) -> HandlerResponse {
    let id = request_id.clone();
    match tokio::task::spawn_blocking(move || crate::http::handle(&pipeline, &event, &id)).await {
        Ok(envelope) => envelope,
        Err(err) => {
            error!(
                target = "catalog.api",
                request_id = %request_id,
                error = %err,
                "handler task failed"
            );
            HandlerResponse::internal(err, &request_id)
        }
    }
}

fn envelope_into_response(envelope: HandlerResponse) -> Response {
    let status = StatusCode::from_u16(envelope.status_code)
        .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let mut response = Response::new(Body::from(envelope.body));
    *response.status_mut() = status;
    for (name, value) in &envelope.headers {
        if let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            response.headers_mut().insert(name, value);
        }
    }
    response
}

fn request_id_from(headers: &HeaderMap) -> String {
    headers
        .get("X-Request-Id")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string())
}

fn presented<'a>(headers: &'a HeaderMap, name: &str) -> &'a str {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
}

fn unauthorized() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(models::ApiError::new("unauthorized")),
    )
        .into_response()
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,tower_http=debug"));
    let _ = fmt().with_env_filter(filter).try_init();
}
