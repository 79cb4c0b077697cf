use crate::config::ProxyConfig;
use crate::error::ProxyError;
use crate::logging::{Outcome, RequestRecord, SharedLogger};
use crate::models::{self, ModelsReply};
use crate::proxy;
use crate::translate::nim_types::UpstreamPayload;
use crate::translate::openai_types::{ChatRequest, ErrorResponse};
use crate::translate::request::openai_to_nim;
use crate::translate::response::error_to_openai;

use axum::body::Body;
use axum::extract::State;
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use bytes::Bytes;
use std::sync::Arc;
use std::time::Instant;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

const CHAT_COMPLETIONS: &str = "/v1/chat/completions";
const MODELS: &str = "/v1/models";
const HEALTH: &str = "/health";
const REQUEST_ID_HEADER: &str = "x-request-id";

#[derive(Clone)]
pub struct AppState {
    pub config: ProxyConfig,
    pub client: reqwest::Client,
    pub logger: SharedLogger,
}

pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(handle_root))
        .route(HEALTH, get(handle_health))
        .route(MODELS, get(handle_models))
        .route(CHAT_COMPLETIONS, post(handle_chat_completions))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Per-request bookkeeping shared by the chat completion paths.
struct RequestCtx {
    id: String,
    started: Instant,
    record: RequestRecord,
}

impl RequestCtx {
    fn new(endpoint: &str) -> Self {
        let id = uuid::Uuid::new_v4().to_string();
        Self {
            record: RequestRecord::new(&id, endpoint),
            id,
            started: Instant::now(),
        }
    }

    /// Journal the failure and answer with the normalized error body.
    fn fail(self, logger: &SharedLogger, err: &ProxyError) -> Response {
        let (status, body) = error_to_openai(err);
        self.reject(logger, status, body)
    }

    fn reject(self, logger: &SharedLogger, status: u16, body: ErrorResponse) -> Response {
        logger.record(
            self.record
                .error(body.error.message.clone())
                .finish(status, Outcome::Failed, self.started),
        );
        let status = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        with_request_id((status, Json(body)).into_response(), &self.id)
    }
}

async fn handle_chat_completions(State(state): State<Arc<AppState>>, body: Bytes) -> Response {
    let mut ctx = RequestCtx::new(CHAT_COMPLETIONS);

    // No credential means no upstream call, and no point parsing anything.
    if let Err(e) = state.config.require_api_key() {
        error!(request_id = %ctx.id, "{}", e);
        return ctx.fail(&state.logger, &e);
    }

    let req = match ChatRequest::from_body(&body) {
        Ok(r) => r,
        Err(e) => {
            warn!(request_id = %ctx.id, error = %e, "rejecting unparseable request body");
            let err = ErrorResponse::proxy_error(format!("Invalid request body: {}", e));
            return ctx.reject(&state.logger, 400, err);
        }
    };

    let payload = openai_to_nim(&req, &state.config.upstream.default_model);
    let stream = payload.is_streaming();

    info!(
        request_id = %ctx.id,
        model = %payload.model_name(),
        stream,
        "chat completion request"
    );

    ctx.record = ctx.record.model(payload.model_name()).stream(stream);

    if stream {
        handle_streaming(&state, ctx, &payload).await
    } else {
        handle_non_streaming(&state, ctx, &payload).await
    }
}

async fn handle_non_streaming(state: &AppState, ctx: RequestCtx, payload: &UpstreamPayload) -> Response {
    match proxy::proxy_non_streaming(payload, &state.config, &state.client).await {
        Ok(reply) => {
            state.logger.record(
                ctx.record
                    .bytes(reply.body.len() as u64)
                    .finish(reply.status, Outcome::Ok, ctx.started),
            );
            let status = StatusCode::from_u16(reply.status).unwrap_or(StatusCode::OK);
            let response = Response::builder()
                .status(status)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(reply.body))
                .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response());
            with_request_id(response, &ctx.id)
        }
        Err(e) => {
            error!(request_id = %ctx.id, error = %e, "error proxying request");
            ctx.fail(&state.logger, &e)
        }
    }
}

async fn handle_streaming(state: &AppState, ctx: RequestCtx, payload: &UpstreamPayload) -> Response {
    let record = ctx.record.clone();
    let reply =
        match proxy::proxy_streaming(payload, &state.config, &state.client, &state.logger, record)
            .await
        {
            Ok(r) => r,
            Err(e) => {
                error!(request_id = %ctx.id, error = %e, "error opening upstream stream");
                return ctx.fail(&state.logger, &e);
            }
        };

    // From here on the status is committed; failures only end the body.
    let status = StatusCode::from_u16(reply.status).unwrap_or(StatusCode::OK);
    let response = Response::builder()
        .status(status)
        .header(header::CONTENT_TYPE, "text/event-stream")
        .header(header::CACHE_CONTROL, "no-cache")
        .header(header::CONNECTION, "keep-alive")
        .body(Body::from_stream(reply.chunks))
        .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response());
    with_request_id(response, &ctx.id)
}

async fn handle_models(State(state): State<Arc<AppState>>) -> Response {
    let started = Instant::now();
    let record = RequestRecord::new(uuid::Uuid::new_v4().to_string(), MODELS);

    match models::list_models(&state.config, &state.client).await {
        ModelsReply::Upstream(body) => {
            state
                .logger
                .record(record.bytes(body.len() as u64).finish(200, Outcome::Ok, started));
            Response::builder()
                .status(StatusCode::OK)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body))
                .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
        }
        ModelsReply::Fallback(list) => {
            state
                .logger
                .record(record.error("served fallback list").finish(200, Outcome::Ok, started));
            Json(list).into_response()
        }
    }
}

async fn handle_root() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "OpenAI to NVIDIA NIM Proxy is running",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": [HEALTH, MODELS, CHAT_COMPLETIONS],
    }))
}

async fn handle_health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

fn with_request_id(mut response: Response, id: &str) -> Response {
    if let Ok(value) = HeaderValue::from_str(id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    response
}
