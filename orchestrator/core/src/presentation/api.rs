// Copyright (c) 2026 Prism Contributors
// SPDX-License-Identifier: AGPL-3.0

// HTTP API
//
// POST /v1/{parse,analyze,map,generate,validate} run a single stage;
// POST /v1/convert runs all five. Stage errors map to status codes:
// invalid input 400, unreadable or failed generation 502, anything else 500.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::application::pipeline::PipelineFactory;
use crate::domain::agent::{AgentError, AgentSnapshot};
use crate::domain::pipeline::{
    ConversionOptions, ConversionResult, DesignAnalysis, GenerationResult, MappingResult,
    ParsedDesign, PipelineError, ValidationReport,
};
use crate::infrastructure::agent_registry::AgentRegistry;

pub struct AppState {
    pub factory: Arc<PipelineFactory>,
    pub registry: Arc<AgentRegistry>,
}

pub fn app(factory: Arc<PipelineFactory>) -> Router {
    let state = Arc::new(AppState {
        registry: factory.registry().clone(),
        factory,
    });

    Router::new()
        .route("/health", get(health))
        .route("/v1/agents", get(list_agents))
        .route("/v1/parse", post(parse))
        .route("/v1/analyze", post(analyze))
        .route("/v1/map", post(map))
        .route("/v1/generate", post(generate))
        .route("/v1/validate", post(validate))
        .route("/v1/convert", post(convert))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Debug, Serialize)]
pub struct ApiError {
    #[serde(skip)]
    status: StatusCode,
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    stage: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    target: Option<String>,
}

impl From<PipelineError> for ApiError {
    fn from(err: PipelineError) -> Self {
        let status = match &err {
            PipelineError::InvalidInput { .. } => StatusCode::BAD_REQUEST,
            PipelineError::StageFailed { source, .. } => match source {
                AgentError::ResponseParse { .. } | AgentError::Generation(_) => StatusCode::BAD_GATEWAY,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
        };
        Self {
            status,
            error: err.agent_error().to_string(),
            stage: Some(err.stage().to_string()),
            target: err.target().map(str::to_string),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self)).into_response()
    }
}

type ApiResult<T> = Result<Json<T>, ApiError>;

#[derive(Debug, Deserialize)]
pub struct GenerateRequestBody {
    pub mapping: MappingResult,
    #[serde(default)]
    pub options: Option<ConversionOptions>,
}

#[derive(Debug, Deserialize)]
pub struct ConvertRequestBody {
    pub design: Value,
    #[serde(default)]
    pub options: Option<ConversionOptions>,
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok", "version": env!("CARGO_PKG_VERSION") }))
}

async fn list_agents(State(state): State<Arc<AppState>>) -> Json<Vec<AgentSnapshot>> {
    Json(state.registry.snapshots())
}

async fn parse(State(state): State<Arc<AppState>>, Json(design): Json<Value>) -> ApiResult<Arc<ParsedDesign>> {
    let parsed = state.factory.orchestrator().parse(&design).await?;
    Ok(Json(parsed))
}

async fn analyze(
    State(state): State<Arc<AppState>>,
    Json(parsed): Json<ParsedDesign>,
) -> ApiResult<Arc<DesignAnalysis>> {
    let analysis = state.factory.orchestrator().analyze(Arc::new(parsed)).await?;
    Ok(Json(analysis))
}

async fn map(
    State(state): State<Arc<AppState>>,
    Json(analysis): Json<DesignAnalysis>,
) -> ApiResult<Arc<MappingResult>> {
    let mapping = state.factory.orchestrator().map(Arc::new(analysis)).await?;
    Ok(Json(mapping))
}

async fn generate(
    State(state): State<Arc<AppState>>,
    Json(body): Json<GenerateRequestBody>,
) -> ApiResult<Arc<GenerationResult>> {
    let options = body.options.unwrap_or_else(|| state.factory.default_options());
    let generation = state
        .factory
        .orchestrator()
        .generate(Arc::new(body.mapping), options)
        .await?;
    Ok(Json(generation))
}

async fn validate(
    State(state): State<Arc<AppState>>,
    Json(generation): Json<GenerationResult>,
) -> ApiResult<Arc<ValidationReport>> {
    let report = state.factory.orchestrator().validate(Arc::new(generation)).await?;
    Ok(Json(report))
}

async fn convert(
    State(state): State<Arc<AppState>>,
    Json(body): Json<ConvertRequestBody>,
) -> ApiResult<ConversionResult> {
    let options = body.options.unwrap_or_else(|| state.factory.default_options());
    let result = state.factory.orchestrator().convert(&body.design, options).await?;
    Ok(Json(result))
}
