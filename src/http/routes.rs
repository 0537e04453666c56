//! HTTP routes over the session manager and the prompt orchestrator.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use tower_http::cors::CorsLayer;

use super::errors::ApiError;
use crate::agent_core::{OrchestratorResult, PromptOrchestrator};
use crate::session::SessionManager;

/// Shared state for all handlers.
#[derive(Clone)]
pub struct AppState {
    pub sessions: Arc<SessionManager>,
    /// `None` when no model API key is configured.
    pub orchestrator: Option<Arc<PromptOrchestrator>>,
}

type ApiResult = Result<Json<Value>, ApiError>;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/servers", get(servers))
        .route("/connected_servers", get(connected_servers))
        .route("/connect", post(connect))
        .route("/disconnect", post(disconnect))
        .route("/tools", get(list_tools))
        .route("/tools/{server}/{tool}/call", post(call_tool))
        .route("/prompt", post(prompt))
        .route("/prompts", get(list_prompts))
        .route("/prompts/{server}/{prompt}/execute", post(execute_prompt))
        .route("/resources", get(list_resources))
        .route("/resource/{server}/read", post(read_resource))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

// ─── Request Bodies ──────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ServerQuery {
    server_name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ConnectRequest {
    /// Absent means "connect every configured server".
    server_name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct DisconnectRequest {
    server_name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ArgumentsRequest {
    #[serde(default)]
    arguments: Option<Value>,
}

#[derive(Debug, Deserialize)]
pub struct PromptRequest {
    prompt: String,
    #[serde(default)]
    server_contexts: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
pub struct ReadResourceRequest {
    resource_uri: String,
}

// ─── Handlers ────────────────────────────────────────────────────────────────

async fn health(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "connected_servers": state.sessions.connected_servers().await.len(),
        "model_configured": state.orchestrator.is_some(),
    }))
}

async fn servers(State(state): State<AppState>) -> Json<Value> {
    Json(json!({ "servers": state.sessions.server_statuses().await }))
}

async fn connected_servers(State(state): State<AppState>) -> Json<Value> {
    Json(json!({ "connected_servers": state.sessions.connected_servers().await }))
}

async fn connect(
    State(state): State<AppState>,
    Json(req): Json<ConnectRequest>,
) -> ApiResult {
    match req.server_name {
        Some(name) => {
            let outcome = state.sessions.connect(&name).await?;
            Ok(Json(json!({ "server": name, "status": outcome })))
        }
        None => {
            let report = state.sessions.connect_all().await;
            Ok(Json(json!(report)))
        }
    }
}

async fn disconnect(
    State(state): State<AppState>,
    body: Option<Json<DisconnectRequest>>,
) -> ApiResult {
    let req = body.map(|Json(r)| r).unwrap_or_default();
    let closed = state.sessions.disconnect(req.server_name.as_deref()).await?;
    Ok(Json(json!({ "disconnected": closed })))
}

async fn list_tools(State(state): State<AppState>, Query(q): Query<ServerQuery>) -> ApiResult {
    let listing = state.sessions.list_tools(q.server_name.as_deref()).await?;
    Ok(Json(json!({ "tools": listing.items, "failures": listing.failures })))
}

async fn call_tool(
    State(state): State<AppState>,
    Path((server, tool)): Path<(String, String)>,
    body: Option<Json<ArgumentsRequest>>,
) -> ApiResult {
    let arguments = body
        .and_then(|Json(r)| r.arguments)
        .unwrap_or_else(|| json!({}));
    let result = state.sessions.call_tool(&server, &tool, arguments).await?;
    Ok(Json(json!({ "server": server, "tool": tool, "result": result })))
}

async fn prompt(
    State(state): State<AppState>,
    Json(req): Json<PromptRequest>,
) -> Result<Json<OrchestratorResult>, ApiError> {
    let orchestrator = state.orchestrator.as_ref().ok_or(ApiError::ModelUnavailable)?;
    let result = orchestrator
        .send(&req.prompt, req.server_contexts.as_deref())
        .await?;
    Ok(Json(result))
}

async fn list_prompts(State(state): State<AppState>, Query(q): Query<ServerQuery>) -> ApiResult {
    let listing = state.sessions.list_prompts(q.server_name.as_deref()).await?;
    Ok(Json(json!({ "prompts": listing.items, "failures": listing.failures })))
}

async fn execute_prompt(
    State(state): State<AppState>,
    Path((server, prompt)): Path<(String, String)>,
    body: Option<Json<ArgumentsRequest>>,
) -> ApiResult {
    let arguments = match body.and_then(|Json(r)| r.arguments) {
        Some(Value::Object(map)) => map,
        _ => serde_json::Map::new(),
    };
    let result = state.sessions.get_prompt(&server, &prompt, arguments).await?;
    Ok(Json(json!({ "server": server, "prompt": prompt, "result": result })))
}

async fn list_resources(State(state): State<AppState>, Query(q): Query<ServerQuery>) -> ApiResult {
    let listing = state.sessions.list_resources(q.server_name.as_deref()).await?;
    Ok(Json(json!({ "resources": listing.items, "failures": listing.failures })))
}

async fn read_resource(
    State(state): State<AppState>,
    Path(server): Path<String>,
    Json(req): Json<ReadResourceRequest>,
) -> ApiResult {
    let contents = state.sessions.read_resource(&server, &req.resource_uri).await?;
    Ok(Json(json!({ "server": server, "contents": contents })))
}

// ─── Tests ───────────────────────────────────────────────────────────────────
