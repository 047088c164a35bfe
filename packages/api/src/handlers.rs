// ABOUTME: Request handlers for session, execution, and file endpoints
// ABOUTME: Thin plumbing; all state-machine logic lives in the sandbox package

use crate::error::ApiError;
use crate::AppState;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::Deserialize;
use serde_json::{json, Value};
use skiff_sandbox::{BackendKind, SandboxError, SandboxHandle};
use tracing::info;

#[derive(Deserialize)]
pub struct CreateSessionRequest {
    #[serde(default)]
    pub agent_config: Value,
    pub environment: String,
    pub backend: BackendKind,
}

pub async fn create_session(
    State(state): State<AppState>,
    Json(request): Json<CreateSessionRequest>,
) -> Result<impl IntoResponse, ApiError> {
    info!("Creating session on {} backend", request.backend);

    let info = state
        .lifecycle
        .start(request.agent_config, &request.environment, request.backend)
        .await?;

    Ok((StatusCode::CREATED, Json(info)))
}

pub async fn get_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let config = state.lifecycle.session_state(&session_id).await?;
    let backend = state.lifecycle.backend_for(&session_id).await;
    let status = if backend.is_some() { "running" } else { "stopped" };

    Ok(Json(json!({
        "session_id": session_id,
        "backend": backend,
        "agent_config": config,
        "status": status,
    })))
}

#[derive(Deserialize)]
pub struct DeleteSessionRequest {
    pub handle: SandboxHandle,
}

pub async fn delete_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Json(request): Json<DeleteSessionRequest>,
) -> Result<impl IntoResponse, ApiError> {
    info!("Deleting session {}", session_id);

    state.lifecycle.stop(&session_id, &request.handle).await;
    Ok(Json(json!({ "status": "deleted" })))
}

#[derive(Deserialize)]
pub struct ExecuteRequest {
    pub session_id: String,
    pub code: String,
    #[serde(default = "default_language")]
    pub language: String,
}

fn default_language() -> String {
    "python".to_string()
}

pub async fn execute_code(
    State(state): State<AppState>,
    Json(request): Json<ExecuteRequest>,
) -> Result<impl IntoResponse, ApiError> {
    info!(
        "Executing {} code for session {}",
        request.language, request.session_id
    );

    let output = state
        .sandboxes
        .execute(&request.session_id, &request.code)
        .await?;
    Ok(Json(output))
}

#[derive(Deserialize)]
pub struct ListFilesQuery {
    #[serde(default = "default_directory")]
    pub directory: String,
}

fn default_directory() -> String {
    "/".to_string()
}

pub async fn list_files(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Query(query): Query<ListFilesQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let files = state
        .sandboxes
        .list_files(&session_id, &query.directory)
        .await?;

    Ok(Json(json!({
        "session_id": session_id,
        "directory": query.directory,
        "files": files,
    })))
}

pub async fn read_file(
    State(state): State<AppState>,
    Path((session_id, path)): Path<(String, String)>,
) -> Result<impl IntoResponse, ApiError> {
    let absolute = format!("/{}", path);
    let content = state.sandboxes.read_file(&session_id, &absolute).await?;

    Ok(Json(json!({
        "session_id": session_id,
        "file_path": absolute,
        "content": BASE64.encode(content),
    })))
}

#[derive(Deserialize)]
pub struct WriteFileRequest {
    pub session_id: String,
    pub file_path: String,
    /// Base64-encoded file content
    pub content: String,
}

pub async fn write_file(
    State(state): State<AppState>,
    Json(request): Json<WriteFileRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let content = BASE64
        .decode(&request.content)
        .map_err(|e| SandboxError::Validation(format!("Content is not valid base64: {}", e)))?;

    state
        .sandboxes
        .write_file(&request.session_id, &request.file_path, &content)
        .await?;

    Ok(Json(json!({
        "status": "success",
        "file_path": request.file_path,
    })))
}

pub async fn get_url(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let url = state.sandboxes.url(&session_id).await?;

    Ok(Json(json!({
        "session_id": session_id,
        "url": url,
    })))
}

/// Fixed response for the deprecated sandbox surface.
pub async fn gone() -> impl IntoResponse {
    (
        StatusCode::GONE,
        Json(json!({
            "error": "This endpoint is deprecated. Use /api/sessions instead."
        })),
    )
}
