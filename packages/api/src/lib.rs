// ABOUTME: HTTP control surface for Skiff: session lifecycle, code execution, and file access
// ABOUTME: Thin axum layer over the lifecycle orchestrator and unified sandbox manager

pub mod error;
pub mod handlers;

use axum::routing::{get, post};
use axum::Router;
use skiff_sandbox::{LifecycleOrchestrator, UnifiedSandboxManager};
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub lifecycle: Arc<LifecycleOrchestrator>,
    pub sandboxes: Arc<UnifiedSandboxManager>,
}

impl AppState {
    pub fn new(
        lifecycle: Arc<LifecycleOrchestrator>,
        sandboxes: Arc<UnifiedSandboxManager>,
    ) -> Self {
        Self {
            lifecycle,
            sandboxes,
        }
    }
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/api/sessions", post(handlers::create_session))
        .route(
            "/api/sessions/{session_id}",
            get(handlers::get_session).delete(handlers::delete_session),
        )
        .route("/api/execute", post(handlers::execute_code))
        .route("/api/files/{session_id}", get(handlers::list_files))
        .route("/api/files/{session_id}/{*path}", get(handlers::read_file))
        .route("/api/files", post(handlers::write_file))
        .route("/api/url/{session_id}", get(handlers::get_url))
        // Deprecated sandbox surface; kept only to direct callers onward
        .route("/api/sandbox/start", post(handlers::gone))
        .route("/api/sandbox/stop", post(handlers::gone))
        .route("/api/sandbox/status/{id}", get(handlers::gone))
        .with_state(state)
}
