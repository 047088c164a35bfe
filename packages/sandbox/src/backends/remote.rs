// ABOUTME: Remote-managed backend talking to a hosted sandbox service over HTTP
// ABOUTME: Creates sandboxes from templates, executes code, and proxies a file API

use super::SandboxBackend;
use crate::error::{Result, SandboxError};
use crate::types::{BackendKind, ExecutionOutput, SandboxHandle};
use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, StatusCode};
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;
use tracing::{debug, info, warn};

const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8070";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

pub struct RemoteBackend {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

#[derive(Debug, Serialize)]
struct CreateSandboxBody<'a> {
    template: &'a str,
    metadata: SandboxMetadata<'a>,
}

#[derive(Debug, Serialize)]
struct SandboxMetadata<'a> {
    session_id: &'a str,
}

#[derive(Debug, Deserialize)]
struct CreateSandboxReply {
    sandbox_id: String,
    #[serde(default)]
    hostname: Option<String>,
}

#[derive(Debug, Serialize)]
struct ExecuteBody<'a> {
    code: &'a str,
}

#[derive(Debug, Deserialize)]
struct ListFilesReply {
    #[serde(default)]
    entries: Vec<String>,
}

impl RemoteBackend {
    /// Build from `SKIFF_SANDBOX_API_URL` / `SKIFF_SANDBOX_API_KEY`.
    pub fn from_env() -> Self {
        let base_url =
            env::var("SKIFF_SANDBOX_API_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
        let api_key = env::var("SKIFF_SANDBOX_API_KEY").ok();
        if api_key.is_none() {
            info!("SKIFF_SANDBOX_API_KEY not set - remote sandbox requests will be unauthenticated");
        }
        Self::new(base_url, api_key)
    }

    pub fn new(base_url: impl Into<String>, api_key: Option<String>) -> Self {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .unwrap_or_default();

        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
        }
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let builder = self
            .client
            .request(method, format!("{}{}", self.base_url, path));
        match &self.api_key {
            Some(key) => builder.bearer_auth(key),
            None => builder,
        }
    }

    async fn error_body(response: reqwest::Response) -> String {
        let status = response.status();
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        format!("{}: {}", status, body)
    }
}

#[async_trait]
impl SandboxBackend for RemoteBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::RemoteManaged
    }

    async fn create(&self, session_id: &str, environment: &str) -> Result<SandboxHandle> {
        info!(
            "Creating remote sandbox for session {} from template {}",
            session_id, environment
        );

        let body = CreateSandboxBody {
            template: environment,
            metadata: SandboxMetadata { session_id },
        };

        let response = self
            .request(Method::POST, "/v1/sandboxes")
            .json(&body)
            .send()
            .await
            .map_err(|e| SandboxError::Provision(e.to_string()))?;

        if !response.status().is_success() {
            return Err(SandboxError::Provision(Self::error_body(response).await));
        }

        let reply: CreateSandboxReply = response
            .json()
            .await
            .map_err(|e| SandboxError::Provision(format!("Malformed create reply: {}", e)))?;

        debug!("Remote sandbox created: {}", reply.sandbox_id);

        let mut handle = SandboxHandle::new(reply.sandbox_id);
        handle.url = reply.hostname;
        Ok(handle)
    }

    async fn execute(&self, handle: &SandboxHandle, code: &str) -> Result<ExecutionOutput> {
        debug!("Executing code in remote sandbox {}", handle.id);

        let response = self
            .request(Method::POST, &format!("/v1/sandboxes/{}/code", handle.id))
            .json(&ExecuteBody { code })
            .send()
            .await
            .map_err(|e| SandboxError::Execution(e.to_string()))?;

        match response.status() {
            StatusCode::NOT_FOUND => Err(SandboxError::NotFound(format!(
                "Sandbox not found: {}",
                handle.id
            ))),
            status if status.is_success() => response
                .json::<ExecutionOutput>()
                .await
                .map_err(|e| SandboxError::Execution(format!("Malformed execution reply: {}", e))),
            // Interpreter-level failures; user-code errors arrive in the
            // output's error field with a success status instead
            _ => Err(SandboxError::Execution(Self::error_body(response).await)),
        }
    }

    async fn read_file(&self, handle: &SandboxHandle, path: &str) -> Result<Vec<u8>> {
        let response = self
            .request(Method::GET, &format!("/v1/sandboxes/{}/files", handle.id))
            .query(&[("path", path)])
            .send()
            .await
            .map_err(|e| SandboxError::Internal(e.to_string()))?;

        match response.status() {
            StatusCode::NOT_FOUND => Err(SandboxError::NotFound(format!(
                "No such sandbox or file: {} {}",
                handle.id, path
            ))),
            status if status.is_success() => Ok(response
                .bytes()
                .await
                .map_err(|e| SandboxError::Internal(e.to_string()))?
                .to_vec()),
            _ => Err(SandboxError::Internal(Self::error_body(response).await)),
        }
    }

    async fn write_file(&self, handle: &SandboxHandle, path: &str, content: &[u8]) -> Result<()> {
        let response = self
            .request(Method::PUT, &format!("/v1/sandboxes/{}/files", handle.id))
            .query(&[("path", path)])
            .body(content.to_vec())
            .send()
            .await
            .map_err(|e| SandboxError::Internal(e.to_string()))?;

        match response.status() {
            StatusCode::NOT_FOUND => Err(SandboxError::NotFound(format!(
                "Sandbox not found: {}",
                handle.id
            ))),
            status if status.is_success() => {
                debug!("Wrote file {} in sandbox {}", path, handle.id);
                Ok(())
            }
            _ => Err(SandboxError::Internal(Self::error_body(response).await)),
        }
    }

    async fn list_files(&self, handle: &SandboxHandle, path: &str) -> Result<Vec<String>> {
        let response = self
            .request(
                Method::GET,
                &format!("/v1/sandboxes/{}/files/list", handle.id),
            )
            .query(&[("path", path)])
            .send()
            .await
            .map_err(|e| SandboxError::Internal(e.to_string()))?;

        match response.status() {
            StatusCode::NOT_FOUND => Err(SandboxError::NotFound(format!(
                "Sandbox not found: {}",
                handle.id
            ))),
            // A nonexistent directory comes back as an empty entries list
            status if status.is_success() => Ok(response
                .json::<ListFilesReply>()
                .await
                .map_err(|e| SandboxError::Internal(e.to_string()))?
                .entries),
            _ => Err(SandboxError::Internal(Self::error_body(response).await)),
        }
    }

    async fn destroy(&self, handle: &SandboxHandle) -> Result<bool> {
        info!("Destroying remote sandbox {}", handle.id);

        let response = self
            .request(Method::DELETE, &format!("/v1/sandboxes/{}", handle.id))
            .send()
            .await;

        match response {
            Ok(r) if r.status() == StatusCode::NOT_FOUND => Ok(false),
            Ok(r) if r.status().is_success() => Ok(true),
            Ok(r) => {
                warn!(
                    "Unexpected status destroying sandbox {}: {}",
                    handle.id,
                    r.status()
                );
                Ok(false)
            }
            Err(e) => {
                warn!("Failed to destroy sandbox {}: {}", handle.id, e);
                Ok(false)
            }
        }
    }

    async fn url(&self, handle: &SandboxHandle) -> Result<Option<String>> {
        Ok(handle.url.clone())
    }
}
