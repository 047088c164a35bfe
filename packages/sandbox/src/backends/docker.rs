// ABOUTME: Local-container backend implementation using the Docker daemon
// ABOUTME: Uses bollard to create labeled containers with a shared runtime volume

use super::SandboxBackend;
use crate::error::{Result, SandboxError};
use crate::types::{BackendKind, SandboxHandle};
use async_trait::async_trait;
use bollard::{
    container::{
        Config, CreateContainerOptions, RemoveContainerOptions, StartContainerOptions,
        StopContainerOptions,
    },
    image::CreateImageOptions,
    Docker,
};
use futures::StreamExt;
use std::collections::HashMap;
use tracing::{debug, info, warn};

const DEFAULT_RUNTIME_DIR: &str = "./sandbox_runtime";
const STOP_TIMEOUT_SECS: i64 = 10;

pub struct DockerBackend {
    client: Docker,
    label_prefix: String,
    runtime_dir: String,
}

impl DockerBackend {
    pub fn new() -> Result<Self> {
        Self::with_runtime_dir(DEFAULT_RUNTIME_DIR)
    }

    /// Create a backend whose containers mount `runtime_dir` at `/sandbox`.
    pub fn with_runtime_dir(runtime_dir: impl Into<String>) -> Result<Self> {
        let client = Docker::connect_with_defaults()
            .map_err(|e| SandboxError::Provision(format!("Docker connection failed: {}", e)))?;
        Ok(Self::with_client(client, runtime_dir))
    }

    pub fn with_client(client: Docker, runtime_dir: impl Into<String>) -> Self {
        Self {
            client,
            label_prefix: "skiff.sandbox".to_string(),
            runtime_dir: runtime_dir.into(),
        }
    }

    pub async fn is_available(&self) -> bool {
        match self.client.ping().await {
            Ok(_) => true,
            Err(e) => {
                warn!("Docker not available: {}", e);
                false
            }
        }
    }

    async fn ensure_image(&self, image: &str) -> Result<()> {
        if self.client.inspect_image(image).await.is_ok() {
            return Ok(());
        }

        info!("Pulling image: {}", image);
        let options = CreateImageOptions {
            from_image: image.to_string(),
            ..Default::default()
        };

        let mut stream = self.client.create_image(Some(options), None, None);
        while let Some(progress) = stream.next().await {
            let update = progress.map_err(|e| {
                SandboxError::Provision(format!("Failed to pull image {}: {}", image, e))
            })?;
            if let Some(error) = update.error {
                return Err(SandboxError::Provision(format!(
                    "Failed to pull image {}: {}",
                    image, error
                )));
            }
            if let Some(status) = update.status {
                debug!("Pull status: {}", status);
            }
        }

        Ok(())
    }
}

#[async_trait]
impl SandboxBackend for DockerBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::LocalContainer
    }

    async fn create(&self, session_id: &str, environment: &str) -> Result<SandboxHandle> {
        let name = format!("sandbox_{}", session_id);
        info!("Creating container {} from image {}", name, environment);

        self.ensure_image(environment).await?;

        let mut labels = HashMap::new();
        labels.insert(format!("{}.managed", self.label_prefix), "true".to_string());
        labels.insert(
            format!("{}.session", self.label_prefix),
            session_id.to_string(),
        );

        let host_config = bollard::models::HostConfig {
            binds: Some(vec![format!("{}:/sandbox:rw", self.runtime_dir)]),
            ..Default::default()
        };

        let config = Config {
            image: Some(environment.to_string()),
            labels: Some(labels),
            host_config: Some(host_config),
            ..Default::default()
        };

        let options = CreateContainerOptions {
            name: name.clone(),
            platform: None,
        };

        let container = self
            .client
            .create_container(Some(options), config)
            .await
            .map_err(|e| SandboxError::Provision(e.to_string()))?;

        self.client
            .start_container(&container.id, None::<StartContainerOptions<String>>)
            .await
            .map_err(|e| SandboxError::Provision(e.to_string()))?;

        debug!("Container {} started for session {}", container.id, session_id);

        Ok(SandboxHandle::new(container.id))
    }

    async fn destroy(&self, handle: &SandboxHandle) -> Result<bool> {
        info!("Stopping container: {}", handle.id);

        match self
            .client
            .stop_container(&handle.id, Some(StopContainerOptions { t: STOP_TIMEOUT_SECS }))
            .await
        {
            Ok(()) => {}
            Err(e) if is_not_found(&e) => return Ok(false),
            // An already-stopped container still gets removed below
            Err(e) => debug!("Failed to stop container {}: {}", handle.id, e),
        }

        let options = RemoveContainerOptions {
            force: true,
            v: true,
            ..Default::default()
        };

        match self.client.remove_container(&handle.id, Some(options)).await {
            Ok(()) => Ok(true),
            Err(e) if is_not_found(&e) => Ok(false),
            Err(e) => {
                warn!("Failed to remove container {}: {}", handle.id, e);
                Ok(false)
            }
        }
    }
}

fn is_not_found(err: &bollard::errors::Error) -> bool {
    matches!(
        err,
        bollard::errors::Error::DockerResponseServerError {
            status_code: 404,
            ..
        }
    )
}
