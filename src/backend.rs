use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response};
use tracing::debug;

use crate::{
    config::AppConfig,
    error::BackendError,
    model::{
        ErrorBody, GenerateRequest, GenerateResponse, ModelRef, PresentSet, PullRequest,
        PullResponse, TagsResponse, VersionResponse,
    },
};

/// Reports which models the backing service currently has cached.
#[async_trait]
pub trait InventoryLister: Send + Sync {
    async fn list_present(&self) -> Result<PresentSet, BackendError>;
}

/// The control surface the bootstrap needs from the backing service.
#[async_trait]
pub trait BackingService: InventoryLister {
    async fn version(&self) -> Result<String, BackendError>;

    /// Blocks until the backing service has the model cached.
    async fn pull(&self, model: &ModelRef) -> Result<(), BackendError>;

    async fn generate(&self, model: &ModelRef, prompt: &str)
    -> Result<GenerateResponse, BackendError>;
}

/// HTTP client for an Ollama-compatible server.
#[derive(Clone)]
pub struct OllamaClient {
    client: Client,
    base_url: String,
    request_timeout: Duration,
}

impl OllamaClient {
    pub fn new(
        base_url: impl Into<String>,
        request_timeout: Duration,
    ) -> Result<Self, BackendError> {
        // No overall timeout: pulls of multi-gigabyte models run for as long as they take.
        let client = Client::builder()
            .connect_timeout(request_timeout)
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            request_timeout,
        })
    }

    pub fn from_config(config: &AppConfig) -> Result<Self, BackendError> {
        Self::new(config.backend_url.clone(), config.request_timeout)
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

#[async_trait]
impl InventoryLister for OllamaClient {
    async fn list_present(&self) -> Result<PresentSet, BackendError> {
        let response = self
            .client
            .get(self.url("/api/tags"))
            .timeout(self.request_timeout)
            .send()
            .await?;
        let tags: TagsResponse = check(response).await?.json().await?;
        debug!(count = tags.models.len(), "listed cached models");
        Ok(tags
            .models
            .into_iter()
            .map(|entry| ModelRef::from(entry.name))
            .collect())
    }
}

#[async_trait]
impl BackingService for OllamaClient {
    async fn version(&self) -> Result<String, BackendError> {
        let response = self
            .client
            .get(self.url("/api/version"))
            .timeout(self.request_timeout)
            .send()
            .await?;
        let body: VersionResponse = check(response).await?.json().await?;
        Ok(body.version)
    }

    async fn pull(&self, model: &ModelRef) -> Result<(), BackendError> {
        let response = self
            .client
            .post(self.url("/api/pull"))
            .json(&PullRequest {
                model: model.as_str(),
                stream: false,
            })
            .send()
            .await?;
        let body: PullResponse = check(response).await?.json().await?;
        if body.status != "success" {
            return Err(BackendError::Protocol(format!(
                "pull of {model} finished with status `{}`",
                body.status
            )));
        }
        Ok(())
    }

    async fn generate(
        &self,
        model: &ModelRef,
        prompt: &str,
    ) -> Result<GenerateResponse, BackendError> {
        let response = self
            .client
            .post(self.url("/api/generate"))
            .json(&GenerateRequest {
                model: model.as_str(),
                prompt,
                stream: false,
            })
            .send()
            .await?;
        Ok(check(response).await?.json().await?)
    }
}

/// Turns non-2xx responses into `BackendError::Status`, preferring the server's own message.
async fn check(response: Response) -> Result<Response, BackendError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let text = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorBody>(&text)
        .map(|body| body.error)
        .unwrap_or(text);
    Err(BackendError::Status {
        status: status.as_u16(),
        message,
    })
}
