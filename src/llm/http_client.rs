//! HTTP completion client — OpenAI-style chat-completions endpoint.
//!
//! Bearer-token JSON POST with a bounded request timeout. The credential and
//! model come from the shared settings on every request, so control-API
//! updates apply without a restart. A non-2xx reply surfaces as an error
//! carrying status and body; nothing is retried here.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::debug;

use crate::config::AiSettings;
use crate::error::CompletionError;
use crate::llm::{ChatMessage, CompletionClient, CompletionRequest};

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Completion client over a chat-completions HTTP API.
pub struct HttpCompletionClient {
    client: reqwest::Client,
    base_url: String,
    settings: Arc<RwLock<AiSettings>>,
}

#[derive(Serialize)]
struct ApiRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    messages: &'a [ChatMessage],
}

#[derive(Deserialize)]
struct ApiResponse {
    choices: Vec<ApiChoice>,
}

#[derive(Deserialize)]
struct ApiChoice {
    message: ApiMessage,
}

#[derive(Deserialize)]
struct ApiMessage {
    content: Option<String>,
}

impl HttpCompletionClient {
    /// Create a client over the shared settings. `timeout` bounds the whole
    /// HTTP exchange.
    pub fn new(settings: Arc<RwLock<AiSettings>>, timeout: Duration) -> Self {
        Self::with_base_url(DEFAULT_BASE_URL, settings, timeout)
    }

    pub fn with_base_url(
        base_url: &str,
        settings: Arc<RwLock<AiSettings>>,
        timeout: Duration,
    ) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_default();
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            settings,
        }
    }

    /// Snapshot of credential and model for one request.
    async fn request_params(&self) -> (SecretString, String) {
        let settings = self.settings.read().await;
        (
            SecretString::from(settings.api_key.clone()),
            settings.model.clone(),
        )
    }
}

#[async_trait]
impl CompletionClient for HttpCompletionClient {
    async fn complete(&self, request: CompletionRequest) -> Result<String, CompletionError> {
        let (api_key, model) = self.request_params().await;
        let body = ApiRequest {
            model: &model,
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            messages: &request.messages,
        };

        let resp = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(api_key.expose_secret())
            .json(&body)
            .send()
            .await
            .map_err(|e| CompletionError::RequestFailed(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(CompletionError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: ApiResponse = resp
            .json()
            .await
            .map_err(|e| CompletionError::InvalidResponse(e.to_string()))?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .ok_or_else(|| CompletionError::InvalidResponse("empty choices".to_string()))?;

        debug!(model = %model, chars = content.len(), "Completion received");
        Ok(content)
    }
}
