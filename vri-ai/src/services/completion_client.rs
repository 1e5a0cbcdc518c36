//! Generative completion client
//!
//! OpenAI-compatible `chat/completions` endpoint. Requests pass through a
//! governor quota before being sent; HTTP 429 maps to
//! `ServiceError::RateLimited`.

use governor::{
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};
use serde::{Deserialize, Serialize};
use std::num::NonZeroU32;
use std::time::Duration;

use super::{build_http_client, ensure_success};
use crate::types::{CompletionService, ServiceError};

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 1],
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
}

/// Rate-limited chat completion client
pub struct HttpCompletionService {
    http_client: reqwest::Client,
    endpoint: String,
    model: String,
    api_token: Option<String>,
    rate_limiter: RateLimiter<NotKeyed, InMemoryState, DefaultClock>,
}

impl HttpCompletionService {
    /// Create client allowing `requests_per_second` calls per second
    pub fn new(
        endpoint: impl Into<String>,
        model: impl Into<String>,
        timeout: Duration,
        requests_per_second: u32,
        api_token: Option<String>,
    ) -> Result<Self, ServiceError> {
        let per_second = NonZeroU32::new(requests_per_second).unwrap_or(NonZeroU32::MIN);

        Ok(Self {
            http_client: build_http_client(timeout)?,
            endpoint: endpoint.into(),
            model: model.into(),
            api_token,
            rate_limiter: RateLimiter::direct(Quota::per_second(per_second)),
        })
    }
}

#[async_trait::async_trait]
impl CompletionService for HttpCompletionService {
    async fn complete(&self, prompt: &str, temperature: f32) -> Result<String, ServiceError> {
        self.rate_limiter.until_ready().await;

        tracing::debug!(
            model = %self.model,
            prompt_chars = prompt.len(),
            temperature,
            "Requesting completion"
        );

        let body = ChatRequest {
            model: &self.model,
            messages: [ChatMessage {
                role: "user",
                content: prompt,
            }],
            temperature,
        };

        let mut request = self.http_client.post(&self.endpoint).json(&body);
        if let Some(token) = &self.api_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(ServiceError::from_reqwest)?;
        let response = ensure_success(response).await?;

        let parsed: ChatResponse = response.json().await.map_err(ServiceError::from_reqwest)?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| ServiceError::InvalidResponse("completion without content".to_string()))
    }
}
