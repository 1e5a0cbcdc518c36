//! Sentiment classification client
//!
//! Targets a Hugging Face style text-classification endpoint:
//! `POST {"inputs": text}` answered by `[{label, score}, ...]` or the nested
//! `[[{label, score}, ...]]` form.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{build_http_client, ensure_success};
use crate::models::Sentiment;
use crate::types::{Classifier, ServiceError};

#[derive(Debug, Serialize)]
struct ClassifyRequest<'a> {
    inputs: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
struct LabelScore {
    label: String,
    score: f64,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ClassifyResponse {
    Nested(Vec<Vec<LabelScore>>),
    Flat(Vec<LabelScore>),
}

impl ClassifyResponse {
    fn into_candidates(self) -> Vec<LabelScore> {
        match self {
            ClassifyResponse::Nested(outer) => outer.into_iter().flatten().collect(),
            ClassifyResponse::Flat(inner) => inner,
        }
    }
}

/// HTTP sentiment classifier
pub struct HttpClassifier {
    http_client: reqwest::Client,
    endpoint: String,
    api_token: Option<String>,
}

impl HttpClassifier {
    pub fn new(
        endpoint: impl Into<String>,
        timeout: Duration,
        api_token: Option<String>,
    ) -> Result<Self, ServiceError> {
        Ok(Self {
            http_client: build_http_client(timeout)?,
            endpoint: endpoint.into(),
            api_token,
        })
    }
}

#[async_trait::async_trait]
impl Classifier for HttpClassifier {
    async fn classify(&self, text: &str) -> Result<Sentiment, ServiceError> {
        tracing::debug!(endpoint = %self.endpoint, chars = text.len(), "Classifying review text");

        let mut request = self
            .http_client
            .post(&self.endpoint)
            .json(&ClassifyRequest { inputs: text });
        if let Some(token) = &self.api_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(ServiceError::from_reqwest)?;
        let response = ensure_success(response).await?;

        let body: ClassifyResponse = response.json().await.map_err(ServiceError::from_reqwest)?;

        let best = body
            .into_candidates()
            .into_iter()
            .max_by(|a, b| a.score.total_cmp(&b.score))
            .ok_or_else(|| ServiceError::InvalidResponse("empty classification result".to_string()))?;

        if !(0.0..=1.0).contains(&best.score) {
            return Err(ServiceError::InvalidResponse(format!(
                "classification score {} outside [0, 1]",
                best.score
            )));
        }

        Ok(Sentiment {
            label: best.label,
            score: best.score,
        })
    }
}
