//! Zero-shot classification client
//!
//! `POST {"inputs", "parameters": {"candidate_labels", "hypothesis_template",
//! "multi_label": false}}` answered by `{sequence, labels, scores}`.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{build_http_client, ensure_success};
use crate::types::{ServiceError, ZeroShotScorer, ZeroShotScores};

#[derive(Debug, Serialize)]
struct ZeroShotRequest<'a> {
    inputs: &'a str,
    parameters: ZeroShotParameters<'a>,
}

#[derive(Debug, Serialize)]
struct ZeroShotParameters<'a> {
    candidate_labels: &'a [String],
    hypothesis_template: &'a str,
    multi_label: bool,
}

#[derive(Debug, Deserialize)]
struct ZeroShotResponse {
    #[allow(dead_code)]
    sequence: Option<String>,
    labels: Vec<String>,
    scores: Vec<f64>,
}

/// HTTP zero-shot scorer
pub struct HttpZeroShotScorer {
    http_client: reqwest::Client,
    endpoint: String,
    api_token: Option<String>,
}

impl HttpZeroShotScorer {
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
impl ZeroShotScorer for HttpZeroShotScorer {
    async fn score(
        &self,
        text: &str,
        candidate_labels: &[String],
        hypothesis_template: &str,
    ) -> Result<ZeroShotScores, ServiceError> {
        tracing::debug!(
            endpoint = %self.endpoint,
            labels = candidate_labels.len(),
            "Scoring review against vocabulary"
        );

        let body = ZeroShotRequest {
            inputs: text,
            parameters: ZeroShotParameters {
                candidate_labels,
                hypothesis_template,
                multi_label: false,
            },
        };

        let mut request = self.http_client.post(&self.endpoint).json(&body);
        if let Some(token) = &self.api_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(ServiceError::from_reqwest)?;
        let response = ensure_success(response).await?;

        let parsed: ZeroShotResponse = response.json().await.map_err(ServiceError::from_reqwest)?;

        if parsed.labels.len() != parsed.scores.len() {
            return Err(ServiceError::InvalidResponse(format!(
                "{} labels but {} scores",
                parsed.labels.len(),
                parsed.scores.len()
            )));
        }

        Ok(ZeroShotScores {
            labels: parsed.labels,
            scores: parsed.scores,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server};

    fn labels() -> Vec<String> {
        vec!["service client".to_string(), "qualité des plats".to_string()]
    }

    #[tokio::test]
    async fn test_score_sends_parameters_and_parses_response() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", "/zero-shot")
            .match_body(Matcher::PartialJsonString(
                r#"{"parameters":{"hypothesis_template":"Cet avis concerne {}.","multi_label":false}}"#
                    .to_string(),
            ))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"sequence":"Plats froids","labels":["qualité des plats","service client"],"scores":[0.8,0.2]}"#,
            )
            .create_async()
            .await;

        let scorer = HttpZeroShotScorer::new(
            format!("{}/zero-shot", server.url()),
            Duration::from_secs(5),
            None,
        )
        .unwrap();

        let scores = scorer
            .score("Plats froids", &labels(), "Cet avis concerne {}.")
            .await
            .unwrap();
        assert_eq!(scores.labels, vec!["qualité des plats", "service client"]);
        assert_eq!(scores.scores, vec![0.8, 0.2]);
    }

    #[tokio::test]
    async fn test_score_misaligned_response_is_invalid() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", "/zero-shot")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"sequence":"x","labels":["a","b"],"scores":[1.0]}"#)
            .create_async()
            .await;

        let scorer = HttpZeroShotScorer::new(
            format!("{}/zero-shot", server.url()),
            Duration::from_secs(5),
            None,
        )
        .unwrap();

        let result = scorer.score("x", &labels(), "{}").await;
        assert!(matches!(result, Err(ServiceError::InvalidResponse(_))));
    }
}
