//! Pipeline services
//!
//! Model-service clients, the three analysis stages and the orchestrator
//! sequencing them.

pub mod batch_summarizer;
pub mod classification_client;
pub mod cluster_engine;
pub mod completion_client;
pub mod label_inducer;
pub mod pipeline_orchestrator;
pub mod registry;
pub mod summary_parser;
pub mod zero_shot_client;

pub use batch_summarizer::{
    BatchFailure, BatchSummarizer, SummarizerConfig, VenueSummaryError, VenueSummaryReport,
};
pub use classification_client::HttpClassifier;
pub use cluster_engine::ClusterEngine;
pub use completion_client::HttpCompletionService;
pub use label_inducer::{parse_list_literal, LabelInducer, LabelInductionConfig};
pub use pipeline_orchestrator::{PipelineOrchestrator, RunStatistics};
pub use registry::ServiceRegistry;
pub use summary_parser::{parse_final_summary, ParsedSummary};
pub use zero_shot_client::HttpZeroShotScorer;

use std::time::Duration;

use crate::types::ServiceError;

const USER_AGENT: &str = concat!("vri-ai/", env!("CARGO_PKG_VERSION"));

fn build_http_client(timeout: Duration) -> Result<reqwest::Client, ServiceError> {
    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(timeout)
        .build()
        .map_err(|e| ServiceError::Network(e.to_string()))
}

/// Pass successful responses through, map the rest onto `ServiceError`
async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, ServiceError> {
    let status = response.status();

    if status.is_success() {
        return Ok(response);
    }

    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        return Err(ServiceError::RateLimited);
    }

    let error_text = response.text().await.unwrap_or_default();
    Err(ServiceError::Api(status.as_u16(), error_text))
}
