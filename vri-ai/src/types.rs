//! Core Types and Trait Definitions for VRI-AI
//!
//! Defines the seams between the pipeline and its collaborators:
//! - **Classifier**: sentiment classification service
//! - **ZeroShotScorer**: zero-shot label scoring service
//! - **CompletionService**: generative completion service
//!
//! plus the error taxonomy shared by every stage:
//! - `ServiceError`: a model-service call failed (contained per item/batch/venue)
//! - `ParseError`: a generative response did not match the expected format
//! - `PipelineError`: a failure that ends the whole run

use crate::models::Sentiment;
use thiserror::Error;

// ============================================================================
// Service Traits
// ============================================================================

/// Sentiment classification service
///
/// # Example
/// ```rust,ignore
/// let sentiment = classifier.classify("Repas délicieux, service impeccable").await?;
/// assert!(sentiment.score <= 1.0);
/// ```
#[async_trait::async_trait]
pub trait Classifier: Send + Sync {
    /// Classify one non-empty text
    ///
    /// # Errors
    /// Returns `ServiceError` if the service call fails. Callers decide whether
    /// to skip the item or abort.
    async fn classify(&self, text: &str) -> Result<Sentiment, ServiceError>;
}

/// Zero-shot scoring service
#[async_trait::async_trait]
pub trait ZeroShotScorer: Send + Sync {
    /// Score `text` against each candidate label
    ///
    /// `hypothesis_template` contains a `{}` placeholder for the label.
    /// The returned labels and scores are index-aligned.
    async fn score(
        &self,
        text: &str,
        candidate_labels: &[String],
        hypothesis_template: &str,
    ) -> Result<ZeroShotScores, ServiceError>;
}

/// Generative completion service
#[async_trait::async_trait]
pub trait CompletionService: Send + Sync {
    /// Complete a prompt
    ///
    /// # Errors
    /// Returns `ServiceError` for transport, quota and malformed-response
    /// failures. Successfully returned text that does not match the expected
    /// format is the caller's `ParseError`, never a `ServiceError`.
    async fn complete(&self, prompt: &str, temperature: f32) -> Result<String, ServiceError>;
}

/// Zero-shot service response
#[derive(Debug, Clone, PartialEq)]
pub struct ZeroShotScores {
    /// Candidate labels, ordered as returned by the service
    pub labels: Vec<String>,
    /// Scores aligned with `labels`
    pub scores: Vec<f64>,
}

// ============================================================================
// Error Taxonomy
// ============================================================================

/// Model service call failure
///
/// Transient by nature: caught at item, batch or venue granularity and
/// logged, never aborting siblings.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Rate limit exceeded")]
    RateLimited,

    #[error("API error {0}: {1}")]
    Api(u16, String),

    #[error("Invalid service response: {0}")]
    InvalidResponse(String),
}

impl ServiceError {
    /// Map a reqwest error onto the taxonomy
    pub fn from_reqwest(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ServiceError::Timeout(err.to_string())
        } else if err.is_decode() {
            ServiceError::InvalidResponse(err.to_string())
        } else {
            ServiceError::Network(err.to_string())
        }
    }
}

/// Generative response did not match the expected structured format
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("Missing section marker: {0:?}")]
    MissingMarker(&'static str),

    #[error("Section marker {0:?} appears more than once")]
    DuplicateMarker(&'static str),

    #[error("Section marker {0:?} appears out of order")]
    OutOfOrder(&'static str),

    #[error("Section {0:?} is empty")]
    EmptySection(&'static str),

    #[error("Response is not a list literal: {0}")]
    NotAList(String),

    #[error("List literal is empty")]
    EmptyList,
}

/// Failure that terminates a pipeline run
#[derive(Debug, Error)]
pub enum PipelineError {
    /// No usable category vocabulary could be induced
    #[error(transparent)]
    LabelInduction(#[from] LabelInductionError),

    /// Document store read failed at a stage boundary
    #[error("Document store error: {0}")]
    Store(#[from] vri_common::Error),

    /// Run exceeded its time budget
    #[error("Pipeline run exceeded its time budget of {0} seconds")]
    TimedOut(u64),
}

/// Label induction could not produce a vocabulary
#[derive(Debug, Error)]
pub enum LabelInductionError {
    #[error("Label induction failed: no review with text to sample")]
    NoReviews,

    #[error("Label induction failed: {0}")]
    Service(#[from] ServiceError),

    #[error("Label induction failed: {0}")]
    Parse(#[from] ParseError),
}
