//! Hierarchical venue summarization
//!
//! A venue's reviews are cut into fixed-size batches, each batch is
//! summarized by the generative service, and the intermediate summaries are
//! merged by a second call into the three-section final summary.
//!
//! Every generative call of the summarizer, batch or final and across all
//! venues, holds one of `max_concurrency` call slots while it is in flight.

use futures::stream::{self, StreamExt};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Semaphore;

use super::summary_parser::{
    parse_final_summary, GLOBAL_SCORE_MARKER, KEY_POINTS_MARKER, SYNOPSIS_MARKER,
};
use crate::models::{Review, SummaryResult, VenueReviewGroup};
use crate::types::{CompletionService, ParseError, ServiceError};

/// Summarization parameters
#[derive(Debug, Clone)]
pub struct SummarizerConfig {
    /// Reviews per intermediate batch
    pub batch_size: usize,
    pub temperature: f32,
    /// Cluster labels shown per review (all when `None`)
    pub labels_per_review: Option<usize>,
    /// Generative calls in flight, all venues together
    pub max_concurrency: usize,
}

impl Default for SummarizerConfig {
    fn default() -> Self {
        Self {
            batch_size: 10,
            temperature: 0.3,
            labels_per_review: None,
            max_concurrency: 4,
        }
    }
}

/// Venue could not be summarized
#[derive(Debug, Error)]
pub enum VenueSummaryError {
    #[error("All {0} batch summaries failed")]
    NoIntermediateSummaries(usize),

    #[error("Final summary call failed: {0}")]
    FinalCall(#[from] ServiceError),

    #[error("Final summary unparsable: {0}")]
    Parse(#[from] ParseError),
}

/// Intermediate batch call that failed and was left out
#[derive(Debug, Clone)]
pub struct BatchFailure {
    /// Zero-based batch index within the venue
    pub index: usize,
    pub error: String,
}

/// Result of summarizing one venue
#[derive(Debug)]
pub struct VenueSummaryReport {
    pub batches_total: usize,
    pub failed_batches: Vec<BatchFailure>,
    pub outcome: Result<SummaryResult, VenueSummaryError>,
}

/// Per-venue batch summarizer
pub struct BatchSummarizer {
    completion: Arc<dyn CompletionService>,
    config: SummarizerConfig,
    call_slots: Arc<Semaphore>,
}

impl BatchSummarizer {
    pub fn new(completion: Arc<dyn CompletionService>, config: SummarizerConfig) -> Self {
        let call_slots = Arc::new(Semaphore::new(config.max_concurrency.max(1)));
        Self {
            completion,
            config,
            call_slots,
        }
    }

    /// Summarize one venue's reviews
    pub async fn summarize_venue(&self, group: &VenueReviewGroup) -> VenueSummaryReport {
        let prompts: Vec<String> = group
            .reviews
            .chunks(self.config.batch_size.max(1))
            .map(|batch| build_batch_prompt(&group.venue_name, batch, self.config.labels_per_review))
            .collect();
        let batches_total = prompts.len();

        tracing::debug!(
            venue_id = %group.venue_id,
            reviews = group.reviews.len(),
            batches = batches_total,
            "Summarizing venue"
        );

        // `buffered` keeps batch order whatever the completion order
        let results: Vec<Result<String, ServiceError>> = stream::iter(prompts)
            .map(|prompt| async move { self.complete(&prompt).await })
            .buffered(self.config.max_concurrency.max(1))
            .collect()
            .await;

        let mut intermediate = Vec::with_capacity(results.len());
        let mut failed_batches = Vec::new();
        for (index, result) in results.into_iter().enumerate() {
            match result {
                Ok(summary) => intermediate.push(summary.trim().to_string()),
                Err(e) => {
                    tracing::warn!(
                        venue_id = %group.venue_id,
                        batch = index,
                        error = %e,
                        "Batch summary failed, batch omitted"
                    );
                    failed_batches.push(BatchFailure {
                        index,
                        error: e.to_string(),
                    });
                }
            }
        }

        let outcome = self.final_summary(group, &intermediate, batches_total).await;

        VenueSummaryReport {
            batches_total,
            failed_batches,
            outcome,
        }
    }

    async fn final_summary(
        &self,
        group: &VenueReviewGroup,
        intermediate: &[String],
        batches_total: usize,
    ) -> Result<SummaryResult, VenueSummaryError> {
        if intermediate.is_empty() {
            return Err(VenueSummaryError::NoIntermediateSummaries(batches_total));
        }

        let prompt = build_final_prompt(&group.venue_name, intermediate);
        let response = self.complete(&prompt).await?;
        let parsed = parse_final_summary(&response)?;

        Ok(SummaryResult {
            venue_id: group.venue_id.clone(),
            synopsis: parsed.synopsis,
            key_points: parsed.key_points,
            global_score: parsed.global_score,
        })
    }

    /// One generative call, holding a call slot until it resolves
    async fn complete(&self, prompt: &str) -> Result<String, ServiceError> {
        let _slot = self
            .call_slots
            .acquire()
            .await
            .map_err(|e| ServiceError::Network(format!("call slots closed: {}", e)))?;

        self.completion.complete(prompt, self.config.temperature).await
    }
}

/// Prompt for one batch: each review text followed by its themes
pub fn build_batch_prompt(venue_name: &str, batch: &[Review], labels_per_review: Option<usize>) -> String {
    let rendered: Vec<String> = batch
        .iter()
        .map(|review| {
            let text = review.analyzable_text().unwrap_or_default().trim();
            let labels = review.top_cluster_labels(labels_per_review).join(", ");
            format!("Avis : {}\nThèmes : {}", text, labels)
        })
        .collect();

    format!(
        "Voici des avis clients sur le prestataire « {} ». \
         Chaque avis est suivi des thèmes détectés.\n\n\
         {}\n\n\
         Rédige en français un résumé concis des points forts et des points faibles \
         mentionnés dans ces avis.",
        venue_name,
        rendered.join("\n\n")
    )
}

/// Prompt merging intermediate summaries into the three-section answer
pub fn build_final_prompt(venue_name: &str, intermediate: &[String]) -> String {
    format!(
        "Voici plusieurs résumés partiels d'avis clients sur le prestataire « {} » :\n\n\
         {}\n\n\
         À partir de ces résumés, rédige une synthèse finale en respectant exactement \
         ce format :\n\
         {} <synthèse en quelques phrases>\n\
         {} <points clés sous forme de liste>\n\
         {} <note globale sur 100>",
        venue_name,
        intermediate.join("\n\n"),
        SYNOPSIS_MARKER,
        KEY_POINTS_MARKER,
        GLOBAL_SCORE_MARKER
    )
}
