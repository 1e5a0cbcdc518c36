//! Phase 1: CLASSIFYING
//!
//! Sentiment classification of every review with text

use futures::stream::{self, StreamExt};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio_util::sync::CancellationToken;

use super::PipelineOrchestrator;
use crate::models::{PipelineRun, Review, Sentiment};
use crate::types::ServiceError;

impl PipelineOrchestrator {
    /// Phase 1: CLASSIFYING - per-review sentiment, failures contained
    ///
    /// Returns the sentiments by review id. Nothing is written here; the
    /// sentiment goes out with the review's clustering update.
    pub(super) async fn phase_classifying(
        &self,
        run: &mut PipelineRun,
        reviews: &[Review],
        cancel_token: &CancellationToken,
    ) -> HashMap<String, Sentiment> {
        let eligible: Vec<(String, String)> = reviews
            .iter()
            .filter_map(|r| r.analyzable_text().map(|text| (r.id.clone(), text.to_string())))
            .collect();
        let total = eligible.len();
        run.statistics.classifying.skipped = reviews.len() - total;

        tracing::info!(
            run_id = %run.run_id,
            reviews = total,
            skipped = run.statistics.classifying.skipped,
            "Phase 1: CLASSIFYING"
        );

        let run_id = run.run_id;
        let completed = AtomicUsize::new(0);
        let completed = &completed;

        let results: Vec<(String, Option<Result<Sentiment, ServiceError>>)> = stream::iter(eligible)
            .map(move |(review_id, text)| async move {
                if cancel_token.is_cancelled() {
                    return (review_id, None);
                }

                let result = self.classifier.classify(&text).await;

                let current = completed.fetch_add(1, Ordering::Relaxed) + 1;
                if current % 50 == 0 || current == total {
                    tracing::debug!(
                        run_id = %run_id,
                        progress = format!("{}/{}", current, total),
                        "Classification progress"
                    );
                }

                (review_id, Some(result))
            })
            .buffer_unordered(self.max_concurrency)
            .collect()
            .await;

        let mut sentiments = HashMap::with_capacity(results.len());
        for (review_id, result) in results {
            match result {
                Some(Ok(sentiment)) => {
                    run.statistics.classifying.processed += 1;
                    sentiments.insert(review_id, sentiment);
                }
                Some(Err(e)) => {
                    tracing::warn!(
                        run_id = %run_id,
                        review_id = %review_id,
                        error = %e,
                        "Classification failed, review skipped"
                    );
                    run.statistics.classifying.failed += 1;
                    run.add_warning(review_id.as_str(), format!("classification failed: {}", e));
                }
                None => {}
            }
        }

        tracing::info!(
            run_id = %run_id,
            stats = %run.statistics.classifying.display_string(),
            "CLASSIFYING complete"
        );

        sentiments
    }
}
