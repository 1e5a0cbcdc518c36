//! Phase 3: CLUSTERING
//!
//! Zero-shot category scores per review and the review's single update.
//! A review is written only when both its sentiment and its clusters were
//! obtained in this run; otherwise its prior derived fields stay as they are.

use futures::stream::{self, StreamExt};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio_util::sync::CancellationToken;

use super::PipelineOrchestrator;
use crate::models::{PipelineRun, PipelineState, Review, ReviewUpdate, Sentiment};
use crate::types::ServiceError;

/// Outcome of one clustering worker
struct ClusterOutcome {
    review_id: String,
    clustering: Result<usize, ServiceError>,
    /// `None` when there was nothing to write
    write: Option<vri_common::Result<bool>>,
}

impl PipelineOrchestrator {
    /// Phase 3: CLUSTERING - per-review scores, failures contained
    ///
    /// Each worker writes the review's sentiment and clusters in one update
    /// as soon as its clustering call resolves. Reviews missing either are
    /// not written.
    pub(super) async fn phase_clustering(
        &self,
        run: &mut PipelineRun,
        reviews: &[Review],
        sentiments: &HashMap<String, Sentiment>,
        vocabulary: &[String],
        cancel_token: &CancellationToken,
    ) {
        self.enter_stage(run, PipelineState::Clustering);

        let eligible: Vec<(String, String)> = reviews
            .iter()
            .filter_map(|r| r.analyzable_text().map(|text| (r.id.clone(), text.to_string())))
            .collect();
        let total = eligible.len();
        run.statistics.clustering.skipped = reviews.len() - total;

        tracing::info!(
            run_id = %run.run_id,
            reviews = total,
            categories = vocabulary.len(),
            "Phase 3: CLUSTERING"
        );

        let run_id = run.run_id;
        let completed = AtomicUsize::new(0);
        let completed = &completed;

        let outcomes: Vec<Option<ClusterOutcome>> = stream::iter(eligible)
            .map(move |(review_id, text)| async move {
                if cancel_token.is_cancelled() {
                    return None;
                }

                let clustering = self.cluster_engine.assign_clusters(&text, vocabulary).await;

                let write = match (sentiments.get(&review_id), &clustering) {
                    (Some(sentiment), Ok(clusters)) => {
                        let update = ReviewUpdate {
                            sentiment: Some(sentiment.clone()),
                            clusters: Some(clusters.clone()),
                        };
                        Some(self.store.update_review(&review_id, &update).await)
                    }
                    _ => None,
                };

                let current = completed.fetch_add(1, Ordering::Relaxed) + 1;
                if current % 50 == 0 || current == total {
                    tracing::debug!(
                        run_id = %run_id,
                        progress = format!("{}/{}", current, total),
                        "Clustering progress"
                    );
                }

                Some(ClusterOutcome {
                    review_id,
                    clustering: clustering.map(|clusters| clusters.len()),
                    write,
                })
            })
            .buffer_unordered(self.max_concurrency)
            .collect()
            .await;

        for outcome in outcomes.into_iter().flatten() {
            match outcome.clustering {
                Ok(assigned) => {
                    run.statistics.clustering.processed += 1;
                    tracing::trace!(review_id = %outcome.review_id, assigned, "Review clustered");
                }
                Err(e) => {
                    tracing::warn!(
                        run_id = %run_id,
                        review_id = %outcome.review_id,
                        error = %e,
                        "Clustering failed, review skipped"
                    );
                    run.statistics.clustering.failed += 1;
                    run.add_warning(outcome.review_id.as_str(), format!("clustering failed: {}", e));
                }
            }

            match outcome.write {
                Some(Ok(true)) => run.statistics.review_writes.updated += 1,
                Some(Ok(false)) => {
                    tracing::warn!(
                        run_id = %run_id,
                        review_id = %outcome.review_id,
                        "Review no longer exists, update dropped"
                    );
                    run.statistics.review_writes.failed += 1;
                    run.add_warning(outcome.review_id.as_str(), "review no longer exists");
                }
                Some(Err(e)) => {
                    tracing::warn!(
                        run_id = %run_id,
                        review_id = %outcome.review_id,
                        error = %e,
                        "Failed to update review"
                    );
                    run.statistics.review_writes.failed += 1;
                    run.add_warning(outcome.review_id.as_str(), format!("review update failed: {}", e));
                }
                None => {}
            }
        }

        tracing::info!(
            run_id = %run_id,
            stats = %run.statistics.clustering.display_string(),
            writes = %run.statistics.review_writes.display_string(),
            "CLUSTERING complete"
        );
    }
}
