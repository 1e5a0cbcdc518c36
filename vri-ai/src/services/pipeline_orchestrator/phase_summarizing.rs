//! Phase 5: SUMMARIZING
//!
//! Hierarchical summary per venue, one venue update per parsed summary

use futures::stream::{self, StreamExt};
use tokio_util::sync::CancellationToken;

use super::PipelineOrchestrator;
use crate::models::{PipelineRun, PipelineState, SummaryResult, VenueReviewGroup};
use crate::services::VenueSummaryReport;

/// Outcome of one venue worker
struct VenueOutcome {
    venue_id: String,
    report: VenueSummaryReport,
    /// Present when a summary was produced
    write: Option<vri_common::Result<bool>>,
}

impl PipelineOrchestrator {
    /// Phase 5: SUMMARIZING - failures contained per venue
    pub(super) async fn phase_summarizing(
        &self,
        run: &mut PipelineRun,
        groups: Vec<VenueReviewGroup>,
        cancel_token: &CancellationToken,
    ) {
        self.enter_stage(run, PipelineState::Summarizing);

        tracing::info!(run_id = %run.run_id, venues = groups.len(), "Phase 5: SUMMARIZING");

        let run_id = run.run_id;

        let outcomes: Vec<Option<VenueOutcome>> = stream::iter(groups)
            .map(move |group| async move {
                if cancel_token.is_cancelled() {
                    return None;
                }

                let report = self.summarizer.summarize_venue(&group).await;

                let write = match &report.outcome {
                    Ok(summary) => Some(self.store.update_venue_summary(summary).await),
                    Err(_) => None,
                };

                Some(VenueOutcome {
                    venue_id: group.venue_id,
                    report,
                    write,
                })
            })
            .buffer_unordered(self.max_concurrency)
            .collect()
            .await;

        for outcome in outcomes.into_iter().flatten() {
            self.record_venue_outcome(run, outcome);
        }

        tracing::info!(
            run_id = %run_id,
            stats = %run.statistics.summarizing.display_string(),
            "SUMMARIZING complete"
        );
    }

    fn record_venue_outcome(&self, run: &mut PipelineRun, outcome: VenueOutcome) {
        let VenueOutcome {
            venue_id,
            report,
            write,
        } = outcome;
        let stats = &mut run.statistics.summarizing;
        stats.batches_total += report.batches_total;
        stats.batches_failed += report.failed_batches.len();

        for failure in &report.failed_batches {
            run.add_warning(
                venue_id.as_str(),
                format!("batch {} summary failed: {}", failure.index, failure.error),
            );
        }

        let summary: SummaryResult = match report.outcome {
            Ok(summary) => summary,
            Err(e) => {
                tracing::warn!(
                    run_id = %run.run_id,
                    venue_id = %venue_id,
                    error = %e,
                    "Venue summary failed, venue not updated"
                );
                run.statistics.summarizing.venues_skipped += 1;
                run.add_warning(venue_id, e.to_string());
                return;
            }
        };

        match write {
            Some(Ok(true)) => {
                run.statistics.summarizing.venues_updated += 1;
                tracing::debug!(
                    run_id = %run.run_id,
                    venue_id = %venue_id,
                    global_score = %summary.global_score,
                    "Venue summary saved"
                );

                if summary.score_value().is_none() {
                    run.add_warning(
                        venue_id,
                        format!("global score {:?} is not a number in 0-100", summary.global_score),
                    );
                }
            }
            Some(Ok(false)) => {
                run.statistics.summarizing.venues_skipped += 1;
                run.add_warning(venue_id, "venue no longer exists");
            }
            Some(Err(e)) => {
                tracing::warn!(
                    run_id = %run.run_id,
                    venue_id = %venue_id,
                    error = %e,
                    "Failed to update venue summary"
                );
                run.statistics.summarizing.venues_skipped += 1;
                run.add_warning(venue_id, format!("venue update failed: {}", e));
            }
            None => {
                run.statistics.summarizing.venues_skipped += 1;
            }
        }
    }
}
