//! Review intelligence pipeline orchestrator
//!
//! # State Progression
//! CLASSIFYING → INDUCING_LABELS → CLUSTERING → GROUPING → SUMMARIZING → COMPLETED
//!
//! Each state is handled by a dedicated `phase_*` method. Per-review and
//! per-venue failures are counted and recorded as run warnings; only label
//! induction and store reads at stage boundaries end a run early.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use vri_common::config::PipelineSettings;

use crate::db::DocumentStore;
use crate::models::{PipelineRun, PipelineState};
use crate::services::{
    BatchSummarizer, ClusterEngine, LabelInducer, LabelInductionConfig, ServiceRegistry,
    SummarizerConfig,
};
use crate::types::{Classifier, PipelineError};

mod phase_classifying;
mod phase_clustering;
mod phase_grouping;
mod phase_inducing;
mod phase_summarizing;
mod statistics;

pub use statistics::{
    GroupingStats, ReviewWriteStats, RunStatistics, StageStats, SummarizingStats,
};

/// Pipeline orchestrator service
pub struct PipelineOrchestrator {
    store: Arc<dyn DocumentStore>,
    classifier: Arc<dyn Classifier>,
    label_inducer: LabelInducer,
    cluster_engine: ClusterEngine,
    summarizer: BatchSummarizer,
    max_concurrency: usize,
    run_timeout: Option<Duration>,
    /// Stage of the run in progress, published for status queries
    stage: watch::Sender<PipelineState>,
}

impl PipelineOrchestrator {
    /// Wire the stages to the registry's services and the document store
    pub fn new(
        registry: &ServiceRegistry,
        store: Arc<dyn DocumentStore>,
        settings: &PipelineSettings,
    ) -> Self {
        let label_inducer = LabelInducer::new(
            registry.completion.clone(),
            LabelInductionConfig {
                target_count: settings.label_count,
                sample_size: settings.sample_size,
                seed: settings.sample_seed,
                temperature: settings.label_temperature,
            },
        );

        let summarizer = BatchSummarizer::new(
            registry.completion.clone(),
            SummarizerConfig {
                batch_size: settings.batch_size,
                temperature: settings.summary_temperature,
                labels_per_review: settings.labels_per_review,
                max_concurrency: settings.max_concurrency,
            },
        );

        Self {
            store,
            classifier: registry.classifier.clone(),
            label_inducer,
            cluster_engine: ClusterEngine::new(
                registry.zero_shot.clone(),
                settings.hypothesis_template.clone(),
            ),
            summarizer,
            max_concurrency: settings.max_concurrency.max(1),
            run_timeout: settings.run_timeout_secs.map(Duration::from_secs),
            stage: watch::channel(PipelineState::Completed).0,
        }
    }

    /// Follow the stage of the run in progress
    pub fn subscribe_stage(&self) -> watch::Receiver<PipelineState> {
        self.stage.subscribe()
    }

    /// Execute one full review intelligence pass
    ///
    /// Respects `cancel_token` between stages and between items. A run that
    /// exceeds the configured time budget ends CANCELLED.
    ///
    /// # Errors
    /// Returns the fatal error after marking `run` FAILED.
    pub async fn execute_run(
        &self,
        run: &mut PipelineRun,
        cancel_token: &CancellationToken,
    ) -> Result<(), PipelineError> {
        let start_time = std::time::Instant::now();

        tracing::info!(run_id = %run.run_id, "Starting review intelligence pass");
        self.stage.send_replace(run.state);

        let outcome = match self.run_timeout {
            Some(limit) => tokio::time::timeout(limit, self.run_stages(run, cancel_token))
                .await
                .unwrap_or(Err(PipelineError::TimedOut(limit.as_secs()))),
            None => self.run_stages(run, cancel_token).await,
        };

        match outcome {
            Ok(()) => {
                tracing::info!(
                    run_id = %run.run_id,
                    state = ?run.state,
                    elapsed_ms = start_time.elapsed().as_millis() as u64,
                    warnings = run.warnings.len(),
                    "Review intelligence pass finished"
                );
                Ok(())
            }
            Err(PipelineError::TimedOut(secs)) => {
                cancel_token.cancel();
                tracing::warn!(run_id = %run.run_id, budget_secs = secs, "Run timed out, cancelling");
                run.add_warning(
                    run.run_id.to_string(),
                    PipelineError::TimedOut(secs).to_string(),
                );
                self.enter_stage(run, PipelineState::Cancelled);
                Ok(())
            }
            Err(e) => {
                tracing::error!(run_id = %run.run_id, state = ?run.state, error = %e, "Run failed");
                run.fail(e.to_string());
                self.stage.send_replace(run.state);
                Err(e)
            }
        }
    }

    async fn run_stages(
        &self,
        run: &mut PipelineRun,
        cancel_token: &CancellationToken,
    ) -> Result<(), PipelineError> {
        let reviews = self.store.find_reviews().await?;
        run.statistics.reviews_loaded = reviews.len();

        // Phase 1: CLASSIFYING - sentiment per review (held until clustering)
        let sentiments = self.phase_classifying(run, &reviews, cancel_token).await;
        if cancel_token.is_cancelled() {
            self.cancel(run);
            return Ok(());
        }

        // Phase 2: INDUCING_LABELS - run vocabulary (fatal on failure)
        let vocabulary = self.phase_inducing_labels(run, &reviews).await?;
        if cancel_token.is_cancelled() {
            self.cancel(run);
            return Ok(());
        }

        // Phase 3: CLUSTERING - zero-shot scores, one review update each
        self.phase_clustering(run, &reviews, &sentiments, &vocabulary, cancel_token)
            .await;
        if cancel_token.is_cancelled() {
            self.cancel(run);
            return Ok(());
        }

        // Phase 4: GROUPING - reviews with text by venue
        let groups = self.phase_grouping(run).await?;
        if cancel_token.is_cancelled() {
            self.cancel(run);
            return Ok(());
        }

        // Phase 5: SUMMARIZING - hierarchical summary per venue
        self.phase_summarizing(run, groups, cancel_token).await;
        if cancel_token.is_cancelled() {
            self.cancel(run);
            return Ok(());
        }

        self.enter_stage(run, PipelineState::Completed);
        Ok(())
    }

    fn enter_stage(&self, run: &mut PipelineRun, state: PipelineState) {
        let transition = run.transition_to(state);
        self.stage.send_replace(state);
        tracing::debug!(
            run_id = %transition.run_id,
            from = ?transition.old_state,
            to = ?transition.new_state,
            "Pipeline state transition"
        );
    }

    fn cancel(&self, run: &mut PipelineRun) {
        tracing::info!(run_id = %run.run_id, state = ?run.state, "Run cancelled");
        self.enter_stage(run, PipelineState::Cancelled);
    }
}
