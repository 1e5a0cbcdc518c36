//! Phase 2: INDUCING_LABELS
//!
//! One generative call producing the run's category vocabulary

use super::PipelineOrchestrator;
use crate::models::{PipelineRun, PipelineState, Review};
use crate::types::PipelineError;

impl PipelineOrchestrator {
    /// Phase 2: INDUCING_LABELS - fatal on failure
    pub(super) async fn phase_inducing_labels(
        &self,
        run: &mut PipelineRun,
        reviews: &[Review],
    ) -> Result<Vec<String>, PipelineError> {
        self.enter_stage(run, PipelineState::InducingLabels);

        tracing::info!(run_id = %run.run_id, "Phase 2: INDUCING_LABELS");

        let vocabulary = self.label_inducer.induce_labels(reviews).await?;
        run.vocabulary = vocabulary.clone();

        Ok(vocabulary)
    }
}
