//! Phase 4: GROUPING
//!
//! Reviews with text joined to their venue

use super::PipelineOrchestrator;
use crate::models::{PipelineRun, PipelineState, VenueReviewGroup};
use crate::types::PipelineError;

impl PipelineOrchestrator {
    /// Phase 4: GROUPING - store read failure is fatal
    pub(super) async fn phase_grouping(
        &self,
        run: &mut PipelineRun,
    ) -> Result<Vec<VenueReviewGroup>, PipelineError> {
        self.enter_stage(run, PipelineState::Grouping);

        let groups = self.store.group_reviews_by_venue().await?;

        run.statistics.grouping.venues = groups.len();
        run.statistics.grouping.reviews = groups.iter().map(|g| g.reviews.len()).sum();

        tracing::info!(
            run_id = %run.run_id,
            stats = %run.statistics.grouping.display_string(),
            "Phase 4: GROUPING complete"
        );

        Ok(groups)
    }
}
