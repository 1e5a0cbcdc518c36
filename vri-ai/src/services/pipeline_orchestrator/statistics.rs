//! Per-stage run counters
//!
//! Carried on the run report and logged at the end of each stage.

use serde::{Deserialize, Serialize};

/// Per-review stage counters (CLASSIFYING, CLUSTERING)
///
/// Display: "N processed, M skipped, K failed"
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageStats {
    /// Service call succeeded
    pub processed: usize,
    /// No text to analyze
    pub skipped: usize,
    /// Service call failed or returned an invalid answer
    pub failed: usize,
}

impl StageStats {
    pub fn display_string(&self) -> String {
        format!(
            "{} processed, {} skipped, {} failed",
            self.processed, self.skipped, self.failed
        )
    }
}

/// Review write counters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewWriteStats {
    pub updated: usize,
    pub failed: usize,
}

impl ReviewWriteStats {
    pub fn display_string(&self) -> String {
        format!("{} reviews updated, {} writes failed", self.updated, self.failed)
    }
}

/// GROUPING counters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupingStats {
    pub venues: usize,
    pub reviews: usize,
}

impl GroupingStats {
    pub fn display_string(&self) -> String {
        format!("{} reviews across {} venues", self.reviews, self.venues)
    }
}

/// SUMMARIZING counters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummarizingStats {
    pub venues_updated: usize,
    /// Final call failed, response unparsable, every batch failed or write failed
    pub venues_skipped: usize,
    pub batches_total: usize,
    pub batches_failed: usize,
}

impl SummarizingStats {
    pub fn display_string(&self) -> String {
        format!(
            "{} venues updated, {} skipped ({} of {} batches failed)",
            self.venues_updated, self.venues_skipped, self.batches_failed, self.batches_total
        )
    }
}

/// Counters for a whole run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunStatistics {
    pub reviews_loaded: usize,
    pub classifying: StageStats,
    pub clustering: StageStats,
    pub review_writes: ReviewWriteStats,
    pub grouping: GroupingStats,
    pub summarizing: SummarizingStats,
}
