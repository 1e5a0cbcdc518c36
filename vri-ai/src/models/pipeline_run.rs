//! Pipeline run state machine
//!
//! A run progresses through strictly ordered states:
//! CLASSIFYING → INDUCING_LABELS → CLUSTERING → GROUPING → SUMMARIZING → COMPLETED
//!
//! FAILED (label induction or store read failure) and CANCELLED are the
//! alternative terminal states.

use crate::services::pipeline_orchestrator::RunStatistics;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Pipeline run state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PipelineState {
    /// Sentiment classification per review
    Classifying,
    /// Category vocabulary induction (once)
    InducingLabels,
    /// Zero-shot scoring per review
    Clustering,
    /// Reviews grouped by venue
    Grouping,
    /// Per-venue batch summarization
    Summarizing,
    /// Run finished
    Completed,
    /// Run cancelled or timed out
    Cancelled,
    /// Run aborted by a fatal error
    Failed,
}

/// State transition record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateTransition {
    pub run_id: Uuid,
    pub old_state: PipelineState,
    pub new_state: PipelineState,
    pub transitioned_at: DateTime<Utc>,
}

/// Warning recorded for a contained failure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunWarning {
    /// State the failure occurred in
    pub stage: PipelineState,
    /// Review or venue id the warning is about
    pub subject: String,
    pub message: String,
}

/// Pipeline run report (in-memory)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineRun {
    /// Unique run identifier
    pub run_id: Uuid,

    /// Current state
    pub state: PipelineState,

    /// Category vocabulary induced for this run
    pub vocabulary: Vec<String>,

    /// Per-stage counters
    pub statistics: RunStatistics,

    /// Contained failures
    pub warnings: Vec<RunWarning>,

    /// Fatal error message (FAILED only)
    pub error: Option<String>,

    pub started_at: DateTime<Utc>,

    /// Set when a terminal state is reached
    pub ended_at: Option<DateTime<Utc>>,
}

impl PipelineRun {
    /// Create new run in the CLASSIFYING state
    pub fn new() -> Self {
        Self {
            run_id: Uuid::new_v4(),
            state: PipelineState::Classifying,
            vocabulary: Vec::new(),
            statistics: RunStatistics::default(),
            warnings: Vec::new(),
            error: None,
            started_at: Utc::now(),
            ended_at: None,
        }
    }

    /// Transition to new state
    pub fn transition_to(&mut self, new_state: PipelineState) -> StateTransition {
        let transition = StateTransition {
            run_id: self.run_id,
            old_state: self.state,
            new_state,
            transitioned_at: Utc::now(),
        };
        self.state = new_state;

        if self.is_terminal() {
            self.ended_at = Some(Utc::now());
        }

        transition
    }

    /// Record a contained failure
    pub fn add_warning(&mut self, subject: impl Into<String>, message: impl Into<String>) {
        self.warnings.push(RunWarning {
            stage: self.state,
            subject: subject.into(),
            message: message.into(),
        });
    }

    /// Mark the run failed with the fatal error
    pub fn fail(&mut self, message: impl Into<String>) {
        self.error = Some(message.into());
        self.transition_to(PipelineState::Failed);
    }

    /// Check if run is terminal (finished)
    pub fn is_terminal(&self) -> bool {
        matches!(
            self.state,
            PipelineState::Completed | PipelineState::Cancelled | PipelineState::Failed
        )
    }

    /// Elapsed seconds since start (until end for terminal runs)
    pub fn elapsed_seconds(&self) -> u64 {
        let end = self.ended_at.unwrap_or_else(Utc::now);
        (end - self.started_at).num_seconds().max(0) as u64
    }
}

impl Default for PipelineRun {
    fn default() -> Self {
        Self::new()
    }
}
