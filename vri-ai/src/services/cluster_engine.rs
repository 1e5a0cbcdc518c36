//! Zero-shot theme clustering
//!
//! Scores one review against every category of the run vocabulary. A valid
//! result holds exactly one assignment per category.

use std::collections::HashSet;
use std::sync::Arc;

use crate::models::ClusterAssignment;
use crate::types::{ServiceError, ZeroShotScorer, ZeroShotScores};

/// Assigns vocabulary categories to review texts
pub struct ClusterEngine {
    scorer: Arc<dyn ZeroShotScorer>,
    hypothesis_template: String,
}

impl ClusterEngine {
    pub fn new(scorer: Arc<dyn ZeroShotScorer>, hypothesis_template: impl Into<String>) -> Self {
        Self {
            scorer,
            hypothesis_template: hypothesis_template.into(),
        }
    }

    /// Score `text` against `vocabulary`, highest score first
    ///
    /// # Errors
    /// `ServiceError` from the scorer, or `InvalidResponse` when the answer
    /// does not cover exactly the vocabulary.
    pub async fn assign_clusters(
        &self,
        text: &str,
        vocabulary: &[String],
    ) -> Result<Vec<ClusterAssignment>, ServiceError> {
        let scores = self
            .scorer
            .score(text, vocabulary, &self.hypothesis_template)
            .await?;

        to_assignments(vocabulary, scores)
    }
}

/// Check a zero-shot answer against the vocabulary and rank it
pub fn to_assignments(
    vocabulary: &[String],
    scores: ZeroShotScores,
) -> Result<Vec<ClusterAssignment>, ServiceError> {
    if scores.labels.len() != scores.scores.len() {
        return Err(ServiceError::InvalidResponse(format!(
            "{} labels but {} scores",
            scores.labels.len(),
            scores.scores.len()
        )));
    }

    let expected: HashSet<&str> = vocabulary.iter().map(String::as_str).collect();
    let returned: HashSet<&str> = scores.labels.iter().map(String::as_str).collect();
    if returned.len() != scores.labels.len() || returned != expected {
        return Err(ServiceError::InvalidResponse(format!(
            "zero-shot labels {:?} do not match vocabulary {:?}",
            scores.labels, vocabulary
        )));
    }

    if let Some(bad) = scores.scores.iter().find(|s| !(0.0..=1.0).contains(*s)) {
        return Err(ServiceError::InvalidResponse(format!(
            "zero-shot score {} outside [0, 1]",
            bad
        )));
    }

    let mut assignments: Vec<ClusterAssignment> = scores
        .labels
        .into_iter()
        .zip(scores.scores)
        .map(|(label, score)| ClusterAssignment { label, score })
        .collect();
    assignments.sort_by(|a, b| b.score.total_cmp(&a.score));

    Ok(assignments)
}
